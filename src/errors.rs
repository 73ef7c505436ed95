use std::fmt;

// Fatal error classes that abort the run. These map to the I/O-class exit
// code at the binary boundary. Per-frame tracker rejection is not an error
// and never appears here.
#[derive(Debug)]
pub enum FatalError {
  // The task descriptor is missing or invalid.
  Config(String),
  // The task descriptor and the video stream disagree.
  Consistency(String),
  // The frame source failed mid-read, distinct from clean end-of-stream.
  Stream(String),
}

impl fmt::Display for FatalError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      FatalError::Config(msg) => write!(f, "invalid task data: {}", msg),
      FatalError::Consistency(msg) => write!(f, "task data and video are not consistent: {}", msg),
      FatalError::Stream(msg) => write!(f, "stream error in input video: {}", msg),
    }
  }
}

impl std::error::Error for FatalError {}
