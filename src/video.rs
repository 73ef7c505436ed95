use crate::all::*;

use std::io::Read;
use std::process::{Child, ChildStdout, Command, Stdio};

// Video frame source backed by an ffmpeg child process piping raw
// grayscale frames. The stream shape and frame count are probed up front
// with ffprobe so the orchestrator can validate them against the task data.
pub struct VideoInput {
  shape: Shape,
  frame_count: usize,
  child: Child,
  child_stdout: ChildStdout,
  buffer: Vec<u8>,
}

impl VideoInput {
  pub fn new(path: &Path) -> Result<VideoInput> {
    let path = path.to_str().ok_or_else(|| anyhow!("Failed to parse video path."))?;
    let (shape, frame_count) = probe(path)?;

    let mut child = Command::new("ffmpeg")
      .args(["-i", path, "-f", "rawvideo", "-vcodec", "rawvideo", "-vsync", "vfr", "-pix_fmt", "gray", "-"])
      .stdout(Stdio::piped())
      .stderr(Stdio::null())
      .spawn()
      .context("Failed to start ffmpeg.")?;
    let child_stdout = child.stdout.take()
      .ok_or_else(|| anyhow!("Failed to capture ffmpeg output."))?;
    Ok(VideoInput {
      shape,
      frame_count,
      child,
      child_stdout,
      buffer: vec![0; shape.width * shape.height],
    })
  }
}

impl FrameSource for VideoInput {
  fn shape(&self) -> Shape {
    self.shape
  }

  fn frame_count(&self) -> usize {
    self.frame_count
  }

  fn read(&mut self) -> Result<Option<Image>> {
    let n = self.buffer.len();
    let mut filled = 0;
    while filled < n {
      let count = self.child_stdout.read(&mut self.buffer[filled..])
        .map_err(|err| FatalError::Stream(format!("reading frame bytes failed: {}", err)))?;
      if count == 0 { break }
      filled += count;
    }
    if filled == 0 { return Ok(None) }
    if filled < n {
      bail!(FatalError::Stream(format!("frame truncated at {} of {} bytes", filled, n)));
    }
    Ok(Some(Image::from_vec(self.shape.width, self.shape.height, self.buffer.clone())))
  }
}

impl Drop for VideoInput {
  fn drop(&mut self) {
    // The decoder may still be running if the run ended early.
    let _ = self.child.kill();
    let _ = self.child.wait();
  }
}

// Stream shape and exact frame count of the first video stream.
fn probe(path: &str) -> Result<(Shape, usize)> {
  let output = Command::new("ffprobe")
    .args([
      "-v", "error",
      "-select_streams", "v:0",
      "-count_frames",
      "-show_entries", "stream=width,height,nb_read_frames",
      "-of", "csv=p=0",
      path,
    ])
    .output()
    .context("Failed to run ffprobe.")?;
  if !output.status.success() {
    bail!(FatalError::Stream(format!("ffprobe failed for {}", path)));
  }
  let text = String::from_utf8_lossy(&output.stdout);
  let fields: Vec<&str> = text.trim().split(',').collect();
  if fields.len() != 3 {
    bail!(FatalError::Stream(format!("unexpected ffprobe output: {}", text.trim())));
  }
  let width: usize = fields[0].parse()
    .map_err(|_| FatalError::Stream(format!("bad stream width: {}", fields[0])))?;
  let height: usize = fields[1].parse()
    .map_err(|_| FatalError::Stream(format!("bad stream height: {}", fields[1])))?;
  let frame_count: usize = fields[2].parse()
    .map_err(|_| FatalError::Stream(format!("bad stream frame count: {}", fields[2])))?;
  Ok((Shape::new(width, height), frame_count))
}
