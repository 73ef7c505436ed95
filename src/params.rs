// Run-wide tracker constants. Flattened into the command line arguments;
// no global parameter state, the struct is passed into constructors.
#[derive(Debug, Clone)]
#[derive(clap::Args)]
pub struct TrackerParams {
  // Power-of-two pyramid downsampling applied to the canonical image.
  #[clap(long, default_value = "0")]
  pub num_pyrdown_model: usize,
  // Power-of-two pyramid downsampling applied to every frame.
  #[clap(long, default_value = "0")]
  pub num_pyrdown_frames: usize,

  // Minimum surviving matches, and minimum RANSAC inliers, to accept.
  #[clap(long, default_value = "15")]
  pub min_matches: usize,
  // Nearest neighbor must be strictly closer than this fraction of the
  // second nearest.
  #[clap(long, default_value = "0.75")]
  pub ratio_thresh: f64,

  // RANSAC reprojection threshold in (downsampled) frame pixels.
  #[clap(long, default_value = "3.0")]
  pub ransac_thresh: f64,
  #[clap(long, default_value = "512")]
  pub ransac_iters: usize,
  #[clap(long, default_value = "1")]
  pub ransac_seed: u64,

  // Feature detector.
  #[clap(long, default_value = "20")]
  pub fast_threshold: i16,
  #[clap(long, default_value = "1000")]
  pub max_features: usize,
  #[clap(long, default_value = "3")]
  pub detector_levels: usize,
}

impl Default for TrackerParams {
  fn default() -> TrackerParams {
    TrackerParams {
      num_pyrdown_model: 0,
      num_pyrdown_frames: 0,
      min_matches: 15,
      ratio_thresh: 0.75,
      ransac_thresh: 3.0,
      ransac_iters: 512,
      ransac_seed: 1,
      fast_threshold: 20,
      max_features: 1000,
      detector_levels: 3,
    }
  }
}
