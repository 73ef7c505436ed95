mod all;
mod compositor;
mod detector;
mod errors;
mod geometry;
mod gui;
mod homography;
mod image;
mod matcher;
mod output;
mod params;
mod pipeline;
mod task;
mod tracker;
mod types;
mod util;
mod video;
mod visualize;

use all::*;

use clap::Parser;

const EXITCODE_OK: i32 = 0;
const EXITCODE_KBDBREAK: i32 = 10;
const EXITCODE_IOERROR: i32 = 20;
const EXITCODE_UNKERR: i32 = 254;

#[derive(Parser)]
#[clap(about = "Tracks a document through a video and composites a rectified image of it.")]
struct Args {
  /// Path to the task_data.json file.
  task_data: String,
  /// Path to the input video file.
  video: String,
  /// Path to the dewarped reference frame file. Accepted for interface
  /// compatibility; the reference is captured from the video instead.
  reference_frame: String,
  /// Path to the output image.
  output: String,
  /// Activate debug output.
  #[clap(short, long)]
  debug: bool,
  /// Activate visualization.
  #[clap(short, long)]
  gui: bool,
  #[clap(flatten)]
  tracker: TrackerParams,
}

fn handle_error(err: &anyhow::Error) {
  for (i, e) in err.chain().enumerate() {
    println!("  {}: {}", i + 1, e);
  }
}

// The original interface distinguishes interrupts, I/O class failures and
// everything else.
fn exit_code(err: &anyhow::Error) -> i32 {
  for cause in err.chain() {
    if cause.downcast_ref::<FatalError>().is_some() { return EXITCODE_IOERROR }
    if cause.downcast_ref::<std::io::Error>().is_some() { return EXITCODE_IOERROR }
  }
  EXITCODE_UNKERR
}

fn main() {
  let args = Args::parse();
  env_logger::Builder::new()
    .filter_level(if args.debug { LevelFilter::Debug } else { LevelFilter::Info })
    .format(util::format_log)
    .init();

  let code = match run(&args) {
    Ok(PipelineOutcome::Completed(_)) => EXITCODE_OK,
    Ok(PipelineOutcome::Interrupted) => {
      info!("Process interrupted by user.");
      EXITCODE_KBDBREAK
    },
    Err(err) => {
      handle_error(&err);
      exit_code(&err)
    },
  };
  std::process::exit(code);
}

fn run(args: &Args) -> Result<PipelineOutcome> {
  debug!("Arguments:");
  debug!("  task_data = {}", args.task_data);
  debug!("  video = {}", args.video);
  debug!("  reference_frame = {} (not read; captured from the video)", args.reference_frame);
  debug!("  output = {}", args.output);

  let task = TaskDescriptor::load(Path::new(&args.task_data))?;
  let mut source = VideoInput::new(Path::new(&args.video))?;
  let mut viewer: Box<dyn Viewer> = if args.gui {
    Box::new(gui::Gui::new(task.input_video_shape, task.target_shape)?)
  }
  else {
    Box::new(NullViewer)
  };

  let pipeline = Pipeline::new(task, args.tracker.clone(), CancelFlag::new());
  let outcome = pipeline.run(&mut source, viewer.as_mut())?;
  if let PipelineOutcome::Completed(result) = &outcome {
    output::write_image(result, Path::new(&args.output))?;
    debug!("Wrote result image to '{}'.", args.output);
  }
  Ok(outcome)
}
