use crate::all::*;

// Sequential frame delivery. No random seek: frames come in order, one per
// read. End of data is signaled by `Ok(None)`; a read error mid-stream is a
// fatal stream error, reported through `Err`.
pub trait FrameSource {
  fn shape(&self) -> Shape;
  fn frame_count(&self) -> usize;
  fn read(&mut self) -> Result<Option<Image>>;
}

// Cooperative cancellation, checked once per frame. Cloned handles share
// the flag so a signal handler or the GUI can raise it.
#[derive(Clone, Default)]
pub struct CancelFlag {
  flag: Arc<AtomicBool>,
}

impl CancelFlag {
  pub fn new() -> CancelFlag {
    CancelFlag::default()
  }

  pub fn cancel(&self) {
    self.flag.store(true, Ordering::Relaxed);
  }

  pub fn is_cancelled(&self) -> bool {
    self.flag.load(Ordering::Relaxed)
  }
}

#[derive(Debug)]
pub enum PipelineOutcome {
  // Final canvas, emitted once the stream ends.
  Completed(Image),
  // Cancelled cooperatively; no output.
  Interrupted,
}

// Single-pass orchestrator. Owns the tracker and compositor lifecycles for
// one run: validate, skip to the reference frame, initialize, then track
// and composite until the stream ends.
pub struct Pipeline {
  task: TaskDescriptor,
  params: TrackerParams,
  cancel: CancelFlag,
}

impl Pipeline {
  pub fn new(task: TaskDescriptor, params: TrackerParams, cancel: CancelFlag) -> Pipeline {
    Pipeline { task, params, cancel }
  }

  pub fn run(
    &self,
    source: &mut dyn FrameSource,
    viewer: &mut dyn Viewer,
  ) -> Result<PipelineOutcome> {
    let shape = source.shape();
    debug!("Input video: shape {:?}, {} frames.", shape, source.frame_count());
    if shape != self.task.input_video_shape {
      bail!(FatalError::Consistency(format!(
        "declared frame shape {:?} does not match stream shape {:?}",
        self.task.input_video_shape, shape,
      )));
    }
    if self.task.reference_frame_id >= source.frame_count() {
      bail!(FatalError::Consistency(format!(
        "reference frame id {} is out of range for a video of {} frames",
        self.task.reference_frame_id, source.frame_count(),
      )));
    }

    // Discard frames until the reference frame (0-indexed) is reached.
    let mut frame_index = 0;
    let mut frame = read_expected(source, frame_index)?;
    while frame_index < self.task.reference_frame_id {
      if self.cancel.is_cancelled() { return Ok(PipelineOutcome::Interrupted) }
      info!("Skipping frame {}", frame_index);
      if !viewer.update(View { frame: &frame, quad: None, rejected: false, canvas: None })? {
        self.cancel.cancel();
        return Ok(PipelineOutcome::Interrupted);
      }
      frame_index += 1;
      frame = read_expected(source, frame_index)?;
    }

    // Reference capture: the canvas is initialized from the rectified
    // reference frame, and the tracker model is trained on that rectified
    // image rather than the raw frame.
    let mut compositor = Compositor::new(self.task.target_shape);
    let canonical = compositor.init_reference(&frame, &self.task.object_quad)?;
    let mut tracker = PlanarTracker::new(
      Box::new(OrbExtractor::new(&self.params)),
      Box::new(BruteForceMatcher::new()),
      &self.params,
    );
    debug!("Reinitializing tracker with frame size (w={}; h={})", shape.width, shape.height);
    tracker.reinit_frame_size(shape.width, shape.height);
    tracker.reconfigure_model(&canonical);
    debug!("Tracker configuration complete.");
    if !viewer.update(View {
      frame: &frame,
      quad: Some(&self.task.object_quad),
      rejected: false,
      canvas: Some(compositor.canvas()),
    })? {
      self.cancel.cancel();
      return Ok(PipelineOutcome::Interrupted);
    }

    loop {
      if self.cancel.is_cancelled() { return Ok(PipelineOutcome::Interrupted) }
      let frame = match source.read()? {
        Some(frame) => frame,
        None => {
          debug!("End of stream reached after frame {}", frame_index);
          break;
        },
      };
      frame_index += 1;

      let result = tracker.process_frame(&frame);
      match &result {
        MatchResult::Accepted(quad) => {
          info!(
            "frame {:03}: A tl:({:-4.2},{:-4.2}) bl:({:-4.2},{:-4.2}) br:({:-4.2},{:-4.2}) tr:({:-4.2},{:-4.2})",
            frame_index,
            quad.tl()[0], quad.tl()[1], quad.bl()[0], quad.bl()[1],
            quad.br()[0], quad.br()[1], quad.tr()[0], quad.tr()[1],
          );
          compositor.update(&frame, quad)?;
        },
        MatchResult::Rejected => {
          info!("frame {:03}: R", frame_index);
        },
      }
      if !viewer.update(View {
        frame: &frame,
        quad: result.quad(),
        rejected: result.is_rejected(),
        canvas: Some(compositor.canvas()),
      })? {
        self.cancel.cancel();
        return Ok(PipelineOutcome::Interrupted);
      }
    }

    info!("Process complete.");
    Ok(PipelineOutcome::Completed(compositor.finalize()))
  }
}

// A missing frame before the reference index contradicts the probed frame
// count, so it is a stream error rather than a clean end.
fn read_expected(source: &mut dyn FrameSource, frame_index: usize) -> Result<Image> {
  match source.read()? {
    Some(frame) => Ok(frame),
    None => bail!(FatalError::Stream(format!("unexpected end of stream at frame {}", frame_index))),
  }
}
