use crate::all::*;

use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;

// Per-frame tracker output. The quadrilateral is in source-frame pixel
// coordinates, ordered (TL, BL, BR, TR) like the model corners it is
// projected from.
#[derive(Clone, Copy, Debug)]
pub enum MatchResult {
  Accepted(Quad),
  Rejected,
}

impl MatchResult {
  pub fn is_rejected(&self) -> bool {
    matches!(self, MatchResult::Rejected)
  }

  pub fn quad(&self) -> Option<&Quad> {
    match self {
      MatchResult::Accepted(quad) => Some(quad),
      MatchResult::Rejected => None,
    }
  }
}

// Matching target trained from the canonical image. Built exactly once per
// run; the descriptor corpus lives in the matcher.
struct Model {
  keypoints: Vec<Keypoint>,
  quad: Quad,
}

// Keypoint based planar object tracker: match frame descriptors against the
// model corpus, estimate a homography robustly, project the model corners.
//
// Lifecycle: reinit_frame_size, then reconfigure_model, then any number of
// process_frame calls. Calling out of order is a programming error.
pub struct PlanarTracker {
  detector: Box<dyn FeatureExtractor>,
  matcher: Box<dyn DescriptorMatcher>,
  params: TrackerParams,
  rng: Xoshiro256PlusPlus,
  frame_shape: Option<Shape>,
  model: Option<Model>,
}

impl PlanarTracker {
  pub fn new(
    detector: Box<dyn FeatureExtractor>,
    matcher: Box<dyn DescriptorMatcher>,
    params: &TrackerParams,
  ) -> PlanarTracker {
    PlanarTracker {
      detector,
      matcher,
      rng: Xoshiro256PlusPlus::seed_from_u64(params.ransac_seed),
      params: params.clone(),
      frame_shape: None,
      model: None,
    }
  }

  pub fn reinit_frame_size(&mut self, width: usize, height: usize) {
    self.frame_shape = Some(Shape::new(width, height));
  }

  pub fn reconfigure_model(&mut self, canonical_image: &Image) {
    assert!(self.frame_shape.is_some(), "reinit_frame_size must be called first");
    // Single-image corpus: no accumulation across calls.
    self.matcher.clear();

    let model_image = multi_pyr_down(canonical_image, self.params.num_pyrdown_model);
    let (keypoints, descriptors) = self.detector.detect_and_compute(&model_image);
    debug!("Model configured with {} keypoints.", keypoints.len());
    self.matcher.add(&descriptors);
    self.model = Some(Model {
      keypoints,
      quad: Quad::inset_corners_of(Shape::new(model_image.width, model_image.height)),
    });
  }

  pub fn process_frame(&mut self, frame_image: &Image) -> MatchResult {
    let model = self.model.as_ref().expect("reconfigure_model must be called first");

    let frame = multi_pyr_down(frame_image, self.params.num_pyrdown_frames);
    let (keypoints, descriptors) = self.detector.detect_and_compute(&frame);
    if descriptors.is_empty() {
      debug!("R: no descriptors");
      return MatchResult::Rejected;
    }

    // Two nearest model neighbors per frame descriptor; keep a match only
    // when it is unambiguous.
    let mut model_points = vec![];
    let mut frame_points = vec![];
    for (query, (first, second)) in self.matcher.knn2(&descriptors).iter().enumerate() {
      if (first.distance as f64) < self.params.ratio_thresh * second.distance as f64 {
        model_points.push(model.keypoints[first.train_idx].pt);
        frame_points.push(keypoints[query].pt);
      }
    }
    if model_points.len() < self.params.min_matches {
      debug!("R: not enough matches ({} < {})", model_points.len(), self.params.min_matches);
      return MatchResult::Rejected;
    }

    let estimate = match ransac_homography(
      &model_points,
      &frame_points,
      self.params.ransac_thresh,
      self.params.ransac_iters,
      &mut self.rng,
    ) {
      Some(estimate) => estimate,
      None => {
        debug!("R: homography estimation failed");
        return MatchResult::Rejected;
      },
    };
    if estimate.inlier_count < self.params.min_matches {
      debug!(
        "R: not enough RANSAC inliers ({} < {}, got {} matches before)",
        estimate.inlier_count, self.params.min_matches, model_points.len(),
      );
      return MatchResult::Rejected;
    }

    let quad = match model.quad.transform(&estimate.homography) {
      Some(quad) => quad,
      None => {
        debug!("R: projected quadrilateral is degenerate");
        return MatchResult::Rejected;
      },
    };
    // Back to full-resolution frame coordinates.
    let scale = u32::pow(2, self.params.num_pyrdown_frames as u32) as f64;
    MatchResult::Accepted(quad.scale(scale))
  }
}
