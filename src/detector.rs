// FAST corners with orientation and rotated binary test-pair descriptors,
// detected over a small image pyramid.

use crate::all::*;

use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;

// Values 9 and 12 are popular, allowing quick rejection logic.
const FAST_VARIANT_N: usize = 12;

// A Bresenham circle.
const CIRCLE_RADIUS: i32 = 3;
const CIRCLE: [[i32; 2]; 16] = [
  [ 0, -3], [ 1, -3], [ 2, -2], [ 3, -1], [ 3,  0], [ 3,  1], [ 2,  2], [ 1,  3],
  [ 0,  3], [-1,  3], [-2,  2], [-3,  1], [-3,  0], [-3, -1], [-2, -2], [-1, -3],
];

// Test pairs stay within this radius before rotation.
const PATTERN_RADIUS: i32 = 13;
// Radius of the orientation patch.
const ORIENTATION_RADIUS: i32 = 15;
// Keeps rotated test pairs and the orientation patch inside the image.
const EDGE_MARGIN: i32 = 19;

const PATTERN_SEED: u64 = 0x0b5e55ed;

pub type Descriptor = [u8; 32];
const DESCRIPTOR_BITS: usize = 256;

#[derive(Clone, Copy, Debug)]
pub struct Keypoint {
  // Coordinates at the resolution of the input image.
  pub pt: Vector2d,
  pub angle: f64,
  pub score: i32,
}

// Keypoint detection and description strategy injected into the tracker.
pub trait FeatureExtractor {
  fn detect_and_compute(&self, image: &Image) -> (Vec<Keypoint>, Vec<Descriptor>);
}

pub struct OrbExtractor {
  threshold: i16,
  max_features: usize,
  levels: usize,
  pattern: Vec<[i32; 4]>,
}

struct Candidate {
  level: usize,
  x: i32,
  y: i32,
  score: i32,
}

impl OrbExtractor {
  pub fn new(params: &TrackerParams) -> OrbExtractor {
    // BRIEF-style random sampling pattern, fixed for the lifetime of the
    // extractor so model and frame descriptors are comparable.
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(PATTERN_SEED);
    let pattern = (0..DESCRIPTOR_BITS)
      .map(|_| {
        [
          rng.gen_range(-PATTERN_RADIUS..=PATTERN_RADIUS),
          rng.gen_range(-PATTERN_RADIUS..=PATTERN_RADIUS),
          rng.gen_range(-PATTERN_RADIUS..=PATTERN_RADIUS),
          rng.gen_range(-PATTERN_RADIUS..=PATTERN_RADIUS),
        ]
      })
      .collect();
    OrbExtractor {
      threshold: params.fast_threshold,
      max_features: params.max_features,
      levels: usize::max(1, params.detector_levels),
      pattern,
    }
  }

  fn detect_level(&self, image: &Image, level: usize, candidates: &mut Vec<Candidate>) {
    let w = image.width as i32;
    let h = image.height as i32;
    let mut scores = vec![0i32; image.width * image.height];
    let mut corners = vec![];
    for y in EDGE_MARGIN..(h - EDGE_MARGIN) {
      for x in EDGE_MARGIN..(w - EDGE_MARGIN) {
        if let Some(score) = self.corner_score(image, x, y) {
          scores[y as usize * image.width + x as usize] = score;
          corners.push((x, y, score));
        }
      }
    }
    // 3x3 non-maximum suppression on the corner score.
    for (x, y, score) in corners {
      let mut is_max = true;
      'nms: for dy in -1..=1i32 {
        for dx in -1..=1i32 {
          if dx == 0 && dy == 0 { continue }
          if scores[(y + dy) as usize * image.width + (x + dx) as usize] > score {
            is_max = false;
            break 'nms;
          }
        }
      }
      if is_max {
        candidates.push(Candidate { level, x, y, score });
      }
    }
  }

  // FAST corner test; the score is the thresholded absolute difference
  // summed over the circle, for ranking and suppression.
  fn corner_score(&self, image: &Image, x: i32, y: i32) -> Option<i32> {
    let center = value(image, x, y);
    let darker = continuous(image, x, y, |v| v < center - self.threshold);
    if !darker && !continuous(image, x, y, |v| v > center + self.threshold) {
      return None;
    }
    let mut score = 0i32;
    for d in &CIRCLE {
      let diff = (value(image, x + d[0], y + d[1]) - center).abs() as i32;
      score += i32::max(0, diff - self.threshold as i32);
    }
    Some(score)
  }

  fn describe(&self, blurred: &Image, x: i32, y: i32, angle: f64) -> Descriptor {
    let (sin, cos) = angle.sin_cos();
    let rotate = |px: i32, py: i32| -> (i32, i32) {
      (
        (px as f64 * cos - py as f64 * sin).round() as i32,
        (px as f64 * sin + py as f64 * cos).round() as i32,
      )
    };
    let mut descriptor = [0u8; 32];
    for (i, pair) in self.pattern.iter().enumerate() {
      let (ax, ay) = rotate(pair[0], pair[1]);
      let (bx, by) = rotate(pair[2], pair[3]);
      let a = value(blurred, x + ax, y + ay);
      let b = value(blurred, x + bx, y + by);
      if a < b {
        descriptor[i >> 3] |= 1 << (i & 7);
      }
    }
    descriptor
  }
}

impl FeatureExtractor for OrbExtractor {
  fn detect_and_compute(&self, image: &Image) -> (Vec<Keypoint>, Vec<Descriptor>) {
    let min_dim = (2 * EDGE_MARGIN + 2) as usize;
    if image.width < min_dim || image.height < min_dim {
      return (vec![], vec![]);
    }
    let mut levels = vec![image.clone()];
    while levels.len() < self.levels {
      let next = pyr_down(levels.last().unwrap());
      if next.width < min_dim || next.height < min_dim { break }
      levels.push(next);
    }

    let mut candidates = vec![];
    for (level, level_image) in levels.iter().enumerate() {
      self.detect_level(level_image, level, &mut candidates);
    }
    candidates.sort_by(|a, b| b.score.cmp(&a.score));
    candidates.truncate(self.max_features);

    let blurred: Vec<Image> = levels.iter().map(box_blur3).collect();
    let mut keypoints = vec![];
    let mut descriptors = vec![];
    for c in &candidates {
      let angle = orientation(&levels[c.level], c.x, c.y);
      descriptors.push(self.describe(&blurred[c.level], c.x, c.y, angle));
      keypoints.push(Keypoint {
        pt: Vector2d::new((c.x << c.level) as f64, (c.y << c.level) as f64),
        angle,
        score: c.score,
      });
    }
    (keypoints, descriptors)
  }
}

fn continuous<F: Fn(i16) -> bool>(image: &Image, x: i32, y: i32, f: F) -> bool {
  // Quick rejection for 9 and 12 variants.
  if !f(value(image, x + CIRCLE_RADIUS, y)) && !f(value(image, x - CIRCLE_RADIUS, y)) {
    return false;
  }

  // The contiguous arc may wrap around the end of the table, so scan the
  // circle twice and stop at the first failure past the end.
  let mut n = 0;
  for i in 0..(2 * CIRCLE.len()) {
    let d = CIRCLE[i % CIRCLE.len()];
    if f(value(image, x + d[0], y + d[1])) {
      n += 1;
      if n >= FAST_VARIANT_N { return true }
    }
    else {
      n = 0;
      if i >= CIRCLE.len() { break }
    }
  }
  false
}

// Intensity centroid direction over a circular patch.
fn orientation(image: &Image, x: i32, y: i32) -> f64 {
  let mut m10 = 0i64;
  let mut m01 = 0i64;
  let r2 = ORIENTATION_RADIUS * ORIENTATION_RADIUS;
  for dy in -ORIENTATION_RADIUS..=ORIENTATION_RADIUS {
    for dx in -ORIENTATION_RADIUS..=ORIENTATION_RADIUS {
      if dx * dx + dy * dy > r2 { continue }
      let v = value(image, x + dx, y + dy) as i64;
      m10 += dx as i64 * v;
      m01 += dy as i64 * v;
    }
  }
  (m01 as f64).atan2(m10 as f64)
}

fn value(image: &Image, x: i32, y: i32) -> i16 {
  image.data[y as usize * image.width + x as usize] as i16
}

// Deterministic blocky texture with plenty of corners, shared by the
// tracker and pipeline tests.
#[cfg(test)]
pub fn test_texture(width: usize, height: usize, seed: u64) -> Image {
  let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
  let mut image = Image::new(width, height);
  image.data.iter_mut().for_each(|v| *v = 128);
  for _ in 0..(width * height / 200) {
    let bw = rng.gen_range(4..12);
    let bh = rng.gen_range(4..12);
    let bx = rng.gen_range(0..width.saturating_sub(bw));
    let by = rng.gen_range(0..height.saturating_sub(bh));
    let shade: u8 = if rng.gen_bool(0.5) { rng.gen_range(0..60) } else { rng.gen_range(200..=255) };
    for y in by..(by + bh) {
      for x in bx..(bx + bw) {
        image.set_value(x, y, shade);
      }
    }
  }
  image
}

#[cfg(test)]
mod tests {
  use super::*;

  fn extractor() -> OrbExtractor {
    OrbExtractor::new(&TrackerParams::default())
  }

  #[test]
  fn test_blank_image_has_no_features() {
    let image = Image::new(160, 120);
    let (keypoints, descriptors) = extractor().detect_and_compute(&image);
    assert!(keypoints.is_empty());
    assert!(descriptors.is_empty());
  }

  #[test]
  fn test_square_produces_corners() {
    let mut image = Image::new(96, 96);
    for y in 38..58 {
      for x in 38..58 {
        image.set_value(x, y, 255);
      }
    }
    let (keypoints, descriptors) = extractor().detect_and_compute(&image);
    assert_eq!(keypoints.len(), descriptors.len());
    assert!(!keypoints.is_empty());
    // Every detection is near one of the four square corners.
    for kp in &keypoints {
      let near_x = f64::min((kp.pt[0] - 38.).abs(), (kp.pt[0] - 57.).abs());
      let near_y = f64::min((kp.pt[1] - 38.).abs(), (kp.pt[1] - 57.).abs());
      assert!(near_x < 4. && near_y < 4., "stray detection at {:?}", kp.pt);
    }
  }

  #[test]
  fn test_translation_moves_keypoints() {
    let texture = test_texture(120, 100, 3);
    let mut frame_a = Image::new(220, 200);
    let mut frame_b = Image::new(220, 200);
    for y in 0..texture.height {
      for x in 0..texture.width {
        frame_a.set_value(x + 30, y + 40, texture.value(x, y));
        frame_b.set_value(x + 41, y + 47, texture.value(x, y));
      }
    }
    let e = extractor();
    let (kps_a, descs_a) = e.detect_and_compute(&frame_a);
    let (kps_b, descs_b) = e.detect_and_compute(&frame_b);
    assert!(kps_a.len() >= 20);

    // For most keypoints in A there is a B keypoint at the translated
    // location with a nearly identical descriptor.
    let shift = Vector2d::new(11., 7.);
    let mut stable = 0;
    for (ka, da) in kps_a.iter().zip(descs_a.iter()) {
      for (kb, db) in kps_b.iter().zip(descs_b.iter()) {
        if (ka.pt + shift - kb.pt).norm() < 1.5 && hamming_distance(da, db) < 40 {
          stable += 1;
          break;
        }
      }
    }
    assert!(stable * 2 >= kps_a.len(), "only {} of {} stable", stable, kps_a.len());
  }
}
