use crate::all::*;

use rand::Rng;
use rand_xoshiro::Xoshiro256PlusPlus;

pub struct RansacResult {
  pub homography: Matrix3d,
  pub inliers: Vec<bool>,
  pub inlier_count: usize,
}

fn count_inliers(
  h: &Matrix3d,
  src: &[Vector2d],
  dst: &[Vector2d],
  threshold: f64,
  inliers: &mut [bool],
) -> usize {
  let t2 = threshold * threshold;
  let mut count = 0;
  for i in 0..src.len() {
    inliers[i] = match project(h, src[i]) {
      Some(p) => (p - dst[i]).norm_squared() < t2,
      None => false,
    };
    if inliers[i] { count += 1 }
  }
  count
}

// Robust homography estimation mapping src[i] -> dst[i]. Random minimal
// samples are scored by reprojection distance; the best consensus set is
// refit in the least-squares sense before returning.
pub fn ransac_homography(
  src: &[Vector2d],
  dst: &[Vector2d],
  threshold: f64,
  iterations: usize,
  rng: &mut Xoshiro256PlusPlus,
) -> Option<RansacResult> {
  assert_eq!(src.len(), dst.len());
  let n = src.len();
  if n < 4 { return None }

  let mut best_h: Option<Matrix3d> = None;
  let mut best_count = 0;
  let mut inliers = vec![false; n];

  for _ in 0..iterations {
    // Four distinct sample indices.
    let mut indices = [0usize; 4];
    let mut slot = 0;
    while slot < indices.len() {
      let candidate = rng.gen_range(0..n);
      if !indices[..slot].contains(&candidate) {
        indices[slot] = candidate;
        slot += 1;
      }
    }
    let sample_src: Vec<Vector2d> = indices.iter().map(|i| src[*i]).collect();
    let sample_dst: Vec<Vector2d> = indices.iter().map(|i| dst[*i]).collect();
    let h = match compute_homography(&sample_src, &sample_dst) {
      Some(h) => h,
      None => continue,
    };
    let count = count_inliers(&h, src, dst, threshold, &mut inliers);
    if count > best_count {
      best_count = count;
      best_h = Some(h);
    }
  }

  let mut h = best_h?;
  // Recover the winning consensus set and refit over all of it.
  count_inliers(&h, src, dst, threshold, &mut inliers);
  let inlier_src: Vec<Vector2d> = (0..n).filter(|i| inliers[*i]).map(|i| src[i]).collect();
  let inlier_dst: Vec<Vector2d> = (0..n).filter(|i| inliers[*i]).map(|i| dst[i]).collect();
  if let Some(refit) = compute_homography(&inlier_src, &inlier_dst) {
    h = refit;
  }
  let inlier_count = count_inliers(&h, src, dst, threshold, &mut inliers);
  Some(RansacResult {
    homography: h,
    inliers,
    inlier_count,
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use rand::SeedableRng;

  fn rng() -> Xoshiro256PlusPlus {
    Xoshiro256PlusPlus::seed_from_u64(7)
  }

  #[test]
  fn test_rejects_small_input() {
    let pts = vec![Vector2d::new(0., 0.); 3];
    assert!(ransac_homography(&pts, &pts.clone(), 3.0, 100, &mut rng()).is_none());
  }

  #[test]
  fn test_translation_with_outliers() {
    let mut r = rng();
    let mut src = vec![];
    let mut dst = vec![];
    // 40 exact inliers under a pure translation.
    for _ in 0..40 {
      let p = Vector2d::new(r.gen_range(0.0..300.0), r.gen_range(0.0..200.0));
      src.push(p);
      dst.push(p + Vector2d::new(25., -13.));
    }
    // 20 gross outliers.
    for _ in 0..20 {
      src.push(Vector2d::new(r.gen_range(0.0..300.0), r.gen_range(0.0..200.0)));
      dst.push(Vector2d::new(r.gen_range(0.0..300.0), r.gen_range(0.0..200.0)));
    }
    let result = ransac_homography(&src, &dst, 3.0, 512, &mut r).unwrap();
    assert!(result.inlier_count >= 40, "inliers {}", result.inlier_count);
    assert!(result.inliers[..40].iter().all(|x| *x));
    let h = result.homography;
    assert!((h[(0, 2)] - 25.).abs() < 0.1);
    assert!((h[(1, 2)] + 13.).abs() < 0.1);
  }

  #[test]
  fn test_uncorrelated_points_have_low_consensus() {
    let mut r = rng();
    let mut src = vec![];
    let mut dst = vec![];
    for _ in 0..60 {
      src.push(Vector2d::new(r.gen_range(0.0..640.0), r.gen_range(0.0..480.0)));
      dst.push(Vector2d::new(r.gen_range(0.0..640.0), r.gen_range(0.0..480.0)));
    }
    // Any homography fits random scatter poorly; the consensus stays far
    // below a min-matches style acceptance bar.
    if let Some(result) = ransac_homography(&src, &dst, 3.0, 512, &mut r) {
      assert!(result.inlier_count < 15, "inliers {}", result.inlier_count);
    }
  }
}
