use crate::all::*;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Shape {
  pub width: usize,
  pub height: usize,
}

impl Shape {
  pub fn new(width: usize, height: usize) -> Shape {
    Shape { width, height }
  }
}

// Ordered 4-point polygon. The order (TL, BL, BR, TR) is fixed and
// semantically meaningful; nothing reorders it implicitly.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Quad {
  pub points: [Vector2d; 4],
}

impl Quad {
  pub fn new(tl: Vector2d, bl: Vector2d, br: Vector2d, tr: Vector2d) -> Quad {
    Quad { points: [tl, bl, br, tr] }
  }

  pub fn tl(&self) -> Vector2d { self.points[0] }
  pub fn bl(&self) -> Vector2d { self.points[1] }
  pub fn br(&self) -> Vector2d { self.points[2] }
  pub fn tr(&self) -> Vector2d { self.points[3] }

  // The full raster extent, (0,0) .. (w-1,h-1).
  pub fn corners_of(shape: Shape) -> Quad {
    let w = shape.width as f64;
    let h = shape.height as f64;
    Quad::new(
      Vector2d::new(0., 0.),
      Vector2d::new(0., h - 1.),
      Vector2d::new(w - 1., h - 1.),
      Vector2d::new(w - 1., 0.),
    )
  }

  // Raster corners with the one pixel inset used for the model
  // quadrilateral, to keep matched structure off the image boundary.
  pub fn inset_corners_of(shape: Shape) -> Quad {
    let w = shape.width as f64;
    let h = shape.height as f64;
    Quad::new(
      Vector2d::new(1., 1.),
      Vector2d::new(1., h),
      Vector2d::new(w, h),
      Vector2d::new(w, 1.),
    )
  }

  // Project all corners through a homography. None when any corner maps
  // close to the plane at infinity.
  pub fn transform(&self, h: &Matrix3d) -> Option<Quad> {
    let mut points = [Vector2d::zeros(); 4];
    for (i, p) in self.points.iter().enumerate() {
      points[i] = project(h, *p)?;
    }
    Some(Quad { points })
  }

  pub fn scale(&self, factor: f64) -> Quad {
    let mut points = self.points;
    for p in &mut points {
      *p *= factor;
    }
    Quad { points }
  }
}

// Apply a homography to a point.
pub fn project(h: &Matrix3d, p: Vector2d) -> Option<Vector2d> {
  let w = h[(2, 0)] * p[0] + h[(2, 1)] * p[1] + h[(2, 2)];
  if w.abs() < 1e-10 { return None }
  Some(Vector2d::new(
    (h[(0, 0)] * p[0] + h[(0, 1)] * p[1] + h[(0, 2)]) / w,
    (h[(1, 0)] * p[0] + h[(1, 1)] * p[1] + h[(1, 2)]) / w,
  ))
}

// Similarity transform moving the centroid to the origin and the mean
// distance to sqrt(2), for DLT conditioning.
fn normalizing_transform(points: &[Vector2d]) -> Option<Matrix3d> {
  let n = points.len() as f64;
  let centroid = points.iter().fold(Vector2d::zeros(), |acc, p| acc + p) / n;
  let mean_dist = points.iter().map(|p| (p - centroid).norm()).sum::<f64>() / n;
  if mean_dist < 1e-12 { return None }
  let s = f64::sqrt(2.) / mean_dist;
  Some(Matrix3d::new(
    s, 0., -s * centroid[0],
    0., s, -s * centroid[1],
    0., 0., 1.,
  ))
}

// Direct linear transform estimate of the homography with src[i] mapping to
// dst[i]. Works for the minimal 4-point case and in the least-squares sense
// for more. None for degenerate configurations.
pub fn compute_homography(src: &[Vector2d], dst: &[Vector2d]) -> Option<Matrix3d> {
  assert_eq!(src.len(), dst.len());
  if src.len() < 4 { return None }

  let t_src = normalizing_transform(src)?;
  let t_dst = normalizing_transform(dst)?;

  // Accumulate A^T A of the 2n x 9 DLT system; its eigenvector for the
  // smallest eigenvalue is the stacked homography.
  let mut ata = nalgebra::SMatrix::<f64, 9, 9>::zeros();
  let mut add_row = |row: [f64; 9]| {
    for i in 0..9 {
      for j in 0..9 {
        ata[(i, j)] += row[i] * row[j];
      }
    }
  };
  for (p, q) in src.iter().zip(dst.iter()) {
    let p = project(&t_src, *p)?;
    let q = project(&t_dst, *q)?;
    let (x, y) = (p[0], p[1]);
    let (u, v) = (q[0], q[1]);
    add_row([-x, -y, -1., 0., 0., 0., u * x, u * y, u]);
    add_row([0., 0., 0., -x, -y, -1., v * x, v * y, v]);
  }

  let eigen = nalgebra::SymmetricEigen::new(ata);
  let mut min_index = 0;
  for i in 1..9 {
    if eigen.eigenvalues[i] < eigen.eigenvalues[min_index] {
      min_index = i;
    }
  }
  // A unique solution has exactly one vanishing eigenvalue. A second one
  // means the points are degenerate (e.g. collinear).
  let mut sorted: Vec<f64> = eigen.eigenvalues.iter().copied().collect();
  sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
  if sorted[1] < 1e-9 * sorted[8] { return None }
  let hv = eigen.eigenvectors.column(min_index);
  let hn = Matrix3d::new(
    hv[0], hv[1], hv[2],
    hv[3], hv[4], hv[5],
    hv[6], hv[7], hv[8],
  );

  let h = t_dst.try_inverse()? * hn * t_src;
  if h[(2, 2)].abs() < 1e-12 { return None }
  let h = h / h[(2, 2)];
  if h.iter().any(|v| !v.is_finite()) { return None }
  Some(h)
}

pub fn homography_from_quads(src: &Quad, dst: &Quad) -> Option<Matrix3d> {
  compute_homography(&src.points, &dst.points)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn assert_point_near(a: Vector2d, b: Vector2d, tol: f64) {
    assert!((a - b).norm() < tol, "{:?} vs {:?}", a, b);
  }

  #[test]
  fn test_translation_homography() {
    let src = Quad::corners_of(Shape::new(100, 100));
    let dst = src.transform(&Matrix3d::new(
      1., 0., 10.,
      0., 1., 20.,
      0., 0., 1.,
    )).unwrap();
    let h = homography_from_quads(&src, &dst).unwrap();
    assert!((h[(0, 2)] - 10.).abs() < 1e-6);
    assert!((h[(1, 2)] - 20.).abs() < 1e-6);
    let p = project(&h, Vector2d::new(42., 17.)).unwrap();
    assert_point_near(p, Vector2d::new(52., 37.), 1e-6);
  }

  #[test]
  fn test_projective_recovery() {
    // A proper projective transform, not an affinity.
    let truth = Matrix3d::new(
      0.9, 0.1, 5.,
      -0.05, 1.1, -3.,
      1e-4, -2e-4, 1.,
    );
    let src: Vec<Vector2d> = vec![
      Vector2d::new(0., 0.),
      Vector2d::new(0., 200.),
      Vector2d::new(300., 200.),
      Vector2d::new(300., 0.),
    ];
    let dst: Vec<Vector2d> = src.iter().map(|p| project(&truth, *p).unwrap()).collect();
    let h = compute_homography(&src, &dst).unwrap();
    // Same action on a point not used for the fit.
    let q = Vector2d::new(150., 100.);
    assert_point_near(project(&h, q).unwrap(), project(&truth, q).unwrap(), 1e-6);
  }

  #[test]
  fn test_degenerate_input_is_none() {
    // Four coincident points collapse the normalization.
    let same = vec![Vector2d::new(5., 5.); 4];
    assert!(compute_homography(&same, &same).is_none());
    // Collinear points leave the solution non-unique.
    let line: Vec<Vector2d> = (0..4).map(|i| Vector2d::new(i as f64, i as f64)).collect();
    assert!(compute_homography(&line, &line.clone()).is_none());
    // Fewer than four correspondences cannot define a homography.
    let src: Vec<Vector2d> = (0..3).map(|i| Vector2d::new(i as f64, 0.)).collect();
    assert!(compute_homography(&src, &src.clone()).is_none());
  }

  #[test]
  fn test_quad_order_is_preserved() {
    let shape = Shape::new(60, 80);
    let quad = Quad::corners_of(shape);
    assert_eq!(quad.tl(), Vector2d::new(0., 0.));
    assert_eq!(quad.bl(), Vector2d::new(0., 79.));
    assert_eq!(quad.br(), Vector2d::new(59., 79.));
    assert_eq!(quad.tr(), Vector2d::new(59., 0.));
    let inset = Quad::inset_corners_of(shape);
    assert_eq!(inset.tl(), Vector2d::new(1., 1.));
    assert_eq!(inset.br(), Vector2d::new(60., 80.));
  }
}
