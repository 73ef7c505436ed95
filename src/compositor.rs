use crate::all::*;

// Warps accepted frames into the target coordinate frame and merges them
// into the accumulation canvas. The merge is a deliberately naive masked
// overwrite: the last accepted frame wins wherever its mask covers.
pub struct Compositor {
  target: Shape,
  target_quad: Quad,
  canvas: ImageF32,
  scratch: ImageF32,
  mask: Vec<bool>,
}

impl Compositor {
  pub fn new(target: Shape) -> Compositor {
    Compositor {
      target,
      target_quad: Quad::corners_of(target),
      canvas: ImageF32::new(target.width, target.height),
      scratch: ImageF32::new(target.width, target.height),
      mask: vec![false; target.width * target.height],
    }
  }

  pub fn canvas(&self) -> &ImageF32 {
    &self.canvas
  }

  // One-time initialization: rectify the reference frame into the canvas
  // (full overwrite) and hand back the canonical image the tracker model is
  // trained on.
  pub fn init_reference(&mut self, frame: &Image, object_quad: &Quad) -> Result<Image> {
    let h = homography_from_quads(object_quad, &self.target_quad)
      .ok_or_else(|| FatalError::Config("degenerate object quadrilateral".to_string()))?;
    let h_inv = h.try_inverse()
      .ok_or_else(|| FatalError::Config("object quadrilateral is not invertible".to_string()))?;
    warp_into(frame, &h_inv, &mut self.canvas);
    Ok(self.canvas.to_u8())
  }

  // Merge one accepted frame. The mask is the full source frame boundary
  // projected into target space, so content outside the tracked
  // quadrilateral can still overwrite canvas regions it covers.
  pub fn update(&mut self, frame: &Image, quad: &Quad) -> Result<()> {
    let h = homography_from_quads(quad, &self.target_quad)
      .ok_or_else(|| anyhow!("Degenerate tracked quadrilateral."))?;
    let frame_quad = Quad::corners_of(Shape::new(frame.width, frame.height));
    let projected = frame_quad.transform(&h)
      .ok_or_else(|| anyhow!("Frame boundary projects to infinity."))?;

    self.mask.iter_mut().for_each(|m| *m = false);
    let corners = [
      from_f64(&projected.tl()),
      from_f64(&projected.bl()),
      from_f64(&projected.br()),
      from_f64(&projected.tr()),
    ];
    fill_polygon(&corners, self.target, &mut self.mask);

    let h_inv = h.try_inverse()
      .ok_or_else(|| anyhow!("Tracked quadrilateral homography is not invertible."))?;
    warp_into(frame, &h_inv, &mut self.scratch);
    for (i, masked) in self.mask.iter().enumerate() {
      if *masked {
        self.canvas.data[i] = self.scratch.data[i];
      }
    }
    Ok(())
  }

  // The canvas is emitted verbatim; conversion is round and clamp.
  pub fn finalize(&self) -> Image {
    self.canvas.to_u8()
  }
}

// Inverse-mapped perspective warp with bilinear sampling. Target pixels
// that map outside the source are zero.
fn warp_into(source: &Image, h_inv: &Matrix3d, out: &mut ImageF32) {
  let max_x = source.width as f64 - 1.;
  let max_y = source.height as f64 - 1.;
  for y in 0..out.height {
    for x in 0..out.width {
      let p = project(h_inv, Vector2d::new(x as f64, y as f64));
      let value = match p {
        Some(q) if q[0] >= 0. && q[0] <= max_x && q[1] >= 0. && q[1] <= max_y => {
          bilinear(source, q[0], q[1]) as f32
        },
        _ => 0.,
      };
      out.set_value(x, y, value);
    }
  }
}

// Even-odd scanline rasterization of a polygon over integer corners, the
// way fillPoly treats an int32 contour.
fn fill_polygon(corners: &[Vector2i], shape: Shape, mask: &mut [bool]) {
  let mut crossings: Vec<f64> = vec![];
  for y in 0..shape.height as i32 {
    crossings.clear();
    for i in 0..corners.len() {
      let a = corners[i];
      let b = corners[(i + 1) % corners.len()];
      if a[1] == b[1] { continue }
      let (lo, hi) = if a[1] < b[1] { (a, b) } else { (b, a) };
      // Half-open span so shared vertices are counted once.
      if y < lo[1] || y >= hi[1] { continue }
      let t = (y - lo[1]) as f64 / (hi[1] - lo[1]) as f64;
      crossings.push(lo[0] as f64 + t * (hi[0] - lo[0]) as f64);
    }
    crossings.sort_by(|p, q| p.partial_cmp(q).unwrap());
    for pair in crossings.chunks(2) {
      if pair.len() < 2 { break }
      let start = i32::max(pair[0].ceil() as i32, 0);
      let end = i32::min(pair[1].floor() as i32, shape.width as i32 - 1);
      for x in start..=end {
        mask[y as usize * shape.width + x as usize] = true;
      }
    }
  }
}
