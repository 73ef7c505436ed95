use crate::all::*;

use serde::Deserialize;

// Serde mirror of the task_data.json document.
#[derive(Debug, Deserialize)]
struct RawShape {
  x_len: i64,
  y_len: i64,
}

#[derive(Debug, Deserialize)]
struct RawPoint {
  x: f64,
  y: f64,
}

#[derive(Debug, Deserialize)]
struct RawQuad {
  top_left: RawPoint,
  bottom_left: RawPoint,
  bottom_right: RawPoint,
  top_right: RawPoint,
}

#[derive(Debug, Deserialize)]
struct RawTask {
  target_image_shape: RawShape,
  input_video_shape: RawShape,
  reference_frame_id: i64,
  object_coord_in_ref_frame: RawQuad,
}

// Immutable run configuration.
#[derive(Debug, Clone)]
pub struct TaskDescriptor {
  pub target_shape: Shape,
  pub input_video_shape: Shape,
  pub reference_frame_id: usize,
  pub object_quad: Quad,
}

fn shape_from_raw(raw: &RawShape, name: &str) -> Result<Shape> {
  if raw.x_len <= 0 || raw.y_len <= 0 {
    bail!(FatalError::Config(format!("{} must have positive dimensions", name)));
  }
  Ok(Shape::new(raw.x_len as usize, raw.y_len as usize))
}

fn point_from_raw(raw: &RawPoint) -> Vector2d {
  Vector2d::new(raw.x, raw.y)
}

impl TaskDescriptor {
  fn from_raw(raw: RawTask) -> Result<TaskDescriptor> {
    if raw.reference_frame_id < 0 {
      bail!(FatalError::Config("reference_frame_id must be non-negative".to_string()));
    }
    let q = &raw.object_coord_in_ref_frame;
    Ok(TaskDescriptor {
      target_shape: shape_from_raw(&raw.target_image_shape, "target_image_shape")?,
      input_video_shape: shape_from_raw(&raw.input_video_shape, "input_video_shape")?,
      reference_frame_id: raw.reference_frame_id as usize,
      object_quad: Quad::new(
        point_from_raw(&q.top_left),
        point_from_raw(&q.bottom_left),
        point_from_raw(&q.bottom_right),
        point_from_raw(&q.top_right),
      ),
    })
  }

  pub fn parse(text: &str) -> Result<TaskDescriptor> {
    let raw: RawTask = serde_json::from_str(text)
      .map_err(|err| FatalError::Config(err.to_string()))?;
    TaskDescriptor::from_raw(raw)
  }

  pub fn load(path: &Path) -> Result<TaskDescriptor> {
    let text = std::fs::read_to_string(path)
      .context(format!("Failed to read task data file {}.", path.display()))?;
    let task = TaskDescriptor::parse(&text)?;
    debug!("Task data:");
    debug!("  target_image_shape = {:?}", task.target_shape);
    debug!("  input_video_shape = {:?}", task.input_video_shape);
    debug!("  reference_frame_id = {}", task.reference_frame_id);
    debug!("  object_coord_in_ref_frame = {:?}", task.object_quad.points);
    Ok(task)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const GOOD: &str = r#"{
    "target_image_shape": { "x_len": 600, "y_len": 800 },
    "input_video_shape": { "x_len": 640, "y_len": 480 },
    "reference_frame_id": 2,
    "object_coord_in_ref_frame": {
      "top_left": { "x": 100.5, "y": 50.0 },
      "bottom_left": { "x": 98.0, "y": 400.0 },
      "bottom_right": { "x": 500.0, "y": 410.0 },
      "top_right": { "x": 505.0, "y": 45.0 }
    }
  }"#;

  fn is_config_error(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| matches!(
      cause.downcast_ref::<FatalError>(),
      Some(FatalError::Config(_))
    ))
  }

  #[test]
  fn test_parse_valid() {
    let task = TaskDescriptor::parse(GOOD).unwrap();
    assert_eq!(task.target_shape, Shape::new(600, 800));
    assert_eq!(task.input_video_shape, Shape::new(640, 480));
    assert_eq!(task.reference_frame_id, 2);
    assert_eq!(task.object_quad.tl(), Vector2d::new(100.5, 50.0));
    assert_eq!(task.object_quad.tr(), Vector2d::new(505.0, 45.0));
  }

  #[test]
  fn test_missing_field_is_config_error() {
    let text = GOOD.replace("\"reference_frame_id\": 2,", "");
    let err = TaskDescriptor::parse(&text).unwrap_err();
    assert!(is_config_error(&err));
  }

  #[test]
  fn test_missing_corner_is_config_error() {
    let text = GOOD.replace("top_right", "upper_right");
    assert!(is_config_error(&TaskDescriptor::parse(&text).unwrap_err()));
  }

  #[test]
  fn test_nonpositive_shape_is_config_error() {
    let text = GOOD.replace("\"x_len\": 600", "\"x_len\": 0");
    assert!(is_config_error(&TaskDescriptor::parse(&text).unwrap_err()));
  }

  #[test]
  fn test_negative_reference_id_is_config_error() {
    let text = GOOD.replace("\"reference_frame_id\": 2", "\"reference_frame_id\": -1");
    assert!(is_config_error(&TaskDescriptor::parse(&text).unwrap_err()));
  }
}
