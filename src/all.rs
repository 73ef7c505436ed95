// NOTE This kind of import-all file isn't a common Rust idiom.

pub use crate::{
  compositor::*,
  detector::*,
  errors::*,
  geometry::*,
  homography::*,
  image::*,
  matcher::*,
  params::*,
  pipeline::*,
  task::*,
  tracker::*,
  types::*,
  util::*,
  video::*,
  visualize::*,
};

pub use {
  std::{
    path::{Path, PathBuf},
    sync::{
      atomic::{AtomicBool, Ordering},
      Arc,
    },
  },
  log::{debug, error, info, warn, LevelFilter},
  anyhow::{anyhow, bail, Context as AnyhowContext, Result},
};
