use crate::all::*;

// Final canvas emission, the only file the run persists.
pub fn write_image(result: &Image, path: &Path) -> Result<()> {
  let out = ::image::GrayImage::from_raw(
    result.width as u32,
    result.height as u32,
    result.data.clone(),
  ).ok_or_else(|| anyhow!("Output buffer does not match its dimensions."))?;
  out.save(path)
    .context(format!("Failed to write output image {}.", path.display()))?;
  Ok(())
}
