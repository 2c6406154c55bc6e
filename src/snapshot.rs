//! Still snapshots
//!
//! Renders a single frame of a surface and saves it as a PNG.

use crate::capture::FrameRenderer;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use thiserror::Error;

/// Snapshot errors
#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("PNG encoding error: {0}")]
    Encoding(#[from] png::EncodingError),

    #[error("Invalid snapshot size: {0}x{1}")]
    InvalidSize(u32, u32),
}

/// Render frame `frame` of `renderer` and write it to `path` as RGBA PNG
pub fn save_snapshot(
    renderer: &mut dyn FrameRenderer,
    width: u32,
    height: u32,
    frame: u64,
    path: &Path,
) -> Result<(), SnapshotError> {
    if width == 0 || height == 0 {
        return Err(SnapshotError::InvalidSize(width, height));
    }

    let mut rgba = vec![0u8; width as usize * height as usize * 4];
    renderer.render(frame, width, height, &mut rgba);

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let file = File::create(path)?;
    let mut encoder = png::Encoder::new(BufWriter::new(file), width, height);
    encoder.set_color(png::ColorType::Rgba);
    encoder.set_depth(png::BitDepth::Eight);

    let mut writer = encoder.write_header()?;
    writer.write_image_data(&rgba)?;
    writer.finish()?;

    tracing::info!("Saved {}x{} snapshot to {:?}", width, height, path);
    Ok(())
}
