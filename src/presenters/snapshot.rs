// SPDX-License-Identifier: GPL-3.0-only

//! PNG snapshots of composed frames
//!
//! Files are encoded in memory, written next to the destination and renamed
//! into place, so a reader never opens a half-written image.

use std::path::{Path, PathBuf};

use image::ImageEncoder;
use image::codecs::png::PngEncoder;
use tracing::{debug, info};

use super::{FrameView, Presenter};
use crate::errors::PresentResult;

/// Encode a frame as PNG, rows top-down
pub fn encode_png(frame: FrameView<'_>) -> PresentResult<Vec<u8>> {
    frame.validate()?;

    // The color buffer is bottom-up; image files are top-down
    let row_bytes = frame.geometry.width as usize * 4;
    let mut rgba = Vec::with_capacity(row_bytes * frame.geometry.height as usize);
    for row in frame.color.rows_top_down(frame.geometry) {
        rgba.extend_from_slice(bytemuck::cast_slice(row));
    }

    let mut buffer = Vec::new();
    let encoder = PngEncoder::new(std::io::Cursor::new(&mut buffer));
    encoder.write_image(
        &rgba,
        frame.geometry.width,
        frame.geometry.height,
        image::ExtendedColorType::Rgba8,
    )?;
    Ok(buffer)
}

/// Write `bytes` to `path` through a temporary sibling file
fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }

    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".part");
    let tmp_path = path.with_file_name(tmp_name);

    std::fs::write(&tmp_path, bytes)?;
    std::fs::rename(&tmp_path, path)
}

/// Save one frame as a PNG file
pub fn save_png(path: &Path, frame: FrameView<'_>) -> PresentResult<()> {
    let bytes = encode_png(frame)?;
    write_atomic(path, &bytes)?;
    info!(path = %path.display(), sequence = frame.sequence, "Snapshot saved");
    Ok(())
}

/// Timestamped snapshot path inside `dir`
pub fn snapshot_path(dir: &Path) -> PathBuf {
    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S%.3f");
    dir.join(format!("DEPTH_{}.png", timestamp))
}

/// Presenter that keeps one PNG file up to date with the latest frame
#[derive(Debug)]
pub struct PngPresenter {
    path: PathBuf,
    written: u64,
}

impl PngPresenter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            written: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Frames written so far
    pub fn written(&self) -> u64 {
        self.written
    }
}

impl Presenter for PngPresenter {
    fn present(&mut self, frame: FrameView<'_>) -> PresentResult<()> {
        let bytes = encode_png(frame)?;
        write_atomic(&self.path, &bytes)?;
        self.written += 1;
        debug!(path = %self.path.display(), sequence = frame.sequence, "Frame written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::sensor::FrameGeometry;
    use crate::pipelines::depth::{RoiConfig, ZoneStats, compose};

    #[test]
    fn test_png_is_top_down() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.png");

        // Top source row is near (red), bottom row is background
        let geometry = FrameGeometry::new(2, 2);
        let color = compose(&[1200, 1200, 3000, 3000], geometry, &RoiConfig::default());
        let stats = ZoneStats::default();
        save_png(
            &path,
            FrameView {
                color: &color,
                geometry,
                stats: &stats,
                sequence: 1,
            },
        )
        .unwrap();

        let image = image::open(&path).unwrap().to_rgba8();
        assert_eq!(image.dimensions(), (2, 2));
        assert_eq!(image.get_pixel(0, 0).0, [255, 0, 0, 255]);
        assert_eq!(image.get_pixel(1, 1).0, [0, 0, 0, 255]);
    }

    #[test]
    fn test_presenter_overwrites_without_leftovers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("live.png");
        let geometry = FrameGeometry::new(1, 1);
        let stats = ZoneStats::default();
        let mut presenter = PngPresenter::new(&path);

        for depth in [1200u16, 1600] {
            let color = compose(&[depth], geometry, &RoiConfig::default());
            presenter
                .present(FrameView {
                    color: &color,
                    geometry,
                    stats: &stats,
                    sequence: u64::from(depth),
                })
                .unwrap();
        }

        assert_eq!(presenter.written(), 2);
        let image = image::open(&path).unwrap().to_rgba8();
        assert_eq!(image.get_pixel(0, 0).0, [0, 255, 0, 255]);
        let entries = std::fs::read_dir(path.parent().unwrap()).unwrap().count();
        assert_eq!(entries, 1, "temporary file left behind");
    }

    #[test]
    fn test_snapshot_path_in_dir() {
        let path = snapshot_path(Path::new("/tmp/shots"));
        assert_eq!(path.parent(), Some(Path::new("/tmp/shots")));
        assert!(path.to_string_lossy().ends_with(".png"));
    }
}
