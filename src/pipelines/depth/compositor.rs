// SPDX-License-Identifier: GPL-3.0-only

//! Frame composition: depth buffer to color buffer
//!
//! Depth sensors deliver rows top-to-bottom (origin top-left) while the
//! rendering surfaces expect rows bottom-to-top (origin bottom-left). The two
//! coordinate systems agree horizontally, so composing is a vertical flip:
//!
//! ```text
//! src = y * W + x
//! dst = (H - y - 1) * W + x
//! ```
//!
//! Each destination index is derived from exactly one source index, and every
//! destination index is written on each pass.

use super::classifier::{Category, RoiConfig};
use super::color::Rgba8;
use crate::backends::sensor::FrameGeometry;

/// Destination index of source pixel `(x, y)` after the vertical flip
///
/// `(x, y)` must lie inside `geometry`.
#[inline]
pub fn destination_index(geometry: FrameGeometry, x: u32, y: u32) -> usize {
    debug_assert!(
        x < geometry.width && y < geometry.height,
        "pixel ({x}, {y}) outside {geometry}"
    );
    let width = geometry.width as usize;
    (geometry.height - y - 1) as usize * width + x as usize
}

/// Row-major RGBA buffer with bottom-left origin
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColorBuffer {
    pixels: Vec<Rgba8>,
}

impl ColorBuffer {
    /// Buffer for `geometry`, initialised to transparent black
    pub fn new(geometry: FrameGeometry) -> Self {
        Self {
            pixels: vec![Rgba8::TRANSPARENT; geometry.pixel_count()],
        }
    }

    pub fn len(&self) -> usize {
        self.pixels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    pub fn pixels(&self) -> &[Rgba8] {
        &self.pixels
    }

    /// Pixel at `(x, y)` in surface coordinates (origin bottom-left)
    pub fn get(&self, geometry: FrameGeometry, x: u32, y: u32) -> Option<Rgba8> {
        if x >= geometry.width || y >= geometry.height {
            return None;
        }
        self.pixels
            .get(y as usize * geometry.width as usize + x as usize)
            .copied()
    }

    /// Overwrite with `other`, reusing this buffer's allocation
    pub fn copy_from(&mut self, other: &ColorBuffer) {
        self.pixels.clear();
        self.pixels.extend_from_slice(&other.pixels);
    }

    /// Rows in display order (top row first)
    ///
    /// The buffer stores the bottom row first, so this walks it backwards.
    pub fn rows_top_down(&self, geometry: FrameGeometry) -> impl Iterator<Item = &[Rgba8]> {
        let width = (geometry.width as usize).max(1);
        self.pixels.chunks_exact(width).rev()
    }

    /// Resize to `geometry`, keeping the allocation when the size already fits
    fn ensure_size(&mut self, geometry: FrameGeometry) {
        let len = geometry.pixel_count();
        if self.pixels.len() != len {
            self.pixels.resize(len, Rgba8::TRANSPARENT);
        }
    }
}

/// Pixel counts per category for one composed frame
///
/// Cheap presence readout: how much of the view each zone covers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ZoneStats {
    pub invalid: usize,
    pub background: usize,
    /// One counter per ROI band, in band order
    pub zones: Vec<usize>,
}

impl ZoneStats {
    fn reset(&mut self, zone_count: usize) {
        self.invalid = 0;
        self.background = 0;
        self.zones.clear();
        self.zones.resize(zone_count, 0);
    }

    #[inline]
    fn record(&mut self, category: Category) {
        match category {
            Category::Invalid => self.invalid += 1,
            Category::Background => self.background += 1,
            Category::Roi(i) => {
                if let Some(count) = self.zones.get_mut(i) {
                    *count += 1;
                }
            }
        }
    }

    pub fn total(&self) -> usize {
        self.invalid + self.background + self.zones.iter().sum::<usize>()
    }

    /// Fraction of the frame covered by zone `index` (0.0 - 1.0)
    pub fn zone_fraction(&self, index: usize) -> f32 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        self.zones.get(index).copied().unwrap_or(0) as f32 / total as f32
    }
}

/// Classify `depth` and write the flipped result into `out`
///
/// `depth` must hold exactly `geometry.pixel_count()` samples. `out` is
/// resized on first use and reused afterwards; `stats` is refilled with the
/// frame's per-zone pixel counts.
pub fn compose_into(
    depth: &[u16],
    geometry: FrameGeometry,
    rois: &RoiConfig,
    out: &mut ColorBuffer,
    stats: &mut ZoneStats,
) {
    let width = geometry.width as usize;
    let height = geometry.height as usize;
    debug_assert_eq!(depth.len(), width * height);

    out.ensure_size(geometry);
    stats.reset(rois.len());

    if width == 0 {
        return;
    }

    // Source row y lands on destination row H - y - 1
    for (y, src_row) in depth.chunks_exact(width).take(height).enumerate() {
        let dst_start = (height - y - 1) * width;
        let dst_row = &mut out.pixels[dst_start..dst_start + width];

        for (dst, &sample) in dst_row.iter_mut().zip(src_row) {
            let category = rois.classify(sample);
            stats.record(category);
            *dst = rois.color_of(category);
        }
    }
}

/// Allocating variant of [`compose_into`]
pub fn compose(depth: &[u16], geometry: FrameGeometry, rois: &RoiConfig) -> ColorBuffer {
    let mut out = ColorBuffer::new(geometry);
    let mut stats = ZoneStats::default();
    compose_into(depth, geometry, rois, &mut out, &mut stats);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipelines::depth::RoiBand;

    fn geometry(width: u32, height: u32) -> FrameGeometry {
        FrameGeometry::new(width, height)
    }

    #[test]
    fn test_destination_index_is_a_bijection() {
        let g = geometry(7, 5);
        let mut seen = vec![0u32; g.pixel_count()];
        for y in 0..g.height {
            for x in 0..g.width {
                seen[destination_index(g, x, y)] += 1;
            }
        }
        assert!(seen.iter().all(|&count| count == 1));
    }

    #[test]
    fn test_vertical_flip_corners() {
        let g = geometry(4, 3);
        // (0, 0) -> (0, H-1)
        assert_eq!(destination_index(g, 0, 0), 2 * 4);
        // (W-1, H-1) -> (W-1, 0)
        assert_eq!(destination_index(g, 3, 2), 3);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "outside 4x3")]
    fn test_destination_index_rejects_rows_past_the_bottom() {
        destination_index(geometry(4, 3), 0, 3);
    }

    #[test]
    fn test_every_pixel_written() {
        // Distinct band per source pixel so each output identifies its source
        let g = geometry(3, 2);
        let bands: Vec<RoiBand> = (0..6u16)
            .map(|i| {
                RoiBand::new(
                    format!("b{i}"),
                    (i + 1) * 10,
                    (i + 1) * 10 + 1,
                    Rgba8::new(i as u8, 0, 0, 255),
                )
            })
            .collect();
        let rois = RoiConfig::new(bands);
        let depth: Vec<u16> = (0..6u16).map(|i| (i + 1) * 10).collect();

        let out = compose(&depth, g, &rois);
        let reds: Vec<u8> = out.pixels().iter().map(|p| p.r).collect();
        // Source rows [0,1,2] [3,4,5] flipped
        assert_eq!(reds, vec![3, 4, 5, 0, 1, 2]);
        assert!(out.pixels().iter().all(|p| p.a == 255));
    }

    #[test]
    fn test_stats_count_categories() {
        let g = geometry(4, 2);
        let depth = [0, 1200, 1600, 2100, 900, 1100, 1550, 0];
        let mut out = ColorBuffer::default();
        let mut stats = ZoneStats::default();
        compose_into(&depth, g, &RoiConfig::default(), &mut out, &mut stats);

        assert_eq!(stats.invalid, 2);
        assert_eq!(stats.background, 2);
        assert_eq!(stats.zones, vec![2, 2]);
        assert_eq!(stats.total(), 8);
        assert!((stats.zone_fraction(0) - 0.25).abs() < f32::EPSILON);
    }

    #[test]
    fn test_buffer_reused_across_frames() {
        let g = geometry(2, 2);
        let rois = RoiConfig::default();
        let mut out = ColorBuffer::default();
        let mut stats = ZoneStats::default();

        compose_into(&[1200; 4], g, &rois, &mut out, &mut stats);
        let ptr = out.pixels().as_ptr();
        compose_into(&[0; 4], g, &rois, &mut out, &mut stats);

        assert_eq!(out.pixels().as_ptr(), ptr);
        // No stale red pixels survive the second frame
        assert!(out.pixels().iter().all(|&p| p == Rgba8::BLACK));
    }

    #[test]
    fn test_get_uses_surface_coordinates() {
        let g = geometry(2, 2);
        // Top-left source pixel is in ROI1
        let out = compose(&[1200, 0, 0, 0], g, &RoiConfig::default());
        assert_eq!(out.get(g, 0, 1), Some(Rgba8::new(255, 0, 0, 255)));
        assert_eq!(out.get(g, 0, 0), Some(Rgba8::BLACK));
        assert_eq!(out.get(g, 2, 0), None);
    }

    #[test]
    fn test_rows_top_down_match_source_order() {
        let g = geometry(2, 2);
        let out = compose(&[1200, 1200, 0, 1600], g, &RoiConfig::default());
        let rows: Vec<&[Rgba8]> = out.rows_top_down(g).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], &[Rgba8::new(255, 0, 0, 255); 2][..]);
        assert_eq!(rows[1][0], Rgba8::BLACK);
        assert_eq!(rows[1][1], Rgba8::new(0, 255, 0, 255));
    }
}
