// SPDX-License-Identifier: GPL-3.0-only

//! Rendering surfaces for composed frames
//!
//! A presenter takes a finished color buffer and makes it visible. Whatever
//! the surface, a viewer never sees a partly written frame: presenters either
//! swap a complete buffer in ([`FrontBuffer`]) or publish a complete file in
//! one rename ([`snapshot::PngPresenter`]).

pub mod snapshot;

use crate::backends::sensor::FrameGeometry;
use crate::errors::{PresentError, PresentResult};
use crate::pipelines::depth::{ColorBuffer, ZoneStats};

/// A composed frame on its way to a surface
#[derive(Debug, Clone, Copy)]
pub struct FrameView<'a> {
    /// Pixels, origin bottom-left
    pub color: &'a ColorBuffer,
    pub geometry: FrameGeometry,
    pub stats: &'a ZoneStats,
    /// Sensor sequence number of the source frame
    pub sequence: u64,
}

impl FrameView<'_> {
    /// Check the buffer holds exactly one frame of `geometry`
    pub fn validate(&self) -> PresentResult<()> {
        let expected = self.geometry.pixel_count();
        if self.color.len() != expected {
            return Err(PresentError::SizeMismatch {
                expected,
                actual: self.color.len(),
            });
        }
        Ok(())
    }
}

/// Rendering surface boundary
pub trait Presenter {
    /// Replace the displayed frame with `frame`
    fn present(&mut self, frame: FrameView<'_>) -> PresentResult<()>;
}

/// Double buffer: frames are written to the back and swapped to the front
///
/// Readers only ever see the front buffer, which always holds a whole frame.
#[derive(Debug, Default)]
pub struct FrontBuffer {
    front: ColorBuffer,
    back: ColorBuffer,
    geometry: Option<FrameGeometry>,
    stats: ZoneStats,
    sequence: u64,
    frames: u64,
}

impl FrontBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// The frame currently on display, if any
    pub fn front(&self) -> Option<(&ColorBuffer, FrameGeometry)> {
        self.geometry.map(|g| (&self.front, g))
    }

    /// Zone statistics of the displayed frame
    pub fn stats(&self) -> &ZoneStats {
        &self.stats
    }

    /// Sequence number of the displayed frame
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Frames presented so far
    pub fn frames(&self) -> u64 {
        self.frames
    }
}

impl Presenter for FrontBuffer {
    fn present(&mut self, frame: FrameView<'_>) -> PresentResult<()> {
        frame.validate()?;

        self.back.copy_from(frame.color);
        std::mem::swap(&mut self.front, &mut self.back);

        self.geometry = Some(frame.geometry);
        self.stats.clone_from(frame.stats);
        self.sequence = frame.sequence;
        self.frames += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipelines::depth::{RoiConfig, compose};

    #[test]
    fn test_front_buffer_swaps_whole_frames() {
        let geometry = FrameGeometry::new(2, 1);
        let rois = RoiConfig::default();
        let stats = ZoneStats::default();
        let mut surface = FrontBuffer::new();
        assert!(surface.front().is_none());

        let first = compose(&[1200, 1200], geometry, &rois);
        surface
            .present(FrameView {
                color: &first,
                geometry,
                stats: &stats,
                sequence: 1,
            })
            .unwrap();

        let second = compose(&[1600, 0], geometry, &rois);
        surface
            .present(FrameView {
                color: &second,
                geometry,
                stats: &stats,
                sequence: 2,
            })
            .unwrap();

        let (front, g) = surface.front().unwrap();
        assert_eq!(g, geometry);
        assert_eq!(front, &second);
        assert_eq!(surface.sequence(), 2);
        assert_eq!(surface.frames(), 2);
    }

    #[test]
    fn test_rejects_wrong_size() {
        let geometry = FrameGeometry::new(4, 4);
        let color = ColorBuffer::new(FrameGeometry::new(2, 2));
        let stats = ZoneStats::default();
        let mut surface = FrontBuffer::new();

        let result = surface.present(FrameView {
            color: &color,
            geometry,
            stats: &stats,
            sequence: 1,
        });
        assert!(matches!(
            result,
            Err(PresentError::SizeMismatch {
                expected: 16,
                actual: 4
            })
        ));
        assert!(surface.front().is_none());
    }
}
