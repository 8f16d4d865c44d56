// SPDX-License-Identifier: GPL-3.0-only

//! Depth-to-color pipeline
//!
//! One [`DepthPipeline::tick`] performs at most one acquire, one
//! classify-and-compose pass over the full frame and one present:
//!
//! ```text
//! SensorSession ─▶ FrameAcquirer ─▶ DepthBuffer ─▶ compose_into ─▶ ColorBuffer ─▶ Presenter
//!                  (FrameHandle)                   (classify + flip)
//! ```
//!
//! Nothing here blocks or spawns; the caller decides the tick rate.

pub mod classifier;
pub mod color;
pub mod compositor;

pub use classifier::{Category, RoiBand, RoiConfig};
pub use color::{ParseColorError, Rgba8};
pub use compositor::{ColorBuffer, ZoneStats, compose, compose_into, destination_index};

use tracing::{debug, error, warn};

use crate::backends::sensor::{FrameAcquirer, FrameGeometry, SensorSession};
use crate::errors::SensorError;
use crate::presenters::{FrameView, Presenter};

/// Result of one pipeline tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// A new frame was composed and handed to the presenter
    Presented { sequence: u64 },
    /// No frame newer than the last one was ready
    NoFrame,
    /// The frame was dropped (copy or present failed); the next tick may succeed
    Skipped,
    /// A structural error stopped the pipeline for good
    Halted,
}

/// Acquire, classify, compose, present
pub struct DepthPipeline {
    acquirer: FrameAcquirer,
    rois: RoiConfig,
    pending_rois: Option<RoiConfig>,
    color: ColorBuffer,
    stats: ZoneStats,
    halt_reason: Option<SensorError>,
    last_sequence: Option<u64>,
    frames_presented: u64,
}

impl DepthPipeline {
    pub fn new(rois: RoiConfig) -> Self {
        Self {
            acquirer: FrameAcquirer::new(),
            rois,
            pending_rois: None,
            color: ColorBuffer::default(),
            stats: ZoneStats::default(),
            halt_reason: None,
            last_sequence: None,
            frames_presented: 0,
        }
    }

    /// Replace the ROI bands, effective from the next tick
    pub fn reconfigure(&mut self, rois: RoiConfig) {
        self.pending_rois = Some(rois);
    }

    /// Run one cycle against `session`, presenting to `presenter`
    pub fn tick(
        &mut self,
        session: &mut SensorSession,
        presenter: &mut dyn Presenter,
    ) -> TickOutcome {
        if self.halt_reason.is_some() {
            return TickOutcome::Halted;
        }

        if let Some(rois) = self.pending_rois.take() {
            debug!(bands = rois.len(), "Applying new ROI bands");
            self.rois = rois;
        }

        let geometry = match session.geometry() {
            Ok(geometry) => geometry,
            Err(e) => return self.halt(e),
        };

        let sequence = match self.acquirer.acquire_into(session) {
            Ok(Some(sequence)) => sequence,
            Ok(None) => return TickOutcome::NoFrame,
            Err(e) if !e.is_fatal() => {
                warn!(error = %e, "Depth frame skipped");
                return TickOutcome::Skipped;
            }
            Err(e) => return self.halt(e),
        };

        let copied = self.acquirer.buffer().len();
        if copied != geometry.pixel_count() {
            return self.halt(SensorError::FrameSizeMismatch {
                expected: geometry.pixel_count(),
                actual: copied,
            });
        }

        compose_into(
            self.acquirer.buffer().samples(),
            geometry,
            &self.rois,
            &mut self.color,
            &mut self.stats,
        );
        self.last_sequence = Some(sequence);

        let frame = FrameView {
            color: &self.color,
            geometry,
            stats: &self.stats,
            sequence,
        };
        if let Err(e) = presenter.present(frame) {
            warn!(error = %e, sequence, "Failed to present frame");
            return TickOutcome::Skipped;
        }

        self.frames_presented += 1;
        if self.frames_presented % 300 == 1 {
            debug!(
                sequence,
                invalid = self.stats.invalid,
                background = self.stats.background,
                zones = ?self.stats.zones,
                "Zone coverage"
            );
        }
        TickOutcome::Presented { sequence }
    }

    fn halt(&mut self, reason: SensorError) -> TickOutcome {
        error!(error = %reason, "Depth pipeline halted");
        self.halt_reason = Some(reason);
        TickOutcome::Halted
    }

    pub fn rois(&self) -> &RoiConfig {
        &self.rois
    }

    /// Last composed frame (origin bottom-left); empty before the first frame
    pub fn color_buffer(&self) -> &ColorBuffer {
        &self.color
    }

    /// View of the last composed frame, for re-presenting it elsewhere
    pub fn last_frame(&self, geometry: FrameGeometry) -> Option<FrameView<'_>> {
        let sequence = self.last_sequence?;
        if self.color.len() != geometry.pixel_count() {
            return None;
        }
        Some(FrameView {
            color: &self.color,
            geometry,
            stats: &self.stats,
            sequence,
        })
    }

    pub fn stats(&self) -> &ZoneStats {
        &self.stats
    }

    pub fn frames_presented(&self) -> u64 {
        self.frames_presented
    }

    pub fn is_halted(&self) -> bool {
        self.halt_reason.is_some()
    }

    /// Why the pipeline stopped, if it did
    pub fn halt_reason(&self) -> Option<&SensorError> {
        self.halt_reason.as_ref()
    }
}

impl Default for DepthPipeline {
    fn default() -> Self {
        Self::new(RoiConfig::default())
    }
}
