// SPDX-License-Identifier: GPL-3.0-only

//! Latest-frame handoff between a capture thread and the pipeline
//!
//! Capture threads publish at the device rate and the pipeline polls at its
//! own tick rate. Only the newest frame matters, so the slot holds at most one
//! frame: publishing over an unconsumed frame drops the older one.

use std::sync::{Arc, Mutex, PoisonError};

use super::{DepthFrame, FrameToken};
use crate::errors::{SensorError, SensorResult};

#[derive(Debug, Default)]
struct SlotState {
    frame: Option<DepthFrame>,
    published: u64,
    dropped: u64,
}

/// Single-frame mailbox shared with a capture thread
#[derive(Debug, Clone, Default)]
pub struct LatestFrameSlot {
    inner: Arc<Mutex<SlotState>>,
}

impl LatestFrameSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the held frame with `frame`
    pub fn publish(&self, frame: DepthFrame) {
        let mut state = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if state.frame.is_some() {
            state.dropped += 1;
        }
        state.frame = Some(frame);
        state.published += 1;
    }

    /// Take the held frame, leaving the slot empty
    pub fn take(&self) -> Option<DepthFrame> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .frame
            .take()
    }

    /// Discard any held frame
    pub fn clear(&self) {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .frame = None;
    }

    /// Frames published so far
    pub fn published_count(&self) -> u64 {
        self.inner
            .lock()
            .map(|s| s.published)
            .unwrap_or_default()
    }

    /// Frames overwritten before anyone took them
    pub fn dropped_count(&self) -> u64 {
        self.inner.lock().map(|s| s.dropped).unwrap_or_default()
    }
}

/// Frame a slot-backed sensor has handed out and not yet released
///
/// Gives the [`DepthSensor`](super::DepthSensor) frame operations to every
/// backend that captures through a [`LatestFrameSlot`].
#[derive(Debug, Default)]
pub struct HeldFrame {
    frame: Option<DepthFrame>,
}

impl HeldFrame {
    /// Move the newest frame out of `slot` and return its token
    pub fn acquire(&mut self, slot: &LatestFrameSlot) -> Option<FrameToken> {
        let frame = slot.take()?;
        let token = FrameToken::new(frame.sequence, frame.depth_mm.len());
        if let Some(stale) = self.frame.replace(frame) {
            tracing::warn!(sequence = stale.sequence, "Frame acquired without release");
        }
        Some(token)
    }

    /// Copy the held frame for `token` into `dst`
    pub fn copy(&self, token: &FrameToken, dst: &mut [u16]) -> SensorResult<()> {
        let frame = self
            .frame
            .as_ref()
            .filter(|f| f.sequence == token.sequence())
            .ok_or_else(|| {
                SensorError::CopyFailed(format!("frame {} is not held", token.sequence()))
            })?;

        if frame.depth_mm.len() != dst.len() {
            return Err(SensorError::CopyFailed(format!(
                "frame {} has {} samples, destination {}",
                frame.sequence,
                frame.depth_mm.len(),
                dst.len()
            )));
        }

        dst.copy_from_slice(&frame.depth_mm);
        Ok(())
    }

    /// Drop the held frame for `token`
    pub fn release(&mut self, token: FrameToken) {
        if self
            .frame
            .as_ref()
            .is_some_and(|f| f.sequence == token.sequence())
        {
            self.frame = None;
        }
    }

    pub fn clear(&mut self) {
        self.frame = None;
    }

    pub fn is_held(&self) -> bool {
        self.frame.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(sequence: u64, value: u16) -> DepthFrame {
        DepthFrame {
            sequence,
            width: 2,
            height: 1,
            depth_mm: vec![value; 2],
        }
    }

    #[test]
    fn test_publish_overwrites_stale_frame() {
        let slot = LatestFrameSlot::new();
        slot.publish(frame(1, 100));
        slot.publish(frame(2, 200));

        let latest = slot.take().unwrap();
        assert_eq!(latest.sequence, 2);
        assert!(slot.take().is_none());
        assert_eq!(slot.published_count(), 2);
        assert_eq!(slot.dropped_count(), 1);
    }

    #[test]
    fn test_slot_shared_across_threads() {
        let slot = LatestFrameSlot::new();
        let producer = slot.clone();
        std::thread::spawn(move || producer.publish(frame(7, 1)))
            .join()
            .unwrap();
        assert_eq!(slot.take().map(|f| f.sequence), Some(7));
    }

    #[test]
    fn test_held_frame_lifecycle() {
        let slot = LatestFrameSlot::new();
        let mut held = HeldFrame::default();
        assert!(held.acquire(&slot).is_none());

        slot.publish(frame(3, 1234));
        let token = held.acquire(&slot).unwrap();
        assert_eq!(token.sequence(), 3);
        assert_eq!(token.length_in_pixels(), 2);

        let mut dst = [0u16; 2];
        held.copy(&token, &mut dst).unwrap();
        assert_eq!(dst, [1234, 1234]);

        held.release(token);
        assert!(!held.is_held());
    }

    #[test]
    fn test_copy_rejects_wrong_length() {
        let slot = LatestFrameSlot::new();
        let mut held = HeldFrame::default();
        slot.publish(frame(1, 5));
        let token = held.acquire(&slot).unwrap();

        let mut dst = [0u16; 3];
        assert!(matches!(
            held.copy(&token, &mut dst),
            Err(SensorError::CopyFailed(_))
        ));
    }
}
