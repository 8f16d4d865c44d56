// SPDX-License-Identifier: GPL-3.0-only

//! Frame acquisition with scoped release
//!
//! A [`FrameHandle`] wraps one device frame. It can be copied from once and
//! gives the frame back to the sensor when it goes out of scope, on every
//! path, including a failed copy or a size mismatch.

use tracing::{debug, info};

use super::{DepthSensor, FrameToken, SensorSession};
use crate::errors::{SensorError, SensorResult};

/// Raw depth samples of the most recent frame (millimeters, origin top-left)
///
/// Allocated on the first successful frame. The size is fixed from then on.
#[derive(Debug, Default)]
pub struct DepthBuffer {
    samples: Option<Vec<u16>>,
}

impl DepthBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Destination slice for a frame of `pixels` samples
    ///
    /// The first call allocates. Later calls with a different size fail with
    /// [`SensorError::FrameSizeMismatch`].
    pub fn prepare(&mut self, pixels: usize) -> SensorResult<&mut [u16]> {
        if let Some(samples) = &self.samples
            && samples.len() != pixels
        {
            return Err(SensorError::FrameSizeMismatch {
                expected: samples.len(),
                actual: pixels,
            });
        }

        let samples = self.samples.get_or_insert_with(|| {
            info!(pixels, "Allocating depth buffer");
            vec![0; pixels]
        });
        Ok(samples.as_mut_slice())
    }

    /// Samples of the last copied frame, empty before the first frame
    pub fn samples(&self) -> &[u16] {
        self.samples.as_deref().unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.samples().len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples().is_empty()
    }

    pub fn is_allocated(&self) -> bool {
        self.samples.is_some()
    }
}

/// One acquired frame, released when dropped
pub struct FrameHandle<'s> {
    sensor: &'s mut dyn DepthSensor,
    token: Option<FrameToken>,
}

impl<'s> FrameHandle<'s> {
    /// Acquire the latest frame from `sensor` without blocking
    pub fn acquire(sensor: &'s mut dyn DepthSensor) -> Option<Self> {
        let token = sensor.acquire_latest_frame()?;
        Some(Self {
            sensor,
            token: Some(token),
        })
    }

    pub fn sequence(&self) -> u64 {
        self.token.as_ref().map(FrameToken::sequence).unwrap_or_default()
    }

    /// Pixel count the device declares for this frame
    pub fn length_in_pixels(&self) -> usize {
        self.token
            .as_ref()
            .map(FrameToken::length_in_pixels)
            .unwrap_or_default()
    }

    /// Copy the frame into `buffer` and release it
    ///
    /// Consumes the handle, so each frame is copied at most once.
    pub fn copy_into(mut self, buffer: &mut DepthBuffer) -> SensorResult<u64> {
        let Some(token) = self.token.as_ref() else {
            return Err(SensorError::CopyFailed("frame already released".to_string()));
        };
        let sequence = token.sequence();
        let dst = buffer.prepare(token.length_in_pixels())?;
        self.sensor.copy_frame_data(token, dst)?;
        Ok(sequence)
    }
}

impl Drop for FrameHandle<'_> {
    fn drop(&mut self) {
        if let Some(token) = self.token.take() {
            self.sensor.release_frame(token);
        }
    }
}

/// Pulls frames from a session into a reusable [`DepthBuffer`]
#[derive(Debug, Default)]
pub struct FrameAcquirer {
    buffer: DepthBuffer,
    frames_copied: u64,
}

impl FrameAcquirer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the latest frame, if any
    ///
    /// Never blocks. The caller owns the returned handle; dropping it releases
    /// the frame whether or not it was copied.
    pub fn try_acquire(session: &mut SensorSession) -> Option<FrameHandle<'_>> {
        FrameHandle::acquire(session.sensor_mut())
    }

    /// Acquire the latest frame and copy it into the depth buffer
    ///
    /// Returns the frame's sequence number, or `None` when no new frame was
    /// ready. The buffer is left untouched in that case.
    pub fn acquire_into(&mut self, session: &mut SensorSession) -> SensorResult<Option<u64>> {
        let Some(handle) = Self::try_acquire(session) else {
            return Ok(None);
        };
        let sequence = handle.copy_into(&mut self.buffer)?;
        self.frames_copied += 1;
        if self.frames_copied == 1 {
            debug!(sequence, "First depth frame copied");
        }
        Ok(Some(sequence))
    }

    pub fn buffer(&self) -> &DepthBuffer {
        &self.buffer
    }

    pub fn frames_copied(&self) -> u64 {
        self.frames_copied
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_allocated_lazily() {
        let mut buffer = DepthBuffer::new();
        assert!(!buffer.is_allocated());
        assert!(buffer.samples().is_empty());

        buffer.prepare(8).unwrap()[0] = 42;
        assert!(buffer.is_allocated());
        assert_eq!(buffer.len(), 8);
        assert_eq!(buffer.samples()[0], 42);
    }

    #[test]
    fn test_buffer_size_is_fixed() {
        let mut buffer = DepthBuffer::new();
        buffer.prepare(8).unwrap();
        assert!(buffer.prepare(8).is_ok());

        match buffer.prepare(12) {
            Err(SensorError::FrameSizeMismatch { expected, actual }) => {
                assert_eq!(expected, 8);
                assert_eq!(actual, 12);
            }
            other => panic!("expected size mismatch, got {other:?}"),
        }
        assert_eq!(buffer.len(), 8);
    }
}
