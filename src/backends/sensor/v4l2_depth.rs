// SPDX-License-Identifier: GPL-3.0-only

//! Depth capture from V4L2 nodes advertising 16-bit depth
//!
//! RealSense and similar UVC depth cameras expose a `Z16 ` (or `Y16 `) node
//! whose samples are little-endian millimeters. Frames are read through
//! memory-mapped streaming on a capture thread and handed to the pipeline
//! through a [`LatestFrameSlot`].

use std::time::Duration;

use tracing::{debug, info, warn};
use v4l::buffer::Type;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;
use v4l::FourCC;

use super::frame_loop::{CaptureLoop, LoopAction};
use super::latest::{HeldFrame, LatestFrameSlot};
use super::{
    DepthFrame, DepthSensor, FrameGeometry, FrameToken, SensorBackendType, SensorDevice,
};
use crate::errors::{SensorError, SensorResult};

/// FourCCs carrying one 16-bit millimeter sample per pixel
const DEPTH_FOURCCS: [&[u8; 4]; 2] = [b"Z16 ", b"Y16 "];

const BUFFER_COUNT: u32 = 4;

fn is_depth_fourcc(fourcc: FourCC) -> bool {
    DEPTH_FOURCCS.iter().any(|code| fourcc == FourCC::new(code))
}

/// First depth FourCC the node can produce
fn depth_format_of(dev: &Device) -> Option<FourCC> {
    dev.enum_formats()
        .ok()?
        .into_iter()
        .map(|desc| desc.fourcc)
        .find(|fourcc| is_depth_fourcc(*fourcc))
}

/// Describe a node if it streams depth
fn probe_node(path: &str) -> Option<SensorDevice> {
    let dev = Device::with_path(path).ok()?;
    let fourcc = depth_format_of(&dev)?;
    let caps = dev.query_caps().ok()?;

    debug!(path, card = %caps.card, fourcc = ?fourcc, "Found V4L2 depth node");
    Some(SensorDevice {
        name: caps.card,
        path: path.to_string(),
        driver: caps.driver,
    })
}

/// All `/dev/video*` nodes that advertise a 16-bit depth format
pub fn enumerate_depth_nodes() -> Vec<SensorDevice> {
    v4l::context::enum_devices()
        .iter()
        .filter_map(|node| probe_node(&node.path().to_string_lossy()))
        .collect()
}

/// Decode little-endian 16-bit samples
pub fn decode_z16(bytes: &[u8], dst: &mut Vec<u16>) {
    dst.clear();
    dst.extend(
        bytes
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]])),
    );
}

struct StreamState {
    stream: MmapStream<'static>,
    geometry: FrameGeometry,
    frame_bytes: usize,
    slot: LatestFrameSlot,
    sequence: u64,
}

impl StreamState {
    fn step(&mut self) -> LoopAction {
        match self.stream.next() {
            Ok((buf, meta)) => {
                let used = (meta.bytesused as usize).min(buf.len());
                if used < self.frame_bytes {
                    warn!(
                        got = used,
                        expected = self.frame_bytes,
                        "Short depth buffer, frame dropped"
                    );
                    return LoopAction::Continue;
                }

                let mut depth_mm = Vec::with_capacity(self.geometry.pixel_count());
                decode_z16(&buf[..self.frame_bytes], &mut depth_mm);

                self.sequence += 1;
                self.slot.publish(DepthFrame {
                    sequence: self.sequence,
                    width: self.geometry.width,
                    height: self.geometry.height,
                    depth_mm,
                });
                LoopAction::Continue
            }
            Err(e) => {
                warn!(error = %e, "Failed to capture depth frame");
                std::thread::sleep(Duration::from_millis(10));
                LoopAction::Continue
            }
        }
    }
}

/// Depth sensor on a V4L2 node
pub struct V4l2DepthSensor {
    /// Explicit node, or `None` to pick the first depth node
    device_path: Option<String>,
    geometry: Option<FrameGeometry>,
    slot: LatestFrameSlot,
    held: HeldFrame,
    capture: Option<CaptureLoop>,
}

impl V4l2DepthSensor {
    pub fn new(device_path: Option<String>) -> Self {
        Self {
            device_path,
            geometry: None,
            slot: LatestFrameSlot::new(),
            held: HeldFrame::default(),
            capture: None,
        }
    }
}

impl DepthSensor for V4l2DepthSensor {
    fn backend_type(&self) -> SensorBackendType {
        SensorBackendType::V4l2
    }

    fn enumerate_devices(&self) -> Vec<SensorDevice> {
        match &self.device_path {
            Some(path) => probe_node(path).into_iter().collect(),
            None => enumerate_depth_nodes(),
        }
    }

    fn open(&mut self, device: &SensorDevice) -> SensorResult<()> {
        if self.capture.is_some() {
            return Ok(());
        }

        let mut dev = Device::with_path(&device.path)?;
        let fourcc = depth_format_of(&dev).ok_or_else(|| {
            SensorError::Backend(format!("{} has no 16-bit depth format", device.path))
        })?;

        let mut format = dev.format()?;
        format.fourcc = fourcc;
        let format = dev.set_format(&format)?;
        if !is_depth_fourcc(format.fourcc) {
            return Err(SensorError::Backend(format!(
                "{} rejected depth format {:?}, got {:?}",
                device.path, fourcc, format.fourcc
            )));
        }

        let geometry = FrameGeometry::new(format.width, format.height);
        let frame_bytes = geometry.pixel_count() * 2;
        info!(
            path = %device.path,
            %geometry,
            fourcc = ?format.fourcc,
            "Set V4L2 depth format"
        );

        let slot = self.slot.clone();
        let capture = CaptureLoop::spawn(
            "v4l2-depth",
            move || {
                let mut dev = dev;
                let stream =
                    MmapStream::with_buffers(&mut dev, Type::VideoCapture, BUFFER_COUNT)?;
                info!("V4L2 depth capture stream started");
                Ok(StreamState {
                    stream,
                    geometry,
                    frame_bytes,
                    slot,
                    sequence: 0,
                })
            },
            StreamState::step,
        )?;

        self.geometry = Some(geometry);
        self.capture = Some(capture);
        Ok(())
    }

    fn close(&mut self) {
        if let Some(mut capture) = self.capture.take() {
            capture.stop();
        }
        self.geometry = None;
        self.slot.clear();
        self.held.clear();
    }

    fn is_open(&self) -> bool {
        self.capture.is_some()
    }

    fn frame_geometry(&self) -> SensorResult<FrameGeometry> {
        self.geometry.ok_or(SensorError::GeometryUnavailable)
    }

    fn acquire_latest_frame(&mut self) -> Option<FrameToken> {
        if !self.is_open() {
            return None;
        }
        self.held.acquire(&self.slot)
    }

    fn copy_frame_data(&mut self, frame: &FrameToken, dst: &mut [u16]) -> SensorResult<()> {
        self.held.copy(frame, dst)
    }

    fn release_frame(&mut self, frame: FrameToken) {
        self.held.release(frame);
    }
}

impl Drop for V4l2DepthSensor {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_z16_little_endian() {
        let bytes = [0xB0, 0x04, 0x00, 0x00, 0xD0, 0x07];
        let mut depth = Vec::new();
        decode_z16(&bytes, &mut depth);
        assert_eq!(depth, vec![1200, 0, 2000]);
    }

    #[test]
    fn test_depth_fourccs() {
        assert!(is_depth_fourcc(FourCC::new(b"Z16 ")));
        assert!(is_depth_fourcc(FourCC::new(b"Y16 ")));
        assert!(!is_depth_fourcc(FourCC::new(b"YUYV")));
    }
}
