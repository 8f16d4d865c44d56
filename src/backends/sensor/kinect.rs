// SPDX-License-Identifier: GPL-3.0-only

//! Kinect v1 depth through freedepth
//!
//! freedepth streams over USB directly (the kernel `gspca_kinect` driver is
//! unbound while streaming and rebound on close). Raw 11-bit disparity is
//! converted to millimeters with the converter built from the device's own
//! calibration.

use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::time::Duration;

use freedepth::{DepthFormat, KinectStreamer, Resolution, VideoFormat, VideoFrame};
use tracing::{debug, info, warn};

use super::frame_loop::{CaptureLoop, LoopAction};
use super::latest::{HeldFrame, LatestFrameSlot};
use super::{
    DepthFrame, DepthSensor, FrameGeometry, FrameToken, SensorBackendType, SensorDevice,
};
use crate::errors::{SensorError, SensorResult};

/// Path prefix for Kinect devices
pub const KINECT_PATH_PREFIX: &str = "kinect:";

/// Kinect depth stream size (11-bit mode)
const KINECT_GEOMETRY: FrameGeometry = FrameGeometry::new(640, 480);

const RECV_TIMEOUT: Duration = Duration::from_millis(50);

fn kinect_index(path: &str) -> Option<usize> {
    path.strip_prefix(KINECT_PATH_PREFIX)?.parse().ok()
}

struct DepthStream {
    depth_rx: Receiver<freedepth::DepthFrame>,
    video_rx: Receiver<VideoFrame>,
    converter: freedepth::DepthToMm,
    slot: LatestFrameSlot,
    sequence: u64,
}

impl DepthStream {
    fn step(&mut self) -> LoopAction {
        // Video is not used; keep its channel from growing
        while self.video_rx.try_recv().is_ok() {}

        let frame = match self.depth_rx.recv_timeout(RECV_TIMEOUT) {
            Ok(frame) => frame,
            Err(RecvTimeoutError::Timeout) => return LoopAction::Continue,
            Err(RecvTimeoutError::Disconnected) => {
                debug!("Kinect depth channel disconnected");
                return LoopAction::Stop;
            }
        };

        let Some(raw) = frame.as_u16() else {
            warn!("Kinect depth frame is not 16-bit, skipping");
            return LoopAction::Continue;
        };

        let mut depth_mm = vec![0u16; raw.len()];
        self.converter.convert_frame(raw, &mut depth_mm);

        self.sequence += 1;
        self.slot.publish(DepthFrame {
            sequence: self.sequence,
            width: frame.width,
            height: frame.height,
            depth_mm,
        });
        LoopAction::Continue
    }
}

/// Depth sensor for a Kinect v1
pub struct KinectSensor {
    index: usize,
    streamer: Option<KinectStreamer>,
    slot: LatestFrameSlot,
    held: HeldFrame,
    capture: Option<CaptureLoop>,
}

impl KinectSensor {
    pub fn new(index: usize) -> Self {
        Self {
            index,
            streamer: None,
            slot: LatestFrameSlot::new(),
            held: HeldFrame::default(),
            capture: None,
        }
    }
}

impl DepthSensor for KinectSensor {
    fn backend_type(&self) -> SensorBackendType {
        SensorBackendType::Kinect
    }

    fn enumerate_devices(&self) -> Vec<SensorDevice> {
        let devices = match freedepth::enumerate_devices() {
            Ok(devices) => devices,
            Err(e) => {
                debug!("Failed to enumerate Kinect devices: {}", e);
                return Vec::new();
            }
        };

        devices
            .iter()
            .map(|dev| SensorDevice {
                name: dev.name.clone(),
                path: format!("{}{}", KINECT_PATH_PREFIX, dev.index),
                driver: "freedepth".to_string(),
            })
            .collect()
    }

    /// The configured index, when that Kinect is present
    fn default_device(&self) -> Option<SensorDevice> {
        self.enumerate_devices()
            .into_iter()
            .find(|dev| kinect_index(&dev.path) == Some(self.index))
    }

    fn open(&mut self, device: &SensorDevice) -> SensorResult<()> {
        if self.capture.is_some() {
            return Ok(());
        }

        let index = kinect_index(&device.path).unwrap_or(self.index);
        info!(device = index, "Starting Kinect depth stream");

        let mut streamer = KinectStreamer::new(index)
            .map_err(|e| SensorError::Backend(format!("Failed to open Kinect: {}", e)))?;
        let (video_rx, depth_rx) = streamer
            .start(VideoFormat::Bayer, Resolution::Medium, DepthFormat::Depth11Bit)
            .map_err(|e| SensorError::Backend(format!("Failed to start streaming: {}", e)))?;

        let registration = streamer.create_depth_registration();
        let converter = registration.depth_to_mm().clone();
        self.streamer = Some(streamer);

        let slot = self.slot.clone();
        let capture = CaptureLoop::spawn(
            "kinect-depth",
            move || {
                Ok(DepthStream {
                    depth_rx,
                    video_rx,
                    converter,
                    slot,
                    sequence: 0,
                })
            },
            DepthStream::step,
        );

        match capture {
            Ok(capture) => {
                self.capture = Some(capture);
                Ok(())
            }
            Err(e) => {
                self.close();
                Err(e)
            }
        }
    }

    fn close(&mut self) {
        if let Some(mut capture) = self.capture.take() {
            capture.stop();
        }

        if let Some(mut streamer) = self.streamer.take() {
            info!("Stopping Kinect depth stream");
            streamer.stop();
            if let Err(e) = streamer.rebind_driver() {
                warn!("Failed to rebind kernel driver: {}", e);
            }
        }

        self.slot.clear();
        self.held.clear();
    }

    fn is_open(&self) -> bool {
        self.capture.is_some()
    }

    fn frame_geometry(&self) -> SensorResult<FrameGeometry> {
        if self.is_open() {
            Ok(KINECT_GEOMETRY)
        } else {
            Err(SensorError::GeometryUnavailable)
        }
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

impl Drop for KinectSensor {
    fn drop(&mut self) {
        self.close();
    }
}
