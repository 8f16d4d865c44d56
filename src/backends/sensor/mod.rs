// SPDX-License-Identifier: GPL-3.0-only

//! Depth sensor abstraction
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────┐
//! │   DepthPipeline     │  ← one acquire / compose / present per tick
//! └──────────┬──────────┘
//!            │
//!            ▼
//! ┌─────────────────────┐
//! │   FrameAcquirer     │  ← FrameHandle guard, lazily sized DepthBuffer
//! └──────────┬──────────┘
//!            │
//!            ▼
//! ┌─────────────────────┐
//! │   SensorSession     │  ← open / close lifecycle, frame geometry
//! └──────────┬──────────┘
//!            │
//!            ▼
//! ┌─────────────────────┐
//! │  DepthSensor Trait  │  ← device boundary
//! └──────────┬──────────┘
//!            │
//!     ┌──────┴──────┬──────────┬──────────┐
//!     ▼             ▼          ▼          ▼
//! ┌─────────┐ ┌─────────┐ ┌────────┐ ┌────────┐
//! │Synthetic│ │ Replay  │ │  V4L2  │ │ Kinect │
//! └─────────┘ └─────────┘ └────────┘ └────────┘
//! ```

pub mod acquirer;
pub mod frame_loop;
#[cfg(all(target_arch = "x86_64", feature = "freedepth"))]
pub mod kinect;
pub mod latest;
pub mod replay;
pub mod session;
pub mod synthetic;
pub mod types;
#[cfg(feature = "v4l2")]
pub mod v4l2_depth;

pub use acquirer::{DepthBuffer, FrameAcquirer, FrameHandle};
pub use session::SensorSession;
pub use types::*;

use crate::errors::{SensorError, SensorResult};

/// Device boundary every depth backend implements
///
/// These are the only operations the pipeline needs from a vendor SDK.
/// `acquire_latest_frame` must never block: it returns `None` when nothing
/// newer than the previously acquired frame is ready. Every token handed out
/// is passed back through `release_frame` exactly once (the pipeline
/// guarantees this through [`FrameHandle`]).
pub trait DepthSensor: Send {
    // ===== Enumeration =====

    /// Backend type identifier
    fn backend_type(&self) -> SensorBackendType;

    /// Devices this backend can open
    fn enumerate_devices(&self) -> Vec<SensorDevice>;

    /// Device opened when none is chosen explicitly
    fn default_device(&self) -> Option<SensorDevice> {
        self.enumerate_devices().into_iter().next()
    }

    // ===== Lifecycle =====

    /// Open the device and start its depth stream
    fn open(&mut self, device: &SensorDevice) -> SensorResult<()>;

    /// Stop streaming and release the device (idempotent)
    fn close(&mut self);

    /// Check if the device is open
    fn is_open(&self) -> bool;

    /// Frame geometry of the open depth stream
    fn frame_geometry(&self) -> SensorResult<FrameGeometry>;

    // ===== Frames =====

    /// Latest frame not yet handed out, if any (non-blocking)
    fn acquire_latest_frame(&mut self) -> Option<FrameToken>;

    /// Copy the frame's samples into `dst`
    ///
    /// `dst.len()` equals `frame.length_in_pixels()`.
    fn copy_frame_data(&mut self, frame: &FrameToken, dst: &mut [u16]) -> SensorResult<()>;

    /// Return the frame's device-side resources
    fn release_frame(&mut self, frame: FrameToken);
}

/// Create the backend for a configured sensor source
pub fn create_sensor(source: &SensorSource) -> SensorResult<Box<dyn DepthSensor>> {
    match source {
        SensorSource::Synthetic => Ok(Box::new(synthetic::SyntheticSensor::default())),
        SensorSource::Replay { path, fps } => {
            Ok(Box::new(replay::ReplaySensor::new(path.clone(), *fps)))
        }
        #[cfg(feature = "v4l2")]
        SensorSource::V4l2 { device } => {
            Ok(Box::new(v4l2_depth::V4l2DepthSensor::new(device.clone())))
        }
        #[cfg(not(feature = "v4l2"))]
        SensorSource::V4l2 { .. } => Err(SensorError::Backend(
            "built without V4L2 support (enable the `v4l2` feature)".to_string(),
        )),
        #[cfg(all(target_arch = "x86_64", feature = "freedepth"))]
        SensorSource::Kinect { index } => Ok(Box::new(kinect::KinectSensor::new(*index))),
        #[cfg(not(all(target_arch = "x86_64", feature = "freedepth")))]
        SensorSource::Kinect { .. } => Err(SensorError::Backend(
            "built without Kinect support (enable the `freedepth` feature on x86_64)".to_string(),
        )),
    }
}
