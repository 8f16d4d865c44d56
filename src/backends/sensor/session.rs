// SPDX-License-Identifier: GPL-3.0-only

//! Sensor session lifecycle
//!
//! The session owns the backend for the lifetime of the visualization. It is
//! created once, opened once, and closed exactly once (explicitly or on drop).

use super::{DepthSensor, FrameGeometry, SensorDevice};
use crate::errors::{SensorError, SensorResult};
use tracing::{debug, error, info};

/// Connection to one depth camera
pub struct SensorSession {
    sensor: Box<dyn DepthSensor>,
    device: Option<SensorDevice>,
    geometry: Option<FrameGeometry>,
}

impl SensorSession {
    pub fn new(sensor: Box<dyn DepthSensor>) -> Self {
        Self {
            sensor,
            device: None,
            geometry: None,
        }
    }

    /// Open the backend's default device and query its frame geometry
    ///
    /// Opening an already open session returns the known geometry.
    pub fn open(&mut self) -> SensorResult<FrameGeometry> {
        if let Some(geometry) = self.geometry {
            return Ok(geometry);
        }

        let backend = self.sensor.backend_type();
        let Some(device) = self.sensor.default_device() else {
            error!(%backend, "No depth sensor found");
            return Err(SensorError::NoDeviceFound);
        };

        info!(%backend, device = %device, "Opening depth sensor");
        self.sensor.open(&device)?;

        let geometry = match self.sensor.frame_geometry() {
            Ok(geometry) => geometry,
            Err(e) => {
                error!(error = %e, "Depth stream did not report its geometry");
                self.sensor.close();
                return Err(e);
            }
        };

        info!(
            width = geometry.width,
            height = geometry.height,
            "Depth sensor opened, frame source ready"
        );

        self.device = Some(device);
        self.geometry = Some(geometry);
        Ok(geometry)
    }

    /// Close the device
    ///
    /// Safe to call repeatedly and after a failed [`open`](Self::open).
    pub fn close(&mut self) {
        if self.device.is_none() && !self.sensor.is_open() {
            return;
        }

        info!(backend = %self.sensor.backend_type(), "Closing depth sensor");
        self.sensor.close();
        self.device = None;
        self.geometry = None;
    }

    pub fn is_open(&self) -> bool {
        self.geometry.is_some()
    }

    /// Frame geometry, available once [`open`](Self::open) succeeded
    pub fn geometry(&self) -> SensorResult<FrameGeometry> {
        self.geometry.ok_or(SensorError::GeometryUnavailable)
    }

    /// The opened device
    pub fn device(&self) -> Option<&SensorDevice> {
        self.device.as_ref()
    }

    /// Devices the backend can see
    pub fn enumerate_devices(&self) -> Vec<SensorDevice> {
        self.sensor.enumerate_devices()
    }

    pub(crate) fn sensor_mut(&mut self) -> &mut dyn DepthSensor {
        self.sensor.as_mut()
    }
}

impl Drop for SensorSession {
    fn drop(&mut self) {
        debug!("SensorSession dropped");
        self.close();
    }
}
