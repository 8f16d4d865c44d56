// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants
//!
//! Depth range, default zones and timing live here so the sensor backends,
//! the pipeline and the config layer agree on them.

use std::time::Duration;

/// Depth sample value meaning "sensor could not resolve distance"
pub const DEPTH_INVALID_MM: u16 = 0;

/// Typical usable range of structured-light / stereo depth sensors (millimeters)
pub const DEPTH_MIN_MM: u16 = 400;
pub const DEPTH_MAX_MM: u16 = 4000;

/// Reference zone layout: near zone (red) and mid zone (green)
pub mod roi {
    pub const ROI1_MIN_MM: u16 = 1000;
    pub const ROI1_MAX_MM: u16 = 1500;
    pub const ROI2_MIN_MM: u16 = 1500;
    pub const ROI2_MAX_MM: u16 = 2000;

    pub const ROI1_COLOR: [u8; 4] = [255, 0, 0, 255];
    pub const ROI2_COLOR: [u8; 4] = [0, 255, 0, 255];

    /// Color used for invalid readings and out-of-band pixels
    pub const BACKGROUND_COLOR: [u8; 4] = [0, 0, 0, 255];
}

/// Frame pacing
pub mod timing {
    use super::Duration;

    /// Default host tick (~30fps)
    pub const DEFAULT_TICK_INTERVAL_MS: u64 = 33;

    /// Sleep between polls when a capture thread has nothing to read
    pub const CAPTURE_IDLE_SLEEP: Duration = Duration::from_millis(2);

    /// Give up on a headless snapshot after this long without enough frames
    pub const SNAPSHOT_TIMEOUT: Duration = Duration::from_secs(10);
}

/// Synthetic sensor defaults (matches Kinect v1 medium depth mode)
pub mod synthetic {
    pub const WIDTH: u32 = 640;
    pub const HEIGHT: u32 = 480;
    pub const FPS: u32 = 30;
}

/// File formats accepted by the replay sensor
pub mod file_formats {
    /// 16-bit grayscale depth images
    pub const DEPTH_IMAGE_EXTENSIONS: &[&str] = &["png"];

    /// Check if a file extension is a supported depth image format
    pub fn is_depth_image_extension(ext: &str) -> bool {
        DEPTH_IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str())
    }
}

/// Folder name used for config and snapshots
pub const APP_DIR_NAME: &str = "depth-roi";
