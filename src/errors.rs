// SPDX-License-Identifier: GPL-3.0-only

//! Error types for the depth visualizer
//!
//! Each layer has its own error enum so callers can tell transient
//! conditions (skip the tick) from structural ones (halt the feature).
//! [`AppError`] wraps them for the command-line front end.

use thiserror::Error;

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Result type for sensor operations
pub type SensorResult<T> = Result<T, SensorError>;

/// Result type for configuration handling
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Result type for presenter operations
pub type PresentResult<T> = Result<T, PresentError>;

/// Main application error type
#[derive(Debug, Error)]
pub enum AppError {
    /// Sensor-related errors
    #[error("Sensor error: {0}")]
    Sensor(#[from] SensorError),
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    /// Presentation errors
    #[error("Presentation error: {0}")]
    Present(#[from] PresentError),
    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

/// Sensor-specific errors
#[derive(Debug, Error)]
pub enum SensorError {
    /// No default depth device present
    ///
    /// Fatal to the visualization, never to the host process.
    #[error("No depth sensor found")]
    NoDeviceFound,
    /// Geometry was queried before the session was opened
    #[error("Frame geometry unavailable: sensor is not open")]
    GeometryUnavailable,
    /// The device reported a different pixel count than the first frame did
    ///
    /// Signals an unanticipated device reconfiguration; not recoverable.
    #[error("Frame size mismatch: buffer holds {expected} pixels, frame has {actual}")]
    FrameSizeMismatch { expected: usize, actual: usize },
    /// Copying a frame's pixels out of the device failed
    #[error("Failed to copy frame data: {0}")]
    CopyFailed(String),
    /// Backend-specific failure (driver, USB, file source)
    #[error("Sensor backend error: {0}")]
    Backend(String),
    /// Filesystem or device node I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SensorError {
    /// Whether this error stops the pipeline for good
    ///
    /// Copy failures only cost the current tick; everything else means the
    /// assumptions the pipeline was started under no longer hold.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, SensorError::CopyFailed(_))
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Reading or writing the config file failed
    #[error("Config I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// The config file is not valid JSON for [`crate::config::Config`]
    #[error("Invalid config file: {0}")]
    Parse(#[from] serde_json::Error),
    /// A band or color could not be parsed or is empty
    #[error("Invalid band '{band}': {reason}")]
    InvalidBand { band: String, reason: String },
    /// The sensor selection could not be parsed
    #[error("Invalid sensor '{value}': {reason}")]
    InvalidSensor { value: String, reason: String },
    /// A scalar setting is out of range
    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
    /// No ROI bands configured
    #[error("At least one ROI band is required")]
    NoBands,
}

/// Presenter errors
#[derive(Debug, Error)]
pub enum PresentError {
    /// Color buffer length does not match the declared geometry
    #[error("Color buffer holds {actual} pixels, geometry expects {expected}")]
    SizeMismatch { expected: usize, actual: usize },
    /// Image encoding failed
    #[error("Image encoding failed: {0}")]
    Image(#[from] image::ImageError),
    /// Filesystem or terminal I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
