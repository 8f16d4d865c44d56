// SPDX-License-Identifier: GPL-3.0-only

//! depth-roi - Region-of-interest visualizer for depth cameras
//!
//! Each depth sample is sorted into configurable distance bands and painted
//! in the band's color, so anything standing in a zone lights up.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`backends`]: Depth sensor abstraction, session lifecycle and backends
//! - [`pipelines`]: Classification and composition of depth into color
//! - [`presenters`]: Rendering surfaces (double buffer, PNG snapshots)
//! - [`terminal`]: Live terminal viewer
//! - [`config`]: User configuration handling
//!
//! # Example
//!
//! ```ignore
//! let mut session = SensorSession::new(create_sensor(&SensorSource::Synthetic)?);
//! session.open()?;
//!
//! let mut pipeline = DepthPipeline::new(RoiConfig::default());
//! let mut surface = FrontBuffer::new();
//! loop {
//!     pipeline.tick(&mut session, &mut surface);
//! }
//! ```

pub mod backends;
pub mod config;
pub mod constants;
pub mod errors;
pub mod pipelines;
pub mod presenters;
pub mod terminal;

// Re-export commonly used types
pub use backends::sensor::{
    DepthSensor, FrameGeometry, SensorDevice, SensorSession, SensorSource, create_sensor,
};
pub use config::Config;
pub use errors::{AppError, AppResult, SensorError};
pub use pipelines::depth::{Category, DepthPipeline, RoiBand, RoiConfig, Rgba8, TickOutcome};
pub use presenters::{FrameView, FrontBuffer, Presenter};
