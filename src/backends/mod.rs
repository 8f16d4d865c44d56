// SPDX-License-Identifier: GPL-3.0-only

//! Backend abstraction layer for depth capture
//!
//! The backend layer hides where depth frames come from. Hardware sensors,
//! recordings and the generated scene all sit behind the same
//! [`sensor::DepthSensor`] trait:
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │              Pipeline Layer                  │
//! └────────────────────┬────────────────────────┘
//!                      │
//! ┌────────────────────┴────────────────────────┐
//! │              Backend Layer                   │
//! │  ┌─────────────┐    ┌──────────────────┐   │
//! │  │  Synthetic  │    │   V4L2 (Z16)     │   │
//! │  └─────────────┘    └──────────────────┘   │
//! │  ┌─────────────┐    ┌──────────────────┐   │
//! │  │   Replay    │    │ Kinect (freedepth)│  │
//! │  └─────────────┘    └──────────────────┘   │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`sensor`]: Sensor trait, session lifecycle, frame acquisition and backends

pub mod sensor;
