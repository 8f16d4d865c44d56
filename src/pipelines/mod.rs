// SPDX-License-Identifier: GPL-3.0-only

//! Processing pipelines
//!
//! ```text
//! ┌──────────────┐     ┌───────────────────┐     ┌──────────────┐
//! │ Depth Frame  │ ──▶ │  Depth Pipeline   │ ──▶ │  Presenter   │
//! │  (u16 mm)    │     │  - Classify       │     │  (terminal,  │
//! │              │     │  - Vertical flip  │     │   PNG file)  │
//! └──────────────┘     └───────────────────┘     └──────────────┘
//! ```
//!
//! # Modules
//!
//! - [`depth`]: ROI classification and composition into a color buffer

pub mod depth;
