// SPDX-License-Identifier: GPL-3.0-only

//! Depth classification into regions of interest
//!
//! Maps a single millimeter sample to a [`Category`] using an ordered list of
//! half-open distance bands. Bands are tested in declaration order and the
//! first match wins, so overlapping bands resolve to the earlier one.

use super::color::Rgba8;
use crate::constants::{DEPTH_INVALID_MM, roi};
use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Visual category of one depth sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    /// Sensor could not resolve distance (sample was 0)
    Invalid,
    /// Valid sample outside every band
    Background,
    /// Inside the band at this index of the [`RoiConfig`]
    Roi(usize),
}

/// A half-open distance interval `[min_mm, max_mm)` with its display color
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoiBand {
    /// Label shown in the status bar
    pub name: String,
    /// Inclusive lower bound (millimeters)
    pub min_mm: u16,
    /// Exclusive upper bound (millimeters)
    pub max_mm: u16,
    /// Display color
    pub color: Rgba8,
}

impl RoiBand {
    pub fn new(name: impl Into<String>, min_mm: u16, max_mm: u16, color: Rgba8) -> Self {
        Self {
            name: name.into(),
            min_mm,
            max_mm,
            color,
        }
    }

    #[inline]
    pub fn contains(&self, depth_mm: u16) -> bool {
        self.min_mm <= depth_mm && depth_mm < self.max_mm
    }

    /// Whether the two intervals share at least one millimeter value
    pub fn overlaps(&self, other: &RoiBand) -> bool {
        self.min_mm < other.max_mm && other.min_mm < self.max_mm
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_mm >= self.max_mm {
            return Err(ConfigError::InvalidBand {
                band: self.name.clone(),
                reason: format!(
                    "min ({} mm) must be below max ({} mm)",
                    self.min_mm, self.max_mm
                ),
            });
        }
        Ok(())
    }
}

/// Parses `NAME:MIN:MAX:#RRGGBB[AA]` as given on the command line
impl FromStr for RoiBand {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| ConfigError::InvalidBand {
            band: s.to_string(),
            reason: reason.to_string(),
        };

        let parts: Vec<&str> = s.split(':').collect();
        let [name, min, max, color] = parts.as_slice() else {
            return Err(invalid("expected NAME:MIN:MAX:#RRGGBB"));
        };

        let min_mm = min.trim().parse().map_err(|_| invalid("MIN is not a u16"))?;
        let max_mm = max.trim().parse().map_err(|_| invalid("MAX is not a u16"))?;
        let color = color
            .parse::<Rgba8>()
            .map_err(|e| invalid(&e.to_string()))?;

        let band = RoiBand::new(name.trim(), min_mm, max_mm, color);
        band.validate()?;
        Ok(band)
    }
}

/// Ordered set of ROI bands
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoiConfig {
    bands: Vec<RoiBand>,
}

impl RoiConfig {
    pub fn new(bands: Vec<RoiBand>) -> Self {
        Self { bands }
    }

    pub fn bands(&self) -> &[RoiBand] {
        &self.bands
    }

    pub fn len(&self) -> usize {
        self.bands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bands.is_empty()
    }

    /// Classify one depth sample (millimeters)
    #[inline]
    pub fn classify(&self, depth_mm: u16) -> Category {
        if depth_mm == DEPTH_INVALID_MM {
            return Category::Invalid;
        }

        self.bands
            .iter()
            .position(|band| band.contains(depth_mm))
            .map_or(Category::Background, Category::Roi)
    }

    /// Display color for a category
    ///
    /// Invalid and background pixels share the same color.
    #[inline]
    pub fn color_of(&self, category: Category) -> Rgba8 {
        match category {
            Category::Roi(index) => self
                .bands
                .get(index)
                .map_or(Rgba8::from_array(roi::BACKGROUND_COLOR), |b| b.color),
            Category::Invalid | Category::Background => Rgba8::from_array(roi::BACKGROUND_COLOR),
        }
    }

    /// Classify and color in one step
    #[inline]
    pub fn color_for_depth(&self, depth_mm: u16) -> Rgba8 {
        self.color_of(self.classify(depth_mm))
    }

    /// Index pairs of bands that overlap (the earlier index wins on lookup)
    pub fn overlapping_pairs(&self) -> Vec<(usize, usize)> {
        let mut pairs = Vec::new();
        for (i, a) in self.bands.iter().enumerate() {
            for (j, b) in self.bands.iter().enumerate().skip(i + 1) {
                if a.overlaps(b) {
                    pairs.push((i, j));
                }
            }
        }
        pairs
    }

    /// Reject empty configs and inverted bands
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bands.is_empty() {
            return Err(ConfigError::NoBands);
        }
        self.bands.iter().try_for_each(RoiBand::validate)
    }
}

impl Default for RoiConfig {
    /// Near zone `[1000, 1500)` red and mid zone `[1500, 2000)` green
    fn default() -> Self {
        Self::new(vec![
            RoiBand::new(
                "near",
                roi::ROI1_MIN_MM,
                roi::ROI1_MAX_MM,
                Rgba8::from_array(roi::ROI1_COLOR),
            ),
            RoiBand::new(
                "mid",
                roi::ROI2_MIN_MM,
                roi::ROI2_MAX_MM,
                Rgba8::from_array(roi::ROI2_COLOR),
            ),
        ])
    }
}

impl From<Vec<RoiBand>> for RoiConfig {
    fn from(bands: Vec<RoiBand>) -> Self {
        Self::new(bands)
    }
}
