// SPDX-License-Identifier: GPL-3.0-only

//! User configuration
//!
//! Stored as JSON in `$XDG_CONFIG_HOME/depth-roi/config.json`. A missing file
//! means defaults; command-line flags override individual fields after
//! loading.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::backends::sensor::SensorSource;
use crate::constants::{APP_DIR_NAME, DEPTH_MAX_MM, DEPTH_MIN_MM, timing};
use crate::errors::{ConfigError, ConfigResult};
use crate::pipelines::depth::{RoiBand, RoiConfig};

const CONFIG_FILE_NAME: &str = "config.json";

fn default_tick_interval_ms() -> u64 {
    timing::DEFAULT_TICK_INTERVAL_MS
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Depth source to open
    pub sensor: SensorSource,
    /// Distance bands in priority order
    pub rois: RoiConfig,
    /// Delay between pipeline ticks
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    /// Where snapshots go (default: Pictures/depth-roi)
    pub snapshot_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sensor: SensorSource::default(),
            rois: RoiConfig::default(),
            tick_interval_ms: default_tick_interval_ms(),
            snapshot_dir: None,
        }
    }
}

impl Config {
    /// Default config file location
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Load from `path`, falling back to defaults when the file does not exist
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No config file, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(e.into()),
        };

        let config: Config = serde_json::from_str(&text)?;
        info!(path = %path.display(), bands = config.rois.len(), "Loaded config");
        Ok(config)
    }

    /// Load from the default location (or defaults if there is none)
    pub fn load_default() -> ConfigResult<Self> {
        match Self::default_path() {
            Some(path) => Self::load(&path),
            None => Ok(Self::default()),
        }
    }

    /// Write as pretty JSON, creating parent directories
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path, text + "\n")?;
        info!(path = %path.display(), "Saved config");
        Ok(())
    }

    /// Apply command-line overrides
    ///
    /// A non-empty `rois` list replaces the configured bands entirely.
    pub fn with_overrides(mut self, sensor: Option<SensorSource>, rois: Vec<RoiBand>) -> Self {
        if let Some(sensor) = sensor {
            self.sensor = sensor;
        }
        if !rois.is_empty() {
            self.rois = RoiConfig::new(rois);
        }
        self
    }

    /// Reject configurations the pipeline cannot run with
    ///
    /// Overlapping bands and bands outside the sensor range are allowed but
    /// logged.
    pub fn validate(&self) -> ConfigResult<()> {
        self.rois.validate()?;

        if self.tick_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "tick_interval_ms".to_string(),
                reason: "must be positive".to_string(),
            });
        }

        for (first, second) in self.rois.overlapping_pairs() {
            let bands = self.rois.bands();
            warn!(
                first = %bands[first].name,
                second = %bands[second].name,
                "ROI bands overlap, the earlier band wins"
            );
        }

        for band in self.rois.bands() {
            if band.max_mm <= DEPTH_MIN_MM || band.min_mm >= DEPTH_MAX_MM {
                warn!(
                    band = %band.name,
                    min_mm = band.min_mm,
                    max_mm = band.max_mm,
                    "ROI band lies outside the usual sensor range ({}-{} mm)",
                    DEPTH_MIN_MM,
                    DEPTH_MAX_MM
                );
            }
        }

        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }

    /// Snapshot directory, resolved against the user's Pictures folder
    pub fn snapshot_dir(&self) -> PathBuf {
        self.snapshot_dir.clone().unwrap_or_else(default_snapshot_dir)
    }
}

fn default_snapshot_dir() -> PathBuf {
    dirs::picture_dir()
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
        .join(APP_DIR_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipelines::depth::Rgba8;

    #[test]
    fn test_default_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.rois.len(), 2);
        assert_eq!(config.tick_interval(), Duration::from_millis(33));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: Config = serde_json::from_str(r#"{"tick_interval_ms": 50}"#).unwrap();
        assert_eq!(config.tick_interval_ms, 50);
        assert_eq!(config.sensor, SensorSource::Synthetic);
        assert_eq!(config.rois, RoiConfig::default());
    }

    #[test]
    fn test_overrides_replace_bands() {
        let band = RoiBand::new("hand", 300, 600, Rgba8::new(0, 0, 255, 255));
        let config = Config::default().with_overrides(None, vec![band.clone()]);
        assert_eq!(config.rois.bands(), &[band]);

        let config = config.with_overrides(Some(SensorSource::Kinect { index: 1 }), Vec::new());
        assert_eq!(config.sensor, SensorSource::Kinect { index: 1 });
        assert_eq!(config.rois.len(), 1);
    }

    #[test]
    fn test_validate_rejects_empty_and_inverted() {
        let mut config = Config::default();
        config.rois = RoiConfig::new(Vec::new());
        assert!(matches!(config.validate(), Err(ConfigError::NoBands)));

        config.rois = RoiConfig::new(vec![RoiBand::new("bad", 2000, 1000, Rgba8::BLACK)]);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidBand { .. })
        ));
    }

    #[test]
    fn test_overlap_is_allowed() {
        let mut config = Config::default();
        config.rois = RoiConfig::new(vec![
            RoiBand::new("a", 1000, 1600, Rgba8::BLACK),
            RoiBand::new("b", 1500, 2000, Rgba8::BLACK),
        ]);
        assert!(config.validate().is_ok());
    }
}
