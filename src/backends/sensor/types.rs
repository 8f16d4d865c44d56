// SPDX-License-Identifier: GPL-3.0-only

//! Shared types for depth sensor backends

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

use crate::errors::ConfigError;

/// Frame dimensions in pixels, fixed for the lifetime of a sensor session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameGeometry {
    pub width: u32,
    pub height: u32,
}

impl FrameGeometry {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Number of samples in one frame (`width * height`)
    pub const fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

impl std::fmt::Display for FrameGeometry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// A depth device as reported by a backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorDevice {
    /// Human-readable name
    pub name: String,
    /// Backend-specific address (device node, file path, USB index)
    pub path: String,
    /// Driver or source kind
    pub driver: String,
}

impl std::fmt::Display for SensorDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}, {})", self.name, self.path, self.driver)
    }
}

/// Device-side handle of one acquired frame
///
/// Not `Clone`: releasing consumes the token, so a frame can only be
/// released once.
#[derive(Debug, PartialEq, Eq)]
pub struct FrameToken {
    sequence: u64,
    length_in_pixels: usize,
}

impl FrameToken {
    pub fn new(sequence: u64, length_in_pixels: usize) -> Self {
        Self {
            sequence,
            length_in_pixels,
        }
    }

    /// Monotonic frame number assigned by the backend
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Pixel count the device declares for this frame
    pub fn length_in_pixels(&self) -> usize {
        self.length_in_pixels
    }
}

/// A captured depth frame (millimeters, row-major, origin top-left)
#[derive(Debug, Clone)]
pub struct DepthFrame {
    pub sequence: u64,
    pub width: u32,
    pub height: u32,
    pub depth_mm: Vec<u16>,
}

impl DepthFrame {
    pub fn geometry(&self) -> FrameGeometry {
        FrameGeometry::new(self.width, self.height)
    }
}

/// Sensor backend type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SensorBackendType {
    /// Generated scenes, no hardware needed
    Synthetic,
    /// 16-bit PNG depth recordings
    Replay,
    /// V4L2 Z16/Y16 depth nodes
    V4l2,
    /// Kinect v1 via freedepth
    Kinect,
}

impl std::fmt::Display for SensorBackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SensorBackendType::Synthetic => write!(f, "synthetic"),
            SensorBackendType::Replay => write!(f, "replay"),
            SensorBackendType::V4l2 => write!(f, "V4L2"),
            SensorBackendType::Kinect => write!(f, "Kinect"),
        }
    }
}

/// Which sensor to open, as stored in the config file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SensorSource {
    #[default]
    Synthetic,
    Replay {
        path: PathBuf,
        #[serde(default = "default_replay_fps")]
        fps: u32,
    },
    V4l2 {
        #[serde(default)]
        device: Option<String>,
    },
    Kinect {
        #[serde(default)]
        index: usize,
    },
}

fn default_replay_fps() -> u32 {
    crate::constants::synthetic::FPS
}

impl SensorSource {
    pub fn backend_type(&self) -> SensorBackendType {
        match self {
            SensorSource::Synthetic => SensorBackendType::Synthetic,
            SensorSource::Replay { .. } => SensorBackendType::Replay,
            SensorSource::V4l2 { .. } => SensorBackendType::V4l2,
            SensorSource::Kinect { .. } => SensorBackendType::Kinect,
        }
    }
}

/// Parses the `--sensor` flag
///
/// `synthetic`, `replay:PATH[@FPS]`, `v4l2[:/dev/videoN]`, `kinect[:INDEX]`
impl FromStr for SensorSource {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| ConfigError::InvalidSensor {
            value: s.to_string(),
            reason: reason.to_string(),
        };

        let (kind, arg) = match s.split_once(':') {
            Some((kind, arg)) => (kind, Some(arg)),
            None => (s, None),
        };

        match (kind.trim().to_lowercase().as_str(), arg) {
            ("synthetic", None) => Ok(SensorSource::Synthetic),
            ("replay", Some(arg)) => {
                let (path, fps) = match arg.rsplit_once('@') {
                    Some((path, fps)) => (
                        path,
                        fps.parse().map_err(|_| invalid("FPS is not a number"))?,
                    ),
                    None => (arg, default_replay_fps()),
                };
                if fps == 0 {
                    return Err(invalid("FPS must be positive"));
                }
                Ok(SensorSource::Replay {
                    path: PathBuf::from(path),
                    fps,
                })
            }
            ("replay", None) => Err(invalid("replay needs a path: replay:PATH[@FPS]")),
            ("v4l2", device) => Ok(SensorSource::V4l2 {
                device: device.map(str::to_string),
            }),
            ("kinect", index) => Ok(SensorSource::Kinect {
                index: index
                    .map(|i| i.parse().map_err(|_| invalid("INDEX is not a number")))
                    .transpose()?
                    .unwrap_or(0),
            }),
            _ => Err(invalid("unknown sensor, expected synthetic, replay, v4l2 or kinect")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pixel_count() {
        assert_eq!(FrameGeometry::new(640, 480).pixel_count(), 307_200);
        assert_eq!(FrameGeometry::new(0, 480).pixel_count(), 0);
        assert_eq!(FrameGeometry::new(512, 424).to_string(), "512x424");
    }

    #[test]
    fn test_parse_sensor_source() {
        assert_eq!(
            "synthetic".parse::<SensorSource>().unwrap(),
            SensorSource::Synthetic
        );
        assert_eq!(
            "replay:/tmp/rec@15".parse::<SensorSource>().unwrap(),
            SensorSource::Replay {
                path: PathBuf::from("/tmp/rec"),
                fps: 15
            }
        );
        assert_eq!(
            "v4l2:/dev/video2".parse::<SensorSource>().unwrap(),
            SensorSource::V4l2 {
                device: Some("/dev/video2".to_string())
            }
        );
        assert_eq!(
            "kinect".parse::<SensorSource>().unwrap(),
            SensorSource::Kinect { index: 0 }
        );
        assert!("replay".parse::<SensorSource>().is_err());
        assert!("replay:/tmp/rec@0".parse::<SensorSource>().is_err());
        assert!("webcam".parse::<SensorSource>().is_err());
    }

    #[test]
    fn test_sensor_source_json() {
        let source: SensorSource =
            serde_json::from_str(r#"{"kind":"replay","path":"rec"}"#).unwrap();
        assert_eq!(
            source,
            SensorSource::Replay {
                path: PathBuf::from("rec"),
                fps: 30
            }
        );
        assert_eq!(source.backend_type(), SensorBackendType::Replay);
    }
}
