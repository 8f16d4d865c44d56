// SPDX-License-Identifier: GPL-3.0-only

//! Playback of recorded depth frames
//!
//! A recording is a single 16-bit grayscale PNG or a directory of them, one
//! frame per file, each sample a distance in millimeters. Directory frames are
//! played in file-name order and loop forever at the configured rate.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use super::frame_loop::{CaptureLoop, LoopAction};
use super::latest::{HeldFrame, LatestFrameSlot};
use super::{
    DepthFrame, DepthSensor, FrameGeometry, FrameToken, SensorBackendType, SensorDevice,
};
use crate::constants::file_formats::is_depth_image_extension;
use crate::errors::{SensorError, SensorResult};

/// Frame files of a recording, sorted by name
///
/// Returns an empty list when `path` does not exist or holds no depth images.
pub fn list_frames(path: &Path) -> Vec<PathBuf> {
    if path.is_file() {
        return vec![path.to_path_buf()];
    }

    let Ok(entries) = std::fs::read_dir(path) else {
        return Vec::new();
    };

    let mut frames: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|p| p.is_file())
        .filter(|p| {
            p.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(is_depth_image_extension)
        })
        .collect();
    frames.sort();
    frames
}

/// Decode one depth PNG into millimeter samples
pub fn load_depth_image(path: &Path) -> SensorResult<(FrameGeometry, Vec<u16>)> {
    let image = image::open(path)
        .map_err(|e| SensorError::Backend(format!("{}: {}", path.display(), e)))?
        .into_luma16();
    let geometry = FrameGeometry::new(image.width(), image.height());
    Ok((geometry, image.into_raw()))
}

struct ReplayState {
    frames: Vec<PathBuf>,
    next_index: usize,
    interval: Duration,
    next_due: Instant,
    sequence: u64,
    failures_in_pass: usize,
    slot: LatestFrameSlot,
}

impl ReplayState {
    fn step(&mut self) -> LoopAction {
        let now = Instant::now();
        if now < self.next_due {
            std::thread::sleep(self.next_due - now);
        }
        self.next_due += self.interval;

        let path = &self.frames[self.next_index];
        self.next_index = (self.next_index + 1) % self.frames.len();
        if self.next_index == 0 {
            debug!(
                frames = self.frames.len(),
                published = self.slot.published_count(),
                dropped = self.slot.dropped_count(),
                "Replay looped"
            );
        }

        match load_depth_image(path) {
            Ok((geometry, depth_mm)) => {
                self.failures_in_pass = 0;
                self.sequence += 1;
                self.slot.publish(DepthFrame {
                    sequence: self.sequence,
                    width: geometry.width,
                    height: geometry.height,
                    depth_mm,
                });
                LoopAction::Continue
            }
            Err(e) => {
                warn!(error = %e, "Skipping unreadable depth frame");
                self.failures_in_pass += 1;
                if self.failures_in_pass >= self.frames.len() {
                    warn!("No readable frames in recording, stopping replay");
                    LoopAction::Stop
                } else {
                    LoopAction::Continue
                }
            }
        }
    }
}

/// Depth sensor that plays back PNG recordings
pub struct ReplaySensor {
    path: PathBuf,
    fps: u32,
    geometry: Option<FrameGeometry>,
    slot: LatestFrameSlot,
    held: HeldFrame,
    capture: Option<CaptureLoop>,
}

impl ReplaySensor {
    pub fn new(path: PathBuf, fps: u32) -> Self {
        Self {
            path,
            fps: fps.max(1),
            geometry: None,
            slot: LatestFrameSlot::new(),
            held: HeldFrame::default(),
            capture: None,
        }
    }
}

impl DepthSensor for ReplaySensor {
    fn backend_type(&self) -> SensorBackendType {
        SensorBackendType::Replay
    }

    fn enumerate_devices(&self) -> Vec<SensorDevice> {
        let frames = list_frames(&self.path);
        if frames.is_empty() {
            debug!(path = %self.path.display(), "No depth frames in recording");
            return Vec::new();
        }

        vec![SensorDevice {
            name: format!("Recording ({} frames)", frames.len()),
            path: self.path.display().to_string(),
            driver: "replay".to_string(),
        }]
    }

    fn open(&mut self, _device: &SensorDevice) -> SensorResult<()> {
        if self.capture.is_some() {
            return Ok(());
        }

        let frames = list_frames(&self.path);
        let Some(first) = frames.first() else {
            return Err(SensorError::NoDeviceFound);
        };

        // Geometry comes from the first frame's header
        let (width, height) = image::image_dimensions(first)
            .map_err(|e| SensorError::Backend(format!("{}: {}", first.display(), e)))?;
        let geometry = FrameGeometry::new(width, height);

        info!(
            path = %self.path.display(),
            frames = frames.len(),
            fps = self.fps,
            %geometry,
            "Opening depth recording"
        );

        let interval = Duration::from_secs_f64(1.0 / f64::from(self.fps));
        let slot = self.slot.clone();
        let capture = CaptureLoop::spawn(
            "replay-depth",
            move || {
                Ok(ReplayState {
                    frames,
                    next_index: 0,
                    interval,
                    next_due: Instant::now(),
                    sequence: 0,
                    failures_in_pass: 0,
                    slot,
                })
            },
            ReplayState::step,
        )?;

        self.geometry = Some(geometry);
        self.capture = Some(capture);
        Ok(())
    }

    fn close(&mut self) {
        if let Some(mut capture) = self.capture.take() {
            capture.stop();
        }
        self.geometry = None;
        self.slot.clear();
        self.held.clear();
    }

    fn is_open(&self) -> bool {
        self.capture.is_some()
    }

    fn frame_geometry(&self) -> SensorResult<FrameGeometry> {
        self.geometry.ok_or(SensorError::GeometryUnavailable)
    }

    fn acquire_latest_frame(&mut self) -> Option<FrameToken> {
        if !self.is_open() {
            return None;
        }
        self.held.acquire(&self.slot)
    }

    fn copy_frame_data(&mut self, frame: &FrameToken, dst: &mut [u16]) -> SensorResult<()> {
        self.held.copy(frame, dst)
    }

    fn release_frame(&mut self, frame: FrameToken) {
        self.held.release(frame);
    }
}

impl Drop for ReplaySensor {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Luma};

    fn write_frame(path: &Path, width: u32, height: u32, value: u16) {
        let image: ImageBuffer<Luma<u16>, Vec<u16>> =
            ImageBuffer::from_pixel(width, height, Luma([value]));
        image.save(path).unwrap();
    }

    #[test]
    fn test_list_frames_sorted_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        write_frame(&dir.path().join("0002.png"), 2, 2, 1);
        write_frame(&dir.path().join("0001.png"), 2, 2, 1);
        std::fs::write(dir.path().join("notes.txt"), "not a frame").unwrap();

        let frames = list_frames(dir.path());
        let names: Vec<_> = frames
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["0001.png", "0002.png"]);
    }

    #[test]
    fn test_load_depth_image_keeps_millimeters() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.png");
        write_frame(&path, 3, 2, 1234);

        let (geometry, depth) = load_depth_image(&path).unwrap();
        assert_eq!(geometry, FrameGeometry::new(3, 2));
        assert_eq!(depth, vec![1234; 6]);
    }

    #[test]
    fn test_empty_recording_has_no_device() {
        let dir = tempfile::tempdir().unwrap();
        let sensor = ReplaySensor::new(dir.path().to_path_buf(), 30);
        assert!(sensor.enumerate_devices().is_empty());
        assert!(sensor.default_device().is_none());
    }

    #[test]
    fn test_replay_streams_recorded_frames() {
        let dir = tempfile::tempdir().unwrap();
        write_frame(&dir.path().join("a.png"), 4, 2, 1200);

        let mut sensor = ReplaySensor::new(dir.path().to_path_buf(), 100);
        let device = sensor.default_device().unwrap();
        sensor.open(&device).unwrap();
        assert_eq!(sensor.frame_geometry().unwrap(), FrameGeometry::new(4, 2));

        let deadline = Instant::now() + Duration::from_secs(2);
        let token = loop {
            if let Some(token) = sensor.acquire_latest_frame() {
                break token;
            }
            assert!(Instant::now() < deadline, "no replay frame");
            std::thread::sleep(Duration::from_millis(2));
        };

        let mut dst = vec![0u16; token.length_in_pixels()];
        sensor.copy_frame_data(&token, &mut dst).unwrap();
        assert_eq!(dst, vec![1200; 8]);
        assert!(sensor.slot.published_count() >= token.sequence());
        sensor.release_frame(token);
        sensor.close();
    }
}
