// SPDX-License-Identifier: GPL-3.0-only

//! Generated depth scene for running without hardware
//!
//! The scene is a back wall with a slight left-right slope, a box standing in
//! the near zone and a disc that sweeps back and forth through both zones.
//! About one pixel in a hundred is dropped to zero, like the speckle a real
//! structured-light sensor produces at edges and on dark surfaces.

use std::time::{Duration, Instant};

use tracing::debug;

use super::frame_loop::{CaptureLoop, LoopAction};
use super::latest::{HeldFrame, LatestFrameSlot};
use super::{
    DepthFrame, DepthSensor, FrameGeometry, FrameToken, SensorBackendType, SensorDevice,
};
use crate::constants::{DEPTH_MAX_MM, DEPTH_MIN_MM, synthetic};
use crate::errors::{SensorError, SensorResult};

const WALL_MM: f32 = 2600.0;
const WALL_SLOPE_MM: f32 = 200.0;
const BOX_MM: u16 = 1200;
const SWEEP_NEAR_MM: f32 = 800.0;
const SWEEP_FAR_MM: f32 = 2400.0;
const SWEEP_PERIOD_SECS: f32 = 4.0;

/// Render one scene frame at time `t` seconds into `out` (origin top-left)
pub fn render_scene(geometry: FrameGeometry, t: f32, sequence: u64, out: &mut [u16]) {
    let width = geometry.width as usize;
    let height = geometry.height as usize;
    if width == 0 || height == 0 {
        return;
    }

    // Triangle wave 0..1..0 over one period
    let phase = (t / SWEEP_PERIOD_SECS).fract();
    let sweep = 1.0 - (2.0 * phase - 1.0).abs();
    let disc_depth = (SWEEP_NEAR_MM + (SWEEP_FAR_MM - SWEEP_NEAR_MM) * sweep) as u16;
    let disc_x = width as f32 * (0.35 + 0.3 * sweep);
    let disc_y = height as f32 * 0.5;
    let radius = height as f32 / 5.0;

    let box_x = width / 10..width / 4;
    let box_y = height / 3..height * 5 / 6;

    for (y, row) in out.chunks_exact_mut(width).take(height).enumerate() {
        for (x, sample) in row.iter_mut().enumerate() {
            if is_speckle(x, y, sequence) {
                *sample = 0;
                continue;
            }

            let dx = x as f32 - disc_x;
            let dy = y as f32 - disc_y;
            *sample = if dx * dx + dy * dy <= radius * radius {
                disc_depth
            } else if box_x.contains(&x) && box_y.contains(&y) {
                BOX_MM
            } else {
                let slope = x as f32 / width as f32 - 0.5;
                (WALL_MM + WALL_SLOPE_MM * slope) as u16
            }
            .clamp(DEPTH_MIN_MM, DEPTH_MAX_MM);
        }
    }
}

/// Deterministic ~1% dropout per pixel and frame
fn is_speckle(x: usize, y: usize, sequence: u64) -> bool {
    let mut h = (x as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15)
        ^ (y as u64).wrapping_mul(0xC2B2_AE3D_27D4_EB4F)
        ^ sequence.wrapping_mul(0x1656_67B1_9E37_79F9);
    h ^= h >> 29;
    h = h.wrapping_mul(0xBF58_476D_1CE4_E5B9);
    h ^= h >> 32;
    h % 100 == 0
}

struct SceneState {
    geometry: FrameGeometry,
    interval: Duration,
    started: Instant,
    next_due: Instant,
    sequence: u64,
    slot: LatestFrameSlot,
}

impl SceneState {
    fn step(&mut self) -> LoopAction {
        let now = Instant::now();
        if now < self.next_due {
            std::thread::sleep(self.next_due - now);
        }
        self.next_due += self.interval;

        self.sequence += 1;
        let mut depth_mm = vec![0u16; self.geometry.pixel_count()];
        let t = self.started.elapsed().as_secs_f32();
        render_scene(self.geometry, t, self.sequence, &mut depth_mm);

        self.slot.publish(DepthFrame {
            sequence: self.sequence,
            width: self.geometry.width,
            height: self.geometry.height,
            depth_mm,
        });

        if self.sequence % 300 == 0 {
            debug!(
                sequence = self.sequence,
                dropped = self.slot.dropped_count(),
                "Synthetic frames published"
            );
        }
        LoopAction::Continue
    }
}

/// Depth sensor backed by [`render_scene`]
pub struct SyntheticSensor {
    geometry: FrameGeometry,
    fps: u32,
    slot: LatestFrameSlot,
    held: HeldFrame,
    capture: Option<CaptureLoop>,
}

impl SyntheticSensor {
    pub fn new(geometry: FrameGeometry, fps: u32) -> Self {
        Self {
            geometry,
            fps: fps.max(1),
            slot: LatestFrameSlot::new(),
            held: HeldFrame::default(),
            capture: None,
        }
    }
}

impl Default for SyntheticSensor {
    fn default() -> Self {
        Self::new(
            FrameGeometry::new(synthetic::WIDTH, synthetic::HEIGHT),
            synthetic::FPS,
        )
    }
}

impl DepthSensor for SyntheticSensor {
    fn backend_type(&self) -> SensorBackendType {
        SensorBackendType::Synthetic
    }

    fn enumerate_devices(&self) -> Vec<SensorDevice> {
        vec![SensorDevice {
            name: "Synthetic depth scene".to_string(),
            path: format!("synthetic:{}@{}", self.geometry, self.fps),
            driver: "synthetic".to_string(),
        }]
    }

    fn open(&mut self, _device: &SensorDevice) -> SensorResult<()> {
        if self.capture.is_some() {
            return Ok(());
        }

        let geometry = self.geometry;
        let interval = Duration::from_secs_f64(1.0 / f64::from(self.fps));
        let slot = self.slot.clone();

        let capture = CaptureLoop::spawn(
            "synthetic-depth",
            move || {
                let now = Instant::now();
                Ok(SceneState {
                    geometry,
                    interval,
                    started: now,
                    next_due: now,
                    sequence: 0,
                    slot,
                })
            },
            SceneState::step,
        )?;

        self.capture = Some(capture);
        Ok(())
    }

    fn close(&mut self) {
        if let Some(mut capture) = self.capture.take() {
            capture.stop();
        }
        self.slot.clear();
        self.held.clear();
    }

    fn is_open(&self) -> bool {
        self.capture.is_some()
    }

    fn frame_geometry(&self) -> SensorResult<FrameGeometry> {
        if self.is_open() {
            Ok(self.geometry)
        } else {
            Err(SensorError::GeometryUnavailable)
        }
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

impl Drop for SyntheticSensor {
    fn drop(&mut self) {
        self.close();
    }
}
