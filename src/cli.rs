// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands for depth sensor operations
//!
//! This module provides command-line functionality for:
//! - Listing available depth sensors
//! - Saving a classified snapshot without a UI
//! - Showing and creating the config file

use depth_roi::backends::sensor::{SensorSession, create_sensor};
use depth_roi::constants::timing::SNAPSHOT_TIMEOUT;
use depth_roi::errors::ConfigError;
use depth_roi::presenters::snapshot::{save_png, snapshot_path};
use depth_roi::{
    AppError, AppResult, Config, DepthPipeline, FrameView, FrontBuffer, RoiBand, SensorError,
    SensorSource, TickOutcome,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tracing::error;

/// Load the config file and apply command-line overrides
pub fn load_config(
    path: Option<&Path>,
    sensor: Option<SensorSource>,
    rois: Vec<RoiBand>,
) -> AppResult<Config> {
    let config = match path {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    let config = config.with_overrides(sensor, rois);
    config.validate()?;
    Ok(config)
}

/// List the devices the configured backend can see
pub fn list_sensors(config: &Config) -> AppResult<()> {
    let sensor = create_sensor(&config.sensor)?;
    let devices = sensor.enumerate_devices();

    if devices.is_empty() {
        println!("No {} depth sensors found.", sensor.backend_type());
        return Ok(());
    }

    println!("Available {} depth sensors:", sensor.backend_type());
    println!();
    for (index, device) in devices.iter().enumerate() {
        println!("  [{}] {}", index, device.name);
        println!("      Path: {}", device.path);
        println!("      Driver: {}", device.driver);
        println!();
    }

    Ok(())
}

/// Run the pipeline headlessly for `frames` frames and save the last one
pub fn snapshot(
    config: &Config,
    frames: u64,
    output: Option<PathBuf>,
) -> AppResult<()> {
    let mut session = SensorSession::new(create_sensor(&config.sensor)?);
    let geometry = match session.open() {
        Ok(geometry) => geometry,
        Err(SensorError::NoDeviceFound) => {
            error!(backend = %config.sensor.backend_type(), "No depth sensor found");
            println!("No depth sensor found for {}.", config.sensor.backend_type());
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };
    if let Some(device) = session.device() {
        println!("Using sensor: {}", device.name);
    }
    println!("Frame size: {}", geometry);

    // Set up Ctrl+C handler
    let stop_flag = Arc::new(AtomicBool::new(false));
    let stop_flag_clone = stop_flag.clone();
    ctrlc::set_handler(move || {
        stop_flag_clone.store(true, Ordering::SeqCst);
    })
    .map_err(|e| AppError::Other(format!("Failed to install Ctrl+C handler: {}", e)))?;

    let mut pipeline = DepthPipeline::new(config.rois.clone());
    let mut surface = FrontBuffer::new();
    let wanted = frames.max(1);
    let start = Instant::now();

    println!("Capturing...");
    while surface.frames() < wanted {
        if stop_flag.load(Ordering::SeqCst) {
            println!("Stopping early...");
            break;
        }
        if start.elapsed() > SNAPSHOT_TIMEOUT {
            error!(presented = surface.frames(), wanted, "Timed out waiting for depth frames");
            break;
        }

        match pipeline.tick(&mut session, &mut surface) {
            TickOutcome::Presented { .. } => continue,
            TickOutcome::Halted => {
                session.close();
                let reason = pipeline
                    .halt_reason()
                    .map(|e| e.to_string())
                    .unwrap_or_default();
                return Err(AppError::Other(format!("Depth pipeline halted: {}", reason)));
            }
            TickOutcome::NoFrame | TickOutcome::Skipped => {
                std::thread::sleep(config.tick_interval());
            }
        }
    }
    session.close();

    let Some((color, geometry)) = surface.front() else {
        return Err(AppError::Other("Failed to capture a depth frame".to_string()));
    };

    let path = match output {
        Some(path) => path,
        None => snapshot_path(&config.snapshot_dir()),
    };
    save_png(
        &path,
        FrameView {
            color,
            geometry,
            stats: surface.stats(),
            sequence: surface.sequence(),
        },
    )?;

    for (index, band) in config.rois.bands().iter().enumerate() {
        println!(
            "  {}: {:.1}%",
            band.name,
            surface.stats().zone_fraction(index) * 100.0
        );
    }
    println!("Snapshot saved: {}", path.display());
    Ok(())
}

/// Print the effective configuration as JSON
pub fn show_config(
    path: Option<&Path>,
    sensor: Option<SensorSource>,
    rois: Vec<RoiBand>,
) -> AppResult<()> {
    let config = load_config(path, sensor, rois)?;
    if let Some(path) = path {
        println!("# {}", path.display());
    }
    let text = serde_json::to_string_pretty(&config).map_err(ConfigError::from)?;
    println!("{}", text);
    Ok(())
}

/// Write the default configuration, refusing to clobber an existing file
pub fn init_config(path: Option<&Path>, force: bool) -> AppResult<()> {
    let path = path
        .ok_or_else(|| AppError::Other("No config directory available, pass --config".into()))?;
    if path.exists() && !force {
        return Err(AppError::Other(format!(
            "{} already exists (use --force to overwrite)",
            path.display()
        )));
    }

    Config::default().save(path)?;
    println!("Config written: {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_config_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        init_config(Some(path.as_path()), false).unwrap();
        assert!(matches!(
            init_config(Some(path.as_path()), false),
            Err(AppError::Other(_))
        ));
        init_config(Some(path.as_path()), true).unwrap();
        assert!(matches!(init_config(None, false), Err(AppError::Other(_))));
    }

    #[test]
    fn test_load_config_reports_config_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ broken").unwrap();

        assert!(matches!(
            load_config(Some(path.as_path()), None, Vec::new()),
            Err(AppError::Config(ConfigError::Parse(_)))
        ));
    }

    #[test]
    fn test_load_config_applies_overrides() {
        let band: RoiBand = "hand:300:600:#0000ff".parse().unwrap();
        let sensor = Some(SensorSource::Kinect { index: 2 });
        let config = load_config(None, sensor, vec![band]).unwrap();
        assert_eq!(config.sensor, SensorSource::Kinect { index: 2 });
        assert_eq!(config.rois.len(), 1);
    }

    #[test]
    fn test_list_without_backend_support_is_a_sensor_error() {
        // Only meaningful when the Kinect backend is compiled out
        if cfg!(all(target_arch = "x86_64", feature = "freedepth")) {
            return;
        }
        let config = Config {
            sensor: SensorSource::Kinect { index: 0 },
            ..Config::default()
        };
        assert!(matches!(
            list_sensors(&config),
            Err(AppError::Sensor(SensorError::Backend(_)))
        ));
    }
}
