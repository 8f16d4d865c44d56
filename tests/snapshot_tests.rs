// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests: recorded depth frames through the pipeline into PNG files

use std::path::PathBuf;
use std::time::{Duration, Instant};

use depth_roi::backends::sensor::{FrameGeometry, SensorSession, SensorSource, create_sensor};
use depth_roi::pipelines::depth::{DepthPipeline, RoiConfig, TickOutcome};
use depth_roi::presenters::snapshot::PngPresenter;
use image::{ImageBuffer, Luma};

/// Tick until one frame is presented or the deadline passes
fn present_one(
    pipeline: &mut DepthPipeline,
    session: &mut SensorSession,
    presenter: &mut PngPresenter,
) -> TickOutcome {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        let outcome = pipeline.tick(session, presenter);
        if matches!(outcome, TickOutcome::Presented { .. } | TickOutcome::Halted)
            || Instant::now() > deadline
        {
            return outcome;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn test_replay_to_png_is_upright() {
    let dir = tempfile::tempdir().unwrap();
    let recording = dir.path().join("recording");
    std::fs::create_dir(&recording).unwrap();

    // Top row: near, near, mid, mid; bottom row: no readings
    let depth: Vec<u16> = vec![1200, 1200, 1600, 1600, 0, 0, 0, 0];
    let frame: ImageBuffer<Luma<u16>, Vec<u16>> = ImageBuffer::from_raw(4, 2, depth).unwrap();
    frame.save(recording.join("0001.png")).unwrap();

    let source = SensorSource::Replay {
        path: recording,
        fps: 100,
    };
    let mut session = SensorSession::new(create_sensor(&source).unwrap());
    assert_eq!(session.open().unwrap(), FrameGeometry::new(4, 2));

    let output: PathBuf = dir.path().join("out").join("latest.png");
    let mut presenter = PngPresenter::new(&output);
    let mut pipeline = DepthPipeline::new(RoiConfig::default());

    assert!(matches!(
        present_one(&mut pipeline, &mut session, &mut presenter),
        TickOutcome::Presented { .. }
    ));
    session.close();
    assert_eq!(presenter.written(), 1);

    let image = image::open(&output).unwrap().into_rgba8();
    assert_eq!(image.dimensions(), (4, 2));
    assert_eq!(image.get_pixel(0, 0).0, [255, 0, 0, 255]);
    assert_eq!(image.get_pixel(1, 0).0, [255, 0, 0, 255]);
    assert_eq!(image.get_pixel(2, 0).0, [0, 255, 0, 255]);
    assert_eq!(image.get_pixel(3, 0).0, [0, 255, 0, 255]);
    for x in 0..4 {
        assert_eq!(image.get_pixel(x, 1).0, [0, 0, 0, 255]);
    }
}

#[test]
fn test_synthetic_sensor_end_to_end() {
    let mut session = SensorSession::new(create_sensor(&SensorSource::Synthetic).unwrap());
    let geometry = session.open().unwrap();

    let dir = tempfile::tempdir().unwrap();
    let mut presenter = PngPresenter::new(dir.path().join("synthetic.png"));
    let mut pipeline = DepthPipeline::default();

    assert!(matches!(
        present_one(&mut pipeline, &mut session, &mut presenter),
        TickOutcome::Presented { .. }
    ));
    assert_eq!(pipeline.stats().total(), geometry.pixel_count());
    assert!(pipeline.last_frame(geometry).is_some());

    session.close();
    assert!(!session.is_open());
}
