// SPDX-License-Identifier: GPL-3.0-only

//! Terminal-based ROI viewer
//!
//! Renders the composed color buffer to the terminal using Unicode half-block
//! characters for improved vertical resolution. The status bar shows how
//! much of the view each zone covers.

use std::io::{self, stdout};
use std::path::{Path, PathBuf};

use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Terminal, backend::CrosstermBackend, buffer::Buffer, layout::Rect, style::Color,
    widgets::Widget,
};
use tracing::{error, info, warn};

use crate::backends::sensor::{SensorSession, create_sensor};
use crate::config::Config;
use crate::errors::{ConfigResult, PresentResult, SensorError};
use crate::pipelines::depth::{DepthPipeline, RoiBand, RoiConfig, TickOutcome, ZoneStats};
use crate::presenters::snapshot::{save_png, snapshot_path};
use crate::presenters::{FrameView, FrontBuffer, Presenter};

/// Run the terminal viewer
///
/// `config_path` is re-read when the user presses `r`; `roi_overrides` (the
/// `--roi` bands) are applied again on every reload.
pub fn run(
    config: Config,
    config_path: Option<PathBuf>,
    roi_overrides: Vec<RoiBand>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut session = SensorSession::new(create_sensor(&config.sensor)?);

    // Open before taking over the screen so errors stay readable
    match session.open() {
        Ok(geometry) => info!(%geometry, "Depth stream ready"),
        Err(SensorError::NoDeviceFound) => {
            error!(backend = %config.sensor.backend_type(), "No depth sensor found");
            eprintln!("No depth sensor found for {}.", config.sensor.backend_type());
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    }

    // Set up terminal
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Run the app
    let result = run_app(
        &mut terminal,
        &mut session,
        config,
        config_path.as_deref(),
        &roi_overrides,
    );

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    session.close();
    result
}

fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    session: &mut SensorSession,
    mut config: Config,
    config_path: Option<&Path>,
    roi_overrides: &[RoiBand],
) -> Result<(), Box<dyn std::error::Error>> {
    let mut pipeline = DepthPipeline::new(config.rois.clone());
    let mut frame_widget = FrameWidget::new();
    let mut show_help = false;
    let mut notice: Option<String> = None;

    loop {
        // One pipeline cycle per loop iteration
        if pipeline.tick(session, &mut frame_widget) == TickOutcome::Halted
            && notice.is_none()
            && let Some(reason) = pipeline.halt_reason()
        {
            notice = Some(format!("Halted: {}", reason));
        }

        let status_message = if show_help {
            build_help_message()
        } else if let Some(notice) = &notice {
            notice.clone()
        } else {
            build_status_message(pipeline.rois(), frame_widget.surface.stats())
        };

        // Draw
        terminal.draw(|f| {
            let area = f.area();

            // Reserve bottom line for status
            let frame_area = Rect {
                x: area.x,
                y: area.y,
                width: area.width,
                height: area.height.saturating_sub(1),
            };

            f.render_widget(&frame_widget, frame_area);

            let status_area = Rect {
                x: area.x,
                y: area.height.saturating_sub(1),
                width: area.width,
                height: 1,
            };

            let status = StatusBar {
                message: &status_message,
            };
            f.render_widget(status, status_area);
        })?;

        // Input doubles as the tick timer
        if event::poll(config.tick_interval())?
            && let Event::Key(key) = event::read()?
            && key.kind == KeyEventKind::Press
        {
            // Ctrl+C to quit
            if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
                break;
            }

            match key.code {
                KeyCode::Char('q') => break,
                KeyCode::Char('p') => {
                    show_help = false;
                    notice = Some(match frame_widget.save_snapshot(&config.snapshot_dir()) {
                        Ok(Some(path)) => format!("Saved: {}", path.display()),
                        Ok(None) => "No frame yet".to_string(),
                        Err(e) => {
                            error!("Failed to save snapshot: {}", e);
                            format!("Error: {}", e)
                        }
                    });
                }
                KeyCode::Char('r') => {
                    show_help = false;
                    notice = Some(match reload_config(config_path, roi_overrides) {
                        Ok(reloaded) => {
                            pipeline.reconfigure(reloaded.rois.clone());
                            config = Config {
                                sensor: config.sensor.clone(),
                                ..reloaded
                            };
                            format!("Reloaded {} bands", config.rois.len())
                        }
                        Err(e) => {
                            warn!("Failed to reload config: {}", e);
                            format!("Error: {}", e)
                        }
                    });
                }
                KeyCode::Char('h') => {
                    show_help = !show_help;
                }
                // Any other key clears the last notice
                _ => {
                    if !pipeline.is_halted() {
                        notice = None;
                    }
                }
            }
        }
    }

    Ok(())
}

/// Re-read and validate the config file; the sensor stays as opened
fn reload_config(path: Option<&Path>, roi_overrides: &[RoiBand]) -> ConfigResult<Config> {
    let config = match path {
        Some(path) => Config::load(path)?,
        None => Config::load_default()?,
    };
    let config = config.with_overrides(None, roi_overrides.to_vec());
    config.validate()?;
    Ok(config)
}

fn build_status_message(rois: &RoiConfig, stats: &ZoneStats) -> String {
    let mut msg = String::new();
    for (index, band) in rois.bands().iter().enumerate() {
        msg.push_str(&format!(
            "{} {:.1}% | ",
            band.name,
            stats.zone_fraction(index) * 100.0
        ));
    }
    msg.push_str("'p' snapshot | 'h' help | 'q' quit");
    msg
}

fn build_help_message() -> String {
    "p: Save snapshot | r: Reload config | h: Toggle help | q/Ctrl+C: Quit".to_string()
}

/// Widget that renders the composed frame using half-block characters
///
/// Also the pipeline's presenter: frames are swapped into its front buffer
/// whole, and drawing only ever reads the front buffer.
struct FrameWidget {
    surface: FrontBuffer,
}

impl FrameWidget {
    fn new() -> Self {
        Self {
            surface: FrontBuffer::new(),
        }
    }

    /// Save the displayed frame as PNG into `dir`
    fn save_snapshot(&self, dir: &Path) -> PresentResult<Option<PathBuf>> {
        let Some((color, geometry)) = self.surface.front() else {
            return Ok(None);
        };

        let path = snapshot_path(dir);
        save_png(
            &path,
            FrameView {
                color,
                geometry,
                stats: self.surface.stats(),
                sequence: self.surface.sequence(),
            },
        )?;
        Ok(Some(path))
    }
}

impl Presenter for FrameWidget {
    fn present(&mut self, frame: FrameView<'_>) -> PresentResult<()> {
        self.surface.present(frame)
    }
}

impl Widget for &FrameWidget {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let Some((color, geometry)) = self.surface.front() else {
            // No frame yet - show placeholder
            let msg = "Waiting for depth frames...";
            let x = area.x + (area.width.saturating_sub(msg.len() as u16)) / 2;
            let y = area.y + area.height / 2;
            if y < area.y + area.height && x < area.x + area.width {
                buf.set_string(x, y, msg, ratatui::style::Style::default());
            }
            return;
        };

        if geometry.width == 0 || geometry.height == 0 || area.width == 0 || area.height == 0 {
            return;
        }

        // Calculate display dimensions maintaining aspect ratio
        // Each terminal cell displays 2 vertical pixels using half-block characters
        let frame_aspect = geometry.width as f64 / geometry.height as f64;
        let term_width = area.width as f64;
        let term_height = (area.height * 2) as f64;

        let (display_width, display_height) = if term_width / term_height > frame_aspect {
            let h = term_height;
            let w = h * frame_aspect;
            (w as u16, (h / 2.0) as u16)
        } else {
            let w = term_width;
            let h = w / frame_aspect;
            (w as u16, (h / 2.0) as u16)
        };
        if display_width == 0 || display_height == 0 {
            return;
        }

        // Center the image
        let x_offset = area.x + (area.width.saturating_sub(display_width)) / 2;
        let y_offset = area.y + (area.height.saturating_sub(display_height)) / 2;

        let x_scale = geometry.width as f64 / display_width as f64;
        let y_scale = geometry.height as f64 / (display_height * 2) as f64;

        // Sample in display coordinates (top row first); the buffer's origin is
        // bottom-left, so display row y is buffer row H - 1 - y
        let sample = |x: u32, y: u32| -> Color {
            let x = x.min(geometry.width - 1);
            let y = y.min(geometry.height - 1);
            let px = color
                .get(geometry, x, geometry.height - 1 - y)
                .unwrap_or_default();
            Color::Rgb(px.r, px.g, px.b)
        };

        for ty in 0..display_height {
            for tx in 0..display_width {
                let term_x = x_offset + tx;
                let term_y = y_offset + ty;

                if term_x >= area.x + area.width || term_y >= area.y + area.height {
                    continue;
                }

                let src_x = (tx as f64 * x_scale) as u32;
                let src_y_top = (ty as f64 * 2.0 * y_scale) as u32;
                let src_y_bottom = ((ty as f64 * 2.0 + 1.0) * y_scale) as u32;

                if let Some(cell) = buf.cell_mut((term_x, term_y)) {
                    cell.set_char('▀');
                    cell.set_fg(sample(src_x, src_y_top));
                    cell.set_bg(sample(src_x, src_y_bottom));
                }
            }
        }
    }
}

/// Status bar widget
struct StatusBar<'a> {
    message: &'a str,
}

impl Widget for StatusBar<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        // Fill background
        for x in area.x..area.x + area.width {
            if let Some(cell) = buf.cell_mut((x, area.y)) {
                cell.set_char(' ');
                cell.set_bg(Color::DarkGray);
            }
        }

        let text: String = self.message.chars().take(area.width as usize).collect();
        buf.set_string(
            area.x,
            area.y,
            text,
            ratatui::style::Style::default()
                .fg(Color::White)
                .bg(Color::DarkGray),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::sensor::FrameGeometry;
    use crate::pipelines::depth::compose;

    #[test]
    fn test_status_message_lists_zones() {
        let stats = ZoneStats {
            invalid: 0,
            background: 2,
            zones: vec![1, 1],
        };
        let msg = build_status_message(&RoiConfig::default(), &stats);
        assert!(msg.starts_with("near 25.0% | mid 25.0% | "));
        assert!(msg.ends_with("'q' quit"));
    }

    #[test]
    fn test_widget_draws_top_row_first() {
        // 1x2 frame: top source pixel near (red), bottom mid (green)
        let geometry = FrameGeometry::new(1, 2);
        let color = compose(&[1200, 1600], geometry, &RoiConfig::default());
        let stats = ZoneStats::default();
        let mut widget = FrameWidget::new();
        widget
            .present(FrameView {
                color: &color,
                geometry,
                stats: &stats,
                sequence: 1,
            })
            .unwrap();

        let area = Rect::new(0, 0, 1, 1);
        let mut buf = Buffer::empty(area);
        (&widget).render(area, &mut buf);

        let cell = &buf[(0, 0)];
        assert_eq!(cell.symbol(), "▀");
        assert_eq!(cell.fg, Color::Rgb(255, 0, 0));
        assert_eq!(cell.bg, Color::Rgb(0, 255, 0));
    }

    #[test]
    fn test_reload_keeps_command_line_bands() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let band = RoiBand::new("hand", 300, 600, crate::pipelines::depth::Rgba8::BLACK);

        // No file yet: defaults plus the override
        let config = reload_config(Some(path.as_path()), std::slice::from_ref(&band)).unwrap();
        assert_eq!(config.rois.bands(), std::slice::from_ref(&band));

        // A file on disk still loses its bands to the override
        Config {
            tick_interval_ms: 50,
            ..Config::default()
        }
        .save(&path)
        .unwrap();
        let config = reload_config(Some(path.as_path()), std::slice::from_ref(&band)).unwrap();
        assert_eq!(config.tick_interval_ms, 50);
        assert_eq!(config.rois.bands(), std::slice::from_ref(&band));

        // Without overrides the file's bands are used
        let config = reload_config(Some(path.as_path()), &[]).unwrap();
        assert_eq!(config.rois, RoiConfig::default());
    }

    #[test]
    fn test_snapshot_without_frame() {
        let dir = tempfile::tempdir().unwrap();
        let widget = FrameWidget::new();
        assert!(widget.save_snapshot(dir.path()).unwrap().is_none());
    }
}
