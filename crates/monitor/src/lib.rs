//! Drowsiness Monitor
//!
//! Wires capture, landmark detection, eye-closure tracking and the alarm
//! into a single per-frame control loop.

pub mod monitor;
pub mod overlay;
pub mod settings;
#[cfg(feature = "live")]
pub mod window;

pub use monitor::{ExitReason, FrameReport, Monitor, RunSummary};
pub use overlay::{DirectorySink, FrameSink, NullSink, Overlay};
pub use settings::{CaptureDevice, CaptureSettings, OverlaySettings, Settings};
#[cfg(feature = "live")]
pub use window::WindowSink;

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use alerting::AlarmController;
use camera_capture::{CaptureError, FrameSource, ImageSequenceSource};
use dms::{DmsError, DmsModule, RecordedLandmarks};
use thiserror::Error;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Monitor error types
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("Capture error: {0}")]
    Capture(#[from] CaptureError),

    #[error("Detection error: {0}")]
    Dms(#[from] DmsError),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Frame sink error: {0}")]
    Sink(String),

    #[error("{0} requires building with the `live` feature")]
    Unsupported(&'static str),
}

/// Initialize logging; `RUST_LOG` overrides the default `info` level
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .finish();

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("Tracing subscriber already installed");
    }
}

/// Build the configured pipeline and run it until it exits
pub fn run(settings: &Settings, quit: Arc<AtomicBool>) -> Result<RunSummary, MonitorError> {
    let source = open_source(&settings.capture)?;
    let detector = RecordedLandmarks::load(&settings.dms.landmarks_path)?;
    let dms = DmsModule::new(&settings.dms, detector);
    let alarm = AlarmController::from_config(&settings.alarm);
    let sink = open_sink(settings, &quit)?;

    let mut monitor = Monitor::new(source, dms, alarm, sink, quit)
        .with_frame_size(settings.capture.width, settings.capture.height);

    info!("Sleeping Alert System Started. Press Ctrl-C to quit.");
    monitor.run()
}

/// Frame source selected by `capture.device`
pub fn open_source(capture: &CaptureSettings) -> Result<Box<dyn FrameSource>, MonitorError> {
    match capture.device {
        CaptureDevice::Frames => Ok(Box::new(ImageSequenceSource::open(capture.to_config())?)),
        #[cfg(feature = "live")]
        CaptureDevice::Camera => Ok(Box::new(camera_capture::CameraSource::open(capture.camera_index)?)),
        #[cfg(not(feature = "live"))]
        CaptureDevice::Camera => Err(MonitorError::Unsupported("Camera capture")),
    }
}

/// Frame sink selected by the overlay settings: window, directory or none
pub fn open_sink(settings: &Settings, quit: &Arc<AtomicBool>) -> Result<Box<dyn FrameSink>, MonitorError> {
    let overlay = &settings.overlay;
    if overlay.window {
        return open_window(&settings.capture, quit);
    }

    Ok(match &overlay.output_dir {
        Some(dir) => Box::new(DirectorySink::create(dir)?),
        None => Box::new(NullSink),
    })
}

#[cfg(feature = "live")]
fn open_window(capture: &CaptureSettings, quit: &Arc<AtomicBool>) -> Result<Box<dyn FrameSink>, MonitorError> {
    let window = WindowSink::open("Sleeping Alert", capture.width, capture.height, Arc::clone(quit))?;
    Ok(Box::new(window))
}

#[cfg(not(feature = "live"))]
fn open_window(_capture: &CaptureSettings, _quit: &Arc<AtomicBool>) -> Result<Box<dyn FrameSink>, MonitorError> {
    Err(MonitorError::Unsupported("Window display"))
}
