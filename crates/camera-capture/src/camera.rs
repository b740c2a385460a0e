//! Live camera source using nokhwa

use std::time::Instant;

use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{CameraIndex, RequestedFormat, RequestedFormatType};
use nokhwa::Camera;
use tracing::{info, warn};

use crate::frame::{PixelFormat, VideoFrame};
use crate::source::FrameSource;
use crate::CaptureError;

/// Frames from a local webcam, in RGB order
pub struct CameraSource {
    camera: Camera,
    started: Instant,
    sequence: u32,
    streaming: bool,
}

impl CameraSource {
    /// Open camera `index` at its highest frame rate
    pub fn open(index: u32) -> Result<Self, CaptureError> {
        let requested = RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestFrameRate);
        let mut camera = Camera::new(CameraIndex::Index(index), requested)
            .map_err(|e| CaptureError::Open(format!("camera {}: {}", index, e)))?;
        camera
            .open_stream()
            .map_err(|e| CaptureError::Open(format!("camera {}: {}", index, e)))?;

        let format = camera.camera_format();
        info!(
            "Opened camera {} ({}x{} @ {} fps)",
            index,
            format.resolution().width(),
            format.resolution().height(),
            format.frame_rate()
        );

        Ok(Self {
            camera,
            started: Instant::now(),
            sequence: 0,
            streaming: true,
        })
    }
}

impl FrameSource for CameraSource {
    fn next_frame(&mut self) -> Result<Option<VideoFrame>, CaptureError> {
        if !self.streaming {
            return Ok(None);
        }

        let sequence = self.sequence;
        let read_err = |reason: String| CaptureError::Read { sequence, reason };

        let buffer = self.camera.frame().map_err(|e| read_err(e.to_string()))?;
        let decoded = buffer
            .decode_image::<RgbFormat>()
            .map_err(|e| read_err(e.to_string()))?;

        let (width, height) = (decoded.width(), decoded.height());
        let timestamp_ns = self.started.elapsed().as_nanos() as u64;
        let frame = VideoFrame::new(decoded.into_raw(), width, height, PixelFormat::Rgb24, timestamp_ns, sequence)?;

        self.sequence += 1;
        Ok(Some(frame))
    }

    fn release(&mut self) {
        if !self.streaming {
            return;
        }
        self.streaming = false;
        if let Err(e) = self.camera.stop_stream() {
            warn!("Failed to stop camera stream: {}", e);
        }
        info!("Camera released after {} frames", self.sequence);
    }
}
