//! Frame sources

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::{debug, info};

use crate::frame::VideoFrame;
use crate::{CaptureConfig, CaptureError};

const IMAGE_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "bmp"];

/// Pull-model source of BGR frames.
///
/// `Ok(None)` marks the end of the stream; an error is fatal for the caller.
pub trait FrameSource {
    /// Read the next frame
    fn next_frame(&mut self) -> Result<Option<VideoFrame>, CaptureError>;

    /// Release the underlying device or files
    fn release(&mut self) {}
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn next_frame(&mut self) -> Result<Option<VideoFrame>, CaptureError> {
        (**self).next_frame()
    }

    fn release(&mut self) {
        (**self).release()
    }
}

/// Replays a directory of image files, one frame per file, in name order
pub struct ImageSequenceSource {
    config: CaptureConfig,
    files: VecDeque<PathBuf>,
    started: Instant,
    last_frame: Option<Instant>,
    sequence: u32,
}

impl ImageSequenceSource {
    /// Open a recorded sequence
    pub fn open(config: CaptureConfig) -> Result<Self, CaptureError> {
        let files = list_frames(&config.frames_dir)?;
        if files.is_empty() {
            return Err(CaptureError::Open(format!(
                "No frames found in {}",
                config.frames_dir.display()
            )));
        }

        info!(
            "Opened image sequence {} ({} frames)",
            config.frames_dir.display(),
            files.len()
        );

        Ok(Self {
            config,
            files: files.into(),
            started: Instant::now(),
            last_frame: None,
            sequence: 0,
        })
    }

    /// Frames left in the sequence
    pub fn remaining(&self) -> usize {
        self.files.len()
    }

    fn pace(&mut self) {
        let interval = self.config.frame_interval;
        if let Some(last) = self.last_frame {
            let since = last.elapsed();
            if since < interval {
                std::thread::sleep(interval - since);
            }
        }
        self.last_frame = Some(Instant::now());
    }
}

impl FrameSource for ImageSequenceSource {
    fn next_frame(&mut self) -> Result<Option<VideoFrame>, CaptureError> {
        let Some(path) = self.files.pop_front() else {
            return Ok(None);
        };

        self.pace();
        let sequence = self.sequence;
        self.sequence += 1;

        let decoded = image::open(&path).map_err(|e| CaptureError::Read {
            sequence,
            reason: format!("{}: {}", path.display(), e),
        })?;
        debug!("Decoded frame {} from {}", sequence, path.display());

        let timestamp_ns = self.started.elapsed().as_nanos() as u64;
        Ok(Some(VideoFrame::from_rgb_image(
            &decoded.to_rgb8(),
            timestamp_ns,
            sequence,
        )))
    }

    fn release(&mut self) {
        if !self.files.is_empty() {
            debug!("Releasing image sequence with {} unread frames", self.files.len());
        }
        self.files.clear();
    }
}

fn list_frames(dir: &Path) -> Result<Vec<PathBuf>, CaptureError> {
    let entries = std::fs::read_dir(dir)
        .map_err(|e| CaptureError::Open(format!("{}: {}", dir.display(), e)))?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
                .unwrap_or(false)
        })
        .collect();
    files.sort();
    Ok(files)
}

/// In-memory source yielding a fixed script of frames or failures
#[derive(Default)]
pub struct ScriptedSource {
    script: VecDeque<Result<VideoFrame, CaptureError>>,
    released: bool,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a frame
    pub fn push_frame(&mut self, frame: VideoFrame) -> &mut Self {
        self.script.push_back(Ok(frame));
        self
    }

    /// Queue a read failure
    pub fn push_failure(&mut self, reason: &str) -> &mut Self {
        let sequence = self.script.len() as u32;
        self.script.push_back(Err(CaptureError::Read {
            sequence,
            reason: reason.to_string(),
        }));
        self
    }

    pub fn is_released(&self) -> bool {
        self.released
    }
}

impl FrameSource for ScriptedSource {
    fn next_frame(&mut self) -> Result<Option<VideoFrame>, CaptureError> {
        match self.script.pop_front() {
            Some(Ok(frame)) => Ok(Some(frame)),
            Some(Err(e)) => Err(e),
            None => Ok(None),
        }
    }

    fn release(&mut self) {
        self.released = true;
        self.script.clear();
    }
}
