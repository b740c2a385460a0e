//! On-screen display of annotated frames using minifb

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use image::RgbImage;
use minifb::{Key, KeyRepeat, Window, WindowOptions};
use tracing::info;

use crate::overlay::FrameSink;
use crate::MonitorError;

/// Shows each annotated frame; `q`, Escape or closing the window requests quit
pub struct WindowSink {
    window: Window,
    buffer: Vec<u32>,
    quit: Arc<AtomicBool>,
}

impl WindowSink {
    pub fn open(title: &str, width: u32, height: u32, quit: Arc<AtomicBool>) -> Result<Self, MonitorError> {
        let window = Window::new(title, width as usize, height as usize, WindowOptions::default())
            .map_err(|e| MonitorError::Sink(format!("window: {}", e)))?;
        info!("Display window open ({}x{}), press q to quit", width, height);

        Ok(Self {
            window,
            buffer: Vec::new(),
            quit,
        })
    }

    fn quit_requested(&self) -> bool {
        !self.window.is_open()
            || self
                .window
                .get_keys_pressed(KeyRepeat::No)
                .iter()
                .any(|key| matches!(key, Key::Q | Key::Escape))
    }
}

impl FrameSink for WindowSink {
    fn present(&mut self, image: &RgbImage, _sequence: u32) -> Result<(), MonitorError> {
        pack_rgb(image, &mut self.buffer);
        self.window
            .update_with_buffer(&self.buffer, image.width() as usize, image.height() as usize)
            .map_err(|e| MonitorError::Sink(format!("window: {}", e)))?;

        if self.quit_requested() {
            info!("Quit requested from window");
            self.quit.store(true, Ordering::SeqCst);
        }
        Ok(())
    }
}

/// 0RGB words, the layout minifb expects
fn pack_rgb(image: &RgbImage, buffer: &mut Vec<u32>) {
    buffer.clear();
    buffer.extend(
        image
            .pixels()
            .map(|p| (u32::from(p[0]) << 16) | (u32::from(p[1]) << 8) | u32::from(p[2])),
    );
}
