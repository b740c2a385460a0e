//! Video frame types and processing

use image::{imageops, ImageBuffer, Rgb, RgbImage};

use crate::CaptureError;

/// Channel order of a packed 3-byte pixel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// Camera native order
    Bgr24,
    /// Render order
    Rgb24,
}

/// Decoded 8-bit, 3-channel video frame
#[derive(Debug, Clone)]
pub struct VideoFrame {
    /// Packed pixel data (width * height * 3)
    pub data: Vec<u8>,
    /// Frame width
    pub width: u32,
    /// Frame height
    pub height: u32,
    /// Channel order of `data`
    pub format: PixelFormat,
    /// Capture timestamp (nanoseconds)
    pub timestamp_ns: u64,
    /// Frame sequence number
    pub sequence: u32,
}

impl VideoFrame {
    /// Create a new video frame from packed pixel data
    pub fn new(
        data: Vec<u8>,
        width: u32,
        height: u32,
        format: PixelFormat,
        timestamp_ns: u64,
        sequence: u32,
    ) -> Result<Self, CaptureError> {
        let expected = width as usize * height as usize * 3;
        if data.len() != expected {
            return Err(CaptureError::Format(format!(
                "{}x{} frame needs {} bytes, got {}",
                width,
                height,
                expected,
                data.len()
            )));
        }

        Ok(Self {
            data,
            width,
            height,
            format,
            timestamp_ns,
            sequence,
        })
    }

    /// Build a BGR frame from a decoded RGB image
    pub fn from_rgb_image(image: &RgbImage, timestamp_ns: u64, sequence: u32) -> Self {
        let mut data = image.as_raw().clone();
        for pixel in data.chunks_exact_mut(3) {
            pixel.swap(0, 2);
        }

        Self {
            data,
            width: image.width(),
            height: image.height(),
            format: PixelFormat::Bgr24,
            timestamp_ns,
            sequence,
        }
    }

    /// Solid-color BGR frame, handy for synthetic streams
    pub fn filled(width: u32, height: u32, bgr: [u8; 3], sequence: u32) -> Self {
        let data = bgr
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 3)
            .collect();

        Self {
            data,
            width,
            height,
            format: PixelFormat::Bgr24,
            timestamp_ns: 0,
            sequence,
        }
    }

    /// Get pixel at (x, y) as stored
    pub fn get_pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = ((y * self.width + x) * 3) as usize;
        Some([self.data[idx], self.data[idx + 1], self.data[idx + 2]])
    }

    /// Convert to grayscale
    pub fn to_grayscale(&self) -> GrayFrame {
        let (r, b) = match self.format {
            PixelFormat::Bgr24 => (2, 0),
            PixelFormat::Rgb24 => (0, 2),
        };

        let data = self
            .data
            .chunks_exact(3)
            .map(|pixel| {
                // Luminance formula: 0.299*R + 0.587*G + 0.114*B
                (pixel[r] as f32 * 0.299 + pixel[1] as f32 * 0.587 + pixel[b] as f32 * 0.114)
                    .round() as u8
            })
            .collect();

        GrayFrame {
            data,
            width: self.width,
            height: self.height,
            timestamp_ns: self.timestamp_ns,
            sequence: self.sequence,
        }
    }

    /// Resize frame using bilinear filtering
    pub fn resize(&self, new_width: u32, new_height: u32) -> Result<VideoFrame, CaptureError> {
        if self.width == new_width && self.height == new_height {
            return Ok(self.clone());
        }

        // Channel order is irrelevant to the filter, so Rgb stands in for BGR too
        let buffer = ImageBuffer::<Rgb<u8>, _>::from_raw(self.width, self.height, self.data.as_slice())
            .ok_or_else(|| CaptureError::Format("Failed to create image buffer".into()))?;
        let resized = imageops::resize(&buffer, new_width, new_height, imageops::FilterType::Triangle);

        Ok(VideoFrame {
            data: resized.into_raw(),
            width: new_width,
            height: new_height,
            format: self.format,
            timestamp_ns: self.timestamp_ns,
            sequence: self.sequence,
        })
    }

    /// Copy into an RGB image for drawing and display
    pub fn to_rgb_image(&self) -> RgbImage {
        let mut data = self.data.clone();
        if self.format == PixelFormat::Bgr24 {
            for pixel in data.chunks_exact_mut(3) {
                pixel.swap(0, 2);
            }
        }

        // Length is checked on construction
        RgbImage::from_raw(self.width, self.height, data)
            .unwrap_or_else(|| RgbImage::new(self.width, self.height))
    }
}

/// Single-channel luminance frame handed to the face detector
#[derive(Debug, Clone)]
pub struct GrayFrame {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub timestamp_ns: u64,
    pub sequence: u32,
}

impl GrayFrame {
    pub fn get(&self, x: u32, y: u32) -> Option<u8> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(self.data[(y * self.width + x) as usize])
    }
}
