//! Overlay rendering and frame sinks

use std::convert::Infallible;
use std::path::{Path, PathBuf};

use camera_capture::VideoFrame;
use dms::{DmsAnalysis, Point};
use embedded_graphics::draw_target::DrawTarget;
use embedded_graphics::geometry::{OriginDimensions, Size};
use embedded_graphics::mono_font::{ascii::FONT_10X20, MonoTextStyle};
use embedded_graphics::pixelcolor::{Rgb888, RgbColor};
use embedded_graphics::text::{Baseline, Text};
use embedded_graphics::{Drawable, Pixel};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_line_segment_mut};
use imageproc::geometry::convex_hull;
use imageproc::rect::Rect;
use tracing::info;

use crate::MonitorError;

const GREEN: Rgb<u8> = Rgb([0, 255, 0]);
const RED: Rgb<u8> = Rgb([255, 0, 0]);
const WHITE: Rgb<u8> = Rgb([255, 255, 255]);

/// Text baselines, one line each for EAR, closure time and the alert
const TEXT_X: i32 = 10;
const EAR_LINE_Y: i32 = 30;
const CLOSED_LINE_Y: i32 = 60;
const ALERT_LINE_Y: i32 = 90;
const GAUGE_HEIGHT: u32 = 10;
/// Pixels per unit of EAR on the gauge
const GAUGE_SCALE: f64 = 400.0;
const MARGIN: u32 = 10;

/// Draws eye contours, status text and an EAR gauge
#[derive(Debug, Clone)]
pub struct Overlay {
    ear_threshold: f64,
}

impl Overlay {
    pub fn new(ear_threshold: f64) -> Self {
        Self { ear_threshold }
    }

    pub fn render(&self, frame: &VideoFrame, analysis: &DmsAnalysis, alarm_active: bool) -> RgbImage {
        let mut canvas = frame.to_rgb_image();

        if let Some(face) = &analysis.face {
            draw_hull(&mut canvas, face.left_eye());
            draw_hull(&mut canvas, face.right_eye());
        }

        if let Some(ear) = &analysis.ear {
            draw_text(&mut canvas, &format!("EAR: {:.2}", ear.average), EAR_LINE_Y);
            self.draw_gauge(&mut canvas, ear.average);
        }

        if let Some(closure) = analysis.closure.filter(|c| c.closed) {
            let text = format!("Eyes Closed: {:.1}s", closure.elapsed.as_secs_f64());
            draw_text(&mut canvas, &text, CLOSED_LINE_Y);
        }

        // Alert stays up while the alarm runs, face or no face
        if alarm_active {
            draw_text(&mut canvas, "WAKE UP ALERT!", ALERT_LINE_Y);
        }

        canvas
    }

    fn draw_gauge(&self, canvas: &mut RgbImage, ear: f64) {
        let (width, height) = canvas.dimensions();
        if width <= 2 * MARGIN || height <= GAUGE_HEIGHT + MARGIN {
            return;
        }

        let max_len = width - 2 * MARGIN;
        let len = ((ear * GAUGE_SCALE) as u32).clamp(1, max_len);
        let top = (height - MARGIN - GAUGE_HEIGHT) as i32;
        let color = if ear < self.ear_threshold { RED } else { GREEN };
        draw_filled_rect_mut(canvas, Rect::at(MARGIN as i32, top).of_size(len, GAUGE_HEIGHT), color);

        let tick_x = MARGIN as f32 + ((self.ear_threshold * GAUGE_SCALE) as f32).min(max_len as f32);
        draw_line_segment_mut(
            canvas,
            (tick_x, top as f32 - 4.0),
            (tick_x, (top + GAUGE_HEIGHT as i32) as f32 + 4.0),
            WHITE,
        );
    }
}

fn draw_hull(canvas: &mut RgbImage, eye: &[Point]) {
    let points: Vec<imageproc::point::Point<i32>> = eye
        .iter()
        .map(|p| imageproc::point::Point::new(p.x.round() as i32, p.y.round() as i32))
        .collect();
    let hull = convex_hull(points.as_slice());
    if hull.is_empty() {
        return;
    }

    for (i, start) in hull.iter().enumerate() {
        let end = hull[(i + 1) % hull.len()];
        draw_line_segment_mut(
            canvas,
            (start.x as f32, start.y as f32),
            (end.x as f32, end.y as f32),
            GREEN,
        );
    }
}

fn draw_text(canvas: &mut RgbImage, text: &str, baseline_y: i32) {
    let style = MonoTextStyle::new(&FONT_10X20, Rgb888::RED);
    let origin = embedded_graphics::geometry::Point::new(TEXT_X, baseline_y);
    match Text::with_baseline(text, origin, style, Baseline::Alphabetic).draw(&mut Canvas(canvas)) {
        Ok(_) => {}
        Err(infallible) => match infallible {},
    }
}

/// `DrawTarget` view of an RGB image
struct Canvas<'a>(&'a mut RgbImage);

impl OriginDimensions for Canvas<'_> {
    fn size(&self) -> Size {
        Size::new(self.0.width(), self.0.height())
    }
}

impl DrawTarget for Canvas<'_> {
    type Color = Rgb888;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(point, color) in pixels {
            if point.x < 0 || point.y < 0 {
                continue;
            }
            let (x, y) = (point.x as u32, point.y as u32);
            if x < self.0.width() && y < self.0.height() {
                self.0.put_pixel(x, y, Rgb([color.r(), color.g(), color.b()]));
            }
        }
        Ok(())
    }
}

/// Render target for annotated frames
pub trait FrameSink {
    fn present(&mut self, image: &RgbImage, sequence: u32) -> Result<(), MonitorError>;

    /// Whether frames should be rendered at all
    fn wants_frames(&self) -> bool {
        true
    }
}

impl<K: FrameSink + ?Sized> FrameSink for Box<K> {
    fn present(&mut self, image: &RgbImage, sequence: u32) -> Result<(), MonitorError> {
        (**self).present(image, sequence)
    }

    fn wants_frames(&self) -> bool {
        (**self).wants_frames()
    }
}

/// Discards frames
#[derive(Debug, Default)]
pub struct NullSink;

impl FrameSink for NullSink {
    fn present(&mut self, _image: &RgbImage, _sequence: u32) -> Result<(), MonitorError> {
        Ok(())
    }

    fn wants_frames(&self) -> bool {
        false
    }
}

/// Writes annotated frames as numbered PNG files
#[derive(Debug)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn create(dir: &Path) -> Result<Self, MonitorError> {
        std::fs::create_dir_all(dir)
            .map_err(|e| MonitorError::Sink(format!("{}: {}", dir.display(), e)))?;
        info!("Writing annotated frames to {}", dir.display());
        Ok(Self { dir: dir.to_path_buf() })
    }

    pub fn frame_path(&self, sequence: u32) -> PathBuf {
        self.dir.join(format!("frame_{:06}.png", sequence))
    }
}

impl FrameSink for DirectorySink {
    fn present(&mut self, image: &RgbImage, sequence: u32) -> Result<(), MonitorError> {
        let path = self.frame_path(sequence);
        image
            .save(&path)
            .map_err(|e| MonitorError::Sink(format!("{}: {}", path.display(), e)))
    }
}
