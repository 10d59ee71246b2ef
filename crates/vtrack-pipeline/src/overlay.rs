//! Overlay renderer: bounding box, fading trajectory trail, and label.

use image::{Rgb, RgbImage};
use vtrack_models::{TrackStatus, TrackingResult};

use crate::frame::Frame;
use crate::trajectory::TrajectoryStore;

/// Rendering options for tracked-video output.
#[derive(Debug, Clone)]
pub struct OverlayConfig {
    /// Draw the bounding box outline
    pub show_bounding_box: bool,
    /// Draw the fading trajectory trail
    pub show_trajectory: bool,
    /// Trail window length in frames
    pub trail_length: u64,
    /// Optional text label anchored above the box
    pub label_text: Option<String>,
    /// Box and label color
    pub box_color: Rgb<u8>,
    /// Trail color
    pub trail_color: Rgb<u8>,
    /// Outline thickness in pixels
    pub thickness: u32,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            show_bounding_box: true,
            show_trajectory: true,
            trail_length: 30,
            label_text: None,
            box_color: Rgb([0, 255, 0]),
            trail_color: Rgb([255, 214, 0]),
            thickness: 2,
        }
    }
}

/// Draws tracking visualizations onto frames.
///
/// Pure function of (frame, result, trajectory window); holds no
/// cross-frame state of its own.
pub struct OverlayRenderer {
    config: OverlayConfig,
}

impl OverlayRenderer {
    /// Create a renderer with the given options.
    pub fn new(config: OverlayConfig) -> Self {
        Self { config }
    }

    /// Render overlays for one frame in place.
    ///
    /// Lost frames get a dashed outline so viewers can tell a held box
    /// from a fresh estimate.
    pub fn render(&self, frame: &mut Frame, result: &TrackingResult, trajectory: &TrajectoryStore) {
        if self.config.show_trajectory {
            self.draw_trail(&mut frame.image, result.frame_number, trajectory);
        }

        if self.config.show_bounding_box && !result.bbox.is_empty() {
            let dashed = result.status == TrackStatus::Lost;
            draw_rect_outline(
                &mut frame.image,
                result.bbox.x,
                result.bbox.y,
                result.bbox.width,
                result.bbox.height,
                self.config.box_color,
                self.config.thickness,
                dashed,
            );
        }

        if let Some(label) = &self.config.label_text {
            if !label.is_empty() && !result.bbox.is_empty() {
                let scale = 2;
                let text_y = result.bbox.y - (GLYPH_HEIGHT as i32 * scale) - 4;
                draw_text(
                    &mut frame.image,
                    label,
                    result.bbox.x,
                    text_y.max(0),
                    self.config.box_color,
                    scale as u32,
                );
            }
        }
    }

    /// Draw the trail window ending at `frame_number` with per-point
    /// opacity decaying linearly from 1.0 (newest) to 0.0 (oldest
    /// retained point).
    fn draw_trail(&self, image: &mut RgbImage, frame_number: u64, trajectory: &TrajectoryStore) {
        let window = trajectory.window_at(frame_number, self.config.trail_length);
        if window.is_empty() {
            return;
        }

        let span = self.config.trail_length.max(1) as f64;
        for point in window {
            let age = (frame_number - point.frame_number) as f64;
            let alpha = (1.0 - age / span).clamp(0.0, 1.0) as f32;
            if alpha <= 0.0 {
                continue;
            }
            draw_dot(
                image,
                point.cx.round() as i32,
                point.cy.round() as i32,
                2,
                self.config.trail_color,
                alpha,
            );
        }
    }
}

/// Alpha-blend a single pixel, ignoring out-of-bounds coordinates.
fn blend_pixel(image: &mut RgbImage, x: i32, y: i32, color: Rgb<u8>, alpha: f32) {
    if x < 0 || y < 0 || x >= image.width() as i32 || y >= image.height() as i32 {
        return;
    }
    let px = image.get_pixel_mut(x as u32, y as u32);
    for c in 0..3 {
        let base = px[c] as f32;
        px[c] = (base + (color[c] as f32 - base) * alpha).round() as u8;
    }
}

/// Draw a filled disc of the given radius.
fn draw_dot(image: &mut RgbImage, cx: i32, cy: i32, radius: i32, color: Rgb<u8>, alpha: f32) {
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            if dx * dx + dy * dy <= radius * radius {
                blend_pixel(image, cx + dx, cy + dy, color, alpha);
            }
        }
    }
}

/// Draw a rectangle outline, solid or dashed.
#[allow(clippy::too_many_arguments)]
fn draw_rect_outline(
    image: &mut RgbImage,
    x: i32,
    y: i32,
    width: u32,
    height: u32,
    color: Rgb<u8>,
    thickness: u32,
    dashed: bool,
) {
    let w = width as i32;
    let h = height as i32;
    let t = thickness as i32;

    // Dash pattern: 6 px on, 4 px off, indexed by distance along edge.
    let visible = |offset: i32| !dashed || offset.rem_euclid(10) < 6;

    for layer in 0..t {
        for dx in 0..w {
            if visible(dx) {
                blend_pixel(image, x + dx, y + layer, color, 1.0);
                blend_pixel(image, x + dx, y + h - 1 - layer, color, 1.0);
            }
        }
        for dy in 0..h {
            if visible(dy) {
                blend_pixel(image, x + layer, y + dy, color, 1.0);
                blend_pixel(image, x + w - 1 - layer, y + dy, color, 1.0);
            }
        }
    }
}

const GLYPH_WIDTH: usize = 5;
const GLYPH_HEIGHT: usize = 7;

/// 5x7 bitmap glyph rows, most significant of the low 5 bits leftmost.
fn glyph(c: char) -> [u8; GLYPH_HEIGHT] {
    match c.to_ascii_uppercase() {
        'A' => [0x0E, 0x11, 0x11, 0x1F, 0x11, 0x11, 0x11],
        'B' => [0x1E, 0x11, 0x11, 0x1E, 0x11, 0x11, 0x1E],
        'C' => [0x0E, 0x11, 0x10, 0x10, 0x10, 0x11, 0x0E],
        'D' => [0x1E, 0x11, 0x11, 0x11, 0x11, 0x11, 0x1E],
        'E' => [0x1F, 0x10, 0x10, 0x1E, 0x10, 0x10, 0x1F],
        'F' => [0x1F, 0x10, 0x10, 0x1E, 0x10, 0x10, 0x10],
        'G' => [0x0E, 0x11, 0x10, 0x17, 0x11, 0x11, 0x0F],
        'H' => [0x11, 0x11, 0x11, 0x1F, 0x11, 0x11, 0x11],
        'I' => [0x0E, 0x04, 0x04, 0x04, 0x04, 0x04, 0x0E],
        'J' => [0x07, 0x02, 0x02, 0x02, 0x02, 0x12, 0x0C],
        'K' => [0x11, 0x12, 0x14, 0x18, 0x14, 0x12, 0x11],
        'L' => [0x10, 0x10, 0x10, 0x10, 0x10, 0x10, 0x1F],
        'M' => [0x11, 0x1B, 0x15, 0x15, 0x11, 0x11, 0x11],
        'N' => [0x11, 0x19, 0x15, 0x13, 0x11, 0x11, 0x11],
        'O' => [0x0E, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0E],
        'P' => [0x1E, 0x11, 0x11, 0x1E, 0x10, 0x10, 0x10],
        'Q' => [0x0E, 0x11, 0x11, 0x11, 0x15, 0x12, 0x0D],
        'R' => [0x1E, 0x11, 0x11, 0x1E, 0x14, 0x12, 0x11],
        'S' => [0x0F, 0x10, 0x10, 0x0E, 0x01, 0x01, 0x1E],
        'T' => [0x1F, 0x04, 0x04, 0x04, 0x04, 0x04, 0x04],
        'U' => [0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0E],
        'V' => [0x11, 0x11, 0x11, 0x11, 0x11, 0x0A, 0x04],
        'W' => [0x11, 0x11, 0x11, 0x15, 0x15, 0x1B, 0x11],
        'X' => [0x11, 0x0A, 0x04, 0x04, 0x04, 0x0A, 0x11],
        'Y' => [0x11, 0x11, 0x0A, 0x04, 0x04, 0x04, 0x04],
        'Z' => [0x1F, 0x01, 0x02, 0x04, 0x08, 0x10, 0x1F],
        '0' => [0x0E, 0x13, 0x15, 0x15, 0x15, 0x19, 0x0E],
        '1' => [0x04, 0x0C, 0x04, 0x04, 0x04, 0x04, 0x0E],
        '2' => [0x0E, 0x11, 0x01, 0x06, 0x08, 0x10, 0x1F],
        '3' => [0x0E, 0x11, 0x01, 0x06, 0x01, 0x11, 0x0E],
        '4' => [0x02, 0x06, 0x0A, 0x12, 0x1F, 0x02, 0x02],
        '5' => [0x1F, 0x10, 0x1E, 0x01, 0x01, 0x11, 0x0E],
        '6' => [0x0E, 0x10, 0x1E, 0x11, 0x11, 0x11, 0x0E],
        '7' => [0x1F, 0x01, 0x02, 0x04, 0x08, 0x08, 0x08],
        '8' => [0x0E, 0x11, 0x11, 0x0E, 0x11, 0x11, 0x0E],
        '9' => [0x0E, 0x11, 0x11, 0x0F, 0x01, 0x01, 0x0E],
        '-' => [0x00, 0x00, 0x00, 0x1F, 0x00, 0x00, 0x00],
        '.' => [0x00, 0x00, 0x00, 0x00, 0x00, 0x0C, 0x0C],
        ':' => [0x00, 0x0C, 0x0C, 0x00, 0x0C, 0x0C, 0x00],
        '_' => [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x1F],
        _ => [0x00; GLYPH_HEIGHT],
    }
}

/// Draw a single line of text with the built-in bitmap font.
fn draw_text(image: &mut RgbImage, text: &str, x: i32, y: i32, color: Rgb<u8>, scale: u32) {
    let scale = scale.max(1) as i32;
    let mut cursor_x = x;
    for c in text.chars() {
        let rows = glyph(c);
        for (row, bits) in rows.iter().enumerate() {
            for col in 0..GLYPH_WIDTH {
                if bits >> (GLYPH_WIDTH - 1 - col) & 1 == 1 {
                    for sy in 0..scale {
                        for sx in 0..scale {
                            blend_pixel(
                                image,
                                cursor_x + col as i32 * scale + sx,
                                y + row as i32 * scale + sy,
                                color,
                                1.0,
                            );
                        }
                    }
                }
            }
        }
        cursor_x += (GLYPH_WIDTH as i32 + 1) * scale;
    }
}
