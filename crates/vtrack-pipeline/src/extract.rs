//! Region extractor: cropped sub-frame stream for export.

use image::{imageops, RgbImage};
use tracing::warn;
use vtrack_models::{BoundingBox, TrackingResult};

use crate::frame::Frame;

/// Produces a cropped/expanded sub-frame stream around the tracked box.
///
/// This is a rectangular crop, not a segmentation matte: pixels outside
/// the tracked box but inside the crop rectangle are included verbatim.
#[derive(Debug, Clone, Copy)]
pub struct RegionExtractor {
    expand_rect: f64,
}

impl RegionExtractor {
    /// Create an extractor. `expand_rect` grows the box about its
    /// center (1.1 = 10% larger); values below 1.0 are clamped to 1.0.
    pub fn new(expand_rect: f64) -> Self {
        let clamped = if expand_rect < 1.0 || !expand_rect.is_finite() {
            warn!(expand_rect, "expand_rect below 1.0, clamped");
            1.0
        } else {
            expand_rect
        };
        Self {
            expand_rect: clamped,
        }
    }

    /// The effective expansion factor.
    pub fn expand_rect(&self) -> f64 {
        self.expand_rect
    }

    /// Fixed output dimensions, taken from the first result's box.
    pub fn output_dimensions(&self, first_box: BoundingBox) -> (u32, u32) {
        let w = (first_box.width as f64 * self.expand_rect).round() as u32;
        let h = (first_box.height as f64 * self.expand_rect).round() as u32;
        (w.max(1), h.max(1))
    }

    /// Extract the expanded region for one frame, resized to the fixed
    /// output dimensions (tracking boxes are rarely constant-size).
    pub fn extract(
        &self,
        frame: &Frame,
        result: &TrackingResult,
        out_width: u32,
        out_height: u32,
    ) -> RgbImage {
        let region = result
            .bbox
            .scale(self.expand_rect)
            .clamp(frame.width(), frame.height());

        if region.is_empty() {
            // No region to crop; emit a black frame of the agreed size.
            return RgbImage::new(out_width, out_height);
        }

        let crop = imageops::crop_imm(
            &frame.image,
            region.x as u32,
            region.y as u32,
            region.width,
            region.height,
        )
        .to_image();

        if crop.width() == out_width && crop.height() == out_height {
            crop
        } else {
            imageops::resize(&crop, out_width, out_height, imageops::FilterType::Triangle)
        }
    }
}
