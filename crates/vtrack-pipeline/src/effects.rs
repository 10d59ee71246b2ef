//! Region-local visual effects with feathered blending.
//!
//! Effect parameters arrive as a named JSON map, validated at call
//! time: an unknown effect name fails, while out-of-range numeric
//! parameters are clamped to documented bounds so a single bad frame
//! cannot abort a long batch run.

use image::{imageops, Rgb, RgbImage, RgbaImage};
use serde_json::Value;
use std::path::Path;
use std::str::FromStr;
use tracing::warn;
use vtrack_models::BoundingBox;

use crate::error::{PipelineError, PipelineResult};
use crate::frame::Frame;

/// Supported region-local effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectKind {
    /// Box blur over the region
    Blur,
    /// Mosaic pixelation
    Pixelate,
    /// Color tint highlight
    Highlight,
    /// Composite an image over the region
    Overlay,
}

impl FromStr for EffectKind {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "blur" => Ok(EffectKind::Blur),
            "pixelate" => Ok(EffectKind::Pixelate),
            "highlight" => Ok(EffectKind::Highlight),
            "overlay" | "overlay-image" => Ok(EffectKind::Overlay),
            other => Err(PipelineError::UnsupportedEffect(other.to_string())),
        }
    }
}

/// Documented parameter bounds.
const BLUR_RADIUS_RANGE: (i64, i64) = (1, 64);
const BLOCK_SIZE_RANGE: (i64, i64) = (2, 128);
const MARGIN_RANGE: (i64, i64) = (0, 256);
const FEATHER_RANGE: (i64, i64) = (0, 64);

/// Applies one region-local effect to frames.
///
/// The caller passes the current frame's box; on Lost frames the
/// session results already carry the last known box forward, so the
/// effect never flickers off.
#[derive(Debug)]
pub struct EffectCompositor {
    kind: EffectKind,
    /// Region expansion in pixels
    margin: u32,
    /// Feathered border band width in pixels
    feather: u32,
    blur_radius: u32,
    block_size: u32,
    highlight_color: Rgb<u8>,
    highlight_intensity: f32,
    overlay_image: Option<RgbaImage>,
    overlay_opacity: f32,
}

impl EffectCompositor {
    /// Build a compositor from an effect name and a named parameter set.
    ///
    /// Unknown effect names fail with `UnsupportedEffect`. Out-of-range
    /// numeric parameters are clamped, not rejected.
    pub fn new(effect_type: &str, params: &Value) -> PipelineResult<Self> {
        let kind: EffectKind = effect_type.parse()?;

        let margin = clamped_int(params, "margin", 8, MARGIN_RANGE) as u32;
        let feather = clamped_int(params, "feather", 6, FEATHER_RANGE) as u32;
        let blur_radius = clamped_int(params, "radius", 8, BLUR_RADIUS_RANGE) as u32;
        let block_size = clamped_int(params, "block_size", 12, BLOCK_SIZE_RANGE) as u32;

        let highlight_color = params
            .get("color")
            .and_then(Value::as_str)
            .and_then(parse_hex_color)
            .unwrap_or(Rgb([255, 214, 0]));
        let highlight_intensity = clamped_float(params, "intensity", 0.4, 0.0, 1.0);
        let overlay_opacity = clamped_float(params, "opacity", 1.0, 0.0, 1.0);

        let overlay_image = if kind == EffectKind::Overlay {
            let path = params
                .get("image")
                .and_then(Value::as_str)
                .ok_or_else(|| {
                    PipelineError::invalid_input("overlay effect requires an 'image' parameter")
                })?;
            if !Path::new(path).exists() {
                return Err(PipelineError::FileNotFound(path.into()));
            }
            let img = image::open(path)
                .map_err(|e| {
                    PipelineError::invalid_input(format!("cannot load overlay image: {e}"))
                })?
                .to_rgba8();
            Some(img)
        } else {
            None
        };

        Ok(Self {
            kind,
            margin,
            feather,
            blur_radius,
            block_size,
            highlight_color,
            highlight_intensity,
            overlay_image,
            overlay_opacity,
        })
    }

    /// The effect this compositor applies.
    pub fn kind(&self) -> EffectKind {
        self.kind
    }

    /// Apply the effect to the tracked region of one frame, in place.
    ///
    /// The box is expanded by the margin, clamped to the frame, and
    /// blended back with a linear alpha ramp over the feather band so
    /// the effect leaves no hard rectangular seam.
    pub fn apply(&self, frame: &mut Frame, bbox: BoundingBox) {
        if bbox.is_empty() {
            return;
        }
        let region = bbox
            .expand(self.margin)
            .clamp(frame.width(), frame.height());
        if region.is_empty() {
            return;
        }

        let mut patch = imageops::crop_imm(
            &frame.image,
            region.x as u32,
            region.y as u32,
            region.width,
            region.height,
        )
        .to_image();

        match self.kind {
            EffectKind::Blur => box_blur(&mut patch, self.blur_radius),
            EffectKind::Pixelate => pixelate(&mut patch, self.block_size),
            EffectKind::Highlight => {
                tint(&mut patch, self.highlight_color, self.highlight_intensity)
            }
            EffectKind::Overlay => {
                if let Some(overlay) = &self.overlay_image {
                    composite_overlay(&mut patch, overlay, self.overlay_opacity);
                }
            }
        }

        self.blend_feathered(&mut frame.image, &patch, region);
    }

    /// Blend the effected patch over the frame with a feathered border.
    fn blend_feathered(&self, image: &mut RgbImage, patch: &RgbImage, region: BoundingBox) {
        let feather = self.feather as f32;
        for dy in 0..region.height {
            for dx in 0..region.width {
                // Distance to the nearest region edge, in pixels.
                let edge_dist = dx
                    .min(region.width - 1 - dx)
                    .min(dy.min(region.height - 1 - dy)) as f32;
                let alpha = if feather > 0.0 {
                    ((edge_dist + 1.0) / (feather + 1.0)).min(1.0)
                } else {
                    1.0
                };

                let x = region.x as u32 + dx;
                let y = region.y as u32 + dy;
                let src = patch.get_pixel(dx, dy);
                let dst = image.get_pixel_mut(x, y);
                for c in 0..3 {
                    let base = dst[c] as f32;
                    dst[c] = (base + (src[c] as f32 - base) * alpha).round() as u8;
                }
            }
        }
    }
}

/// Read an integer parameter, clamping to the given bounds.
fn clamped_int(params: &Value, name: &str, default: i64, (min, max): (i64, i64)) -> i64 {
    let raw = params
        .get(name)
        .and_then(|v| v.as_i64().or_else(|| v.as_f64().map(|f| f as i64)))
        .unwrap_or(default);
    let clamped = raw.clamp(min, max);
    if clamped != raw {
        warn!(param = name, value = raw, clamped, "effect parameter out of range, clamped");
    }
    clamped
}

/// Read a float parameter, clamping to the given bounds.
fn clamped_float(params: &Value, name: &str, default: f32, min: f32, max: f32) -> f32 {
    let raw = params
        .get(name)
        .and_then(Value::as_f64)
        .map(|f| f as f32)
        .unwrap_or(default);
    let clamped = raw.clamp(min, max);
    if (clamped - raw).abs() > f32::EPSILON {
        warn!(param = name, value = raw, clamped, "effect parameter out of range, clamped");
    }
    clamped
}

/// Parse a "#RRGGBB" color string.
fn parse_hex_color(s: &str) -> Option<Rgb<u8>> {
    let hex = s.strip_prefix('#')?;
    // Byte length alone is not enough: multi-byte characters would make
    // the fixed slices below straddle a char boundary.
    if hex.len() != 6 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
    let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
    let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
    Some(Rgb([r, g, b]))
}

/// Separable box blur within the patch, edges clamped.
fn box_blur(patch: &mut RgbImage, radius: u32) {
    let (w, h) = (patch.width() as i32, patch.height() as i32);
    let r = radius as i32;

    // Horizontal pass
    let mut tmp = patch.clone();
    for y in 0..h {
        for x in 0..w {
            let mut sum = [0u32; 3];
            let mut count = 0u32;
            for dx in -r..=r {
                let sx = (x + dx).clamp(0, w - 1);
                let px = patch.get_pixel(sx as u32, y as u32);
                for c in 0..3 {
                    sum[c] += px[c] as u32;
                }
                count += 1;
            }
            let out = tmp.get_pixel_mut(x as u32, y as u32);
            for c in 0..3 {
                out[c] = (sum[c] / count) as u8;
            }
        }
    }

    // Vertical pass
    for y in 0..h {
        for x in 0..w {
            let mut sum = [0u32; 3];
            let mut count = 0u32;
            for dy in -r..=r {
                let sy = (y + dy).clamp(0, h - 1);
                let px = tmp.get_pixel(x as u32, sy as u32);
                for c in 0..3 {
                    sum[c] += px[c] as u32;
                }
                count += 1;
            }
            let out = patch.get_pixel_mut(x as u32, y as u32);
            for c in 0..3 {
                out[c] = (sum[c] / count) as u8;
            }
        }
    }
}

/// Replace each block with its average color.
fn pixelate(patch: &mut RgbImage, block_size: u32) {
    let (w, h) = (patch.width(), patch.height());
    let block = block_size.max(2);

    let mut by = 0;
    while by < h {
        let bh = block.min(h - by);
        let mut bx = 0;
        while bx < w {
            let bw = block.min(w - bx);

            let mut sum = [0u64; 3];
            for y in by..by + bh {
                for x in bx..bx + bw {
                    let px = patch.get_pixel(x, y);
                    for c in 0..3 {
                        sum[c] += px[c] as u64;
                    }
                }
            }
            let n = (bw * bh) as u64;
            let avg = Rgb([
                (sum[0] / n) as u8,
                (sum[1] / n) as u8,
                (sum[2] / n) as u8,
            ]);

            for y in by..by + bh {
                for x in bx..bx + bw {
                    patch.put_pixel(x, y, avg);
                }
            }
            bx += block;
        }
        by += block;
    }
}

/// Blend a solid color over the patch.
fn tint(patch: &mut RgbImage, color: Rgb<u8>, intensity: f32) {
    for px in patch.pixels_mut() {
        for c in 0..3 {
            let base = px[c] as f32;
            px[c] = (base + (color[c] as f32 - base) * intensity).round() as u8;
        }
    }
}

/// Composite an RGBA overlay, resized to the patch, over the patch.
fn composite_overlay(patch: &mut RgbImage, overlay: &RgbaImage, opacity: f32) {
    let resized = imageops::resize(
        overlay,
        patch.width(),
        patch.height(),
        imageops::FilterType::Triangle,
    );
    for (x, y, px) in patch.enumerate_pixels_mut() {
        let over = resized.get_pixel(x, y);
        let alpha = (over[3] as f32 / 255.0) * opacity;
        for c in 0..3 {
            let base = px[c] as f32;
            px[c] = (base + (over[c] as f32 - base) * alpha).round() as u8;
        }
    }
}
