//! Built-in correlation tracker.
//!
//! Normalized cross-correlation template matching over a bounded search
//! window, with optional template learning. Each algorithm family maps
//! to a profile tuning search radius, learning rate, and the acceptance
//! threshold below which a frame is reported lost.

use image::RgbImage;
use tracing::debug;
use vtrack_models::{BoundingBox, TrackingAlgorithm};

use super::{TrackerAlgorithm, TrackerUpdate};
use crate::error::{PipelineError, PipelineResult};
use crate::frame::Frame;

/// Tuning profile for the correlation backend.
#[derive(Debug, Clone, Copy)]
pub struct TrackerProfile {
    /// Search radius in pixels around the previous position
    pub search_radius: i32,
    /// Step between candidate positions (1 = exhaustive)
    pub search_step: i32,
    /// Template blend factor per accepted frame (0 = frozen template)
    pub learning_rate: f32,
    /// Minimum correlation score to accept a frame
    pub accept_threshold: f32,
}

impl TrackerProfile {
    /// Profile for an algorithm family.
    pub fn for_algorithm(algorithm: TrackingAlgorithm) -> Self {
        match algorithm {
            TrackingAlgorithm::Mosse => Self {
                search_radius: 16,
                search_step: 2,
                learning_rate: 0.2,
                accept_threshold: 0.35,
            },
            TrackingAlgorithm::Kcf => Self {
                search_radius: 24,
                search_step: 1,
                learning_rate: 0.075,
                accept_threshold: 0.40,
            },
            TrackingAlgorithm::Csrt => Self {
                search_radius: 32,
                search_step: 1,
                learning_rate: 0.02,
                accept_threshold: 0.45,
            },
            TrackingAlgorithm::Boosting => Self {
                search_radius: 24,
                search_step: 2,
                learning_rate: 0.1,
                accept_threshold: 0.30,
            },
            TrackingAlgorithm::Mil => Self {
                search_radius: 24,
                search_step: 2,
                learning_rate: 0.05,
                accept_threshold: 0.30,
            },
            TrackingAlgorithm::Tld => Self {
                search_radius: 48,
                search_step: 2,
                learning_rate: 0.05,
                accept_threshold: 0.50,
            },
            TrackingAlgorithm::MedianFlow => Self {
                search_radius: 16,
                search_step: 1,
                learning_rate: 0.0,
                accept_threshold: 0.55,
            },
        }
    }
}

/// Normalized cross-correlation tracker.
pub struct CorrelationTracker {
    profile: TrackerProfile,
    /// Grayscale template, row-major, same size as the tracked box
    template: Vec<f32>,
    bbox: BoundingBox,
    initialized: bool,
}

impl CorrelationTracker {
    /// Create an uninitialized tracker with the given profile.
    pub fn new(profile: TrackerProfile) -> Self {
        Self {
            profile,
            template: Vec::new(),
            bbox: BoundingBox::EMPTY,
            initialized: false,
        }
    }
}

impl TrackerAlgorithm for CorrelationTracker {
    fn init(&mut self, frame: &Frame, bbox: BoundingBox) -> PipelineResult<()> {
        if bbox.is_empty() {
            return Err(PipelineError::init_failed("initial box has zero area"));
        }
        if !bbox.fits_in(frame.width(), frame.height()) {
            return Err(PipelineError::init_failed(format!(
                "initial box {:?} lies outside {}x{} frame",
                bbox,
                frame.width(),
                frame.height()
            )));
        }

        self.template = extract_patch(&frame.image, bbox);
        self.bbox = bbox;
        self.initialized = true;
        debug!(x = bbox.x, y = bbox.y, w = bbox.width, h = bbox.height, "tracker seeded");
        Ok(())
    }

    fn update(&mut self, frame: &Frame) -> TrackerUpdate {
        if !self.initialized {
            return TrackerUpdate {
                ok: false,
                bbox: self.bbox,
                confidence: 0.0,
            };
        }

        let (frame_w, frame_h) = (frame.width() as i32, frame.height() as i32);
        let (bw, bh) = (self.bbox.width as i32, self.bbox.height as i32);
        let radius = self.profile.search_radius;
        let step = self.profile.search_step.max(1);

        let mut best_score = f32::NEG_INFINITY;
        let mut best_pos = (self.bbox.x, self.bbox.y);

        let mut y = (self.bbox.y - radius).max(0);
        while y + bh <= frame_h && y <= self.bbox.y + radius {
            let mut x = (self.bbox.x - radius).max(0);
            while x + bw <= frame_w && x <= self.bbox.x + radius {
                let candidate = BoundingBox::new(x, y, self.bbox.width, self.bbox.height);
                let patch = extract_patch(&frame.image, candidate);
                let score = ncc(&self.template, &patch);
                if score > best_score {
                    best_score = score;
                    best_pos = (x, y);
                }
                x += step;
            }
            y += step;
        }

        if best_score < self.profile.accept_threshold {
            debug!(score = best_score, "correlation below threshold, reporting lost");
            return TrackerUpdate {
                ok: false,
                bbox: self.bbox,
                confidence: 0.0,
            };
        }

        self.bbox = BoundingBox::new(best_pos.0, best_pos.1, self.bbox.width, self.bbox.height);

        // Blend the template toward the accepted patch.
        if self.profile.learning_rate > 0.0 {
            let patch = extract_patch(&frame.image, self.bbox);
            let lr = self.profile.learning_rate;
            for (t, p) in self.template.iter_mut().zip(patch.iter()) {
                *t = (1.0 - lr) * *t + lr * *p;
            }
        }

        TrackerUpdate {
            ok: true,
            bbox: self.bbox,
            confidence: best_score.clamp(0.0, 1.0),
        }
    }
}

/// Extract a grayscale patch for the given box. The box must be within
/// frame bounds.
fn extract_patch(image: &RgbImage, bbox: BoundingBox) -> Vec<f32> {
    let mut patch = Vec::with_capacity((bbox.width * bbox.height) as usize);
    for dy in 0..bbox.height {
        for dx in 0..bbox.width {
            let px = image.get_pixel(bbox.x as u32 + dx, bbox.y as u32 + dy);
            // BT.601 luma
            let luma = 0.299 * px[0] as f32 + 0.587 * px[1] as f32 + 0.114 * px[2] as f32;
            patch.push(luma);
        }
    }
    patch
}

/// Normalized cross-correlation of two equal-length patches, in [-1, 1].
fn ncc(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    let n = a.len() as f32;
    if n == 0.0 {
        return 0.0;
    }

    let mean_a: f32 = a.iter().sum::<f32>() / n;
    let mean_b: f32 = b.iter().sum::<f32>() / n;

    let mut cov = 0.0f32;
    let mut var_a = 0.0f32;
    let mut var_b = 0.0f32;
    for (&va, &vb) in a.iter().zip(b.iter()) {
        let da = va - mean_a;
        let db = vb - mean_b;
        cov += da * db;
        var_a += da * da;
        var_b += db * db;
    }

    // Per-pixel standard deviation, so flatness does not depend on
    // patch size. The threshold is in intensity units; the learning
    // blend wobbles template elements at rounding scale (~1e-5 around
    // 255), which must still count as flat.
    const FLAT_SD: f32 = 1e-3;
    let sd_a = (var_a / n).sqrt();
    let sd_b = (var_b / n).sqrt();
    if sd_a < FLAT_SD || sd_b < FLAT_SD {
        // Flat patches carry no texture to correlate on; two flat
        // patches match only if their intensities agree.
        return if sd_a < FLAT_SD && sd_b < FLAT_SD && (mean_a - mean_b).abs() < 1.0 {
            1.0
        } else {
            0.0
        };
    }

    cov / (var_a * var_b).sqrt()
}
