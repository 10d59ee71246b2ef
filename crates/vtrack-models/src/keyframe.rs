//! Reduced motion keyframes for animation export.

use serde::{Deserialize, Serialize};

/// A retained sample of the tracked object's motion curve.
///
/// Serialized field names (`frame`, `x`, `y`, `scale`, `confidence`)
/// are the contract with downstream keyframe/animation consumers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotionKeyframe {
    /// Frame number within the tracked range
    pub frame: u64,
    /// Centroid x-coordinate in frame pixels
    pub x: f64,
    /// Centroid y-coordinate in frame pixels
    pub y: f64,
    /// Box diagonal relative to the first tracked frame's diagonal
    pub scale: f64,
    /// Tracker confidence at this frame
    pub confidence: f32,
}

impl MotionKeyframe {
    /// Create a new motion keyframe.
    pub fn new(frame: u64, x: f64, y: f64, scale: f64, confidence: f32) -> Self {
        Self {
            frame,
            x,
            y,
            scale,
            confidence,
        }
    }
}
