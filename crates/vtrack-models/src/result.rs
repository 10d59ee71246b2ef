//! Per-frame tracking results.

use serde::{Deserialize, Serialize};

use crate::rect::BoundingBox;

/// Outcome of tracking a single frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrackStatus {
    /// The tracker produced a fresh estimate for this frame.
    Tracked,
    /// The tracker failed on this frame; the box is the last known
    /// good box, not a fresh estimate.
    Lost,
}

/// Tracking result for one frame. Immutable once produced.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackingResult {
    /// Frame number within the source
    pub frame_number: u64,
    /// Bounding box in frame-pixel coordinates
    pub bbox: BoundingBox,
    /// Tracker confidence in [0, 1]; always 0 for Lost frames
    pub confidence: f32,
    /// Tracked or Lost
    pub status: TrackStatus,
}

impl TrackingResult {
    /// Result for a successfully tracked frame.
    pub fn tracked(frame_number: u64, bbox: BoundingBox, confidence: f32) -> Self {
        Self {
            frame_number,
            bbox,
            confidence: confidence.clamp(0.0, 1.0),
            status: TrackStatus::Tracked,
        }
    }

    /// Result for a lost frame, carrying forward the last known box.
    pub fn lost(frame_number: u64, last_bbox: BoundingBox) -> Self {
        Self {
            frame_number,
            bbox: last_bbox,
            confidence: 0.0,
            status: TrackStatus::Lost,
        }
    }

    /// Whether this frame was tracked successfully.
    pub fn is_tracked(&self) -> bool {
        self.status == TrackStatus::Tracked
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracked_clamps_confidence() {
        let r = TrackingResult::tracked(3, BoundingBox::new(0, 0, 10, 10), 1.7);
        assert_eq!(r.confidence, 1.0);
        assert!(r.is_tracked());
    }

    #[test]
    fn test_lost_zeroes_confidence() {
        let last = BoundingBox::new(5, 5, 20, 20);
        let r = TrackingResult::lost(7, last);
        assert_eq!(r.confidence, 0.0);
        assert_eq!(r.status, TrackStatus::Lost);
        assert_eq!(r.bbox, last);
    }

    #[test]
    fn test_serde_round_trip() {
        let r = TrackingResult::tracked(1, BoundingBox::new(1, 2, 3, 4), 0.5);
        let json = serde_json::to_string(&r).unwrap();
        let back: TrackingResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back, r);
    }
}
