//! Tracker capability layer.
//!
//! A tracker is anything that can seed on an initial box (`init`) and
//! refine its estimate one frame at a time (`update`). Algorithms are
//! inherently sequential: each `update` depends on internal state built
//! by all prior calls, so an instance must never be driven from two
//! places at once. The session owns exactly one instance for its whole
//! lifetime.

pub mod correlation;

use vtrack_models::{BoundingBox, TrackingAlgorithm};

use crate::error::PipelineResult;
use crate::frame::Frame;
use correlation::{CorrelationTracker, TrackerProfile};

/// Refined estimate for one frame.
#[derive(Debug, Clone, Copy)]
pub struct TrackerUpdate {
    /// Whether the tracker accepted this frame. `false` means lost; the
    /// box below is then the previous estimate, not a fresh one.
    pub ok: bool,
    /// Current box estimate
    pub bbox: BoundingBox,
    /// Self-reported confidence in [0, 1]
    pub confidence: f32,
}

/// Capability contract for a pluggable tracking algorithm.
pub trait TrackerAlgorithm: Send {
    /// Seed the algorithm on `frame` with the user-supplied box.
    ///
    /// Fails when the box has zero area or lies outside frame bounds;
    /// this is fatal for the session.
    fn init(&mut self, frame: &Frame, bbox: BoundingBox) -> PipelineResult<()>;

    /// Advance to the next sequential frame and refine the estimate.
    ///
    /// A failed update is reported as `ok = false` and is never retried
    /// with the same frame.
    fn update(&mut self, frame: &Frame) -> TrackerUpdate;
}

/// Construct a tracker instance for the chosen algorithm.
///
/// All enum variants are currently served by the built-in correlation
/// backend with a per-family profile; OpenCV-backed or other external
/// implementations plug in behind the same trait.
pub fn create_tracker(algorithm: TrackingAlgorithm) -> Box<dyn TrackerAlgorithm> {
    Box::new(CorrelationTracker::new(TrackerProfile::for_algorithm(
        algorithm,
    )))
}

/// Enumerate available trackers as (name, description) pairs.
pub fn available_trackers() -> Vec<(&'static str, &'static str)> {
    TrackingAlgorithm::all()
        .iter()
        .map(|a| (a.name(), a.description()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factory_covers_all_algorithms() {
        for &algo in TrackingAlgorithm::all() {
            let _tracker = create_tracker(algo);
        }
    }

    #[test]
    fn test_available_trackers_listing() {
        let listing = available_trackers();
        assert_eq!(listing.len(), TrackingAlgorithm::all().len());
        assert!(listing.iter().any(|(name, _)| *name == "KCF"));
    }
}
