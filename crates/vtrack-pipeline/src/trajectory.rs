//! Trajectory store: read-side derivation over session results.

use vtrack_models::{TrackStatus, TrackingResult};

/// One point of the derived trajectory.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrailPoint {
    /// Frame number
    pub frame_number: u64,
    /// Centroid x-coordinate
    pub cx: f64,
    /// Centroid y-coordinate
    pub cy: f64,
    /// Confidence carried over from the tracking result
    pub confidence: f32,
    /// Tracked or Lost at this frame
    pub status: TrackStatus,
}

/// Time-ordered centroid view over a session's results.
///
/// Centroids for Lost frames reuse the previous Tracked centroid
/// (hold-last-value) so trajectory rendering never shows spurious
/// jumps. The store never mutates the results it was derived from.
#[derive(Debug, Clone, Default)]
pub struct TrajectoryStore {
    points: Vec<TrailPoint>,
}

impl TrajectoryStore {
    /// Derive a trajectory from ordered session results.
    pub fn from_results(results: &[TrackingResult]) -> Self {
        let mut points = Vec::with_capacity(results.len());
        let mut last_centroid: Option<(f64, f64)> = None;

        for result in results {
            let centroid = match result.status {
                TrackStatus::Tracked => {
                    let c = result.bbox.center();
                    last_centroid = Some(c);
                    c
                }
                // Lost boxes already carry the last good box, but hold
                // the last Tracked centroid explicitly so a leading
                // Lost run cannot pin the trail to the origin.
                TrackStatus::Lost => last_centroid.unwrap_or_else(|| result.bbox.center()),
            };
            points.push(TrailPoint {
                frame_number: result.frame_number,
                cx: centroid.0,
                cy: centroid.1,
                confidence: result.confidence,
                status: result.status,
            });
        }

        Self { points }
    }

    /// All trail points, ordered by frame number.
    pub fn points(&self) -> &[TrailPoint] {
        &self.points
    }

    /// Number of frames covered.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Trail window for rendering a fading trail at `frame_number`.
    ///
    /// Returns the points with frame numbers in
    /// `[frame_number - max_age_frames, frame_number]`, ordered by
    /// strictly increasing frame number: at most `max_age_frames + 1`
    /// entries, none newer than `frame_number`.
    pub fn window_at(&self, frame_number: u64, max_age_frames: u64) -> &[TrailPoint] {
        let oldest = frame_number.saturating_sub(max_age_frames);
        let start = self.points.partition_point(|p| p.frame_number < oldest);
        let end = self
            .points
            .partition_point(|p| p.frame_number <= frame_number);
        &self.points[start..end]
    }
}
