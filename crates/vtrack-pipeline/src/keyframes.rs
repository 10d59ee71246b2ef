//! Motion keyframe synthesis.
//!
//! Reduces the dense per-frame trajectory to a sparse keyframe curve:
//! a frame is retained only when linear interpolation between its
//! surviving neighbors would deviate from the true centroid/scale path
//! by at least the tolerance. Runs once, after tracking completes.

use serde_json::Value;
use tracing::debug;
use vtrack_models::{MotionKeyframe, TrackingResult};

use crate::error::PipelineResult;
use crate::trajectory::TrajectoryStore;

/// One sample of the centroid-and-scale path.
#[derive(Debug, Clone, Copy)]
struct PathPoint {
    frame: u64,
    x: f64,
    y: f64,
    scale: f64,
    confidence: f32,
}

/// Reduce a completed session's results to motion keyframes.
///
/// `tolerance` is in pixels; scale deviation is weighted by the first
/// Tracked frame's box diagonal so both axes share one unit. The first
/// and last frame of the range are always retained. A tolerance of 0
/// keeps every frame; raising the tolerance never adds keyframes.
pub fn synthesize_keyframes(results: &[TrackingResult], tolerance: f64) -> Vec<MotionKeyframe> {
    if results.is_empty() {
        return Vec::new();
    }

    let reference_diagonal = results
        .iter()
        .find(|r| r.is_tracked())
        .map(|r| r.bbox.diagonal())
        .filter(|d| *d > 0.0)
        .unwrap_or(1.0);

    // Centroids come from the trajectory store so Lost frames reuse the
    // held centroid rather than re-deriving from the box.
    let trajectory = TrajectoryStore::from_results(results);
    let path: Vec<PathPoint> = results
        .iter()
        .zip(trajectory.points())
        .map(|(result, point)| PathPoint {
            frame: result.frame_number,
            x: point.cx,
            y: point.cy,
            scale: result.bbox.diagonal() / reference_diagonal,
            confidence: result.confidence,
        })
        .collect();

    let keep = if tolerance <= 0.0 {
        // Exact mode: the reduction is the identity.
        vec![true; path.len()]
    } else {
        let mut keep = vec![false; path.len()];
        keep[0] = true;
        keep[path.len() - 1] = true;
        simplify(&path, 0, path.len() - 1, tolerance, reference_diagonal, &mut keep);
        keep
    };

    let keyframes: Vec<MotionKeyframe> = path
        .iter()
        .zip(keep.iter())
        .filter(|(_, &k)| k)
        .map(|(p, _)| MotionKeyframe::new(p.frame, p.x, p.y, p.scale, p.confidence))
        .collect();

    debug!(
        frames = path.len(),
        keyframes = keyframes.len(),
        tolerance,
        "keyframe reduction complete"
    );
    keyframes
}

/// Ramer–Douglas–Peucker over the combined centroid/scale path.
fn simplify(
    path: &[PathPoint],
    lo: usize,
    hi: usize,
    tolerance: f64,
    scale_weight: f64,
    keep: &mut [bool],
) {
    if hi <= lo + 1 {
        return;
    }

    let mut max_dev = 0.0f64;
    let mut max_idx = lo;
    for i in (lo + 1)..hi {
        let dev = deviation(&path[lo], &path[hi], &path[i], scale_weight);
        if dev > max_dev {
            max_dev = dev;
            max_idx = i;
        }
    }

    if max_dev > tolerance {
        keep[max_idx] = true;
        simplify(path, lo, max_idx, tolerance, scale_weight, keep);
        simplify(path, max_idx, hi, tolerance, scale_weight, keep);
    }
}

/// Deviation of `point` from the linear interpolation between `a` and
/// `b` at its frame number, in pixels.
fn deviation(a: &PathPoint, b: &PathPoint, point: &PathPoint, scale_weight: f64) -> f64 {
    let span = (b.frame - a.frame) as f64;
    let t = if span > 0.0 {
        (point.frame - a.frame) as f64 / span
    } else {
        0.0
    };

    let ix = a.x + t * (b.x - a.x);
    let iy = a.y + t * (b.y - a.y);
    let iscale = a.scale + t * (b.scale - a.scale);

    let pos_dev = ((point.x - ix).powi(2) + (point.y - iy).powi(2)).sqrt();
    let scale_dev = (point.scale - iscale).abs() * scale_weight;
    pos_dev.max(scale_dev)
}

/// Serialize keyframes as a flat record list for animation consumers.
pub fn keyframes_to_json(keyframes: &[MotionKeyframe]) -> PipelineResult<Value> {
    Ok(serde_json::to_value(keyframes)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use vtrack_models::BoundingBox;

    fn tracked(frame: u64, x: i32, y: i32, size: u32) -> TrackingResult {
        TrackingResult::tracked(frame, BoundingBox::new(x, y, size, size), 0.9)
    }

    /// Straight-line constant-size motion.
    fn linear_path(n: u64) -> Vec<TrackingResult> {
        (0..n).map(|i| tracked(i, 10 * i as i32, 0, 50)).collect()
    }

    #[test]
    fn test_endpoints_always_retained() {
        let results = linear_path(20);
        let keyframes = synthesize_keyframes(&results, 100.0);
        assert_eq!(keyframes.first().unwrap().frame, 0);
        assert_eq!(keyframes.last().unwrap().frame, 19);
    }

    #[test]
    fn test_zero_tolerance_keeps_every_frame() {
        let results = linear_path(15);
        let keyframes = synthesize_keyframes(&results, 0.0);
        assert_eq!(keyframes.len(), 15);
    }

    #[test]
    fn test_linear_motion_reduces_to_endpoints() {
        let results = linear_path(30);
        let keyframes = synthesize_keyframes(&results, 2.0);
        assert_eq!(keyframes.len(), 2);
    }

    #[test]
    fn test_corner_is_retained() {
        // Right for 10 frames, then down for 10
        let mut results = Vec::new();
        for i in 0..10u64 {
            results.push(tracked(i, 10 * i as i32, 0, 50));
        }
        for i in 10..20u64 {
            results.push(tracked(i, 90, 10 * (i as i32 - 9), 50));
        }

        let keyframes = synthesize_keyframes(&results, 3.0);
        assert!(keyframes.iter().any(|k| k.frame == 9 || k.frame == 10));
        assert!(keyframes.len() < results.len());
    }

    #[test]
    fn test_tolerance_monotonicity() {
        let mut results = Vec::new();
        // Wobbly path
        for i in 0..40u64 {
            let y = if i % 4 == 0 { 5 } else { 0 };
            results.push(tracked(i, 5 * i as i32, y, 50 + (i % 7) as u32));
        }

        let mut last_count = usize::MAX;
        for tolerance in [0.0, 1.0, 2.0, 5.0, 10.0, 50.0] {
            let count = synthesize_keyframes(&results, tolerance).len();
            assert!(
                count <= last_count,
                "tolerance {} produced {} keyframes, more than {}",
                tolerance,
                count,
                last_count
            );
            last_count = count;
        }
    }

    #[test]
    fn test_scale_change_creates_keyframe() {
        // Static position, box snaps to double size mid-way
        let mut results = Vec::new();
        for i in 0..10u64 {
            results.push(tracked(i, 100, 100, 40));
        }
        for i in 10..20u64 {
            results.push(tracked(i, 80, 80, 80));
        }

        let keyframes = synthesize_keyframes(&results, 5.0);
        assert!(
            keyframes.len() > 2,
            "scale jump must survive reduction, got {:?}",
            keyframes
        );
    }

    #[test]
    fn test_scale_is_relative_to_first_tracked_frame() {
        let results = vec![tracked(0, 0, 0, 40), tracked(1, 0, 0, 80)];
        let keyframes = synthesize_keyframes(&results, 0.0);
        assert!((keyframes[0].scale - 1.0).abs() < 1e-9);
        assert!((keyframes[1].scale - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_json_export_shape() {
        let results = linear_path(5);
        let keyframes = synthesize_keyframes(&results, 0.0);
        let doc = keyframes_to_json(&keyframes).unwrap();

        let records = doc.as_array().unwrap();
        assert_eq!(records.len(), 5);
        for record in records {
            assert!(record.get("frame").is_some());
            assert!(record.get("x").is_some());
            assert!(record.get("y").is_some());
            assert!(record.get("scale").is_some());
            assert!(record.get("confidence").is_some());
        }
    }

    #[test]
    fn test_empty_results() {
        assert!(synthesize_keyframes(&[], 1.0).is_empty());
    }
}
