//! Tracking session: the sequential frame loop.
//!
//! A session owns one tracker instance and drives it over a frame
//! range, appending exactly one result per visited frame. Tracking is
//! strictly sequential; there is no parallel-frame speed-up at this
//! layer because every `update` depends on the state built by all
//! prior calls.

use tokio::sync::watch;
use tracing::{debug, info, warn};
use vtrack_models::{BoundingBox, TrackStatus, TrackingAlgorithm, TrackingResult};

use crate::error::{PipelineError, PipelineResult};
use crate::frame::FrameSource;
use crate::tracker::{create_tracker, TrackerAlgorithm};

/// Parameters for a tracking run.
#[derive(Debug, Clone)]
pub struct TrackingRequest {
    /// User-supplied initial box, in frame-pixel coordinates
    pub initial_box: BoundingBox,
    /// Algorithm to use; immutable for the session's lifetime
    pub algorithm: TrackingAlgorithm,
    /// First frame to visit
    pub start_frame: u64,
    /// Last frame to visit, inclusive; -1 means until the source is
    /// exhausted
    pub end_frame: i64,
}

impl TrackingRequest {
    /// Create a request covering the whole source.
    pub fn new(initial_box: BoundingBox, algorithm: TrackingAlgorithm) -> Self {
        Self {
            initial_box,
            algorithm,
            start_frame: 0,
            end_frame: -1,
        }
    }

    /// Validate the request without touching the source.
    pub fn validate(&self) -> PipelineResult<()> {
        if self.initial_box.is_empty() {
            return Err(PipelineError::invalid_input(
                "initial box has zero area",
            ));
        }
        if self.end_frame >= 0 && (self.end_frame as u64) < self.start_frame {
            return Err(PipelineError::invalid_input(format!(
                "end frame {} precedes start frame {}",
                self.end_frame, self.start_frame
            )));
        }
        Ok(())
    }
}

/// Progress of a running session, emitted after every frame.
#[derive(Debug, Clone, Copy)]
pub struct SessionProgress {
    /// Fraction in [0, 1]; approaches but never reaches 1.0 before
    /// completion when the source cannot report a duration
    pub fraction: f64,
    /// Frames processed so far
    pub frames_processed: u64,
    /// Total frames, when resolvable
    pub total_frames: Option<u64>,
}

/// Fire-and-forget progress notification. Must never block the loop.
pub type ProgressCallback = Box<dyn Fn(SessionProgress) + Send>;

/// A completed or in-progress tracking run.
///
/// Exclusively owns its tracker and its append-only result sequence;
/// downstream stages hold only read references into the results.
#[derive(Debug)]
pub struct TrackingSession {
    algorithm: TrackingAlgorithm,
    start_frame: u64,
    results: Vec<TrackingResult>,
}

impl TrackingSession {
    /// Drive the tracking loop over `source` according to `request`.
    ///
    /// The tracker is seeded on the first visited frame; seeding
    /// failure aborts the whole run with no results retained. Every
    /// subsequent frame appends exactly one result, `Lost` included.
    /// There is no reacquisition after loss: the same tracker instance
    /// keeps being stepped, so callers may observe a long run of Lost
    /// results.
    pub async fn run(
        source: &mut dyn FrameSource,
        request: &TrackingRequest,
        progress: Option<&ProgressCallback>,
        cancel: Option<&watch::Receiver<bool>>,
    ) -> PipelineResult<TrackingSession> {
        Self::run_with_tracker(
            source,
            request,
            create_tracker(request.algorithm),
            progress,
            cancel,
        )
        .await
    }

    /// Like [`Self::run`], but with a caller-supplied tracker instead
    /// of the built-in backend for `request.algorithm`. This is the
    /// seam for external tracker implementations.
    pub async fn run_with_tracker(
        source: &mut dyn FrameSource,
        request: &TrackingRequest,
        mut tracker: Box<dyn TrackerAlgorithm>,
        progress: Option<&ProgressCallback>,
        cancel: Option<&watch::Receiver<bool>>,
    ) -> PipelineResult<TrackingSession> {
        request.validate()?;

        let total_frames = resolve_total(source, request);
        info!(
            algorithm = %request.algorithm,
            start_frame = request.start_frame,
            end_frame = request.end_frame,
            ?total_frames,
            "starting tracking session"
        );

        let mut results: Vec<TrackingResult> = Vec::new();

        emit_progress(progress, 0, total_frames);

        // Skip frames before the requested range.
        let mut skipped = 0u64;
        while skipped < request.start_frame {
            match source.next_frame().await? {
                Some(_) => skipped += 1,
                None => {
                    return Err(PipelineError::invalid_input(format!(
                        "source exhausted before start frame {}",
                        request.start_frame
                    )))
                }
            }
        }

        loop {
            if let Some(cancel) = cancel {
                if *cancel.borrow() {
                    info!(frames = results.len(), "tracking cancelled");
                    return Err(PipelineError::Cancelled);
                }
            }

            let frame_number = request.start_frame + results.len() as u64;
            if request.end_frame >= 0 && frame_number > request.end_frame as u64 {
                break;
            }

            let frame = match source.next_frame().await? {
                Some(frame) => frame,
                None => {
                    if request.end_frame >= 0 {
                        warn!(
                            frame_number,
                            end_frame = request.end_frame,
                            "source exhausted before requested end frame"
                        );
                    }
                    break;
                }
            };

            let result = if results.is_empty() {
                // First frame seeds the tracker; failure is fatal.
                tracker.init(&frame, request.initial_box)?;
                TrackingResult::tracked(frame_number, request.initial_box, 1.0)
            } else {
                let update = tracker.update(&frame);
                if update.ok {
                    TrackingResult::tracked(frame_number, update.bbox, update.confidence)
                } else {
                    // Hold-last-value: carry the previous box forward.
                    let last_bbox = results
                        .last()
                        .map(|r| r.bbox)
                        .unwrap_or(request.initial_box);
                    TrackingResult::lost(frame_number, last_bbox)
                }
            };

            debug!(
                frame_number,
                tracked = result.is_tracked(),
                confidence = result.confidence,
                "frame processed"
            );
            results.push(result);
            emit_progress(progress, results.len() as u64, total_frames);
        }

        if results.is_empty() {
            return Err(PipelineError::invalid_input(
                "no frames in the requested range",
            ));
        }

        // Final notification pins the fraction to 1.0 when the
        // per-frame emissions stopped short: unknown total, or the
        // source exhausted before the expected frame count.
        if total_frames.map_or(true, |t| (results.len() as u64) < t) {
            if let Some(cb) = progress {
                cb(SessionProgress {
                    fraction: 1.0,
                    frames_processed: results.len() as u64,
                    total_frames: Some(results.len() as u64),
                });
            }
        }

        let lost = results
            .iter()
            .filter(|r| r.status == TrackStatus::Lost)
            .count();
        info!(
            frames = results.len(),
            lost,
            "tracking session complete"
        );

        Ok(TrackingSession {
            algorithm: request.algorithm,
            start_frame: request.start_frame,
            results,
        })
    }

    /// Algorithm this session was created with.
    pub fn algorithm(&self) -> TrackingAlgorithm {
        self.algorithm
    }

    /// First visited frame number.
    pub fn start_frame(&self) -> u64 {
        self.start_frame
    }

    /// Last visited frame number.
    pub fn end_frame(&self) -> u64 {
        self.start_frame + self.results.len() as u64 - 1
    }

    /// Ordered per-frame results, one per visited frame with no gaps.
    pub fn results(&self) -> &[TrackingResult] {
        &self.results
    }

    /// Result for a specific frame number, if within the visited range.
    pub fn result_at(&self, frame_number: u64) -> Option<&TrackingResult> {
        frame_number
            .checked_sub(self.start_frame)
            .and_then(|idx| self.results.get(idx as usize))
    }
}

fn resolve_total(source: &dyn FrameSource, request: &TrackingRequest) -> Option<u64> {
    if request.end_frame >= 0 {
        return Some(request.end_frame as u64 - request.start_frame + 1);
    }
    source
        .total_frames()
        .map(|total| total.saturating_sub(request.start_frame))
}

fn emit_progress(progress: Option<&ProgressCallback>, processed: u64, total: Option<u64>) {
    let Some(cb) = progress else { return };
    let fraction = match total {
        Some(total) if total > 0 => (processed as f64 / total as f64).min(1.0),
        // Indeterminate: monotonically increasing, capped below 1.0.
        _ => processed as f64 / (processed as f64 + 1.0),
    };
    cb(SessionProgress {
        fraction,
        frames_processed: processed,
        total_frames: total,
    });
}
