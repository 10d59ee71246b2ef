//! High-level object tracking pipeline.
//!
//! `ObjectTrackingPipeline` ties the stages together for callers that
//! work with video files: track once, then run any number of
//! production passes (overlay video, effect video, region extraction,
//! keyframe export) against the recorded results. Each production pass
//! re-reads the source file.
//!
//! The pass functions themselves are generic over [`FrameSource`] and
//! [`FrameSink`], so they also run against in-memory collaborators.

use std::path::{Path, PathBuf};

use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tracing::info;
use vtrack_models::{MotionKeyframe, TrackingResult};

use crate::effects::EffectCompositor;
use crate::error::{PipelineError, PipelineResult};
use crate::extract::RegionExtractor;
use crate::frame::{Frame, FrameSink, FrameSource, SinkFormat};
use crate::keyframes::{keyframes_to_json, synthesize_keyframes};
use crate::overlay::{OverlayConfig, OverlayRenderer};
use crate::session::{ProgressCallback, SessionProgress, TrackingRequest, TrackingSession};
use crate::trajectory::TrajectoryStore;
use crate::video_io::{VideoFrameSink, VideoFrameSource};

/// Events emitted by the pipeline while an operation runs.
///
/// Delivery is fire-and-forget: a closed or absent receiver never
/// stalls processing. `Completed` is always the final event of an
/// operation, success or not.
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    /// Periodic progress update.
    Progress {
        /// Completed fraction in [0.0, 1.0]
        fraction: f64,
        /// Human-readable stage description
        message: String,
    },
    /// Terminal notification for one operation.
    Completed {
        /// Whether the operation succeeded
        success: bool,
        /// Outcome description
        message: String,
        /// Output file, for operations that produce one
        output_path: Option<PathBuf>,
    },
}

/// File-based object tracking pipeline.
pub struct ObjectTrackingPipeline {
    source_path: PathBuf,
    events: Option<mpsc::UnboundedSender<PipelineEvent>>,
    cancel_rx: Option<watch::Receiver<bool>>,
    session: Option<TrackingSession>,
}

impl ObjectTrackingPipeline {
    /// Create a pipeline over the given source video.
    pub fn new(source: impl AsRef<Path>) -> Self {
        Self {
            source_path: source.as_ref().to_path_buf(),
            events: None,
            cancel_rx: None,
            session: None,
        }
    }

    /// Attach an event channel for progress and completion updates.
    pub fn with_events(mut self, tx: mpsc::UnboundedSender<PipelineEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    /// Attach a cancellation signal checked between frames.
    pub fn with_cancel(mut self, cancel_rx: watch::Receiver<bool>) -> Self {
        self.cancel_rx = Some(cancel_rx);
        self
    }

    /// Names and descriptions of the selectable tracking algorithms.
    pub fn available_trackers() -> Vec<(&'static str, &'static str)> {
        crate::tracker::available_trackers()
    }

    /// Run the tracking loop over the source video and record one
    /// result per frame in the requested range.
    pub async fn track_object(
        &mut self,
        request: TrackingRequest,
    ) -> PipelineResult<&[TrackingResult]> {
        // A new run discards the previous session, failed open included.
        self.session = None;
        let mut source = match VideoFrameSource::open(&self.source_path).await {
            Ok(source) => source,
            Err(err) => {
                self.emit_completed(false, format!("tracking failed: {err}"), None);
                return Err(err);
            }
        };
        self.track_object_with_source(&mut source, request).await
    }

    /// Like [`Self::track_object`], over any frame source.
    pub async fn track_object_with_source(
        &mut self,
        source: &mut dyn FrameSource,
        request: TrackingRequest,
    ) -> PipelineResult<&[TrackingResult]> {
        self.session = None;
        let progress = self.progress_callback("tracking object");
        let outcome = TrackingSession::run(
            source,
            &request,
            progress.as_ref(),
            self.cancel_rx.as_ref(),
        )
        .await;
        match &outcome {
            Ok(session) => self.emit_completed(
                true,
                format!("tracked {} frames", session.results().len()),
                None,
            ),
            Err(err) => self.emit_completed(false, format!("tracking failed: {err}"), None),
        }
        self.session = Some(outcome?);
        Ok(self
            .session
            .as_ref()
            .map(|s| s.results())
            .unwrap_or_default())
    }

    /// Per-frame results from the last completed tracking run.
    pub fn tracking_results(&self) -> Option<&[TrackingResult]> {
        self.session.as_ref().map(|s| s.results())
    }

    /// Render the source with tracking annotations burned in.
    pub async fn create_tracked_video(
        &self,
        output: impl AsRef<Path>,
        config: &OverlayConfig,
    ) -> PipelineResult<PathBuf> {
        let output = output.as_ref().to_path_buf();
        let outcome = self.overlay_pass_inner(&output, config).await;
        self.finish_production(outcome, output, "annotated video").await
    }

    async fn overlay_pass_inner(
        &self,
        output: &Path,
        config: &OverlayConfig,
    ) -> PipelineResult<()> {
        let session = self.require_session()?;
        let mut source = VideoFrameSource::open(&self.source_path).await?;
        let mut sink = VideoFrameSink::create(output);
        let progress = self.progress_callback("rendering annotated video");
        render_overlay_pass(
            &mut source,
            &mut sink,
            session,
            config,
            progress.as_ref(),
            self.cancel_rx.as_ref(),
        )
        .await
    }

    /// Render the source with an effect applied over the tracked box.
    pub async fn apply_effect_to_tracked_object(
        &self,
        output: impl AsRef<Path>,
        effect_type: &str,
        params: &Value,
    ) -> PipelineResult<PathBuf> {
        let output = output.as_ref().to_path_buf();
        let outcome = self.effect_pass_inner(&output, effect_type, params).await;
        self.finish_production(outcome, output, "effect video").await
    }

    async fn effect_pass_inner(
        &self,
        output: &Path,
        effect_type: &str,
        params: &Value,
    ) -> PipelineResult<()> {
        // Effect validation happens before any file is touched.
        let compositor = EffectCompositor::new(effect_type, params)?;
        let session = self.require_session()?;
        let mut source = VideoFrameSource::open(&self.source_path).await?;
        let mut sink = VideoFrameSink::create(output);
        let progress = self.progress_callback("rendering effect video");
        render_effect_pass(
            &mut source,
            &mut sink,
            session,
            &compositor,
            progress.as_ref(),
            self.cancel_rx.as_ref(),
        )
        .await
    }

    /// Extract the tracked region into its own fixed-size video.
    pub async fn extract_tracked_object(
        &self,
        output: impl AsRef<Path>,
        expand_rect: f64,
    ) -> PipelineResult<PathBuf> {
        let output = output.as_ref().to_path_buf();
        let outcome = self.extract_pass_inner(&output, expand_rect).await;
        self.finish_production(outcome, output, "extracted region video")
            .await
    }

    async fn extract_pass_inner(&self, output: &Path, expand_rect: f64) -> PipelineResult<()> {
        let session = self.require_session()?;
        let extractor = RegionExtractor::new(expand_rect);
        let mut source = VideoFrameSource::open(&self.source_path).await?;
        let mut sink = VideoFrameSink::create(output);
        let progress = self.progress_callback("extracting tracked region");
        render_extract_pass(
            &mut source,
            &mut sink,
            session,
            &extractor,
            progress.as_ref(),
            self.cancel_rx.as_ref(),
        )
        .await
    }

    /// Reduce the recorded trajectory to motion keyframes.
    pub fn calculate_motion_keyframes(&self, tolerance: f64) -> PipelineResult<Value> {
        let session = self.require_session()?;
        let keyframes = self.motion_keyframes(tolerance)?;
        info!(
            frames = session.results().len(),
            keyframes = keyframes.len(),
            "motion keyframes calculated"
        );
        keyframes_to_json(&keyframes)
    }

    /// Typed variant of [`Self::calculate_motion_keyframes`].
    pub fn motion_keyframes(&self, tolerance: f64) -> PipelineResult<Vec<MotionKeyframe>> {
        let session = self.require_session()?;
        Ok(synthesize_keyframes(session.results(), tolerance))
    }

    fn require_session(&self) -> PipelineResult<&TrackingSession> {
        self.session
            .as_ref()
            .ok_or_else(|| PipelineError::invalid_input("no tracking results recorded yet"))
    }

    fn progress_callback(&self, message: &str) -> Option<ProgressCallback> {
        let tx = self.events.clone()?;
        let message = message.to_string();
        Some(Box::new(move |progress: SessionProgress| {
            let _ = tx.send(PipelineEvent::Progress {
                fraction: progress.fraction,
                message: message.clone(),
            });
        }))
    }

    fn emit_completed(&self, success: bool, message: String, output_path: Option<PathBuf>) {
        if let Some(tx) = &self.events {
            let _ = tx.send(PipelineEvent::Completed {
                success,
                message,
                output_path,
            });
        }
    }

    async fn finish_production(
        &self,
        outcome: PipelineResult<()>,
        output: PathBuf,
        label: &str,
    ) -> PipelineResult<PathBuf> {
        match outcome {
            Ok(()) => {
                self.emit_completed(
                    true,
                    format!("{} written", label),
                    Some(output.clone()),
                );
                Ok(output)
            }
            Err(err) => {
                self.emit_completed(false, format!("{} failed: {err}", label), None);
                Err(err)
            }
        }
    }
}

/// Drive one production pass: align the source with the session range,
/// then hand each (frame, result) pair to `stage`, which returns the
/// frame to write.
async fn run_production_pass<F>(
    source: &mut dyn FrameSource,
    sink: &mut dyn FrameSink,
    session: &TrackingSession,
    format_for: &dyn Fn(&Frame) -> SinkFormat,
    mut stage: F,
    progress: Option<&ProgressCallback>,
    cancel: Option<&watch::Receiver<bool>>,
) -> PipelineResult<()>
where
    F: FnMut(Frame, &TrackingResult) -> Frame,
{
    let results = session.results();
    let total = results.len() as u64;

    // Re-align with the tracked range.
    for _ in 0..session.start_frame() {
        if source.next_frame().await?.is_none() {
            return Err(PipelineError::invalid_input(
                "source exhausted before the tracked range",
            ));
        }
    }

    emit(progress, 0, total);
    let mut declared = false;
    for (i, result) in results.iter().enumerate() {
        if let Some(cancel) = cancel {
            if *cancel.borrow() {
                info!(frames = i, "production pass cancelled");
                return Err(PipelineError::Cancelled);
            }
        }

        let frame = source.next_frame().await?.ok_or_else(|| {
            PipelineError::invalid_input(format!(
                "source ended at frame {} of {} recorded results",
                i,
                results.len()
            ))
        })?;

        let out = stage(frame, result);
        if !declared {
            sink.declare_format(format_for(&out)).await?;
            declared = true;
        }
        sink.write_frame(out).await?;
        emit(progress, (i + 1) as u64, total);
    }

    sink.finish().await
}

fn emit(progress: Option<&ProgressCallback>, done: u64, total: u64) {
    if let Some(cb) = progress {
        let fraction = if total > 0 {
            (done as f64 / total as f64).min(1.0)
        } else {
            1.0
        };
        cb(SessionProgress {
            fraction,
            frames_processed: done,
            total_frames: Some(total),
        });
    }
}

/// Burn tracking annotations into the source frames.
pub async fn render_overlay_pass(
    source: &mut dyn FrameSource,
    sink: &mut dyn FrameSink,
    session: &TrackingSession,
    config: &OverlayConfig,
    progress: Option<&ProgressCallback>,
    cancel: Option<&watch::Receiver<bool>>,
) -> PipelineResult<()> {
    let renderer = OverlayRenderer::new(config.clone());
    let trajectory = TrajectoryStore::from_results(session.results());
    let fps = source.fps().unwrap_or(30.0);

    run_production_pass(
        source,
        sink,
        session,
        &move |frame: &Frame| SinkFormat {
            width: frame.width(),
            height: frame.height(),
            fps,
            alpha: false,
        },
        move |mut frame, result| {
            renderer.render(&mut frame, result, &trajectory);
            frame
        },
        progress,
        cancel,
    )
    .await
}

/// Apply a configured effect over the tracked box on every frame.
pub async fn render_effect_pass(
    source: &mut dyn FrameSource,
    sink: &mut dyn FrameSink,
    session: &TrackingSession,
    compositor: &EffectCompositor,
    progress: Option<&ProgressCallback>,
    cancel: Option<&watch::Receiver<bool>>,
) -> PipelineResult<()> {
    let fps = source.fps().unwrap_or(30.0);

    run_production_pass(
        source,
        sink,
        session,
        &move |frame: &Frame| SinkFormat {
            width: frame.width(),
            height: frame.height(),
            fps,
            alpha: false,
        },
        move |mut frame, result: &TrackingResult| {
            compositor.apply(&mut frame, result.bbox);
            frame
        },
        progress,
        cancel,
    )
    .await
}

/// Crop the expanded tracked region out of every frame into a
/// fixed-size alpha-capable stream.
pub async fn render_extract_pass(
    source: &mut dyn FrameSource,
    sink: &mut dyn FrameSink,
    session: &TrackingSession,
    extractor: &RegionExtractor,
    progress: Option<&ProgressCallback>,
    cancel: Option<&watch::Receiver<bool>>,
) -> PipelineResult<()> {
    let first_box = session
        .results()
        .first()
        .map(|r| r.bbox)
        .ok_or_else(|| PipelineError::invalid_input("no tracking results recorded yet"))?;
    let (out_w, out_h) = extractor.output_dimensions(first_box);
    let fps = source.fps().unwrap_or(30.0);

    run_production_pass(
        source,
        sink,
        session,
        &move |_frame: &Frame| SinkFormat {
            width: out_w,
            height: out_h,
            fps,
            alpha: true,
        },
        move |frame, result: &TrackingResult| {
            let image = extractor.extract(&frame, result, out_w, out_h);
            Frame::new(frame.index, frame.timestamp, image)
        },
        progress,
        cancel,
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{MemoryFrameSink, MemoryFrameSource};
    use image::RgbImage;
    use vtrack_models::{BoundingBox, TrackingAlgorithm};

    fn gradient_frame(index: u64, w: u32, h: u32) -> Frame {
        let image = RgbImage::from_fn(w, h, |x, y| {
            image::Rgb([(x % 256) as u8, (y % 256) as u8, index as u8])
        });
        Frame::new(index, index as f64 / 30.0, image)
    }

    async fn tracked_session(frames: &[Frame]) -> TrackingSession {
        // A bright square at a fixed position keeps the tracker locked.
        let mut source = MemoryFrameSource::new(frames.to_vec(), 30.0);
        let request = TrackingRequest::new(
            BoundingBox::new(8, 8, 16, 16),
            TrackingAlgorithm::Csrt,
        );
        TrackingSession::run(&mut source, &request, None, None)
            .await
            .unwrap()
    }

    fn square_frames(n: u64) -> Vec<Frame> {
        (0..n)
            .map(|i| {
                let mut image = RgbImage::new(64, 48);
                for y in 8..24u32 {
                    for x in 8..24u32 {
                        image.put_pixel(x, y, image::Rgb([255, 255, 255]));
                    }
                }
                Frame::new(i, i as f64 / 30.0, image)
            })
            .collect()
    }

    #[tokio::test]
    async fn test_overlay_pass_writes_one_frame_per_result() {
        let frames = square_frames(6);
        let session = tracked_session(&frames).await;

        let mut source = MemoryFrameSource::new(frames, 30.0);
        let mut sink = MemoryFrameSink::new();
        render_overlay_pass(
            &mut source,
            &mut sink,
            &session,
            &OverlayConfig::default(),
            None,
            None,
        )
        .await
        .unwrap();

        assert_eq!(sink.frames().len(), session.results().len());
        let format = sink.format().unwrap();
        assert_eq!((format.width, format.height), (64, 48));
        assert!(!format.alpha);
    }

    #[tokio::test]
    async fn test_extract_pass_fixed_dimensions_with_alpha() {
        let frames = square_frames(5);
        let session = tracked_session(&frames).await;

        let mut source = MemoryFrameSource::new(frames, 30.0);
        let mut sink = MemoryFrameSink::new();
        let extractor = RegionExtractor::new(1.5);
        render_extract_pass(&mut source, &mut sink, &session, &extractor, None, None)
            .await
            .unwrap();

        let format = sink.format().unwrap();
        assert_eq!((format.width, format.height), (24, 24));
        assert!(format.alpha);
        assert!(sink.frames().iter().all(|f| f.width() == 24));
    }

    #[tokio::test]
    async fn test_effect_pass_alters_only_tracked_region() {
        let frames: Vec<Frame> = (0..4).map(|i| gradient_frame(i, 64, 48)).collect();
        let session = tracked_session(&square_frames(4)).await;

        let mut source = MemoryFrameSource::new(frames.clone(), 30.0);
        let mut sink = MemoryFrameSink::new();
        let compositor = EffectCompositor::new(
            "highlight",
            &serde_json::json!({"color": "#ff0000", "margin": 0, "feather": 0}),
        )
        .unwrap();
        render_effect_pass(&mut source, &mut sink, &session, &compositor, None, None)
            .await
            .unwrap();

        // A corner far from the box is untouched
        let original = frames[0].image.get_pixel(60, 44);
        let rendered = sink.frames()[0].image.get_pixel(60, 44);
        assert_eq!(original, rendered);
    }

    #[tokio::test]
    async fn test_production_pass_reports_short_source() {
        let session = tracked_session(&square_frames(6)).await;

        // Source shorter than the recorded results
        let mut source = MemoryFrameSource::new(square_frames(3), 30.0);
        let mut sink = MemoryFrameSink::new();
        let err = render_overlay_pass(
            &mut source,
            &mut sink,
            &session,
            &OverlayConfig::default(),
            None,
            None,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, PipelineError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_pass_progress_monotonic_and_complete() {
        let frames = square_frames(5);
        let session = tracked_session(&frames).await;

        let seen = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let seen_cb = seen.clone();
        let progress: ProgressCallback = Box::new(move |p: SessionProgress| {
            seen_cb.lock().unwrap().push(p.fraction);
        });

        let mut source = MemoryFrameSource::new(frames, 30.0);
        let mut sink = MemoryFrameSink::new();
        render_overlay_pass(
            &mut source,
            &mut sink,
            &session,
            &OverlayConfig::default(),
            Some(&progress),
            None,
        )
        .await
        .unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(*seen.first().unwrap(), 0.0);
        assert_eq!(*seen.last().unwrap(), 1.0);
        assert!(seen.windows(2).all(|w| w[0] <= w[1]));
    }

    #[tokio::test]
    async fn test_keyframes_require_session() {
        let pipeline = ObjectTrackingPipeline::new("missing.mp4");
        let err = pipeline.calculate_motion_keyframes(1.0).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_effect_validation_precedes_io() {
        // Unknown effect fails before the source file is ever opened.
        let pipeline = ObjectTrackingPipeline::new("/nonexistent/clip.mp4");
        let err = pipeline
            .apply_effect_to_tracked_object("out.mp4", "vortex", &serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::UnsupportedEffect(_)));
    }

    #[tokio::test]
    async fn test_failed_run_clears_previous_results() {
        let mut pipeline = ObjectTrackingPipeline::new("unused.mp4");

        let frames = square_frames(5);
        let mut source = MemoryFrameSource::new(frames.clone(), 30.0);
        let request = TrackingRequest::new(
            BoundingBox::new(8, 8, 16, 16),
            TrackingAlgorithm::Csrt,
        );
        pipeline
            .track_object_with_source(&mut source, request)
            .await
            .unwrap();
        assert!(pipeline.tracking_results().is_some());

        // A zero-area box fails validation; the earlier results must not
        // survive the failed run.
        let mut source = MemoryFrameSource::new(frames, 30.0);
        let bad = TrackingRequest::new(
            BoundingBox::new(8, 8, 0, 0),
            TrackingAlgorithm::Csrt,
        );
        assert!(pipeline
            .track_object_with_source(&mut source, bad)
            .await
            .is_err());
        assert!(pipeline.tracking_results().is_none());
    }

    #[tokio::test]
    async fn test_completed_event_is_terminal_on_failure() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut pipeline = ObjectTrackingPipeline::new("/nonexistent/clip.mp4").with_events(tx);

        let request = TrackingRequest::new(
            BoundingBox::new(0, 0, 10, 10),
            TrackingAlgorithm::Kcf,
        );
        assert!(pipeline.track_object(request).await.is_err());

        let mut last = None;
        while let Ok(event) = rx.try_recv() {
            last = Some(event);
        }
        match last {
            Some(PipelineEvent::Completed { success, .. }) => assert!(!success),
            other => panic!("expected Completed event, got {:?}", other),
        }
    }
}
