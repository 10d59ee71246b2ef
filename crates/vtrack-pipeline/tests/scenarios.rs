//! End-to-end runs over synthetic footage with in-memory collaborators.

use std::collections::VecDeque;

use image::{Rgb, RgbImage};
use vtrack_models::{BoundingBox, TrackStatus, TrackingAlgorithm};
use vtrack_pipeline::pipeline::{render_effect_pass, render_extract_pass, render_overlay_pass};
use vtrack_pipeline::{
    synthesize_keyframes, EffectCompositor, Frame, MemoryFrameSink, MemoryFrameSource,
    OverlayConfig, PipelineResult, RegionExtractor, TrackerAlgorithm, TrackerUpdate,
    TrackingRequest, TrackingSession, TrajectoryStore,
};

const FRAME_W: u32 = 96;
const FRAME_H: u32 = 72;
const SQUARE: u32 = 16;

/// A white square on black, at the given top-left position.
fn square_frame(index: u64, x: i32, y: i32) -> Frame {
    let mut image = RgbImage::new(FRAME_W, FRAME_H);
    for dy in 0..SQUARE as i32 {
        for dx in 0..SQUARE as i32 {
            let (px, py) = (x + dx, y + dy);
            if px >= 0 && py >= 0 && (px as u32) < FRAME_W && (py as u32) < FRAME_H {
                image.put_pixel(px as u32, py as u32, Rgb([255, 255, 255]));
            }
        }
    }
    Frame::new(index, index as f64 / 30.0, image)
}

/// Square moving right 2 px per frame from (10, 20).
fn moving_footage(n: u64) -> Vec<Frame> {
    (0..n)
        .map(|i| square_frame(i, 10 + 2 * i as i32, 20))
        .collect()
}

/// Square visible for `visible` frames, then gone.
fn vanishing_footage(total: u64, visible: u64) -> Vec<Frame> {
    (0..total)
        .map(|i| {
            if i < visible {
                square_frame(i, 10, 20)
            } else {
                Frame::new(i, i as f64 / 30.0, RgbImage::new(FRAME_W, FRAME_H))
            }
        })
        .collect()
}

/// Tracker double that replays a fixed sequence of updates, one per
/// `update` call. Lets a scenario dictate the exact per-frame outcome
/// independently of the correlation backend.
struct ScriptedTracker {
    steps: VecDeque<TrackerUpdate>,
    bbox: BoundingBox,
}

impl ScriptedTracker {
    fn new(steps: Vec<TrackerUpdate>) -> Self {
        Self {
            steps: steps.into(),
            bbox: BoundingBox::new(0, 0, 0, 0),
        }
    }
}

impl TrackerAlgorithm for ScriptedTracker {
    fn init(&mut self, _frame: &Frame, bbox: BoundingBox) -> PipelineResult<()> {
        self.bbox = bbox;
        Ok(())
    }

    fn update(&mut self, _frame: &Frame) -> TrackerUpdate {
        match self.steps.pop_front() {
            Some(step) => {
                if step.ok {
                    self.bbox = step.bbox;
                }
                step
            }
            None => TrackerUpdate {
                ok: false,
                bbox: self.bbox,
                confidence: 0.0,
            },
        }
    }
}

fn blank_footage(n: u64) -> Vec<Frame> {
    (0..n)
        .map(|i| Frame::new(i, i as f64 / 30.0, RgbImage::new(FRAME_W, FRAME_H)))
        .collect()
}

async fn run_scripted(frames: Vec<Frame>, steps: Vec<TrackerUpdate>) -> TrackingSession {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let mut source = MemoryFrameSource::new(frames, 30.0);
    let request = TrackingRequest::new(
        BoundingBox::new(10, 20, SQUARE, SQUARE),
        TrackingAlgorithm::Csrt,
    );
    TrackingSession::run_with_tracker(
        &mut source,
        &request,
        Box::new(ScriptedTracker::new(steps)),
        None,
        None,
    )
    .await
    .expect("scripted session")
}

async fn run_session(frames: Vec<Frame>) -> TrackingSession {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let mut source = MemoryFrameSource::new(frames, 30.0);
    let request = TrackingRequest::new(
        BoundingBox::new(10, 20, SQUARE, SQUARE),
        TrackingAlgorithm::Csrt,
    );
    TrackingSession::run(&mut source, &request, None, None)
        .await
        .expect("session")
}

#[tokio::test]
async fn scenario_moving_object_tracked_end_to_end() {
    let frames = moving_footage(20);
    let session = run_session(frames.clone()).await;
    let results = session.results();

    assert_eq!(results.len(), 20);
    assert!(results.iter().all(|r| r.status == TrackStatus::Tracked));

    // The estimate follows the motion: centroids strictly increase in x
    // and the final box lands near the true final position.
    let trajectory = TrajectoryStore::from_results(results);
    let xs: Vec<f64> = trajectory.points().iter().map(|p| p.cx).collect();
    assert!(xs.windows(2).all(|w| w[1] >= w[0]));
    let last = results.last().unwrap().bbox;
    assert!((last.x - 48).abs() <= 2, "final x {} too far from 48", last.x);

    // Annotated render consumes the recorded results one to one.
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
    .expect("overlay pass");
    assert_eq!(sink.frames().len(), 20);

    // The box outline is visible at the tracked position in the last
    // rendered frame.
    let rendered = &sink.frames()[19].image;
    let config = OverlayConfig::default();
    let outline = *rendered.get_pixel(last.x as u32, (last.y + 8) as u32);
    assert_eq!(outline, config.box_color);
}

#[tokio::test]
async fn scenario_lost_object_holds_last_box() {
    let session = run_session(vanishing_footage(14, 8)).await;
    let results = session.results();
    assert_eq!(results.len(), 14);

    // Visible portion tracked, remainder lost with the box held.
    assert!(results[..8].iter().all(|r| r.status == TrackStatus::Tracked));
    let held = results[7].bbox;
    for r in &results[8..] {
        assert_eq!(r.status, TrackStatus::Lost);
        assert_eq!(r.bbox, held);
        assert_eq!(r.confidence, 0.0);
    }

    // Trail centroids stop moving once the track is lost.
    let trajectory = TrajectoryStore::from_results(results);
    let frozen = trajectory.points()[7];
    for p in &trajectory.points()[8..] {
        assert_eq!((p.cx, p.cy), (frozen.cx, frozen.cy));
    }
}

#[tokio::test]
async fn scenario_effect_composited_over_tracked_region() {
    let frames = moving_footage(10);
    let session = run_session(frames.clone()).await;

    let compositor = EffectCompositor::new(
        "pixelate",
        &serde_json::json!({"block_size": 8, "margin": 0, "feather": 0}),
    )
    .expect("compositor");

    let mut source = MemoryFrameSource::new(frames.clone(), 30.0);
    let mut sink = MemoryFrameSink::new();
    render_effect_pass(&mut source, &mut sink, &session, &compositor, None, None)
        .await
        .expect("effect pass");
    assert_eq!(sink.frames().len(), 10);

    // Background far from the object is untouched on every frame.
    for (original, rendered) in frames.iter().zip(sink.frames()) {
        assert_eq!(
            original.image.get_pixel(FRAME_W - 2, FRAME_H - 2),
            rendered.image.get_pixel(FRAME_W - 2, FRAME_H - 2)
        );
    }
}

#[tokio::test]
async fn scenario_region_extracted_at_fixed_dimensions() {
    let frames = moving_footage(12);
    let session = run_session(frames.clone()).await;

    let extractor = RegionExtractor::new(2.0);
    let mut source = MemoryFrameSource::new(frames, 30.0);
    let mut sink = MemoryFrameSink::new();
    render_extract_pass(&mut source, &mut sink, &session, &extractor, None, None)
        .await
        .expect("extract pass");

    let format = sink.format().expect("declared format");
    assert_eq!((format.width, format.height), (2 * SQUARE, 2 * SQUARE));
    assert!(format.alpha);
    assert_eq!(sink.frames().len(), 12);
    assert!(sink
        .frames()
        .iter()
        .all(|f| f.width() == 2 * SQUARE && f.height() == 2 * SQUARE));

    // The object sits inside every extracted frame: some bright pixels.
    for frame in sink.frames() {
        let bright = frame
            .image
            .pixels()
            .filter(|p| p.0[0] > 200)
            .count();
        assert!(bright > 0, "extracted frame {} lost the object", frame.index);
    }
}

#[tokio::test]
async fn scenario_keyframes_summarize_linear_motion() {
    let session = run_session(moving_footage(30)).await;

    let dense = synthesize_keyframes(session.results(), 0.0);
    assert_eq!(dense.len(), 30);

    let sparse = synthesize_keyframes(session.results(), 4.0);
    assert!(sparse.len() < dense.len());
    assert_eq!(sparse.first().unwrap().frame, 0);
    assert_eq!(sparse.last().unwrap().frame, 29);
}

#[tokio::test]
async fn scenario_scripted_shrinking_box_recorded_verbatim() {
    // A double that shrinks the box 1 px per side each frame; the
    // session must record exactly what the tracker reports.
    let steps: Vec<TrackerUpdate> = (1..8)
        .map(|i| TrackerUpdate {
            ok: true,
            bbox: BoundingBox::new(10 + i, 20 + i, SQUARE - 2 * i as u32, SQUARE - 2 * i as u32),
            confidence: 0.9,
        })
        .collect();
    let session = run_scripted(blank_footage(8), steps.clone()).await;
    let results = session.results();

    assert_eq!(results.len(), 8);
    assert_eq!(results[0].bbox, BoundingBox::new(10, 20, SQUARE, SQUARE));
    for (result, step) in results[1..].iter().zip(&steps) {
        assert_eq!(result.status, TrackStatus::Tracked);
        assert_eq!(result.bbox, step.bbox);
        assert_eq!(result.confidence, step.confidence);
    }
    assert_eq!(results.last().unwrap().bbox.width, SQUARE - 14);
}

#[tokio::test]
async fn scenario_scripted_loss_interval_holds_then_recovers() {
    // Updates for frames 1..=9: tracked, except frames 4-6 report loss.
    let steps: Vec<TrackerUpdate> = (1..10)
        .map(|i| {
            let lost = (4..=6).contains(&i);
            TrackerUpdate {
                ok: !lost,
                bbox: BoundingBox::new(10 + 2 * i, 20, SQUARE, SQUARE),
                confidence: if lost { 0.0 } else { 0.8 },
            }
        })
        .collect();
    let session = run_scripted(blank_footage(10), steps).await;
    let results = session.results();
    assert_eq!(results.len(), 10);

    // Frames 4-6 hold the frame-3 box with zero confidence.
    let held = results[3].bbox;
    assert_eq!(held, BoundingBox::new(16, 20, SQUARE, SQUARE));
    for r in &results[4..=6] {
        assert_eq!(r.status, TrackStatus::Lost);
        assert_eq!(r.bbox, held);
        assert_eq!(r.confidence, 0.0);
    }

    // Frames 7-9 resume with the scripted boxes.
    for (i, r) in results[7..].iter().enumerate() {
        let expected_x = 10 + 2 * (7 + i as i32);
        assert_eq!(r.status, TrackStatus::Tracked);
        assert_eq!(r.bbox.x, expected_x);
    }
}
