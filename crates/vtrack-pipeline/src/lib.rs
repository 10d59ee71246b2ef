#![deny(unreachable_patterns)]
//! Object tracking and effect compositing over video.
//!
//! This crate provides:
//! - A sequential tracking session over any [`FrameSource`]
//! - Swappable single-object trackers behind [`TrackerAlgorithm`]
//! - Annotation overlays (bounding box, fading trail, label)
//! - Localized effects (blur, pixelate, highlight, image overlay)
//! - Tracked-region extraction into a fixed-size stream
//! - Motion keyframe reduction for animation export
//! - FFmpeg-backed decode/encode via rawvideo pipes

pub mod command;
pub mod effects;
pub mod error;
pub mod extract;
pub mod frame;
pub mod keyframes;
pub mod overlay;
pub mod pipeline;
pub mod probe;
pub mod session;
pub mod tracker;
pub mod trajectory;
pub mod video_io;

pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand};
pub use effects::{EffectCompositor, EffectKind};
pub use error::{PipelineError, PipelineResult};
pub use extract::RegionExtractor;
pub use frame::{Frame, FrameSink, FrameSource, MemoryFrameSink, MemoryFrameSource, SinkFormat};
pub use keyframes::{keyframes_to_json, synthesize_keyframes};
pub use overlay::{OverlayConfig, OverlayRenderer};
pub use pipeline::{ObjectTrackingPipeline, PipelineEvent};
pub use probe::{probe_video, VideoInfo};
pub use session::{
    ProgressCallback, SessionProgress, TrackingRequest, TrackingSession,
};
pub use tracker::{available_trackers, create_tracker, TrackerAlgorithm, TrackerUpdate};
pub use trajectory::{TrailPoint, TrajectoryStore};
pub use video_io::{VideoFrameSink, VideoFrameSource};
