//! Frames and the source/sink seams of the pipeline.
//!
//! Container decode and encode are external collaborators: the pipeline
//! only sees the sequential pull/push contracts defined here. A frame
//! is owned by exactly one stage at a time and handed on by move.

use async_trait::async_trait;
use image::RgbImage;

use crate::error::{PipelineError, PipelineResult};

/// A decoded video frame.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Frame number within the source, starting at 0
    pub index: u64,
    /// Presentation timestamp in seconds
    pub timestamp: f64,
    /// Pixel data (RGB, 8 bits per channel)
    pub image: RgbImage,
}

impl Frame {
    /// Create a new frame.
    pub fn new(index: u64, timestamp: f64, image: RgbImage) -> Self {
        Self {
            index,
            timestamp,
            image,
        }
    }

    /// Frame width in pixels.
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    /// Frame height in pixels.
    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// Output format, declared once before the first frame is written.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SinkFormat {
    /// Output width in pixels
    pub width: u32,
    /// Output height in pixels
    pub height: u32,
    /// Output frame rate
    pub fps: f64,
    /// Whether the sink should carry an alpha plane (constant full
    /// opacity; this is a format request, not a per-pixel matte)
    pub alpha: bool,
}

/// Sequential frame supplier.
///
/// Yields frames in strictly increasing index order and reports its
/// total frame count and frame rate when known.
#[async_trait]
pub trait FrameSource: Send {
    /// Pull the next frame, or `None` when the source is exhausted.
    async fn next_frame(&mut self) -> PipelineResult<Option<Frame>>;

    /// Total number of frames, when the source can report it.
    fn total_frames(&self) -> Option<u64>;

    /// Source frame rate, when known.
    fn fps(&self) -> Option<f64>;
}

/// Sequential frame consumer with a fixed, pre-declared format.
#[async_trait]
pub trait FrameSink: Send {
    /// Declare the output format. Must be called exactly once, before
    /// the first `write_frame`.
    async fn declare_format(&mut self, format: SinkFormat) -> PipelineResult<()>;

    /// Push the next frame. Frames must arrive in increasing index
    /// order and match the declared dimensions.
    async fn write_frame(&mut self, frame: Frame) -> PipelineResult<()>;

    /// Flush and finalize the output.
    async fn finish(&mut self) -> PipelineResult<()>;
}

/// In-memory frame source over pre-decoded frames.
///
/// Used by tests and by callers that already hold decoded frames.
pub struct MemoryFrameSource {
    frames: std::vec::IntoIter<Frame>,
    total: u64,
    fps: f64,
}

impl MemoryFrameSource {
    /// Create a source over the given frames at the given frame rate.
    pub fn new(frames: Vec<Frame>, fps: f64) -> Self {
        let total = frames.len() as u64;
        Self {
            frames: frames.into_iter(),
            total,
            fps,
        }
    }
}

#[async_trait]
impl FrameSource for MemoryFrameSource {
    async fn next_frame(&mut self) -> PipelineResult<Option<Frame>> {
        Ok(self.frames.next())
    }

    fn total_frames(&self) -> Option<u64> {
        Some(self.total)
    }

    fn fps(&self) -> Option<f64> {
        Some(self.fps)
    }
}

/// In-memory frame sink that collects written frames.
#[derive(Default)]
pub struct MemoryFrameSink {
    format: Option<SinkFormat>,
    frames: Vec<Frame>,
}

impl MemoryFrameSink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// The declared format, if any.
    pub fn format(&self) -> Option<SinkFormat> {
        self.format
    }

    /// Frames written so far.
    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    /// Consume the sink, returning the collected frames.
    pub fn into_frames(self) -> Vec<Frame> {
        self.frames
    }
}

#[async_trait]
impl FrameSink for MemoryFrameSink {
    async fn declare_format(&mut self, format: SinkFormat) -> PipelineResult<()> {
        if self.format.is_some() {
            return Err(PipelineError::internal("sink format declared twice"));
        }
        self.format = Some(format);
        Ok(())
    }

    async fn write_frame(&mut self, frame: Frame) -> PipelineResult<()> {
        let format = self
            .format
            .ok_or_else(|| PipelineError::internal("write_frame before declare_format"))?;
        if frame.width() != format.width || frame.height() != format.height {
            return Err(PipelineError::internal(format!(
                "frame {}x{} does not match declared format {}x{}",
                frame.width(),
                frame.height(),
                format.width,
                format.height
            )));
        }
        self.frames.push(frame);
        Ok(())
    }

    async fn finish(&mut self) -> PipelineResult<()> {
        Ok(())
    }
}
