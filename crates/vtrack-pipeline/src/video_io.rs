//! FFmpeg-backed frame source and sink.
//!
//! Decoding streams rgb24 rawvideo out of an ffmpeg child process;
//! encoding feeds rawvideo into one. Both sides hold the child for the
//! lifetime of the stream and surface ffmpeg's stderr on failure.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use image::RgbImage;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tracing::{debug, info};

use crate::command::{check_ffmpeg, FfmpegCommand};
use crate::error::{PipelineError, PipelineResult};
use crate::frame::{Frame, FrameSink, FrameSource, SinkFormat};
use crate::probe::{probe_video, VideoInfo};

/// Frame source decoding a video file through ffmpeg.
#[derive(Debug)]
pub struct VideoFrameSource {
    child: Option<Child>,
    stdout: Option<ChildStdout>,
    info: VideoInfo,
    next_index: u64,
}

impl VideoFrameSource {
    /// Probe and open a video file for sequential decoding.
    pub async fn open(path: impl AsRef<Path>) -> PipelineResult<Self> {
        let path = path.as_ref();
        let info = probe_video(path).await?;
        if info.width == 0 || info.height == 0 {
            return Err(PipelineError::invalid_input(format!(
                "video {} has no usable dimensions",
                path.display()
            )));
        }
        check_ffmpeg()?;

        let cmd = FfmpegCommand::new(path.to_string_lossy(), "pipe:1")
            .raw_output("rgb24")
            .no_audio();
        let args = cmd.build_args();
        debug!("decoding: ffmpeg {}", args.join(" "));

        let mut child = Command::new("ffmpeg")
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| PipelineError::internal("decoder stdout not captured"))?;

        info!(
            path = %path.display(),
            width = info.width,
            height = info.height,
            fps = info.fps,
            frames = ?info.frame_count,
            "opened video source"
        );

        Ok(Self {
            child: Some(child),
            stdout: Some(stdout),
            info,
            next_index: 0,
        })
    }

    /// Probed information for the underlying file.
    pub fn info(&self) -> &VideoInfo {
        &self.info
    }

    /// Reap the child once the stream ends, surfacing decode failures.
    async fn close(&mut self) -> PipelineResult<()> {
        self.stdout = None;
        if let Some(mut child) = self.child.take() {
            let stderr_text = match child.stderr.take() {
                Some(mut stderr) => {
                    let mut buf = Vec::new();
                    let _ = stderr.read_to_end(&mut buf).await;
                    String::from_utf8_lossy(&buf).to_string()
                }
                None => String::new(),
            };
            let status = child.wait().await?;
            if !status.success() {
                return Err(PipelineError::ffmpeg_failed(
                    "decoder exited with non-zero status",
                    Some(stderr_text),
                    status.code(),
                ));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl FrameSource for VideoFrameSource {
    async fn next_frame(&mut self) -> PipelineResult<Option<Frame>> {
        let stdout = match self.stdout.as_mut() {
            Some(stdout) => stdout,
            None => return Ok(None),
        };

        let frame_bytes = self.info.width as usize * self.info.height as usize * 3;
        let mut buf = vec![0u8; frame_bytes];
        let mut filled = 0usize;
        while filled < frame_bytes {
            let n = stdout.read(&mut buf[filled..]).await?;
            if n == 0 {
                break;
            }
            filled += n;
        }

        if filled == 0 {
            // Clean end of stream
            self.close().await?;
            return Ok(None);
        }
        if filled < frame_bytes {
            return Err(PipelineError::ffmpeg_failed(
                format!(
                    "truncated frame {}: got {} of {} bytes",
                    self.next_index, filled, frame_bytes
                ),
                None,
                None,
            ));
        }

        let image = RgbImage::from_raw(self.info.width, self.info.height, buf)
            .ok_or_else(|| PipelineError::internal("raw frame buffer size mismatch"))?;

        let index = self.next_index;
        self.next_index += 1;
        let timestamp = if self.info.fps > 0.0 {
            index as f64 / self.info.fps
        } else {
            0.0
        };
        Ok(Some(Frame::new(index, timestamp, image)))
    }

    fn total_frames(&self) -> Option<u64> {
        self.info.frame_count
    }

    fn fps(&self) -> Option<f64> {
        Some(self.info.fps)
    }
}

/// Frame sink encoding through ffmpeg.
///
/// Opaque output goes to H.264 yuv420p; when the declared format
/// requests an alpha plane the encoder switches to ProRes 4444, which
/// carries the (fully opaque) alpha channel through to the container.
pub struct VideoFrameSink {
    output: PathBuf,
    format: Option<SinkFormat>,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    frames_written: u64,
}

impl VideoFrameSink {
    /// Create a sink writing to the given output path. The encoder is
    /// spawned lazily in `declare_format`.
    pub fn create(output: impl AsRef<Path>) -> Self {
        Self {
            output: output.as_ref().to_path_buf(),
            format: None,
            child: None,
            stdin: None,
            frames_written: 0,
        }
    }

    fn encode_command(&self, format: &SinkFormat) -> FfmpegCommand {
        let pix_in = if format.alpha { "rgba" } else { "rgb24" };
        let cmd = FfmpegCommand::new("pipe:0", self.output.to_string_lossy())
            .raw_input(pix_in, format.width, format.height, format.fps);
        if format.alpha {
            cmd.video_codec("prores_ks")
                .output_arg("-profile:v")
                .output_arg("4444")
                .pixel_format("yuva444p10le")
        } else {
            cmd.video_codec("libx264")
                .pixel_format("yuv420p")
                .crf(18)
                .preset("medium")
        }
    }
}

#[async_trait]
impl FrameSink for VideoFrameSink {
    async fn declare_format(&mut self, format: SinkFormat) -> PipelineResult<()> {
        if self.format.is_some() {
            return Err(PipelineError::internal("sink format declared twice"));
        }
        if format.width == 0 || format.height == 0 || format.fps <= 0.0 {
            return Err(PipelineError::invalid_input(format!(
                "unusable output format {}x{} @ {}",
                format.width, format.height, format.fps
            )));
        }
        check_ffmpeg()?;

        let args = self.encode_command(&format).build_args();
        debug!("encoding: ffmpeg {}", args.join(" "));

        let mut child = Command::new("ffmpeg")
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()?;

        self.stdin = Some(
            child
                .stdin
                .take()
                .ok_or_else(|| PipelineError::internal("encoder stdin not captured"))?,
        );
        self.child = Some(child);
        self.format = Some(format);

        info!(
            output = %self.output.display(),
            width = format.width,
            height = format.height,
            alpha = format.alpha,
            "opened video sink"
        );
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
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| PipelineError::internal("encoder already finished"))?;

        if format.alpha {
            stdin.write_all(&rgb_to_rgba(frame.image.as_raw())).await?;
        } else {
            stdin.write_all(frame.image.as_raw()).await?;
        }
        self.frames_written += 1;
        Ok(())
    }

    async fn finish(&mut self) -> PipelineResult<()> {
        // Closing stdin signals end of stream to the encoder
        self.stdin = None;

        if let Some(mut child) = self.child.take() {
            let stderr_text = match child.stderr.take() {
                Some(mut stderr) => {
                    let mut buf = Vec::new();
                    let _ = stderr.read_to_end(&mut buf).await;
                    String::from_utf8_lossy(&buf).to_string()
                }
                None => String::new(),
            };
            let status = child.wait().await?;
            if !status.success() {
                return Err(PipelineError::ffmpeg_failed(
                    "encoder exited with non-zero status",
                    Some(stderr_text),
                    status.code(),
                ));
            }
            info!(
                output = %self.output.display(),
                frames = self.frames_written,
                "finalized video sink"
            );
        }
        Ok(())
    }
}

/// Expand packed rgb24 to rgba with full opacity.
fn rgb_to_rgba(rgb: &[u8]) -> Vec<u8> {
    let mut rgba = Vec::with_capacity(rgb.len() / 3 * 4);
    for px in rgb.chunks_exact(3) {
        rgba.extend_from_slice(px);
        rgba.push(255);
    }
    rgba
}
