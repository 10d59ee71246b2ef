//! FFmpeg command builder.

use std::path::PathBuf;

use crate::error::{PipelineError, PipelineResult};

/// Builder for FFmpeg invocations.
///
/// Input and output are plain strings so pipe endpoints (`pipe:0`,
/// `pipe:1`) work the same as file paths.
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    /// Input path or pipe spec
    input: String,
    /// Output path or pipe spec
    output: String,
    /// Input arguments (before -i)
    input_args: Vec<String>,
    /// Output arguments (after -i)
    output_args: Vec<String>,
    /// Whether to overwrite output
    overwrite: bool,
    /// Log level
    log_level: String,
}

impl FfmpegCommand {
    /// Create a new FFmpeg command.
    pub fn new(input: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            input_args: Vec::new(),
            output_args: Vec::new(),
            overwrite: true,
            log_level: "error".to_string(),
        }
    }

    /// Add an input argument (before -i).
    pub fn input_arg(mut self, arg: impl Into<String>) -> Self {
        self.input_args.push(arg.into());
        self
    }

    /// Add multiple input arguments.
    pub fn input_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.input_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Add an output argument (after -i).
    pub fn output_arg(mut self, arg: impl Into<String>) -> Self {
        self.output_args.push(arg.into());
        self
    }

    /// Add multiple output arguments.
    pub fn output_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.output_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Declare the input as raw video of the given geometry.
    pub fn raw_input(self, pixel_format: &str, width: u32, height: u32, fps: f64) -> Self {
        self.input_args([
            "-f".to_string(),
            "rawvideo".to_string(),
            "-pix_fmt".to_string(),
            pixel_format.to_string(),
            "-s".to_string(),
            format!("{}x{}", width, height),
            "-r".to_string(),
            format!("{:.6}", fps),
        ])
    }

    /// Emit raw video on the output side.
    pub fn raw_output(self, pixel_format: &str) -> Self {
        self.output_args([
            "-f".to_string(),
            "rawvideo".to_string(),
            "-pix_fmt".to_string(),
            pixel_format.to_string(),
        ])
    }

    /// Set the video codec.
    pub fn video_codec(self, codec: impl Into<String>) -> Self {
        self.output_arg("-c:v").output_arg(codec)
    }

    /// Set the output pixel format.
    pub fn pixel_format(self, format: impl Into<String>) -> Self {
        self.output_arg("-pix_fmt").output_arg(format)
    }

    /// Set CRF (quality).
    pub fn crf(self, crf: u8) -> Self {
        self.output_arg("-crf").output_arg(crf.to_string())
    }

    /// Set the encoder preset.
    pub fn preset(self, preset: impl Into<String>) -> Self {
        self.output_arg("-preset").output_arg(preset)
    }

    /// Drop the audio stream.
    pub fn no_audio(self) -> Self {
        self.output_arg("-an")
    }

    /// Set log level.
    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Build the argument list.
    pub fn build_args(&self) -> Vec<String> {
        let mut args = Vec::new();

        if self.overwrite {
            args.push("-y".to_string());
        }

        args.push("-v".to_string());
        args.push(self.log_level.clone());

        args.extend(self.input_args.clone());

        args.push("-i".to_string());
        args.push(self.input.clone());

        args.extend(self.output_args.clone());
        args.push(self.output.clone());

        args
    }
}

/// Check that FFmpeg is available.
pub fn check_ffmpeg() -> PipelineResult<PathBuf> {
    which::which("ffmpeg").map_err(|_| PipelineError::FfmpegNotFound)
}

/// Check that FFprobe is available.
pub fn check_ffprobe() -> PipelineResult<PathBuf> {
    which::which("ffprobe").map_err(|_| PipelineError::FfprobeNotFound)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_builder() {
        let cmd = FfmpegCommand::new("input.mp4", "pipe:1")
            .raw_output("rgb24")
            .no_audio();

        let args = cmd.build_args();
        assert!(args.contains(&"-y".to_string()));
        assert!(args.contains(&"rawvideo".to_string()));
        assert!(args.contains(&"rgb24".to_string()));
        assert!(args.contains(&"-an".to_string()));
        assert_eq!(args.last().unwrap(), "pipe:1");
    }

    #[test]
    fn test_raw_input_geometry() {
        let cmd = FfmpegCommand::new("pipe:0", "out.mp4")
            .raw_input("rgb24", 640, 360, 29.97)
            .video_codec("libx264")
            .pixel_format("yuv420p")
            .crf(18)
            .preset("medium");

        let args = cmd.build_args();
        assert!(args.contains(&"640x360".to_string()));
        assert!(args.contains(&"29.970000".to_string()));
        assert!(args.contains(&"libx264".to_string()));
        assert!(args.contains(&"yuv420p".to_string()));

        // Geometry flags must precede the input spec
        let i_pos = args.iter().position(|a| a == "-i").unwrap();
        let s_pos = args.iter().position(|a| a == "-s").unwrap();
        assert!(s_pos < i_pos);
    }
}
