//! The media-processing backend seen by the pipeline.
//!
//! Every operation spawns an external tool and waits for it; none of them
//! can be interrupted half way.

use async_trait::async_trait;
use std::path::Path;

use vrelay_models::encoding::{
    REENCODE_AUDIO_BITRATE, REENCODE_AUDIO_CODEC, REENCODE_CRF, REENCODE_PRESET,
    REENCODE_VIDEO_CODEC, THUMBNAIL_QUALITY,
};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::MediaResult;
use crate::probe::{probe_media, MediaInfo};

/// How a segment is cut out of its source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CutMode {
    /// Container-level stream copy. Fast, but only safe at keyframes.
    Copy,
    /// Full re-encode with a fixed fast preset. Tolerates any cut point.
    Reencode,
}

/// Probe / extract frame / cut segment.
#[async_trait]
pub trait MediaToolkit: Send + Sync {
    /// Total duration and size.
    async fn probe(&self, path: &Path) -> MediaResult<MediaInfo>;

    /// Write a single frame taken at `timestamp_secs` to `output`.
    async fn extract_frame(&self, path: &Path, timestamp_secs: f64, output: &Path)
        -> MediaResult<()>;

    /// Write `length_secs` of `input` starting at `start_secs` to `output`.
    async fn cut_segment(
        &self,
        input: &Path,
        start_secs: f64,
        length_secs: f64,
        mode: CutMode,
        output: &Path,
    ) -> MediaResult<()>;
}

/// [`MediaToolkit`] backed by the `ffmpeg` and `ffprobe` binaries.
#[derive(Debug, Default, Clone)]
pub struct FfmpegToolkit {
    runner: FfmpegRunner,
}

impl FfmpegToolkit {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Build the cut command for one segment.
pub(crate) fn cut_command(
    input: &Path,
    start_secs: f64,
    length_secs: f64,
    mode: CutMode,
    output: &Path,
) -> FfmpegCommand {
    let cmd = FfmpegCommand::new(input, output)
        .seek(start_secs)
        .output_duration(length_secs);

    let cmd = match mode {
        CutMode::Copy => cmd
            .codec_copy()
            .output_args(["-avoid_negative_ts", "make_zero"]),
        CutMode::Reencode => cmd
            .video_codec(REENCODE_VIDEO_CODEC)
            .preset(REENCODE_PRESET)
            .crf(REENCODE_CRF)
            .audio_codec(REENCODE_AUDIO_CODEC)
            .audio_bitrate(REENCODE_AUDIO_BITRATE),
    };

    cmd.faststart()
}

#[async_trait]
impl MediaToolkit for FfmpegToolkit {
    async fn probe(&self, path: &Path) -> MediaResult<MediaInfo> {
        probe_media(path).await
    }

    async fn extract_frame(
        &self,
        path: &Path,
        timestamp_secs: f64,
        output: &Path,
    ) -> MediaResult<()> {
        let cmd = FfmpegCommand::new(path, output)
            .seek(timestamp_secs)
            .single_frame()
            .output_arg("-q:v")
            .output_arg(THUMBNAIL_QUALITY.to_string());

        self.runner.run(&cmd).await
    }

    async fn cut_segment(
        &self,
        input: &Path,
        start_secs: f64,
        length_secs: f64,
        mode: CutMode,
        output: &Path,
    ) -> MediaResult<()> {
        let cmd = cut_command(input, start_secs, length_secs, mode, output);
        self.runner.run(&cmd).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_copy_cut_arguments() {
        let args = cut_command(
            Path::new("in.mp4"),
            45.0,
            45.0,
            CutMode::Copy,
            Path::new("part2.mp4"),
        )
        .build_args();

        assert!(args.windows(2).any(|w| w == ["-c", "copy"]));
        assert!(args.windows(2).any(|w| w == ["-avoid_negative_ts", "make_zero"]));
        assert!(args.windows(2).any(|w| w == ["-movflags", "+faststart"]));
        assert!(!args.contains(&"libx264".to_string()));
    }

    #[test]
    fn test_reencode_cut_arguments() {
        let args = cut_command(
            Path::new("in.mp4"),
            0.0,
            12.5,
            CutMode::Reencode,
            Path::new("part1.mp4"),
        )
        .build_args();

        assert!(args.windows(2).any(|w| w == ["-c:v", "libx264"]));
        assert!(args.windows(2).any(|w| w == ["-preset", "ultrafast"]));
        assert!(args.windows(2).any(|w| w == ["-crf", "28"]));
        assert!(args.windows(2).any(|w| w == ["-b:a", "128k"]));
        assert!(args.windows(2).any(|w| w == ["-t", "12.500"]));
        assert!(!args.windows(2).any(|w| w == ["-c", "copy"]));
    }
}
