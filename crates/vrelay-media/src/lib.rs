#![deny(unreachable_patterns)]
//! yt-dlp and FFmpeg CLI wrappers for the vrelay pipeline.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building and a runner for external tools
//! - Duration probing, frame extraction and segment cutting behind [`MediaToolkit`]
//! - The bitrate-based splitter (stream copy first, re-encode fallback)
//! - yt-dlp fetching behind [`MediaFetcher`], configured by [`FetchConfig`] presets

pub mod command;
pub mod download;
pub mod error;
pub mod probe;
pub mod split;
pub mod thumbnail;
pub mod toolkit;

pub use command::{check_ffmpeg, check_ffprobe, check_ytdlp, FfmpegCommand, FfmpegRunner};
pub use download::{
    ExternalDownloader, ExtractorArgs, FetchConfig, FetchedMedia, MediaFetcher, YtDlpFetcher,
};
pub use error::{MediaError, MediaResult};
pub use probe::{probe_media, MediaInfo};
pub use split::{plan_segments, split_media, SegmentPlan};
pub use thumbnail::extract_thumbnail;
pub use toolkit::{CutMode, FfmpegToolkit, MediaToolkit};
