//! Media acquisition using yt-dlp.
//!
//! yt-dlp is driven through an explicit [`FetchConfig`] instead of loose
//! option maps. Two presets exist: [`FetchConfig::accelerated`] hands the
//! transfer to aria2c with parallel connections, and
//! [`FetchConfig::standard`] is the same selection without the external
//! downloader, used as the fallback.

use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};

use crate::command::{check_ytdlp, last_line};
use crate::error::{MediaError, MediaResult};

/// External downloader that yt-dlp delegates the transfer to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalDownloader {
    /// Downloader binary known to yt-dlp (e.g. `aria2c`)
    pub name: String,
    /// Parallel connections per file
    pub connections: u8,
    /// Minimum split size, aria2c syntax (e.g. `1M`)
    pub chunk_size: String,
}

impl ExternalDownloader {
    pub fn aria2c() -> Self {
        Self {
            name: "aria2c".to_string(),
            connections: 8,
            chunk_size: "1M".to_string(),
        }
    }
}

/// Per-extractor feature gating.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractorArgs {
    /// yt-dlp extractor key (e.g. `youtube`)
    pub extractor: String,
    /// Player clients to request, in order
    pub player_clients: Vec<String>,
    /// Streaming variants to skip (e.g. `dash`, `hls`)
    pub skip: Vec<String>,
}

impl ExtractorArgs {
    /// YouTube: android then web clients, no DASH/HLS manifests.
    pub fn youtube_progressive() -> Self {
        Self {
            extractor: "youtube".to_string(),
            player_clients: vec!["android".to_string(), "web".to_string()],
            skip: vec!["dash".to_string(), "hls".to_string()],
        }
    }

    /// Render as a `--extractor-args` value.
    pub fn to_arg(&self) -> String {
        let mut fields = Vec::new();
        if !self.player_clients.is_empty() {
            fields.push(format!("player_client={}", self.player_clients.join(",")));
        }
        if !self.skip.is_empty() {
            fields.push(format!("skip={}", self.skip.join(",")));
        }
        format!("{}:{}", self.extractor, fields.join(";"))
    }
}

/// Every yt-dlp option the pipeline uses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchConfig {
    /// Output file name template, relative to the output directory
    pub output_template: String,
    /// Format selection expression
    pub format: String,
    /// Container used when video and audio are merged
    pub merge_output_format: String,
    /// Allow content up to this age rating
    pub age_limit: Option<u8>,
    /// Fetch a single item even if the URL points into a playlist
    pub no_playlist: bool,
    /// Accelerated transfer, `None` for yt-dlp's own downloader
    pub external_downloader: Option<ExternalDownloader>,
    /// Per-source feature gating
    pub extractor_args: Vec<ExtractorArgs>,
}

impl FetchConfig {
    /// Primary preset: aria2c with 8 connections and 1M chunks.
    pub fn accelerated() -> Self {
        Self {
            external_downloader: Some(ExternalDownloader::aria2c()),
            ..Self::standard()
        }
    }

    /// Fallback preset: same selection, built-in downloader.
    pub fn standard() -> Self {
        Self {
            output_template: "%(title)s.%(ext)s".to_string(),
            format: "bestvideo+bestaudio/best".to_string(),
            merge_output_format: "mp4".to_string(),
            age_limit: Some(18),
            no_playlist: true,
            external_downloader: None,
            extractor_args: vec![ExtractorArgs::youtube_progressive()],
        }
    }

    /// Build the yt-dlp argument list for `url`, writing into `output_dir`.
    pub fn to_args(&self, url: &str, output_dir: &Path) -> Vec<String> {
        let mut args = vec![
            "--quiet".to_string(),
            "--no-warnings".to_string(),
            "-f".to_string(),
            self.format.clone(),
            "--merge-output-format".to_string(),
            self.merge_output_format.clone(),
            "-o".to_string(),
            output_dir
                .join(&self.output_template)
                .to_string_lossy()
                .to_string(),
        ];

        if self.no_playlist {
            args.push("--no-playlist".to_string());
        }

        if let Some(limit) = self.age_limit {
            args.push("--age-limit".to_string());
            args.push(limit.to_string());
        }

        if let Some(dl) = &self.external_downloader {
            args.push("--downloader".to_string());
            args.push(dl.name.clone());
            args.push("--downloader-args".to_string());
            args.push(format!(
                "{}:-x {} -k {}",
                dl.name, dl.connections, dl.chunk_size
            ));
        }

        for extractor in &self.extractor_args {
            args.push("--extractor-args".to_string());
            args.push(extractor.to_arg());
        }

        // Print the final file path and metadata once post-processing is done
        args.push("--no-simulate".to_string());
        args.push("--print".to_string());
        args.push("after_move:%(.{filepath,title,duration})j".to_string());

        args.push(url.to_string());
        args
    }
}

/// A successfully fetched file.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedMedia {
    pub path: PathBuf,
    pub title: String,
    pub duration_seconds: Option<f64>,
}

/// The acquisition backend: fetch by URL into a directory.
#[async_trait]
pub trait MediaFetcher: Send + Sync {
    async fn fetch(
        &self,
        url: &str,
        config: &FetchConfig,
        output_dir: &Path,
    ) -> MediaResult<FetchedMedia>;
}

/// [`MediaFetcher`] backed by the `yt-dlp` binary.
#[derive(Debug, Default, Clone)]
pub struct YtDlpFetcher;

impl YtDlpFetcher {
    pub fn new() -> Self {
        Self
    }
}

#[derive(Debug, Deserialize)]
struct PrintedInfo {
    filepath: Option<String>,
    title: Option<String>,
    duration: Option<f64>,
}

fn parse_printed_info(stdout: &str) -> MediaResult<FetchedMedia> {
    let line = last_line(stdout)
        .ok_or_else(|| MediaError::download_failed("yt-dlp printed no file information"))?;
    let info: PrintedInfo = serde_json::from_str(line)?;

    let path = info
        .filepath
        .map(PathBuf::from)
        .ok_or_else(|| MediaError::download_failed("yt-dlp did not report an output file"))?;

    Ok(FetchedMedia {
        path,
        title: info.title.unwrap_or_else(|| "Video".to_string()),
        duration_seconds: info.duration,
    })
}

#[async_trait]
impl MediaFetcher for YtDlpFetcher {
    async fn fetch(
        &self,
        url: &str,
        config: &FetchConfig,
        output_dir: &Path,
    ) -> MediaResult<FetchedMedia> {
        check_ytdlp()?;

        let args = config.to_args(url, output_dir);
        info!(
            url = %url,
            accelerated = config.external_downloader.is_some(),
            output_dir = %output_dir.display(),
            "Fetching media with yt-dlp"
        );

        let output = Command::new("yt-dlp")
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            debug!("yt-dlp stderr: {}", stderr);
            let error_msg = last_line(&stderr).unwrap_or("Unknown error");
            return Err(MediaError::download_failed(format!(
                "yt-dlp failed: {}",
                error_msg
            )));
        }

        let fetched = parse_printed_info(&String::from_utf8_lossy(&output.stdout))?;

        let size = match tokio::fs::metadata(&fetched.path).await {
            Ok(m) => m.len(),
            Err(_) => return Err(MediaError::download_failed("Output file not created")),
        };
        if size == 0 {
            return Err(MediaError::download_failed("Empty file"));
        }

        info!(
            output = %fetched.path.display(),
            size_mb = size as f64 / (1024.0 * 1024.0),
            "Fetched media successfully"
        );

        Ok(fetched)
    }
}
