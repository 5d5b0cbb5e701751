//! Two-tier acquisition: accelerated fetch first, plain fetch as fallback.

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use vrelay_media::{FetchConfig, MediaError, MediaFetcher};
use vrelay_models::{origin_of, AcquiredMedia};

use crate::cancel::CancelToken;
use crate::error::{truncate_message, WorkerError, WorkerResult, MAX_USER_MESSAGE_CHARS};
use crate::origins::SupportedOrigins;

/// Receives a notice before and after each attempt.
#[async_trait]
pub trait AttemptReporter: Send + Sync {
    async fn attempt_started(&self, method: &str);

    /// `outcome` carries the bounded failure reason on error.
    async fn attempt_finished(&self, method: &str, outcome: Result<(), &str>);
}

/// One named way of fetching.
#[derive(Debug, Clone)]
pub struct Attempt {
    pub method: String,
    pub config: FetchConfig,
}

impl Attempt {
    pub fn new(method: impl Into<String>, config: FetchConfig) -> Self {
        Self {
            method: method.into(),
            config,
        }
    }
}

pub struct AcquisitionStrategy {
    fetcher: Arc<dyn MediaFetcher>,
    primary: Attempt,
    fallback: Attempt,
    origins: Arc<SupportedOrigins>,
    attempt_delay: Duration,
}

impl AcquisitionStrategy {
    /// aria2c-accelerated yt-dlp first, plain yt-dlp second.
    pub fn new(
        fetcher: Arc<dyn MediaFetcher>,
        origins: Arc<SupportedOrigins>,
        attempt_delay: Duration,
    ) -> Self {
        Self {
            fetcher,
            primary: Attempt::new("aria2c", FetchConfig::accelerated()),
            fallback: Attempt::new("yt-dlp", FetchConfig::standard()),
            origins,
            attempt_delay,
        }
    }

    pub fn origins(&self) -> &Arc<SupportedOrigins> {
        &self.origins
    }

    /// Fetch `url` into `output_dir`.
    ///
    /// The fallback runs only when the primary attempt fails. A cancellation
    /// request is honoured after each attempt, once its pause has elapsed.
    pub async fn acquire(
        &self,
        url: &str,
        output_dir: &Path,
        reporter: &dyn AttemptReporter,
        cancel: &CancelToken,
    ) -> WorkerResult<AcquiredMedia> {
        let origin = origin_of(url);
        let mut last_reason = String::from("Could not download video");

        for attempt in [&self.primary, &self.fallback] {
            reporter.attempt_started(&attempt.method).await;

            let result = self.try_attempt(url, attempt, output_dir).await;
            match &result {
                Ok(_) => reporter.attempt_finished(&attempt.method, Ok(())).await,
                Err(e) => {
                    last_reason = truncate_message(&e.to_string(), MAX_USER_MESSAGE_CHARS);
                    reporter
                        .attempt_finished(&attempt.method, Err(last_reason.as_str()))
                        .await;
                }
            }

            tokio::time::sleep(self.attempt_delay).await;
            cancel.check()?;

            if let Ok(mut media) = result {
                if let Some(origin) = &origin {
                    if let Err(e) = self.origins.register(origin).await {
                        warn!(origin = %origin, "Failed to persist supported origin: {}", e);
                    }
                }
                media.origin_domain = origin;
                info!(url, method = %attempt.method, size_bytes = media.size_bytes, "Acquired media");
                return Ok(media);
            }
        }

        Err(WorkerError::acquisition_failed(
            origin.unwrap_or_else(|| url.to_string()),
            last_reason,
        ))
    }

    async fn try_attempt(
        &self,
        url: &str,
        attempt: &Attempt,
        output_dir: &Path,
    ) -> Result<AcquiredMedia, MediaError> {
        let fetched = self.fetcher.fetch(url, &attempt.config, output_dir).await?;

        let size_bytes = match tokio::fs::metadata(&fetched.path).await {
            Ok(m) => m.len(),
            Err(_) => return Err(MediaError::FileNotFound(fetched.path)),
        };
        if size_bytes == 0 {
            return Err(MediaError::download_failed("Empty file"));
        }

        Ok(AcquiredMedia {
            local_path: fetched.path,
            title: fetched.title,
            size_bytes,
            duration_seconds: fetched.duration_seconds.unwrap_or(0.0),
            origin_domain: None,
        })
    }
}
