//! Runtime-mutable session settings.
//!
//! These knobs are changed by admin commands while the pipeline runs and are
//! read by the processor before each job and each delivery. Nothing here is
//! persisted across restarts.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Upper bound for the delay between parts of one video.
pub const MAX_PART_DELAY_SECS: u64 = 30;

/// Default caption appended to full (unsplit) videos.
pub const DEFAULT_CAPTION: &str = "🔥 Complete Video";

/// Default delay between two jobs.
pub const DEFAULT_JOB_DELAY_SECS: u64 = 15;

/// Invalid values for session settings.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("Delay cannot be negative")]
    NegativeDelay,

    #[error("Delay must be between 0 and {MAX_PART_DELAY_SECS} seconds")]
    PartDelayOutOfRange,

    #[error("Caption text cannot be empty")]
    EmptyCaption,
}

/// An extra caption that is appended to the next `count` deliveries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtraCaption {
    pub count: u32,
    pub text: String,
}

/// Session settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    inter_job_delay_secs: u64,
    inter_part_delay_secs: u64,
    extra_caption: ExtraCaption,
    default_caption: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            inter_job_delay_secs: DEFAULT_JOB_DELAY_SECS,
            inter_part_delay_secs: 0,
            extra_caption: ExtraCaption::default(),
            default_caption: DEFAULT_CAPTION.to_string(),
        }
    }
}

impl SessionConfig {
    /// Create settings with explicit starting values. The part delay is clamped.
    pub fn new(
        inter_job_delay_secs: u64,
        inter_part_delay_secs: u64,
        default_caption: impl Into<String>,
    ) -> Self {
        Self {
            inter_job_delay_secs,
            inter_part_delay_secs: inter_part_delay_secs.min(MAX_PART_DELAY_SECS),
            extra_caption: ExtraCaption::default(),
            default_caption: default_caption.into(),
        }
    }

    pub fn inter_job_delay_secs(&self) -> u64 {
        self.inter_job_delay_secs
    }

    pub fn inter_part_delay_secs(&self) -> u64 {
        self.inter_part_delay_secs
    }

    pub fn default_caption(&self) -> &str {
        &self.default_caption
    }

    pub fn extra_caption(&self) -> &ExtraCaption {
        &self.extra_caption
    }

    /// Set the delay between jobs.
    pub fn set_inter_job_delay(&mut self, secs: i64) -> Result<u64, SessionError> {
        let secs = u64::try_from(secs).map_err(|_| SessionError::NegativeDelay)?;
        self.inter_job_delay_secs = secs;
        Ok(secs)
    }

    /// Set the delay between parts, rejecting anything outside `0..=30`.
    pub fn set_inter_part_delay(&mut self, secs: i64) -> Result<u64, SessionError> {
        let secs = u64::try_from(secs).map_err(|_| SessionError::PartDelayOutOfRange)?;
        if secs > MAX_PART_DELAY_SECS {
            return Err(SessionError::PartDelayOutOfRange);
        }
        self.inter_part_delay_secs = secs;
        Ok(secs)
    }

    pub fn set_default_caption(&mut self, text: impl Into<String>) -> Result<(), SessionError> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(SessionError::EmptyCaption);
        }
        self.default_caption = text;
        Ok(())
    }

    /// Replace any pending extra caption.
    pub fn set_extra_caption(&mut self, count: u32, text: impl Into<String>) {
        self.extra_caption = ExtraCaption {
            count,
            text: text.into(),
        };
    }

    pub fn reset_extra_caption(&mut self) {
        self.extra_caption = ExtraCaption::default();
    }

    /// Append the pending extra caption to `caption`, consuming exactly one use.
    pub fn decorate_caption(&mut self, caption: &str) -> String {
        if self.extra_caption.count == 0 {
            return caption.to_string();
        }
        self.extra_caption.count -= 1;
        format!("{}\n\n{}", caption, self.extra_caption.text)
    }
}
