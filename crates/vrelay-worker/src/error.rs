//! Worker error types.

use thiserror::Error;

use vrelay_media::MediaError;
use vrelay_models::SessionError;
use vrelay_queue::QueueError;

pub type WorkerResult<T> = Result<T, WorkerError>;

/// Longest failure text shown to a requester.
pub const MAX_USER_MESSAGE_CHARS: usize = 200;

#[derive(Debug, Error)]
pub enum WorkerError {
    /// Both acquisition backends failed.
    #[error("Acquisition failed for {origin}: {reason}")]
    AcquisitionFailed { origin: String, reason: String },

    /// Neither splitting strategy produced a part.
    #[error("Split failed: {0}")]
    SplitFailed(String),

    /// The current job was cancelled on request. A control signal, not a failure.
    #[error("Job cancelled")]
    Cancelled,

    /// Invalid configuration or administrative input.
    #[error("{0}")]
    ConfigError(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<SessionError> for WorkerError {
    fn from(e: SessionError) -> Self {
        Self::ConfigError(e.to_string())
    }
}

impl WorkerError {
    pub fn acquisition_failed(origin: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::AcquisitionFailed {
            origin: origin.into(),
            reason: reason.into(),
        }
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            WorkerError::Cancelled | WorkerError::Media(MediaError::Cancelled)
        )
    }

    /// Bounded message suitable for the requester.
    pub fn user_summary(&self) -> String {
        match self {
            WorkerError::AcquisitionFailed { origin, reason } => format!(
                "❌ Both methods failed!\nDomain: {}\nReason: {}",
                origin,
                truncate_message(reason, MAX_USER_MESSAGE_CHARS)
            ),
            WorkerError::Cancelled => "🛑 Process cancelled successfully!".to_string(),
            other => format!(
                "❌ Processing error: {}",
                truncate_message(&other.to_string(), MAX_USER_MESSAGE_CHARS)
            ),
        }
    }
}

/// Truncate to at most `max_chars` characters.
pub fn truncate_message(message: &str, max_chars: usize) -> String {
    message.chars().take(max_chars).collect()
}
