//! Job definitions for queue processing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque handle for whoever submitted a job (a chat, a user, a console).
///
/// The pipeline never interprets it; it is only handed back to the transport
/// when status or files have to reach the submitter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequesterId(pub String);

impl RequesterId {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequesterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single media-fetch request.
///
/// Immutable once created: owned by the queue until dequeued, then by the
/// processor until it is finished with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    /// Unique job ID
    pub job_id: JobId,
    /// URL to fetch
    pub url: String,
    /// Who asked for it
    pub submitter: RequesterId,
    /// When the job was created
    pub created_at: DateTime<Utc>,
}

impl Job {
    /// Create a new job.
    pub fn new(url: impl Into<String>, submitter: RequesterId) -> Self {
        Self {
            job_id: JobId::new(),
            url: url.into(),
            submitter,
            created_at: Utc::now(),
        }
    }

    /// Whole seconds spent waiting since submission.
    pub fn queued_secs(&self) -> i64 {
        (Utc::now() - self.created_at).num_seconds().max(0)
    }
}
