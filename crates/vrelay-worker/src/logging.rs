//! Per-job structured logging.
//!
//! A [`JobLogger`] is created when a job leaves the queue and carries the
//! job's id, URL and queue position into every event it emits, from the
//! acquisition attempts through each delivered part to the relay copy.

use std::path::Path;

use tracing::{error, info, warn, Span};
use vrelay_models::{AcquiredMedia, Job, Part, RequesterId};

use crate::error::WorkerError;
use crate::transport::DeliveryRef;

/// What is being delivered: the whole file or one part of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryKind<'a> {
    Whole,
    Part(&'a Part),
}

impl DeliveryKind<'_> {
    fn label(&self) -> String {
        match self {
            Self::Whole => "full video".to_string(),
            Self::Part(part) => part.label(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: String,
    url: String,
    position: usize,
    total: usize,
}

impl JobLogger {
    /// Logger for the `position`-th of `total` jobs in the current run.
    pub fn new(job: &Job, position: usize, total: usize) -> Self {
        Self {
            job_id: job.job_id.to_string(),
            url: job.url.clone(),
            position,
            total,
        }
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Span wrapping everything the job does.
    pub fn span(&self) -> Span {
        tracing::info_span!(
            "job",
            job_id = %self.job_id,
            url = %self.url,
            position = self.position,
            total = self.total
        )
    }

    pub fn dequeued(&self, queued_secs: i64) {
        info!(
            job_id = %self.job_id,
            url = %self.url,
            queued_secs,
            "Dequeued {} of {}", self.position, self.total
        );
    }

    pub fn attempt(&self, method: &str, outcome: Result<(), &str>) {
        match outcome {
            Ok(()) => info!(job_id = %self.job_id, method, "Acquisition attempt succeeded"),
            Err(reason) => warn!(
                job_id = %self.job_id,
                method,
                reason,
                "Acquisition attempt failed"
            ),
        }
    }

    pub fn acquired(&self, media: &AcquiredMedia) {
        info!(
            job_id = %self.job_id,
            title = %media.title,
            size_bytes = media.size_bytes,
            duration_secs = media.duration_seconds,
            origin = media.origin_domain.as_deref().unwrap_or("-"),
            "Media acquired"
        );
    }

    pub fn split(&self, parts: usize) {
        info!(job_id = %self.job_id, parts, "Media split");
    }

    pub fn delivered(&self, kind: DeliveryKind<'_>, path: &Path, delivery: &DeliveryRef) {
        info!(
            job_id = %self.job_id,
            item = %kind.label(),
            path = %path.display(),
            delivery = %delivery,
            "Delivered"
        );
    }

    pub fn delivery_failed(&self, kind: DeliveryKind<'_>, path: &Path, err: &WorkerError) {
        warn!(
            job_id = %self.job_id,
            item = %kind.label(),
            path = %path.display(),
            "Upload failed: {}", err
        );
    }

    pub fn relayed(&self, delivery: &DeliveryRef, target: &RequesterId) {
        info!(job_id = %self.job_id, delivery = %delivery, target = %target, "Relayed");
    }

    pub fn relay_failed(&self, delivery: &DeliveryRef, target: &RequesterId, err: &WorkerError) {
        warn!(
            job_id = %self.job_id,
            delivery = %delivery,
            target = %target,
            "Relay failed: {}", err
        );
    }

    pub fn status_failed(&self, what: &str, err: &WorkerError) {
        warn!(job_id = %self.job_id, what, "Status message failed: {}", err);
    }

    /// Final outcome of the job.
    pub fn finished(&self, result: &Result<(), WorkerError>) {
        match result {
            Ok(()) => info!(job_id = %self.job_id, url = %self.url, "Job completed"),
            Err(e) if e.is_cancelled() => {
                info!(job_id = %self.job_id, url = %self.url, "Job cancelled")
            }
            Err(e) => error!(job_id = %self.job_id, url = %self.url, "Job failed: {}", e),
        }
    }
}
