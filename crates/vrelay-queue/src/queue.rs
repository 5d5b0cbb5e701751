//! FIFO queue of pending jobs.

use std::collections::VecDeque;
use tracing::debug;

use vrelay_models::{Job, RequesterId};

use crate::error::{QueueError, QueueResult};

/// Result of [`JobQueue::skip`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipOutcome {
    /// The skip count reached the queue size, so the whole queue was dropped.
    Cleared { removed: usize },
    /// The first jobs were removed; their URLs are returned in queue order.
    Skipped { urls: Vec<String>, remaining: usize },
}

/// Ordered collection of pending jobs.
#[derive(Debug, Default, Clone)]
pub struct JobQueue {
    jobs: VecDeque<Job>,
}

impl JobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a job to the tail.
    pub fn enqueue(&mut self, job: Job) {
        debug!(job_id = %job.job_id, url = %job.url, "Job enqueued");
        self.jobs.push_back(job);
    }

    /// Append one job per URL, all from the same submitter. Returns how many were added.
    pub fn enqueue_batch<I, S>(&mut self, urls: I, submitter: &RequesterId) -> usize
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let before = self.jobs.len();
        self.jobs
            .extend(urls.into_iter().map(|url| Job::new(url, submitter.clone())));
        self.jobs.len() - before
    }

    /// Remove and return the head.
    pub fn dequeue(&mut self) -> Option<Job> {
        self.jobs.pop_front()
    }

    /// Drop the first `n` jobs.
    ///
    /// A count that reaches the queue size clears the queue outright and
    /// exports nothing. This mirrors the long-standing admin behaviour and
    /// is kept on purpose.
    pub fn skip(&mut self, n: usize) -> QueueResult<SkipOutcome> {
        if n == 0 {
            return Err(QueueError::InvalidSkipCount);
        }

        if n >= self.jobs.len() {
            let removed = self.clear();
            return Ok(SkipOutcome::Cleared { removed });
        }

        let urls = self.jobs.drain(..n).map(|job| job.url).collect();
        Ok(SkipOutcome::Skipped {
            urls,
            remaining: self.jobs.len(),
        })
    }

    /// URLs in queue order.
    pub fn snapshot(&self) -> Vec<String> {
        self.jobs.iter().map(|job| job.url.clone()).collect()
    }

    /// Remove everything. Returns how many jobs were dropped.
    pub fn clear(&mut self) -> usize {
        let removed = self.jobs.len();
        self.jobs.clear();
        removed
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}
