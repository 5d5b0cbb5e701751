//! Mutable state shared between the run loop and command handlers.
//!
//! Everything here sits behind one `tokio::sync::Mutex` owned by the
//! orchestrator, so queue edits, caption bookkeeping and cancel requests
//! never interleave.

use tracing::info;
use vrelay_models::{Job, SessionConfig};
use vrelay_queue::{JobQueue, QueueResult, SkipOutcome};

use crate::cancel::{cancel_pair, CancelHandle, CancelToken};

/// Result of a cancel request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    /// The running job will stop at its next checkpoint.
    Requested,
    /// A request for the current job is already pending.
    AlreadyPending,
    /// No job is being processed.
    NothingActive,
}

/// Run-loop bookkeeping.
#[derive(Debug, Default)]
pub struct ProcessingState {
    running: bool,
    current_job: Option<Job>,
    cancel: Option<CancelHandle>,
}

impl ProcessingState {
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Claim the single run-loop slot. Returns `false` if it is taken.
    pub fn try_start(&mut self) -> bool {
        if self.running {
            return false;
        }
        self.running = true;
        true
    }

    pub fn stop(&mut self) {
        self.running = false;
        self.current_job = None;
        self.cancel = None;
    }

    /// Make `job` current with a fresh cancellation flag.
    pub fn begin_job(&mut self, job: Job) -> CancelToken {
        let (handle, token) = cancel_pair();
        self.current_job = Some(job);
        self.cancel = Some(handle);
        token
    }

    pub fn finish_job(&mut self) {
        self.current_job = None;
        self.cancel = None;
    }

    pub fn request_cancel(&self) -> CancelOutcome {
        match (&self.cancel, &self.current_job) {
            (Some(handle), Some(job)) => {
                if handle.cancel() {
                    info!(job_id = %job.job_id, url = %job.url, "Cancelling current job");
                    CancelOutcome::Requested
                } else {
                    CancelOutcome::AlreadyPending
                }
            }
            _ => CancelOutcome::NothingActive,
        }
    }
}

#[derive(Debug)]
pub struct SharedState {
    pub queue: JobQueue,
    pub session: SessionConfig,
    pub processing: ProcessingState,
}

impl SharedState {
    pub fn new(session: SessionConfig) -> Self {
        Self {
            queue: JobQueue::new(),
            session,
            processing: ProcessingState::default(),
        }
    }

    /// Empty the queue. Pending extra captions go with it.
    pub fn clear_queue(&mut self) -> usize {
        self.session.reset_extra_caption();
        self.queue.clear()
    }

    /// Skip from the front; a skip that clears the queue also drops pending
    /// extra captions.
    pub fn skip(&mut self, n: usize) -> QueueResult<SkipOutcome> {
        let outcome = self.queue.skip(n)?;
        if matches!(outcome, SkipOutcome::Cleared { .. }) {
            self.session.reset_extra_caption();
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vrelay_models::RequesterId;

    fn state_with(urls: &[&str]) -> SharedState {
        let mut state = SharedState::new(SessionConfig::default());
        state
            .queue
            .enqueue_batch(urls.iter().copied(), &RequesterId::new("admin"));
        state
    }

    #[test]
    fn test_oversized_skip_clears_and_resets_caption() {
        let mut state = state_with(&["http://a/1", "http://a/2", "http://a/3"]);
        state.session.set_extra_caption(4, "promo");

        let outcome = state.skip(1000).unwrap();

        assert_eq!(outcome, SkipOutcome::Cleared { removed: 3 });
        assert!(state.queue.is_empty());
        assert_eq!(state.session.extra_caption().count, 0);
    }

    #[test]
    fn test_partial_skip_keeps_caption() {
        let mut state = state_with(&["http://a/1", "http://a/2", "http://a/3"]);
        state.session.set_extra_caption(2, "promo");

        state.skip(1).unwrap();

        assert_eq!(state.queue.snapshot(), vec!["http://a/2", "http://a/3"]);
        assert_eq!(state.session.extra_caption().count, 2);
    }

    #[test]
    fn test_clear_resets_caption() {
        let mut state = state_with(&["http://a/1"]);
        state.session.set_extra_caption(1, "promo");
        assert_eq!(state.clear_queue(), 1);
        assert_eq!(state.session.extra_caption().count, 0);
    }

    #[test]
    fn test_cancel_outcomes() {
        let mut processing = ProcessingState::default();
        assert_eq!(processing.request_cancel(), CancelOutcome::NothingActive);

        assert!(processing.try_start());
        assert!(!processing.try_start());
        assert_eq!(processing.request_cancel(), CancelOutcome::NothingActive);

        let token = processing.begin_job(Job::new("http://a/1", RequesterId::new("admin")));
        assert_eq!(processing.request_cancel(), CancelOutcome::Requested);
        assert_eq!(processing.request_cancel(), CancelOutcome::AlreadyPending);
        assert!(token.is_cancelled());

        processing.finish_job();
        let token = processing.begin_job(Job::new("http://a/2", RequesterId::new("admin")));
        assert!(!token.is_cancelled(), "flag resets per job");

        processing.stop();
        assert!(!processing.is_running());
        assert_eq!(processing.request_cancel(), CancelOutcome::NothingActive);
    }
}
