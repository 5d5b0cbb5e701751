//! Single-flight orchestrator.
//!
//! Owns the shared state and the one run loop that drains the queue. Any
//! number of callers may submit work or issue admin requests concurrently;
//! all of them go through the same lock the run loop uses.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, Notify};
use tracing::{error, info, warn, Instrument};

use vrelay_media::{MediaFetcher, MediaToolkit};
use vrelay_models::{Job, RequesterId, SessionConfig};
use vrelay_queue::SkipOutcome;

use crate::acquisition::AcquisitionStrategy;
use crate::cancel::CancelToken;
use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::logging::JobLogger;
use crate::origins::SupportedOrigins;
use crate::processor::{deliver_lines, process_job, status, JobContext};
use crate::state::{CancelOutcome, SharedState};
use crate::transport::{StatusHandle, Transport};

/// Handle to the pipeline. Cheap to clone.
#[derive(Clone)]
pub struct Orchestrator {
    ctx: Arc<JobContext>,
    idle: Arc<Notify>,
}

impl Orchestrator {
    pub fn new(
        config: WorkerConfig,
        transport: Arc<dyn Transport>,
        fetcher: Arc<dyn MediaFetcher>,
        toolkit: Arc<dyn MediaToolkit>,
        origins: Arc<SupportedOrigins>,
    ) -> Self {
        let acquisition = AcquisitionStrategy::new(fetcher, origins, config.attempt_delay);
        let state = SharedState::new(config.initial_session());

        Self {
            ctx: Arc::new(JobContext {
                config,
                transport,
                acquisition,
                toolkit,
                state: Arc::new(Mutex::new(state)),
            }),
            idle: Arc::new(Notify::new()),
        }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.ctx.config
    }

    pub fn origins(&self) -> &Arc<SupportedOrigins> {
        self.ctx.acquisition.origins()
    }

    /// Queue `urls` for `submitter` and make sure the run loop is going.
    ///
    /// Returns the number of jobs added. The whole batch becomes visible at once.
    pub async fn submit_urls(&self, urls: Vec<String>, submitter: &RequesterId) -> usize {
        if urls.is_empty() {
            return 0;
        }

        let (added, total) = {
            let mut state = self.ctx.state.lock().await;
            let added = state.queue.enqueue_batch(urls, submitter);
            (added, state.queue.len())
        };
        info!(added, total, "Links queued");

        self.reply(
            submitter,
            &format!("🆕 {added} links added to list\n📊 Total Links in queue: {total}"),
        )
        .await;
        self.ensure_running().await;
        added
    }

    /// Start the run loop unless it is already running.
    ///
    /// The loop is watched by a second task: if it dies with a panic the
    /// running flag is released and idle waiters are woken, so the next
    /// submission can start a fresh loop.
    pub async fn ensure_running(&self) {
        let start = {
            let mut state = self.ctx.state.lock().await;
            !state.queue.is_empty() && state.processing.try_start()
        };
        if !start {
            return;
        }

        let this = self.clone();
        let run_loop = tokio::spawn(async move { this.run_loop().await });
        let this = self.clone();
        tokio::spawn(async move {
            if let Err(e) = run_loop.await {
                error!("Run loop aborted: {}", e);
                this.ctx.state.lock().await.processing.stop();
                this.idle.notify_waiters();
            }
        });
    }

    pub async fn is_running(&self) -> bool {
        self.ctx.state.lock().await.processing.is_running()
    }

    /// Resolve once the run loop has stopped.
    pub async fn wait_until_idle(&self) {
        loop {
            let notified = self.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if !self.is_running().await {
                return;
            }
            notified.await;
        }
    }

    pub async fn request_cancel(&self) -> CancelOutcome {
        let outcome = self.ctx.state.lock().await.processing.request_cancel();
        info!(?outcome, "Cancel requested");
        outcome
    }

    /// Cancel the current job (if any) and drop the whole backlog.
    pub async fn clean(&self) -> (CancelOutcome, usize) {
        let mut state = self.ctx.state.lock().await;
        let outcome = state.processing.request_cancel();
        let removed = state.clear_queue();
        info!(?outcome, removed, "Queue cleaned");
        (outcome, removed)
    }

    pub async fn skip(&self, n: usize) -> WorkerResult<SkipOutcome> {
        Ok(self.ctx.state.lock().await.skip(n)?)
    }

    /// Pending URLs in processing order.
    pub async fn remaining(&self) -> Vec<String> {
        self.ctx.state.lock().await.queue.snapshot()
    }

    pub async fn session(&self) -> SessionConfig {
        self.ctx.state.lock().await.session.clone()
    }

    pub async fn set_inter_job_delay(&self, secs: i64) -> WorkerResult<u64> {
        Ok(self.ctx.state.lock().await.session.set_inter_job_delay(secs)?)
    }

    pub async fn set_inter_part_delay(&self, secs: i64) -> WorkerResult<u64> {
        Ok(self.ctx.state.lock().await.session.set_inter_part_delay(secs)?)
    }

    pub async fn set_default_caption(&self, text: &str) -> WorkerResult<()> {
        Ok(self.ctx.state.lock().await.session.set_default_caption(text)?)
    }

    pub async fn set_extra_caption(&self, count: u32, text: &str) {
        self.ctx
            .state
            .lock()
            .await
            .session
            .set_extra_caption(count, text);
    }

    /// Best-effort reply to `to`.
    pub async fn reply(&self, to: &RequesterId, text: &str) {
        status(&self.ctx, to, text).await;
    }

    /// Deliver `lines` as a text document named `file_name`.
    pub async fn export_lines(
        &self,
        to: &RequesterId,
        file_name: &str,
        lines: &[String],
        caption: &str,
    ) -> WorkerResult<()> {
        deliver_lines(&self.ctx, to, file_name, lines, caption).await
    }

    async fn run_loop(self) {
        info!("Run loop started");
        let mut processed = 0usize;

        loop {
            let next = {
                let mut state = self.ctx.state.lock().await;
                let total = state.queue.len() + processed;
                match state.queue.dequeue() {
                    Some(job) => {
                        let token = state.processing.begin_job(job.clone());
                        Some((job, total, token))
                    }
                    None => {
                        state.processing.stop();
                        None
                    }
                }
            };
            let Some((job, total, cancel)) = next else {
                break;
            };

            processed += 1;
            let cancelled = self.run_one(&job, processed, total, &cancel).await;

            let (remaining, job_delay) = {
                let mut state = self.ctx.state.lock().await;
                state.processing.finish_job();
                (state.queue.snapshot(), state.session.inter_job_delay_secs())
            };

            let export_every = self.ctx.config.export_every;
            if export_every > 0 && processed % export_every == 0 && !remaining.is_empty() {
                let r = remaining.len();
                let caption =
                    format!("📄 Processing {processed}/{total} links in queue\nRemain: {r}");
                if let Err(e) = self
                    .export_lines(&job.submitter, &format!("Remain_Links_{r}.txt"), &remaining, &caption)
                    .await
                {
                    warn!("Failed to export remaining links: {}", e);
                }
            }

            if !remaining.is_empty() && !cancelled && !cancel.is_cancelled() {
                self.countdown(&job.submitter, job_delay).await;
            }
        }

        info!(processed, "Run loop idle");
        self.idle.notify_waiters();
    }

    /// Process one job and report its outcome. Returns `true` if it was cancelled.
    async fn run_one(&self, job: &Job, k: usize, n: usize, cancel: &CancelToken) -> bool {
        let to = &job.submitter;
        let logger = JobLogger::new(job, k, n);
        logger.dequeued(job.queued_secs());

        let progress = match self
            .ctx
            .transport
            .report_status_updatable(to, &format!("🔄 Processing: {k} / {n}\n🔗 Link: {}", job.url))
            .await
        {
            Ok(handle) => Some(handle),
            Err(e) => {
                logger.status_failed("progress", &e);
                None
            }
        };

        let result = process_job(&self.ctx, job, &logger, cancel)
            .instrument(logger.span())
            .await;
        logger.finished(&result);

        let cancelled = match result {
            Ok(()) => false,
            Err(e) if e.is_cancelled() => true,
            Err(e) => {
                self.reply(to, &e.user_summary()).await;
                false
            }
        };

        if let Some(handle) = progress {
            if let Err(e) = handle.delete().await {
                logger.status_failed("progress delete", &e);
            }
        }

        if cancelled {
            self.reply(to, &WorkerError::Cancelled.user_summary()).await;
            tokio::time::sleep(self.ctx.config.cancel_cooldown).await;
        } else {
            self.reply(
                to,
                &format!(
                    "✅ Last processed link: {k} / {n}\nRemain Links: {}\n\n🔗 Link: {}",
                    n - k,
                    job.url
                ),
            )
            .await;
        }
        cancelled
    }

    /// Visible countdown of `secs` seconds before the next job.
    async fn countdown(&self, to: &RequesterId, secs: u64) {
        if secs == 0 {
            return;
        }

        let text = |s: u64| format!("⏳ Starting next link in {s}s...");
        let handle: Option<Box<dyn StatusHandle>> =
            match self.ctx.transport.report_status_updatable(to, &text(secs)).await {
                Ok(handle) => Some(handle),
                Err(e) => {
                    warn!("Failed to start countdown: {}", e);
                    None
                }
            };

        for remaining in (0..secs).rev() {
            tokio::time::sleep(Duration::from_secs(1)).await;
            if remaining == 0 {
                break;
            }
            if let Some(handle) = &handle {
                handle.update(&text(remaining)).await.ok();
            }
        }

        if let Some(handle) = handle {
            handle.delete().await.ok();
        }
    }
}
