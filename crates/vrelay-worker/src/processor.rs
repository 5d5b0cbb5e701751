//! Per-job processing: acquire, then deliver whole or split.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::warn;

use vrelay_media::{extract_thumbnail, split_media, MediaError, MediaToolkit};
use vrelay_models::{AcquiredMedia, Job, RequesterId, MB};

use crate::acquisition::{AcquisitionStrategy, AttemptReporter};
use crate::cancel::CancelToken;
use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::logging::{DeliveryKind, JobLogger};
use crate::state::SharedState;
use crate::transport::{StatusHandle, Transport};

/// Everything a job needs from the outside.
pub struct JobContext {
    pub config: WorkerConfig,
    pub transport: Arc<dyn Transport>,
    pub acquisition: AcquisitionStrategy,
    pub toolkit: Arc<dyn MediaToolkit>,
    pub state: Arc<Mutex<SharedState>>,
}

/// Shows each acquisition attempt as one status line, edited with its outcome.
struct TransportAttemptReporter<'a> {
    transport: &'a dyn Transport,
    to: &'a RequesterId,
    logger: &'a JobLogger,
    status: Mutex<Option<Box<dyn StatusHandle>>>,
}

impl<'a> TransportAttemptReporter<'a> {
    fn new(transport: &'a dyn Transport, to: &'a RequesterId, logger: &'a JobLogger) -> Self {
        Self {
            transport,
            to,
            logger,
            status: Mutex::new(None),
        }
    }
}

#[async_trait]
impl AttemptReporter for TransportAttemptReporter<'_> {
    async fn attempt_started(&self, method: &str) {
        let text = format!("🔄 Attempting {method} download...");
        match self.transport.report_status_updatable(self.to, &text).await {
            Ok(handle) => *self.status.lock().await = Some(handle),
            Err(e) => self.logger.status_failed("attempt start", &e),
        }
    }

    async fn attempt_finished(&self, method: &str, outcome: Result<(), &str>) {
        self.logger.attempt(method, outcome);
        let text = match outcome {
            Ok(()) => format!("✅ {method} succeeded!"),
            Err(reason) => format!("⚠️ {method} failed: {reason}"),
        };
        let result = match self.status.lock().await.take() {
            Some(handle) => handle.update(&text).await,
            None => self.transport.report_status(self.to, &text).await,
        };
        if let Err(e) = result {
            self.logger.status_failed("attempt outcome", &e);
        }
    }
}

/// Process one job inside its own temporary directory.
///
/// The directory and everything acquired into it are removed when this
/// returns, whatever the outcome.
pub async fn process_job(
    ctx: &JobContext,
    job: &Job,
    logger: &JobLogger,
    cancel: &CancelToken,
) -> WorkerResult<()> {
    let work_dir = tempfile::Builder::new()
        .prefix("vrelay_")
        .tempdir_in(&ctx.config.work_dir)?;

    let reporter = TransportAttemptReporter::new(ctx.transport.as_ref(), &job.submitter, logger);
    let media = ctx
        .acquisition
        .acquire(&job.url, work_dir.path(), &reporter, cancel)
        .await?;
    cancel.check()?;
    logger.acquired(&media);

    if ctx.config.limits.needs_split(media.size_bytes) {
        deliver_parts(ctx, job, &media, work_dir.path(), logger, cancel).await?;
    } else {
        deliver_whole(ctx, job, &media, work_dir.path(), logger, cancel).await?;
    }

    work_dir.close()?;
    Ok(())
}

async fn deliver_whole(
    ctx: &JobContext,
    job: &Job,
    media: &AcquiredMedia,
    work_dir: &Path,
    logger: &JobLogger,
    cancel: &CancelToken,
) -> WorkerResult<()> {
    let thumbnail = extract_thumbnail(
        ctx.toolkit.as_ref(),
        &media.local_path,
        &work_dir.join("thumb.jpg"),
    )
    .await;

    status(ctx, &job.submitter, "📤 Uploading full video...").await;
    cancel.check()?;

    let caption = {
        let mut state = ctx.state.lock().await;
        let base = format!("🎬 {}\n{}", media.title, state.session.default_caption());
        state.session.decorate_caption(&base)
    };
    let delivery = Delivery {
        kind: DeliveryKind::Whole,
        path: &media.local_path,
        caption: &caption,
        thumbnail: thumbnail.as_deref(),
    };
    deliver(ctx, &job.submitter, delivery, logger).await;
    Ok(())
}

async fn deliver_parts(
    ctx: &JobContext,
    job: &Job,
    media: &AcquiredMedia,
    work_dir: &Path,
    logger: &JobLogger,
    cancel: &CancelToken,
) -> WorkerResult<()> {
    let part_mb = ctx.config.limits.part_size_bytes / MB;
    status(ctx, &job.submitter, &format!("✂️ Splitting into {part_mb}MB parts...")).await;

    let parts = split_media(
        ctx.toolkit.as_ref(),
        &media.local_path,
        &work_dir.join("parts"),
        ctx.config.limits.part_size_bytes,
        &|| cancel.is_cancelled(),
    )
    .await
    .map_err(|e| match e {
        MediaError::SplitFailed(msg) => WorkerError::SplitFailed(msg),
        MediaError::Cancelled => WorkerError::Cancelled,
        other => other.into(),
    })?;
    logger.split(parts.len());

    for part in &parts {
        cancel.check()?;

        let thumb_path = work_dir.join(format!("thumb_{}.jpg", part.sequence_index));
        let thumbnail = extract_thumbnail(ctx.toolkit.as_ref(), &part.path, &thumb_path).await;

        let label = part.label();
        status(ctx, &job.submitter, &format!("📤 Uploading {}...", label.to_lowercase())).await;

        let (caption, part_delay) = {
            let mut state = ctx.state.lock().await;
            let caption = state
                .session
                .decorate_caption(&format!("🎬 {} - {}", label, media.title));
            (caption, state.session.inter_part_delay_secs())
        };
        let delivery = Delivery {
            kind: DeliveryKind::Part(part),
            path: &part.path,
            caption: &caption,
            thumbnail: thumbnail.as_deref(),
        };
        deliver(ctx, &job.submitter, delivery, logger).await;

        if !part.is_last() && part_delay > 0 {
            tokio::time::sleep(std::time::Duration::from_secs(part_delay)).await;
        }
    }

    Ok(())
}

struct Delivery<'a> {
    kind: DeliveryKind<'a>,
    path: &'a Path,
    caption: &'a str,
    thumbnail: Option<&'a Path>,
}

/// Deliver one file and mirror it to the relay target. Failures are logged
/// and do not fail the job.
async fn deliver(ctx: &JobContext, to: &RequesterId, item: Delivery<'_>, logger: &JobLogger) {
    let delivery = match ctx
        .transport
        .deliver_file(to, item.path, item.caption, item.thumbnail)
        .await
    {
        Ok(delivery) => delivery,
        Err(e) => {
            logger.delivery_failed(item.kind, item.path, &e);
            return;
        }
    };
    logger.delivered(item.kind, item.path, &delivery);

    let Some(target) = &ctx.config.relay_target else {
        return;
    };
    tokio::time::sleep(ctx.config.relay_delay).await;
    let target = RequesterId::new(target.clone());
    match ctx.transport.relay(&delivery, &target).await {
        Ok(()) => logger.relayed(&delivery, &target),
        Err(e) => logger.relay_failed(&delivery, &target, &e),
    }
}

/// Best-effort status line.
pub(crate) async fn status(ctx: &JobContext, to: &RequesterId, text: &str) {
    if let Err(e) = ctx.transport.report_status(to, text).await {
        warn!("Failed to report status: {}", e);
    }
}

/// Write `lines` to `<dir>/<file_name>` and deliver it as a document.
///
/// The file lives in a scratch directory that is removed afterwards.
pub(crate) async fn deliver_lines(
    ctx: &JobContext,
    to: &RequesterId,
    file_name: &str,
    lines: &[String],
    caption: &str,
) -> WorkerResult<()> {
    let scratch = tempfile::Builder::new()
        .prefix("vrelay_export_")
        .tempdir_in(&ctx.config.work_dir)?;
    let path: PathBuf = scratch.path().join(file_name);

    let mut content = lines.join("\n");
    content.push('\n');
    tokio::fs::write(&path, content).await?;

    ctx.transport.deliver_document(to, &path, caption).await
}
