//! Local stand-in for the chat transport.
//!
//! Status lines go to stdout; delivered files and documents are copied into
//! an outbox directory and relays into a per-target subdirectory.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use vrelay_models::RequesterId;

use crate::error::{WorkerError, WorkerResult};
use crate::transport::{DeliveryRef, StatusHandle, Transport};

pub struct ConsoleTransport {
    outbox_dir: PathBuf,
    relay_dir: PathBuf,
    counter: Arc<AtomicU64>,
}

impl ConsoleTransport {
    pub fn new(outbox_dir: impl Into<PathBuf>, relay_dir: impl Into<PathBuf>) -> Self {
        Self {
            outbox_dir: outbox_dir.into(),
            relay_dir: relay_dir.into(),
            counter: Arc::new(AtomicU64::new(0)),
        }
    }

    fn next_id(&self) -> u64 {
        self.counter.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Copy `src` into `dir` under a numbered name.
    async fn copy_into(&self, dir: &Path, src: &Path) -> WorkerResult<PathBuf> {
        let file_name = src
            .file_name()
            .ok_or_else(|| WorkerError::transport(format!("not a file: {}", src.display())))?;
        tokio::fs::create_dir_all(dir).await?;

        let dest = dir.join(format!(
            "{:04}_{}",
            self.next_id(),
            file_name.to_string_lossy()
        ));
        tokio::fs::copy(src, &dest).await?;
        Ok(dest)
    }
}

struct ConsoleStatus {
    id: u64,
    to: RequesterId,
}

#[async_trait]
impl StatusHandle for ConsoleStatus {
    async fn update(&self, text: &str) -> WorkerResult<()> {
        println!("[{}] (edit #{}) {}", self.to, self.id, text);
        Ok(())
    }

    async fn delete(&self) -> WorkerResult<()> {
        debug!(id = self.id, "Status message deleted");
        Ok(())
    }
}

#[async_trait]
impl Transport for ConsoleTransport {
    async fn report_status(&self, to: &RequesterId, text: &str) -> WorkerResult<()> {
        println!("[{to}] {text}");
        Ok(())
    }

    async fn report_status_updatable(
        &self,
        to: &RequesterId,
        text: &str,
    ) -> WorkerResult<Box<dyn StatusHandle>> {
        let id = self.next_id();
        println!("[{to}] (#{id}) {text}");
        Ok(Box::new(ConsoleStatus { id, to: to.clone() }))
    }

    async fn deliver_file(
        &self,
        to: &RequesterId,
        path: &Path,
        caption: &str,
        thumbnail: Option<&Path>,
    ) -> WorkerResult<DeliveryRef> {
        let dest = self.copy_into(&self.outbox_dir, path).await?;
        if let Some(thumb) = thumbnail {
            self.copy_into(&self.outbox_dir, thumb).await?;
        }
        println!("[{to}] 🎞️ {}\n{caption}", dest.display());
        Ok(DeliveryRef(dest.to_string_lossy().into_owned()))
    }

    async fn relay(&self, delivery: &DeliveryRef, target: &RequesterId) -> WorkerResult<()> {
        let dir = self.relay_dir.join(target.as_str());
        let dest = self.copy_into(&dir, Path::new(&delivery.0)).await?;
        debug!(delivery = %delivery, dest = %dest.display(), "Relayed delivery");
        Ok(())
    }

    async fn deliver_document(
        &self,
        to: &RequesterId,
        path: &Path,
        caption: &str,
    ) -> WorkerResult<()> {
        let dest = self.copy_into(&self.outbox_dir, path).await?;
        println!("[{to}] 📄 {}\n{caption}", dest.display());
        Ok(())
    }
}
