//! The delivery side of the pipeline.
//!
//! Chat transport, message formatting and file upload live outside this
//! crate. The worker only needs the narrow surface below.

use async_trait::async_trait;
use std::fmt;
use std::path::Path;

use vrelay_models::RequesterId;

use crate::error::WorkerResult;

/// Reference to a delivered file, as understood by the transport.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeliveryRef(pub String);

impl fmt::Display for DeliveryRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A status message that can be edited in place or removed.
#[async_trait]
pub trait StatusHandle: Send + Sync {
    async fn update(&self, text: &str) -> WorkerResult<()>;
    async fn delete(&self) -> WorkerResult<()>;
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a one-off status line.
    async fn report_status(&self, to: &RequesterId, text: &str) -> WorkerResult<()>;

    /// Send a status line that can later be updated or deleted.
    async fn report_status_updatable(
        &self,
        to: &RequesterId,
        text: &str,
    ) -> WorkerResult<Box<dyn StatusHandle>>;

    /// Deliver a playable file with its caption and optional thumbnail.
    async fn deliver_file(
        &self,
        to: &RequesterId,
        path: &Path,
        caption: &str,
        thumbnail: Option<&Path>,
    ) -> WorkerResult<DeliveryRef>;

    /// Mirror an already delivered item into another destination.
    async fn relay(&self, delivery: &DeliveryRef, target: &RequesterId) -> WorkerResult<()>;

    /// Deliver a plain document (exported link lists and the like).
    async fn deliver_document(&self, to: &RequesterId, path: &Path, caption: &str)
        -> WorkerResult<()>;
}
