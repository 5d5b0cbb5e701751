//! In-memory FIFO job queue.
//!
//! This crate provides:
//! - Enqueueing single jobs and batches of URLs
//! - Head-of-queue dequeue for the single consumer
//! - Skip-N with export of the removed URLs, clear, and read-only snapshots
//!
//! The queue itself holds no lock. Owners put it behind the one mutex that
//! also guards the rest of the pipeline's shared state.

pub mod error;
pub mod queue;

pub use error::{QueueError, QueueResult};
pub use queue::{JobQueue, SkipOutcome};
