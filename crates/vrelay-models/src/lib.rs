//! Shared data models for the vrelay download pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Jobs and requester identities
//! - Acquired media and split parts
//! - Runtime-mutable session settings
//! - Size and encoding constants
//! - Origin (scheme + host) extraction

pub mod encoding;
pub mod job;
pub mod media;
pub mod origin;
pub mod session;

pub use encoding::{SizeLimits, MB};
pub use job::{Job, JobId, RequesterId};
pub use media::{AcquiredMedia, Part};
pub use origin::origin_of;
pub use session::{ExtraCaption, SessionConfig, SessionError, MAX_PART_DELAY_SECS};
