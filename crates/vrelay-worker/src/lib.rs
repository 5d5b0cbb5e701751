//! Media relay worker.
//!
//! This crate provides:
//! - Two-tier acquisition with origin bookkeeping
//! - Per-job processing (whole delivery or bitrate-based split)
//! - The single-flight orchestrator and its shared state
//! - Admin command handling
//! - A console transport for local runs

pub mod acquisition;
pub mod cancel;
pub mod commands;
pub mod config;
pub mod console;
pub mod error;
pub mod executor;
pub mod logging;
pub mod origins;
pub mod processor;
pub mod state;
pub mod transport;

pub use acquisition::{AcquisitionStrategy, AttemptReporter};
pub use cancel::{cancel_pair, CancelHandle, CancelToken};
pub use commands::{extract_urls, Command, CommandHandler};
pub use config::WorkerConfig;
pub use console::ConsoleTransport;
pub use error::{WorkerError, WorkerResult};
pub use executor::Orchestrator;
pub use logging::{DeliveryKind, JobLogger};
pub use origins::SupportedOrigins;
pub use processor::{process_job, JobContext};
pub use state::{CancelOutcome, ProcessingState, SharedState};
pub use transport::{DeliveryRef, StatusHandle, Transport};
