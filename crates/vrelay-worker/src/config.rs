//! Worker configuration.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use vrelay_models::encoding::{DEFAULT_PART_SIZE_BYTES, DEFAULT_SPLIT_THRESHOLD_BYTES};
use vrelay_models::session::{DEFAULT_CAPTION, DEFAULT_JOB_DELAY_SECS};
use vrelay_models::{SessionConfig, SizeLimits, MB};

use crate::error::{WorkerError, WorkerResult};

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Parent directory of per-job temporary directories
    pub work_dir: PathBuf,
    /// Split threshold and target part size
    pub limits: SizeLimits,
    /// Initial delay between jobs (seconds)
    pub job_delay_secs: u64,
    /// Initial delay between parts (seconds, 0-30)
    pub part_delay_secs: u64,
    /// Initial caption for full videos
    pub default_caption: String,
    /// Supported-origin record
    pub site_log: PathBuf,
    /// Pause after a cancelled job
    pub cancel_cooldown: Duration,
    /// Pause after each acquisition attempt
    pub attempt_delay: Duration,
    /// Pause between a delivery and its relay
    pub relay_delay: Duration,
    /// Export the remaining links every this many jobs (0 disables)
    pub export_every: usize,
    /// Broadcast destination that delivered videos are mirrored to
    pub relay_target: Option<String>,
    /// Where the console transport drops delivered files
    pub outbox_dir: PathBuf,
    /// Where the console transport drops relayed files
    pub relay_dir: PathBuf,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            work_dir: std::env::temp_dir(),
            limits: SizeLimits::default(),
            job_delay_secs: DEFAULT_JOB_DELAY_SECS,
            part_delay_secs: 0,
            default_caption: DEFAULT_CAPTION.to_string(),
            site_log: PathBuf::from("sitelog.txt"),
            cancel_cooldown: Duration::from_secs(15),
            attempt_delay: Duration::from_secs(1),
            relay_delay: Duration::from_millis(2500),
            export_every: 5,
            relay_target: None,
            outbox_dir: PathBuf::from("outbox"),
            relay_dir: PathBuf::from("outbox/relay"),
        }
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> WorkerResult<Self> {
        let defaults = Self::default();

        let split_threshold_mb = env_or(
            "VRELAY_SPLIT_THRESHOLD_MB",
            DEFAULT_SPLIT_THRESHOLD_BYTES / MB,
        );
        let part_size_mb = env_or("VRELAY_PART_SIZE_MB", DEFAULT_PART_SIZE_BYTES / MB);
        let limits = SizeLimits::new(split_threshold_mb * MB, part_size_mb * MB).ok_or_else(|| {
            WorkerError::config_error(format!(
                "part size ({part_size_mb} MB) must be positive and below the split threshold ({split_threshold_mb} MB)"
            ))
        })?;

        Ok(Self {
            work_dir: std::env::var("VRELAY_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.work_dir),
            limits,
            job_delay_secs: env_or("VRELAY_JOB_DELAY_SECS", defaults.job_delay_secs),
            part_delay_secs: env_or("VRELAY_PART_DELAY_SECS", defaults.part_delay_secs),
            default_caption: std::env::var("VRELAY_DEFAULT_CAPTION")
                .unwrap_or(defaults.default_caption),
            site_log: std::env::var("VRELAY_SITE_LOG")
                .map(PathBuf::from)
                .unwrap_or(defaults.site_log),
            cancel_cooldown: Duration::from_secs(env_or("VRELAY_CANCEL_COOLDOWN_SECS", 15)),
            attempt_delay: Duration::from_millis(env_or("VRELAY_ATTEMPT_DELAY_MS", 1000)),
            relay_delay: Duration::from_millis(env_or("VRELAY_RELAY_DELAY_MS", 2500)),
            export_every: env_or("VRELAY_EXPORT_EVERY", defaults.export_every),
            relay_target: std::env::var("VRELAY_RELAY_TARGET")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            outbox_dir: std::env::var("VRELAY_OUTBOX_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.outbox_dir),
            relay_dir: std::env::var("VRELAY_RELAY_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.relay_dir),
        })
    }

    /// Session settings seeded from this config.
    pub fn initial_session(&self) -> SessionConfig {
        SessionConfig::new(
            self.job_delay_secs,
            self.part_delay_secs,
            self.default_caption.clone(),
        )
    }
}
