//! Media relay worker binary.
//!
//! Reads admin input from stdin, one message per line. `/load <path>` feeds a
//! text file of links, as if it had been uploaded.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vrelay_media::{check_ffmpeg, check_ffprobe, check_ytdlp, FfmpegToolkit, YtDlpFetcher};
use vrelay_models::RequesterId;
use vrelay_worker::{CommandHandler, ConsoleTransport, Orchestrator, SupportedOrigins, WorkerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Colored output for dev, JSON for production
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env().add_directive("vrelay=info".parse()?);

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }

    info!("Starting vrelay-worker");

    if let Err(e) = check_ffmpeg().and_then(|_| check_ffprobe()) {
        error!("{}. Please install ffmpeg.", e);
        std::process::exit(1);
    }
    if let Err(e) = check_ytdlp() {
        warn!("{}; every acquisition will fail", e);
    }

    let config = WorkerConfig::from_env().context("invalid worker configuration")?;
    info!("Worker config: {:?}", config);
    tokio::fs::create_dir_all(&config.work_dir)
        .await
        .with_context(|| format!("cannot create {}", config.work_dir.display()))?;

    let origins = SupportedOrigins::load(&config.site_log)
        .await
        .context("failed to load supported origins")?;
    let transport = ConsoleTransport::new(&config.outbox_dir, &config.relay_dir);

    let orchestrator = Orchestrator::new(
        config,
        Arc::new(transport),
        Arc::new(YtDlpFetcher::new()),
        Arc::new(FfmpegToolkit::new()),
        Arc::new(origins),
    );
    let handler = CommandHandler::new(orchestrator.clone());
    let admin = RequesterId::new("console");

    info!("🤖 Worker is running, reading commands from stdin");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Received shutdown signal");
                break;
            }
            line = lines.next_line() => {
                let Some(line) = line? else {
                    info!("Input closed, draining queue");
                    orchestrator.wait_until_idle().await;
                    break;
                };

                let result = match line.trim().strip_prefix("/load ") {
                    Some(path) => handler.handle_document(&admin, Path::new(path.trim())).await,
                    None => handler.handle_text(&admin, &line).await,
                };
                if let Err(e) = result {
                    error!("Input failed: {}", e);
                }
            }
        }
    }

    info!("Worker shutdown complete");
    Ok(())
}
