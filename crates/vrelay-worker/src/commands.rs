//! Admin command surface and link ingestion.
//!
//! Input validation happens here; anything rejected is answered with a
//! usage hint and never reaches the pipeline.

use std::path::Path;

use tracing::{debug, info};

use vrelay_models::RequesterId;
use vrelay_queue::SkipOutcome;

use crate::error::{WorkerError, WorkerResult};
use crate::executor::Orchestrator;
use crate::state::CancelOutcome;

const START_TEXT: &str = "🤖 Video Download Bot

Admin Commands:
/start - Show this menu
/cap <N> <caption> - Add caption to next N videos
/capedit - Edit default full video caption
/delay <N> - Set delay between links (seconds)
/slow <N> - Set delay between parts (0-30s)
/cancel - Stop current download
/clean - Cancel + Clear queue
/skip <N> - Skip next N links
/remain - Show pending links
/support - Show supported sites count";

const MENU_TEXT: &str = "📋 Admin Command Menu

📝 Caption Management
/cap N caption - Add caption to next N videos
/capedit text - Change default full video caption

⏱️ Timing Control
/delay N - Set delay between links (seconds)
/slow N - Set delay between parts (0-30s)

🛠️ Queue Management
/cancel - Stop current download
/clean - Cancel + Clear queue
/skip N - Skip next N links
/remain - Show pending links

ℹ️ Information
/support - Show supported sites count
/support_file - Get full list of supported sites";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Menu,
    /// Append `text` to the next `count` deliveries.
    Cap { count: u32, text: String },
    /// Show (`None`) or replace the full-video caption.
    CapEdit(Option<String>),
    /// Show (`None`) or set the delay between links.
    Delay(Option<i64>),
    /// Show (`None`) or set the delay between parts.
    Slow(Option<i64>),
    Cancel,
    Clean,
    Skip(usize),
    Remain,
    Support,
    SupportFile,
}

impl Command {
    /// Parse a slash command. `None` if `text` is not one we know.
    pub fn parse(text: &str) -> Option<WorkerResult<Command>> {
        let text = text.trim();
        let rest = text.strip_prefix('/')?;
        let mut tokens = rest.split_whitespace();
        let name = tokens.next()?;
        let name = name.split('@').next().unwrap_or(name).to_ascii_lowercase();
        let args: Vec<&str> = tokens.collect();

        let command = match name.as_str() {
            "start" => Ok(Command::Start),
            "menu" => Ok(Command::Menu),
            "cap" => parse_cap(&args),
            "capedit" => Ok(Command::CapEdit(
                (!args.is_empty()).then(|| args.join(" ")),
            )),
            "delay" => parse_optional_int(&args, "Invalid delay value", "/delay <seconds>")
                .map(Command::Delay),
            "slow" => parse_optional_int(&args, "❌ Invalid value", "/slow <0-30>").map(Command::Slow),
            "cancel" => Ok(Command::Cancel),
            "clean" => Ok(Command::Clean),
            "skip" => parse_skip(&args),
            "remain" => Ok(Command::Remain),
            "support" => Ok(Command::Support),
            "support_file" => Ok(Command::SupportFile),
            _ => return None,
        };
        Some(command)
    }
}

fn parse_cap(args: &[&str]) -> WorkerResult<Command> {
    let usage = || WorkerError::config_error("Usage: /cap <N> <caption text>");
    if args.len() < 2 {
        return Err(usage());
    }
    let count = args[0].parse::<u32>().map_err(|_| usage())?;
    Ok(Command::Cap {
        count,
        text: args[1..].join(" "),
    })
}

fn parse_optional_int(args: &[&str], label: &str, usage: &str) -> WorkerResult<Option<i64>> {
    match args.first() {
        None => Ok(None),
        Some(raw) => raw.parse::<i64>().map(Some).map_err(|_| {
            WorkerError::config_error(format!("{label}: {raw} is not a number\nUsage: {usage}"))
        }),
    }
}

fn parse_skip(args: &[&str]) -> WorkerResult<Command> {
    let raw = args
        .first()
        .ok_or_else(|| WorkerError::config_error("Usage: /skip <number_of_links_to_skip>"))?;
    let n = raw
        .parse::<usize>()
        .map_err(|_| WorkerError::config_error("Usage: /skip <number_of_links_to_skip>"))?;
    if n == 0 {
        return Err(WorkerError::config_error(
            "Please provide a positive number to skip",
        ));
    }
    Ok(Command::Skip(n))
}

/// Lines that look like links, in order.
pub fn extract_urls(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| line.starts_with("http"))
        .map(str::to_string)
        .collect()
}

/// Routes admin input to the orchestrator and answers it.
#[derive(Clone)]
pub struct CommandHandler {
    orchestrator: Orchestrator,
}

impl CommandHandler {
    pub fn new(orchestrator: Orchestrator) -> Self {
        Self { orchestrator }
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    /// Handle a text message: a command, or a batch of links.
    pub async fn handle_text(&self, from: &RequesterId, text: &str) -> WorkerResult<()> {
        match Command::parse(text) {
            Some(Ok(command)) => self.execute(from, command).await,
            Some(Err(e)) => {
                self.orchestrator.reply(from, &e.to_string()).await;
                Ok(())
            }
            None => {
                let urls = extract_urls(text);
                if urls.is_empty() {
                    debug!("Ignoring input without links");
                    return Ok(());
                }
                self.orchestrator.submit_urls(urls, from).await;
                Ok(())
            }
        }
    }

    /// Handle an uploaded text file of links.
    pub async fn handle_document(&self, from: &RequesterId, path: &Path) -> WorkerResult<()> {
        let content = tokio::fs::read_to_string(path).await?;
        let urls = extract_urls(&content);
        if !urls.is_empty() {
            self.orchestrator.submit_urls(urls, from).await;
        }
        Ok(())
    }

    pub async fn execute(&self, from: &RequesterId, command: Command) -> WorkerResult<()> {
        info!(?command, requester = %from, "Admin command");
        let orch = &self.orchestrator;

        match command {
            Command::Start => orch.reply(from, START_TEXT).await,
            Command::Menu => orch.reply(from, MENU_TEXT).await,

            Command::Cap { count, text } => {
                orch.set_extra_caption(count, &text).await;
                orch.reply(
                    from,
                    &format!("📝 Extra caption will be added to next {count} videos:\n\"{text}\""),
                )
                .await;
            }

            Command::CapEdit(None) => {
                let session = orch.session().await;
                orch.reply(
                    from,
                    &format!(
                        "📝 Caption Editor\n\nCurrent full video caption:\n{}\n\nTo change it:\n/capedit Your new caption",
                        session.default_caption()
                    ),
                )
                .await;
            }
            Command::CapEdit(Some(text)) => match orch.set_default_caption(&text).await {
                Ok(()) => {
                    orch.reply(from, &format!("✅ Full video caption updated to:\n{text}"))
                        .await
                }
                Err(e) => orch.reply(from, &format!("❌ {e}")).await,
            },

            Command::Delay(None) => {
                let secs = orch.session().await.inter_job_delay_secs();
                orch.reply(from, &format!("Current delay between links: {secs} seconds"))
                    .await;
            }
            Command::Delay(Some(secs)) => match orch.set_inter_job_delay(secs).await {
                Ok(secs) => {
                    orch.reply(from, &format!("✅ Delay between links set to {secs} seconds"))
                        .await
                }
                Err(e) => {
                    orch.reply(
                        from,
                        &format!("Invalid delay value: {e}\nUsage: /delay <seconds>"),
                    )
                    .await
                }
            },

            Command::Slow(None) => {
                let secs = orch.session().await.inter_part_delay_secs();
                orch.reply(
                    from,
                    &format!("⏳ Current delay between parts: {secs} seconds\nUsage: /slow <0-30>"),
                )
                .await;
            }
            Command::Slow(Some(secs)) => match orch.set_inter_part_delay(secs).await {
                Ok(secs) => {
                    orch.reply(from, &format!("⏳ Delay between parts set to {secs} seconds"))
                        .await
                }
                Err(e) => {
                    orch.reply(from, &format!("❌ Invalid value: {e}\nUsage: /slow <0-30>"))
                        .await
                }
            },

            Command::Cancel => {
                let text = match orch.request_cancel().await {
                    CancelOutcome::Requested => "🛑 Download cancelled! Cleaning up...",
                    CancelOutcome::AlreadyPending => "⏳ A cancel is already pending!",
                    CancelOutcome::NothingActive => "❌ No active download to cancel",
                };
                orch.reply(from, text).await;
            }

            Command::Clean => {
                orch.clean().await;
                orch.reply(from, "🧹 Queue cleared! All pending links removed.")
                    .await;
            }

            Command::Skip(n) => match orch.skip(n).await? {
                SkipOutcome::Cleared { removed } => {
                    orch.reply(
                        from,
                        &format!(
                            "⚠️ Skip count {n} is larger than queue size {removed}. Clearing queue instead."
                        ),
                    )
                    .await;
                }
                SkipOutcome::Skipped { urls, remaining } => {
                    let skipped = urls.len();
                    orch.export_lines(
                        from,
                        &format!("Skipped_{skipped}_Links.txt"),
                        &urls,
                        &format!("⏭️ Skipped {skipped} links"),
                    )
                    .await?;
                    orch.reply(
                        from,
                        &format!(
                            "⏭️ Successfully skipped {skipped} links\n📊 Remaining links in queue: {remaining}"
                        ),
                    )
                    .await;
                }
            },

            Command::Remain => {
                let links = orch.remaining().await;
                if links.is_empty() {
                    orch.reply(from, "✅ Queue is empty. No remaining links.").await;
                } else {
                    let n = links.len();
                    orch.export_lines(
                        from,
                        &format!("Remain_Links_{n}.txt"),
                        &links,
                        &format!("📄 {n} links remaining."),
                    )
                    .await?;
                }
            }

            Command::Support => {
                let count = orch.origins().len().await;
                orch.reply(
                    from,
                    &format!("🌐 Supported sites: {count}\nSend /support_file to get full list"),
                )
                .await;
            }

            Command::SupportFile => {
                let sites = orch.origins().sorted().await;
                if sites.is_empty() {
                    orch.reply(from, "❌ No supported sites recorded yet").await;
                } else {
                    orch.export_lines(
                        from,
                        "supported_sites.txt",
                        &sites,
                        &format!("🌐 Supported Sites ({})", sites.len()),
                    )
                    .await?;
                }
            }
        }

        Ok(())
    }
}
