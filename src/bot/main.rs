//! Aviator Signal Bot
//!
//! Long-polls Telegram for messages, routes "Get Signal" presses into the
//! signal lifecycle and pushes the daily stats digest.

use anyhow::{Context, Result};
use aviator_signal_bot::config::BotConfig;
use aviator_signal_bot::lifecycle::{RequestOutcome, SignalController};
use aviator_signal_bot::registry::SignalRegistry;
use aviator_signal_bot::render::{CardRenderer, ImageRenderer, TextColor};
use aviator_signal_bot::router::{parse_command, BotCommand, GET_SIGNAL_BUTTON, WELCOME_TEXT};
use aviator_signal_bot::scheduler;
use aviator_signal_bot::stats::StatsStore;
use aviator_signal_bot::telegram::{IncomingMessage, TelegramClient};
use aviator_signal_bot::transport::ChatTransport;
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Pause before retrying a failed getUpdates call
const POLL_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Aviator signal Telegram bot
#[derive(Parser, Debug)]
#[command(name = "aviator-bot")]
#[command(about = "Telegram bot issuing delayed WIN/CRASH signals with a daily stats digest")]
struct Args {
    /// Config file (default: $BOT_CONFIG_PATH or config/bot_config.yaml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Render one card with this text to --out and exit
    #[arg(long)]
    preview: Option<String>,

    /// Text color for --preview: white, green or red
    #[arg(long, default_value = "white")]
    color: TextColor,

    /// Output path for --preview
    #[arg(long, default_value = "preview.jpg")]
    out: PathBuf,
}

struct App {
    telegram: Arc<TelegramClient>,
    controller: Arc<SignalController>,
    delete_request_message: bool,
}

fn load_config(args: &Args) -> Result<(BotConfig, PathBuf, bool)> {
    let config_path = args.config.clone().unwrap_or_else(|| {
        PathBuf::from(
            std::env::var("BOT_CONFIG_PATH").unwrap_or_else(|_| "config/bot_config.yaml".to_string()),
        )
    });

    if config_path.exists() {
        let config = BotConfig::load_with_env(&config_path).context("Failed to load configuration")?;
        Ok((config, config_path, true))
    } else {
        let mut config = BotConfig::default();
        config.apply_env();
        config.validate().context("Invalid configuration")?;
        Ok((config, config_path, false))
    }
}

fn init_logging(config: &BotConfig) {
    let log_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        format!("{},aviator_signal_bot=debug,aviator_bot=debug", config.logging.level)
    });

    let builder = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&log_filter))
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    if config.logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn run_preview(config: &BotConfig, text: &str, color: TextColor, out: &Path) -> Result<()> {
    let renderer = CardRenderer::new(&config.render);
    let bytes = renderer
        .render(text, color)
        .with_context(|| format!("Failed to render preview for {:?}", text))?;
    std::fs::write(out, &bytes).with_context(|| format!("Failed to write {}", out.display()))?;
    info!("Preview written to {} ({} bytes)", out.display(), bytes.len());
    Ok(())
}

async fn handle_message(app: Arc<App>, message: IncomingMessage) {
    let owner = message.owner();
    let Some(text) = message.text.as_deref() else {
        return;
    };

    match parse_command(text) {
        Some(BotCommand::Start) => {
            if let Err(e) = app.telegram.send_keyboard(owner, WELCOME_TEXT, GET_SIGNAL_BUTTON).await {
                warn!(%owner, "Failed to send welcome: {}", e);
            }
        }
        Some(BotCommand::GetSignal) => {
            let request_message = app.delete_request_message.then(|| message.handle());
            match app.controller.handle_request(owner, request_message).await {
                RequestOutcome::Issued(issued) => {
                    debug!(%owner, message = %issued.issued_message, "Signal pending");
                }
                RequestOutcome::Busy { .. } => {
                    debug!(%owner, "Request rejected, signal already pending");
                }
                RequestOutcome::Failed => {
                    warn!(%owner, "Signal could not be issued");
                }
            }
        }
        None => {
            debug!(%owner, "Ignoring message: {:?}", text);
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let args = Args::parse();
    let (config, config_path, from_file) = load_config(&args)?;
    init_logging(&config);

    if from_file {
        info!("Loaded config from: {}", config_path.display());
    } else {
        warn!("Config file not found, using defaults: {}", config_path.display());
    }

    if let Some(text) = args.preview.as_deref() {
        return run_preview(&config, text, args.color, &args.out);
    }

    info!("╔══════════════════════════════════════════════════════════════╗");
    info!("║                  AVIATOR SIGNAL BOT                          ║");
    info!("╚══════════════════════════════════════════════════════════════╝");

    let token = BotConfig::bot_token()?;
    let telegram = Arc::new(
        TelegramClient::new(&config.telegram.api_url, &token, config.telegram.request_timeout_ms)
            .context("Failed to create Telegram client")?,
    );

    info!("Configuration:");
    info!(
        "  Daily digest: {:02}:{:02} (UTC{:+}min)",
        config.digest.hour, config.digest.minute, config.digest.utc_offset_minutes
    );
    info!("  Card size: {}x{}", config.render.width, config.render.height);
    info!("  Delete request messages: {}", config.cleanup.delete_request_message);

    let transport: Arc<dyn ChatTransport> = telegram.clone();
    let renderer: Arc<dyn ImageRenderer> = Arc::new(CardRenderer::new(&config.render));
    let registry = Arc::new(SignalRegistry::new());
    let stats = Arc::new(StatsStore::new());

    let controller = Arc::new(SignalController::new(
        registry.clone(),
        stats.clone(),
        transport.clone(),
        renderer,
    ));

    let digest_task = scheduler::spawn_daily_digest(stats, transport, config.digest.clone());

    let app = Arc::new(App {
        telegram: telegram.clone(),
        controller,
        delete_request_message: config.cleanup.delete_request_message,
    });

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    info!("Polling for updates...");
    let mut offset: i64 = 0;
    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Shutdown signal received, stopping bot...");
                break;
            }
            result = telegram.get_updates(offset, config.telegram.poll_timeout_secs) => {
                match result {
                    Ok(updates) => {
                        for update in updates {
                            offset = offset.max(update.update_id + 1);
                            if let Some(message) = update.message {
                                tokio::spawn(handle_message(app.clone(), message));
                            }
                        }
                    }
                    Err(e) => {
                        warn!("getUpdates failed: {} - retrying in {}s", e, POLL_RETRY_DELAY.as_secs());
                        tokio::time::sleep(POLL_RETRY_DELAY).await;
                    }
                }
            }
        }
    }

    digest_task.abort();
    let abandoned = registry.active_count();
    if abandoned > 0 {
        warn!("{} pending signal(s) abandoned on shutdown", abandoned);
    }

    Ok(())
}
