use anyhow::{bail, Context, Result};
use chrono::FixedOffset;
use serde::Deserialize;
use std::path::Path;

/// Environment variable holding the Telegram bot token
pub const TOKEN_ENV: &str = "TOKEN";

/// Bot configuration loaded from YAML file
#[derive(Debug, Clone, Deserialize)]
pub struct BotConfig {
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub digest: DigestConfig,
    #[serde(default)]
    pub render: RenderConfig,
    #[serde(default)]
    pub cleanup: CleanupConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramConfig {
    /// Bot API base URL
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// Long-poll timeout for getUpdates (seconds)
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_secs: u64,
    /// HTTP request timeout (ms), must exceed the long-poll timeout
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,
}

fn default_api_url() -> String { "https://api.telegram.org".to_string() }
fn default_poll_timeout() -> u64 { 30 }
fn default_request_timeout() -> u64 { 40_000 }

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            poll_timeout_secs: default_poll_timeout(),
            request_timeout_ms: default_request_timeout(),
        }
    }
}

/// Wall-clock time of the daily stats push
#[derive(Debug, Clone, Deserialize)]
pub struct DigestConfig {
    #[serde(default = "default_digest_hour")]
    pub hour: u32,
    #[serde(default)]
    pub minute: u32,
    /// Fixed UTC offset of the digest timezone (330 = Asia/Kolkata)
    #[serde(default = "default_utc_offset")]
    pub utc_offset_minutes: i32,
}

fn default_digest_hour() -> u32 { 9 }
fn default_utc_offset() -> i32 { 330 }

impl Default for DigestConfig {
    fn default() -> Self {
        Self {
            hour: default_digest_hour(),
            minute: 0,
            utc_offset_minutes: default_utc_offset(),
        }
    }
}

impl DigestConfig {
    pub fn offset(&self) -> Option<FixedOffset> {
        FixedOffset::east_opt(self.utc_offset_minutes * 60)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RenderConfig {
    /// Preferred TTF font; a built-in bitmap font is used if it can't be loaded
    #[serde(default = "default_font_path")]
    pub font_path: String,
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default = "default_font_size")]
    pub font_size: f32,
}

fn default_font_path() -> String {
    "/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf".to_string()
}
fn default_width() -> u32 { 800 }
fn default_height() -> u32 { 400 }
fn default_font_size() -> f32 { 200.0 }

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            font_path: default_font_path(),
            width: default_width(),
            height: default_height(),
            font_size: default_font_size(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CleanupConfig {
    /// Delete the user's "Get Signal" message together with the issued signal
    #[serde(default)]
    pub delete_request_message: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level used when RUST_LOG is unset
    #[serde(default = "default_level")]
    pub level: String,
    /// Emit JSON log lines
    #[serde(default)]
    pub json: bool,
}

fn default_level() -> String { "info".to_string() }

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            json: false,
        }
    }
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            telegram: TelegramConfig::default(),
            digest: DigestConfig::default(),
            render: RenderConfig::default(),
            cleanup: CleanupConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl BotConfig {
    /// Load configuration from YAML file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_yaml(&contents)
    }

    pub fn from_yaml(contents: &str) -> Result<Self> {
        let config: BotConfig = serde_yaml::from_str(contents)
            .with_context(|| "Failed to parse YAML configuration")?;

        config.validate()?;
        Ok(config)
    }

    /// Load with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Override with environment variables; unparseable values keep the current setting
    pub fn apply_env(&mut self) {
        if let Ok(val) = std::env::var("TELEGRAM_API_URL") {
            self.telegram.api_url = val;
        }
        if let Ok(val) = std::env::var("BOT_DIGEST_HOUR") {
            self.digest.hour = val.parse().unwrap_or(self.digest.hour);
        }
        if let Ok(val) = std::env::var("BOT_DIGEST_MINUTE") {
            self.digest.minute = val.parse().unwrap_or(self.digest.minute);
        }
        if let Ok(val) = std::env::var("BOT_DIGEST_UTC_OFFSET_MINUTES") {
            self.digest.utc_offset_minutes = val.parse().unwrap_or(self.digest.utc_offset_minutes);
        }
        if let Ok(val) = std::env::var("BOT_FONT_PATH") {
            self.render.font_path = val;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.digest.hour >= 24 || self.digest.minute >= 60 {
            bail!(
                "Invalid digest time {:02}:{:02}",
                self.digest.hour,
                self.digest.minute
            );
        }
        if self.digest.utc_offset_minutes.abs() > 14 * 60 || self.digest.offset().is_none() {
            bail!("Invalid digest UTC offset: {} minutes", self.digest.utc_offset_minutes);
        }
        if self.render.width == 0 || self.render.height == 0 {
            bail!("Render size must be non-zero");
        }
        if self.telegram.request_timeout_ms <= self.telegram.poll_timeout_secs * 1000 {
            bail!(
                "telegram.request_timeout_ms ({}) must exceed the long-poll timeout ({}s)",
                self.telegram.request_timeout_ms,
                self.telegram.poll_timeout_secs
            );
        }
        Ok(())
    }

    /// Bot token from the environment. Missing token is fatal at startup.
    pub fn bot_token() -> Result<String> {
        let token = std::env::var(TOKEN_ENV)
            .with_context(|| format!("{} not set - required to talk to Telegram", TOKEN_ENV))?;
        if token.trim().is_empty() {
            bail!("{} is empty", TOKEN_ENV);
        }
        Ok(token)
    }
}
