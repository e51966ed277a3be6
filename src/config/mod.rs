use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub telegram: TelegramConfig,
    pub media: MediaConfig,
    pub session: SessionConfig,
    pub transcript: TranscriptConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    /// Bot token from @BotFather.
    pub token: String,
    /// Channel users must join: numeric id (`-100…`) or `@username`.
    pub required_channel: String,
    /// Public invite link shown on the join prompt.
    pub channel_url: Option<String>,
    /// Additional buttons shown on the join prompt.
    pub join_links: Vec<JoinLink>,
}

impl std::fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("token", &"[REDACTED]")
            .field("required_channel", &self.required_channel)
            .field("channel_url", &self.channel_url)
            .field("join_links", &self.join_links)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JoinLink {
    pub label: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    /// Root for per-request scratch directories.
    pub download_dir: PathBuf,
    /// Netscape cookie file passed to yt-dlp for login-gated content.
    pub cookies_file: Option<PathBuf>,
    pub yt_dlp_bin: String,
    pub ffmpeg_bin: String,
    pub download_timeout_secs: u64,
    pub metadata_timeout_secs: u64,
    pub max_upload_mb: u64,
    pub search_limit: usize,
    pub audio_bitrate: String,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            download_dir: PathBuf::from("downloads"),
            cookies_file: None,
            yt_dlp_bin: "yt-dlp".to_string(),
            ffmpeg_bin: "ffmpeg".to_string(),
            download_timeout_secs: 120,
            metadata_timeout_secs: 30,
            max_upload_mb: 50,
            search_limit: 5,
            audio_bitrate: "192k".to_string(),
        }
    }
}

impl MediaConfig {
    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }

    pub fn metadata_timeout(&self) -> Duration {
        Duration::from_secs(self.metadata_timeout_secs)
    }

    /// The cookie file, only when it actually exists on disk.
    pub fn usable_cookies(&self) -> Option<&Path> {
        self.cookies_file
            .as_deref()
            .filter(|path| path.is_file())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// How long a delivered video stays convertible.
    pub follow_up_ttl_secs: u64,
    /// Maximum number of delivered videos kept for follow-up actions.
    pub follow_up_capacity: usize,
    /// Idle users are forgotten after this long and must /start again.
    pub idle_ttl_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            follow_up_ttl_secs: 15 * 60,
            follow_up_capacity: 256,
            idle_ttl_secs: 24 * 60 * 60,
        }
    }
}

impl SessionConfig {
    pub fn follow_up_ttl(&self) -> Duration {
        Duration::from_secs(self.follow_up_ttl_secs)
    }

    pub fn idle_ttl(&self) -> Duration {
        Duration::from_secs(self.idle_ttl_secs)
    }
}

/// Speech transcripts for delivered videos, via a Whisper-compatible
/// `audio/transcriptions` endpoint. Disabled without an API key.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptConfig {
    pub api_url: String,
    pub api_key: Option<String>,
    pub model: String,
    /// Only the first `max_audio_secs` of a video are transcribed.
    pub max_audio_secs: u64,
    pub timeout_secs: u64,
}

impl std::fmt::Debug for TranscriptConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TranscriptConfig")
            .field("api_url", &self.api_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("model", &self.model)
            .field("max_audio_secs", &self.max_audio_secs)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl Default for TranscriptConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.openai.com/v1/audio/transcriptions".to_string(),
            api_key: None,
            model: "whisper-1".to_string(),
            max_audio_secs: 60,
            timeout_secs: 120,
        }
    }
}

impl TranscriptConfig {
    pub fn is_enabled(&self) -> bool {
        self.api_key
            .as_deref()
            .is_some_and(|key| !key.trim().is_empty())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `json` or `pretty`.
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: "json".to_string(),
        }
    }
}

impl Config {
    pub fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path))?;
        Self::from_toml(&contents).with_context(|| format!("Failed to parse config file {}", path))
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Config file (if any) overlaid with environment variables.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(token) = lookup("TELEGRAM_BOT_TOKEN").or_else(|| lookup("BOT_TOKEN")) {
            self.telegram.token = token;
        }
        if let Some(channel) = lookup("REQUIRED_CHANNEL_ID") {
            self.telegram.required_channel = channel;
        }
        if let Some(cookies) = lookup("COOKIES_FILE") {
            self.media.cookies_file = Some(PathBuf::from(cookies));
        }
        if let Some(dir) = lookup("DOWNLOAD_DIR") {
            self.media.download_dir = PathBuf::from(dir);
        }
        if let Some(key) = lookup("TRANSCRIPT_API_KEY").or_else(|| lookup("OPENAI_API_KEY")) {
            self.transcript.api_key = Some(key);
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.telegram.token.trim().is_empty() {
            bail!("Bot token missing: set telegram.token or BOT_TOKEN");
        }
        if self.telegram.required_channel.trim().is_empty() {
            bail!("Required channel missing: set telegram.required_channel or REQUIRED_CHANNEL_ID");
        }
        if self.media.search_limit == 0 {
            bail!("media.search_limit must be at least 1");
        }
        Ok(())
    }

    pub fn get_logging_format(&self) -> &str {
        &self.logging.format
    }
}
