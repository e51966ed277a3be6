use std::time::Duration;

use thiserror::Error;

/// Failures that end a single request. Every variant is reported to the user
/// and never stops the update loop.
#[derive(Debug, Error)]
pub enum BotError {
    #[error("membership check unavailable: {0}")]
    VerificationUnavailable(String),

    #[error("unsupported platform: {0}")]
    UnsupportedPlatform(String),

    #[error("media is private or unavailable: {0}")]
    PrivateOrUnavailable(String),

    #[error("network failure: {0}")]
    NetworkFailure(String),

    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("transcode failed: {0}")]
    TranscodeFailure(String),

    #[error("transcript failed: {0}")]
    TranscriptFailure(String),

    #[error("{operation} timed out after {}s", .after.as_secs())]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    #[error("file too large: {size_mb:.2}MB exceeds {limit_mb}MB")]
    FileTooLarge { size_mb: f64, limit_mb: u64 },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl BotError {
    /// Only transient network trouble is worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::NetworkFailure(_))
    }

    /// Human-readable text sent back to the chat.
    pub fn user_message(&self) -> String {
        match self {
            Self::VerificationUnavailable(_) => {
                "⚠️ I couldn't verify your channel membership right now. Please try again in a moment."
                    .to_string()
            }
            Self::UnsupportedPlatform(host) => format!(
                "❌ Links from {host} are not supported.\nSupported: YouTube, Instagram, TikTok, Facebook, Pinterest, Twitter/X."
            ),
            Self::PrivateOrUnavailable(_) => {
                "❌ This media is private, login-gated or no longer available.".to_string()
            }
            Self::NetworkFailure(_) => {
                "❌ Network error while downloading. Please try again later.".to_string()
            }
            Self::UnsupportedFormat(_) => {
                "❌ This media is in a format I can't download.".to_string()
            }
            Self::TranscodeFailure(_) => "❌ Failed to convert the file to MP3.".to_string(),
            Self::TranscriptFailure(_) => "⚠️ Couldn't generate a transcript for this video.".to_string(),
            Self::Timeout { operation, .. } => {
                format!("⌛ The {operation} took too long and was cancelled.")
            }
            Self::FileTooLarge { size_mb, limit_mb } => format!(
                "❌ File is too large ({size_mb:.2}MB). Telegram bot limit is {limit_mb}MB."
            ),
            Self::Io(_) => "❌ Something went wrong while handling the file.".to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, BotError>;
