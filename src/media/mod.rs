mod adapters;
mod platform;
mod process;
mod scratch;
mod transcode;
mod transcript;
mod types;
mod ytdlp;

pub use adapters::{Fetcher, Searcher, Transcoder, Transcriber};
pub use platform::{Input, Platform};
pub use scratch::{ScratchDir, ScratchSpace};
pub use transcode::FfmpegTranscoder;
pub use transcript::{transcript_document, WhisperTranscriber};
pub use types::{MediaKind, MediaResult, SearchCandidate, SearchResult};
pub use ytdlp::{youtube_watch_url, YtDlp};

use crate::config::MediaConfig;
use anyhow::Result;
use tracing::{info, warn};

/// Logs whether the external tools are installed. Only a missing yt-dlp is an error.
pub async fn test_setup(config: &MediaConfig) -> Result<()> {
    info!("Testing media tool setup...");

    let ytdlp_available = process::probe(&config.yt_dlp_bin, "--version").await;
    let ffmpeg_available = process::probe(&config.ffmpeg_bin, "-version").await;

    if ytdlp_available && !ffmpeg_available {
        warn!("⚠️  downloads will work but MP3 conversion, transcripts and format merging are disabled");
    }

    if ytdlp_available {
        Ok(())
    } else {
        Err(anyhow::anyhow!(
            "{} is not available. Please install yt-dlp.",
            config.yt_dlp_bin
        ))
    }
}
