use super::{
    adapters::Transcoder,
    process::{run_with_timeout, stderr_text},
    MediaKind, MediaResult,
};
use crate::{
    config::MediaConfig,
    error::{BotError, Result},
};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;
use tracing::info;

const BASE_TIMEOUT_SECS: u64 = 60;
const MAX_TIMEOUT_SECS: u64 = 15 * 60;

/// Encoding gets a fixed allowance plus two seconds per second of media.
pub fn transcode_timeout(duration_secs: Option<u64>) -> Duration {
    let proportional = duration_secs.unwrap_or(0).saturating_mul(2);
    Duration::from_secs((BASE_TIMEOUT_SECS + proportional).min(MAX_TIMEOUT_SECS))
}

pub fn audio_output_path(input: &Path) -> PathBuf {
    let is_mp3 = input
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("mp3"));
    if is_mp3 {
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "audio".to_string());
        input.with_file_name(format!("{stem}.audio.mp3"))
    } else {
        input.with_extension("mp3")
    }
}

pub struct FfmpegTranscoder {
    bin: String,
    bitrate: String,
}

impl FfmpegTranscoder {
    pub fn new(config: &MediaConfig) -> Self {
        Self {
            bin: config.ffmpeg_bin.clone(),
            bitrate: config.audio_bitrate.clone(),
        }
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn to_audio(&self, media: &MediaResult) -> Result<MediaResult> {
        if !media.path.is_file() {
            return Err(BotError::TranscodeFailure(format!(
                "input {} does not exist",
                media.path.display()
            )));
        }

        let output_path = audio_output_path(&media.path);
        info!(
            "Starting ffmpeg audio extraction: {} -> {}",
            media.path.display(),
            output_path.display()
        );

        let mut command = Command::new(&self.bin);
        command
            .arg("-loglevel")
            .arg("error")
            .arg("-y")
            .arg("-i")
            .arg(&media.path)
            .arg("-vn")
            .arg("-codec:a")
            .arg("libmp3lame")
            .arg("-b:a")
            .arg(&self.bitrate)
            .arg(&output_path);

        let output = run_with_timeout(command, "conversion", transcode_timeout(media.duration))
            .await?
            .map_err(|e| BotError::TranscodeFailure(format!("{} unavailable: {}", self.bin, e)))?;

        if !output.status.success() {
            let _ = tokio::fs::remove_file(&output_path).await;
            return Err(BotError::TranscodeFailure(stderr_text(&output)));
        }

        info!("Audio written to {}", output_path.display());

        Ok(MediaResult {
            path: output_path,
            kind: MediaKind::Audio,
            ..media.clone()
        })
    }
}
