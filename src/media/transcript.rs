use super::{
    adapters::Transcriber,
    process::{run_with_timeout, stderr_text},
    MediaResult,
};
use crate::{
    config::{MediaConfig, TranscriptConfig},
    error::{BotError, Result},
    utils::truncate,
};
use anyhow::Context;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};

const EXTRACT_TIMEOUT: Duration = Duration::from_secs(60);
// Speech models expect 16 kHz mono.
const SAMPLE_RATE: &str = "16000";

pub fn speech_wav_path(input: &Path) -> PathBuf {
    input.with_extension("speech.wav")
}

/// Body of the transcript document sent after a video.
pub fn transcript_document(title: &str, text: &str) -> String {
    format!("Transcript for: {title}\n{}\n\n{text}\n", "=".repeat(50))
}

/// Removes the extracted WAV on every exit path.
struct WavFile(PathBuf);

impl Drop for WavFile {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.0) {
            Ok(()) => debug!("Removed {}", self.0.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.0.display(), error = %e, "failed to remove speech audio"),
        }
    }
}

/// Extracts speech audio with ffmpeg and posts it to a Whisper-compatible endpoint.
pub struct WhisperTranscriber {
    client: reqwest::Client,
    ffmpeg_bin: String,
    api_url: String,
    api_key: String,
    model: String,
    max_audio_secs: u64,
    timeout: Duration,
}

impl WhisperTranscriber {
    /// `None` when no API key is configured.
    pub fn new(media: &MediaConfig, config: &TranscriptConfig) -> anyhow::Result<Option<Self>> {
        if !config.is_enabled() {
            return Ok(None);
        }
        let api_key = config.api_key.clone().unwrap_or_default();

        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Some(Self {
            client,
            ffmpeg_bin: media.ffmpeg_bin.clone(),
            api_url: config.api_url.clone(),
            api_key,
            model: config.model.clone(),
            max_audio_secs: config.max_audio_secs,
            timeout: config.timeout(),
        }))
    }

    async fn extract_speech(&self, input: &Path, output: &Path) -> Result<()> {
        let mut command = Command::new(&self.ffmpeg_bin);
        command
            .arg("-loglevel")
            .arg("error")
            .arg("-y")
            .arg("-i")
            .arg(input)
            .arg("-vn")
            .arg("-ac")
            .arg("1")
            .arg("-ar")
            .arg(SAMPLE_RATE)
            .arg("-t")
            .arg(self.max_audio_secs.to_string())
            .arg(output);

        let result = run_with_timeout(command, "transcript", EXTRACT_TIMEOUT)
            .await?
            .map_err(|e| {
                BotError::TranscriptFailure(format!("{} unavailable: {}", self.ffmpeg_bin, e))
            })?;

        if !result.status.success() {
            return Err(BotError::TranscriptFailure(stderr_text(&result)));
        }
        Ok(())
    }

    async fn request_transcript(&self, audio: Vec<u8>) -> Result<Option<String>> {
        let part = Part::bytes(audio)
            .file_name("speech.wav")
            .mime_str("audio/wav")
            .map_err(|e| BotError::TranscriptFailure(e.to_string()))?;
        let form = Form::new()
            .text("model", self.model.clone())
            .text("response_format", "text")
            .part("file", part);

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    BotError::Timeout {
                        operation: "transcript",
                        after: self.timeout,
                    }
                } else {
                    BotError::TranscriptFailure(format!("request failed: {e}"))
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| BotError::TranscriptFailure(format!("unreadable response: {e}")))?;

        if !status.is_success() {
            return Err(BotError::TranscriptFailure(format!(
                "HTTP {status}: {}",
                truncate(body.trim(), 200)
            )));
        }

        let text = body.trim();
        Ok((!text.is_empty()).then(|| text.to_string()))
    }
}

#[async_trait]
impl Transcriber for WhisperTranscriber {
    async fn transcribe(&self, media: &MediaResult) -> Result<Option<String>> {
        let wav = WavFile(speech_wav_path(&media.path));
        info!(
            "Extracting speech audio: {} -> {}",
            media.path.display(),
            wav.0.display()
        );

        self.extract_speech(&media.path, &wav.0).await?;
        let audio = tokio::fs::read(&wav.0).await?;
        drop(wav);

        debug!(bytes = audio.len(), model = %self.model, "requesting transcript");
        let transcript = self.request_transcript(audio).await?;
        info!(
            found_speech = transcript.is_some(),
            "Transcript finished for {}",
            media.title
        );
        Ok(transcript)
    }
}
