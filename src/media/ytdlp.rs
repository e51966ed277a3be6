use super::{
    adapters::{Fetcher, Searcher},
    process::{run_with_timeout, stderr_text},
    MediaKind, MediaResult, SearchCandidate, SearchResult,
};
use crate::{
    config::MediaConfig,
    error::{BotError, Result},
};
use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info};

// H.264/AAC first so Telegram clients can play the file inline.
const VIDEO_FORMAT: &str = "bestvideo[vcodec^=avc1]+bestaudio[acodec^=mp4a]/best[vcodec^=avc1][acodec^=mp4a]/best[ext=mp4]/best";

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Metadata {
    pub id: String,
    pub title: String,
    pub uploader: Option<String>,
    pub duration: Option<u64>,
    pub ext: String,
}

pub struct YtDlp {
    bin: String,
    cookies: Option<PathBuf>,
    metadata_timeout: Duration,
    download_timeout: Duration,
}

impl YtDlp {
    pub fn new(config: &MediaConfig) -> Self {
        Self {
            bin: config.yt_dlp_bin.clone(),
            cookies: config.usable_cookies().map(Path::to_path_buf),
            metadata_timeout: config.metadata_timeout(),
            download_timeout: config.download_timeout(),
        }
    }

    /// Shared by link extraction and search so both carry the cookies.
    fn base_command(&self) -> Command {
        let mut command = Command::new(&self.bin);
        command.arg("--no-warnings");
        if let Some(cookies) = &self.cookies {
            command.arg("--cookies").arg(cookies);
        }
        command
    }

    fn command(&self) -> Command {
        let mut command = self.base_command();
        command.arg("--no-playlist");
        command
    }

    fn search_command(&self, query: &str, limit: usize) -> Command {
        let mut command = self.base_command();
        command
            .arg("--flat-playlist")
            .arg("--dump-json")
            .arg(format!("ytsearch{}:{}", limit, query));
        command
    }

    async fn run(&self, command: Command, operation: &'static str, limit: Duration) -> Result<String> {
        let output = run_with_timeout(command, operation, limit)
            .await?
            .map_err(|e| BotError::Io(std::io::Error::new(e.kind(), format!("{}: {}", self.bin, e))))?;

        if !output.status.success() {
            return Err(classify_failure(&stderr_text(&output)));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn extract_metadata(&self, url: &str) -> Result<Metadata> {
        debug!("Extracting metadata with yt-dlp for: {}", url);

        let mut command = self.command();
        command.arg("--dump-json").arg("--no-download").arg(url);

        let stdout = self
            .run(command, "metadata lookup", self.metadata_timeout)
            .await?;
        let json: Value = serde_json::from_str(stdout.trim())
            .map_err(|e| BotError::UnsupportedFormat(format!("unreadable metadata: {e}")))?;

        Ok(parse_metadata(&json))
    }

    async fn download_into(&self, url: &str, dest: &Path, metadata: &Metadata) -> Result<PathBuf> {
        info!(
            "Downloading media with yt-dlp: {} (source ext {})",
            metadata.id, metadata.ext
        );

        let template = dest.join("%(id)s.%(ext)s");
        let mut command = self.command();
        command
            .arg("--output")
            .arg(&template)
            .arg("--format")
            .arg(VIDEO_FORMAT)
            .arg("--merge-output-format")
            .arg("mp4")
            .arg("--no-simulate")
            .arg("--print")
            .arg("after_move:filepath")
            .arg(url);

        let stdout = self
            .run(command, "download", self.download_timeout)
            .await?;

        let printed = stdout
            .lines()
            .rev()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map(PathBuf::from)
            .filter(|path| path.is_file());

        match printed {
            Some(path) => Ok(path),
            None => first_file_in(dest).await?.ok_or_else(|| {
                BotError::UnsupportedFormat("yt-dlp finished without producing a file".to_string())
            }),
        }
    }
}

#[async_trait]
impl Fetcher for YtDlp {
    fn name(&self) -> &'static str {
        "yt-dlp"
    }

    async fn fetch(&self, url: &str, dest: &Path) -> Result<MediaResult> {
        let metadata = self.extract_metadata(url).await?;
        let path = self.download_into(url, dest, &metadata).await?;

        let kind = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(MediaKind::from_extension)
            .unwrap_or(MediaKind::Video);

        Ok(MediaResult {
            source_url: url.to_string(),
            path,
            title: metadata.title,
            uploader: metadata.uploader,
            duration: metadata.duration,
            kind,
        })
    }
}

#[async_trait]
impl Searcher for YtDlp {
    async fn search(&self, query: &str, limit: usize) -> Result<SearchResult> {
        debug!("Searching with yt-dlp: {}", query);

        let command = self.search_command(query, limit);
        let stdout = self.run(command, "search", self.metadata_timeout).await?;

        let candidates = stdout
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| serde_json::from_str::<Value>(line).ok())
            .filter_map(|entry| parse_search_entry(&entry))
            .take(limit)
            .collect();

        Ok(SearchResult {
            query: query.to_string(),
            candidates,
        })
    }
}

pub(crate) fn parse_metadata(json: &Value) -> Metadata {
    Metadata {
        id: json["id"].as_str().unwrap_or("media").to_string(),
        title: json["title"]
            .as_str()
            .unwrap_or("Unknown Title")
            .to_string(),
        uploader: json["uploader"]
            .as_str()
            .or(json["channel"].as_str())
            .map(|s| s.to_string()),
        duration: json["duration"].as_f64().map(|d| d.round() as u64),
        ext: json["ext"].as_str().unwrap_or("mp4").to_string(),
    }
}

pub(crate) fn parse_search_entry(entry: &Value) -> Option<SearchCandidate> {
    let id = entry["id"].as_str()?.to_string();
    let url = entry["webpage_url"]
        .as_str()
        .or(entry["url"].as_str())
        .map(|s| s.to_string())
        .unwrap_or_else(|| youtube_watch_url(&id));

    Some(SearchCandidate {
        title: entry["title"].as_str().unwrap_or("Untitled").to_string(),
        uploader: entry["uploader"]
            .as_str()
            .or(entry["channel"].as_str())
            .map(|s| s.to_string()),
        duration: entry["duration"].as_f64().map(|d| d.round() as u64),
        id,
        url,
    })
}

pub fn youtube_watch_url(id: &str) -> String {
    format!("https://www.youtube.com/watch?v={id}")
}

/// Maps yt-dlp's stderr onto the failure taxonomy.
pub(crate) fn classify_failure(stderr: &str) -> BotError {
    let lower = stderr.to_lowercase();
    let detail = stderr
        .lines()
        .rev()
        .find(|line| line.contains("ERROR"))
        .unwrap_or(stderr)
        .trim()
        .to_string();

    const PRIVATE: &[&str] = &[
        "private video",
        "login required",
        "sign in to confirm",
        "confirm you're not a bot",
        "this video is unavailable",
        "video unavailable",
        "has been removed",
        "members-only",
        "age-restricted",
        "http error 403",
        "http error 404",
    ];
    const NETWORK: &[&str] = &[
        "timed out",
        "connection reset",
        "connection refused",
        "temporary failure in name resolution",
        "unable to download webpage",
        "network is unreachable",
        "http error 429",
        "http error 500",
        "http error 502",
        "http error 503",
        "http error 504",
    ];
    const FORMAT: &[&str] = &[
        "unsupported url",
        "requested format is not available",
        "no video formats found",
        "no media found",
    ];

    if PRIVATE.iter().any(|needle| lower.contains(needle)) {
        BotError::PrivateOrUnavailable(detail)
    } else if NETWORK.iter().any(|needle| lower.contains(needle)) {
        BotError::NetworkFailure(detail)
    } else if FORMAT.iter().any(|needle| lower.contains(needle)) {
        BotError::UnsupportedFormat(detail)
    } else {
        BotError::PrivateOrUnavailable(detail)
    }
}

async fn first_file_in(dir: &Path) -> Result<Option<PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let partial = path
            .extension()
            .is_some_and(|ext| ext == "part" || ext == "ytdl");
        if path.is_file() && !partial {
            return Ok(Some(path));
        }
    }
    Ok(None)
}
