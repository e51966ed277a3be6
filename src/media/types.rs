use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Video,
    Audio,
    Image,
}

impl MediaKind {
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" | "png" | "webp" => Self::Image,
            "mp3" | "m4a" | "aac" | "ogg" | "opus" | "flac" | "wav" => Self::Audio,
            _ => Self::Video,
        }
    }
}

/// A media file on local scratch storage plus what we know about it.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaResult {
    pub source_url: String,
    pub path: PathBuf,
    pub title: String,
    pub uploader: Option<String>,
    pub duration: Option<u64>,
    pub kind: MediaKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchCandidate {
    pub id: String,
    pub title: String,
    pub url: String,
    pub uploader: Option<String>,
    pub duration: Option<u64>,
}

/// Ranked search candidates, best match first. May be empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchResult {
    pub query: String,
    pub candidates: Vec<SearchCandidate>,
}

impl SearchResult {
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}
