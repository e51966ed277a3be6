use std::path::Path;

use async_trait::async_trait;

use super::{MediaResult, SearchResult};
use crate::error::Result;

#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Human-readable name of the backing tool
    fn name(&self) -> &'static str;

    /// Download the media behind `url` into `dest`, a directory owned by the caller.
    /// Never retries.
    async fn fetch(&self, url: &str, dest: &Path) -> Result<MediaResult>;
}

#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Write an audio-only copy next to `media.path`. The input is left untouched.
    async fn to_audio(&self, media: &MediaResult) -> Result<MediaResult>;
}

#[async_trait]
pub trait Searcher: Send + Sync {
    /// Ranked candidates for `query`, at most `limit`. No matches is `Ok` with
    /// an empty result.
    async fn search(&self, query: &str, limit: usize) -> Result<SearchResult>;
}

#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Speech heard in `media`, or `None` when there was none. Intermediate
    /// audio is removed before returning.
    async fn transcribe(&self, media: &MediaResult) -> Result<Option<String>>;
}
