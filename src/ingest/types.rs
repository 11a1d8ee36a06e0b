// src/ingest/types.rs
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

/// Display metadata for a registered source. `name` is the unique key and the
/// path segment the feed is served under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceMeta {
    pub name: String,
    pub title: String,
    pub url: String,
    pub description: String,
}

impl SourceMeta {
    pub fn new(
        name: impl Into<String>,
        title: impl Into<String>,
        url: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            title: title.into(),
            url: url.into(),
            description: description.into(),
        }
    }
}

/// An item produced by a fetcher, not yet persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateItem {
    pub id: String,
    pub title: String,
    pub url: String, // dedup key within a source
    pub published: DateTime<Utc>,
    pub summary: Option<String>,
}

impl CandidateItem {
    /// Accepts any offset and converts `published` to UTC.
    pub fn new<Tz: TimeZone>(
        id: impl Into<String>,
        title: impl Into<String>,
        url: impl Into<String>,
        published: DateTime<Tz>,
        summary: Option<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            url: url.into(),
            published: published.with_timezone(&Utc),
            summary,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("http error: {0}")]
    Http(String),
    #[error("parse error: {0}")]
    Parse(String),
    #[error("{0}")]
    Other(String),
}

pub type FetchResult = Result<Vec<CandidateItem>, FetchError>;

/// Per-source capability turning a watermark into candidate items newer than it.
///
/// Duplicates across calls are fine; the store drops them. Implementations own
/// their timeouts and diagnostics and report failures through `FetchError`
/// instead of panicking.
#[async_trait]
pub trait FetchContract: Send + Sync {
    async fn fetch(&self, since: DateTime<Utc>) -> FetchResult;
}
