// src/ingest/providers/static_items.rs
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::ingest::types::{CandidateItem, FetchContract, FetchResult};

/// Fetcher over a fixed item list. Returns the items newer than the watermark.
#[derive(Debug, Clone, Default)]
pub struct StaticFetcher {
    items: Vec<CandidateItem>,
}

impl StaticFetcher {
    pub fn new(items: Vec<CandidateItem>) -> Self {
        Self { items }
    }

    pub fn empty() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FetchContract for StaticFetcher {
    async fn fetch(&self, since: DateTime<Utc>) -> FetchResult {
        Ok(self
            .items
            .iter()
            .filter(|it| it.published > since)
            .cloned()
            .collect())
    }
}
