// src/ingest/registry.rs
//! Static source registry, assembled once at startup and read-only afterwards.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use crate::ingest::types::{FetchContract, SourceMeta};
use crate::store::{Store, StoreResult};

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("source `{0}` is registered twice")]
    Duplicate(String),
    #[error("source name must not be empty")]
    EmptyName,
}

pub struct RegisteredSource {
    pub meta: SourceMeta,
    /// Own polling interval; `None` falls back to the system default.
    pub interval: Option<Duration>,
    pub fetcher: Arc<dyn FetchContract>,
}

impl RegisteredSource {
    pub fn name(&self) -> &str {
        &self.meta.name
    }

    pub fn interval_or(&self, default: Duration) -> Duration {
        self.interval.filter(|d| !d.is_zero()).unwrap_or(default)
    }
}

impl std::fmt::Debug for RegisteredSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredSource")
            .field("meta", &self.meta)
            .field("interval", &self.interval)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Default)]
pub struct SourceRegistryBuilder {
    sources: Vec<Arc<RegisteredSource>>,
    seen: HashSet<String>,
}

impl SourceRegistryBuilder {
    pub fn register(
        &mut self,
        meta: SourceMeta,
        interval: Option<Duration>,
        fetcher: Arc<dyn FetchContract>,
    ) -> Result<&mut Self, RegistryError> {
        if meta.name.trim().is_empty() {
            return Err(RegistryError::EmptyName);
        }
        if !self.seen.insert(meta.name.clone()) {
            return Err(RegistryError::Duplicate(meta.name));
        }
        self.sources.push(Arc::new(RegisteredSource {
            meta,
            interval,
            fetcher,
        }));
        Ok(self)
    }

    pub fn build(self) -> SourceRegistry {
        SourceRegistry {
            sources: self.sources,
        }
    }
}

/// Mapping from source name to its fetcher, in registration order.
#[derive(Debug, Default)]
pub struct SourceRegistry {
    sources: Vec<Arc<RegisteredSource>>,
}

impl SourceRegistry {
    pub fn builder() -> SourceRegistryBuilder {
        SourceRegistryBuilder::default()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<RegisteredSource>> {
        self.sources.iter()
    }

    pub fn get(&self, name: &str) -> Option<&Arc<RegisteredSource>> {
        self.sources.iter().find(|s| s.name() == name)
    }

    pub fn names(&self) -> HashSet<String> {
        self.sources.iter().map(|s| s.meta.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Creates a store row for every registered source that does not have one yet.
    pub async fn sync_catalog(&self, store: &Store) -> StoreResult<usize> {
        let mut created = 0;
        for source in &self.sources {
            if store.register_source(&source.meta).await? {
                tracing::info!(source = %source.name(), "registered new source");
                created += 1;
            }
        }
        Ok(created)
    }
}
