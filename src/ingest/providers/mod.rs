// src/ingest/providers/mod.rs
pub mod static_items;
pub mod upstream_rss;

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::config::SourceConfig;
use crate::ingest::registry::SourceRegistry;
use crate::ingest::types::SourceMeta;
use upstream_rss::UpstreamRssFetcher;

/// Build the registry for the configured upstream-feed sources.
pub fn registry_from_config(sources: &[SourceConfig]) -> Result<SourceRegistry> {
    let mut builder = SourceRegistry::builder();
    for sc in sources {
        let meta = SourceMeta::new(&sc.name, &sc.title, &sc.url, &sc.description);
        let fetcher = UpstreamRssFetcher::from_url(&sc.name, &sc.feed_url)
            .with_context(|| format!("building http client for {}", sc.name))?;
        builder.register(meta, sc.interval(), Arc::new(fetcher))?;
    }
    Ok(builder.build())
}
