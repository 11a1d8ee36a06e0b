// src/ingest/mod.rs
pub mod providers;
pub mod registry;
pub mod scheduler;
pub mod types;

use crate::ingest::types::{FetchContract, FetchError};
use crate::store::{Store, StoreError};
use metrics::{counter, describe_counter, describe_gauge, gauge};
use once_cell::sync::OnceCell;

/// One-time metrics registration (so series show up on /metrics).
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "feed_items_inserted_total",
            "New items persisted by polling cycles."
        );
        describe_counter!(
            "feed_fetch_failures_total",
            "Polling cycles whose fetch failed."
        );
        describe_counter!(
            "feed_store_failures_total",
            "Polling cycles that hit a store read/write error."
        );
        describe_counter!(
            "feed_loop_restarts_total",
            "Polling loops restarted by the supervisor."
        );
        describe_counter!(
            "feed_upstream_errors_total",
            "Upstream feed fetch/parse errors."
        );
        describe_gauge!(
            "feed_poll_last_run_ts",
            "Unix ts when a source was last polled."
        );
    });
}

/// Normalize summary text: decode entities, strip tags, collapse whitespace.
pub fn normalize_text(s: &str) -> String {
    // 1) HTML entity decode
    let mut out = html_escape::decode_html_entities(s).to_string();

    // 2) Strip HTML tags
    static RE_TAGS: OnceCell<regex::Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, " ").to_string();

    // 3) Collapse whitespace
    static RE_WS: OnceCell<regex::Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());
    out = re_ws.replace_all(&out, " ").to_string();
    out = out.trim().to_string();

    // 4) Length cap: 1500 chars
    if out.chars().count() > 1500 {
        out = out.chars().take(1500).collect();
    }

    out
}

/// Why a single polling cycle did not complete.
#[derive(Debug, thiserror::Error)]
pub enum CycleError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// One polling cycle: read the watermark, fetch newer items, persist them.
/// Returns how many rows were actually inserted.
///
/// A failure leaves the store untouched, so the next cycle starts from the
/// same watermark and retries the same window.
pub async fn poll_once(
    store: &Store,
    source: &str,
    fetcher: &dyn FetchContract,
) -> Result<u64, CycleError> {
    ensure_metrics_described();

    let since = store.watermark(source).await?;
    let items = fetcher.fetch(since).await?;
    let now = chrono::Utc::now().timestamp().max(0);
    gauge!("feed_poll_last_run_ts", "source" => source.to_string()).set(now as f64);
    if items.is_empty() {
        return Ok(0);
    }

    let inserted = store.insert_batch(source, &items).await?;
    if inserted > 0 {
        tracing::info!(
            target: "ingest",
            source = %source,
            inserted,
            fetched = items.len(),
            "inserted new items"
        );
        counter!("feed_items_inserted_total", "source" => source.to_string()).increment(inserted);
    }

    Ok(inserted)
}
