// src/store.rs
//! Ingestion store: SQLite-backed, deduplicating persistence for sources and items.
//!
//! Every operation checks a connection out of the pool, runs to completion and
//! returns it. Nothing holds a connection across a fetch or a sleep.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, SecondsFormat, TimeDelta, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{FromRow, SqlitePool};

use crate::ingest::types::{CandidateItem, SourceMeta};

/// 2000-01-01T00:00:00Z, in seconds since the unix epoch.
const SENTINEL_UNIX_SECS: i64 = 946_684_800;

/// Watermark reported for sources with no items (or no row at all).
pub fn sentinel_watermark() -> DateTime<Utc> {
    DateTime::<Utc>::UNIX_EPOCH + TimeDelta::seconds(SENTINEL_UNIX_SECS)
}

/// Stored representation: RFC 3339, UTC, fixed microsecond precision, so that
/// lexicographic order on the column equals chronological order.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, false)
}

/// Parses a stored timestamp back. Naive values are taken as UTC.
pub fn parse_stored_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
        .map(|naive| naive.and_utc())
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("source `{0}` is not registered")]
    UnknownSource(String),
    #[error("unreadable stored timestamp `{value}`")]
    Timestamp { value: String },
}

pub type StoreResult<T> = Result<T, StoreError>;

/// A persisted item as read back for rendering. `published` is the raw stored string.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct StoredItem {
    pub link: String,
    pub title: String,
    pub published: String,
    pub summary: Option<String>,
}

/// A source together with all of its items, newest first.
#[derive(Debug, Clone)]
pub struct SourceFeed {
    pub source: SourceMeta,
    pub items: Vec<StoredItem>,
}

#[derive(FromRow)]
struct SourceRow {
    id: i64,
    name: String,
    title: String,
    url: String,
    description: String,
}

#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Opens (creating if missing) the database file at `path`.
    pub async fn open(path: &Path) -> StoreResult<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5));
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;
        Ok(Self { pool })
    }

    /// Private in-memory database. The pool pins a single connection so the
    /// database lives as long as the store.
    pub async fn in_memory() -> StoreResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        Ok(Self { pool })
    }

    /// Idempotently creates both relations and the (source, link) uniqueness constraint.
    pub async fn ensure_schema(&self) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sources (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                title TEXT NOT NULL,
                url TEXT NOT NULL,
                description TEXT NOT NULL
            )
            "#,
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS items (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                source_id INTEGER NOT NULL REFERENCES sources(id),
                link TEXT NOT NULL,
                title TEXT NOT NULL,
                published TEXT NOT NULL,
                summary TEXT DEFAULT NULL
            )
            "#,
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "CREATE UNIQUE INDEX IF NOT EXISTS items_source_link_uq ON items (source_id, link)",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS items_source_published ON items (source_id, published DESC)",
        )
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Inserts the source row if no source with that name exists yet.
    /// Existing rows are left untouched. Returns whether a row was created.
    pub async fn register_source(&self, meta: &SourceMeta) -> StoreResult<bool> {
        let res = sqlx::query(
            r#"
            INSERT INTO sources (name, title, url, description)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(name) DO NOTHING
            "#,
        )
        .bind(&meta.name)
        .bind(&meta.title)
        .bind(&meta.url)
        .bind(&meta.description)
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected() > 0)
    }

    /// Maximum persisted `published` for the source, or the sentinel when there is none.
    pub async fn watermark(&self, source_name: &str) -> StoreResult<DateTime<Utc>> {
        let max: Option<String> = sqlx::query_scalar(
            r#"
            SELECT MAX(i.published)
            FROM items i
            JOIN sources s ON s.id = i.source_id
            WHERE s.name = ?
            "#,
        )
        .bind(source_name)
        .fetch_one(&self.pool)
        .await?;

        match max {
            None => Ok(sentinel_watermark()),
            Some(raw) => {
                parse_stored_timestamp(&raw).ok_or(StoreError::Timestamp { value: raw })
            }
        }
    }

    /// Inserts the batch in one transaction, skipping any item whose
    /// (source, link) is already stored. An existing row is never updated,
    /// even if the incoming title or summary differ.
    ///
    /// Returns the number of rows actually inserted.
    pub async fn insert_batch(
        &self,
        source_name: &str,
        items: &[CandidateItem],
    ) -> StoreResult<u64> {
        // Take the write lock up front so concurrent batches wait on busy_timeout
        // instead of failing when a read lock cannot be upgraded.
        let mut tx = self.pool.begin_with("BEGIN IMMEDIATE").await?;

        let source_id: Option<i64> = sqlx::query_scalar("SELECT id FROM sources WHERE name = ?")
            .bind(source_name)
            .fetch_optional(&mut *tx)
            .await?;
        let Some(source_id) = source_id else {
            return Err(StoreError::UnknownSource(source_name.to_string()));
        };

        let mut inserted = 0u64;
        for item in items {
            let res = sqlx::query(
                r#"
                INSERT OR IGNORE INTO items (source_id, link, title, published, summary)
                VALUES (?, ?, ?, ?, ?)
                "#,
            )
            .bind(source_id)
            .bind(&item.url)
            .bind(&item.title)
            .bind(format_timestamp(item.published))
            .bind(item.summary.as_deref())
            .execute(&mut *tx)
            .await?;
            inserted += res.rows_affected();
        }

        tx.commit().await?;
        Ok(inserted)
    }

    /// All items of a source, newest first; equal timestamps keep insertion order.
    ///
    /// `None` means the source does not exist, which is distinct from a
    /// known source with zero items.
    pub async fn list_items(&self, source_name: &str) -> StoreResult<Option<SourceFeed>> {
        let mut conn = self.pool.acquire().await?;

        let row: Option<SourceRow> = sqlx::query_as(
            "SELECT id, name, title, url, description FROM sources WHERE name = ?",
        )
        .bind(source_name)
        .fetch_optional(&mut *conn)
        .await?;
        let Some(row) = row else {
            return Ok(None);
        };

        let items: Vec<StoredItem> = sqlx::query_as(
            r#"
            SELECT link, title, published, summary
            FROM items
            WHERE source_id = ?
            ORDER BY published DESC, id ASC
            "#,
        )
        .bind(row.id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(Some(SourceFeed {
            source: SourceMeta {
                name: row.name,
                title: row.title,
                url: row.url,
                description: row.description,
            },
            items,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn sentinel_is_year_2000_utc() {
        let expected = Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(sentinel_watermark(), expected);
    }

    #[test]
    fn stored_format_sorts_like_time() {
        let a = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        let b = a + TimeDelta::milliseconds(500);
        let (fa, fb) = (format_timestamp(a), format_timestamp(b));
        assert_eq!(fa, "2024-05-01T10:00:00.000000+00:00");
        assert!(fa < fb);
    }

    #[test]
    fn parse_accepts_offsets_and_naive_values() {
        let utc = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
        assert_eq!(parse_stored_timestamp("2024-05-01T10:00:00+02:00"), Some(utc));
        assert_eq!(parse_stored_timestamp("2024-05-01T08:00:00"), Some(utc));
        assert_eq!(parse_stored_timestamp("last tuesday"), None);
    }
}
