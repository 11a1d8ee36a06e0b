// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod api;
pub mod config;
pub mod feed;
pub mod ingest;
pub mod metrics;
pub mod store;

// ---- Re-exports for stable public API ----
pub use crate::api::router;
pub use crate::ingest::registry::SourceRegistry;
pub use crate::ingest::scheduler::{SchedulerCfg, Supervisor};
pub use crate::ingest::types::{CandidateItem, FetchContract, FetchError, SourceMeta};
pub use crate::store::Store;
