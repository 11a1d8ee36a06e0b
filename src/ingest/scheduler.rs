// src/ingest/scheduler.rs
//! Per-source polling loops plus the supervisor that restarts dead ones.
//!
//! Each source gets its own tokio task. Errors from a cycle are logged and the
//! loop waits for its next tick; only a panic ends a loop. The supervisor owns
//! every loop handle and restart timer and is the only thing touching them.

use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::ingest::registry::{RegisteredSource, SourceRegistry};
use crate::ingest::{poll_once, CycleError};
use crate::store::Store;

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(300);
pub const RESTART_DELAY: Duration = Duration::from_secs(180);
pub const SUPERVISOR_TICK: Duration = Duration::from_secs(5);

#[derive(Clone, Copy, Debug)]
pub struct SchedulerCfg {
    /// Used by sources that do not set their own interval.
    pub default_interval: Duration,
    pub restart_delay: Duration,
    pub supervisor_tick: Duration,
}

impl Default for SchedulerCfg {
    fn default() -> Self {
        Self {
            default_interval: DEFAULT_INTERVAL,
            restart_delay: RESTART_DELAY,
            supervisor_tick: SUPERVISOR_TICK,
        }
    }
}

/// Spawn one polling loop for `source`. The first cycle runs immediately,
/// then one per `interval`; a cycle never overlaps the previous one.
pub fn spawn_polling_loop(
    store: Store,
    source: Arc<RegisteredSource>,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let name = source.name().to_string();
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            match poll_once(&store, &name, source.fetcher.as_ref()).await {
                Ok(_) => {}
                Err(CycleError::Fetch(e)) => {
                    tracing::warn!(target: "ingest", source = %name, error = %e, "fetch failed");
                    counter!("feed_fetch_failures_total", "source" => name.clone()).increment(1);
                }
                Err(CycleError::Store(e)) => {
                    tracing::error!(target: "ingest", source = %name, error = %e, "store error");
                    counter!("feed_store_failures_total", "source" => name.clone()).increment(1);
                }
            }
        }
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Running,
    PendingRestart { resume_at: Instant },
}

#[derive(Debug, Clone)]
pub struct SourceStatus {
    pub name: String,
    /// As of the last supervisory pass.
    pub state: LoopState,
    /// Whether the loop task is running right now. A loop that died since
    /// the last pass is `alive == false` while `state` is still `Running`.
    pub alive: bool,
    pub restarts: u32,
}

struct LoopSlot {
    source: Arc<RegisteredSource>,
    interval: Duration,
    handle: JoinHandle<()>,
    restart_at: Option<Instant>,
    restarts: u32,
}

pub struct Supervisor {
    store: Store,
    cfg: SchedulerCfg,
    slots: Vec<LoopSlot>,
}

impl Supervisor {
    /// Spawn a loop for every registered source.
    pub fn start(store: Store, registry: &SourceRegistry, cfg: SchedulerCfg) -> Self {
        let slots = registry
            .iter()
            .map(|source| {
                let interval = source.interval_or(cfg.default_interval);
                tracing::info!(
                    target: "ingest",
                    source = %source.name(),
                    interval_secs = interval.as_secs(),
                    "starting polling loop"
                );
                LoopSlot {
                    source: Arc::clone(source),
                    interval,
                    handle: spawn_polling_loop(store.clone(), Arc::clone(source), interval),
                    restart_at: None,
                    restarts: 0,
                }
            })
            .collect();

        Self { store, cfg, slots }
    }

    /// One supervisory pass over all loops, as of `now`.
    ///
    /// A dead loop first gets a restart time of `now + restart_delay`; it is
    /// respawned by the first pass at or after that time.
    pub fn check(&mut self, now: Instant) {
        for slot in &mut self.slots {
            if !slot.handle.is_finished() {
                slot.restart_at = None;
                continue;
            }

            match slot.restart_at {
                None => {
                    slot.restart_at = Some(now + self.cfg.restart_delay);
                    tracing::warn!(
                        target: "ingest",
                        source = %slot.source.name(),
                        restart_in_secs = self.cfg.restart_delay.as_secs(),
                        "polling loop stopped, restart scheduled"
                    );
                }
                Some(at) if now >= at => {
                    slot.handle = spawn_polling_loop(
                        self.store.clone(),
                        Arc::clone(&slot.source),
                        slot.interval,
                    );
                    slot.restart_at = None;
                    slot.restarts += 1;
                    tracing::info!(
                        target: "ingest",
                        source = %slot.source.name(),
                        restarts = slot.restarts,
                        "polling loop restarted"
                    );
                    counter!("feed_loop_restarts_total", "source" => slot.source.name().to_string())
                        .increment(1);
                }
                Some(_) => {}
            }
        }
    }

    /// Loop states as of the last supervisory pass, plus task liveness now.
    pub fn status(&self) -> Vec<SourceStatus> {
        self.slots
            .iter()
            .map(|slot| SourceStatus {
                name: slot.source.name().to_string(),
                state: match slot.restart_at {
                    Some(resume_at) => LoopState::PendingRestart { resume_at },
                    None => LoopState::Running,
                },
                alive: !slot.handle.is_finished(),
                restarts: slot.restarts,
            })
            .collect()
    }

    /// Run the supervisory tick forever.
    pub async fn run(mut self) {
        let mut ticker = tokio::time::interval(self.cfg.supervisor_tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            self.check(Instant::now());
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }
}

impl Drop for Supervisor {
    fn drop(&mut self) {
        for slot in &self.slots {
            slot.handle.abort();
        }
    }
}
