//! feedsmith: binary entrypoint
//! Opens the store, registers sources, starts the polling supervisor and
//! serves one RSS feed per source over HTTP.

use anyhow::{Context, Result};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use feedsmith::api::{self, AppState};
use feedsmith::config::AppConfig;
use feedsmith::ingest::providers::registry_from_config;
use feedsmith::metrics::Metrics;
use feedsmith::{SchedulerCfg, Store, Supervisor};

/// Compact logs by default; `FEEDSMITH_LOG_FORMAT=json` switches to JSON lines.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("feedsmith=info,ingest=info,tower_http=info,warn"));

    let json = std::env::var("FEEDSMITH_LOG_FORMAT")
        .ok()
        .is_some_and(|v| v.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().compact()).init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "ctrl-c handler failed");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = AppConfig::load_default().context("loading configuration")?;

    // --- Bootstrap: any failure here aborts startup ---
    let store = Store::open(&cfg.storage.database)
        .await
        .with_context(|| format!("opening database {}", cfg.storage.database.display()))?;
    store.ensure_schema().await.context("creating schema")?;

    let registry = registry_from_config(&cfg.sources).context("building source registry")?;
    registry
        .sync_catalog(&store)
        .await
        .context("registering sources")?;
    if registry.is_empty() {
        tracing::warn!("no sources configured; serving 404 for every path");
    }

    if let Some(port) = cfg.server.metrics_port {
        let metrics = Metrics::init()?;
        tokio::spawn(async move {
            if let Err(e) = metrics.serve(port).await {
                tracing::error!(error = ?e, "metrics server stopped");
            }
        });
    }

    let scheduler_cfg = SchedulerCfg {
        default_interval: cfg.default_interval(),
        ..SchedulerCfg::default()
    };
    let _supervisor = Supervisor::start(store.clone(), &registry, scheduler_cfg).spawn();

    let app = api::router(AppState::new(store, registry.names()));
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", cfg.server.port))
        .await
        .with_context(|| format!("binding port {}", cfg.server.port))?;
    tracing::info!(
        port = cfg.server.port,
        sources = registry.len(),
        "serving feeds"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("http server")?;

    Ok(())
}
