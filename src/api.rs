use std::collections::HashSet;
use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tower_http::trace::TraceLayer;

use crate::feed::{render_rss, RSS_CONTENT_TYPE};
use crate::store::Store;

#[derive(Clone)]
pub struct AppState {
    store: Store,
    known: Arc<HashSet<String>>,
}

impl AppState {
    pub fn new(store: Store, known: impl IntoIterator<Item = String>) -> Self {
        Self {
            store,
            known: Arc::new(known.into_iter().collect()),
        }
    }
}

/// `GET /{source}` and `GET /{source}/`. Everything else is a 404.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/{*source}", get(serve_feed))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Strips one trailing and one leading slash from the request path.
pub fn source_name_from_path(path: &str) -> &str {
    let p = path.strip_suffix('/').unwrap_or(path);
    p.strip_prefix('/').unwrap_or(p)
}

async fn serve_feed(State(state): State<AppState>, uri: Uri) -> Response {
    let name = source_name_from_path(uri.path());
    if name.is_empty() || !state.known.contains(name) {
        return StatusCode::NOT_FOUND.into_response();
    }

    let feed = match state.store.list_items(name).await {
        Ok(Some(feed)) => feed,
        Ok(None) => {
            tracing::debug!(source = %name, "source registered but missing in store");
            return StatusCode::NOT_FOUND.into_response();
        }
        Err(e) => {
            tracing::error!(source = %name, error = %e, "reading feed failed");
            return StatusCode::NOT_FOUND.into_response();
        }
    };

    match render_rss(&feed.source, &feed.items) {
        Ok(body) => ([(header::CONTENT_TYPE, RSS_CONTENT_TYPE)], body).into_response(),
        Err(e) => {
            tracing::error!(source = %name, error = %e, "rendering feed failed");
            StatusCode::NOT_FOUND.into_response()
        }
    }
}
