use axum::{Json, extract::State};
use serde::Serialize;
use tracing::info;

use crate::domain::types::CacheStats;
use crate::state::AppState;

// ── GET /qr/cache/stats ───────────────────────────────────────────────────────

pub async fn cache_stats(State(state): State<AppState>) -> Json<CacheStats> {
    Json(state.cache.stats())
}

// ── DELETE /qr/cache ──────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct ClearCacheResponse {
    pub removed: usize,
}

pub async fn clear_cache(State(state): State<AppState>) -> Json<ClearCacheResponse> {
    let removed = state.cache.clear();
    info!(removed, "qr cache cleared");
    Json(ClearCacheResponse { removed })
}
