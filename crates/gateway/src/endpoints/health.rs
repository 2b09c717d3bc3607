//! # GET /health
//!
//! キャッシュと同時実行リミッターの状態を返す。

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use vault_types::HealthResponse;

use crate::config::GatewayState;

/// GET /health: 稼働状態。
pub async fn handle_health(State(state): State<Arc<GatewayState>>) -> Json<HealthResponse> {
    let service = &state.service;
    Json(HealthResponse {
        cache_entries: service.cache().len(),
        pending: service.pending_count(),
        limiter_running: service.limiter().running(),
        limiter_queued: service.limiter().queued(),
        limiter_capacity: service.limiter().capacity(),
    })
}
