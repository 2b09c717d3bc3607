//! # POST /resolve-batch
//!
//! 複数パスをまとめて解決する。個々の失敗は結果から除外され、リクエスト自体は成功する。

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use vault_types::{BatchResolveRequest, BatchResolveResponse};

use crate::config::GatewayState;
use crate::error::GatewayError;

/// POST /resolve-batch: バッチ解決。
pub async fn handle_resolve_batch(
    State(state): State<Arc<GatewayState>>,
    Json(body): Json<BatchResolveRequest>,
) -> Result<Json<BatchResolveResponse>, GatewayError> {
    if body.paths.len() > state.max_batch_paths {
        return Err(GatewayError::BadRequest(format!(
            "パス数が上限を超えています: {} (上限: {})",
            body.paths.len(),
            state.max_batch_paths
        )));
    }
    state.service.validate_container(&body.container)?;

    let options = body
        .options
        .unwrap_or_else(|| state.service.default_options());
    let urls = state
        .service
        .resolve_batch(&body.paths, &body.container, options)
        .await;

    tracing::info!(
        container = %body.container,
        requested = body.paths.len(),
        resolved = urls.len(),
        "バッチ解決"
    );
    Ok(Json(BatchResolveResponse { urls }))
}
