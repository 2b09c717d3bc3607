//! # キャッシュ操作エンドポイント
//!
//! - `POST /prime`: 解決済みエントリの一括投入
//! - `POST /evict`: エントリの削除
//! - `POST /cleanup`: 期限切れエントリの掃除

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use vault_types::{EvictRequest, PrimeRequest, PrimeResponse, RemovedResponse};

use crate::config::GatewayState;
use crate::error::GatewayError;

/// POST /prime: 解決済みエントリをキャッシュへ投入する。
pub async fn handle_prime(
    State(state): State<Arc<GatewayState>>,
    Json(body): Json<PrimeRequest>,
) -> Json<PrimeResponse> {
    let requested = body.entries.len();
    let primed = state.service.prime_cache(body.entries);
    tracing::info!(requested, primed, "キャッシュへ一括投入");
    Json(PrimeResponse { primed })
}

/// POST /evict: キャッシュからエントリを削除する。
pub async fn handle_evict(
    State(state): State<Arc<GatewayState>>,
    Json(body): Json<EvictRequest>,
) -> Result<Json<RemovedResponse>, GatewayError> {
    let removed = state
        .service
        .evict(&body.path, body.container.as_deref())?;
    Ok(Json(RemovedResponse { removed }))
}

/// POST /cleanup: 期限切れエントリを掃除する。
pub async fn handle_cleanup(State(state): State<Arc<GatewayState>>) -> Json<RemovedResponse> {
    let removed = state.service.cleanup_cache();
    Json(RemovedResponse { removed })
}

#[cfg(test)]
mod tests {
    use vault_resolver::{ResolverConfig, Session};
    use vault_types::PrimedEntry;

    use super::*;
    use crate::endpoints::test_helpers::{logged_in_state, test_state};
    use crate::endpoints::handle_resolve;

    fn primed(path: &str, url: &str) -> PrimedEntry {
        PrimedEntry {
            container: "generated-images".to_string(),
            path: path.to_string(),
            url: url.to_string(),
            expires_in_secs: 3600,
        }
    }

    /// 投入したエントリがプロバイダを呼ばずに解決に使われることを確認
    #[tokio::test]
    async fn test_prime_then_resolve() {
        let (state, signer, _session) = logged_in_state();
        let response = handle_prime(
            State(state.clone()),
            Json(PrimeRequest {
                entries: vec![
                    primed("generated-images/a.png", "https://signed/a"),
                    primed("https://cdn.example/b.png", "https://signed/b"),
                ],
            }),
        )
        .await
        .0;
        assert_eq!(response.primed, 1);

        let resolved = handle_resolve(
            State(state),
            Json(vault_types::ResolveRequest {
                path: "a.png".to_string(),
                container: "generated-images".to_string(),
                options: None,
            }),
        )
        .await
        .unwrap()
        .0;
        assert_eq!(resolved.url, "https://signed/a");
        assert_eq!(signer.calls(), 0);
    }

    /// コンテナ指定の削除と、コンテナ未指定の削除の拒否を確認
    #[tokio::test]
    async fn test_evict() {
        let (state, _signer, _session) = logged_in_state();
        state
            .service
            .prime_cache([primed("a.png", "https://signed/a")]);

        let result = handle_evict(
            State(state.clone()),
            Json(EvictRequest {
                path: "a.png".to_string(),
                container: None,
            }),
        )
        .await;
        assert!(matches!(result, Err(GatewayError::BadRequest(_))));

        let removed = handle_evict(
            State(state.clone()),
            Json(EvictRequest {
                path: "a.png".to_string(),
                container: Some("generated-images".to_string()),
            }),
        )
        .await
        .unwrap()
        .0;
        assert_eq!(removed.removed, 1);
        assert!(state.service.cache().is_empty());
    }

    /// サフィックス削除が許可されている場合は全コンテナから削除されることを確認
    #[tokio::test]
    async fn test_evict_suffix_when_enabled() {
        let config = ResolverConfig::default().with_suffix_eviction(true);
        let (state, _signer, _session) = test_state(config, Some(Session::new("s", "t")));
        state.service.prime_cache([
            primed("a.png", "https://signed/a"),
            PrimedEntry {
                container: "video-thumbnails".to_string(),
                ..primed("a.png", "https://signed/thumb")
            },
        ]);

        let removed = handle_evict(
            State(state),
            Json(EvictRequest {
                path: "a.png".to_string(),
                container: None,
            }),
        )
        .await
        .unwrap()
        .0;
        assert_eq!(removed.removed, 2);
    }

    #[tokio::test]
    async fn test_cleanup_on_fresh_cache() {
        let (state, _signer, _session) = logged_in_state();
        state
            .service
            .prime_cache([primed("a.png", "https://signed/a")]);
        let removed = handle_cleanup(State(state.clone())).await.0;
        assert_eq!(removed.removed, 0);
        assert_eq!(state.service.cache().len(), 1);
    }
}
