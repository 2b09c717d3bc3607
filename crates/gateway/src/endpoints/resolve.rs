//! # POST /resolve
//!
//! 1件のパスを署名付きURLへ解決する。失敗はステータスコード付きで返す。

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use vault_types::{ResolveRequest, ResolveResponse};

use crate::config::GatewayState;
use crate::error::GatewayError;

/// POST /resolve: 単体解決。
pub async fn handle_resolve(
    State(state): State<Arc<GatewayState>>,
    Json(body): Json<ResolveRequest>,
) -> Result<Json<ResolveResponse>, GatewayError> {
    let options = body
        .options
        .unwrap_or_else(|| state.service.default_options());

    let url = state
        .service
        .resolve_one(&body.path, &body.container, options)
        .await?;

    Ok(Json(ResolveResponse { url }))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use vault_resolver::ResolverConfig;
    use vault_types::ResolutionOptions;

    use super::*;
    use crate::endpoints::test_helpers::{logged_in_state, test_state};

    fn request(path: &str, options: Option<ResolutionOptions>) -> Json<ResolveRequest> {
        Json(ResolveRequest {
            path: path.to_string(),
            container: "workspace-temp".to_string(),
            options,
        })
    }

    /// プレフィックス付きパスが正規化され、2回目はキャッシュから返ることを確認
    #[tokio::test]
    async fn test_resolve_normalizes_and_caches() {
        let (state, signer, _session) = logged_in_state();

        let first = handle_resolve(State(state.clone()), request("workspace-temp/a/b.png", None))
            .await
            .unwrap()
            .0;
        let second = handle_resolve(State(state), request("a/b.png", None))
            .await
            .unwrap()
            .0;

        assert!(first.url.starts_with("http://mock-storage/workspace-temp/a/b.png?ttl=3600"));
        assert_eq!(first.url, second.url);
        assert_eq!(signer.calls(), 1);
    }

    /// 制約付きクライアント指定でTTL下限が適用されることを確認
    #[tokio::test]
    async fn test_resolve_constrained_client_ttl() {
        let (state, _signer, _session) = logged_in_state();
        let options = ResolutionOptions::default().constrained(true);

        let response = handle_resolve(State(state), request("clip.png", Some(options)))
            .await
            .unwrap()
            .0;
        assert!(response.url.contains("ttl=86400"));
    }

    /// 絶対URLはそのまま返されることを確認
    #[tokio::test]
    async fn test_resolve_passthrough() {
        let (state, signer, _session) = logged_in_state();
        let response = handle_resolve(State(state), request("https://cdn.example/x.png", None))
            .await
            .unwrap()
            .0;
        assert_eq!(response.url, "https://cdn.example/x.png");
        assert_eq!(signer.calls(), 0);
    }

    /// エラー種別ごとのステータスコードを確認
    #[tokio::test]
    async fn test_resolve_error_statuses() {
        let (state, _signer, _session) = logged_in_state();
        let err = handle_resolve(State(state.clone()), request("  ", None))
            .await
            .unwrap_err();
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);

        let err = handle_resolve(State(state.clone()), request("broken.png", None))
            .await
            .unwrap_err();
        assert_eq!(err.into_response().status(), StatusCode::BAD_GATEWAY);

        let err = handle_resolve(
            State(state.clone()),
            Json(ResolveRequest {
                path: "a.png".to_string(),
                container: String::new(),
                options: None,
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);

        let config = ResolverConfig::default()
            .with_session_wait(std::time::Duration::from_millis(10));
        let (state, signer, _session) = test_state(config, None);
        let err = handle_resolve(State(state), request("a.png", None))
            .await
            .unwrap_err();
        assert_eq!(err.into_response().status(), StatusCode::UNAUTHORIZED);
        assert_eq!(signer.calls(), 0);
    }
}
