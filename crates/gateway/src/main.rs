//! # Media Vault Gateway
//!
//! ストレージ参照を短命な署名付きURLへ解決するHTTPサービス。
//!
//! ## 役割
//! - 認可プロバイダ（S3互換ストレージ / ストレージAPI）への署名要求の集約
//! - 署名付きURLのキャッシュと同一キーの要求の合流
//! - プロバイダへの同時呼び出し数の制限
//!
//! ## API エンドポイント
//! - `POST /resolve`: 単体解決
//! - `POST /resolve-batch`: バッチ解決
//! - `POST /prime`: 解決済みエントリの投入
//! - `POST /evict`: キャッシュ削除
//! - `POST /cleanup`: 期限切れエントリの掃除
//! - `GET /health`: 稼働状態

mod config;
mod endpoints;
mod error;
mod storage;

use std::sync::Arc;

use vault_resolver::{session_channel, ResolutionService, Session};

use config::{GatewayConfig, GatewayState};
use endpoints::*;

fn router(state: Arc<GatewayState>) -> axum::Router {
    axum::Router::new()
        .route("/resolve", axum::routing::post(handle_resolve))
        .route("/resolve-batch", axum::routing::post(handle_resolve_batch))
        .route("/prime", axum::routing::post(handle_prime))
        .route("/evict", axum::routing::post(handle_evict))
        .route("/cleanup", axum::routing::post(handle_cleanup))
        .route("/health", axum::routing::get(handle_health))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// エントリポイント
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let config = GatewayConfig::from_env()?;
    let signer = storage::signer_from_env(config.signer)?;

    // サービストークンをセッションとして発行する。未設定なら全解決が認証エラーになる
    let initial_session = config
        .service_token
        .as_ref()
        .map(|token| Session::new("vault-gateway", token.clone()));
    if initial_session.is_none() {
        tracing::warn!("VAULT_SERVICE_TOKENが未設定です。解決要求はすべて認証エラーになります");
    }
    let (_session_publisher, sessions) = session_channel(initial_session);

    tracing::info!(
        signer = ?config.signer,
        limiter_capacity = config.resolver.limiter_capacity,
        provider_timeout_secs = config.resolver.provider_timeout.as_secs(),
        default_ttl_secs = config.resolver.default_ttl_secs,
        suffix_eviction = config.resolver.allow_suffix_eviction,
        "解決サービスを構成"
    );

    let service = ResolutionService::new(config.resolver.clone(), signer, Arc::new(sessions));
    let _sweeper = service.spawn_sweeper();

    let state = Arc::new(GatewayState {
        service,
        max_batch_paths: config.max_batch_paths,
    });

    tracing::info!("Gatewayを {} で起動します", config.bind_addr);
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    axum::serve(listener, router(state)).await?;

    Ok(())
}

// ---------------------------------------------------------------------------
// テスト
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use vault_types::{BatchResolveResponse, HealthResponse, ResolveResponse};

    use super::*;
    use crate::endpoints::test_helpers::logged_in_state;

    /// ルーターを実ポートで起動し、HTTP経由で各エンドポイントが応答することを確認
    #[tokio::test]
    async fn test_router_over_http() {
        let (state, signer, _session) = logged_in_state();
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            axum::serve(listener, router(state)).await.unwrap();
        });
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        let client = reqwest::Client::new();
        let base = format!("http://127.0.0.1:{port}");

        let resolved: ResolveResponse = client
            .post(format!("{base}/resolve"))
            .json(&serde_json::json!({ "path": "a.png", "container": "generated-images" }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert!(resolved.url.starts_with("http://mock-storage/generated-images/a.png"));

        let batch: BatchResolveResponse = client
            .post(format!("{base}/resolve-batch"))
            .json(&serde_json::json!({
                "paths": ["a.png", "broken.png", "https://cdn.example/c.png"],
                "container": "generated-images",
                "options": { "ttl_seconds": 600 }
            }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(batch.urls.len(), 2);
        assert_eq!(batch.urls["a.png"], resolved.url);

        let status = client
            .post(format!("{base}/resolve"))
            .json(&serde_json::json!({ "path": "", "container": "generated-images" }))
            .send()
            .await
            .unwrap()
            .status();
        assert_eq!(status, reqwest::StatusCode::BAD_REQUEST);

        let health: HealthResponse = client
            .get(format!("{base}/health"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(health.cache_entries, 1);
        assert_eq!(signer.calls(), 2);
    }
}
