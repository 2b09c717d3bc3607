//! # エンドポイントテスト用共通ヘルパー

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use vault_resolver::{
    session_channel, ResolutionService, ResolveError, ResolverConfig, Session, SessionPublisher,
    SignedUrl, UrlSigner,
};

use crate::config::GatewayState;

/// パスに "broken" を含む場合は拒否するモック署名プロバイダ。
#[derive(Default)]
pub struct MockSigner {
    calls: AtomicUsize,
}

impl MockSigner {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl UrlSigner for MockSigner {
    async fn sign(
        &self,
        _session: &Session,
        container: &str,
        path: &str,
        ttl_secs: u64,
    ) -> Result<SignedUrl, ResolveError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if path.contains("broken") {
            return Err(ResolveError::Resolution(format!("mock rejected {path}")));
        }
        Ok(SignedUrl {
            url: format!("http://mock-storage/{container}/{path}?ttl={ttl_secs}&sig={n}"),
        })
    }
}

/// テスト用GatewayStateを構築するヘルパー。
///
/// `session` が `None` の場合は未ログイン状態（解決は認証エラーになる）。
pub fn test_state(
    config: ResolverConfig,
    session: Option<Session>,
) -> (Arc<GatewayState>, Arc<MockSigner>, SessionPublisher) {
    let signer = Arc::new(MockSigner::default());
    let (publisher, sessions) = session_channel(session);
    let service = ResolutionService::new(config, signer.clone(), Arc::new(sessions));
    let state = Arc::new(GatewayState {
        service,
        max_batch_paths: 10,
    });
    (state, signer, publisher)
}

/// ログイン済み・既定設定のテスト用GatewayState。
pub fn logged_in_state() -> (Arc<GatewayState>, Arc<MockSigner>, SessionPublisher) {
    test_state(
        ResolverConfig::default(),
        Some(Session::new("service", "service-token")),
    )
}
