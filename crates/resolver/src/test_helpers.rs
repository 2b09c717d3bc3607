//! # テスト用共通ヘルパー
//!
//! service, visibilityテストで共有するモック署名プロバイダ。

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::config::ResolverConfig;
use crate::error::ResolveError;
use crate::service::ResolutionService;
use crate::session::{session_channel, Session, SessionPublisher};
use crate::signer::{SignedUrl, UrlSigner};

/// 呼び出し回数・同時実行数・要求内容を記録するモック署名プロバイダ。
///
/// 発行URLには通し番号が付くため、同じパスでも呼び出しごとに異なるURLになる。
#[derive(Default)]
pub struct MockSigner {
    delay: Duration,
    fail_marker: Option<String>,
    hang_marker: Option<String>,
    empty_marker: Option<String>,
    fail_first: AtomicUsize,
    calls: AtomicUsize,
    outstanding: AtomicUsize,
    peak: AtomicUsize,
    requests: Mutex<Vec<(String, String, u64)>>,
}

struct Outstanding<'a>(&'a AtomicUsize);

impl Drop for Outstanding<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl MockSigner {
    pub fn new() -> Self {
        Self::default()
    }

    /// 各呼び出しで指定時間待ってから応答する
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// パスに `marker` を含む場合は拒否する
    pub fn failing_on(mut self, marker: &str) -> Self {
        self.fail_marker = Some(marker.to_string());
        self
    }

    /// パスに `marker` を含む場合は応答しない
    pub fn hanging_on(mut self, marker: &str) -> Self {
        self.hang_marker = Some(marker.to_string());
        self
    }

    /// パスに `marker` を含む場合は空のURLを返す
    pub fn empty_on(mut self, marker: &str) -> Self {
        self.empty_marker = Some(marker.to_string());
        self
    }

    /// 最初の `n` 回の呼び出しを拒否する
    pub fn failing_first(self, n: usize) -> Self {
        self.fail_first.store(n, Ordering::SeqCst);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// 同時に処理中だった呼び出し数の最大値
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// (container, path, ttl_secs) の記録
    pub fn requests(&self) -> Vec<(String, String, u64)> {
        self.requests.lock().unwrap().clone()
    }

    fn matches(marker: &Option<String>, path: &str) -> bool {
        marker.as_deref().is_some_and(|m| path.contains(m))
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
        self.requests
            .lock()
            .unwrap()
            .push((container.to_string(), path.to_string(), ttl_secs));

        let now = self.outstanding.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        let _outstanding = Outstanding(&self.outstanding);

        if Self::matches(&self.hang_marker, path) {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let fail_now = self
            .fail_first
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |v| v.checked_sub(1))
            .is_ok();
        if fail_now || Self::matches(&self.fail_marker, path) {
            return Err(ResolveError::Resolution(format!("mock rejected {container}/{path}")));
        }
        if Self::matches(&self.empty_marker, path) {
            return Ok(SignedUrl { url: String::new() });
        }

        Ok(SignedUrl {
            url: format!("https://signed.example/{container}/{path}?ttl={ttl_secs}&sig={n}"),
        })
    }
}

/// モック署名プロバイダとログイン済みセッションでサービスを構築する。
pub fn service_with(
    config: ResolverConfig,
    signer: Arc<MockSigner>,
) -> (ResolutionService, SessionPublisher) {
    let (publisher, sessions) = session_channel(Some(Session::new("user-1", "token-1")));
    let service = ResolutionService::new(config, signer, Arc::new(sessions));
    (service, publisher)
}
