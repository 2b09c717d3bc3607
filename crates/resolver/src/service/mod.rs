//! # URL解決サービス
//!
//! 単体解決とバッチ解決の統括。
//!
//! ## 単体解決の流れ
//! 1. 絶対URLはそのまま返す（キャッシュ・プロバイダとも不使用）
//! 2. キャッシュに有効なエントリがあれば返す
//! 3. 同じキーの解決中リクエストがあれば合流してその結果を待つ
//! 4. なければ解決処理を起動する: セッション待機 → 有効期限の決定 →
//!    リミッター経由でプロバイダ呼び出し → キャッシュ書き込み → 枠の解放
//!
//! 解決処理は独立したタスクで実行される。呼び出し側が待機をやめても処理は完了し、
//! 結果はキャッシュされる。
//!
//! ## 共有状態
//! キャッシュと解決中マップはサービスインスタンスが所有し、`Clone` したハンドル間で
//! 共有される。アプリケーション起動時に1つ構築して各利用者に渡す。

mod pending;


use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Weak};

use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{Instant, MissedTickBehavior};
use vault_types::{PrimedEntry, ResolutionOptions, StorageReference};

use crate::cache::ExpiringCache;
use crate::config::ResolverConfig;
use crate::error::ResolveError;
use crate::limiter::ConcurrencyLimiter;
use crate::normalize::{NormalizedPath, PathNormalizer};
use crate::session::{Session, SessionProvider};
use crate::signer::{SignedUrl, UrlSigner};

use pending::{wait_outcome, Outcome, PendingGuard, PendingRequests, Slot};

/// URL解決サービス。`Clone` は同じキャッシュ・解決中マップ・リミッターを共有する。
#[derive(Clone)]
pub struct ResolutionService {
    inner: Arc<ServiceInner>,
}

struct ServiceInner {
    config: ResolverConfig,
    cache: ExpiringCache,
    limiter: ConcurrencyLimiter,
    pending: PendingRequests,
    normalizer: PathNormalizer,
    signer: Arc<dyn UrlSigner>,
    sessions: Arc<dyn SessionProvider>,
}

impl ResolutionService {
    pub fn new(
        config: ResolverConfig,
        signer: Arc<dyn UrlSigner>,
        sessions: Arc<dyn SessionProvider>,
    ) -> Self {
        let inner = ServiceInner {
            cache: ExpiringCache::new(config.safety_margin_secs),
            limiter: ConcurrencyLimiter::new(config.limiter_capacity),
            pending: PendingRequests::default(),
            normalizer: PathNormalizer::new(config.known_containers.clone()),
            signer,
            sessions,
            config,
        };
        Self {
            inner: Arc::new(inner),
        }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.inner.config
    }

    pub fn cache(&self) -> &ExpiringCache {
        &self.inner.cache
    }

    pub fn limiter(&self) -> &ConcurrencyLimiter {
        &self.inner.limiter
    }

    /// 解決中のキー数。
    pub fn pending_count(&self) -> usize {
        self.inner.pending.len()
    }

    /// 設定の既定TTLを持つ解決オプション。
    pub fn default_options(&self) -> ResolutionOptions {
        ResolutionOptions::default().with_ttl(self.inner.config.default_ttl_secs)
    }

    /// コンテナ名を検証する。
    pub fn validate_container(&self, container: &str) -> Result<(), ResolveError> {
        PathNormalizer::validate_container(container)
    }

    /// パスを正規化する（コンテナ名プレフィックス除去・絶対URL判定）。
    pub fn normalize(&self, path: &str, container: &str) -> Result<NormalizedPath, ResolveError> {
        self.inner.normalizer.normalize(path, container)
    }

    // -----------------------------------------------------------------------
    // 単体解決
    // -----------------------------------------------------------------------

    /// 1件のパスを署名付きURLへ解決する。
    pub async fn resolve_one(
        &self,
        path: &str,
        container: &str,
        options: ResolutionOptions,
    ) -> Result<String, ResolveError> {
        let key = match self.normalize(path, container)? {
            NormalizedPath::Absolute(url) => return Ok(url),
            NormalizedPath::Relative(relative) => StorageReference::new(container, relative),
        };
        self.resolve_key(key, options).await
    }

    /// ストレージ参照を解決する。
    pub async fn resolve_reference(
        &self,
        reference: &StorageReference,
        options: ResolutionOptions,
    ) -> Result<String, ResolveError> {
        self.resolve_one(&reference.path, &reference.container, options)
            .await
    }

    /// 正規化済みキーを解決する。キャッシュ → 解決中マップ → 新規解決の順。
    async fn resolve_key(
        &self,
        key: StorageReference,
        options: ResolutionOptions,
    ) -> Result<String, ResolveError> {
        if let Some(entry) = self.inner.cache.get(&key) {
            tracing::debug!(key = %key, "キャッシュヒット");
            return Ok(entry.url);
        }

        let rx = match self
            .inner
            .pending
            .acquire(&key, || self.inner.cache.get(&key).map(|entry| entry.url))
        {
            Slot::Cached(url) => return Ok(url),
            Slot::Follower(rx) => {
                tracing::debug!(key = %key, "解決中のリクエストに合流");
                rx
            }
            Slot::Leader { tx, rx } => {
                let this = self.clone();
                tokio::spawn(async move {
                    let guard = PendingGuard::new(&this.inner.pending, &key);
                    let outcome = this.fetch_and_store(&key, options).await;
                    guard.complete();
                    if let Err(e) = &outcome {
                        tracing::debug!(key = %key, error = %e, "URL解決に失敗");
                    }
                    tx.send_replace(Some(outcome));
                });
                rx
            }
        };

        wait_outcome(rx).await
    }

    /// セッション待機 → プロバイダ呼び出し → キャッシュ書き込み。
    async fn fetch_and_store(&self, key: &StorageReference, options: ResolutionOptions) -> Outcome {
        let inner = &self.inner;
        let session = inner
            .sessions
            .ready(inner.config.session_wait)
            .await
            .ok_or_else(|| {
                ResolveError::Authentication(format!(
                    "{}ms以内にセッションが得られませんでした",
                    inner.config.session_wait.as_millis()
                ))
            })?;

        let ttl_secs = inner
            .config
            .effective_ttl_secs(options.ttl_seconds, options.constrained_client);

        let signed = self.sign_with_retry(&session, key, ttl_secs).await?;
        if signed.url.trim().is_empty() {
            return Err(ResolveError::Resolution(format!(
                "プロバイダがURLを返しませんでした: {key}"
            )));
        }

        inner.cache.set(key.clone(), signed.url.clone(), ttl_secs);
        tracing::debug!(key = %key, ttl_secs, "署名付きURLをキャッシュ");
        Ok(signed.url)
    }

    /// リミッター経由でプロバイダを呼ぶ。タイムアウト時のみ設定回数まで再試行する。
    async fn sign_with_retry(
        &self,
        session: &Session,
        key: &StorageReference,
        ttl_secs: u64,
    ) -> Result<SignedUrl, ResolveError> {
        let inner = &self.inner;
        let timeout = inner.config.provider_timeout;
        let attempts = inner.config.provider_retries + 1;

        for attempt in 1..=attempts {
            let call = inner
                .limiter
                .execute(tokio::time::timeout(
                    timeout,
                    inner.signer.sign(session, &key.container, &key.path, ttl_secs),
                ))
                .await?;
            match call {
                Ok(result) => return result,
                Err(_) => tracing::warn!(
                    key = %key,
                    attempt,
                    attempts,
                    timeout_ms = timeout.as_millis() as u64,
                    "プロバイダ呼び出しがタイムアウト"
                ),
            }
        }

        Err(ResolveError::Timeout {
            timeout_secs: timeout.as_secs(),
            attempts,
        })
    }

    // -----------------------------------------------------------------------
    // バッチ解決
    // -----------------------------------------------------------------------

    /// 複数パスを解決する。失敗したパスは結果に含めない（エラーにはしない）。
    ///
    /// 未解決分は設定のチャンクサイズごとに並行解決する。単体解決と同じ
    /// キャッシュ・解決中マップ・リミッターを通るため、同じキーの単体解決とも合流する。
    pub async fn resolve_batch<I, S>(
        &self,
        paths: I,
        container: &str,
        options: ResolutionOptions,
    ) -> HashMap<String, String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        if let Err(e) = self.validate_container(container) {
            tracing::warn!(container, error = %e, "バッチ解決のコンテナ名が不正");
            return HashMap::new();
        }

        let mut resolved = HashMap::new();
        let mut seen = HashSet::new();
        let mut unresolved: Vec<(String, StorageReference)> = Vec::new();

        for path in paths {
            let path = path.as_ref();
            if !seen.insert(path.to_string()) {
                continue;
            }
            match self.normalize(path, container) {
                Ok(NormalizedPath::Absolute(url)) => {
                    resolved.insert(path.to_string(), url);
                }
                Ok(NormalizedPath::Relative(relative)) => {
                    let key = StorageReference::new(container, relative);
                    match self.inner.cache.get(&key) {
                        Some(entry) => {
                            resolved.insert(path.to_string(), entry.url);
                        }
                        None => unresolved.push((path.to_string(), key)),
                    }
                }
                Err(e) => {
                    tracing::warn!(path, container, error = %e, "バッチ内のパスを正規化できません");
                }
            }
        }

        let hits = resolved.len();
        let chunk_size = self.inner.config.batch_chunk_size.max(1);
        let mut failed = 0usize;

        for chunk in unresolved.chunks(chunk_size) {
            let mut tasks = JoinSet::new();
            for (path, key) in chunk.iter().cloned() {
                let this = self.clone();
                tasks.spawn(async move {
                    let outcome = this.resolve_key(key, options).await;
                    (path, outcome)
                });
            }
            while let Some(joined) = tasks.join_next().await {
                match joined {
                    Ok((path, Ok(url))) => {
                        resolved.insert(path, url);
                    }
                    Ok((path, Err(e))) => {
                        failed += 1;
                        tracing::warn!(path = %path, container, error = %e, "バッチ内のURL解決に失敗");
                    }
                    Err(e) => {
                        failed += 1;
                        tracing::warn!(container, error = %e, "バッチ解決タスクが異常終了");
                    }
                }
            }
        }

        tracing::debug!(
            container,
            requested = seen.len(),
            immediate = hits,
            resolved = resolved.len(),
            failed,
            "バッチ解決完了"
        );
        resolved
    }

    // -----------------------------------------------------------------------
    // キャッシュ操作
    // -----------------------------------------------------------------------

    /// 解決済みエントリをキャッシュへ一括投入する。投入件数を返す。
    ///
    /// 絶対URLや不正なパスのエントリは読み飛ばす。
    pub fn prime_cache<I>(&self, entries: I) -> usize
    where
        I: IntoIterator<Item = PrimedEntry>,
    {
        let normalized: Vec<_> = entries
            .into_iter()
            .filter_map(|entry| match self.normalize(&entry.path, &entry.container) {
                Ok(NormalizedPath::Relative(relative)) => Some((
                    StorageReference::new(entry.container, relative),
                    entry.url,
                    entry.expires_in_secs,
                )),
                Ok(NormalizedPath::Absolute(_)) => None,
                Err(e) => {
                    tracing::debug!(path = %entry.path, error = %e, "投入できないエントリを読み飛ばし");
                    None
                }
            })
            .collect();
        self.inner.cache.prime(normalized)
    }

    /// キャッシュからエントリを削除する。削除件数を返す。
    ///
    /// コンテナ未指定の場合は全コンテナのパス一致削除となるため、
    /// 設定で許可されていなければ `AmbiguousEviction` を返す。
    pub fn evict(&self, path: &str, container: Option<&str>) -> Result<usize, ResolveError> {
        match container {
            Some(container) => match self.normalize(path, container)? {
                NormalizedPath::Absolute(_) => Ok(0),
                NormalizedPath::Relative(relative) => {
                    let key = StorageReference::new(container, relative);
                    Ok(usize::from(self.inner.cache.evict(&key)))
                }
            },
            None if self.inner.config.allow_suffix_eviction => match self
                .inner
                .normalizer
                .normalize_unscoped(path)?
            {
                NormalizedPath::Absolute(_) => Ok(0),
                NormalizedPath::Relative(relative) => Ok(self.inner.cache.evict_path(&relative)),
            },
            None => Err(ResolveError::AmbiguousEviction(path.to_string())),
        }
    }

    /// 期限切れエントリを掃除する。削除件数を返す。
    pub fn cleanup_cache(&self) -> usize {
        self.inner.cache.sweep()
    }

    /// 設定間隔で `cleanup_cache` を実行するバックグラウンドタスクを起動する。
    ///
    /// サービスの全ハンドルが破棄されるとタスクは終了する。
    pub fn spawn_sweeper(&self) -> JoinHandle<()> {
        let weak: Weak<ServiceInner> = Arc::downgrade(&self.inner);
        let period = self.inner.config.sweep_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                let removed = inner.cache.sweep();
                tracing::debug!(removed, remaining = inner.cache.len(), "定期キャッシュ掃除");
            }
        })
    }
}
