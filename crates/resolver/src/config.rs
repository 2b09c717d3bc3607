//! # 解決レイヤー設定
//!
//! 同時実行数・バッチサイズ・有効期限マージン等の既定値と、
//! それらをまとめた [`ResolverConfig`]。

use std::time::Duration;

use vault_types::DEFAULT_TTL_SECS;

// ---------------------------------------------------------------------------
// 既定値
// ---------------------------------------------------------------------------

/// プロバイダ同時呼び出し数の上限
pub const DEFAULT_LIMITER_CAPACITY: usize = 4;

/// バッチ解決で一度に発行するパス数
pub const DEFAULT_BATCH_CHUNK_SIZE: usize = 20;

/// キャッシュ有効期限を実際のURL失効より前倒しにする安全マージン（秒）
pub const DEFAULT_SAFETY_MARGIN_SECS: u64 = 60;

/// 期限切れエントリの定期掃除間隔: 5分
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// 制約付きクライアントに適用する有効期限の下限: 24時間
pub const CONSTRAINED_CLIENT_MIN_TTL_SECS: u64 = 24 * 60 * 60;

/// セッション待機の上限（200ms間隔 × 3回相当）
pub const DEFAULT_SESSION_WAIT: Duration = Duration::from_millis(600);

/// プロバイダ呼び出し1回あたりのタイムアウト
pub const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(15);

/// タイムアウト時の再試行回数
pub const DEFAULT_PROVIDER_RETRIES: u32 = 1;

/// 表示領域の手前で解決を始める距離
pub const DEFAULT_PREFETCH_MARGIN: f64 = 200.0;

/// 旧来・別名のコンテナ名。パス先頭に付いていれば除去する。
pub const LEGACY_CONTAINER_NAMES: &[&str] = &["images", "videos", "user-uploads", "media"];

// ---------------------------------------------------------------------------
// ResolverConfig
// ---------------------------------------------------------------------------

/// 解決レイヤー全体の設定。
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    pub limiter_capacity: usize,
    pub batch_chunk_size: usize,
    pub safety_margin_secs: u64,
    pub sweep_interval: Duration,
    pub constrained_min_ttl_secs: u64,
    pub session_wait: Duration,
    pub provider_timeout: Duration,
    pub provider_retries: u32,
    pub prefetch_margin: f64,
    pub default_ttl_secs: u64,
    /// プレフィックス除去対象の追加コンテナ名（対象コンテナ自身は常に含まれる）
    pub known_containers: Vec<String>,
    /// コンテナ未指定の削除（全コンテナのパス一致）を許可するか
    pub allow_suffix_eviction: bool,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            limiter_capacity: DEFAULT_LIMITER_CAPACITY,
            batch_chunk_size: DEFAULT_BATCH_CHUNK_SIZE,
            safety_margin_secs: DEFAULT_SAFETY_MARGIN_SECS,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            constrained_min_ttl_secs: CONSTRAINED_CLIENT_MIN_TTL_SECS,
            session_wait: DEFAULT_SESSION_WAIT,
            provider_timeout: DEFAULT_PROVIDER_TIMEOUT,
            provider_retries: DEFAULT_PROVIDER_RETRIES,
            prefetch_margin: DEFAULT_PREFETCH_MARGIN,
            default_ttl_secs: DEFAULT_TTL_SECS,
            known_containers: LEGACY_CONTAINER_NAMES
                .iter()
                .map(|name| name.to_string())
                .collect(),
            allow_suffix_eviction: false,
        }
    }
}

impl ResolverConfig {
    pub fn with_limiter_capacity(mut self, capacity: usize) -> Self {
        self.limiter_capacity = capacity.max(1);
        self
    }

    pub fn with_batch_chunk_size(mut self, size: usize) -> Self {
        self.batch_chunk_size = size.max(1);
        self
    }

    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    pub fn with_session_wait(mut self, wait: Duration) -> Self {
        self.session_wait = wait;
        self
    }

    /// プロバイダ呼び出しのタイムアウトと再試行回数を設定する。
    pub fn with_provider_timeout(mut self, timeout: Duration, retries: u32) -> Self {
        self.provider_timeout = timeout;
        self.provider_retries = retries;
        self
    }

    pub fn with_prefetch_margin(mut self, margin: f64) -> Self {
        self.prefetch_margin = margin;
        self
    }

    pub fn with_default_ttl(mut self, ttl_secs: u64) -> Self {
        self.default_ttl_secs = ttl_secs;
        self
    }

    /// プレフィックス除去対象のコンテナ名を追加する。
    pub fn with_known_containers<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for name in names {
            let name = name.into();
            if !self.known_containers.contains(&name) {
                self.known_containers.push(name);
            }
        }
        self
    }

    pub fn with_suffix_eviction(mut self, allow: bool) -> Self {
        self.allow_suffix_eviction = allow;
        self
    }

    /// 制約付きクライアントの下限を適用した、プロバイダへ要求する有効期限（秒）。
    pub fn effective_ttl_secs(&self, ttl_secs: u64, constrained_client: bool) -> u64 {
        if constrained_client {
            ttl_secs.max(self.constrained_min_ttl_secs)
        } else {
            ttl_secs
        }
    }
}
