//! # 期限付きURLキャッシュ
//!
//! (container, path) → (署名付きURL, 有効期限) のキャッシュ。
//!
//! ## 有効期限
//! `expires_at = now + ttl - margin`。実際のURL失効より少し前に古いとみなす。
//! TTLがマージン以下の場合はマージンをTTLの半分に縮め、`expires_at` が
//! `now` より前にならないようにする。
//!
//! ## 削除経路
//! - `evict` / `evict_path`: 明示的な削除
//! - `sweep`: 定期掃除（アクセス有無に関係なく実行）
//! - `get`: 期限切れエントリを見つけた場合はその場で削除する

use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;
use vault_types::StorageReference;

/// キャッシュエントリ。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    /// 署名付きURL
    pub url: String,
    /// このエントリを古いとみなす時刻（安全マージン適用済み）
    pub expires_at: Instant,
}

impl CacheEntry {
    /// `now < expires_at` の間だけ有効。
    pub fn is_fresh(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// 期限付きURLキャッシュ。
///
/// キーのpathは正規化済みであること。複数タスクから同時に参照される。
#[derive(Debug)]
pub struct ExpiringCache {
    entries: DashMap<StorageReference, CacheEntry>,
    safety_margin: Duration,
}

impl ExpiringCache {
    pub fn new(safety_margin_secs: u64) -> Self {
        Self {
            entries: DashMap::new(),
            safety_margin: Duration::from_secs(safety_margin_secs),
        }
    }

    /// TTLから安全マージンを差し引いた有効期限を計算する。
    fn expiry_from(&self, now: Instant, ttl_secs: u64) -> Instant {
        let ttl = Duration::from_secs(ttl_secs);
        let lifetime = if ttl > self.safety_margin {
            ttl - self.safety_margin
        } else {
            ttl / 2
        };
        now + lifetime
    }

    /// 有効なエントリを返す。期限切れはミス扱いとし、その場で削除する。
    pub fn get(&self, key: &StorageReference) -> Option<CacheEntry> {
        let now = Instant::now();
        let stale = match self.entries.get(key) {
            Some(entry) if entry.is_fresh(now) => return Some(entry.clone()),
            Some(_) => true,
            None => false,
        };
        if stale {
            self.entries.remove_if(key, |_, entry| !entry.is_fresh(now));
        }
        None
    }

    /// 署名付きURLを格納する。既存エントリは置き換えられる。
    pub fn set(&self, key: StorageReference, url: String, ttl_secs: u64) {
        let expires_at = self.expiry_from(Instant::now(), ttl_secs);
        self.entries.insert(key, CacheEntry { url, expires_at });
    }

    /// 解決済みエントリを一括投入する。投入件数を返す。
    ///
    /// 各エントリの有効期限は同一の `now` を基準に計算する。
    pub fn prime<I>(&self, entries: I) -> usize
    where
        I: IntoIterator<Item = (StorageReference, String, u64)>,
    {
        let now = Instant::now();
        let mut count = 0;
        for (key, url, ttl_secs) in entries {
            let expires_at = self.expiry_from(now, ttl_secs);
            self.entries.insert(key, CacheEntry { url, expires_at });
            count += 1;
        }
        count
    }

    /// キー完全一致で1件削除する。
    pub fn evict(&self, key: &StorageReference) -> bool {
        self.entries.remove(key).is_some()
    }

    /// 全コンテナから、正規化済みパスが `path` と一致するエントリを削除する。削除件数を返す。
    ///
    /// 異なるコンテナに同じパスがある場合はすべて消える。`dir/{path}` のような
    /// 末尾一致のパスは対象外。
    pub fn evict_path(&self, path: &str) -> usize {
        let before = self.entries.len();
        self.entries.retain(|key, _| key.path != path);
        before.saturating_sub(self.entries.len())
    }

    /// 期限切れ（`expires_at <= now`）のエントリをすべて削除する。削除件数を返す。
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_fresh(now));
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            tracing::debug!(removed, remaining = self.entries.len(), "期限切れキャッシュを掃除");
        }
        removed
    }

    /// 期限切れ未掃除分を含むエントリ数。
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 期限を問わずキーが存在するか。
    pub fn contains(&self, key: &StorageReference) -> bool {
        self.entries.contains_key(key)
    }
}
