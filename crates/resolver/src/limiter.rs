//! # プロバイダ呼び出しの同時実行制限
//!
//! 同時実行数に上限を持つFIFO公平な実行器。
//! `tokio::sync::Semaphore` の待機キューは到着順であり、これを許可の払い出し順とする。
//!
//! - 空きがあれば即座に実行、なければ待機キューに入る
//! - タスク完了時（成功・失敗を問わず）に次の待機タスクを受け入れる
//! - 優先度・受け入れ後のキャンセルはない

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::Semaphore;

use crate::error::ResolveError;

/// 同時実行数制限付きの実行器。`Clone` は同じ上限を共有する。
#[derive(Debug, Clone)]
pub struct ConcurrencyLimiter {
    semaphore: Arc<Semaphore>,
    capacity: usize,
    queued: Arc<AtomicUsize>,
}

/// 待機数カウンタを確実に戻すためのガード。
struct QueuedGuard<'a>(&'a AtomicUsize);

impl Drop for QueuedGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl ConcurrencyLimiter {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
            queued: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// 許可を得てからタスクを実行し、その結果を返す。
    ///
    /// 許可はタスクの完了まで保持され、完了時に次の待機者へ渡る。
    pub async fn execute<F, T>(&self, task: F) -> Result<T, ResolveError>
    where
        F: Future<Output = T>,
    {
        let permit = {
            self.queued.fetch_add(1, Ordering::SeqCst);
            let _queued = QueuedGuard(&self.queued);
            self.semaphore.acquire().await
        };
        let _permit = permit
            .map_err(|_| ResolveError::Resolution("同時実行リミッターが閉じられています".to_string()))?;
        Ok(task.await)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// 実行中のタスク数。
    pub fn running(&self) -> usize {
        self.capacity.saturating_sub(self.semaphore.available_permits())
    }

    /// 許可待ちのタスク数。
    pub fn queued(&self) -> usize {
        self.queued.load(Ordering::SeqCst)
    }
}
