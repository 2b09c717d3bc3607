//! 解決中リクエストの合流（single-flight）。
//!
//! キーごとに高々1つの解決処理のみが走り、後続の呼び出しは同じ結果を待つ。

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::watch;
use vault_types::StorageReference;

use crate::error::ResolveError;

/// 1回の解決処理の結果。
pub(crate) type Outcome = Result<String, ResolveError>;

type OutcomeReceiver = watch::Receiver<Option<Outcome>>;

/// `acquire` の結果。
pub(crate) enum Slot {
    /// 登録直前の再確認でキャッシュに見つかった
    Cached(String),
    /// 自分が解決処理を実行する
    Leader {
        tx: watch::Sender<Option<Outcome>>,
        rx: OutcomeReceiver,
    },
    /// 他の解決処理に合流する
    Follower(OutcomeReceiver),
}

/// キー → 解決中の結果チャネル。
#[derive(Debug, Default)]
pub(crate) struct PendingRequests {
    in_flight: DashMap<StorageReference, OutcomeReceiver>,
}

impl PendingRequests {
    /// 解決処理の枠を原子的に取得する。
    ///
    /// 空きの場合、登録前に `recheck` でキャッシュを再確認する。先行する解決が
    /// キャッシュ書き込み後に枠を外した直後でも、重複したプロバイダ呼び出しにならない。
    pub(crate) fn acquire<F>(&self, key: &StorageReference, recheck: F) -> Slot
    where
        F: FnOnce() -> Option<String>,
    {
        match self.in_flight.entry(key.clone()) {
            Entry::Occupied(entry) => Slot::Follower(entry.get().clone()),
            Entry::Vacant(entry) => {
                if let Some(url) = recheck() {
                    return Slot::Cached(url);
                }
                let (tx, rx) = watch::channel(None);
                entry.insert(rx.clone());
                Slot::Leader { tx, rx }
            }
        }
    }

    pub(crate) fn complete(&self, key: &StorageReference) {
        self.in_flight.remove(key);
    }

    pub(crate) fn len(&self) -> usize {
        self.in_flight.len()
    }
}

/// 解決処理が異常終了しても枠を必ず外すガード。
pub(crate) struct PendingGuard<'a> {
    pending: &'a PendingRequests,
    key: &'a StorageReference,
    completed: bool,
}

impl<'a> PendingGuard<'a> {
    pub(crate) fn new(pending: &'a PendingRequests, key: &'a StorageReference) -> Self {
        Self {
            pending,
            key,
            completed: false,
        }
    }

    pub(crate) fn complete(mut self) {
        self.pending.complete(self.key);
        self.completed = true;
    }
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        if !self.completed {
            self.pending.complete(self.key);
        }
    }
}

/// 解決処理の結果を待つ。送信側が結果なしで消えた場合はエラー。
pub(crate) async fn wait_outcome(mut rx: OutcomeReceiver) -> Outcome {
    let outcome = match rx.wait_for(Option::is_some).await {
        Ok(value) => Option::clone(&value),
        Err(_) => None,
    };
    outcome.unwrap_or_else(|| {
        Err(ResolveError::Resolution(
            "解決処理が結果を返さずに終了しました".to_string(),
        ))
    })
}
