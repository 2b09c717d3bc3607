//! # 可視性駆動の遅延解決
//!
//! 表示アイテムごとに可視性を監視し、表示領域に近づいたときに初めてURLを解決する。
//!
//! ## 状態遷移
//! `Unresolved → Resolving → {Resolved | Errored}`
//!
//! - 進入（プリフェッチ距離内）: `visible = true`。`Unresolved` なら解決を開始
//! - 退出: `visible = false`。状態・解決済みURLは変更しない
//! - `Errored` から再度解決するのは `force_resolve` のみ
//!
//! 解決中に進入・退出を繰り返しても解決は1回しか起動しない。

mod source;


pub use source::{ManualVisibilitySource, VisibilityEvent, VisibilitySink, VisibilitySource};

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use vault_types::{AssetRef, ContainerTable, ResolutionOptions, StorageReference};

use crate::error::ResolveError;
use crate::service::ResolutionService;

/// 表示アイテムの解決状態。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemState {
    Unresolved,
    Resolving,
    Resolved,
    Errored,
}

/// 表示アイテムごとの可視性と解決状態。
#[derive(Debug, Clone, PartialEq)]
pub struct VisibilityRecord {
    pub id: String,
    pub visible: bool,
    pub state: ItemState,
    /// 解決済みURL
    pub url: Option<String>,
    /// 直近の解決失敗
    pub error: Option<ResolveError>,
}

impl VisibilityRecord {
    fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            visible: false,
            state: ItemState::Unresolved,
            url: None,
            error: None,
        }
    }
}

/// `preload_next` の結果。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PreloadSummary {
    /// 解決を開始したアイテム数
    pub started: usize,
    pub resolved: usize,
    pub failed: usize,
}

struct ItemSlot {
    record: VisibilityRecord,
    reference: StorageReference,
    /// 登録ごとに増える世代番号。置き換え前の解決結果を捨てるのに使う。登録順も兼ねる
    generation: u64,
    observer: Option<JoinHandle<()>>,
}

struct SchedulerInner {
    service: ResolutionService,
    options: ResolutionOptions,
    prefetch_margin: f64,
    items: DashMap<String, ItemSlot>,
    next_generation: AtomicU64,
}

/// 可視性に応じて解決を起動するスケジューラ。`Clone` は同じアイテム表を共有する。
#[derive(Clone)]
pub struct VisibilityScheduler {
    inner: Arc<SchedulerInner>,
}

impl VisibilityScheduler {
    /// サービス設定のプリフェッチ距離と既定TTLで構築する。
    pub fn new(service: ResolutionService) -> Self {
        let options = service.default_options();
        Self::with_options(service, options)
    }

    pub fn with_options(service: ResolutionService, options: ResolutionOptions) -> Self {
        let prefetch_margin = service.config().prefetch_margin;
        Self {
            inner: Arc::new(SchedulerInner {
                service,
                options,
                prefetch_margin,
                items: DashMap::new(),
                next_generation: AtomicU64::new(0),
            }),
        }
    }

    /// アイテムを登録し、ソースの監視を開始する。
    ///
    /// 同じidの登録が既にあれば解除してから登録し直す（状態は `Unresolved` に戻る）。
    pub fn register<S>(&self, id: impl Into<String>, reference: StorageReference, source: S)
    where
        S: VisibilitySource,
    {
        let id = id.into();
        self.unregister(&id);

        let generation = self.inner.next_generation.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = mpsc::unbounded_channel();
        let observer = tokio::spawn(observe(
            Arc::downgrade(&self.inner),
            id.clone(),
            generation,
            rx,
        ));

        self.inner.items.insert(
            id.clone(),
            ItemSlot {
                record: VisibilityRecord::new(&id),
                reference,
                generation,
                observer: Some(observer),
            },
        );
        tracing::debug!(id = %id, generation, "表示アイテムを登録");

        source.attach(VisibilitySink::new(tx));
    }

    /// アセット種別付きのアイテムを登録する。コンテナは対応表から決まる。
    pub fn register_asset<S>(
        &self,
        id: impl Into<String>,
        asset: &AssetRef,
        containers: &ContainerTable,
        source: S,
    ) where
        S: VisibilitySource,
    {
        self.register(id, asset.to_reference(containers), source);
    }

    /// 登録を解除し監視を止める。解決中の処理は継続し、結果はキャッシュされる。
    pub fn unregister(&self, id: &str) -> bool {
        match self.inner.items.remove(id) {
            Some((_, slot)) => {
                if let Some(observer) = slot.observer {
                    observer.abort();
                }
                true
            }
            None => false,
        }
    }

    /// アイテムの現在の記録。
    pub fn record(&self, id: &str) -> Option<VisibilityRecord> {
        self.inner.items.get(id).map(|slot| slot.record.clone())
    }

    /// 登録順の全記録。
    pub fn records(&self) -> Vec<VisibilityRecord> {
        let mut slots: Vec<(u64, VisibilityRecord)> = self
            .inner
            .items
            .iter()
            .map(|slot| (slot.generation, slot.record.clone()))
            .collect();
        slots.sort_by_key(|(generation, _)| *generation);
        slots.into_iter().map(|(_, record)| record).collect()
    }

    pub fn len(&self) -> usize {
        self.inner.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.items.is_empty()
    }

    /// 可視性に関係なく解決する（プレビュー表示等の明示操作用）。
    ///
    /// 失敗は呼び出し側に返す（ユーザーへの通知は呼び出し側の責務）。
    pub async fn force_resolve(&self, id: &str) -> Result<String, ResolveError> {
        let (reference, generation) = {
            let mut slot = self
                .inner
                .items
                .get_mut(id)
                .ok_or_else(|| ResolveError::NotRegistered(id.to_string()))?;
            slot.record.state = ItemState::Resolving;
            (slot.reference.clone(), slot.generation)
        };

        self.spawn_resolution(id.to_string(), generation, reference)
            .await
            .unwrap_or_else(|e| {
                Err(ResolveError::Resolution(format!(
                    "解決タスクが異常終了しました: {e}"
                )))
            })
    }

    /// 未解決のアイテムを登録順に最大 `count` 件まとめて解決する。
    ///
    /// 個々の失敗はそのアイテムを `Errored` にするだけで、他の解決は続行する。
    pub async fn preload_next(&self, count: usize) -> PreloadSummary {
        let mut candidates: Vec<(u64, String)> = self
            .inner
            .items
            .iter()
            .filter(|slot| slot.record.state == ItemState::Unresolved)
            .map(|slot| (slot.generation, slot.key().clone()))
            .collect();
        candidates.sort_by_key(|(generation, _)| *generation);

        let mut handles = Vec::new();
        for (_, id) in candidates.into_iter().take(count) {
            if let Some((generation, reference)) = self.begin_resolving(&id) {
                handles.push(self.spawn_resolution(id, generation, reference));
            }
        }

        let mut summary = PreloadSummary {
            started: handles.len(),
            ..PreloadSummary::default()
        };
        for handle in handles {
            match handle.await {
                Ok(Ok(_)) => summary.resolved += 1,
                _ => summary.failed += 1,
            }
        }
        tracing::debug!(
            started = summary.started,
            resolved = summary.resolved,
            failed = summary.failed,
            "先読み解決完了"
        );
        summary
    }

    // -----------------------------------------------------------------------
    // 内部処理
    // -----------------------------------------------------------------------

    /// `Unresolved` のアイテムを `Resolving` に遷移させる。遷移した場合のみ解決対象を返す。
    fn begin_resolving(&self, id: &str) -> Option<(u64, StorageReference)> {
        let mut slot = self.inner.items.get_mut(id)?;
        if slot.record.state != ItemState::Unresolved {
            return None;
        }
        slot.record.state = ItemState::Resolving;
        Some((slot.generation, slot.reference.clone()))
    }

    fn on_enter(&self, id: &str, generation: u64, distance: f64) {
        if distance > self.inner.prefetch_margin {
            self.set_visible(id, generation, false);
            return;
        }
        if !self.set_visible(id, generation, true) {
            return;
        }
        if let Some((generation, reference)) = self.begin_resolving(id) {
            tracing::debug!(id, distance, "表示領域に接近したため解決を開始");
            drop(self.spawn_resolution(id.to_string(), generation, reference));
        }
    }

    /// 同じ世代のアイテムの可視フラグを更新する。更新できた場合 `true`。
    fn set_visible(&self, id: &str, generation: u64, visible: bool) -> bool {
        match self.inner.items.get_mut(id) {
            Some(mut slot) if slot.generation == generation => {
                slot.record.visible = visible;
                true
            }
            _ => false,
        }
    }

    /// 解決を独立タスクで実行し、完了時に状態を遷移させる。
    fn spawn_resolution(
        &self,
        id: String,
        generation: u64,
        reference: StorageReference,
    ) -> JoinHandle<Result<String, ResolveError>> {
        let this = self.clone();
        tokio::spawn(async move {
            let outcome = this
                .inner
                .service
                .resolve_reference(&reference, this.inner.options)
                .await;
            this.finish(&id, generation, &outcome);
            outcome
        })
    }

    fn finish(&self, id: &str, generation: u64, outcome: &Result<String, ResolveError>) {
        let Some(mut slot) = self.inner.items.get_mut(id) else {
            return;
        };
        if slot.generation != generation {
            return;
        }
        match outcome {
            Ok(url) => {
                slot.record.state = ItemState::Resolved;
                slot.record.url = Some(url.clone());
                slot.record.error = None;
            }
            Err(e) => {
                tracing::warn!(id, reference = %slot.reference, error = %e, "表示アイテムのURL解決に失敗");
                slot.record.state = ItemState::Errored;
                slot.record.error = Some(e.clone());
            }
        }
    }
}

/// ソースからのイベントを処理し続ける。スケジューラが破棄されるか全通知先が消えると終了。
async fn observe(
    scheduler: Weak<SchedulerInner>,
    id: String,
    generation: u64,
    mut events: mpsc::UnboundedReceiver<VisibilityEvent>,
) {
    while let Some(event) = events.recv().await {
        let Some(inner) = scheduler.upgrade() else {
            break;
        };
        let scheduler = VisibilityScheduler { inner };
        match event {
            VisibilityEvent::Enter { distance } => scheduler.on_enter(&id, generation, distance),
            VisibilityEvent::Exit => {
                scheduler.set_visible(&id, generation, false);
            }
        }
    }
}
