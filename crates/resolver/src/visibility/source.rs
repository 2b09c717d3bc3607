//! 可視性ソースの抽象化。
//!
//! UIランタイム固有の交差監視を、enter/exitコールバックを持つ汎用インターフェースに置き換える。
//! 表示面を持たないハーネスでも合成イベントで駆動できる。

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::mpsc;

/// 可視性イベント。
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VisibilityEvent {
    /// 表示領域への接近・進入。`distance` は表示領域の端までの距離（0以下は表示中）
    Enter { distance: f64 },
    /// 表示領域からの退出
    Exit,
}

/// ソースがイベントを通知する先。`Clone` 可能。
#[derive(Debug, Clone)]
pub struct VisibilitySink {
    tx: mpsc::UnboundedSender<VisibilityEvent>,
}

impl VisibilitySink {
    pub(crate) fn new(tx: mpsc::UnboundedSender<VisibilityEvent>) -> Self {
        Self { tx }
    }

    /// 表示領域への接近を通知する。監視が終了していれば `false`。
    pub fn entered(&self, distance: f64) -> bool {
        self.tx.send(VisibilityEvent::Enter { distance }).is_ok()
    }

    /// 表示領域からの退出を通知する。監視が終了していれば `false`。
    pub fn exited(&self) -> bool {
        self.tx.send(VisibilityEvent::Exit).is_ok()
    }

    /// 監視が終了したか（登録解除・置き換え済み）。
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// 可視性ソース。登録時に通知先を受け取り、以後イベントを送る。
pub trait VisibilitySource: Send + 'static {
    fn attach(self, sink: VisibilitySink);
}

/// 任意のクロージャをソースとして使える。
impl<F> VisibilitySource for F
where
    F: FnOnce(VisibilitySink) + Send + 'static,
{
    fn attach(self, sink: VisibilitySink) {
        self(sink)
    }
}

/// 手動でイベントを発生させるソース。表示面のないハーネスやテストで使う。
#[derive(Debug, Clone, Default)]
pub struct ManualVisibilitySource {
    sink: Arc<Mutex<Option<VisibilitySink>>>,
}

impl ManualVisibilitySource {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_sink(&self, f: impl FnOnce(&VisibilitySink) -> bool) -> bool {
        let guard = self.sink.lock().unwrap_or_else(PoisonError::into_inner);
        guard.as_ref().is_some_and(f)
    }

    /// 表示領域への接近を発生させる。
    pub fn enter(&self, distance: f64) -> bool {
        self.with_sink(|sink| sink.entered(distance))
    }

    /// 表示領域からの退出を発生させる。
    pub fn exit(&self) -> bool {
        self.with_sink(VisibilitySink::exited)
    }
}

impl VisibilitySource for ManualVisibilitySource {
    fn attach(self, sink: VisibilitySink) {
        let mut guard = self.sink.lock().unwrap_or_else(PoisonError::into_inner);
        *guard = Some(sink);
    }
}
