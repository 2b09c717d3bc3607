//! # 認証セッション
//!
//! IDプロバイダが公開するセッションと、その準備完了シグナル。
//! プロバイダは `tokio::sync::watch` チャネルでセッションを発行し、
//! 解決レイヤーは上限付きでその発行を待つ（タイマーによるポーリングはしない）。

use std::fmt;
use std::time::Duration;

use tokio::sync::watch;

/// 認証済みセッション。
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    /// ユーザー識別子
    pub user_id: String,
    /// プロバイダ呼び出しに付与するアクセストークン
    pub access_token: String,
}

impl Session {
    pub fn new(user_id: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            access_token: access_token.into(),
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("user_id", &self.user_id)
            .field("access_token", &"<redacted>")
            .finish()
    }
}

/// IDプロバイダの抽象インターフェース。
#[async_trait::async_trait]
pub trait SessionProvider: Send + Sync {
    /// 現在のセッション。未ログインなら `None`。
    fn current_session(&self) -> Option<Session>;

    /// セッションが利用可能になるまで最大 `wait` だけ待つ。
    /// 期限内に得られなければ `None`。
    async fn ready(&self, wait: Duration) -> Option<Session>;
}

/// セッションを発行する側のハンドル。
#[derive(Debug)]
pub struct SessionPublisher {
    tx: watch::Sender<Option<Session>>,
}

impl SessionPublisher {
    /// セッションを発行し、待機中の解決処理を再開させる。
    pub fn publish(&self, session: Session) {
        self.tx.send_replace(Some(session));
    }

    /// ログアウト等でセッションを取り消す。
    pub fn clear(&self) {
        self.tx.send_replace(None);
    }
}

/// `watch` チャネルで準備完了を受け取るセッションプロバイダ。
#[derive(Debug, Clone)]
pub struct WatchSessionProvider {
    rx: watch::Receiver<Option<Session>>,
}

/// 発行側と購読側のペアを作る。
pub fn session_channel(initial: Option<Session>) -> (SessionPublisher, WatchSessionProvider) {
    let (tx, rx) = watch::channel(initial);
    (SessionPublisher { tx }, WatchSessionProvider { rx })
}

#[async_trait::async_trait]
impl SessionProvider for WatchSessionProvider {
    fn current_session(&self) -> Option<Session> {
        self.rx.borrow().clone()
    }

    async fn ready(&self, wait: Duration) -> Option<Session> {
        let mut rx = self.rx.clone();
        let waited = tokio::time::timeout(wait, rx.wait_for(Option::is_some)).await;
        match waited {
            Ok(Ok(session)) => Option::clone(&session),
            // 期限切れ、または発行側が消えて以後セッションが来ない
            _ => None,
        }
    }
}
