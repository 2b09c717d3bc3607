//! # Media Vault URL解決レイヤー
//!
//! ストレージ参照（コンテナ + パス）を短命な署名付きURLへ変換し、キャッシュする。
//!
//! ## 構成
//! - `cache`: 期限付きURLキャッシュ（安全マージン・一括投入・定期掃除）
//! - `limiter`: プロバイダ呼び出しの同時実行制限（FIFO）
//! - `normalize`: コンテナ名プレフィックス除去と絶対URL判定
//! - `session`: IDプロバイダのセッションと準備完了シグナル
//! - `signer`: 認可プロバイダ（URL署名）の抽象インターフェース
//! - `service`: 単体・バッチ解決の統括（キャッシュ → 合流 → リミッター → 書き込み）
//! - `visibility`: 表示アイテムの可視性に応じた遅延解決

pub mod cache;
pub mod config;
pub mod error;
pub mod limiter;
pub mod normalize;
pub mod service;
pub mod session;
pub mod signer;
pub mod visibility;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use cache::{CacheEntry, ExpiringCache};
pub use config::ResolverConfig;
pub use error::ResolveError;
pub use limiter::ConcurrencyLimiter;
pub use normalize::{NormalizedPath, PathNormalizer};
pub use service::ResolutionService;
pub use session::{session_channel, Session, SessionProvider, SessionPublisher, WatchSessionProvider};
pub use signer::{SignedUrl, UrlSigner};
pub use visibility::{
    ItemState, ManualVisibilitySource, PreloadSummary, VisibilityEvent, VisibilityRecord,
    VisibilityScheduler, VisibilitySink, VisibilitySource,
};
