//! # Gatewayエンドポイント
//!
//! - `POST /resolve`: 単体解決
//! - `POST /resolve-batch`: バッチ解決（失敗分は結果から除外）
//! - `POST /prime`, `POST /evict`, `POST /cleanup`: キャッシュ操作
//! - `GET /health`: キャッシュ・リミッターの状態

pub mod batch;
pub mod cache;
pub mod health;
pub mod resolve;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use batch::handle_resolve_batch;
pub use cache::{handle_cleanup, handle_evict, handle_prime};
pub use health::handle_health;
pub use resolve::handle_resolve;
