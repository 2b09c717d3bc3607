//! # 認可プロバイダ（URL署名）
//!
//! ストレージ参照に対して期限付きURLを発行するバックエンドの抽象インターフェース。
//! S3互換ストレージやストレージAPI等の実装は利用側（Gateway）が選択する。

use crate::error::ResolveError;
use crate::session::Session;

/// 署名付きURLの発行結果。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedUrl {
    /// 署名付きURL
    pub url: String,
}

/// 認可プロバイダの抽象インターフェース。
///
/// 同時実行リミッターの上限数までの並行呼び出しに耐えること。
#[async_trait::async_trait]
pub trait UrlSigner: Send + Sync {
    /// `container` 内の `path`（正規化済み）に対し、`ttl_secs` 秒有効なURLを発行する。
    async fn sign(
        &self,
        session: &Session,
        container: &str,
        path: &str,
        ttl_secs: u64,
    ) -> Result<SignedUrl, ResolveError>;
}
