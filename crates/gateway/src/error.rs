//! # Gateway エラー型
//!
//! 全エンドポイントで共通のエラー型。解決エラーはHTTPステータスへ変換する。

use axum::http::StatusCode;
use vault_resolver::ResolveError;

/// Gatewayエラー型。
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// 認証セッションが利用できない
    #[error("認証に失敗: {0}")]
    Unauthorized(String),
    /// 不正なリクエスト（空パス、上限超過等）
    #[error("不正なリクエスト: {0}")]
    BadRequest(String),
    /// 認可プロバイダの拒否・タイムアウト
    #[error("認可プロバイダの呼び出しに失敗: {0}")]
    Upstream(String),
    /// 対象が存在しない
    #[error("見つかりません: {0}")]
    NotFound(String),
}

impl From<ResolveError> for GatewayError {
    fn from(e: ResolveError) -> Self {
        match e {
            ResolveError::Authentication(_) => GatewayError::Unauthorized(e.to_string()),
            ResolveError::Normalization(_) | ResolveError::AmbiguousEviction(_) => {
                GatewayError::BadRequest(e.to_string())
            }
            ResolveError::Resolution(_) | ResolveError::Timeout { .. } => {
                GatewayError::Upstream(e.to_string())
            }
            ResolveError::NotRegistered(_) => GatewayError::NotFound(e.to_string()),
        }
    }
}

impl axum::response::IntoResponse for GatewayError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            GatewayError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            GatewayError::BadRequest(_) => StatusCode::BAD_REQUEST,
            GatewayError::Upstream(_) => StatusCode::BAD_GATEWAY,
            GatewayError::NotFound(_) => StatusCode::NOT_FOUND,
        };
        (status, self.to_string()).into_response()
    }
}
