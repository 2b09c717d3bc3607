//! # 解決エラー型
//!
//! 全コンポーネントで共通のエラー型。
//! 重複排除された待機者全員へ同じ失敗を配るため `Clone` を実装する。

/// URL解決エラー型。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    /// 待機期限内にセッションが得られなかった（プロバイダは呼ばれない）
    #[error("認証セッションが利用できません: {0}")]
    Authentication(String),
    /// プロバイダが拒否した、またはURLを返さなかった
    #[error("URL解決に失敗: {0}")]
    Resolution(String),
    /// 空または不正なパス（呼び出し側の不具合。再試行しない）
    #[error("不正なパス: {0}")]
    Normalization(String),
    /// プロバイダ呼び出しがタイムアウトした（再試行後）
    #[error("プロバイダ呼び出しがタイムアウトしました（{timeout_secs}秒 × {attempts}回）")]
    Timeout { timeout_secs: u64, attempts: u32 },
    /// コンテナ未指定の削除要求（設定で許可されていない）
    #[error("コンテナ未指定の削除は許可されていません: {0}")]
    AmbiguousEviction(String),
    /// 未登録の表示アイテム
    #[error("未登録のアイテムです: {0}")]
    NotRegistered(String),
}
