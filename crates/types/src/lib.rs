//! # Media Vault 共有型定義
//!
//! ストレージ参照、アセット種別、解決オプション、およびGateway HTTP APIの
//! リクエスト/レスポンス構造体をRust構造体として提供する。
//!
//! ## キー表現
//! - ストレージ参照のキー文字列は `"{container}:{path}"`
//! - pathは正規化済み（コンテナ名プレフィックス除去後）であることが前提

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// ストレージ参照
// ---------------------------------------------------------------------------

/// コンテナとパスの組で表される論理的なストレージ参照。
///
/// 等価性は `(container, path)` で判定される。キャッシュキーとして使う場合、
/// pathは正規化済みでなければならない。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StorageReference {
    /// コンテナ名（バケット名）
    pub container: String,
    /// コンテナ内の相対パス
    pub path: String,
}

impl StorageReference {
    pub fn new(container: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            container: container.into(),
            path: path.into(),
        }
    }
}

impl fmt::Display for StorageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.container, self.path)
    }
}

// ---------------------------------------------------------------------------
// アセット種別とコンテナ対応表
// ---------------------------------------------------------------------------

/// アセット種別。種別ごとに格納先コンテナが決まる。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetKind {
    /// 生成画像
    Image,
    /// 生成動画
    Video,
    /// 動画サムネイル
    VideoThumbnail,
    /// キャラクターのアバター画像
    CharacterAvatar,
    /// ワークスペース上の一時ファイル
    WorkspaceTemp,
}

impl AssetKind {
    /// 全アセット種別
    pub const ALL: [AssetKind; 5] = [
        AssetKind::Image,
        AssetKind::Video,
        AssetKind::VideoThumbnail,
        AssetKind::CharacterAvatar,
        AssetKind::WorkspaceTemp,
    ];

    /// 既定の格納先コンテナ名を返す。
    pub fn default_container(self) -> &'static str {
        match self {
            AssetKind::Image => "generated-images",
            AssetKind::Video => "generated-videos",
            AssetKind::VideoThumbnail => "video-thumbnails",
            AssetKind::CharacterAvatar => "character-avatars",
            AssetKind::WorkspaceTemp => "workspace-temp",
        }
    }
}

/// アセット種別 → コンテナ名の対応表。
///
/// 既定値は [`AssetKind::default_container`]。運用環境ごとに
/// `with_container` で上書きできる。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerTable {
    containers: HashMap<AssetKind, String>,
}

impl Default for ContainerTable {
    fn default() -> Self {
        let containers = AssetKind::ALL
            .iter()
            .map(|kind| (*kind, kind.default_container().to_string()))
            .collect();
        Self { containers }
    }
}

impl ContainerTable {
    /// 指定種別のコンテナ名を上書きする。
    pub fn with_container(mut self, kind: AssetKind, container: impl Into<String>) -> Self {
        self.containers.insert(kind, container.into());
        self
    }

    /// 指定種別のコンテナ名を返す。
    pub fn container_for(&self, kind: AssetKind) -> &str {
        self.containers
            .get(&kind)
            .map(String::as_str)
            .unwrap_or_else(|| kind.default_container())
    }

    /// 登録済みの全コンテナ名（重複なし、種別順）。
    pub fn container_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for kind in AssetKind::ALL {
            let name = self.container_for(kind).to_string();
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }
}

/// アセット種別付きのパス。表示アイテムが保持するストレージ情報。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssetRef {
    /// アセット種別
    pub kind: AssetKind,
    /// コンテナ内パス、または絶対URL
    pub path: String,
}

impl AssetRef {
    pub fn new(kind: AssetKind, path: impl Into<String>) -> Self {
        Self {
            kind,
            path: path.into(),
        }
    }

    /// 対応表を引いてストレージ参照に変換する。
    pub fn to_reference(&self, table: &ContainerTable) -> StorageReference {
        StorageReference::new(table.container_for(self.kind), self.path.clone())
    }
}

// ---------------------------------------------------------------------------
// 解決オプション
// ---------------------------------------------------------------------------

/// 署名付きURLの既定有効期限（秒）: 1時間
pub const DEFAULT_TTL_SECS: u64 = 3600;

fn default_ttl_secs() -> u64 {
    DEFAULT_TTL_SECS
}

/// URL解決オプション。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionOptions {
    /// 要求する有効期限（秒）
    #[serde(default = "default_ttl_secs")]
    pub ttl_seconds: u64,
    /// モバイル等の制約付きクライアントか。trueの場合、有効期限に下限が適用される。
    #[serde(default)]
    pub constrained_client: bool,
}

impl Default for ResolutionOptions {
    fn default() -> Self {
        Self {
            ttl_seconds: DEFAULT_TTL_SECS,
            constrained_client: false,
        }
    }
}

impl ResolutionOptions {
    pub fn with_ttl(mut self, ttl_seconds: u64) -> Self {
        self.ttl_seconds = ttl_seconds;
        self
    }

    pub fn constrained(mut self, constrained_client: bool) -> Self {
        self.constrained_client = constrained_client;
        self
    }
}

/// 解決済みのエントリ。バッチ応答が有効期限付きで返した結果をキャッシュへ投入する際に使う。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrimedEntry {
    /// コンテナ名
    pub container: String,
    /// コンテナ内パス（プレフィックス付きでも可）
    pub path: String,
    /// 署名付きURL
    pub url: String,
    /// 署名付きURLの残り有効期限（秒）
    pub expires_in_secs: u64,
}

// ---------------------------------------------------------------------------
// POST /resolve
// ---------------------------------------------------------------------------

/// /resolve リクエスト。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolveRequest {
    /// コンテナ内パス、または絶対URL
    pub path: String,
    /// コンテナ名
    pub container: String,
    /// 解決オプション（省略時は既定値）
    #[serde(default)]
    pub options: Option<ResolutionOptions>,
}

/// /resolve レスポンス。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolveResponse {
    /// 署名付きURL（絶対URL入力の場合は入力そのまま）
    pub url: String,
}

// ---------------------------------------------------------------------------
// POST /resolve-batch
// ---------------------------------------------------------------------------

/// /resolve-batch リクエスト。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResolveRequest {
    /// 解決対象パスの一覧
    pub paths: Vec<String>,
    /// コンテナ名
    pub container: String,
    #[serde(default)]
    pub options: Option<ResolutionOptions>,
}

/// /resolve-batch レスポンス。
///
/// 解決に失敗したパスは `urls` に含まれない。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResolveResponse {
    /// 入力パス → 署名付きURL
    pub urls: HashMap<String, String>,
}

// ---------------------------------------------------------------------------
// POST /prime, /evict, /cleanup
// ---------------------------------------------------------------------------

/// /prime リクエスト。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrimeRequest {
    pub entries: Vec<PrimedEntry>,
}

/// /prime レスポンス。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrimeResponse {
    /// キャッシュに投入したエントリ数
    pub primed: usize,
}

/// /evict リクエスト。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvictRequest {
    /// 削除対象パス
    pub path: String,
    /// コンテナ名。省略時は全コンテナのパス一致削除（設定で許可されている場合のみ）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container: Option<String>,
}

/// /evict および /cleanup レスポンス。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemovedResponse {
    /// 削除したエントリ数
    pub removed: usize,
}

// ---------------------------------------------------------------------------
// GET /health
// ---------------------------------------------------------------------------

/// /health レスポンス。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// キャッシュ内エントリ数（期限切れ未掃除分を含む）
    pub cache_entries: usize,
    /// 解決中のキー数
    pub pending: usize,
    /// 実行中のプロバイダ呼び出し数
    pub limiter_running: usize,
    /// 待機中のプロバイダ呼び出し数
    pub limiter_queued: usize,
    /// 同時実行上限
    pub limiter_capacity: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    /// ストレージ参照のキー表現が "container:path" であることを確認
    #[test]
    fn test_reference_display() {
        let reference = StorageReference::new("workspace-temp", "a/b.png");
        assert_eq!(reference.to_string(), "workspace-temp:a/b.png");
    }

    /// 対応表の上書きがアセット参照の変換に反映されることを確認
    #[test]
    fn test_container_table_override() {
        let table = ContainerTable::default().with_container(AssetKind::Video, "videos-v2");
        let asset = AssetRef::new(AssetKind::Video, "clip.mp4");
        assert_eq!(
            asset.to_reference(&table),
            StorageReference::new("videos-v2", "clip.mp4")
        );
        assert_eq!(table.container_for(AssetKind::Image), "generated-images");
        assert_eq!(table.container_names().len(), 5);
    }

    /// オプション省略時に既定TTLが補われることを確認
    #[test]
    fn test_options_defaults() {
        let req: ResolveRequest = serde_json::from_value(serde_json::json!({
            "path": "a.png",
            "container": "generated-images",
            "options": { "constrained_client": true }
        }))
        .unwrap();
        let options = req.options.unwrap();
        assert_eq!(options.ttl_seconds, DEFAULT_TTL_SECS);
        assert!(options.constrained_client);

        let req: EvictRequest =
            serde_json::from_value(serde_json::json!({ "path": "a.png" })).unwrap();
        assert!(req.container.is_none());
    }
}
