//! # ストレージAPIの署名実装
//!
//! `POST {base}/object/sign/{container}/{path}` に `{"expiresIn": ttl}` を送り、
//! （パスの `#` `?` `%` 等はセグメント単位でエンコードする）
//! 応答の `signedURL` を署名付きURLとする。相対URLの場合はベースURLに連結する。
//! 呼び出しにはセッションのアクセストークンをBearerとして付与する。

use serde::{Deserialize, Serialize};
use vault_resolver::{ResolveError, Session, SignedUrl, UrlSigner};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SignBody {
    expires_in: u64,
}

#[derive(Deserialize)]
struct SignResponse {
    #[serde(rename = "signedURL", alias = "signedUrl")]
    signed_url: Option<String>,
}

/// ストレージAPIによる署名プロバイダ。
pub struct HttpSigner {
    client: reqwest::Client,
    /// 例: `https://project.example.co/storage/v1`
    base_url: String,
    /// `apikey` ヘッダに付与するキー
    api_key: Option<String>,
}

impl HttpSigner {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        }
    }

    /// 環境変数から構築する。
    pub fn from_env() -> anyhow::Result<Self> {
        let base_url = std::env::var("STORAGE_API_URL")
            .map_err(|_| anyhow::anyhow!("VAULT_SIGNER=http にはSTORAGE_API_URLが必要です"))?;
        let api_key = std::env::var("STORAGE_API_KEY").ok();
        tracing::info!(storage_api_url = %base_url, "ストレージAPI署名プロバイダを設定");
        Ok(Self::new(base_url, api_key))
    }

    /// 署名エンドポイントのURL。コンテナ名とパスの各セグメントはパーセントエンコードする。
    fn sign_endpoint(&self, container: &str, path: &str) -> Result<reqwest::Url, ResolveError> {
        let mut url = reqwest::Url::parse(&self.base_url).map_err(|e| {
            ResolveError::Resolution(format!("ストレージAPIのURLが不正です ({}): {e}", self.base_url))
        })?;
        url.path_segments_mut()
            .map_err(|_| {
                ResolveError::Resolution(format!("ストレージAPIのURLが不正です: {}", self.base_url))
            })?
            .pop_if_empty()
            .extend(["object", "sign", container])
            .extend(path.split('/'));
        Ok(url)
    }

    /// 応答のURLを絶対URLにする。
    fn absolute_url(&self, signed: &str) -> String {
        let lower = signed.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            return signed.to_string();
        }
        if signed.starts_with('/') {
            format!("{}{signed}", self.base_url)
        } else {
            format!("{}/{signed}", self.base_url)
        }
    }
}

#[async_trait::async_trait]
impl UrlSigner for HttpSigner {
    async fn sign(
        &self,
        session: &Session,
        container: &str,
        path: &str,
        ttl_secs: u64,
    ) -> Result<SignedUrl, ResolveError> {
        let endpoint = self.sign_endpoint(container, path)?;
        let mut request = self
            .client
            .post(endpoint)
            .bearer_auth(&session.access_token)
            .json(&SignBody {
                expires_in: ttl_secs,
            });
        if let Some(key) = &self.api_key {
            request = request.header("apikey", key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ResolveError::Resolution(format!("署名リクエスト送信失敗: {e}")))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(ResolveError::Authentication(format!(
                "ストレージAPIが認証を拒否しました: {status}"
            )));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ResolveError::Resolution(format!(
                "ストレージAPIがエラーを返しました: {status} {body}"
            )));
        }

        let parsed: SignResponse = response
            .json()
            .await
            .map_err(|e| ResolveError::Resolution(format!("署名レスポンスのパースに失敗: {e}")))?;

        match parsed.signed_url.filter(|url| !url.trim().is_empty()) {
            Some(url) => Ok(SignedUrl {
                url: self.absolute_url(&url),
            }),
            None => Err(ResolveError::Resolution(format!(
                "署名レスポンスにURLがありません: {container}/{path}"
            ))),
        }
    }
}
