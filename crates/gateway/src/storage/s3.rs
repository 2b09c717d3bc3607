//! # S3互換ストレージの署名実装
//!
//! コンテナ名をバケット名として署名付きGET URLを発行する。
//! 資格情報はサービス側で保持するため、セッションは署名に使わない。

use vault_resolver::{ResolveError, Session, SignedUrl, UrlSigner};

/// S3の署名付きURLの有効期限上限（7日）
const MAX_PRESIGN_SECS: u64 = 7 * 24 * 60 * 60;

/// S3互換ストレージによる署名プロバイダ。
pub struct S3Signer {
    region: s3::Region,
    credentials: s3::creds::Credentials,
}

impl S3Signer {
    pub fn new(region: s3::Region, credentials: s3::creds::Credentials) -> Self {
        Self {
            region,
            credentials,
        }
    }

    /// 環境変数から構築する。
    pub fn from_env() -> anyhow::Result<Self> {
        let endpoint = std::env::var("S3_ENDPOINT")
            .unwrap_or_else(|_| "http://localhost:9000".to_string());
        let access_key =
            std::env::var("S3_ACCESS_KEY").unwrap_or_else(|_| "minioadmin".to_string());
        let secret_key =
            std::env::var("S3_SECRET_KEY").unwrap_or_else(|_| "minioadmin".to_string());

        // AWS S3エンドポイント（s3.REGION.amazonaws.com）からリージョンを自動検出。
        // 非AWSエンドポイントではus-east-1をフォールバックとして使用。
        let region_name = std::env::var("S3_REGION")
            .ok()
            .or_else(|| region_from_endpoint(&endpoint))
            .unwrap_or_else(|| "us-east-1".to_string());
        tracing::info!(s3_endpoint = %endpoint, region = %region_name, "S3署名プロバイダを設定");

        let region = s3::Region::Custom {
            region: region_name,
            endpoint,
        };
        let credentials = s3::creds::Credentials::new(
            Some(&access_key),
            Some(&secret_key),
            None,
            None,
            None,
        )?;

        Ok(Self::new(region, credentials))
    }

    fn bucket(&self, container: &str) -> Result<Box<s3::Bucket>, ResolveError> {
        let bucket = s3::Bucket::new(container, self.region.clone(), self.credentials.clone())
            .map_err(|e| ResolveError::Resolution(format!("バケットを初期化できません ({container}): {e}")))?;
        Ok(bucket.with_path_style())
    }
}

fn region_from_endpoint(endpoint: &str) -> Option<String> {
    let start = endpoint.find("s3.")?;
    let rest = &endpoint[start + 3..];
    rest.find(".amazonaws.com").map(|end| rest[..end].to_string())
}

#[async_trait::async_trait]
impl UrlSigner for S3Signer {
    async fn sign(
        &self,
        _session: &Session,
        container: &str,
        path: &str,
        ttl_secs: u64,
    ) -> Result<SignedUrl, ResolveError> {
        let expiry = u32::try_from(ttl_secs.min(MAX_PRESIGN_SECS)).unwrap_or(u32::MAX);
        let url = self
            .bucket(container)?
            .presign_get(path, expiry, None)
            .await
            .map_err(|e| ResolveError::Resolution(format!("署名付きURL生成失敗: {e}")))?;
        Ok(SignedUrl { url })
    }
}
