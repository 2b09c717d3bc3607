//! # 認可プロバイダ実装
//!
//! `UrlSigner` の実装群。Gateway運用者が `VAULT_SIGNER` で選択する。
//! - `s3`: S3互換ストレージ（AWS S3, MinIO, Cloudflare R2等）の署名付きGET URL
//! - `http`: ストレージAPIの署名エンドポイント

pub mod http;
#[cfg(feature = "vendor-aws")]
pub mod s3;

pub use http::HttpSigner;
#[cfg(feature = "vendor-aws")]
pub use s3::S3Signer;

use std::sync::Arc;

use vault_resolver::UrlSigner;

use crate::config::SignerKind;

/// 設定に応じた署名プロバイダを環境変数から構築する。
pub fn signer_from_env(kind: SignerKind) -> anyhow::Result<Arc<dyn UrlSigner>> {
    match kind {
        #[cfg(feature = "vendor-aws")]
        SignerKind::S3 => Ok(Arc::new(S3Signer::from_env()?)),
        #[cfg(not(feature = "vendor-aws"))]
        SignerKind::S3 => anyhow::bail!("S3署名にはvendor-aws機能が必要です"),
        SignerKind::Http => Ok(Arc::new(HttpSigner::from_env()?)),
    }
}
