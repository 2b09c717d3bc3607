//! # Gateway設定・共有状態
//!
//! 環境変数からの設定読み込みとGatewayの共有状態の定義。

use std::str::FromStr;
use std::time::Duration;

use vault_resolver::{ResolutionService, ResolverConfig};
use vault_types::ContainerTable;

/// バッチ解決1リクエストあたりのパス数上限
pub const DEFAULT_MAX_BATCH_PATHS: usize = 500;

/// 認可プロバイダ（URL署名）の種別。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignerKind {
    /// S3互換ストレージの署名付きGET URL
    S3,
    /// ストレージAPIの署名エンドポイント
    Http,
}

impl FromStr for SignerKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "s3" => Ok(SignerKind::S3),
            "http" => Ok(SignerKind::Http),
            other => anyhow::bail!("VAULT_SIGNERは s3 または http である必要があります: {other}"),
        }
    }
}

/// Gateway設定。
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// 待ち受けアドレス
    pub bind_addr: String,
    pub signer: SignerKind,
    /// 認可プロバイダ呼び出しに使うサービストークン。未設定の場合は全解決が401になる
    pub service_token: Option<String>,
    pub max_batch_paths: usize,
    pub resolver: ResolverConfig,
}

impl GatewayConfig {
    /// 環境変数から構築する。未設定の項目は既定値。
    pub fn from_env() -> anyhow::Result<Self> {
        let bind_addr =
            std::env::var("VAULT_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let signer = env_parse("VAULT_SIGNER", SignerKind::S3)?;
        let service_token = std::env::var("VAULT_SERVICE_TOKEN").ok();
        let max_batch_paths = env_parse("VAULT_MAX_BATCH_PATHS", DEFAULT_MAX_BATCH_PATHS)?;

        let defaults = ResolverConfig::default();
        let capacity = env_parse("VAULT_LIMITER_CAPACITY", defaults.limiter_capacity)?;
        let timeout_secs = env_parse(
            "VAULT_PROVIDER_TIMEOUT_SECS",
            defaults.provider_timeout.as_secs(),
        )?;
        let retries = env_parse("VAULT_PROVIDER_RETRIES", defaults.provider_retries)?;
        let default_ttl = env_parse("VAULT_DEFAULT_TTL_SECS", defaults.default_ttl_secs)?;
        let suffix_eviction = env_parse("VAULT_SUFFIX_EVICTION", defaults.allow_suffix_eviction)?;

        let resolver = defaults
            .with_limiter_capacity(capacity)
            .with_provider_timeout(Duration::from_secs(timeout_secs), retries)
            .with_default_ttl(default_ttl)
            .with_suffix_eviction(suffix_eviction)
            .with_known_containers(ContainerTable::default().container_names());

        Ok(Self {
            bind_addr,
            signer,
            service_token,
            max_batch_paths,
            resolver,
        })
    }
}

/// 環境変数を型変換して読む。未設定なら `default`、変換できなければエラー。
fn env_parse<T>(name: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("{name} の値が不正です ({raw}): {e}")),
        Err(_) => Ok(default),
    }
}

/// Gatewayの共有状態。
pub struct GatewayState {
    /// URL解決サービス（キャッシュ・リミッターを所有）
    pub service: ResolutionService,
    pub max_batch_paths: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signer_kind_parse() {
        assert_eq!("s3".parse::<SignerKind>().unwrap(), SignerKind::S3);
        assert_eq!("HTTP".parse::<SignerKind>().unwrap(), SignerKind::Http);
        assert!("gcs".parse::<SignerKind>().is_err());
    }

    /// 未設定の環境変数は既定値になり、不正な値はエラーになることを確認
    #[test]
    fn test_env_parse() {
        assert_eq!(env_parse("VAULT_TEST_UNSET_VARIABLE", 7usize).unwrap(), 7);

        std::env::set_var("VAULT_TEST_BAD_NUMBER", "many");
        assert!(env_parse("VAULT_TEST_BAD_NUMBER", 1usize).is_err());

        std::env::set_var("VAULT_TEST_GOOD_NUMBER", " 12 ");
        assert_eq!(env_parse("VAULT_TEST_GOOD_NUMBER", 1usize).unwrap(), 12);
    }
}
