//! Gateway HTTPクライアント

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use vault_types::{
    BatchResolveRequest, BatchResolveResponse, EvictRequest, HealthResponse, PrimeRequest,
    PrimeResponse, RemovedResponse, ResolveRequest, ResolveResponse,
};

/// 稼働中のGatewayを呼び出すクライアント。
pub struct GatewayClient {
    http: reqwest::Client,
    base_url: String,
}

impl GatewayClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub async fn resolve(&self, request: &ResolveRequest) -> Result<ResolveResponse> {
        self.post("/resolve", request).await
    }

    pub async fn resolve_batch(&self, request: &BatchResolveRequest) -> Result<BatchResolveResponse> {
        self.post("/resolve-batch", request).await
    }

    pub async fn prime(&self, request: &PrimeRequest) -> Result<PrimeResponse> {
        self.post("/prime", request).await
    }

    pub async fn evict(&self, request: &EvictRequest) -> Result<RemovedResponse> {
        self.post("/evict", request).await
    }

    pub async fn cleanup(&self) -> Result<RemovedResponse> {
        self.post("/cleanup", &serde_json::json!({})).await
    }

    pub async fn health(&self) -> Result<HealthResponse> {
        let url = format!("{}/health", self.base_url);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Gatewayに接続できません: {url}"))?;
        Self::decode(response).await
    }

    async fn post<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = format!("{}{path}", self.base_url);
        let response = self
            .http
            .post(&url)
            .json(body)
            .send()
            .await
            .with_context(|| format!("Gatewayに接続できません: {url}"))?;
        Self::decode(response).await
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Gatewayがエラーを返しました ({status}): {body}");
        }
        response
            .json()
            .await
            .context("Gatewayのレスポンスを解釈できません")
    }
}
