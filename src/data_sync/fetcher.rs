use crate::error::SyncError;
use async_trait::async_trait;
use reqwest::header::ACCEPT;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// Source of raw JSON for a store
#[async_trait]
pub trait RecordFetcher: Send + Sync {
    /// Fetch the endpoint and decode its body as JSON
    async fn fetch_json(&self) -> Result<Value, SyncError>;

    /// Endpoint used in logs and errors
    fn endpoint(&self) -> &str;
}

/// `GET`s one endpoint over HTTP
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    http_client: reqwest::Client,
    endpoint: String,
}

impl HttpFetcher {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, SyncError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SyncError::NetworkFailure(format!("failed to create HTTP client: {e}")))?;

        Ok(Self::with_client(http_client, endpoint))
    }

    /// Share one connection pool between several stores
    pub fn with_client(http_client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self { http_client, endpoint: endpoint.into() }
    }
}

#[async_trait]
impl RecordFetcher for HttpFetcher {
    async fn fetch_json(&self) -> Result<Value, SyncError> {
        debug!("GET {}", self.endpoint);

        let response = self
            .http_client
            .get(&self.endpoint)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| SyncError::NetworkFailure(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::HttpStatusFailure { status: status.as_u16(), endpoint: self.endpoint.clone() });
        }

        let body = response.bytes().await.map_err(|e| SyncError::NetworkFailure(e.to_string()))?;
        Ok(serde_json::from_slice(&body)?)
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

/// Always answers with the same result. Handy for fixtures and offline views.
#[derive(Debug, Clone)]
pub struct StaticFetcher {
    endpoint: String,
    response: Result<Value, SyncError>,
}

impl StaticFetcher {
    pub fn ok(endpoint: impl Into<String>, body: Value) -> Self {
        Self { endpoint: endpoint.into(), response: Ok(body) }
    }

    pub fn err(endpoint: impl Into<String>, error: SyncError) -> Self {
        Self { endpoint: endpoint.into(), response: Err(error) }
    }
}

#[async_trait]
impl RecordFetcher for StaticFetcher {
    async fn fetch_json(&self) -> Result<Value, SyncError> {
        self.response.clone()
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }
}
