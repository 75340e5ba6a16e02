use crate::utils::{
    load_validated, load_validated_sync, LoadConfigError, SyncConfigLoader, SyncConfigLoaderSync, ValidateConfig,
    DEFAULT_API_BASE_URL, DEFAULT_PRICE_STREAM_URL, DEFAULT_RATE_URL,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

/// Configuration shared by the dashboard's data stores and the price stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSyncConfig {
    /// Base URL of the explorer backend API
    pub api_base_url: String,
    /// URL of the BTC to USD exchange-rate endpoint
    pub rate_url: String,
    /// WebSocket URL of the live trade feed
    pub price_stream_url: String,
    /// Poll cadence for recurring stores, `None` fetches once
    pub poll_interval_ms: Option<u64>,
    /// Rows per page
    pub page_size: usize,
    /// Timeout for HTTP requests in seconds
    pub http_timeout_secs: u64,
    /// WebSocket connection timeout in seconds
    pub ws_connection_timeout_secs: u64,
    /// Maximum number of reconnection attempts
    pub max_reconnect_attempts: u32,
    /// Delay between reconnection attempts in seconds
    pub reconnect_delay_secs: u64,
    /// Oldest price points are dropped past this many, `None` keeps everything
    pub price_stream_max_points: Option<usize>,
}

impl Default for DataSyncConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            rate_url: DEFAULT_RATE_URL.to_string(),
            price_stream_url: DEFAULT_PRICE_STREAM_URL.to_string(),
            poll_interval_ms: Some(10_000),
            page_size: 10,
            http_timeout_secs: 10,
            ws_connection_timeout_secs: 30,
            max_reconnect_attempts: 5,
            reconnect_delay_secs: 2,
            price_stream_max_points: Some(5_000),
        }
    }
}

impl DataSyncConfig {
    /// Load configuration from environment variables on top of the defaults
    pub fn from_env() -> Result<Self, LoadConfigError> {
        let mut config = Self::default();

        if let Ok(api_base_url) = std::env::var("EXPLORER_API_BASE_URL") {
            Url::parse(&api_base_url).map_err(|e| LoadConfigError::invalid("EXPLORER_API_BASE_URL", e))?;
            config.api_base_url = api_base_url;
        }

        if let Ok(rate_url) = std::env::var("EXPLORER_RATE_URL") {
            Url::parse(&rate_url).map_err(|e| LoadConfigError::invalid("EXPLORER_RATE_URL", e))?;
            config.rate_url = rate_url;
        }

        if let Ok(stream_url) = std::env::var("EXPLORER_PRICE_STREAM_URL") {
            Url::parse(&stream_url).map_err(|e| LoadConfigError::invalid("EXPLORER_PRICE_STREAM_URL", e))?;
            config.price_stream_url = stream_url;
        }

        if let Ok(interval_str) = std::env::var("EXPLORER_POLL_INTERVAL_MS") {
            // 0 switches stores to one-shot
            let interval: u64 = interval_str
                .parse()
                .map_err(|e| LoadConfigError::invalid("EXPLORER_POLL_INTERVAL_MS", e))?;
            config.poll_interval_ms = (interval > 0).then_some(interval);
        }

        if let Ok(page_size_str) = std::env::var("EXPLORER_PAGE_SIZE") {
            config.page_size = page_size_str
                .parse()
                .map_err(|e| LoadConfigError::invalid("EXPLORER_PAGE_SIZE", e))?;
        }

        if let Ok(timeout_str) = std::env::var("EXPLORER_HTTP_TIMEOUT_SECS") {
            config.http_timeout_secs = timeout_str
                .parse()
                .map_err(|e| LoadConfigError::invalid("EXPLORER_HTTP_TIMEOUT_SECS", e))?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Full URL for an API path such as `/block-info`
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.api_base_url.trim_end_matches('/'), path.trim_start_matches('/'))
    }

    pub fn poll_interval(&self) -> Option<Duration> {
        self.poll_interval_ms.map(Duration::from_millis)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn ws_connection_timeout(&self) -> Duration {
        Duration::from_secs(self.ws_connection_timeout_secs)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_secs)
    }
}

impl ValidateConfig for DataSyncConfig {
    /// Check values that would otherwise surface as confusing runtime behaviour
    fn validate(&self) -> Result<(), LoadConfigError> {
        Url::parse(&self.api_base_url).map_err(|e| LoadConfigError::invalid("api_base_url", e))?;
        if self.page_size == 0 {
            return Err(LoadConfigError::invalid("page_size", "must be at least 1"));
        }
        if self.http_timeout_secs == 0 {
            return Err(LoadConfigError::invalid("http_timeout_secs", "must be at least 1"));
        }
        Ok(())
    }
}

#[async_trait]
impl SyncConfigLoader for DataSyncConfig {
    type SectionType = DataSyncConfig;

    async fn load_section_from_file(file_name: String) -> Result<Self::SectionType, LoadConfigError> {
        load_validated(file_name).await
    }
}

impl SyncConfigLoaderSync for DataSyncConfig {
    type SectionType = DataSyncConfig;

    fn load_section_from_file_sync(file_name: String) -> Result<Self::SectionType, LoadConfigError> {
        load_validated_sync(file_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = DataSyncConfig::default();
        assert_eq!(config.api_base_url, "http://localhost:8000");
        assert_eq!(config.page_size, 10);
        assert_eq!(config.poll_interval_ms, Some(10_000));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_durations() {
        let config = DataSyncConfig::default();
        assert_eq!(config.poll_interval(), Some(Duration::from_secs(10)));
        assert_eq!(config.http_timeout(), Duration::from_secs(10));
        assert_eq!(config.ws_connection_timeout(), Duration::from_secs(30));
        assert_eq!(config.reconnect_delay(), Duration::from_secs(2));
    }

    #[test]
    fn test_endpoint_joins_slashes() {
        let config = DataSyncConfig { api_base_url: "http://localhost:8000/".to_string(), ..Default::default() };
        assert_eq!(config.endpoint("/block-info"), "http://localhost:8000/block-info");
        assert_eq!(config.endpoint("block/7"), "http://localhost:8000/block/7");
    }

    #[test]
    fn test_validate_rejects_zero_page_size() {
        let config = DataSyncConfig { page_size: 0, ..Default::default() };
        assert!(matches!(config.validate(), Err(LoadConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_load_partial_file_uses_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "api_base_url = \"http://explorer.local:9000\"\npage_size = 20").unwrap();

        let config =
            DataSyncConfig::load_section_from_file_sync(file.path().to_string_lossy().to_string()).unwrap();
        assert_eq!(config.api_base_url, "http://explorer.local:9000");
        assert_eq!(config.page_size, 20);
        assert_eq!(config.rate_url, DEFAULT_RATE_URL);
    }

    #[tokio::test]
    async fn test_load_file_rejects_invalid_values() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "page_size = 0").unwrap();

        let result = DataSyncConfig::load_section_from_file(file.path().to_string_lossy().to_string()).await;
        assert!(result.is_err());
    }
}
