use crate::data_sync::fetcher::{HttpFetcher, RecordFetcher};
use crate::error::SyncError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// BTC to fiat rate. `Unknown` until a fetch succeeds and is never treated as zero.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum ExchangeRate {
    #[default]
    Unknown,
    Known(f64),
}

impl ExchangeRate {
    pub fn is_known(&self) -> bool {
        matches!(self, Self::Known(_))
    }

    pub fn value(&self) -> Option<f64> {
        match self {
            Self::Known(rate) => Some(*rate),
            Self::Unknown => None,
        }
    }
}

impl From<Option<f64>> for ExchangeRate {
    fn from(rate: Option<f64>) -> Self {
        rate.map_or(Self::Unknown, Self::Known)
    }
}

pub type RateExtractor = Arc<dyn Fn(&Value) -> Option<f64> + Send + Sync>;

/// Where the secondary rate comes from and how to read it out of the response
#[derive(Clone)]
pub struct RateSource {
    fetcher: Arc<dyn RecordFetcher>,
    extract: RateExtractor,
}

impl RateSource {
    pub fn new(fetcher: Arc<dyn RecordFetcher>, extract: RateExtractor) -> Self {
        Self { fetcher, extract }
    }

    /// HTTP source with a custom extractor
    pub fn http<F>(fetcher: HttpFetcher, extract: F) -> Self
    where
        F: Fn(&Value) -> Option<f64> + Send + Sync + 'static,
    {
        Self::new(Arc::new(fetcher), Arc::new(extract))
    }

    /// CoinGecko simple-price shape: `{"bitcoin": {"usd": 50000.0}}`
    pub fn coingecko_usd(fetcher: HttpFetcher) -> Self {
        Self::http(fetcher, |v| v.get("bitcoin")?.get("usd")?.as_f64())
    }

    pub fn endpoint(&self) -> &str {
        self.fetcher.endpoint()
    }

    /// Fetch and extract the rate. A response without a finite, positive
    /// number is a parse failure.
    pub async fn fetch(&self) -> Result<f64, SyncError> {
        let body = self.fetcher.fetch_json().await?;
        let rate = (self.extract)(&body)
            .ok_or_else(|| SyncError::ParseFailure(format!("no rate in response from {}", self.endpoint())))?;
        if !rate.is_finite() || rate <= 0.0 {
            return Err(SyncError::ParseFailure(format!("unusable rate {} from {}", rate, self.endpoint())));
        }
        debug!("Fetched exchange rate {} from {}", rate, self.endpoint());
        Ok(rate)
    }

    /// Like [`RateSource::fetch`] but logs failures instead of returning them
    pub async fn fetch_logged(&self) -> Option<f64> {
        match self.fetch().await {
            Ok(rate) => Some(rate),
            Err(e) => {
                warn!("Exchange rate fetch from {} failed: {}", self.endpoint(), e);
                None
            }
        }
    }
}

impl fmt::Debug for RateSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateSource").field("endpoint", &self.endpoint()).finish()
    }
}
