use thiserror::Error;

/// Failure of a single fetch. The store never returns these as `Err`; they are
/// logged and kept as the store's `last_error`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    #[error("network failure: {0}")]
    NetworkFailure(String),
    #[error("http status {status} from {endpoint}")]
    HttpStatusFailure { status: u16, endpoint: String },
    #[error("parse failure: {0}")]
    ParseFailure(String),
}

impl SyncError {
    pub fn is_network(&self) -> bool {
        matches!(self, Self::NetworkFailure(_))
    }

    pub fn is_http_status(&self) -> bool {
        matches!(self, Self::HttpStatusFailure { .. })
    }

    pub fn is_parse(&self) -> bool {
        matches!(self, Self::ParseFailure(_))
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            return Self::ParseFailure(error.to_string());
        }
        match error.status() {
            Some(status) => Self::HttpStatusFailure {
                status: status.as_u16(),
                endpoint: error.url().map(|u| u.to_string()).unwrap_or_default(),
            },
            None => Self::NetworkFailure(error.to_string()),
        }
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(error: serde_json::Error) -> Self {
        Self::ParseFailure(error.to_string())
    }
}
