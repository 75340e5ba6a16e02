use async_trait::async_trait;
use dotenvy::dotenv;
use regex::{Captures, Regex};
use serde::de::DeserializeOwned;
use std::sync::LazyLock;
use std::{env, fs};
use thiserror::Error;

#[allow(clippy::enum_variant_names)]
#[derive(Debug, Error)]
pub enum LoadConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("TOML error: {0}")]
    TomlError(#[from] toml::de::Error),
    #[error("Invalid config value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },
}

impl LoadConfigError {
    pub fn invalid(key: &str, reason: impl ToString) -> Self {
        Self::InvalidValue { key: key.to_string(), reason: reason.to_string() }
    }
}

#[async_trait]
pub trait SyncConfigLoader {
    type SectionType;

    async fn load_section_from_file(file_name: String) -> Result<Self::SectionType, LoadConfigError>;
}

pub trait SyncConfigLoaderSync {
    type SectionType;

    fn load_section_from_file_sync(file_name: String) -> Result<Self::SectionType, LoadConfigError>;
}

/// Config sections that can check their own values after loading
pub trait ValidateConfig {
    fn validate(&self) -> Result<(), LoadConfigError>;
}

pub async fn load_from_file<T: DeserializeOwned>(file_name: String) -> Result<T, LoadConfigError> {
    dotenv().ok();
    parse_config(&tokio::fs::read_to_string(file_name).await?)
}

pub fn load_from_file_sync<T: DeserializeOwned>(file_name: String) -> Result<T, LoadConfigError> {
    dotenv().ok();
    parse_config(&fs::read_to_string(file_name)?)
}

/// Load a section and reject it if [`ValidateConfig::validate`] fails
pub async fn load_validated<T: DeserializeOwned + ValidateConfig>(file_name: String) -> Result<T, LoadConfigError> {
    let section: T = load_from_file(file_name).await?;
    section.validate()?;
    Ok(section)
}

pub fn load_validated_sync<T: DeserializeOwned + ValidateConfig>(file_name: String) -> Result<T, LoadConfigError> {
    let section: T = load_from_file_sync(file_name)?;
    section.validate()?;
    Ok(section)
}

fn parse_config<T: DeserializeOwned>(raw_config: &str) -> Result<T, LoadConfigError> {
    Ok(toml::from_str(&expand_vars(raw_config))?)
}

static VAR_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([a-zA-Z_][0-9a-zA-Z_]*)(?::-([^}]*))?\}").unwrap()
});

/// Replaces `${NAME}` with the value of the environment variable `NAME`, or
/// `${NAME:-fallback}` with `fallback` when `NAME` is unset. Unset variables
/// without a fallback are left as written.
fn expand_vars(raw_config: &str) -> String {
    VAR_PATTERN
        .replace_all(raw_config, |caps: &Captures| match (env::var(&caps[1]), caps.get(2)) {
            (Ok(val), _) => val,
            (Err(_), Some(fallback)) => fallback.as_str().to_string(),
            (Err(_), None) => caps[0].to_string(),
        })
        .into_owned()
}
