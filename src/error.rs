//! Typed errors for the analyzer, the history fetcher and config loading.

use thiserror::Error;

/// Errors produced while turning a price history into samples or analyzing it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnalysisError {
    /// No sample in the series carries a price. Reported, not fatal.
    #[error("no valid prices available in the data")]
    NoValidPriceData,

    /// A timestamp did not match `YYYY-MM-DDTHH:MM:SSZ`. Rejects the whole batch.
    #[error("malformed timestamp: {value:?}")]
    MalformedTimestamp { value: String },
}

/// Errors from the price history endpoint.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("request failed with status code: {status}")]
    Status { status: u16, body: String },

    #[error("response is not valid JSON: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("response carries no price history")]
    MissingHistory,
}

/// Errors loading or validating a [`crate::config::Config`].
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Read(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}
