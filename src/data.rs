use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;

use crate::analyzer::PriceSample;
use crate::config::Config;
use crate::error::{AnalysisError, FetchError};

/// Absolute UTC format used by `validFrom`.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

const OPERATION_NAME: &str = "PDP_PRICE_HISTORY";
const QUERY: &str = "query PDP_PRICE_HISTORY($productId: Int!) {\n  priceHistory(productId: $productId) {\n    points {\n      amountIncl\n      amountExcl\n      type\n      validFrom\n      __typename\n    }\n    __typename\n  }\n}";

/// One point as returned by the endpoint.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPricePoint {
    pub amount_incl: Option<Decimal>,
    #[serde(default)]
    pub amount_excl: Option<Decimal>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    pub valid_from: String,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    data: Option<HistoryData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HistoryData {
    price_history: Option<History>,
}

#[derive(Debug, Deserialize)]
struct History {
    #[serde(default)]
    points: Vec<RawPricePoint>,
}

/// A decoded response: the raw JSON (kept for dumping to disk) and its points.
#[derive(Debug, Clone)]
pub struct PriceHistory {
    pub raw: serde_json::Value,
    pub points: Vec<RawPricePoint>,
}

impl PriceHistory {
    pub fn from_json(raw: serde_json::Value) -> Result<Self, FetchError> {
        let envelope: Envelope = serde_json::from_value(raw.clone())?;
        let points = envelope
            .data
            .and_then(|d| d.price_history)
            .ok_or(FetchError::MissingHistory)?
            .points;
        Ok(Self { raw, points })
    }

    pub fn samples(&self) -> Result<Vec<PriceSample>, AnalysisError> {
        parse_samples(&self.points)
    }
}

pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, AnalysisError> {
    NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|_| AnalysisError::MalformedTimestamp { value: value.to_string() })
}

/// Convert raw points into samples. A single malformed timestamp rejects the
/// whole batch; nothing partial is returned.
pub fn parse_samples(points: &[RawPricePoint]) -> Result<Vec<PriceSample>, AnalysisError> {
    points
        .iter()
        .map(|p| Ok(PriceSample::new(parse_timestamp(&p.valid_from)?, p.amount_incl)))
        .collect()
}

/// GraphQL body requesting the price history of `product_id`.
pub fn request_body(product_id: u64) -> serde_json::Value {
    json!({
        "operationName": OPERATION_NAME,
        "variables": { "productId": product_id },
        "query": QUERY,
    })
}

/// Anything that can hand back a product's price history.
#[async_trait]
pub trait PriceHistorySource: Send + Sync {
    async fn fetch(&self, product_id: u64) -> Result<PriceHistory, FetchError>;
}

/// HTTP client for the price history endpoint.
pub struct PriceHistoryClient {
    client: Client,
    endpoint: String,
}

impl PriceHistoryClient {
    pub fn new(config: &Config) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self { client, endpoint: config.endpoint.clone() })
    }

    /// Client against an explicit endpoint with default settings (useful for tests).
    pub fn with_endpoint(endpoint: String) -> Result<Self, FetchError> {
        let config = Config { endpoint, ..Config::default() };
        Self::new(&config)
    }
}

#[async_trait]
impl PriceHistorySource for PriceHistoryClient {
    async fn fetch(&self, product_id: u64) -> Result<PriceHistory, FetchError> {
        let resp = self
            .client
            .post(&self.endpoint)
            .json(&request_body(product_id))
            .send()
            .await?;

        let status = resp.status();
        if status != StatusCode::OK {
            let body = resp.text().await.unwrap_or_default();
            tracing::warn!(product_id, status = status.as_u16(), "price history request failed");
            return Err(FetchError::Status { status: status.as_u16(), body });
        }

        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown")
            .to_string();
        tracing::info!(product_id, %content_type, "Request successful");

        let text = resp.text().await?;
        let raw: serde_json::Value = serde_json::from_str(&text)?;
        let history = PriceHistory::from_json(raw)?;
        tracing::debug!(product_id, points = history.points.len(), "decoded price history");
        Ok(history)
    }
}
