//! World Bank API v2 client.

use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};
use wdi_db::CountryCode;
use wdi_telemetry::Metrics;

/// Public World Bank API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.worldbank.org/v2";

/// Page size requested from paginated endpoints.
pub const PER_PAGE: u32 = 20_000;

/// Error type for World Bank API calls.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("World Bank API returned status {0}")]
    Status(StatusCode),
    #[error("World Bank API error: {0}")]
    Api(String),
    #[error("malformed response: {0}")]
    Malformed(String),
}

/// Retry behaviour for a single request.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Wait `backoff^attempt` seconds after a failed attempt.
    pub backoff: f64,
    pub request_timeout: Duration,
    /// Pause between consecutive pages of one listing.
    pub page_pause: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff: 1.5,
            request_timeout: Duration::from_secs(60),
            page_pause: Duration::from_millis(200),
        }
    }
}

impl RetryPolicy {
    pub fn delay_after(&self, attempt: u32) -> Duration {
        Duration::from_secs_f64(self.backoff.powi(attempt as i32))
    }
}

/// A World Bank topic.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Topic {
    pub id: String,
    pub value: String,
}

/// Indicator metadata as listed under a topic.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndicatorRecord {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub source_note: Option<String>,
    #[serde(default)]
    pub source_organization: Option<String>,
}

/// `{ "id": ..., "value": ... }` reference objects.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NamedRef {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
}

/// One data point of an indicator series.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SeriesRecord {
    #[serde(default)]
    pub countryiso3code: Option<String>,
    #[serde(default)]
    pub country: Option<NamedRef>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub value: Option<f64>,
}

/// One page of a paginated response.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub page: u64,
    pub pages: u64,
    pub items: Vec<T>,
}

fn meta_number(meta: &Value, key: &str) -> Option<u64> {
    match meta.get(key)? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// Decode a `[metadata, data]` response body.
///
/// A body whose first element carries a `message` is an API-level error.
/// A missing or null data element is an empty page.
pub fn parse_page<T: DeserializeOwned>(body: Value) -> Result<Page<T>, ApiError> {
    let parts = match body {
        Value::Array(parts) => parts,
        other => {
            return Err(ApiError::Malformed(format!(
                "expected a JSON array, got {}",
                other
            )))
        }
    };
    let mut parts = parts.into_iter();
    let meta = parts
        .next()
        .ok_or_else(|| ApiError::Malformed("empty response array".to_string()))?;

    if let Some(message) = meta.get("message") {
        return Err(ApiError::Api(message.to_string()));
    }

    let page = meta_number(&meta, "page").unwrap_or(1);
    let pages = meta_number(&meta, "pages").unwrap_or(1);
    let items = match parts.next() {
        None | Some(Value::Null) => Vec::new(),
        Some(data) => serde_json::from_value(data)
            .map_err(|e| ApiError::Malformed(format!("unexpected data element: {}", e)))?,
    };

    Ok(Page { page, pages, items })
}

/// World Bank API client with retries.
pub struct WorldBankClient {
    client: Client,
    base_url: String,
    retry: RetryPolicy,
    metrics: Metrics,
}

impl WorldBankClient {
    /// Create a new API client.
    ///
    /// # Arguments
    /// * `base_url` - API root, normally [`DEFAULT_BASE_URL`]
    /// * `retry` - Retry and timeout settings
    /// * `metrics` - Metrics collector
    pub fn new(base_url: &str, retry: RetryPolicy, metrics: Metrics) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(retry.request_timeout).build()?;
        info!("Initialized World Bank client for {}", base_url);

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            retry,
            metrics,
        })
    }

    async fn request_once(&self, url: &str, params: &[(&str, String)]) -> Result<Value, ApiError> {
        let response = self.client.get(url).query(params).send().await?;
        if !response.status().is_success() {
            return Err(ApiError::Status(response.status()));
        }
        Ok(response.json().await?)
    }

    /// GET a JSON document, retrying failed attempts with exponential backoff.
    async fn get_json(
        &self,
        endpoint: &str,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<Value, ApiError> {
        let url = format!("{}/{}", self.base_url, path);
        let mut attempt = 1;
        loop {
            self.metrics.inc_api_requests();
            let start = Instant::now();
            let result = self.request_once(&url, params).await;
            self.metrics
                .observe_api_latency(endpoint, start.elapsed().as_secs_f64());

            match result {
                Ok(body) => return Ok(body),
                Err(e) => {
                    self.metrics.inc_api_errors();
                    if attempt >= self.retry.max_attempts {
                        return Err(e);
                    }
                    let delay = self.retry.delay_after(attempt);
                    warn!(
                        endpoint,
                        attempt,
                        "Request to {} failed: {}; retrying in {:?}", url, e, delay
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    /// Fetch every page of a listing.
    async fn get_all_pages<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<Vec<T>, ApiError> {
        let mut items = Vec::new();
        let mut page = 1u64;
        loop {
            let mut page_params = params.to_vec();
            page_params.push(("format", "json".to_string()));
            page_params.push(("per_page", PER_PAGE.to_string()));
            page_params.push(("page", page.to_string()));

            let body = self.get_json(endpoint, path, &page_params).await?;
            let parsed: Page<T> = parse_page(body)?;
            items.extend(parsed.items);

            if page >= parsed.pages {
                break;
            }
            page += 1;
            sleep(self.retry.page_pause).await;
        }
        debug!(endpoint, pages = page, items = items.len(), "Fetched listing");
        Ok(items)
    }

    /// List every World Bank topic.
    pub async fn list_topics(&self) -> Result<Vec<Topic>, ApiError> {
        let body = self
            .get_json("topics", "topic", &[("format", "json".to_string())])
            .await?;
        Ok(parse_page(body)?.items)
    }

    /// List the indicators filed under a topic.
    pub async fn list_indicators_for_topic(
        &self,
        topic_id: &str,
    ) -> Result<Vec<IndicatorRecord>, ApiError> {
        let path = format!("topic/{}/indicator", topic_id);
        self.get_all_pages("topic_indicators", &path, &[]).await
    }

    /// Download one indicator for several countries over a year range.
    pub async fn fetch_series(
        &self,
        indicator_code: &str,
        countries: &[CountryCode],
        start_year: i32,
        end_year: i32,
    ) -> Result<Vec<SeriesRecord>, ApiError> {
        let codes = countries
            .iter()
            .map(CountryCode::as_str)
            .collect::<Vec<_>>()
            .join(";");
        let path = format!("country/{}/indicator/{}", codes, indicator_code);
        let params = [("date", format!("{}:{}", start_year, end_year))];
        self.get_all_pages("series", &path, &params).await
    }
}
