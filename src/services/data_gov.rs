//! Client for the data.gov.in commodity price resource.

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

use crate::config::UpstreamConfig;
use crate::error::SyncError;

/// Source of raw price rows for a given arrival date.
///
/// Rows are returned undecoded; the sync service validates them one by one so
/// a single bad row cannot fail the whole feed.
#[async_trait]
pub trait PriceFeed: Send + Sync {
    async fn fetch_rows(&self, date: NaiveDate) -> Result<Vec<Value>, SyncError>;
}

/// The data.gov.in response envelope. `records` is required: an object
/// without it is an error notice, not an empty page.
#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    total: Option<u64>,
    records: Vec<Value>,
}

#[derive(Debug, PartialEq)]
pub struct FeedPage {
    pub rows: Vec<Value>,
    pub total: Option<u64>,
}

#[derive(Clone)]
pub struct DataGovService {
    client: Client,
    config: UpstreamConfig,
}

impl DataGovService {
    pub fn new(config: UpstreamConfig) -> Result<Self, SyncError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| SyncError::InvalidConfig(format!("HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    fn resource_url(&self) -> String {
        format!(
            "{}/resource/{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.resource_id
        )
    }

    async fn fetch_page(&self, date: NaiveDate, offset: u64) -> Result<FeedPage, SyncError> {
        let arrival_date = date.format("%d/%m/%Y").to_string();
        let limit = self.config.page_limit.to_string();
        let offset = offset.to_string();

        let response = self
            .client
            .get(self.resource_url())
            .header("accept", "application/json")
            .query(&[
                ("api-key", self.config.api_key.as_str()),
                ("format", "json"),
                ("limit", limit.as_str()),
                ("offset", offset.as_str()),
                ("filters[arrival_date]", arrival_date.as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(SyncError::UpstreamUnavailable(format!(
                "data.gov.in API error {}: {}",
                status,
                truncate(&error_text, 200)
            )));
        }

        let body = response.text().await?;
        parse_page(&body)
    }
}

#[async_trait]
impl PriceFeed for DataGovService {
    async fn fetch_rows(&self, date: NaiveDate) -> Result<Vec<Value>, SyncError> {
        let limit = u64::from(self.config.page_limit);
        let mut rows = Vec::new();

        for page_index in 0..self.config.max_pages {
            let offset = u64::from(page_index) * limit;
            let page = self.fetch_page(date, offset).await?;
            let page_len = page.rows.len() as u64;

            tracing::debug!(
                page = page_index,
                offset = offset,
                rows = page_len,
                total = ?page.total,
                "Fetched mandi price page"
            );

            rows.extend(page.rows);

            let reached_total = page.total.is_some_and(|t| rows.len() as u64 >= t);
            if page_len < limit || reached_total {
                return Ok(rows);
            }
        }

        tracing::warn!(
            max_pages = self.config.max_pages,
            rows = rows.len(),
            "Stopped paging mandi price feed at page cap"
        );
        Ok(rows)
    }
}

/// Decode one response body. An envelope flagged `"status": "error"`, or any
/// object without `records`, counts as the upstream being unavailable.
pub fn parse_page(body: &str) -> Result<FeedPage, SyncError> {
    let payload: Value = serde_json::from_str(body).map_err(|e| {
        SyncError::UpstreamUnavailable(format!("undecodable feed payload: {}", e))
    })?;

    let object = match payload {
        Value::Array(rows) => return Ok(FeedPage { rows, total: None }),
        Value::Object(object) => object,
        other => {
            return Err(SyncError::UpstreamUnavailable(format!(
                "unexpected feed payload: {}",
                truncate(&other.to_string(), 200)
            )));
        }
    };

    let status = object.get("status").and_then(Value::as_str);
    if status.is_some_and(|s| s.eq_ignore_ascii_case("error")) {
        let message = object
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("no message");
        return Err(SyncError::UpstreamUnavailable(format!(
            "data.gov.in reported error: {}",
            message
        )));
    }

    let excerpt = truncate(&Value::Object(object.clone()).to_string(), 200);
    let envelope: Envelope = serde_json::from_value(Value::Object(object)).map_err(|e| {
        SyncError::UpstreamUnavailable(format!("feed payload without records ({}): {}", e, excerpt))
    })?;

    Ok(FeedPage {
        rows: envelope.records,
        total: envelope.total,
    })
}

fn truncate(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}
