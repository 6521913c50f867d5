//! HTTP client for the remote quote API.

use crate::config::QuoteApiConfig;
use crate::fetch::pool::PositionPool;
use crate::ticker::QuoteUpdate;
use anyhow::{Context, Result};
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

/// Value the remote attribute engine returns for a field it failed to
/// compute. Such fields carry no update for the cycle.
pub const ERROR_MARKER: &str = "#ERROR!";

/// One row of the quote response, keyed by the `ticker` field.
#[derive(Debug, Clone, Deserialize)]
pub struct QuoteRow {
    pub ticker: String,
    pub price: Option<String>,
    pub change: Option<String>,
    #[serde(rename = "changepct")]
    pub change_pct: Option<String>,
    pub high: Option<String>,
    pub low: Option<String>,
    pub volume: Option<String>,
}

impl QuoteRow {
    /// Convert the row to a snapshot update, dropping error-marker fields so
    /// they leave the existing value untouched.
    pub fn to_update(&self) -> QuoteUpdate {
        QuoteUpdate {
            price: keep(&self.price),
            change: keep(&self.change),
            change_pct: keep(&self.change_pct),
            high: keep(&self.high),
            low: keep(&self.low),
            volume: keep(&self.volume),
        }
    }
}

fn keep(field: &Option<String>) -> Option<String> {
    field
        .as_ref()
        .filter(|value| !value.contains(ERROR_MARKER))
        .cloned()
}

/// Issues one outbound quote request per call, bounded by the position pool.
pub struct QuoteClient {
    http: Client,
    endpoint: String,
    pool: Arc<PositionPool>,
}

impl QuoteClient {
    /// Create a new quote client over a shared position pool.
    pub fn new(config: &QuoteApiConfig, pool: Arc<PositionPool>) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http,
            endpoint: config.endpoint.clone(),
            pool,
        })
    }

    /// Fetch quotes for a comma-joined symbol list and attribute list.
    ///
    /// Borrows a position slot for the duration of the request; the slot id
    /// travels as the `apiPosition` query parameter so the remote service can
    /// route the request to one of its backend contexts. The slot is released
    /// on every completion path, including timeout and parse failure.
    #[instrument(skip(self))]
    pub async fn fetch(&self, ticker_list: &str, attribute_list: &str) -> Result<Vec<QuoteRow>> {
        let position = self.pool.acquire().await;
        debug!(position = position.id(), "Dispatching quote request");

        let position_id = position.id().to_string();
        let response = self
            .http
            .get(&self.endpoint)
            .query(&[
                ("apiPosition", position_id.as_str()),
                ("tickerList", ticker_list),
                ("attributeList", attribute_list),
            ])
            .send()
            .await
            .context("Failed to send quote request")?;

        anyhow::ensure!(
            response.status().is_success(),
            "Quote request failed with status {}",
            response.status()
        );

        response
            .json()
            .await
            .context("Failed to parse quote response")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(price: Option<&str>) -> QuoteRow {
        QuoteRow {
            ticker: "TPE:2330".to_string(),
            price: price.map(str::to_string),
            change: Some("5".to_string()),
            change_pct: Some("0.8".to_string()),
            high: None,
            low: None,
            volume: None,
        }
    }

    #[test]
    fn test_to_update_passes_clean_fields() {
        let update = row(Some("600")).to_update();
        assert_eq!(update.price.as_deref(), Some("600"));
        assert_eq!(update.change.as_deref(), Some("5"));
        assert_eq!(update.high, None);
    }

    #[test]
    fn test_to_update_drops_error_marker() {
        let update = row(Some("#ERROR!")).to_update();
        assert_eq!(update.price, None, "error marker carries no update");
        assert_eq!(update.change.as_deref(), Some("5"), "other fields survive");
    }

    #[test]
    fn test_quote_row_deserializes_partial_response() {
        let raw = r#"[{"ticker":"TPE:2330","price":"600"}]"#;
        let rows: Vec<QuoteRow> = serde_json::from_str(raw).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].ticker, "TPE:2330");
        assert_eq!(rows[0].price.as_deref(), Some("600"));
        assert_eq!(rows[0].volume, None);
    }
}
