//! ExchangeRate-API style source
//!
//! `GET {base_url}/{api_key}/latest/{base}` returning
//! `{"result": "success", "base_code": ..., "conversion_rates": {...}}`.

use super::RateQuoteSource;
use crate::config::PipelineConfig;
use crate::error::{FxError, Result};
use reqwest::Client;
use std::future::Future;
use std::time::Duration;

const SOURCE_NAME: &str = "exchange-rate-api";

/// Latest-rates HTTP source
pub struct ExchangeRateApiSource {
    client: Client,
    base_url: String,
    api_key: String,
}

impl ExchangeRateApiSource {
    /// Create a new source
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| FxError::external(SOURCE_NAME, format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
        })
    }

    /// Build from configuration; fails before any request when credentials are missing
    pub fn from_config(config: &PipelineConfig) -> Result<Self> {
        let base_url = config
            .api
            .base_url
            .clone()
            .ok_or_else(|| FxError::Config("API_BASE_URL is not set".to_string()))?;
        let api_key = config
            .api
            .api_key
            .clone()
            .ok_or_else(|| FxError::Config("API_KEY is not set".to_string()))?;
        Self::new(base_url, api_key)
    }

    pub fn latest_url(&self, base_currency: &str) -> String {
        format!(
            "{}/{}/latest/{}",
            self.base_url.trim_end_matches('/'),
            self.api_key,
            base_currency
        )
    }

    async fn request(&self, base_currency: &str) -> Result<serde_json::Value> {
        let url = self.latest_url(base_currency);
        log::debug!("Requesting latest rates for {}", base_currency);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| FxError::external(SOURCE_NAME, format!("HTTP request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(FxError::external(
                SOURCE_NAME,
                format!("rate API returned error: {}", response.status()),
            ));
        }

        response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| FxError::external(SOURCE_NAME, format!("JSON parse error: {}", e)))
    }
}

impl RateQuoteSource for ExchangeRateApiSource {
    fn fetch_latest(
        &self,
        base_currency: &str,
    ) -> impl Future<Output = Result<serde_json::Value>> + Send {
        self.request(base_currency)
    }

    fn name(&self) -> &str {
        SOURCE_NAME
    }
}
