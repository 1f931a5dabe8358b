//! External rate-quote sources
//!
//! The bronze stage only needs one thing from a source: the latest raw
//! response for a base currency, as an untouched JSON value.

pub mod exchange_rate_api;

pub use exchange_rate_api::ExchangeRateApiSource;

use crate::error::Result;
use std::future::Future;

/// Trait for latest-rate providers
pub trait RateQuoteSource {
    /// Fetch the raw latest-rates response for `base_currency`
    fn fetch_latest(
        &self,
        base_currency: &str,
    ) -> impl Future<Output = Result<serde_json::Value>> + Send;

    /// Get the source name
    fn name(&self) -> &str;
}
