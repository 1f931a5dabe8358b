//! Bronze stage: capture the raw rate response

use crate::data::artifacts::{ArtifactStore, Layer};
use crate::data::codec;
use crate::data::sources::RateQuoteSource;
use crate::error::Result;
use crate::types::DATE_FORMAT;
use chrono::NaiveDate;

/// Result of a completed bronze run
#[derive(Debug, Clone)]
pub struct BronzeOutput {
    pub key: String,
    pub location: String,
}

/// Fetch the latest rates and store the response untouched under `date`
///
/// Nothing is written when the request fails.
pub async fn run_capture<S, Q>(
    store: &S,
    source: &Q,
    base_currency: &str,
    date: NaiveDate,
) -> Result<BronzeOutput>
where
    S: ArtifactStore,
    Q: RateQuoteSource,
{
    log::info!("Fetching {} rates from {}", base_currency, source.name());
    let capture = source.fetch_latest(base_currency).await?;

    let key = date.format(DATE_FORMAT).to_string();
    let location = store.put(Layer::Bronze, &key, &codec::encode_capture(&capture)?)?;
    log::info!("Raw data saved to {}", location);

    Ok(BronzeOutput { key, location })
}
