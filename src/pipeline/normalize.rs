//! Silver stage: validate and normalize one bronze capture
//!
//! The nested `conversion_rates` map becomes a flat table of
//! `(currency, rate, base_currency, collected_date)` rows. Rates that are
//! missing, non-numeric, non-finite, zero or negative are dropped, never
//! defaulted.

use super::StageOutcome;
use crate::data::artifacts::{ArtifactStore, Layer};
use crate::data::codec;
use crate::error::{FxError, Result};
use crate::types::{NormalizeStats, RateRow, ValidatedTable, DATE_FORMAT};
use chrono::NaiveDate;
use serde_json::{Map, Value};

const SUCCESS: &str = "success";

/// Coerce a raw JSON rate to a number; anything that is not a number or a
/// numeric string is treated as missing
pub fn coerce_rate(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// Rates that survive validation: finite and strictly positive
pub fn is_valid_rate(rate: f64) -> bool {
    rate.is_finite() && rate > 0.0
}

/// Flatten and filter a rate map
pub fn clean_rates(
    rates: &Map<String, Value>,
    base_currency: &str,
    collected_date: NaiveDate,
) -> (ValidatedTable, NormalizeStats) {
    let table: ValidatedTable = rates
        .iter()
        .filter_map(|(currency, raw)| {
            coerce_rate(raw)
                .filter(|rate| is_valid_rate(*rate))
                .map(|rate| RateRow::new(currency.as_str(), rate, base_currency, collected_date))
        })
        .collect();

    let stats = NormalizeStats {
        rows_in: rates.len(),
        rows_dropped: rates.len() - table.len(),
    };
    (table, stats)
}

/// Collection date from an artifact key; the first ten characters must be `YYYY-MM-DD`
pub fn parse_collection_date(key: &str) -> Result<NaiveDate> {
    let date_part = key.get(..10).unwrap_or(key);
    NaiveDate::parse_from_str(date_part, DATE_FORMAT).map_err(|e| FxError::DateParseError {
        key: key.to_string(),
        source: e,
    })
}

/// Validate the capture's structural contract and normalize it
pub fn normalize_capture(capture: &Value, key: &str) -> Result<(ValidatedTable, NormalizeStats)> {
    let status = capture.get("result").and_then(Value::as_str);
    if status != Some(SUCCESS) {
        return Err(FxError::InvalidSourceData(format!(
            "capture status is {:?}, expected \"{}\"",
            status, SUCCESS
        )));
    }

    let rates = capture
        .get("conversion_rates")
        .and_then(Value::as_object)
        .ok_or_else(|| {
            FxError::InvalidSourceData("capture has no conversion_rates mapping".to_string())
        })?;

    let base_currency = capture
        .get("base_code")
        .and_then(Value::as_str)
        .ok_or_else(|| FxError::InvalidSourceData("capture has no base_code".to_string()))?;

    let collected_date = parse_collection_date(key)?;

    Ok(clean_rates(rates, base_currency, collected_date))
}

/// Result of a completed silver run
#[derive(Debug, Clone)]
pub struct SilverOutput {
    pub key: String,
    pub location: String,
    pub stats: NormalizeStats,
}

/// Read the latest bronze capture, normalize it and write the silver table
pub fn run_silver<S: ArtifactStore>(store: &S) -> Result<StageOutcome<SilverOutput>> {
    let key = match store.latest(Layer::Bronze)? {
        Some(key) => key,
        None => return Ok(StageOutcome::missing(Layer::Bronze)),
    };
    let bytes = match store.get(Layer::Bronze, &key)? {
        Some(bytes) => bytes,
        None => return Ok(StageOutcome::missing(Layer::Bronze)),
    };
    log::info!("Reading bronze capture {}", key);

    let capture = codec::decode_capture(&bytes)?;
    let (table, stats) = normalize_capture(&capture, &key)?;

    log::info!(
        "Rows in: {}, rows dropped as missing/non-numeric/non-positive: {}",
        stats.rows_in,
        stats.rows_dropped
    );
    if table.is_empty() {
        log::warn!("Capture {} produced no valid rates", key);
    }

    let location = store.put(Layer::Silver, &key, &codec::encode_silver(&table)?)?;
    log::info!("Normalized data saved to {}", location);

    Ok(StageOutcome::Completed(SilverOutput {
        key,
        location,
        stats,
    }))
}
