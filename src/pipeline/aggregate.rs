//! Gold stage: pivot the silver table into the report snapshot

use super::StageOutcome;
use crate::data::artifacts::{ArtifactStore, Layer};
use crate::data::codec;
use crate::error::{FxError, Result};
use crate::schema::ReportSchema;
use crate::types::{AggregatedSnapshot, CurrencyCode, Rate, RateRow, SnapshotRow};
use chrono::NaiveDate;
use std::collections::BTreeMap;

/// Pivot key: one wide row per collection date and base currency
pub type PivotKey = (NaiveDate, CurrencyCode);

/// Long-to-wide pivot; a currency may appear only once per key
pub fn pivot(table: &[RateRow]) -> Result<BTreeMap<PivotKey, BTreeMap<CurrencyCode, Rate>>> {
    let mut wide: BTreeMap<PivotKey, BTreeMap<CurrencyCode, Rate>> = BTreeMap::new();

    for row in table {
        let columns = wide
            .entry((row.collected_date, row.base_currency.clone()))
            .or_default();
        if columns.insert(row.currency.clone(), row.rate).is_some() {
            return Err(FxError::AggregationError {
                currency: row.currency.clone(),
                base_currency: row.base_currency.clone(),
                collected_date: row.collected_date,
            });
        }
    }

    Ok(wide)
}

/// Derive cross rates, rename and project onto the report schema
pub fn aggregate(table: &[RateRow], schema: &ReportSchema) -> Result<AggregatedSnapshot> {
    let wide = pivot(table)?;

    let rows: Vec<SnapshotRow> = wide
        .into_iter()
        .map(|((collected_date, base_currency), raw)| {
            let mut values = BTreeMap::new();
            for mapping in &schema.renames {
                if let Some(rate) = raw.get(&mapping.source) {
                    values.insert(mapping.output.clone(), *rate);
                }
            }
            for cross in &schema.cross_rates {
                if let (Some(numerator), Some(denominator)) =
                    (raw.get(&cross.numerator), raw.get(&cross.denominator))
                {
                    values.insert(cross.output.clone(), numerator / denominator);
                }
            }
            SnapshotRow {
                collected_date,
                base_currency,
                values,
            }
        })
        .collect();

    let mut columns: Vec<String> = Vec::new();
    for name in schema.output_order() {
        let present = rows.iter().any(|r| r.values.contains_key(name));
        if present && !columns.iter().any(|c| c == name) {
            columns.push(name.to_string());
        }
    }

    Ok(AggregatedSnapshot { columns, rows })
}

/// Result of a completed gold run
#[derive(Debug, Clone)]
pub struct GoldOutput {
    pub key: String,
    pub location: String,
    pub snapshot: AggregatedSnapshot,
}

/// Read the latest silver table, aggregate it and write the gold snapshot
///
/// Without an explicit schema the default one is labelled after the table's
/// own base currency.
pub fn run_gold<S: ArtifactStore>(
    store: &S,
    schema: Option<&ReportSchema>,
) -> Result<StageOutcome<GoldOutput>> {
    let key = match store.latest(Layer::Silver)? {
        Some(key) => key,
        None => return Ok(StageOutcome::missing(Layer::Silver)),
    };
    let bytes = match store.get(Layer::Silver, &key)? {
        Some(bytes) => bytes,
        None => return Ok(StageOutcome::missing(Layer::Silver)),
    };
    log::info!("Reading silver table {}", key);

    let table = codec::decode_silver(&bytes)?;
    let derived;
    let schema = match schema {
        Some(schema) => schema,
        None => {
            let base = table.first().map(|r| r.base_currency.as_str()).unwrap_or_default();
            derived = ReportSchema::for_base(base);
            &derived
        }
    };
    let snapshot = aggregate(&table, schema)?;
    log::debug!(
        "Aggregated {} rows into {} snapshot rows with columns {:?}",
        table.len(),
        snapshot.rows.len(),
        snapshot.columns
    );

    let location = store.put(Layer::Gold, &key, &codec::encode_gold(&snapshot)?)?;
    log::info!("Aggregated data saved to {}", location);

    Ok(StageOutcome::Completed(GoldOutput {
        key,
        location,
        snapshot,
    }))
}
