//! Byte encodings of the three layers
//!
//! - bronze: the API response as pretty-printed JSON, untouched
//! - silver: CSV with header `currency,rate,base_currency,collected_date`
//! - gold: parquet, key columns first, one nullable f64 column per rate

use crate::error::{FxError, Result};
use crate::types::{
    AggregatedSnapshot, RateRow, SnapshotRow, ValidatedTable, BASE_CURRENCY, COLLECTED_DATE,
    DATE_FORMAT,
};
use chrono::NaiveDate;
use csv::{ReaderBuilder, WriterBuilder};
use polars::prelude::*;
use std::collections::BTreeMap;
use std::io::Cursor;

/// Silver CSV header, written even for empty tables
pub const SILVER_HEADER: [&str; 4] = ["currency", "rate", "base_currency", "collected_date"];

/// Parse a bronze capture; any JSON value is accepted here
pub fn decode_capture(bytes: &[u8]) -> Result<serde_json::Value> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Pretty-printed JSON, as stored in the bronze layer
pub fn encode_capture(capture: &serde_json::Value) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec_pretty(capture)?)
}

/// Silver CSV; the header row is written even when `table` is empty
pub fn encode_silver(table: &[RateRow]) -> Result<Vec<u8>> {
    let mut wtr = WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    wtr.write_record(SILVER_HEADER)?;
    for row in table {
        wtr.serialize(row)?;
    }
    wtr.into_inner().map_err(|e| FxError::Io(e.into_error()))
}

/// Read a silver CSV back into rows, in file order
pub fn decode_silver(bytes: &[u8]) -> Result<ValidatedTable> {
    let mut rdr = ReaderBuilder::new().has_headers(true).from_reader(bytes);
    let mut table = Vec::new();
    for result in rdr.deserialize() {
        let row: RateRow = result?;
        table.push(row);
    }
    Ok(table)
}

/// Build the gold frame: `collected_date`, `base_currency`, then rate columns
pub fn snapshot_to_frame(snapshot: &AggregatedSnapshot) -> Result<DataFrame> {
    let dates: Vec<String> = snapshot
        .rows
        .iter()
        .map(|r| r.collected_date.format(DATE_FORMAT).to_string())
        .collect();
    let bases: Vec<String> = snapshot
        .rows
        .iter()
        .map(|r| r.base_currency.clone())
        .collect();

    let mut columns = Vec::with_capacity(snapshot.columns.len() + 2);
    columns.push(Series::new(COLLECTED_DATE, dates));
    columns.push(Series::new(BASE_CURRENCY, bases));
    for column in &snapshot.columns {
        let values: Vec<Option<f64>> = snapshot.rows.iter().map(|r| r.get(column)).collect();
        columns.push(Series::new(column.as_str(), values));
    }

    Ok(DataFrame::new(columns)?)
}

pub fn frame_to_snapshot(df: &DataFrame) -> Result<AggregatedSnapshot> {
    let dates = df.column(COLLECTED_DATE)?.str()?;
    let bases = df.column(BASE_CURRENCY)?.str()?;
    let rate_series: Vec<&Series> = df
        .get_columns()
        .iter()
        .filter(|s| s.name() != COLLECTED_DATE && s.name() != BASE_CURRENCY)
        .collect();

    let mut rows = Vec::with_capacity(df.height());
    for idx in 0..df.height() {
        let date_str = dates.get(idx).ok_or_else(|| {
            FxError::InvalidSourceData(format!("gold row {} has no {}", idx, COLLECTED_DATE))
        })?;
        let collected_date = NaiveDate::parse_from_str(date_str, DATE_FORMAT).map_err(|e| {
            FxError::DateParseError {
                key: date_str.to_string(),
                source: e,
            }
        })?;
        let base_currency = bases.get(idx).ok_or_else(|| {
            FxError::InvalidSourceData(format!("gold row {} has no {}", idx, BASE_CURRENCY))
        })?;

        let mut values = BTreeMap::new();
        for series in &rate_series {
            if let Some(value) = series.f64()?.get(idx) {
                values.insert(series.name().to_string(), value);
            }
        }

        rows.push(SnapshotRow {
            collected_date,
            base_currency: base_currency.to_string(),
            values,
        });
    }

    Ok(AggregatedSnapshot {
        columns: rate_series.iter().map(|s| s.name().to_string()).collect(),
        rows,
    })
}

pub fn encode_gold(snapshot: &AggregatedSnapshot) -> Result<Vec<u8>> {
    let mut df = snapshot_to_frame(snapshot)?;
    let mut buf = Vec::new();
    ParquetWriter::new(&mut buf).finish(&mut df)?;
    Ok(buf)
}

pub fn decode_gold_frame(bytes: Vec<u8>) -> Result<DataFrame> {
    Ok(ParquetReader::new(Cursor::new(bytes)).finish()?)
}

pub fn decode_gold(bytes: Vec<u8>) -> Result<AggregatedSnapshot> {
    frame_to_snapshot(&decode_gold_frame(bytes)?)
}
