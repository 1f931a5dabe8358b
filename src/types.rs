//! Core types and constants

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Exchange rate value (units of quote currency per one unit of base)
pub type Rate = f64;

/// ISO 4217 currency code as delivered by the rate API
pub type CurrencyCode = String;

/// Date format used in artifact keys and tabular output
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Key column: collection date
pub const COLLECTED_DATE: &str = "collected_date";

/// Key column: base currency
pub const BASE_CURRENCY: &str = "base_currency";

/// Suffix for percentage change columns in comparison output
pub const CHANGE_PCT_SUFFIX: &str = "_CHANGE_PCT";

/// One normalized rate observation (silver row)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateRow {
    pub currency: CurrencyCode,
    pub rate: Rate,
    pub base_currency: CurrencyCode,
    pub collected_date: NaiveDate,
}

impl RateRow {
    /// Create a new rate row
    pub fn new(
        currency: impl Into<CurrencyCode>,
        rate: Rate,
        base_currency: impl Into<CurrencyCode>,
        collected_date: NaiveDate,
    ) -> Self {
        Self {
            currency: currency.into(),
            rate,
            base_currency: base_currency.into(),
            collected_date,
        }
    }
}

/// Validated silver table for one collection date and base currency
pub type ValidatedTable = Vec<RateRow>;

/// Row counts recorded by the normalizer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NormalizeStats {
    pub rows_in: usize,
    pub rows_dropped: usize,
}

impl NormalizeStats {
    pub fn rows_kept(&self) -> usize {
        self.rows_in - self.rows_dropped
    }
}

/// One wide row of a gold snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotRow {
    pub collected_date: NaiveDate,
    pub base_currency: CurrencyCode,
    /// Output column name -> value; absent columns are simply missing
    pub values: BTreeMap<String, Rate>,
}

impl SnapshotRow {
    pub fn get(&self, column: &str) -> Option<Rate> {
        self.values.get(column).copied()
    }
}

/// Aggregated gold snapshot
///
/// `columns` lists the rate columns in report-schema order. Key columns
/// (`collected_date`, `base_currency`) are implicit and always come first
/// when the snapshot is written out.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregatedSnapshot {
    pub columns: Vec<String>,
    pub rows: Vec<SnapshotRow>,
}

impl AggregatedSnapshot {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Full column list including key columns, in output order
    pub fn output_columns(&self) -> Vec<String> {
        let mut cols = vec![COLLECTED_DATE.to_string(), BASE_CURRENCY.to_string()];
        cols.extend(self.columns.iter().cloned());
        cols
    }

    /// Whether `column` is one of the rate columns
    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    /// First row for a base currency
    pub fn row_for_base(&self, base_currency: &str) -> Option<&SnapshotRow> {
        self.rows.iter().find(|r| r.base_currency == base_currency)
    }
}

/// Today's value and day-over-day change for one rate column
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEntry {
    pub column: String,
    pub today: Rate,
    /// `None` when yesterday's value is missing or zero
    pub change_pct: Option<f64>,
}

impl ChangeEntry {
    /// Name of the derived percentage column, e.g. `BRL_to_USD_CHANGE_PCT`
    pub fn change_column(&self) -> String {
        format!("{}{}", self.column, CHANGE_PCT_SUFFIX)
    }

    /// Change value usable for charting
    pub fn finite_change(&self) -> Option<f64> {
        self.change_pct.filter(|v| v.is_finite())
    }
}

/// Comparison of today against yesterday for one base currency
#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonRow {
    pub collected_date: NaiveDate,
    pub base_currency: CurrencyCode,
    pub entries: Vec<ChangeEntry>,
}

impl ComparisonRow {
    pub fn entry(&self, column: &str) -> Option<&ChangeEntry> {
        self.entries.iter().find(|e| e.column == column)
    }

    /// Look up a value by derived column name (`X_CHANGE_PCT`) or raw column name
    pub fn value(&self, column: &str) -> Option<f64> {
        match column.strip_suffix(CHANGE_PCT_SUFFIX) {
            Some(raw) => self.entry(raw).and_then(|e| e.change_pct),
            None => self.entry(column).map(|e| e.today),
        }
    }
}
