//! Day-over-day comparison of two gold snapshots

use crate::error::{FxError, Result};
use crate::types::{AggregatedSnapshot, ChangeEntry, ComparisonRow, SnapshotRow};
use chrono::NaiveDate;

/// `(today - yesterday) / yesterday * 100`, only when yesterday is present and non-zero
pub fn percentage_change(today: f64, yesterday: Option<f64>) -> Option<f64> {
    match yesterday {
        Some(prev) if prev != 0.0 => Some((today - prev) / prev * 100.0),
        _ => None,
    }
}

fn compare_rows(columns: &[String], today: &SnapshotRow, yesterday: &SnapshotRow) -> ComparisonRow {
    let entries = columns
        .iter()
        .filter_map(|column| {
            today.get(column).map(|value| ChangeEntry {
                column: column.clone(),
                today: value,
                change_pct: percentage_change(value, yesterday.get(column)),
            })
        })
        .collect();

    ComparisonRow {
        collected_date: today.collected_date,
        base_currency: today.base_currency.clone(),
        entries,
    }
}

/// Most recent row of `snapshot` for a base currency
fn latest_row_for_base<'a>(snapshot: &'a AggregatedSnapshot, base: &str) -> Option<&'a SnapshotRow> {
    snapshot
        .rows
        .iter()
        .filter(|r| r.base_currency == base)
        .max_by_key(|r| r.collected_date)
}

/// Join today and yesterday on `base_currency` and compute changes for every
/// rate column present in both snapshots
pub fn compare(
    date: NaiveDate,
    today: &AggregatedSnapshot,
    yesterday: Option<&AggregatedSnapshot>,
) -> Result<Vec<ComparisonRow>> {
    let unavailable = |reason: &str| FxError::ComparisonUnavailable {
        date,
        reason: reason.to_string(),
    };
    if today.rows.is_empty() {
        return Err(unavailable("today's snapshot has no rows"));
    }
    let yesterday = yesterday.ok_or_else(|| unavailable("no prior-day snapshot"))?;

    let shared: Vec<String> = today
        .columns
        .iter()
        .filter(|c| yesterday.has_column(c))
        .cloned()
        .collect();

    let rows: Vec<ComparisonRow> = today
        .rows
        .iter()
        .filter_map(|row| {
            latest_row_for_base(yesterday, &row.base_currency)
                .map(|prev| compare_rows(&shared, row, prev))
        })
        .collect();

    if rows.is_empty() {
        return Err(unavailable("no base currency shared with the prior-day snapshot"));
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn snapshot(date: NaiveDate, base: &str, values: &[(&str, f64)]) -> AggregatedSnapshot {
        let values: BTreeMap<String, f64> =
            values.iter().map(|(k, v)| (k.to_string(), *v)).collect();
        AggregatedSnapshot {
            columns: values.keys().cloned().collect(),
            rows: vec![SnapshotRow {
                collected_date: date,
                base_currency: base.to_string(),
                values,
            }],
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 9, 30).unwrap()
    }

    fn yesterday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 9, 29).unwrap()
    }

    #[test]
    fn test_usd_change_pct() {
        let t = snapshot(today(), "BRL", &[("USD", 5.0)]);
        let y = snapshot(yesterday(), "BRL", &[("USD", 4.0)]);

        let rows = compare(today(), &t, Some(&y)).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].value("USD_CHANGE_PCT"), Some(25.0));
        assert_eq!(rows[0].value("USD"), Some(5.0));
        assert_eq!(rows[0].collected_date, today());
    }

    #[test]
    fn test_zero_prior_rate_has_no_change() {
        let t = snapshot(today(), "BRL", &[("USD", 5.0)]);
        let y = snapshot(yesterday(), "BRL", &[("USD", 0.0)]);

        let rows = compare(today(), &t, Some(&y)).unwrap();
        let entry = rows[0].entry("USD").unwrap();
        assert_eq!(entry.change_pct, None);
        assert_eq!(entry.today, 5.0);
    }

    #[test]
    fn test_only_shared_columns_are_compared() {
        let t = snapshot(today(), "BRL", &[("USD", 5.0), ("EUR", 6.0)]);
        let y = snapshot(yesterday(), "BRL", &[("USD", 4.0)]);

        let rows = compare(today(), &t, Some(&y)).unwrap();
        assert!(rows[0].entry("EUR").is_none());
        assert!(rows[0].entry("USD").is_some());
    }

    #[test]
    fn test_missing_yesterday_is_unavailable() {
        let t = snapshot(today(), "BRL", &[("USD", 5.0)]);
        let err = compare(today(), &t, None).unwrap_err();
        match err {
            FxError::ComparisonUnavailable { date, reason } => {
                assert_eq!(date, today());
                assert_eq!(reason, "no prior-day snapshot");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_different_base_is_unavailable() {
        let t = snapshot(today(), "BRL", &[("USD", 5.0)]);
        let y = snapshot(yesterday(), "EUR", &[("USD", 4.0)]);
        assert!(matches!(
            compare(today(), &t, Some(&y)),
            Err(FxError::ComparisonUnavailable { .. })
        ));
    }

    #[test]
    fn test_empty_today_is_reported_as_such() {
        let t = AggregatedSnapshot::default();
        let y = snapshot(yesterday(), "BRL", &[("USD", 4.0)]);

        let err = compare(today(), &t, Some(&y)).unwrap_err();
        assert!(err.to_string().contains("today's snapshot has no rows"));
        assert!(!err.to_string().contains("prior-day"));
    }

    #[test]
    fn test_percentage_change() {
        assert_eq!(percentage_change(4.0, Some(5.0)), Some(-20.0));
        assert_eq!(percentage_change(4.0, None), None);
        assert_eq!(percentage_change(4.0, Some(0.0)), None);
    }
}
