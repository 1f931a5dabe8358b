//! Property tests for silver validation and gold pivoting

use chrono::NaiveDate;
use proptest::prelude::*;
use rusty_fx::pipeline::{aggregate, clean_rates, pivot};
use rusty_fx::schema::ReportSchema;
use rusty_fx::types::RateRow;
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, BTreeSet};

/// A raw rate value paired with whether it should survive validation
fn raw_rate() -> impl Strategy<Value = (Value, bool)> {
    prop_oneof![
        (0.0001f64..1.0e6).prop_map(|r| (json!(r), true)),
        (0.0001f64..1.0e6).prop_map(|r| (json!(r.to_string()), true)),
        (-1.0e6f64..=0.0).prop_map(|r| (json!(r), false)),
        "[a-z]{1,8}".prop_map(|s| (json!(s), false)),
        Just((Value::Null, false)),
        Just((json!({"nested": 1}), false)),
    ]
}

fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 9, 30).unwrap()
}

proptest! {
    #[test]
    fn kept_rows_are_input_minus_failing(rates in prop::collection::btree_map("[A-Z]{3}", raw_rate(), 0..40)) {
        let failing = rates.values().filter(|(_, valid)| !valid).count();
        let map: Map<String, Value> = rates
            .iter()
            .map(|(currency, (raw, _))| (currency.clone(), raw.clone()))
            .collect();

        let (table, stats) = clean_rates(&map, "BRL", date());

        prop_assert_eq!(table.len(), rates.len() - failing);
        prop_assert_eq!(stats.rows_in, rates.len());
        prop_assert_eq!(stats.rows_dropped, failing);
        prop_assert!(table.iter().all(|row| row.rate.is_finite() && row.rate > 0.0));
    }

    #[test]
    fn pivot_yields_one_row_per_date_and_base(
        entries in prop::collection::btree_map(
            ("[A-Z]{3}", 0u32..3, prop::sample::select(vec!["BRL", "USD"])),
            0.01f64..100.0,
            1..30,
        )
    ) {
        let table: Vec<RateRow> = entries
            .iter()
            .map(|((currency, offset, base), rate)| {
                RateRow::new(currency.as_str(), *rate, *base, date() + chrono::Duration::days(i64::from(*offset)))
            })
            .collect();
        let expected: BTreeSet<(NaiveDate, String)> = table
            .iter()
            .map(|r| (r.collected_date, r.base_currency.clone()))
            .collect();

        let wide = pivot(&table).unwrap();
        prop_assert_eq!(wide.len(), expected.len());

        let snapshot = aggregate(&table, &ReportSchema::for_base("BRL")).unwrap();
        let keys: Vec<(NaiveDate, String)> = snapshot
            .rows
            .iter()
            .map(|r| (r.collected_date, r.base_currency.clone()))
            .collect();
        let unique: BTreeSet<_> = keys.iter().cloned().collect();
        prop_assert_eq!(keys.len(), unique.len());
    }

    #[test]
    fn cross_rate_is_ratio_of_raw_rates(usd in 0.01f64..100.0, eur in 0.01f64..100.0) {
        let table = vec![
            RateRow::new("USD", usd, "BRL", date()),
            RateRow::new("EUR", eur, "BRL", date()),
        ];
        let snapshot = aggregate(&table, &ReportSchema::for_base("BRL")).unwrap();
        let row = &snapshot.rows[0];

        let values: BTreeMap<&str, f64> = ["BRL_to_USD", "BRL_to_EUR", "USD_to_EUR"]
            .into_iter()
            .filter_map(|c| row.get(c).map(|v| (c, v)))
            .collect();
        prop_assert_eq!(values.len(), 3);
        prop_assert_eq!(values["BRL_to_USD"], usd);
        prop_assert_eq!(values["USD_to_EUR"], eur / usd);
    }
}
