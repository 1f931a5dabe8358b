//! Declarative report schema for the gold layer
//!
//! Describes which raw currency columns survive into the report, what they
//! are called there, and which cross rates are derived from them.

use serde::{Deserialize, Serialize};

/// Rename of a raw currency column into a report column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMapping {
    pub source: String,
    pub output: String,
}

/// Cross rate derived as `numerator / denominator`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrossRate {
    pub numerator: String,
    pub denominator: String,
    pub output: String,
}

/// Fixed output schema of the gold snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSchema {
    #[serde(default)]
    pub renames: Vec<ColumnMapping>,
    #[serde(default)]
    pub cross_rates: Vec<CrossRate>,
}

impl ReportSchema {
    pub fn new(renames: Vec<ColumnMapping>, cross_rates: Vec<CrossRate>) -> Self {
        Self {
            renames,
            cross_rates,
        }
    }

    /// Default report for a base currency: base→USD, base→EUR and USD→EUR
    pub fn for_base(base_currency: &str) -> Self {
        Self {
            renames: vec![
                ColumnMapping::new("USD", format!("{}_to_USD", base_currency)),
                ColumnMapping::new("EUR", format!("{}_to_EUR", base_currency)),
            ],
            cross_rates: vec![CrossRate::new("EUR", "USD", "USD_to_EUR")],
        }
    }

    /// Report column names in output order (renamed columns, then cross rates)
    pub fn output_order(&self) -> impl Iterator<Item = &str> {
        self.renames
            .iter()
            .map(|m| m.output.as_str())
            .chain(self.cross_rates.iter().map(|c| c.output.as_str()))
    }
}

impl ColumnMapping {
    pub fn new(source: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            output: output.into(),
        }
    }
}

impl CrossRate {
    pub fn new(
        numerator: impl Into<String>,
        denominator: impl Into<String>,
        output: impl Into<String>,
    ) -> Self {
        Self {
            numerator: numerator.into(),
            denominator: denominator.into(),
            output: output.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_schema_for_brl() {
        let schema = ReportSchema::for_base("BRL");
        let order: Vec<&str> = schema.output_order().collect();
        assert_eq!(order, vec!["BRL_to_USD", "BRL_to_EUR", "USD_to_EUR"]);
        assert_eq!(schema.cross_rates[0].numerator, "EUR");
        assert_eq!(schema.cross_rates[0].denominator, "USD");
    }
}
