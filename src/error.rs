//! Error types for rusty-fx

use chrono::NaiveDate;
use thiserror::Error;

/// Main error type for the rate pipeline
#[derive(Error, Debug)]
pub enum FxError {
    #[error("No {layer} artifact found; run the previous stage first")]
    PredecessorMissing { layer: String },

    #[error("Invalid source data: {0}")]
    InvalidSourceData(String),

    #[error("Cannot derive collection date from '{key}': {source}")]
    DateParseError {
        key: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error(
        "Ambiguous pivot: more than one rate for {currency} on {collected_date} (base {base_currency})"
    )]
    AggregationError {
        currency: String,
        base_currency: String,
        collected_date: NaiveDate,
    },

    #[error("No comparison for {date}: {reason}")]
    ComparisonUnavailable { date: NaiveDate, reason: String },

    #[error("{service} failed: {message}")]
    ExternalService { service: String, message: String },

    #[error("Invalid run transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Columnar storage error: {0}")]
    Polars(#[from] polars::error::PolarsError),
}

impl FxError {
    /// Build an [`FxError::ExternalService`] from anything displayable
    pub fn external(service: &str, err: impl std::fmt::Display) -> Self {
        FxError::ExternalService {
            service: service.to_string(),
            message: err.to_string(),
        }
    }

    /// Whether the run may continue past this error with a degraded result
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            FxError::PredecessorMissing { .. } | FxError::ComparisonUnavailable { .. }
        )
    }
}

/// Result type alias for rusty-fx operations
pub type Result<T> = std::result::Result<T, FxError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aggregation_error_message() {
        let err = FxError::AggregationError {
            currency: "USD".to_string(),
            base_currency: "BRL".to_string(),
            collected_date: NaiveDate::from_ymd_opt(2025, 9, 30).unwrap(),
        };
        let msg = err.to_string();
        assert!(msg.contains("USD"));
        assert!(msg.contains("2025-09-30"));
        assert!(msg.contains("BRL"));
    }

    #[test]
    fn test_recoverable_errors() {
        let missing = FxError::PredecessorMissing {
            layer: "silver".to_string(),
        };
        assert!(missing.is_recoverable());

        let date = NaiveDate::from_ymd_opt(2025, 9, 30).unwrap();
        assert!(FxError::ComparisonUnavailable {
            date,
            reason: "no prior-day snapshot".to_string(),
        }
        .is_recoverable());
        assert!(!FxError::InvalidSourceData("bad status".into()).is_recoverable());
    }

    #[test]
    fn test_date_parse_error_keeps_key() {
        let source = NaiveDate::parse_from_str("notadate", "%Y-%m-%d").unwrap_err();
        let err = FxError::DateParseError {
            key: "notadate".to_string(),
            source,
        };
        assert!(err.to_string().contains("notadate"));
    }
}
