//! Tests for pipeline error messages and classification

use chrono::NaiveDate;
use rusty_fx::error::FxError;
use rusty_fx::pipeline::normalize::parse_collection_date;
use std::error::Error;

#[cfg(test)]
mod fx_error_tests {
    use super::*;

    // ========== Stage errors ==========

    #[test]
    fn test_predecessor_missing() {
        let err = FxError::PredecessorMissing {
            layer: "silver".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("No silver artifact"));
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_invalid_source_data() {
        let err = FxError::InvalidSourceData("capture has no base_code".to_string());
        assert_eq!(err.to_string(), "Invalid source data: capture has no base_code");
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_date_parse_error_keeps_source() {
        let err = parse_collection_date("latest_capture").unwrap_err();
        assert!(matches!(&err, FxError::DateParseError { key, .. } if key == "latest_capture"));
        assert!(err.to_string().contains("latest_capture"));
        assert!(err.source().is_some());
    }

    #[test]
    fn test_aggregation_error() {
        let err = FxError::AggregationError {
            currency: "USD".to_string(),
            base_currency: "BRL".to_string(),
            collected_date: NaiveDate::from_ymd_opt(2025, 9, 30).unwrap(),
        };
        let msg = err.to_string();
        assert!(msg.contains("Ambiguous pivot"));
        assert!(msg.contains("USD"));
        assert!(msg.contains("BRL"));
        assert!(msg.contains("2025-09-30"));
    }

    #[test]
    fn test_comparison_unavailable_is_recoverable() {
        let err = FxError::ComparisonUnavailable {
            date: NaiveDate::from_ymd_opt(2025, 9, 30).unwrap(),
            reason: "no prior-day snapshot".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "No comparison for 2025-09-30: no prior-day snapshot"
        );
        assert!(err.is_recoverable());
    }

    // ========== Ambient errors ==========

    #[test]
    fn test_external_service() {
        let err = FxError::external("rate API", "returned 403 Forbidden");
        assert_eq!(err.to_string(), "rate API failed: returned 403 Forbidden");
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_invalid_transition() {
        let err = FxError::InvalidTransition {
            from: "idle".to_string(),
            to: "done".to_string(),
        };
        assert_eq!(err.to_string(), "Invalid run transition: idle -> done");
    }

    #[test]
    fn test_from_io_error() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only");
        let err: FxError = io.into();
        assert!(matches!(err, FxError::Io(_)));
        assert!(err.to_string().contains("read-only"));
    }

    #[test]
    fn test_from_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: FxError = json_err.into();
        assert!(matches!(err, FxError::Json(_)));
    }

    #[test]
    fn test_config_error() {
        let err = FxError::Config("API_KEY is not set".to_string());
        assert!(err.to_string().starts_with("Configuration error"));
    }
}
