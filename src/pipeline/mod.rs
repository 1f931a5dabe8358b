//! Bronze → silver → gold → report stages
//!
//! Every stage reads the latest artifact of its predecessor layer from an
//! [`ArtifactStore`](crate::data::ArtifactStore) and writes at most one
//! artifact of its own. A stage whose input is absent reports
//! [`StageOutcome::Skipped`] instead of failing.

pub mod aggregate;
pub mod capture;
pub mod compare;
pub mod narrative;
pub mod normalize;
pub mod report;

pub use aggregate::{aggregate, pivot, run_gold, GoldOutput};
pub use capture::{run_capture, BronzeOutput};
pub use compare::{compare, percentage_change};
pub use narrative::{comparison_prompt, insights_prompt, narrate, GeminiClient, NarrativeGenerator};
pub use normalize::{clean_rates, normalize_capture, run_silver, SilverOutput};
pub use report::{markdown_table, run_report, snapshot_markdown, ComparisonReport, ReportBody};

use crate::data::Layer;
use crate::error::FxError;

/// Result of running a stage that may have nothing to do
#[derive(Debug)]
pub enum StageOutcome<T> {
    /// The stage ran and produced its output
    Completed(T),
    /// The stage had no input; nothing was written
    Skipped(FxError),
}

impl<T> StageOutcome<T> {
    /// Skip because the predecessor layer holds no artifact
    pub fn missing(layer: Layer) -> Self {
        StageOutcome::Skipped(FxError::PredecessorMissing {
            layer: layer.to_string(),
        })
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, StageOutcome::Skipped(_))
    }

    pub fn completed(self) -> Option<T> {
        match self {
            StageOutcome::Completed(value) => Some(value),
            StageOutcome::Skipped(_) => None,
        }
    }

    /// Treat a skip as an error, as the orchestrated run does
    pub fn into_result(self) -> crate::error::Result<T> {
        match self {
            StageOutcome::Completed(value) => Ok(value),
            StageOutcome::Skipped(reason) => Err(reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_outcome() {
        let outcome: StageOutcome<()> = StageOutcome::missing(Layer::Silver);
        assert!(outcome.is_skipped());
        match outcome.into_result() {
            Err(FxError::PredecessorMissing { layer }) => assert_eq!(layer, "silver"),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_completed_outcome() {
        let outcome = StageOutcome::Completed(3);
        assert!(!outcome.is_skipped());
        assert_eq!(outcome.completed(), Some(3));
    }
}
