//! Pipeline engine: runs stages standalone or as one orchestrated run

use crate::config::PipelineConfig;
use crate::data::artifacts::{ArtifactStore, Layer};
use crate::data::codec;
use crate::data::sources::RateQuoteSource;
use crate::error::{FxError, Result};
use crate::pipeline::narrative::{self, NarrativeGenerator};
use crate::pipeline::normalize::parse_collection_date;
use crate::pipeline::{
    aggregate, capture, normalize, report, BronzeOutput, ComparisonReport, GoldOutput,
    SilverOutput, StageOutcome,
};
use chrono::NaiveDate;
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Lifecycle of an orchestrated run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RunState {
    Idle,
    Fetching,
    Validating,
    Aggregating,
    Comparing,
    Reporting,
    Done,
    Failed,
}

impl RunState {
    /// The state that follows on success
    pub fn next(&self) -> Option<RunState> {
        match self {
            RunState::Idle => Some(RunState::Fetching),
            RunState::Fetching => Some(RunState::Validating),
            RunState::Validating => Some(RunState::Aggregating),
            RunState::Aggregating => Some(RunState::Comparing),
            RunState::Comparing => Some(RunState::Reporting),
            RunState::Reporting => Some(RunState::Done),
            RunState::Done | RunState::Failed => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Done | RunState::Failed)
    }

    /// Forward by one, or to `Failed` from any non-terminal state
    pub fn can_transition_to(&self, to: RunState) -> bool {
        if self.is_terminal() {
            return false;
        }
        to == RunState::Failed || self.next() == Some(to)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunState::Idle => "idle",
            RunState::Fetching => "fetching",
            RunState::Validating => "validating",
            RunState::Aggregating => "aggregating",
            RunState::Comparing => "comparing",
            RunState::Reporting => "reporting",
            RunState::Done => "done",
            RunState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// One orchestrated run and everything it produced
#[derive(Debug)]
pub struct PipelineRun {
    pub id: Uuid,
    pub date: NaiveDate,
    pub state: RunState,
    /// States visited, in order, starting with `Idle`
    pub history: Vec<RunState>,
    pub warnings: Vec<String>,
    pub report: Option<ComparisonReport>,
    pub narrative: Option<String>,
    pub failure: Option<FxError>,
}

impl PipelineRun {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            id: Uuid::new_v4(),
            date,
            state: RunState::Idle,
            history: vec![RunState::Idle],
            warnings: Vec::new(),
            report: None,
            narrative: None,
            failure: None,
        }
    }

    pub fn transition(&mut self, to: RunState) -> Result<()> {
        if !self.state.can_transition_to(to) {
            return Err(FxError::InvalidTransition {
                from: self.state.to_string(),
                to: to.to_string(),
            });
        }
        log::debug!("[{}] {} -> {}", self.id, self.state, to);
        self.state = to;
        self.history.push(to);
        Ok(())
    }

    /// Move to `Failed`, keeping the error that caused it
    pub fn fail(&mut self, error: FxError) {
        if !self.state.is_terminal() {
            self.state = RunState::Failed;
            self.history.push(RunState::Failed);
        }
        self.failure = Some(error);
    }

    pub fn is_done(&self) -> bool {
        self.state == RunState::Done
    }

    /// Done, but with at least one non-fatal problem
    pub fn is_degraded(&self) -> bool {
        self.is_done() && !self.warnings.is_empty()
    }
}

/// Runs pipeline stages against one artifact store
pub struct PipelineEngine<S: ArtifactStore> {
    config: PipelineConfig,
    store: S,
}

impl<S: ArtifactStore> PipelineEngine<S> {
    pub fn new(config: PipelineConfig, store: S) -> Self {
        Self { config, store }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Bronze: capture today's rates for the configured base currency
    pub async fn collect<Q: RateQuoteSource>(
        &self,
        source: &Q,
        date: NaiveDate,
    ) -> Result<BronzeOutput> {
        capture::run_capture(&self.store, source, &self.config.api.base_currency, date).await
    }

    /// Silver: normalize the latest capture
    pub fn silver(&self) -> Result<StageOutcome<SilverOutput>> {
        normalize::run_silver(&self.store)
    }

    /// Gold: aggregate the latest silver table
    pub fn gold(&self) -> Result<StageOutcome<GoldOutput>> {
        aggregate::run_gold(&self.store, self.config.schema.as_ref())
    }

    /// Compare the gold snapshot of `date` with the day before and write the chart
    pub fn report(&self, date: NaiveDate) -> Result<StageOutcome<ComparisonReport>> {
        report::run_report(&self.store, &self.config.report_dir, date)
    }

    /// Ask for an executive explanation of a finished report
    ///
    /// Never fails: a missing generator or a service error yields `None`.
    pub async fn narrate<N: NarrativeGenerator>(
        &self,
        generator: Option<&N>,
        report: &ComparisonReport,
    ) -> Option<String> {
        let generator = match generator {
            Some(generator) => generator,
            None => {
                log::warn!("No text-generation key configured; skipping narrative");
                return None;
            }
        };
        let prompt = narrative::comparison_prompt(
            report.base_currency(),
            &report::markdown_table(&report.body),
            report.body.is_degraded(),
        );
        narrative::narrate(generator, &prompt).await
    }

    /// Read the latest gold snapshot and request business insights for it
    pub async fn enrich<N: NarrativeGenerator>(
        &self,
        generator: Option<&N>,
    ) -> Result<StageOutcome<Option<String>>> {
        let (key, frame) = match self.latest_gold_frame()? {
            StageOutcome::Completed(found) => found,
            StageOutcome::Skipped(reason) => return Ok(StageOutcome::Skipped(reason)),
        };
        let snapshot = codec::frame_to_snapshot(&frame)?;
        log::info!("Loaded gold snapshot {} ({} rows)", key, snapshot.rows.len());

        let generator = match generator {
            Some(generator) => generator,
            None => {
                log::warn!("No text-generation key configured; skipping insights");
                return Ok(StageOutcome::Completed(None));
            }
        };
        let base = snapshot
            .rows
            .first()
            .map(|r| r.base_currency.clone())
            .unwrap_or_else(|| self.config.api.base_currency.clone());
        let prompt =
            narrative::insights_prompt(&base, &report::snapshot_markdown(&snapshot));
        Ok(StageOutcome::Completed(
            narrative::narrate(generator, &prompt).await,
        ))
    }

    /// Latest gold artifact as a data frame, with its key
    pub fn latest_gold_frame(&self) -> Result<StageOutcome<(String, DataFrame)>> {
        let key = match self.store.latest(Layer::Gold)? {
            Some(key) => key,
            None => return Ok(StageOutcome::missing(Layer::Gold)),
        };
        match self.store.get(Layer::Gold, &key)? {
            Some(bytes) => Ok(StageOutcome::Completed((key, codec::decode_gold_frame(bytes)?))),
            None => Ok(StageOutcome::missing(Layer::Gold)),
        }
    }

    /// Run every stage in order for `date`
    ///
    /// The returned run is either `Done` (possibly with warnings) or
    /// `Failed` with the error that stopped it.
    pub async fn run<Q, N>(&self, source: &Q, generator: Option<&N>, date: NaiveDate) -> PipelineRun
    where
        Q: RateQuoteSource,
        N: NarrativeGenerator,
    {
        let mut run = PipelineRun::new(date);
        log::info!("[{}] Starting run for {}", run.id, date);

        match self.drive(&mut run, source, generator).await {
            Ok(()) => log::info!(
                "[{}] Run finished with {} warning(s)",
                run.id,
                run.warnings.len()
            ),
            Err(e) => {
                log::error!("[{}] Run failed while {}: {}", run.id, run.state, e);
                run.fail(e);
            }
        }
        run
    }

    async fn drive<Q, N>(
        &self,
        run: &mut PipelineRun,
        source: &Q,
        generator: Option<&N>,
    ) -> Result<()>
    where
        Q: RateQuoteSource,
        N: NarrativeGenerator,
    {
        run.transition(RunState::Fetching)?;
        self.collect(source, run.date).await?;

        run.transition(RunState::Validating)?;
        let silver = self.silver()?.into_result()?;
        log::info!("[{}] Silver table {} has {} rows", run.id, silver.key, silver.stats.rows_kept());

        run.transition(RunState::Aggregating)?;
        let gold = self.gold()?.into_result()?;

        run.transition(RunState::Comparing)?;
        let report_date = parse_collection_date(&gold.key)?;
        let report = self.report(report_date)?.into_result()?;
        run.warnings.extend(report.warnings.iter().cloned());

        run.transition(RunState::Reporting)?;
        run.narrative = self.narrate(generator, &report).await;
        if run.narrative.is_none() {
            run.warnings.push("Narrative unavailable".to_string());
        }
        run.report = Some(report);

        run.transition(RunState::Done)
    }
}
