//! Pipeline orchestrator — wires together source, validator, store,
//! aggregation, and insight generation.
//!
//! Two entry points:
//! - `run_daily()`: captures and processes a single business date.
//! - `run_historical()`: fans out over a date range; each date is
//!   captured and validated independently (rayon), so one bad date
//!   never poisons the rest. Aggregation runs once, after every date
//!   has reached a terminal state.
//!
//! Re-runs are idempotent: artifacts are keyed by (layer, date) and
//! overwritten, the run id is a content hash of config + window, and a
//! date whose live fetch fails falls back to its persisted raw tier
//! from an earlier run.

use chrono::NaiveDate;
use rayon::prelude::*;
use std::collections::BTreeMap;
use thiserror::Error;

use fxlab_core::aggregate::{aggregate, AggregateError};
use fxlab_core::capture::capture;
use fxlab_core::domain::{AggregationWindow, RawRecordSet, ValidatedRecordSet};
use fxlab_core::source::{CircuitBreaker, ExchangeRateApi, RateSource, SourceError, SyntheticSource};
use fxlab_core::store::{LayerStore, StoreError};
use fxlab_core::validate::{ValidateError, Validator, ValidatorConfig};

use crate::config::{PipelineConfig, ProviderKind};
use crate::insight::{Insight, InsightError, InsightGenerator, PromptBuilder};
use crate::report::{RunMode, RunReport, RunStatus, Stage, StageStatus};

/// Errors that fail a whole run. Per-date problems are not errors —
/// they land in the report's failure map instead.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("source error: {0}")]
    Source(#[from] SourceError),
    #[error("validation error: {0}")]
    Validate(#[from] ValidateError),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("window start {0} is after end {1}")]
    InvalidWindow(NaiveDate, NaiveDate),
}

/// Build the configured rate source.
pub fn source_from_config(config: &PipelineConfig) -> Result<Box<dyn RateSource>, PipelineError> {
    match config.source.provider {
        ProviderKind::Synthetic => {
            Ok(Box::new(SyntheticSource::new(config.currencies.targets.clone())))
        }
        ProviderKind::ExchangeRateApi => {
            let api_key = std::env::var(&config.source.api_key_env).map_err(|_| {
                SourceError::Other(format!(
                    "environment variable {} is not set",
                    config.source.api_key_env
                ))
            })?;
            let source = ExchangeRateApi::new(
                &config.source.base_url,
                api_key,
                std::time::Duration::from_secs(config.source.timeout_secs),
                std::sync::Arc::new(CircuitBreaker::default_provider()),
            )?;
            Ok(Box::new(source))
        }
    }
}

/// The orchestrator owns everything one run needs.
pub struct PipelineOrchestrator {
    config: PipelineConfig,
    store: LayerStore,
    source: Box<dyn RateSource>,
    insight: Option<Box<dyn InsightGenerator>>,
}

struct DateOutcome {
    date: NaiveDate,
    result: Result<ValidatedRecordSet, String>,
}

impl PipelineOrchestrator {
    pub fn new(
        config: PipelineConfig,
        store: LayerStore,
        source: Box<dyn RateSource>,
        insight: Option<Box<dyn InsightGenerator>>,
    ) -> Self {
        Self {
            config,
            store,
            source,
            insight,
        }
    }

    fn validator(&self) -> Validator {
        Validator::new(ValidatorConfig {
            known_currencies: self.config.known_currencies(),
            min_rate: self.config.validation.min_rate,
            max_rate: self.config.validation.max_rate,
            precision: self.config.validation.precision,
        })
    }

    /// Process a single business date.
    pub fn run_daily(&self, date: NaiveDate) -> Result<RunReport, PipelineError> {
        self.run(AggregationWindow::single(date), RunMode::Daily)
    }

    /// Process every date in the inclusive range, independently.
    pub fn run_historical(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<RunReport, PipelineError> {
        if start > end {
            return Err(PipelineError::InvalidWindow(start, end));
        }
        self.run(AggregationWindow::range(start, end), RunMode::Historical)
    }

    fn run(&self, window: AggregationWindow, mode: RunMode) -> Result<RunReport, PipelineError> {
        let dates: Vec<NaiveDate> = window
            .start
            .iter_days()
            .take_while(|d| *d <= window.end)
            .collect();

        let validator = self.validator();

        // Per-date fan-out. Capture + validate + persist for each date;
        // results are merged here, never across workers.
        let mut outcomes: Vec<DateOutcome> = dates
            .par_iter()
            .map(|&date| DateOutcome {
                date,
                result: self.process_date(&validator, date),
            })
            .collect();
        outcomes.sort_by_key(|o| o.date);

        let mut date_reports = BTreeMap::new();
        let mut date_failures = BTreeMap::new();
        let mut validated_sets = Vec::new();
        for outcome in outcomes {
            match outcome.result {
                Ok(set) => {
                    date_reports.insert(outcome.date, set.report.clone());
                    validated_sets.push(set);
                }
                Err(reason) => {
                    date_failures.insert(outcome.date, reason);
                }
            }
        }

        let mut stages = BTreeMap::new();
        let data_status = if date_failures.is_empty() {
            StageStatus::Succeeded
        } else if validated_sets.is_empty() {
            StageStatus::Failed
        } else {
            StageStatus::Partial
        };
        stages.insert(Stage::Capture, data_status);
        stages.insert(Stage::Validate, data_status);

        if validated_sets.is_empty() {
            stages.insert(Stage::Aggregate, StageStatus::Skipped);
            stages.insert(Stage::Insight, StageStatus::Skipped);
            return Ok(self.report(mode, RunStatus::Failed, window, stages, date_reports, date_failures, 0, None));
        }

        // Aggregation runs once, over every date that made it through.
        // A window with no canonical records (everything rejected or
        // duplicated) fails the run but still yields a full report.
        let metrics = match aggregate(&validated_sets, window) {
            Ok(metrics) => metrics,
            Err(AggregateError::EmptyWindow(_)) => {
                stages.insert(Stage::Aggregate, StageStatus::Failed);
                stages.insert(Stage::Insight, StageStatus::Skipped);
                return Ok(self.report(
                    mode,
                    RunStatus::Failed,
                    window,
                    stages,
                    date_reports,
                    date_failures,
                    0,
                    None,
                ));
            }
        };
        self.store.write_aggregated(&metrics)?;
        stages.insert(Stage::Aggregate, StageStatus::Succeeded);

        let reports: Vec<_> = date_reports.values().cloned().collect();
        let (insight, insight_status) = self.generate_insight(&metrics, &reports);
        stages.insert(Stage::Insight, insight_status);

        let status = if !date_failures.is_empty() {
            RunStatus::PartialSuccess
        } else if insight_status == StageStatus::Failed {
            RunStatus::SucceededWithoutInsight
        } else {
            RunStatus::Succeeded
        };

        Ok(self.report(
            mode,
            status,
            window,
            stages,
            date_reports,
            date_failures,
            metrics.metrics.len(),
            insight,
        ))
    }

    /// Capture, validate, and persist one date. A live fetch failure
    /// falls back to the persisted raw tier from a previous run.
    fn process_date(&self, validator: &Validator, date: NaiveDate) -> Result<ValidatedRecordSet, String> {
        let raw = match self.capture_or_recover(date) {
            Ok(raw) => raw,
            Err(e) => return Err(e.to_string()),
        };
        self.store.write_raw(&raw).map_err(|e| e.to_string())?;

        let validated = validator.validate(&raw).map_err(|e| e.to_string())?;
        self.store.write_validated(&validated).map_err(|e| e.to_string())?;
        Ok(validated)
    }

    fn capture_or_recover(&self, date: NaiveDate) -> Result<RawRecordSet, SourceError> {
        match capture(
            self.source.as_ref(),
            &self.config.currencies.base,
            &self.config.currencies.targets,
            date,
        ) {
            Ok(raw) => Ok(raw),
            Err(fetch_err) => match self.store.load_raw(date) {
                Ok(persisted) => Ok(persisted),
                Err(_) => Err(fetch_err),
            },
        }
    }

    /// Produce (or reuse) the insight for this metric set. Never fails
    /// the run.
    fn generate_insight(
        &self,
        metrics: &fxlab_core::domain::AggregatedMetricSet,
        reports: &[fxlab_core::domain::ValidationReport],
    ) -> (Option<Insight>, StageStatus) {
        if !self.config.insight.enabled {
            return (None, StageStatus::Skipped);
        }
        // Insight is wanted but the generator never came up (missing
        // API key, client build failure). That downgrades the run.
        let Some(generator) = self.insight.as_deref() else {
            return (None, StageStatus::Failed);
        };

        let fingerprint = fxlab_core::fingerprint::fingerprint_metrics(metrics);

        // Cached insight for the same metric content is reused as-is.
        if let Ok(cached) = self.store.load_insight::<Insight>(metrics.window.end) {
            if cached.metric_fingerprint == fingerprint {
                return (Some(cached), StageStatus::Succeeded);
            }
        }

        let prompt = PromptBuilder::build(metrics, reports);
        match generator.generate(&prompt) {
            Ok(text) => {
                let insight = Insight {
                    generated_at: chrono::Local::now().naive_local(),
                    model: generator.model().to_string(),
                    metric_fingerprint: fingerprint,
                    text,
                };
                match self.store.write_insight(metrics.window.end, &insight) {
                    Ok(_) => (Some(insight), StageStatus::Succeeded),
                    Err(_) => (Some(insight), StageStatus::Failed),
                }
            }
            Err(InsightError::Unavailable(_))
            | Err(InsightError::AuthenticationRequired(_))
            | Err(InsightError::MalformedResponse(_)) => (None, StageStatus::Failed),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn report(
        &self,
        mode: RunMode,
        status: RunStatus,
        window: AggregationWindow,
        stages: BTreeMap<Stage, StageStatus>,
        date_reports: BTreeMap<NaiveDate, fxlab_core::domain::ValidationReport>,
        date_failures: BTreeMap<NaiveDate, String>,
        metric_count: usize,
        insight: Option<Insight>,
    ) -> RunReport {
        RunReport {
            run_id: self.config.run_id(window),
            mode,
            status,
            window,
            stages,
            date_reports,
            date_failures,
            metric_count,
            insight,
            finished_at: chrono::Local::now().naive_local(),
        }
    }

    /// Store inventory, for the status command.
    pub fn store(&self) -> &LayerStore {
        &self.store
    }
}
