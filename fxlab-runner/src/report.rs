//! Run reports — the serializable record of one pipeline run.
//!
//! A report captures everything the CLI prints and everything a later
//! audit needs: per-stage status, per-date validation counts, per-date
//! failures, and the insight (if one was produced).

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use fxlab_core::domain::{AggregationWindow, ValidationReport};

use crate::config::RunId;
use crate::insight::Insight;

/// The four pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Capture,
    Validate,
    Aggregate,
    Insight,
}

impl Stage {
    pub fn all() -> [Stage; 4] {
        [Stage::Capture, Stage::Validate, Stage::Aggregate, Stage::Insight]
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Capture => write!(f, "capture"),
            Stage::Validate => write!(f, "validate"),
            Stage::Aggregate => write!(f, "aggregate"),
            Stage::Insight => write!(f, "insight"),
        }
    }
}

/// Outcome of a single stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Pending,
    Succeeded,
    /// Succeeded for some dates, failed for others (historical mode).
    Partial,
    Failed,
    Skipped,
}

impl std::fmt::Display for StageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StageStatus::Pending => write!(f, "pending"),
            StageStatus::Succeeded => write!(f, "ok"),
            StageStatus::Partial => write!(f, "partial"),
            StageStatus::Failed => write!(f, "failed"),
            StageStatus::Skipped => write!(f, "skipped"),
        }
    }
}

/// How the run was invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    Daily,
    Historical,
}

/// Overall outcome of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Every date and the insight succeeded (or insight was disabled).
    Succeeded,
    /// Data tiers are complete but insight generation failed.
    SucceededWithoutInsight,
    /// Some dates produced data, some failed.
    PartialSuccess,
    /// No date produced data.
    Failed,
}

impl RunStatus {
    pub fn is_failure(self) -> bool {
        matches!(self, RunStatus::Failed)
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStatus::Succeeded => write!(f, "succeeded"),
            RunStatus::SucceededWithoutInsight => write!(f, "succeeded (no insight)"),
            RunStatus::PartialSuccess => write!(f, "partial success"),
            RunStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Complete record of one pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: RunId,
    pub mode: RunMode,
    pub status: RunStatus,
    pub window: AggregationWindow,
    pub stages: BTreeMap<Stage, StageStatus>,
    /// Validation counts for every date that reached the validated tier.
    pub date_reports: BTreeMap<NaiveDate, ValidationReport>,
    /// Error text for every date that failed.
    pub date_failures: BTreeMap<NaiveDate, String>,
    pub metric_count: usize,
    pub insight: Option<Insight>,
    pub finished_at: chrono::NaiveDateTime,
}

impl RunReport {
    /// Human-readable summary, one screen, printed by the CLI.
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("run      {}\n", &self.run_id[..16.min(self.run_id.len())]));
        out.push_str(&format!("window   {}\n", self.window));
        out.push_str(&format!("status   {}\n", self.status));
        out.push('\n');

        for stage in Stage::all() {
            let status = self.stages.get(&stage).copied().unwrap_or(StageStatus::Pending);
            out.push_str(&format!("  {stage:<10} {status}\n"));
        }

        if !self.date_reports.is_empty() {
            out.push('\n');
            out.push_str("  date         accepted  rejected  duplicates\n");
            for (date, report) in &self.date_reports {
                out.push_str(&format!(
                    "  {date}   {:>8}  {:>8}  {:>10}\n",
                    report.accepted, report.rejected, report.duplicates
                ));
            }
        }

        if !self.date_failures.is_empty() {
            out.push('\n');
            for (date, reason) in &self.date_failures {
                out.push_str(&format!("  {date}   FAILED: {reason}\n"));
            }
        }

        out.push('\n');
        out.push_str(&format!("  {} metrics aggregated\n", self.metric_count));
        if let Some(insight) = &self.insight {
            out.push_str(&format!("\n  insight ({}):\n  {}\n", insight.model, insight.text));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report() -> RunReport {
        let d1 = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let d2 = NaiveDate::from_ymd_opt(2024, 3, 2).unwrap();
        let mut stages = BTreeMap::new();
        stages.insert(Stage::Capture, StageStatus::Partial);
        stages.insert(Stage::Validate, StageStatus::Partial);
        stages.insert(Stage::Aggregate, StageStatus::Succeeded);
        stages.insert(Stage::Insight, StageStatus::Skipped);

        let mut date_reports = BTreeMap::new();
        date_reports.insert(
            d1,
            ValidationReport {
                accepted: 9,
                rejected: 1,
                duplicates: 0,
                ..Default::default()
            },
        );
        let mut date_failures = BTreeMap::new();
        date_failures.insert(d2, "source unavailable".to_string());

        RunReport {
            run_id: "abcdef0123456789abcdef".to_string(),
            mode: RunMode::Historical,
            status: RunStatus::PartialSuccess,
            window: AggregationWindow::range(d1, d2),
            stages,
            date_reports,
            date_failures,
            metric_count: 9,
            insight: None,
            finished_at: d2.and_hms_opt(10, 0, 0).unwrap(),
        }
    }

    #[test]
    fn render_mentions_every_stage_and_failure() {
        let text = report().render();
        assert!(text.contains("partial success"));
        assert!(text.contains("capture"));
        assert!(text.contains("insight"));
        assert!(text.contains("FAILED: source unavailable"));
        assert!(text.contains("9 metrics aggregated"));
    }

    #[test]
    fn report_round_trips_through_json() {
        let original = report();
        let json = serde_json::to_string(&original).unwrap();
        let parsed: RunReport = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.status, original.status);
        assert_eq!(parsed.date_failures, original.date_failures);
        assert_eq!(parsed.stages, original.stages);
    }
}
