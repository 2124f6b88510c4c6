//! Aggregated-tier types: per-currency metrics over an aggregation window.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// The set of business dates an aggregation covers. A single-date window
/// has `start == end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregationWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl AggregationWindow {
    pub fn single(date: NaiveDate) -> Self {
        Self { start: date, end: date }
    }

    pub fn range(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    pub fn is_single_date(&self) -> bool {
        self.start == self.end
    }
}

impl std::fmt::Display for AggregationWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_single_date() {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{} to {}", self.start, self.end)
        }
    }
}

/// Per-currency statistics for one aggregation window.
///
/// `pct_change` is `None` exactly when `previous_rate` is `None` — a
/// currency seen on only one date has no comparison point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedMetric {
    pub target: String,
    /// Latest business date in the window with a canonical rate.
    pub business_date: NaiveDate,
    pub latest_rate: f64,
    pub previous_rate: Option<f64>,
    /// Percentage change from previous to latest rate.
    pub pct_change: Option<f64>,
    /// 1 = most volatile in the window. Strict total order; currencies
    /// with no `pct_change` rank after all those that have one.
    pub volatility_rank: usize,
}

/// The aggregated tier for one window, ordered by volatility rank.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedMetricSet {
    pub window: AggregationWindow,
    pub base: String,
    pub metrics: Vec<AggregatedMetric>,
}

impl AggregatedMetricSet {
    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    pub fn metric(&self, target: &str) -> Option<&AggregatedMetric> {
        self.metrics.iter().find(|m| m.target == target)
    }
}
