//! Aggregation: validated tier in, per-currency metrics out.
//!
//! Pure function of its inputs — no I/O, no clock reads — so re-running
//! over the same validated sets always produces an identical metric set.
//! That determinism is load-bearing: insight generation is costly and is
//! skipped when the metric fingerprint is unchanged.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use rayon::prelude::*;
use thiserror::Error;

use crate::domain::{AggregatedMetric, AggregatedMetricSet, AggregationWindow, ValidatedRecordSet};

/// Errors from aggregation. `EmptyWindow` is fatal to this window only,
/// never to anything outside it.
#[derive(Debug, Error)]
pub enum AggregateError {
    #[error("no canonical records in window {0}")]
    EmptyWindow(AggregationWindow),
}

/// Per-currency intermediate before ranking.
struct CurrencyStat {
    target: String,
    latest_date: NaiveDate,
    latest_rate: f64,
    previous_rate: Option<f64>,
    pct_change: Option<f64>,
}

/// Aggregate one or more validated sets over a window.
///
/// Only canonical records participate. `previous_rate` is the canonical
/// rate on the nearest earlier date present in the inputs — gaps in the
/// calendar are tolerated, which matters for weekends and provider
/// outages in historical mode.
pub fn aggregate(
    sets: &[ValidatedRecordSet],
    window: AggregationWindow,
) -> Result<AggregatedMetricSet, AggregateError> {
    // BTreeMaps give deterministic currency and date ordering for free
    let mut by_currency: BTreeMap<String, BTreeMap<NaiveDate, f64>> = BTreeMap::new();
    let mut base = String::new();

    for set in sets {
        if !window.contains(set.business_date) {
            continue;
        }
        if base.is_empty() {
            base = set.base.clone();
        }
        for record in set.canonical() {
            by_currency
                .entry(record.target.clone())
                .or_default()
                .insert(record.business_date, record.rate);
        }
    }

    if by_currency.is_empty() {
        return Err(AggregateError::EmptyWindow(window));
    }

    // Per-currency computation is independent and reads only its own slice
    let mut stats: Vec<CurrencyStat> = by_currency
        .par_iter()
        .map(|(target, dates)| {
            let (&latest_date, &latest_rate) =
                dates.iter().next_back().expect("currency entry is never empty");
            let previous_rate = dates
                .range(..latest_date)
                .next_back()
                .map(|(_, &rate)| rate);
            let pct_change = previous_rate.map(|prev| (latest_rate - prev) / prev * 100.0);
            CurrencyStat {
                target: target.clone(),
                latest_date,
                latest_rate,
                previous_rate,
                pct_change,
            }
        })
        .collect();

    // Rank: descending |pct_change|, null changes after all non-null,
    // ties broken by currency code ascending. Strict total order.
    stats.sort_by(|a, b| match (a.pct_change, b.pct_change) {
        (Some(x), Some(y)) => y
            .abs()
            .partial_cmp(&x.abs())
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.target.cmp(&b.target)),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => a.target.cmp(&b.target),
    });

    let metrics = stats
        .into_iter()
        .enumerate()
        .map(|(i, s)| AggregatedMetric {
            target: s.target,
            business_date: s.latest_date,
            latest_rate: s.latest_rate,
            previous_rate: s.previous_rate,
            pct_change: s.pct_change,
            volatility_rank: i + 1,
        })
        .collect();

    Ok(AggregatedMetricSet {
        window,
        base,
        metrics,
    })
}
