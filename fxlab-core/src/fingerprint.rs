//! Deterministic fingerprints for pipeline tiers.
//!
//! A fingerprint is a BLAKE3 hash over a canonical byte serialization:
//! records in set order, floats as little-endian bits, dates as ISO
//! strings. Two uses:
//! - idempotence checks: a re-run over unchanged source data must produce
//!   identical validated and aggregated fingerprints;
//! - insight caching: an unchanged metric fingerprint skips the costly
//!   insight call entirely.

use crate::domain::{AggregatedMetricSet, ValidatedRecordSet};

fn update_opt_f64(hasher: &mut blake3::Hasher, value: Option<f64>) {
    match value {
        Some(v) => {
            hasher.update(&[1]);
            hasher.update(&v.to_le_bytes());
        }
        None => {
            hasher.update(&[0]);
        }
    }
}

/// Fingerprint of a validated record set (records + report counts).
pub fn fingerprint_validated(set: &ValidatedRecordSet) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(set.business_date.to_string().as_bytes());
    hasher.update(set.base.as_bytes());

    for record in &set.records {
        hasher.update(record.target.as_bytes());
        hasher.update(&record.rate.to_le_bytes());
        hasher.update(record.business_date.to_string().as_bytes());
        match record.duplicate_of {
            Some(idx) => {
                hasher.update(&[1]);
                hasher.update(&(idx as u64).to_le_bytes());
            }
            None => {
                hasher.update(&[0]);
            }
        }
    }

    hasher.update(&(set.report.accepted as u64).to_le_bytes());
    hasher.update(&(set.report.rejected as u64).to_le_bytes());
    hasher.update(&(set.report.duplicates as u64).to_le_bytes());

    hasher.finalize().to_hex().to_string()
}

/// Fingerprint of an aggregated metric set.
pub fn fingerprint_metrics(set: &AggregatedMetricSet) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(set.window.start.to_string().as_bytes());
    hasher.update(set.window.end.to_string().as_bytes());
    hasher.update(set.base.as_bytes());

    for metric in &set.metrics {
        hasher.update(metric.target.as_bytes());
        hasher.update(metric.business_date.to_string().as_bytes());
        hasher.update(&metric.latest_rate.to_le_bytes());
        update_opt_f64(&mut hasher, metric.previous_rate);
        update_opt_f64(&mut hasher, metric.pct_change);
        hasher.update(&(metric.volatility_rank as u64).to_le_bytes());
    }

    hasher.finalize().to_hex().to_string()
}
