//! Raw and validated record types for the first two pipeline tiers.
//!
//! Raw records are an untouched capture of whatever the rate provider
//! returned. Validated records are the cleaned, deduplicated tier that
//! aggregation reads. Both sets are immutable once built — a re-run
//! produces a new set rather than mutating an old one.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::source::SourceKind;

/// A single exchange-rate quote exactly as captured from the provider.
///
/// No semantic validation has happened yet: the rate may be negative,
/// zero, NaN, or absurd. That is by contract — cleanliness is the
/// validated tier's job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawRecord {
    pub base: String,
    pub target: String,
    pub rate: f64,
    pub captured_at: NaiveDateTime,
    pub source_batch_id: String,
}

/// One capture batch: every quote for a single base currency and
/// business date, sharing one batch id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawRecordSet {
    pub business_date: NaiveDate,
    pub base: String,
    pub batch_id: String,
    pub records: Vec<RawRecord>,
    /// Requested targets the provider did not return a rate for.
    /// Non-empty means the snapshot was incomplete (flagged, not fatal).
    pub missing_targets: Vec<String>,
    pub fetched_from: SourceKind,
}

impl RawRecordSet {
    /// Whether the provider covered every requested target currency.
    pub fn is_complete(&self) -> bool {
        self.missing_targets.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Why a raw record was rejected during validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    SchemaViolation,
    OutOfRange,
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SchemaViolation => write!(f, "schema_violation"),
            Self::OutOfRange => write!(f, "out_of_range"),
        }
    }
}

/// Outcome counts for one validation pass.
///
/// Invariant: `accepted + rejected + duplicates` equals the raw set's
/// record count. The reason map breaks `rejected` down by rule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub accepted: usize,
    pub rejected: usize,
    pub duplicates: usize,
    pub reasons: BTreeMap<RejectReason, usize>,
}

impl ValidationReport {
    pub fn total(&self) -> usize {
        self.accepted + self.rejected + self.duplicates
    }
}

/// A raw record that survived validation, with normalized fields.
///
/// `duplicate_of` points at the canonical record's index within the same
/// set. Duplicates are retained for auditability but carry no weight in
/// aggregation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidatedRecord {
    pub base: String,
    pub target: String,
    pub rate: f64,
    pub captured_at: NaiveDateTime,
    pub source_batch_id: String,
    pub business_date: NaiveDate,
    pub duplicate_of: Option<usize>,
}

impl ValidatedRecord {
    /// The single retained record per (business_date, target).
    pub fn is_canonical(&self) -> bool {
        self.duplicate_of.is_none()
    }
}

/// The validated tier for one business date: cleaned records plus the
/// report describing what happened to the raw input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidatedRecordSet {
    pub business_date: NaiveDate,
    pub base: String,
    pub records: Vec<ValidatedRecord>,
    pub report: ValidationReport,
}

impl ValidatedRecordSet {
    /// Iterate canonical (non-duplicate) records only.
    pub fn canonical(&self) -> impl Iterator<Item = &ValidatedRecord> {
        self.records.iter().filter(|r| r.is_canonical())
    }

    pub fn canonical_count(&self) -> usize {
        self.canonical().count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(target: &str, rate: f64, duplicate_of: Option<usize>) -> ValidatedRecord {
        ValidatedRecord {
            base: "USD".into(),
            target: target.into(),
            rate,
            captured_at: NaiveDate::from_ymd_opt(2024, 1, 15)
                .unwrap()
                .and_hms_opt(12, 0, 0)
                .unwrap(),
            source_batch_id: "batch-1".into(),
            business_date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            duplicate_of,
        }
    }

    #[test]
    fn canonical_iterator_skips_duplicates() {
        let set = ValidatedRecordSet {
            business_date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            base: "USD".into(),
            records: vec![
                record("BRL", 5.0, None),
                record("BRL", 5.1, Some(0)),
                record("EUR", 0.92, None),
            ],
            report: ValidationReport::default(),
        };

        assert_eq!(set.canonical_count(), 2);
        let targets: Vec<&str> = set.canonical().map(|r| r.target.as_str()).collect();
        assert_eq!(targets, vec!["BRL", "EUR"]);
    }

    #[test]
    fn report_total_sums_all_outcomes() {
        let mut reasons = BTreeMap::new();
        reasons.insert(RejectReason::OutOfRange, 2);
        let report = ValidationReport {
            accepted: 10,
            rejected: 2,
            duplicates: 1,
            reasons,
        };
        assert_eq!(report.total(), 13);
    }

    #[test]
    fn reject_reason_serializes_snake_case() {
        let json = serde_json::to_string(&RejectReason::SchemaViolation).unwrap();
        assert_eq!(json, "\"schema_violation\"");
        assert_eq!(RejectReason::OutOfRange.to_string(), "out_of_range");
    }
}
