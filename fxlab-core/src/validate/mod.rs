//! Validation and cleaning: raw tier in, validated tier plus report out.
//!
//! The validator never fails on a bad row — every raw record is accounted
//! for as accepted, rejected (with a reason), or duplicate, and the counts
//! always sum to the raw set's length. It fails only on structural
//! problems, such as a raw set whose records disagree on the business date.

pub mod rules;

use std::collections::BTreeSet;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{RawRecordSet, ValidatedRecord, ValidatedRecordSet, ValidationReport};

pub use rules::{normalize_code, RangeRule, SchemaRule, ValidationRule};

/// Structural errors. Per-row problems are never errors — they land in the
/// ValidationReport instead.
#[derive(Debug, Error)]
pub enum ValidateError {
    #[error("raw set for {expected} contains a record captured for {found}")]
    MixedDates {
        expected: chrono::NaiveDate,
        found: chrono::NaiveDate,
    },
}

/// Stage-local configuration, passed in at construction. No globals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidatorConfig {
    pub known_currencies: BTreeSet<String>,
    pub min_rate: f64,
    pub max_rate: f64,
    /// Decimal places kept in the validated tier (rounded half-to-even).
    pub precision: u32,
}

impl ValidatorConfig {
    /// Bounds and precision matching the production defaults.
    pub fn with_currencies(known_currencies: BTreeSet<String>) -> Self {
        Self {
            known_currencies,
            min_rate: 0.0001,
            max_rate: 1_000_000.0,
            precision: 6,
        }
    }
}

/// Round to `precision` decimal places, ties to the even neighbor.
///
/// Banker's rounding keeps repeated re-validation from drifting a value
/// that sits exactly on a tie.
pub fn round_half_even(value: f64, precision: u32) -> f64 {
    let scale = 10f64.powi(precision as i32);
    let scaled = value * scale;
    let floor = scaled.floor();
    let frac = scaled - floor;
    let rounded = if (frac - 0.5).abs() < 1e-9 {
        if (floor as i64) % 2 == 0 {
            floor
        } else {
            floor + 1.0
        }
    } else {
        scaled.round()
    };
    rounded / scale
}

/// The validator: ordered rules, then duplicate detection, then
/// normalization of the survivors.
pub struct Validator {
    config: ValidatorConfig,
    rules: Vec<Box<dyn ValidationRule>>,
}

impl Validator {
    /// Build the standard rule chain: schema first, then range.
    pub fn new(config: ValidatorConfig) -> Self {
        let rules: Vec<Box<dyn ValidationRule>> = vec![
            Box::new(SchemaRule::new(config.known_currencies.clone())),
            Box::new(RangeRule::new(config.min_rate, config.max_rate)),
        ];
        Self { config, rules }
    }

    /// Build with an explicit rule chain (tests exercise single rules and
    /// alternate orderings through this).
    pub fn with_rules(config: ValidatorConfig, rules: Vec<Box<dyn ValidationRule>>) -> Self {
        Self { config, rules }
    }

    /// Validate one raw set into the validated tier.
    pub fn validate(&self, raw: &RawRecordSet) -> Result<ValidatedRecordSet, ValidateError> {
        for record in &raw.records {
            let record_date = record.captured_at.date();
            // Capture timestamps may trail the business date (historical
            // backfill); only a date *earlier* than the business date is
            // structurally impossible.
            if record_date < raw.business_date {
                return Err(ValidateError::MixedDates {
                    expected: raw.business_date,
                    found: record_date,
                });
            }
        }

        let mut report = ValidationReport::default();
        let mut records: Vec<ValidatedRecord> = Vec::with_capacity(raw.records.len());
        // Canonical index per normalized (base, target), in capture order
        let mut canonical: HashMap<(String, String), usize> = HashMap::new();

        for record in &raw.records {
            if let Some(reason) = self.rules.iter().find_map(|rule| rule.check(record)) {
                report.rejected += 1;
                *report.reasons.entry(reason).or_insert(0) += 1;
                continue;
            }

            let base = normalize_code(&record.base);
            let target = normalize_code(&record.target);
            let key = (base.clone(), target.clone());

            let duplicate_of = match canonical.get(&key) {
                Some(&idx) => {
                    report.duplicates += 1;
                    Some(idx)
                }
                None => {
                    canonical.insert(key, records.len());
                    report.accepted += 1;
                    None
                }
            };

            records.push(ValidatedRecord {
                base,
                target,
                rate: round_half_even(record.rate, self.config.precision),
                captured_at: record.captured_at,
                source_batch_id: record.source_batch_id.clone(),
                business_date: raw.business_date,
                duplicate_of,
            });
        }

        debug_assert_eq!(report.total(), raw.records.len());

        Ok(ValidatedRecordSet {
            business_date: raw.business_date,
            base: normalize_code(&raw.base),
            records,
            report,
        })
    }
}
