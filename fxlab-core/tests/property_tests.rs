//! Property tests for pipeline invariants.
//!
//! Uses proptest to verify:
//! 1. Count conservation — accepted + rejected + duplicates equals input size
//! 2. Rank totality — volatility ranks are a strict 1..=n permutation
//! 3. Determinism — validating or aggregating the same input twice is identical
//! 4. Change nullability — pct_change is None exactly when previous_rate is

use chrono::NaiveDate;
use proptest::prelude::*;
use std::collections::BTreeSet;

use fxlab_core::aggregate::aggregate;
use fxlab_core::domain::{AggregationWindow, RawRecord, RawRecordSet};
use fxlab_core::source::SourceKind;
use fxlab_core::validate::{Validator, ValidatorConfig};

const KNOWN: [&str; 6] = ["USD", "EUR", "GBP", "JPY", "BRL", "MXN"];

fn base_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
}

fn make_validator() -> Validator {
    let known: BTreeSet<String> = KNOWN.iter().map(|s| s.to_string()).collect();
    Validator::new(ValidatorConfig::with_currencies(known))
}

// ── Strategies (proptest) ────────────────────────────────────────────

/// Codes that mix valid currencies, case variants, and junk.
fn arb_code() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("EUR".to_string()),
        Just("eur".to_string()),
        Just(" GBP ".to_string()),
        Just("JPY".to_string()),
        Just("BRL".to_string()),
        Just("ZZZ".to_string()),
        Just("E".to_string()),
    ]
}

/// Rates spanning valid, out-of-range, and non-finite values.
fn arb_rate() -> impl Strategy<Value = f64> {
    prop_oneof![
        5 => 0.001..10_000.0_f64,
        1 => Just(0.0),
        1 => Just(-3.5),
        1 => Just(2e9),
        1 => Just(f64::NAN),
        1 => Just(f64::INFINITY),
    ]
}

fn arb_raw_set() -> impl Strategy<Value = RawRecordSet> {
    prop::collection::vec((arb_code(), arb_rate()), 0..40).prop_map(|pairs| {
        let date = base_date();
        let records = pairs
            .into_iter()
            .enumerate()
            .map(|(i, (target, rate))| RawRecord {
                base: "USD".to_string(),
                target,
                rate,
                captured_at: date.and_hms_opt(9, 0, i as u32 % 60).unwrap(),
                source_batch_id: "prop".to_string(),
            })
            .collect();
        RawRecordSet {
            business_date: date,
            base: "USD".to_string(),
            batch_id: "prop".to_string(),
            records,
            missing_targets: Vec::new(),
            fetched_from: SourceKind::Synthetic,
        }
    })
}

/// Clean per-date rates for the aggregation properties.
fn arb_rate_days() -> impl Strategy<Value = Vec<Vec<(usize, f64)>>> {
    prop::collection::vec(
        prop::collection::vec((0..4usize, 0.01..1_000.0_f64), 1..5),
        1..6,
    )
}

fn validated_sets_from(days: &[Vec<(usize, f64)>]) -> Vec<fxlab_core::domain::ValidatedRecordSet> {
    let validator = make_validator();
    let codes = ["EUR", "GBP", "JPY", "BRL"];
    days.iter()
        .enumerate()
        .map(|(i, day)| {
            let date = base_date() + chrono::Duration::days(i as i64);
            let records = day
                .iter()
                .map(|&(code_ix, rate)| RawRecord {
                    base: "USD".to_string(),
                    target: codes[code_ix].to_string(),
                    rate,
                    captured_at: date.and_hms_opt(9, 0, 0).unwrap(),
                    source_batch_id: format!("prop-{date}"),
                })
                .collect();
            let raw = RawRecordSet {
                business_date: date,
                base: "USD".to_string(),
                batch_id: format!("prop-{date}"),
                records,
                missing_targets: Vec::new(),
                fetched_from: SourceKind::Synthetic,
            };
            validator.validate(&raw).unwrap()
        })
        .collect()
}

// ── 1. Count Conservation ────────────────────────────────────────────

proptest! {
    /// Every input record lands in exactly one of the three buckets.
    #[test]
    fn counts_are_conserved(raw in arb_raw_set()) {
        let validator = make_validator();
        let validated = validator.validate(&raw).unwrap();
        let report = &validated.report;

        prop_assert_eq!(
            report.accepted + report.rejected + report.duplicates,
            raw.records.len()
        );
        prop_assert_eq!(report.accepted, validated.canonical_count());
        prop_assert_eq!(
            report.rejected,
            report.reasons.values().sum::<usize>()
        );
    }

    /// Validation is a pure function of its input.
    #[test]
    fn validation_is_deterministic(raw in arb_raw_set()) {
        let validator = make_validator();
        let first = validator.validate(&raw).unwrap();
        let second = validator.validate(&raw).unwrap();

        prop_assert_eq!(&first.report, &second.report);
        prop_assert_eq!(first.records.len(), second.records.len());
        for (a, b) in first.records.iter().zip(&second.records) {
            prop_assert_eq!(&a.target, &b.target);
            prop_assert_eq!(a.rate, b.rate);
            prop_assert_eq!(a.duplicate_of, b.duplicate_of);
        }
    }
}

// ── 2. Rank Totality + Nullability ───────────────────────────────────

proptest! {
    /// Ranks are a strict 1..=n permutation with null changes sorted last,
    /// and pct_change is None exactly when previous_rate is None.
    #[test]
    fn ranks_form_a_total_order(days in arb_rate_days()) {
        let sets = validated_sets_from(&days);
        let window = AggregationWindow::range(
            base_date(),
            base_date() + chrono::Duration::days(days.len() as i64 - 1),
        );
        let metrics = aggregate(&sets, window).unwrap();

        let mut ranks: Vec<usize> =
            metrics.metrics.iter().map(|m| m.volatility_rank).collect();
        ranks.sort_unstable();
        prop_assert_eq!(&ranks, &(1..=metrics.metrics.len()).collect::<Vec<_>>());

        let mut seen_null = false;
        for m in &metrics.metrics {
            prop_assert_eq!(m.pct_change.is_none(), m.previous_rate.is_none());
            if m.pct_change.is_none() {
                seen_null = true;
            } else {
                prop_assert!(!seen_null, "a change-bearing metric after a null one");
            }
        }
    }

    /// Aggregating the same inputs twice yields byte-identical metrics.
    #[test]
    fn aggregation_is_deterministic(days in arb_rate_days()) {
        let sets = validated_sets_from(&days);
        let window = AggregationWindow::range(
            base_date(),
            base_date() + chrono::Duration::days(days.len() as i64 - 1),
        );
        let first = aggregate(&sets, window).unwrap();
        let second = aggregate(&sets, window).unwrap();
        prop_assert_eq!(first, second);
    }
}
