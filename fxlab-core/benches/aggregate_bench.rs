//! Criterion benchmarks for FXLab hot paths.
//!
//! Benchmarks:
//! 1. Validation (rule chain + dedup + normalization over a raw batch)
//! 2. Aggregation (per-currency metric computation + volatility ranking)

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use fxlab_core::aggregate::aggregate;
use fxlab_core::domain::{AggregationWindow, RawRecord, RawRecordSet};
use fxlab_core::source::SourceKind;
use fxlab_core::validate::{Validator, ValidatorConfig};

// ── Helpers ──────────────────────────────────────────────────────────

fn currency_universe(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("C{i:03}")).collect()
}

fn make_raw_set(date: chrono::NaiveDate, currencies: &[String]) -> RawRecordSet {
    let batch_id = format!("bench-{date}");
    let records = currencies
        .iter()
        .enumerate()
        .map(|(i, code)| RawRecord {
            base: "USD".to_string(),
            target: code.clone(),
            rate: 1.0 + (i as f64 * 0.37).sin().abs() * 40.0 + date.ordinal() as f64 * 0.01,
            captured_at: date.and_hms_opt(9, 0, 0).unwrap(),
            source_batch_id: batch_id.clone(),
        })
        .collect();
    RawRecordSet {
        business_date: date,
        base: "USD".to_string(),
        batch_id,
        records,
        missing_targets: Vec::new(),
        fetched_from: SourceKind::Synthetic,
    }
}

fn make_validator(currencies: &[String]) -> Validator {
    let known: std::collections::BTreeSet<String> = currencies
        .iter()
        .cloned()
        .chain(std::iter::once("USD".to_string()))
        .collect();
    Validator::new(ValidatorConfig::with_currencies(known))
}

// ── Benchmarks ───────────────────────────────────────────────────────

fn bench_validate(c: &mut Criterion) {
    let mut group = c.benchmark_group("validate");
    for size in [50usize, 200, 1000] {
        let currencies = currency_universe(size);
        let validator = make_validator(&currencies);
        let date = chrono::NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let raw = make_raw_set(date, &currencies);

        group.bench_with_input(BenchmarkId::from_parameter(size), &raw, |b, raw| {
            b.iter(|| validator.validate(black_box(raw)).unwrap());
        });
    }
    group.finish();
}

fn bench_aggregate(c: &mut Criterion) {
    let mut group = c.benchmark_group("aggregate");
    let start = chrono::NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();

    for days in [2usize, 10, 30] {
        let currencies = currency_universe(200);
        let validator = make_validator(&currencies);
        let sets: Vec<_> = (0..days)
            .map(|i| {
                let date = start + chrono::Duration::days(i as i64);
                validator.validate(&make_raw_set(date, &currencies)).unwrap()
            })
            .collect();
        let window = AggregationWindow::range(start, start + chrono::Duration::days(days as i64 - 1));

        group.bench_with_input(BenchmarkId::from_parameter(days), &sets, |b, sets| {
            b.iter(|| aggregate(black_box(sets), window).unwrap());
        });
    }
    group.finish();
}

criterion_group!(benches, bench_validate, bench_aggregate);
criterion_main!(benches);
