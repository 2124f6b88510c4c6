//! Raw capture: wraps a provider snapshot into an immutable raw record set.
//!
//! Capture does no semantic validation — a negative or absurd rate from
//! the provider lands in the raw tier unchanged. Its only judgement calls
//! are coverage (which requested targets the provider skipped) and
//! provenance tagging (batch id, capture timestamp, source kind).

use chrono::NaiveDate;

use crate::domain::{RawRecord, RawRecordSet};
use crate::source::{RateSource, SourceError};

/// Build a deterministic batch id from the source, base, and date.
///
/// Content-addressed rather than random so that re-runs over the same
/// inputs key their outputs identically.
fn batch_id(source_name: &str, base: &str, date: NaiveDate) -> String {
    let hash = blake3::hash(format!("{source_name}:{base}:{date}").as_bytes());
    format!("{}", &hash.to_hex()[..16])
}

/// Capture a snapshot of rates for the requested targets on one business date.
///
/// Provider failures propagate unchanged — retry policy lives inside the
/// provider. A snapshot covering only a subset of the requested targets is
/// still captured; the gap is recorded in `missing_targets` so validation
/// and the run report can observe it.
pub fn capture(
    source: &dyn RateSource,
    base: &str,
    targets: &[String],
    business_date: NaiveDate,
) -> Result<RawRecordSet, SourceError> {
    let snapshot = source.fetch(base, business_date)?;
    let captured_at = chrono::Local::now().naive_local();
    let batch = batch_id(source.name(), base, business_date);

    let mut records = Vec::with_capacity(targets.len());
    let mut missing = Vec::new();

    for target in targets {
        match snapshot.rates.get(target) {
            Some(&rate) => records.push(RawRecord {
                base: base.to_string(),
                target: target.clone(),
                rate,
                captured_at,
                source_batch_id: batch.clone(),
            }),
            None => missing.push(target.clone()),
        }
    }

    Ok(RawRecordSet {
        business_date,
        base: base.to_string(),
        batch_id: batch,
        records,
        missing_targets: missing,
        fetched_from: source.kind(),
    })
}
