//! Named validation rules, applied in a fixed declared order.
//!
//! Each rule is a pure function from raw record to an optional rejection
//! reason. The first rule that fires decides the record's fate, so rule
//! order is part of the contract: schema problems are reported as schema
//! problems even when the value would also fail the range check.

use std::collections::BTreeSet;

use crate::domain::{RawRecord, RejectReason};

/// A single validation rule. Pure: no I/O, no mutation, no state.
pub trait ValidationRule: Send + Sync {
    /// Rule name for reports and logs.
    fn name(&self) -> &str;

    /// `Some(reason)` rejects the record; `None` passes it to the next rule.
    fn check(&self, record: &RawRecord) -> Option<RejectReason>;
}

/// Normalize a currency code the way the validated tier stores it.
pub fn normalize_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

/// Schema check: rate must be a finite positive number and both currency
/// codes must belong to the known code set.
pub struct SchemaRule {
    known_currencies: BTreeSet<String>,
}

impl SchemaRule {
    pub fn new(known_currencies: BTreeSet<String>) -> Self {
        Self { known_currencies }
    }

    fn code_is_known(&self, code: &str) -> bool {
        self.known_currencies.contains(&normalize_code(code))
    }
}

impl ValidationRule for SchemaRule {
    fn name(&self) -> &str {
        "schema"
    }

    fn check(&self, record: &RawRecord) -> Option<RejectReason> {
        if !record.rate.is_finite() || record.rate <= 0.0 {
            return Some(RejectReason::SchemaViolation);
        }
        if !self.code_is_known(&record.base) || !self.code_is_known(&record.target) {
            return Some(RejectReason::SchemaViolation);
        }
        None
    }
}

/// Range sanity check: guards against provider glitches such as a rate of
/// zero or a rate six orders of magnitude off. Bounds are configurable.
pub struct RangeRule {
    min_rate: f64,
    max_rate: f64,
}

impl RangeRule {
    pub fn new(min_rate: f64, max_rate: f64) -> Self {
        Self { min_rate, max_rate }
    }
}

impl ValidationRule for RangeRule {
    fn name(&self) -> &str {
        "range"
    }

    fn check(&self, record: &RawRecord) -> Option<RejectReason> {
        if record.rate < self.min_rate || record.rate > self.max_rate {
            return Some(RejectReason::OutOfRange);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn raw(base: &str, target: &str, rate: f64) -> RawRecord {
        RawRecord {
            base: base.into(),
            target: target.into(),
            rate,
            captured_at: NaiveDate::from_ymd_opt(2024, 1, 15)
                .unwrap()
                .and_hms_opt(9, 0, 0)
                .unwrap(),
            source_batch_id: "b".into(),
        }
    }

    fn known() -> BTreeSet<String> {
        ["USD", "BRL", "EUR"].into_iter().map(String::from).collect()
    }

    #[test]
    fn schema_rejects_nonpositive_and_nonfinite_rates() {
        let rule = SchemaRule::new(known());
        assert_eq!(rule.check(&raw("USD", "BRL", -1.0)), Some(RejectReason::SchemaViolation));
        assert_eq!(rule.check(&raw("USD", "BRL", 0.0)), Some(RejectReason::SchemaViolation));
        assert_eq!(
            rule.check(&raw("USD", "BRL", f64::NAN)),
            Some(RejectReason::SchemaViolation)
        );
        assert_eq!(
            rule.check(&raw("USD", "BRL", f64::INFINITY)),
            Some(RejectReason::SchemaViolation)
        );
        assert_eq!(rule.check(&raw("USD", "BRL", 5.0)), None);
    }

    #[test]
    fn schema_rejects_unknown_codes() {
        let rule = SchemaRule::new(known());
        assert_eq!(
            rule.check(&raw("USD", "XXX", 5.0)),
            Some(RejectReason::SchemaViolation)
        );
        assert_eq!(
            rule.check(&raw("ZZZ", "BRL", 5.0)),
            Some(RejectReason::SchemaViolation)
        );
    }

    #[test]
    fn schema_accepts_unnormalized_known_codes() {
        let rule = SchemaRule::new(known());
        assert_eq!(rule.check(&raw("usd", " brl ", 5.0)), None);
    }

    #[test]
    fn range_rejects_outside_bounds() {
        let rule = RangeRule::new(0.0001, 1_000_000.0);
        assert_eq!(
            rule.check(&raw("USD", "BRL", 0.00001)),
            Some(RejectReason::OutOfRange)
        );
        assert_eq!(
            rule.check(&raw("USD", "BRL", 2_000_000.0)),
            Some(RejectReason::OutOfRange)
        );
        assert_eq!(rule.check(&raw("USD", "BRL", 5.0)), None);
    }

    #[test]
    fn normalize_trims_and_uppercases() {
        assert_eq!(normalize_code(" brl "), "BRL");
        assert_eq!(normalize_code("EUR"), "EUR");
    }
}
