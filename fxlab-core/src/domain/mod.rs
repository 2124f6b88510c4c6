//! Domain types for the three pipeline tiers

pub mod metric;
pub mod record;

pub use metric::{AggregatedMetric, AggregatedMetricSet, AggregationWindow};
pub use record::{
    RawRecord, RawRecordSet, RejectReason, ValidatedRecord, ValidatedRecordSet, ValidationReport,
};
