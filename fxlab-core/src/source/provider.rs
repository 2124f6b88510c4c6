//! Rate source trait and structured error types.
//!
//! The RateSource trait abstracts over quote providers (the HTTP API, the
//! deterministic synthetic source) so the pipeline can swap implementations
//! and tests can substitute mocks.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// A provider snapshot: every available rate for one base currency on one
/// business date. Keys are whatever codes the provider returned — filtering
/// to the requested targets happens in capture, not here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateSnapshot {
    pub base: String,
    pub date: NaiveDate,
    pub rates: BTreeMap<String, f64>,
}

/// Structured error types for rate-source operations.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("source unavailable: {0}")]
    Unavailable(String),

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("authentication rejected: {0}")]
    AuthenticationRequired(String),

    #[error("malformed provider response: {0}")]
    MalformedResponse(String),

    #[error("hard stop: provider has blocked requests (circuit breaker tripped)")]
    CircuitBreakerTripped,

    #[error("source error: {0}")]
    Other(String),
}

/// Where a raw record set came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    ExchangeRateApi,
    Synthetic,
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ExchangeRateApi => write!(f, "exchangerate-api"),
            Self::Synthetic => write!(f, "synthetic"),
        }
    }
}

/// Trait for rate providers.
///
/// Implementations handle the specifics of one quote source. Retry and
/// backoff live inside the implementation; the capture stage propagates
/// whatever error survives them.
pub trait RateSource: Send + Sync {
    /// Human-readable name of this source.
    fn name(&self) -> &str;

    /// Which provenance tag records from this source carry.
    fn kind(&self) -> SourceKind;

    /// Fetch the full rate snapshot for a base currency on a business date.
    fn fetch(&self, base: &str, date: NaiveDate) -> Result<RateSnapshot, SourceError>;

    /// Check if the source is currently usable (not rate-limited, not blocked).
    fn is_available(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_errors_render_reasons() {
        let err = SourceError::RateLimited { retry_after_secs: 30 };
        assert!(err.to_string().contains("30s"));

        let err = SourceError::Unavailable("connection refused".into());
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn source_kind_serializes_snake_case() {
        let json = serde_json::to_string(&SourceKind::ExchangeRateApi).unwrap();
        assert_eq!(json, "\"exchange_rate_api\"");
    }
}
