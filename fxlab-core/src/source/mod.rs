//! Rate source providers

pub mod circuit_breaker;
pub mod exchange_rate_api;
pub mod provider;
pub mod synthetic;

pub use circuit_breaker::{BreakerState, CircuitBreaker};
pub use exchange_rate_api::ExchangeRateApi;
pub use provider::{RateSnapshot, RateSource, SourceError, SourceKind};
pub use synthetic::SyntheticSource;
