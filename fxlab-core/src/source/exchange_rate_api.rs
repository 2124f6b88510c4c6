//! exchangerate-api.com provider.
//!
//! Fetches a full conversion-rate table from the v6 REST API. Handles rate
//! limiting, retries with exponential backoff, response parsing, and the
//! circuit breaker. The free tier throttles hard and revokes keys that
//! hammer it, so the breaker trips on 403 immediately.

use super::circuit_breaker::CircuitBreaker;
use super::provider::{RateSnapshot, RateSource, SourceError, SourceKind};
use chrono::{Datelike, NaiveDate};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// v6 API response envelope. The same shape is returned by both the
/// `latest` and `history` endpoints.
#[derive(Debug, Deserialize)]
struct RatesResponse {
    result: String,
    #[serde(default)]
    base_code: Option<String>,
    #[serde(default)]
    conversion_rates: Option<BTreeMap<String, f64>>,
    #[serde(rename = "error-type", default)]
    error_type: Option<String>,
}

/// exchangerate-api.com data provider.
pub struct ExchangeRateApi {
    client: reqwest::blocking::Client,
    base_url: String,
    api_key: String,
    circuit_breaker: Arc<CircuitBreaker>,
    max_retries: u32,
    base_delay: Duration,
}

impl ExchangeRateApi {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
        circuit_breaker: Arc<CircuitBreaker>,
    ) -> Result<Self, SourceError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SourceError::Other(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            circuit_breaker,
            max_retries: 3,
            base_delay: Duration::from_millis(500),
        })
    }

    /// Build the endpoint URL for a base currency and business date.
    ///
    /// Today's snapshot uses `latest`; any earlier date uses the
    /// `history` endpoint, which keys by calendar day.
    fn endpoint_url(&self, base: &str, date: NaiveDate) -> String {
        let today = chrono::Local::now().date_naive();
        if date >= today {
            format!("{}/{}/latest/{base}", self.base_url, self.api_key)
        } else {
            format!(
                "{}/{}/history/{base}/{}/{}/{}",
                self.base_url,
                self.api_key,
                date.year(),
                date.month(),
                date.day()
            )
        }
    }

    /// Map the API's error-type string onto the structured taxonomy.
    fn map_api_error(error_type: Option<String>) -> SourceError {
        match error_type.as_deref() {
            Some("invalid-key") | Some("inactive-account") => {
                SourceError::AuthenticationRequired(error_type.unwrap_or_default())
            }
            Some("quota-reached") => SourceError::RateLimited { retry_after_secs: 3600 },
            Some(other) => SourceError::MalformedResponse(format!("API returned error: {other}")),
            None => SourceError::MalformedResponse("API returned failure with no error type".into()),
        }
    }

    /// Parse a response envelope into a RateSnapshot.
    fn parse_response(
        base: &str,
        date: NaiveDate,
        resp: RatesResponse,
    ) -> Result<RateSnapshot, SourceError> {
        if resp.result != "success" {
            return Err(Self::map_api_error(resp.error_type));
        }

        let base_code = resp
            .base_code
            .ok_or_else(|| SourceError::MalformedResponse("missing base_code".into()))?;
        if base_code != base {
            return Err(SourceError::MalformedResponse(format!(
                "requested base {base} but response is for {base_code}"
            )));
        }

        let rates = resp
            .conversion_rates
            .ok_or_else(|| SourceError::MalformedResponse("missing conversion_rates".into()))?;
        if rates.is_empty() {
            return Err(SourceError::MalformedResponse("empty conversion_rates".into()));
        }

        Ok(RateSnapshot {
            base: base_code,
            date,
            rates,
        })
    }

    /// Execute the request with retry and circuit breaker logic.
    fn fetch_with_retry(&self, base: &str, date: NaiveDate) -> Result<RateSnapshot, SourceError> {
        if !self.circuit_breaker.is_allowed() {
            return Err(SourceError::CircuitBreakerTripped);
        }

        let url = self.endpoint_url(base, date);
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = self.base_delay * 2u32.pow(attempt - 1);
                std::thread::sleep(delay);
            }

            if !self.circuit_breaker.is_allowed() {
                return Err(SourceError::CircuitBreakerTripped);
            }

            match self.client.get(&url).send() {
                Ok(resp) => {
                    let status = resp.status();

                    if status == reqwest::StatusCode::FORBIDDEN {
                        // Key revoked or blocked — stop hitting the API
                        self.circuit_breaker.trip();
                        return Err(SourceError::CircuitBreakerTripped);
                    }

                    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                        let retry_after = resp
                            .headers()
                            .get("retry-after")
                            .and_then(|v| v.to_str().ok())
                            .and_then(|v| v.parse::<u64>().ok())
                            .unwrap_or(60);
                        // Pass the provider's hint to the breaker so a
                        // trip cools down for exactly that long
                        self.circuit_breaker.throttle(Duration::from_secs(retry_after));
                        last_error = Some(SourceError::RateLimited {
                            retry_after_secs: retry_after,
                        });
                        continue;
                    }

                    if status == reqwest::StatusCode::UNAUTHORIZED {
                        return Err(SourceError::AuthenticationRequired(
                            "API key rejected".into(),
                        ));
                    }

                    if !status.is_success() {
                        self.circuit_breaker.record_failure();
                        last_error = Some(SourceError::Unavailable(format!(
                            "HTTP {status} for {base} on {date}"
                        )));
                        continue;
                    }

                    let envelope: RatesResponse = resp.json().map_err(|e| {
                        SourceError::MalformedResponse(format!(
                            "failed to parse response for {base}: {e}"
                        ))
                    })?;

                    let snapshot = Self::parse_response(base, date, envelope)?;
                    self.circuit_breaker.record_success();
                    return Ok(snapshot);
                }
                Err(e) => {
                    if e.is_connect() || e.is_timeout() {
                        last_error = Some(SourceError::Unavailable(e.to_string()));
                        continue;
                    }
                    return Err(SourceError::Unavailable(e.to_string()));
                }
            }
        }

        Err(last_error.unwrap_or_else(|| SourceError::Other("max retries exceeded".into())))
    }
}

impl RateSource for ExchangeRateApi {
    fn name(&self) -> &str {
        "exchangerate-api"
    }

    fn kind(&self) -> SourceKind {
        SourceKind::ExchangeRateApi
    }

    fn fetch(&self, base: &str, date: NaiveDate) -> Result<RateSnapshot, SourceError> {
        self.fetch_with_retry(base, date)
    }

    fn is_available(&self) -> bool {
        self.circuit_breaker.is_allowed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn envelope(result: &str, error_type: Option<&str>) -> RatesResponse {
        RatesResponse {
            result: result.into(),
            base_code: Some("USD".into()),
            conversion_rates: Some(BTreeMap::from([("BRL".to_string(), 5.02)])),
            error_type: error_type.map(String::from),
        }
    }

    #[test]
    fn parse_success_envelope() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        let snapshot =
            ExchangeRateApi::parse_response("USD", date, envelope("success", None)).unwrap();
        assert_eq!(snapshot.base, "USD");
        assert_eq!(snapshot.rates["BRL"], 5.02);
    }

    #[test]
    fn failure_envelope_maps_error_type() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        let err = ExchangeRateApi::parse_response("USD", date, envelope("error", Some("invalid-key")))
            .unwrap_err();
        assert!(matches!(err, SourceError::AuthenticationRequired(_)));

        let err =
            ExchangeRateApi::parse_response("USD", date, envelope("error", Some("quota-reached")))
                .unwrap_err();
        assert!(matches!(err, SourceError::RateLimited { .. }));
    }

    #[test]
    fn base_mismatch_is_malformed() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        let err =
            ExchangeRateApi::parse_response("EUR", date, envelope("success", None)).unwrap_err();
        assert!(matches!(err, SourceError::MalformedResponse(_)));
    }

    #[test]
    fn missing_rates_is_malformed() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        let resp = RatesResponse {
            result: "success".into(),
            base_code: Some("USD".into()),
            conversion_rates: None,
            error_type: None,
        };
        let err = ExchangeRateApi::parse_response("USD", date, resp).unwrap_err();
        assert!(matches!(err, SourceError::MalformedResponse(_)));
    }

    #[test]
    fn history_url_uses_calendar_parts() {
        let cb = Arc::new(CircuitBreaker::default_provider());
        let api = ExchangeRateApi::new(
            "https://v6.exchangerate-api.com/v6/",
            "test-key",
            Duration::from_secs(5),
            cb,
        )
        .unwrap();

        let date = NaiveDate::from_ymd_opt(2023, 7, 4).unwrap();
        let url = api.endpoint_url("USD", date);
        assert_eq!(
            url,
            "https://v6.exchangerate-api.com/v6/test-key/history/USD/2023/7/4"
        );
    }
}
