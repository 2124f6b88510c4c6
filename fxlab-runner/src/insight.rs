//! LLM insight generation over the aggregated tier.
//!
//! An insight is a short natural-language note about the day's metrics,
//! produced by a chat-completions endpoint. Insight failures never fail
//! a pipeline run: the orchestrator downgrades the run to
//! `SucceededWithoutInsight` and moves on.
//!
//! Each stored insight carries the fingerprint of the metrics it was
//! generated from, so a re-run over unchanged data reuses the cached
//! insight instead of calling the model again.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use fxlab_core::domain::{AggregatedMetricSet, ValidationReport};

use crate::config::InsightConfig;

#[derive(Debug, Error)]
pub enum InsightError {
    #[error("insight endpoint unavailable: {0}")]
    Unavailable(String),

    #[error("insight API key missing or rejected ({0})")]
    AuthenticationRequired(String),

    #[error("malformed insight response: {0}")]
    MalformedResponse(String),
}

/// A generated insight, stored alongside the aggregated metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    pub generated_at: chrono::NaiveDateTime,
    pub model: String,
    /// Fingerprint of the metric set this insight describes.
    pub metric_fingerprint: String,
    pub text: String,
}

/// Anything that can turn metrics into an insight text.
///
/// The production implementation is [`ChatCompletionsClient`]; tests
/// substitute canned generators.
pub trait InsightGenerator: Send + Sync {
    fn model(&self) -> &str;

    fn generate(&self, prompt: &str) -> Result<String, InsightError>;
}

/// Builds the analysis prompt from the aggregated metrics and the
/// validation reports that fed them.
pub struct PromptBuilder;

impl PromptBuilder {
    pub fn build(metrics: &AggregatedMetricSet, reports: &[ValidationReport]) -> String {
        let mut lines = Vec::with_capacity(metrics.metrics.len() + 8);
        lines.push(format!(
            "You are an FX analyst. Summarize the following {} rates for {} in 2-3 sentences. \
             Mention the most volatile currencies and any data quality concerns.",
            metrics.base, metrics.window,
        ));
        lines.push(String::new());
        lines.push("rank | currency | latest | pct_change".to_string());
        for m in &metrics.metrics {
            let change = match m.pct_change {
                Some(pct) => format!("{pct:+.4}%"),
                None => "n/a".to_string(),
            };
            lines.push(format!(
                "{} | {} | {:.6} | {}",
                m.volatility_rank, m.target, m.latest_rate, change
            ));
        }

        let accepted: usize = reports.iter().map(|r| r.accepted).sum();
        let rejected: usize = reports.iter().map(|r| r.rejected).sum();
        let duplicates: usize = reports.iter().map(|r| r.duplicates).sum();
        lines.push(String::new());
        lines.push(format!(
            "Data quality: {accepted} accepted, {rejected} rejected, {duplicates} duplicates."
        ));

        lines.join("\n")
    }
}

// ── Chat-completions wire types ──────────────────────────────────────

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f64,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: String,
}

/// Blocking chat-completions client.
pub struct ChatCompletionsClient {
    client: reqwest::blocking::Client,
    endpoint: String,
    model: String,
    api_key: String,
    max_tokens: u32,
    temperature: f64,
}

impl ChatCompletionsClient {
    /// Build from config, reading the API key from the configured
    /// environment variable.
    pub fn from_config(config: &InsightConfig) -> Result<Self, InsightError> {
        let api_key = std::env::var(&config.api_key_env)
            .map_err(|_| InsightError::AuthenticationRequired(config.api_key_env.clone()))?;
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| InsightError::Unavailable(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            api_key,
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        })
    }
}

impl InsightGenerator for ChatCompletionsClient {
    fn model(&self) -> &str {
        &self.model
    }

    fn generate(&self, prompt: &str) -> Result<String, InsightError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .map_err(|e| InsightError::Unavailable(e.to_string()))?;

        let status = response.status();
        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(InsightError::AuthenticationRequired(status.to_string()));
        }
        if !status.is_success() {
            return Err(InsightError::Unavailable(format!("HTTP {status}")));
        }

        let body: ChatResponse = response
            .json()
            .map_err(|e| InsightError::MalformedResponse(e.to_string()))?;
        let choice = body
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| InsightError::MalformedResponse("no choices in response".into()))?;

        let text = choice.message.content.trim().to_string();
        if text.is_empty() {
            return Err(InsightError::MalformedResponse("empty completion".into()));
        }
        Ok(text)
    }
}
