//! Serializable pipeline configuration.
//!
//! The pipeline is driven by a TOML config file with sections for the
//! rate source, currency universe, validation bounds, insight
//! generation, and the store location. Every field has a default, so a
//! minimal config (or none at all) still runs.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use thiserror::Error;

use fxlab_core::domain::AggregationWindow;

/// Unique identifier for a pipeline run (content-addressable hash).
pub type RunId = String;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config file: {0}")]
    Read(String),

    #[error("parse config TOML: {0}")]
    Parse(String),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Complete configuration for a pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    pub source: SourceConfig,
    pub currencies: CurrencyConfig,
    pub validation: ValidationConfig,
    pub insight: InsightConfig,
    pub store: StoreConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            source: SourceConfig::default(),
            currencies: CurrencyConfig::default(),
            validation: ValidationConfig::default(),
            insight: InsightConfig::default(),
            store: StoreConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Load a pipeline config from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::Read(e.to_string()))?;
        Self::from_toml(&content)
    }

    /// Parse a pipeline config from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.currencies.targets.is_empty() {
            return Err(ConfigError::Invalid("currencies.targets is empty".into()));
        }
        if self.currencies.targets.iter().any(|t| t == &self.currencies.base) {
            return Err(ConfigError::Invalid(
                "currencies.targets must not contain the base currency".into(),
            ));
        }
        if self.validation.min_rate >= self.validation.max_rate {
            return Err(ConfigError::Invalid(
                "validation.min_rate must be below validation.max_rate".into(),
            ));
        }
        Ok(())
    }

    /// Codes the validator should treat as known: base plus targets.
    pub fn known_currencies(&self) -> BTreeSet<String> {
        self.currencies
            .targets
            .iter()
            .cloned()
            .chain(std::iter::once(self.currencies.base.clone()))
            .collect()
    }

    /// Computes a deterministic hash ID for a run of this configuration
    /// over the given window.
    ///
    /// Two runs with identical config and window share a RunId, which is
    /// what makes re-runs idempotent at the reporting level.
    pub fn run_id(&self, window: AggregationWindow) -> RunId {
        let json = serde_json::to_string(&(self, window.start, window.end))
            .expect("PipelineConfig serialization failed");
        blake3::hash(json.as_bytes()).to_hex().to_string()
    }
}

/// Rate source configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SourceConfig {
    /// Which provider backs the raw tier.
    pub provider: ProviderKind,

    /// Base URL for the live API.
    pub base_url: String,

    /// Environment variable holding the live API key.
    pub api_key_env: String,

    /// HTTP timeout in seconds.
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    ExchangeRateApi,
    Synthetic,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::ExchangeRateApi,
            base_url: "https://v6.exchangerate-api.com/v6".to_string(),
            api_key_env: "FXLAB_API_KEY".to_string(),
            timeout_secs: 10,
        }
    }
}

/// Currency universe: one base, many targets.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CurrencyConfig {
    pub base: String,
    pub targets: Vec<String>,
}

impl Default for CurrencyConfig {
    fn default() -> Self {
        Self {
            base: "USD".to_string(),
            targets: ["EUR", "GBP", "JPY", "CHF", "CAD", "AUD", "BRL", "MXN", "CNY", "INR"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

/// Validation bounds and normalization precision.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ValidationConfig {
    pub min_rate: f64,
    pub max_rate: f64,
    pub precision: u32,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            min_rate: 0.0001,
            max_rate: 1_000_000.0,
            precision: 6,
        }
    }
}

/// LLM insight generation settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct InsightConfig {
    pub enabled: bool,
    pub endpoint: String,
    pub model: String,
    pub api_key_env: String,
    pub max_tokens: u32,
    pub temperature: f64,
}

impl Default for InsightConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            max_tokens: 256,
            temperature: 0.3,
        }
    }
}

/// Store location.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StoreConfig {
    pub data_dir: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: "data".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn window() -> AggregationWindow {
        AggregationWindow::single(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap())
    }

    #[test]
    fn test_defaults_parse_from_empty_toml() {
        let config = PipelineConfig::from_toml("").unwrap();
        assert_eq!(config, PipelineConfig::default());
        assert_eq!(config.currencies.base, "USD");
        assert!(config.insight.enabled);
    }

    #[test]
    fn test_partial_toml_overrides_one_section() {
        let toml = r#"
            [currencies]
            base = "EUR"
            targets = ["USD", "GBP"]

            [insight]
            enabled = false
        "#;
        let config = PipelineConfig::from_toml(toml).unwrap();
        assert_eq!(config.currencies.base, "EUR");
        assert_eq!(config.currencies.targets, vec!["USD", "GBP"]);
        assert!(!config.insight.enabled);
        // Untouched sections keep defaults
        assert_eq!(config.validation.precision, 6);
    }

    #[test]
    fn test_run_id_deterministic() {
        let config = PipelineConfig::default();
        let id1 = config.run_id(window());
        let id2 = config.run_id(window());
        assert_eq!(id1, id2, "RunId should be deterministic");
        assert!(!id1.is_empty());
    }

    #[test]
    fn test_run_id_changes_with_window_and_config() {
        let config = PipelineConfig::default();
        let other_window = AggregationWindow::single(NaiveDate::from_ymd_opt(2024, 3, 2).unwrap());
        assert_ne!(config.run_id(window()), config.run_id(other_window));

        let mut other_config = config.clone();
        other_config.currencies.base = "EUR".to_string();
        assert_ne!(config.run_id(window()), other_config.run_id(window()));
    }

    #[test]
    fn test_base_in_targets_is_rejected() {
        let toml = r#"
            [currencies]
            base = "USD"
            targets = ["EUR", "USD"]
        "#;
        let err = PipelineConfig::from_toml(toml).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_known_currencies_include_base() {
        let config = PipelineConfig::default();
        let known = config.known_currencies();
        assert!(known.contains("USD"));
        assert!(known.contains("EUR"));
    }
}
