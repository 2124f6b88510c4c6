//! FXLab Runner — pipeline orchestration, configuration, and reporting.
//!
//! This crate builds on `fxlab-core` to provide:
//! - TOML-driven pipeline configuration with content-addressed run ids
//! - The orchestrator (daily and historical modes) with per-date
//!   isolation and raw-tier recovery
//! - LLM insight generation with fingerprint-keyed caching
//! - Serializable run reports

pub mod config;
pub mod insight;
pub mod pipeline;
pub mod report;

pub use config::{ConfigError, PipelineConfig, ProviderKind, RunId};
pub use insight::{ChatCompletionsClient, Insight, InsightError, InsightGenerator, PromptBuilder};
pub use pipeline::{source_from_config, PipelineError, PipelineOrchestrator};
pub use report::{RunMode, RunReport, RunStatus, Stage, StageStatus};
