//! Layered on-disk store for the three pipeline tiers.
//!
//! Layout: `{root}/layer={raw|validated|aggregated}/{date}.{json|csv}`
//!
//! Features:
//! - Atomic writes (write to .tmp, rename into place)
//! - Deterministic keys: one artifact per (layer, business date), so a
//!   re-run overwrites instead of appending
//! - Metadata sidecar per artifact (record count, content hash, source)
//! - Insight sidecar cached next to the aggregated tier
//!
//! The raw and aggregated tiers persist as JSON; the validated tier as
//! CSV with its report in a JSON sidecar.

use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::domain::{AggregatedMetricSet, RawRecordSet, ValidatedRecord, ValidatedRecordSet, ValidationReport};
use crate::fingerprint;

/// The three quality tiers the store knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Layer {
    Raw,
    Validated,
    Aggregated,
}

impl Layer {
    pub fn all() -> [Layer; 3] {
        [Layer::Raw, Layer::Validated, Layer::Aggregated]
    }

    fn dir_name(self) -> &'static str {
        match self {
            Layer::Raw => "layer=raw",
            Layer::Validated => "layer=validated",
            Layer::Aggregated => "layer=aggregated",
        }
    }
}

impl std::fmt::Display for Layer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Layer::Raw => write!(f, "raw"),
            Layer::Validated => write!(f, "validated"),
            Layer::Aggregated => write!(f, "aggregated"),
        }
    }
}

/// Structured error types for store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store write failed: {0}")]
    Write(String),

    #[error("store read failed: {0}")]
    Read(String),

    #[error("no stored {layer} data for {date}")]
    Missing { layer: Layer, date: NaiveDate },

    #[error("store serialization: {0}")]
    Serde(String),
}

/// Metadata sidecar for one stored artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerMeta {
    pub layer: Layer,
    pub business_date: NaiveDate,
    /// Base currency of the stored set.
    pub base: String,
    pub record_count: usize,
    pub content_hash: String,
    /// Provider provenance. Only the raw tier records one; the derived
    /// tiers are computed, not fetched.
    pub source: Option<String>,
    pub written_at: chrono::NaiveDateTime,
}

/// The layered store, rooted at a data directory.
pub struct LayerStore {
    root: PathBuf,
}

impl LayerStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory of the store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn layer_dir(&self, layer: Layer) -> PathBuf {
        self.root.join(layer.dir_name())
    }

    fn artifact_path(&self, layer: Layer, date: NaiveDate, ext: &str) -> PathBuf {
        self.layer_dir(layer).join(format!("{date}.{ext}"))
    }

    fn meta_path(&self, layer: Layer, date: NaiveDate) -> PathBuf {
        self.layer_dir(layer).join(format!("{date}.meta.json"))
    }

    /// Write bytes atomically: .tmp then rename into place.
    fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| StoreError::Write(format!("create dir: {e}")))?;
        }
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, bytes).map_err(|e| StoreError::Write(format!("write tmp: {e}")))?;
        fs::rename(&tmp, path).map_err(|e| {
            let _ = fs::remove_file(&tmp);
            StoreError::Write(format!("atomic rename: {e}"))
        })?;
        Ok(())
    }

    fn write_meta(
        &self,
        layer: Layer,
        date: NaiveDate,
        base: &str,
        record_count: usize,
        content_hash: String,
        source: Option<&str>,
    ) -> Result<(), StoreError> {
        let meta = LayerMeta {
            layer,
            business_date: date,
            base: base.to_string(),
            record_count,
            content_hash,
            source: source.map(String::from),
            written_at: chrono::Local::now().naive_local(),
        };
        let json = serde_json::to_vec_pretty(&meta).map_err(|e| StoreError::Serde(e.to_string()))?;
        Self::write_atomic(&self.meta_path(layer, date), &json)
    }

    // ── Raw tier ──

    pub fn write_raw(&self, set: &RawRecordSet) -> Result<PathBuf, StoreError> {
        let path = self.artifact_path(Layer::Raw, set.business_date, "json");
        let json = serde_json::to_vec_pretty(set).map_err(|e| StoreError::Serde(e.to_string()))?;
        Self::write_atomic(&path, &json)?;
        self.write_meta(
            Layer::Raw,
            set.business_date,
            &set.base,
            set.records.len(),
            blake3::hash(&json).to_hex().to_string(),
            Some(&set.fetched_from.to_string()),
        )?;
        Ok(path)
    }

    pub fn load_raw(&self, date: NaiveDate) -> Result<RawRecordSet, StoreError> {
        let path = self.artifact_path(Layer::Raw, date, "json");
        let bytes = Self::read_artifact(&path, Layer::Raw, date)?;
        serde_json::from_slice(&bytes).map_err(|e| StoreError::Serde(e.to_string()))
    }

    // ── Validated tier ──

    pub fn write_validated(&self, set: &ValidatedRecordSet) -> Result<PathBuf, StoreError> {
        let path = self.artifact_path(Layer::Validated, set.business_date, "csv");

        let mut writer = csv::Writer::from_writer(Vec::new());
        for record in &set.records {
            writer
                .serialize(record)
                .map_err(|e| StoreError::Serde(format!("csv record: {e}")))?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|e| StoreError::Serde(format!("csv flush: {e}")))?;
        Self::write_atomic(&path, &bytes)?;

        let report_path = self.artifact_path(Layer::Validated, set.business_date, "report.json");
        let report_json = serde_json::to_vec_pretty(&set.report)
            .map_err(|e| StoreError::Serde(e.to_string()))?;
        Self::write_atomic(&report_path, &report_json)?;

        self.write_meta(
            Layer::Validated,
            set.business_date,
            &set.base,
            set.records.len(),
            fingerprint::fingerprint_validated(set),
            None,
        )?;
        Ok(path)
    }

    pub fn load_validated(&self, date: NaiveDate) -> Result<ValidatedRecordSet, StoreError> {
        let path = self.artifact_path(Layer::Validated, date, "csv");
        let bytes = Self::read_artifact(&path, Layer::Validated, date)?;

        let mut reader = csv::Reader::from_reader(bytes.as_slice());
        let mut records: Vec<ValidatedRecord> = Vec::new();
        for row in reader.deserialize() {
            records.push(row.map_err(|e| StoreError::Serde(format!("csv row: {e}")))?);
        }

        let report_path = self.artifact_path(Layer::Validated, date, "report.json");
        let report_bytes = Self::read_artifact(&report_path, Layer::Validated, date)?;
        let report: ValidationReport =
            serde_json::from_slice(&report_bytes).map_err(|e| StoreError::Serde(e.to_string()))?;

        let meta = self.load_meta(Layer::Validated, date)?;

        Ok(ValidatedRecordSet {
            business_date: date,
            base: meta.base,
            records,
            report,
        })
    }

    // ── Aggregated tier ──

    pub fn write_aggregated(&self, set: &AggregatedMetricSet) -> Result<PathBuf, StoreError> {
        // Range windows key by their end date
        let key_date = set.window.end;
        let path = self.artifact_path(Layer::Aggregated, key_date, "json");
        let json = serde_json::to_vec_pretty(set).map_err(|e| StoreError::Serde(e.to_string()))?;
        Self::write_atomic(&path, &json)?;
        self.write_meta(
            Layer::Aggregated,
            key_date,
            &set.base,
            set.metrics.len(),
            fingerprint::fingerprint_metrics(set),
            None,
        )?;
        Ok(path)
    }

    pub fn load_aggregated(&self, key_date: NaiveDate) -> Result<AggregatedMetricSet, StoreError> {
        let path = self.artifact_path(Layer::Aggregated, key_date, "json");
        let bytes = Self::read_artifact(&path, Layer::Aggregated, key_date)?;
        serde_json::from_slice(&bytes).map_err(|e| StoreError::Serde(e.to_string()))
    }

    // ── Insight sidecar ──

    pub fn write_insight<T: Serialize>(
        &self,
        key_date: NaiveDate,
        insight: &T,
    ) -> Result<PathBuf, StoreError> {
        let path = self.artifact_path(Layer::Aggregated, key_date, "insight.json");
        let json = serde_json::to_vec_pretty(insight).map_err(|e| StoreError::Serde(e.to_string()))?;
        Self::write_atomic(&path, &json)?;
        Ok(path)
    }

    pub fn load_insight<T: DeserializeOwned>(&self, key_date: NaiveDate) -> Result<T, StoreError> {
        let path = self.artifact_path(Layer::Aggregated, key_date, "insight.json");
        let bytes = Self::read_artifact(&path, Layer::Aggregated, key_date)?;
        serde_json::from_slice(&bytes).map_err(|e| StoreError::Serde(e.to_string()))
    }

    // ── Shared helpers ──

    fn read_artifact(path: &Path, layer: Layer, date: NaiveDate) -> Result<Vec<u8>, StoreError> {
        if !path.exists() {
            return Err(StoreError::Missing { layer, date });
        }
        fs::read(path).map_err(|e| StoreError::Read(format!("{}: {e}", path.display())))
    }

    pub fn load_meta(&self, layer: Layer, date: NaiveDate) -> Result<LayerMeta, StoreError> {
        let path = self.meta_path(layer, date);
        let bytes = Self::read_artifact(&path, layer, date)?;
        serde_json::from_slice(&bytes).map_err(|e| StoreError::Serde(e.to_string()))
    }

    /// Inventory of every stored artifact, per layer, sorted by date.
    /// Feeds the CLI status command.
    pub fn status(&self) -> Result<Vec<LayerMeta>, StoreError> {
        let mut metas = Vec::new();
        for layer in Layer::all() {
            let dir = self.layer_dir(layer);
            if !dir.exists() {
                continue;
            }
            let entries =
                fs::read_dir(&dir).map_err(|e| StoreError::Read(format!("read dir: {e}")))?;
            for entry in entries {
                let entry = entry.map_err(|e| StoreError::Read(e.to_string()))?;
                let name = entry.file_name().to_string_lossy().to_string();
                if !name.ends_with(".meta.json") {
                    continue;
                }
                let bytes = fs::read(entry.path())
                    .map_err(|e| StoreError::Read(format!("read meta: {e}")))?;
                match serde_json::from_slice::<LayerMeta>(&bytes) {
                    Ok(meta) => metas.push(meta),
                    Err(_) => continue, // corrupt meta is skipped, not fatal
                }
            }
        }
        metas.sort_by(|a, b| (a.layer, a.business_date).cmp(&(b.layer, b.business_date)));
        Ok(metas)
    }
}
