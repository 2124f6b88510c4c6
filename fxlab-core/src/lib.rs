//! FXLab Core — domain types, rate sources, and the three pipeline tiers.
//!
//! This crate contains the heart of the FX rate pipeline:
//! - Domain types (raw records, validated records, aggregated metrics)
//! - Rate source trait with live (exchangerate-api) and synthetic providers
//! - Raw capture of provider snapshots into dated batches
//! - Rule-based validation, deduplication, and normalization
//! - Cross-date aggregation with volatility ranking
//! - Content fingerprints for artifact identity
//! - Layered on-disk store with atomic writes

pub mod aggregate;
pub mod capture;
pub mod domain;
pub mod fingerprint;
pub mod source;
pub mod store;
pub mod validate;
