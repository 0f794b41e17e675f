#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/kessan-rs/kessan/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Financial metrics from Japanese statutory disclosures.
//!
//! This crate re-exports the core types, the XBRL pipeline, the cache
//! implementations and the providers, and adds the [`FilingOrchestrator`]
//! that ties them together, plus technical indicators, threshold alerts and
//! portfolio valuation.
//!
//! # Features
//!
//! - `edinet` - EDINET filing source
//! - `tdnet` - TDnet timely-disclosure headlines
//! - `yahoo` - Yahoo Finance daily prices for TSE codes
//! - `cache-sqlite` - SQLite-based caching
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use kessan::{config::AppConfig, EdinetProvider, FilingOrchestrator, InMemoryCache, SecurityCode};
//!
//! #[tokio::main]
//! async fn main() -> kessan::Result<()> {
//!     let config = AppConfig::from_env();
//!     let edinet = EdinetProvider::new(&config.user_agent());
//!     let orchestrator = FilingOrchestrator::new(Arc::new(edinet))
//!         .with_cache(Arc::new(InMemoryCache::new()));
//!
//!     let report = orchestrator
//!         .fetch_metrics(&SecurityCode::new("7203"), config.filings_years)
//!         .await?;
//!     for warning in &report.warnings {
//!         eprintln!("{warning}");
//!     }
//!
//!     Ok(())
//! }
//! ```

// Core types and traits
pub use kessan_core::*;

// Pipeline
pub use kessan_xbrl::{
    BuildConfig, ConceptMap, ConsolidationPolicy, DocumentOutcome, MetricPipeline,
    PrecedenceOrder, ResolverConfig, discrete_quarter,
};

// Cache implementations
#[cfg(feature = "cache-sqlite")]
pub use kessan_cache::SqliteCache;
pub use kessan_cache::{InMemoryCache, NoopCache};

// Providers
#[cfg(feature = "edinet")]
pub use kessan_edinet::{CodeMapping, EdinetProvider};
#[cfg(feature = "tdnet")]
pub use kessan_tdnet::TdnetProvider;
#[cfg(feature = "yahoo")]
pub use kessan_yahoo::YahooProvider;

pub mod alerts;
pub mod config;
pub mod indicators;
pub mod portfolio;

mod json_file;
mod orchestrator;
pub use orchestrator::{DEFAULT_CONCURRENCY, FilingOrchestrator, PRICE_LOOKBACK_DAYS};
