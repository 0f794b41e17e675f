#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/kessan-rs/kessan/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Core traits and types for Japanese disclosure data.
//!
//! This crate provides the foundational abstractions shared by every other crate:
//!
//! - [`FilingSource`](provider::FilingSource) - Disclosure document listing and download
//! - [`PriceDataProvider`](provider::PriceDataProvider) - OHLCV price data
//! - [`DisclosureEventProvider`](provider::DisclosureEventProvider) - Timely disclosures
//! - [`DataCache`](cache::DataCache) - Caching abstraction
//! - [`RateLimiter`](rate_limit::RateLimiter) - Request pacing for HTTP providers
//! - [`FactEntry`](fact::FactEntry) through [`MetricReport`](series::MetricReport) - pipeline records

/// Cache trait for storing fetched data.
pub mod cache;
/// Error types for data and pipeline operations.
pub mod error;
/// Fact records passed between pipeline stages.
pub mod fact;
/// Data frequency and fiscal period definitions.
pub mod frequency;
/// Provider traits for fetching disclosures and market data.
pub mod provider;
/// Request pacing shared by the HTTP providers.
pub mod rate_limit;
/// Metric series, warnings and reports.
pub mod series;
/// Reference data types (SecurityCode, FilingMeta, etc.).
pub mod types;

// Re-export commonly used items at crate root
pub use cache::DataCache;
pub use error::{DataError, PipelineError, Result};
pub use fact::{
    CanonicalUnit, ContextDefinition, DisplayScale, ExplicitMember, FactEntry, Metric,
    NormalizedFact, Period, PeriodKind, Provenance, ResolvedFact, UnitKind,
};
pub use frequency::{DataFrequency, FiscalPeriod};
pub use provider::{DataProvider, DisclosureEventProvider, FilingSource, PriceDataProvider};
pub use rate_limit::RateLimiter;
pub use series::{
    LatestPoint, MetricReport, MetricSeries, PipelineWarning, SeriesPoint, WarningKind,
    compound_growth, year_over_year,
};
pub use types::{
    AccountingStandard, DisclosureEvent, FilingMeta, FiscalYearEnd, FormType, SecurityCode,
};
