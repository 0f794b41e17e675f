#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/kessan-rs/kessan/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! XBRL fact extraction and metric normalization.
//!
//! The stages run leaves first:
//!
//! - [`ConceptMap`] - canonical metric to taxonomy element mapping
//! - [`FactExtractor`] - document bytes to [`FactEntry`](kessan_core::FactEntry)s
//! - [`ContextResolver`] - fiscal year, period and consolidation
//! - [`units::normalize`] - canonical units and display scale
//! - [`SeriesBuilder`] - per-metric series with YoY and CAGR
//! - [`MetricPipeline`] - all of the above for a set of documents
//!
//! Every stage is synchronous and free of shared mutable state.

/// Canonical metric to taxonomy element mapping.
pub mod concept_map;
/// Context resolution.
pub mod context;
/// Fact extraction.
pub mod extractor;
/// End-to-end pipeline.
pub mod pipeline;
/// Precedence between competing facts.
pub mod precedence;
/// Metric series builder.
pub mod series;
/// Unit normalization.
pub mod units;

pub use concept_map::{Candidate, ConceptMap, ConceptMatch};
pub use context::{ContextResolver, ResolverConfig};
pub use extractor::{ExtractedDocument, FactExtractor};
pub use pipeline::{DocumentOutcome, MetricPipeline};
pub use precedence::PrecedenceOrder;
pub use series::{BuildConfig, ConsolidationPolicy, SeriesBuilder, discrete_quarter};
