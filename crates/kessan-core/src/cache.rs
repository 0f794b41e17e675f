//! Cache trait for storing fetched data.
//!
//! This module defines the [`DataCache`] trait that provides a unified interface
//! for caching OHLCV data, metric reports, and raw XBRL documents.

use async_trait::async_trait;
use chrono::NaiveDate;
use polars::prelude::DataFrame;
use std::time::Duration;

use crate::{error::Result, series::MetricReport, types::SecurityCode};

/// Trait for caching fetched data.
///
/// Implementations can store data in various backends (SQLite, in-memory, etc.)
/// to avoid repeated API calls.
#[async_trait]
pub trait DataCache: Send + Sync {
    /// Retrieves cached OHLCV data for a security within a date range.
    ///
    /// Returns `Ok(Some(df))` if cached data exists, `Ok(None)` if not cached.
    async fn get_ohlcv(
        &self,
        provider: &str,
        code: &SecurityCode,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Option<DataFrame>>;

    /// Stores OHLCV data in the cache.
    async fn put_ohlcv(&self, provider: &str, code: &SecurityCode, data: &DataFrame)
    -> Result<()>;

    /// Retrieves a cached metric report built from `years` filings.
    async fn get_report(
        &self,
        provider: &str,
        code: &SecurityCode,
        years: usize,
    ) -> Result<Option<MetricReport>>;

    /// Stores a metric report.
    async fn put_report(
        &self,
        provider: &str,
        code: &SecurityCode,
        years: usize,
        report: &MetricReport,
    ) -> Result<()>;

    /// Retrieves the raw XBRL bytes of a document.
    async fn get_document(&self, document_id: &str) -> Result<Option<Vec<u8>>>;

    /// Stores the raw XBRL bytes of a document.
    async fn put_document(&self, document_id: &str, bytes: &[u8]) -> Result<()>;

    /// Removes cache entries older than the specified TTL.
    ///
    /// Returns the number of entries invalidated.
    async fn invalidate_stale(&self, ttl: Duration) -> Result<usize>;

    /// Clears all cached data.
    async fn clear(&self) -> Result<()>;
}
