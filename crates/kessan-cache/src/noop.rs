//! No-op cache implementation.

use async_trait::async_trait;
use chrono::NaiveDate;
use kessan_core::{DataCache, MetricReport, Result, SecurityCode};
use polars::prelude::DataFrame;
use std::time::Duration;
use tracing::trace;

/// A no-op cache that doesn't store anything.
///
/// All `get_*` methods return `Ok(None)` and all `put_*` methods return `Ok(())`.
/// Useful for disabling caching or testing code paths without cache hits.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopCache;

impl NoopCache {
    /// Create a new no-op cache.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DataCache for NoopCache {
    async fn get_ohlcv(
        &self,
        _provider: &str,
        _code: &SecurityCode,
        _start: NaiveDate,
        _end: NaiveDate,
    ) -> Result<Option<DataFrame>> {
        trace!("NoopCache: get_ohlcv called, returning None");
        Ok(None)
    }

    async fn put_ohlcv(
        &self,
        _provider: &str,
        _code: &SecurityCode,
        _data: &DataFrame,
    ) -> Result<()> {
        trace!("NoopCache: put_ohlcv called, doing nothing");
        Ok(())
    }

    async fn get_report(
        &self,
        _provider: &str,
        _code: &SecurityCode,
        _years: usize,
    ) -> Result<Option<MetricReport>> {
        trace!("NoopCache: get_report called, returning None");
        Ok(None)
    }

    async fn put_report(
        &self,
        _provider: &str,
        _code: &SecurityCode,
        _years: usize,
        _report: &MetricReport,
    ) -> Result<()> {
        trace!("NoopCache: put_report called, doing nothing");
        Ok(())
    }

    async fn get_document(&self, _document_id: &str) -> Result<Option<Vec<u8>>> {
        trace!("NoopCache: get_document called, returning None");
        Ok(None)
    }

    async fn put_document(&self, _document_id: &str, _bytes: &[u8]) -> Result<()> {
        trace!("NoopCache: put_document called, doing nothing");
        Ok(())
    }

    async fn invalidate_stale(&self, _ttl: Duration) -> Result<usize> {
        Ok(0)
    }

    async fn clear(&self) -> Result<()> {
        Ok(())
    }
}
