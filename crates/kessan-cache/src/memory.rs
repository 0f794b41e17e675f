//! In-memory cache implementation.

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use kessan_core::{DataCache, DataError, MetricReport, Result, SecurityCode};
use polars::prelude::*;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

/// Cache entry with timestamp for TTL-based invalidation.
#[derive(Debug, Clone)]
struct CacheEntry<T> {
    data: T,
    cached_at: chrono::DateTime<Utc>,
}

impl<T> CacheEntry<T> {
    fn new(data: T) -> Self {
        Self {
            data,
            cached_at: Utc::now(),
        }
    }

    fn is_stale(&self, ttl: Duration) -> bool {
        let age = Utc::now().signed_duration_since(self.cached_at);
        age > chrono::TimeDelta::from_std(ttl).unwrap_or(chrono::TimeDelta::MAX)
    }
}

/// Key for OHLCV cache entries.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct OhlcvKey {
    provider: String,
    code: SecurityCode,
}

/// Key for metric report cache entries.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ReportKey {
    provider: String,
    code: SecurityCode,
    years: usize,
}

/// Simple in-memory cache for testing and development.
///
/// Data is stored in `RwLock`-protected `HashMap`s and is lost when the cache
/// is dropped. OHLCV frames are kept whole per provider and code and sliced
/// to the requested range on read; a put replaces the stored frame.
#[derive(Debug, Default)]
pub struct InMemoryCache {
    ohlcv: RwLock<HashMap<OhlcvKey, CacheEntry<DataFrame>>>,
    reports: RwLock<HashMap<ReportKey, CacheEntry<MetricReport>>>,
    documents: RwLock<HashMap<String, CacheEntry<Vec<u8>>>>,
}

impl InMemoryCache {
    /// Create a new empty in-memory cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DataCache for InMemoryCache {
    #[instrument(skip(self), fields(provider = %provider, code = %code))]
    async fn get_ohlcv(
        &self,
        provider: &str,
        code: &SecurityCode,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Option<DataFrame>> {
        let key = OhlcvKey {
            provider: provider.to_string(),
            code: code.clone(),
        };

        let cache = self.ohlcv.read().await;
        let Some(entry) = cache.get(&key) else {
            debug!("Cache miss for OHLCV data");
            return Ok(None);
        };

        let sliced = entry
            .data
            .clone()
            .lazy()
            .filter(col("date").gt_eq(lit(start)).and(col("date").lt_eq(lit(end))))
            .collect()
            .map_err(|e| DataError::Cache(e.to_string()))?;

        if sliced.height() == 0 {
            debug!("Cached OHLCV data does not cover the range");
            return Ok(None);
        }

        debug!("Cache hit for {} OHLCV rows", sliced.height());
        Ok(Some(sliced))
    }

    #[instrument(skip(self, data), fields(provider = %provider, code = %code))]
    async fn put_ohlcv(&self, provider: &str, code: &SecurityCode, data: &DataFrame) -> Result<()> {
        let key = OhlcvKey {
            provider: provider.to_string(),
            code: code.clone(),
        };

        let mut cache = self.ohlcv.write().await;
        cache.insert(key, CacheEntry::new(data.clone()));
        debug!("Cached {} OHLCV rows", data.height());
        Ok(())
    }

    #[instrument(skip(self), fields(provider = %provider, code = %code))]
    async fn get_report(
        &self,
        provider: &str,
        code: &SecurityCode,
        years: usize,
    ) -> Result<Option<MetricReport>> {
        let key = ReportKey {
            provider: provider.to_string(),
            code: code.clone(),
            years,
        };

        let cache = self.reports.read().await;
        match cache.get(&key) {
            Some(entry) => {
                debug!("Cache hit for metric report");
                Ok(Some(entry.data.clone()))
            }
            None => {
                debug!("Cache miss for metric report");
                Ok(None)
            }
        }
    }

    #[instrument(skip(self, report), fields(provider = %provider, code = %code, series = report.series.len()))]
    async fn put_report(
        &self,
        provider: &str,
        code: &SecurityCode,
        years: usize,
        report: &MetricReport,
    ) -> Result<()> {
        let key = ReportKey {
            provider: provider.to_string(),
            code: code.clone(),
            years,
        };

        let mut cache = self.reports.write().await;
        cache.insert(key, CacheEntry::new(report.clone()));
        debug!("Cached metric report");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_document(&self, document_id: &str) -> Result<Option<Vec<u8>>> {
        let cache = self.documents.read().await;
        let hit = cache.get(document_id).map(|entry| entry.data.clone());
        debug!(hit = hit.is_some(), "Document cache lookup");
        Ok(hit)
    }

    #[instrument(skip(self, bytes), fields(len = bytes.len()))]
    async fn put_document(&self, document_id: &str, bytes: &[u8]) -> Result<()> {
        let mut cache = self.documents.write().await;
        cache.insert(document_id.to_string(), CacheEntry::new(bytes.to_vec()));
        Ok(())
    }

    #[instrument(skip(self))]
    async fn invalidate_stale(&self, ttl: Duration) -> Result<usize> {
        let mut total_removed = 0usize;

        {
            let mut cache = self.ohlcv.write().await;
            let before = cache.len();
            cache.retain(|_, entry| !entry.is_stale(ttl));
            total_removed += before - cache.len();
        }

        {
            let mut cache = self.reports.write().await;
            let before = cache.len();
            cache.retain(|_, entry| !entry.is_stale(ttl));
            total_removed += before - cache.len();
        }

        {
            let mut cache = self.documents.write().await;
            let before = cache.len();
            cache.retain(|_, entry| !entry.is_stale(ttl));
            total_removed += before - cache.len();
        }

        if total_removed > 0 {
            debug!("Invalidated {} stale cache entries", total_removed);
        }

        Ok(total_removed)
    }

    #[instrument(skip(self))]
    async fn clear(&self) -> Result<()> {
        self.ohlcv.write().await.clear();
        self.reports.write().await.clear();
        self.documents.write().await.clear();
        debug!("Cleared all cache entries");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kessan_core::{CanonicalUnit, DisplayScale, FiscalPeriod, Metric, MetricSeries, SeriesPoint};

    fn prices() -> DataFrame {
        DataFrame::new(vec![
            Column::new("symbol".into(), vec!["7203", "7203", "7203"]),
            Column::new("date".into(), vec!["2024-01-04", "2024-01-05", "2024-01-09"]),
            Column::new("open".into(), vec![2600.0, 2650.0, 2700.0]),
            Column::new("high".into(), vec![2660.0, 2700.0, 2750.0]),
            Column::new("low".into(), vec![2590.0, 2640.0, 2680.0]),
            Column::new("close".into(), vec![2650.0, 2690.0, 2740.0]),
            Column::new("volume".into(), vec![18_000_000.0, 21_000_000.0, 19_500_000.0]),
        ])
        .unwrap()
        .lazy()
        .with_column(col("date").cast(DataType::Date))
        .collect()
        .unwrap()
    }

    fn report() -> MetricReport {
        MetricReport {
            series: vec![MetricSeries {
                metric: Metric::Revenue,
                period: FiscalPeriod::Annual,
                points: vec![SeriesPoint {
                    fiscal_year: 2024,
                    value: 45_095_325_000_000.0,
                    unit: CanonicalUnit::Currency("JPY".to_string()),
                    scale: DisplayScale::Millions,
                    period: FiscalPeriod::Annual,
                    consolidated: true,
                    source_document: "S100TOYO".to_string(),
                    yoy: Some(0.214),
                    cagr: None,
                }],
            }],
            warnings: Vec::new(),
            documents_used: 1,
        }
    }

    #[tokio::test]
    async fn test_memory_cache_ohlcv_range() {
        let cache = InMemoryCache::new();
        let code = SecurityCode::new("7203");
        let start = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();

        assert!(cache.get_ohlcv("test", &code, start, end).await.unwrap().is_none());

        cache.put_ohlcv("test", &code, &prices()).await.unwrap();

        let sliced = cache.get_ohlcv("test", &code, start, end).await.unwrap().unwrap();
        assert_eq!(sliced.height(), 2);

        let before = NaiveDate::from_ymd_opt(2023, 12, 1).unwrap();
        let result = cache
            .get_ohlcv("test", &code, before, before)
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_memory_cache_report() {
        let cache = InMemoryCache::new();
        let code = SecurityCode::new("7203");

        assert!(cache.get_report("edinet", &code, 5).await.unwrap().is_none());

        cache.put_report("edinet", &code, 5, &report()).await.unwrap();

        assert_eq!(cache.get_report("edinet", &code, 5).await.unwrap(), Some(report()));
        assert!(cache.get_report("edinet", &code, 3).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_memory_cache_documents() {
        let cache = InMemoryCache::new();

        cache.put_document("S100TOYO", b"<xbrli:xbrl/>").await.unwrap();

        assert_eq!(
            cache.get_document("S100TOYO").await.unwrap(),
            Some(b"<xbrli:xbrl/>".to_vec())
        );
        assert!(cache.get_document("S100OTHER").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_memory_cache_invalidate_and_clear() {
        let cache = InMemoryCache::new();
        let code = SecurityCode::new("7203");
        cache.put_report("edinet", &code, 5, &report()).await.unwrap();
        cache.put_document("S100TOYO", b"x").await.unwrap();

        let removed = cache
            .invalidate_stale(Duration::from_secs(3600))
            .await
            .unwrap();
        assert_eq!(removed, 0);

        tokio::time::sleep(Duration::from_millis(5)).await;
        let removed = cache.invalidate_stale(Duration::ZERO).await.unwrap();
        assert_eq!(removed, 2);

        cache.put_document("S100TOYO", b"x").await.unwrap();
        cache.clear().await.unwrap();
        assert!(cache.get_document("S100TOYO").await.unwrap().is_none());
    }
}
