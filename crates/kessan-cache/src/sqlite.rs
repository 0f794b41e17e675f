//! SQLite-based cache implementation.

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use kessan_core::{DataCache, DataError, MetricReport, Result, SecurityCode};
use polars::prelude::*;
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, instrument};

const TABLES: [&str; 3] = ["ohlcv_cache", "report_cache", "document_cache"];

/// SQLite-based cache for prices, metric reports and filing documents.
///
/// This cache stores data in a SQLite database file, providing persistence
/// across application restarts. Reports are stored as JSON and documents as
/// BLOBs.
#[derive(Debug)]
pub struct SqliteCache {
    conn: Mutex<Connection>,
}

impl SqliteCache {
    /// Opens or creates the cache database at `path`.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or schema creation fails.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        Self::with_connection(Connection::open(path).map_err(cache_err)?)
    }

    /// Cache held in memory for the life of the value.
    ///
    /// # Errors
    /// Returns an error if schema creation fails.
    pub fn in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory().map_err(cache_err)?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        let cache = Self {
            conn: Mutex::new(conn),
        };
        cache.initialize_schema()?;
        Ok(cache)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(cache_err)
    }

    fn initialize_schema(&self) -> Result<()> {
        let conn = self.lock()?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS ohlcv_cache (
                provider TEXT NOT NULL,
                code TEXT NOT NULL,
                date TEXT NOT NULL,
                open REAL,
                high REAL,
                low REAL,
                close REAL,
                volume REAL,
                adjusted_close REAL,
                cached_at TEXT NOT NULL,
                PRIMARY KEY (provider, code, date)
            )",
            [],
        )
        .map_err(cache_err)?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS report_cache (
                provider TEXT NOT NULL,
                code TEXT NOT NULL,
                years INTEGER NOT NULL,
                data_json TEXT NOT NULL,
                cached_at TEXT NOT NULL,
                PRIMARY KEY (provider, code, years)
            )",
            [],
        )
        .map_err(cache_err)?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS document_cache (
                document_id TEXT PRIMARY KEY,
                bytes BLOB NOT NULL,
                cached_at TEXT NOT NULL
            )",
            [],
        )
        .map_err(cache_err)?;

        debug!("SQLite cache schema initialized");
        Ok(())
    }
}

#[async_trait]
impl DataCache for SqliteCache {
    #[instrument(skip(self), fields(provider = %provider, code = %code))]
    async fn get_ohlcv(
        &self,
        provider: &str,
        code: &SecurityCode,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Option<DataFrame>> {
        let conn = self.lock()?;

        let mut stmt = conn
            .prepare(
                "SELECT date, open, high, low, close, volume, adjusted_close
                 FROM ohlcv_cache
                 WHERE provider = ?1 AND code = ?2 AND date >= ?3 AND date <= ?4
                 ORDER BY date ASC",
            )
            .map_err(cache_err)?;

        let mut dates = Vec::new();
        let mut opens: Vec<Option<f64>> = Vec::new();
        let mut highs: Vec<Option<f64>> = Vec::new();
        let mut lows: Vec<Option<f64>> = Vec::new();
        let mut closes: Vec<Option<f64>> = Vec::new();
        let mut volumes: Vec<Option<f64>> = Vec::new();
        let mut adj_closes: Vec<Option<f64>> = Vec::new();

        let rows = stmt
            .query_map(
                params![provider, code.as_str(), start.to_string(), end.to_string()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, Option<f64>>(1)?,
                        row.get::<_, Option<f64>>(2)?,
                        row.get::<_, Option<f64>>(3)?,
                        row.get::<_, Option<f64>>(4)?,
                        row.get::<_, Option<f64>>(5)?,
                        row.get::<_, Option<f64>>(6)?,
                    ))
                },
            )
            .map_err(cache_err)?;

        for row in rows {
            let (date, open, high, low, close, volume, adj_close) =
                row.map_err(cache_err)?;
            dates.push(date);
            opens.push(open);
            highs.push(high);
            lows.push(low);
            closes.push(close);
            volumes.push(volume);
            adj_closes.push(adj_close);
        }

        if dates.is_empty() {
            debug!("No cached OHLCV data found");
            return Ok(None);
        }

        debug!("Found {} cached OHLCV rows", dates.len());

        let df = DataFrame::new(vec![
            Column::new("symbol".into(), vec![code.as_str(); dates.len()]),
            Column::new("date".into(), dates),
            Column::new("open".into(), opens),
            Column::new("high".into(), highs),
            Column::new("low".into(), lows),
            Column::new("close".into(), closes),
            Column::new("volume".into(), volumes),
            Column::new("adjusted_close".into(), adj_closes),
        ])
        .map_err(cache_err)?;

        let df = df
            .lazy()
            .with_column(col("date").cast(DataType::Date))
            .collect()
            .map_err(cache_err)?;

        Ok(Some(df))
    }

    #[instrument(skip(self, data), fields(provider = %provider, code = %code))]
    async fn put_ohlcv(&self, provider: &str, code: &SecurityCode, data: &DataFrame) -> Result<()> {
        let cached_at = Utc::now().to_rfc3339();

        let dates = data
            .column("date")
            .map_err(cache_err)?
            .cast(&DataType::String)
            .map_err(cache_err)?;
        let dates = dates.str().map_err(cache_err)?;

        let numeric = |name: &str| -> Result<Float64Chunked> {
            let column = data
                .column(name)
                .map_err(cache_err)?
                .cast(&DataType::Float64)
                .map_err(cache_err)?;
            column
                .f64()
                .cloned()
                .map_err(cache_err)
        };
        let opens = numeric("open")?;
        let highs = numeric("high")?;
        let lows = numeric("low")?;
        let closes = numeric("close")?;
        let volumes = numeric("volume")?;
        // adjusted_close may be absent
        let adj_closes = numeric("adjusted_close").ok();

        let conn = self.lock()?;
        let tx = conn
            .unchecked_transaction()
            .map_err(cache_err)?;

        for i in 0..data.height() {
            let date = dates
                .get(i)
                .ok_or_else(|| DataError::Cache("Missing date".to_string()))?;
            let adj_close = adj_closes.as_ref().and_then(|c| c.get(i));

            tx.execute(
                "INSERT OR REPLACE INTO ohlcv_cache
                 (provider, code, date, open, high, low, close, volume, adjusted_close, cached_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    provider,
                    code.as_str(),
                    date,
                    opens.get(i),
                    highs.get(i),
                    lows.get(i),
                    closes.get(i),
                    volumes.get(i),
                    adj_close,
                    cached_at
                ],
            )
            .map_err(cache_err)?;
        }

        tx.commit().map_err(cache_err)?;
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
        let conn = self.lock()?;

        let result = conn
            .query_row(
                "SELECT data_json FROM report_cache
                 WHERE provider = ?1 AND code = ?2 AND years = ?3",
                params![provider, code.as_str(), years as i64],
                |row| row.get::<_, String>(0),
            )
            .optional()
            .map_err(cache_err)?;

        match result {
            Some(json) => {
                let report: MetricReport =
                    serde_json::from_str(&json).map_err(|e| DataError::Parse(e.to_string()))?;
                debug!("Found cached metric report");
                Ok(Some(report))
            }
            None => {
                debug!("No cached metric report found");
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
        let cached_at = Utc::now().to_rfc3339();
        let data_json =
            serde_json::to_string(report).map_err(|e| DataError::Parse(e.to_string()))?;

        let conn = self.lock()?;

        conn.execute(
            "INSERT OR REPLACE INTO report_cache
             (provider, code, years, data_json, cached_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![provider, code.as_str(), years as i64, data_json, cached_at],
        )
        .map_err(cache_err)?;

        debug!("Cached metric report");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_document(&self, document_id: &str) -> Result<Option<Vec<u8>>> {
        let conn = self.lock()?;

        let bytes = conn
            .query_row(
                "SELECT bytes FROM document_cache WHERE document_id = ?1",
                params![document_id],
                |row| row.get::<_, Vec<u8>>(0),
            )
            .optional()
            .map_err(cache_err)?;

        debug!(hit = bytes.is_some(), "Document cache lookup");
        Ok(bytes)
    }

    #[instrument(skip(self, bytes), fields(len = bytes.len()))]
    async fn put_document(&self, document_id: &str, bytes: &[u8]) -> Result<()> {
        let cached_at = Utc::now().to_rfc3339();
        let conn = self.lock()?;

        conn.execute(
            "INSERT OR REPLACE INTO document_cache (document_id, bytes, cached_at)
             VALUES (?1, ?2, ?3)",
            params![document_id, bytes, cached_at],
        )
        .map_err(cache_err)?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn invalidate_stale(&self, ttl: Duration) -> Result<usize> {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(ttl)
                .map_err(|e| DataError::Cache(format!("Invalid TTL duration: {}", e)))?;
        let cutoff_str = cutoff.to_rfc3339();

        let conn = self.lock()?;

        let mut total_deleted = 0usize;
        for table in TABLES {
            total_deleted += conn
                .execute(
                    &format!("DELETE FROM {} WHERE cached_at < ?1", table),
                    params![cutoff_str],
                )
                .map_err(cache_err)?;
        }

        if total_deleted > 0 {
            debug!("Invalidated {} stale cache entries", total_deleted);
        }

        Ok(total_deleted)
    }

    #[instrument(skip(self))]
    async fn clear(&self) -> Result<()> {
        let conn = self.lock()?;

        for table in TABLES {
            conn.execute(&format!("DELETE FROM {}", table), [])
                .map_err(cache_err)?;
        }

        debug!("Cleared all cache entries");
        Ok(())
    }
}

fn cache_err(e: impl ToString) -> DataError {
    DataError::Cache(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use kessan_core::{PipelineWarning, WarningKind};

    fn prices() -> DataFrame {
        DataFrame::new(vec![
            Column::new("symbol".into(), vec!["7203", "7203"]),
            Column::new("date".into(), vec!["2024-01-04", "2024-01-05"]),
            Column::new("open".into(), vec![2600.0, 2650.0]),
            Column::new("high".into(), vec![2660.0, 2700.0]),
            Column::new("low".into(), vec![Some(2590.0), None]),
            Column::new("close".into(), vec![2650.0, 2690.0]),
            Column::new("volume".into(), vec![18_000_000.0, 21_000_000.0]),
            Column::new("adjusted_close".into(), vec![2600.5, 2640.0]),
        ])
        .unwrap()
        .lazy()
        .with_column(col("date").cast(DataType::Date))
        .collect()
        .unwrap()
    }

    #[tokio::test]
    async fn test_sqlite_cache_initialization() {
        assert!(SqliteCache::in_memory().is_ok());
    }

    #[tokio::test]
    async fn test_ohlcv_cache() {
        let cache = SqliteCache::in_memory().unwrap();
        let code = SecurityCode::new("7203");
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();

        assert!(cache.get_ohlcv("yahoo", &code, start, end).await.unwrap().is_none());

        cache.put_ohlcv("yahoo", &code, &prices()).await.unwrap();

        let retrieved = cache.get_ohlcv("yahoo", &code, start, end).await.unwrap().unwrap();
        assert_eq!(retrieved.height(), 2);
        assert_eq!(retrieved.column("date").unwrap().dtype(), &DataType::Date);
        assert_eq!(retrieved.column("low").unwrap().null_count(), 1);

        let later = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
        let tail = cache.get_ohlcv("yahoo", &code, later, end).await.unwrap().unwrap();
        assert_eq!(tail.height(), 1);
    }

    #[tokio::test]
    async fn test_report_cache() {
        let cache = SqliteCache::in_memory().unwrap();
        let code = SecurityCode::new("7203");
        let report = MetricReport {
            warnings: vec![
                PipelineWarning::new(WarningKind::DiscardedNonConsolidated)
                    .with_document("S100TOYO"),
            ],
            documents_used: 3,
            ..MetricReport::default()
        };

        assert!(cache.get_report("edinet", &code, 5).await.unwrap().is_none());

        cache.put_report("edinet", &code, 5, &report).await.unwrap();

        assert_eq!(cache.get_report("edinet", &code, 5).await.unwrap(), Some(report));
        assert!(cache.get_report("edinet", &code, 10).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_document_cache() {
        let cache = SqliteCache::in_memory().unwrap();
        let bytes = "<?xml version=\"1.0\"?><xbrli:xbrl/>".as_bytes();

        cache.put_document("S100TOYO", bytes).await.unwrap();

        assert_eq!(cache.get_document("S100TOYO").await.unwrap(), Some(bytes.to_vec()));
        assert!(cache.get_document("S100NONE").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_persistent_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.db");

        {
            let cache = SqliteCache::new(&path).unwrap();
            cache.put_document("S100TOYO", b"xbrl").await.unwrap();
        }

        let reopened = SqliteCache::new(&path).unwrap();
        assert_eq!(
            reopened.get_document("S100TOYO").await.unwrap(),
            Some(b"xbrl".to_vec())
        );
    }

    #[tokio::test]
    async fn test_clear_cache() {
        let cache = SqliteCache::in_memory().unwrap();
        let code = SecurityCode::new("7203");
        cache.put_document("S100TOYO", b"xbrl").await.unwrap();
        cache
            .put_report("edinet", &code, 5, &MetricReport::default())
            .await
            .unwrap();

        assert_eq!(cache.invalidate_stale(Duration::from_secs(3600)).await.unwrap(), 0);

        cache.clear().await.unwrap();

        assert!(cache.get_document("S100TOYO").await.unwrap().is_none());
        assert!(cache.get_report("edinet", &code, 5).await.unwrap().is_none());
    }
}
