//! Fetches filings for a security and runs them through the metric pipeline.

use std::sync::Arc;
use std::time::Duration;

use chrono::{Datelike, NaiveDate};
use futures::stream::{self, StreamExt};
use polars::prelude::DataFrame;
use tracing::{debug, instrument, warn};

use kessan_core::{
    DataCache, DataError, DataFrequency, DisclosureEvent, DisclosureEventProvider, FilingMeta,
    FilingSource, FiscalYearEnd, MetricReport, PipelineError, PriceDataProvider, Result,
    SecurityCode,
};
use kessan_xbrl::{DocumentOutcome, MetricPipeline};

use crate::portfolio::{Holding, HoldingValue, PortfolioValuation};

/// Default number of documents fetched at once.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Calendar days of prices searched for a holding's latest close.
pub const PRICE_LOOKBACK_DAYS: u64 = 30;

/// Ties the filing source, the metric pipeline and the optional price and
/// event providers together, with an optional cache in front.
///
/// # Example
///
/// ```rust,ignore
/// use std::sync::Arc;
/// use kessan::{EdinetProvider, FilingOrchestrator, SecurityCode};
///
/// let edinet = Arc::new(EdinetProvider::new("MyApp/1.0 (contact@example.com)"));
/// let orchestrator = FilingOrchestrator::new(edinet);
///
/// let report = orchestrator.fetch_metrics(&SecurityCode::new("7203"), 5).await?;
/// for point in report.latest_points() {
///     println!("{} FY{}: {}", point.metric, point.fiscal_year, point.value);
/// }
/// ```
pub struct FilingOrchestrator {
    filings: Arc<dyn FilingSource>,
    prices: Option<Arc<dyn PriceDataProvider>>,
    events: Option<Arc<dyn DisclosureEventProvider>>,
    cache: Option<Arc<dyn DataCache>>,
    cache_ttl: Option<Duration>,
    pipeline: MetricPipeline,
    concurrency: usize,
}

impl std::fmt::Debug for FilingOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilingOrchestrator")
            .field("filings", &self.filings.name())
            .field("prices", &self.prices.as_ref().map(|p| p.name().to_string()))
            .field("events", &self.events.as_ref().map(|p| p.name().to_string()))
            .field("cache", &self.cache.as_ref().map(|_| "configured"))
            .field("cache_ttl", &self.cache_ttl)
            .field("concurrency", &self.concurrency)
            .finish()
    }
}

impl FilingOrchestrator {
    /// Create an orchestrator over `filings` with the default pipeline.
    #[must_use]
    pub fn new(filings: Arc<dyn FilingSource>) -> Self {
        Self {
            filings,
            prices: None,
            events: None,
            cache: None,
            cache_ttl: None,
            pipeline: MetricPipeline::default(),
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    /// Replaces the metric pipeline.
    #[must_use]
    pub fn with_pipeline(mut self, pipeline: MetricPipeline) -> Self {
        self.pipeline = pipeline;
        self
    }

    /// Set the cache.
    #[must_use]
    pub fn with_cache(mut self, cache: Arc<dyn DataCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Entries older than `ttl` are evicted before every cache lookup.
    /// Without a TTL cached entries never expire.
    #[must_use]
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = Some(ttl);
        self
    }

    /// Set the price provider.
    #[must_use]
    pub fn with_prices(mut self, provider: Arc<dyn PriceDataProvider>) -> Self {
        debug!(provider = provider.name(), "Registering price provider");
        self.prices = Some(provider);
        self
    }

    /// Set the disclosure event provider.
    #[must_use]
    pub fn with_events(mut self, provider: Arc<dyn DisclosureEventProvider>) -> Self {
        debug!(provider = provider.name(), "Registering event provider");
        self.events = Some(provider);
        self
    }

    /// Maximum number of documents fetched at once. Zero is treated as one.
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// The pipeline in use.
    #[must_use]
    pub const fn pipeline(&self) -> &MetricPipeline {
        &self.pipeline
    }

    /// Builds the metric report for `code` from its latest `years` filings.
    ///
    /// Documents that cannot be fetched become warnings on the report. Fails
    /// with [`PipelineError::NoDataAvailable`] when no filing is listed or
    /// none could be used.
    #[instrument(skip(self, code), fields(code = %code, source = self.filings.name()))]
    pub async fn fetch_metrics(&self, code: &SecurityCode, years: usize) -> Result<MetricReport> {
        let source = self.filings.name();
        self.expire_stale().await;

        if let Some(cache) = &self.cache {
            match cache.get_report(source, code, years).await {
                Ok(Some(report)) => {
                    debug!("Cache hit for metric report");
                    return Ok(report);
                }
                Ok(None) => {}
                Err(e) => warn!(error = %e, "Report cache lookup failed"),
            }
        }

        let configured = self.filings.fiscal_year_end(code).await?;
        let filings = self.filings.list_filings(code, years).await?;
        if filings.is_empty() {
            return Err(PipelineError::NoDataAvailable(code.to_string()).into());
        }

        let fiscal_year_end = effective_fiscal_year_end(configured, &filings);
        if fiscal_year_end != configured {
            debug!(
                fiscal_year_end = %fiscal_year_end,
                "Inferred fiscal year end from annual filing"
            );
        }
        let pipeline = self.pipeline.clone().with_resolver_config(
            self.pipeline
                .resolver_config()
                .clone()
                .with_fiscal_year_end(fiscal_year_end),
        );

        debug!(documents = filings.len(), "Fetching filing documents");
        let outcomes: Vec<DocumentOutcome> = stream::iter(filings.iter())
            .map(|meta| self.process(&pipeline, meta))
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let report = pipeline.build(outcomes)?;
        debug!(
            series = report.series.len(),
            warnings = report.warnings.len(),
            "Built metric report"
        );

        if let Some(cache) = &self.cache
            && let Err(e) = cache.put_report(source, code, years, &report).await
        {
            warn!(error = %e, "Failed to cache metric report");
        }

        Ok(report)
    }

    async fn expire_stale(&self) {
        let (Some(cache), Some(ttl)) = (&self.cache, self.cache_ttl) else {
            return;
        };
        match cache.invalidate_stale(ttl).await {
            Ok(0) => {}
            Ok(removed) => debug!(removed, "Evicted stale cache entries"),
            Err(e) => warn!(error = %e, "Failed to evict stale cache entries"),
        }
    }

    async fn process(&self, pipeline: &MetricPipeline, meta: &FilingMeta) -> DocumentOutcome {
        match self.document_bytes(meta).await {
            Ok(bytes) => pipeline.process_document(meta, &bytes),
            Err(e) => {
                warn!(document_id = %meta.document_id, error = %e, "Document fetch failed");
                DocumentOutcome::fetch_failed(meta, e.to_string())
            }
        }
    }

    async fn document_bytes(&self, meta: &FilingMeta) -> Result<Vec<u8>> {
        if let Some(cache) = &self.cache
            && let Ok(Some(bytes)) = cache.get_document(&meta.document_id).await
        {
            debug!(document_id = %meta.document_id, "Cache hit for document");
            return Ok(bytes);
        }

        let bytes = self.filings.fetch_document(meta).await?;

        if let Some(cache) = &self.cache
            && let Err(e) = cache.put_document(&meta.document_id, &bytes).await
        {
            warn!(document_id = %meta.document_id, error = %e, "Failed to cache document");
        }
        Ok(bytes)
    }

    /// Fetch daily OHLCV bars, consulting the cache first.
    #[instrument(skip(self, code), fields(code = %code))]
    pub async fn fetch_prices(
        &self,
        code: &SecurityCode,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<DataFrame> {
        let provider = self.prices.as_ref().ok_or_else(|| {
            DataError::ProviderNotConfigured("No price provider registered".to_string())
        })?;
        self.expire_stale().await;

        if let Some(cache) = &self.cache
            && let Ok(Some(cached)) = cache.get_ohlcv(provider.name(), code, start, end).await
        {
            debug!(provider = provider.name(), "Cache hit for OHLCV data");
            return Ok(cached);
        }

        let data = provider
            .fetch_ohlcv(code, start, end, DataFrequency::Daily)
            .await?;

        if let Some(cache) = &self.cache
            && let Err(e) = cache.put_ohlcv(provider.name(), code, &data).await
        {
            warn!(provider = provider.name(), error = %e, "Failed to cache OHLCV data");
        }

        Ok(data)
    }

    /// Values `holdings` at their latest close on or before `as_of`.
    ///
    /// A holding whose prices cannot be fetched stays unpriced and is left
    /// out of the total.
    #[instrument(skip(self, holdings), fields(holdings = holdings.len()))]
    pub async fn value_portfolio(
        &self,
        holdings: &[Holding],
        as_of: NaiveDate,
    ) -> Result<PortfolioValuation> {
        if self.prices.is_none() {
            return Err(DataError::ProviderNotConfigured(
                "No price provider registered".to_string(),
            ));
        }
        let start = as_of - chrono::Days::new(PRICE_LOOKBACK_DAYS);

        let rows: Vec<HoldingValue> = stream::iter(holdings)
            .map(|holding| async move {
                match self.fetch_prices(&holding.code, start, as_of).await {
                    Ok(prices) => HoldingValue::new(holding, Some(&prices)),
                    Err(e) => {
                        warn!(code = %holding.code, error = %e, "No prices for holding");
                        HoldingValue::new(holding, None)
                    }
                }
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        Ok(PortfolioValuation::new(rows))
    }

    /// Timely-disclosure headlines for `code` over the last `days` days.
    pub async fn recent_events(
        &self,
        code: &SecurityCode,
        days: u32,
    ) -> Result<Vec<DisclosureEvent>> {
        let provider = self.events.as_ref().ok_or_else(|| {
            DataError::ProviderNotConfigured("No disclosure event provider registered".to_string())
        })?;
        provider.fetch_recent_events(code, days).await
    }
}

/// Fiscal year end used to resolve contexts.
///
/// A company left at the calendar default whose latest annual report closes
/// on another day uses that day instead.
fn effective_fiscal_year_end(configured: FiscalYearEnd, filings: &[FilingMeta]) -> FiscalYearEnd {
    if configured != FiscalYearEnd::default() {
        return configured;
    }
    filings
        .iter()
        .filter(|meta| meta.form_type.is_annual())
        .max_by_key(|meta| (meta.period_end, meta.filing_date))
        .and_then(|meta| FiscalYearEnd::new(meta.period_end.month(), meta.period_end.day()))
        .unwrap_or(configured)
}

#[cfg(test)]
mod tests {
    use super::*;
    use kessan_core::FormType;

    fn annual(doc: &str, period_end: NaiveDate) -> FilingMeta {
        FilingMeta::new(doc, FormType::AnnualReport, period_end, period_end)
    }

    #[test]
    fn test_configured_fiscal_year_end_wins() {
        let filings = [annual("A", NaiveDate::from_ymd_opt(2024, 3, 31).unwrap())];
        let june = FiscalYearEnd::new(6, 30).unwrap();
        assert_eq!(effective_fiscal_year_end(june, &filings), june);
    }

    #[test]
    fn test_fiscal_year_end_inferred_from_latest_annual() {
        let filings = [
            annual("A", NaiveDate::from_ymd_opt(2023, 3, 31).unwrap()),
            annual("B", NaiveDate::from_ymd_opt(2024, 3, 31).unwrap()),
            FilingMeta::new(
                "Q",
                FormType::QuarterlyReport,
                NaiveDate::from_ymd_opt(2024, 8, 1).unwrap(),
                NaiveDate::from_ymd_opt(2024, 6, 30).unwrap(),
            ),
        ];
        assert_eq!(
            effective_fiscal_year_end(FiscalYearEnd::default(), &filings),
            FiscalYearEnd::MARCH
        );
    }

    #[test]
    fn test_february_close_inferred_from_non_leap_year() {
        let filings = [annual("A", NaiveDate::from_ymd_opt(2023, 2, 28).unwrap())];
        let inferred = effective_fiscal_year_end(FiscalYearEnd::default(), &filings);
        let leap_close = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        assert_eq!(inferred.boundary(2024), leap_close);
        assert_eq!(inferred.fiscal_year_of(leap_close), 2024);
    }

    #[test]
    fn test_no_annual_keeps_default() {
        assert_eq!(
            effective_fiscal_year_end(FiscalYearEnd::default(), &[]),
            FiscalYearEnd::CALENDAR
        );
    }
}
