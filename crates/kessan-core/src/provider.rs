//! Provider traits for fetching disclosures and market data.
//!
//! This module defines the core provider traits:
//!
//! - [`DataProvider`] - Base trait for all data providers
//! - [`FilingSource`] - Disclosure document listing and download
//! - [`PriceDataProvider`] - OHLCV price data
//! - [`DisclosureEventProvider`] - Timely-disclosure headlines

use async_trait::async_trait;
use chrono::NaiveDate;
use polars::prelude::DataFrame;
use std::fmt::Debug;

use crate::{
    error::{DataError, Result},
    frequency::DataFrequency,
    types::{DisclosureEvent, FilingMeta, FiscalYearEnd, SecurityCode},
};

/// Base trait for all data providers.
///
/// All data providers must implement this trait to provide basic metadata
/// about the provider and its capabilities.
pub trait DataProvider: Send + Sync + Debug {
    /// Returns the name of this provider (e.g., "EDINET").
    fn name(&self) -> &str;

    /// Returns a description of this provider.
    fn description(&self) -> &str;

    /// Returns the data frequencies supported by this provider.
    fn supported_frequencies(&self) -> &[DataFrequency];
}

/// Source of XBRL disclosure documents.
#[async_trait]
pub trait FilingSource: DataProvider {
    /// Lists up to `limit` filings for a security, newest submission first.
    async fn list_filings(&self, code: &SecurityCode, limit: usize) -> Result<Vec<FilingMeta>>;

    /// Downloads the primary XBRL instance of a filing.
    async fn fetch_document(&self, meta: &FilingMeta) -> Result<Vec<u8>>;

    /// Fiscal year end of the issuer. Defaults to the calendar year end.
    async fn fiscal_year_end(&self, _code: &SecurityCode) -> Result<FiscalYearEnd> {
        Ok(FiscalYearEnd::default())
    }
}

/// Provider for OHLCV price data.
///
/// Implement this trait to provide historical price data.
#[async_trait]
pub trait PriceDataProvider: DataProvider {
    /// Fetches OHLCV data for a single security.
    ///
    /// Returns a DataFrame with columns: symbol, date, open, high, low, close,
    /// volume, adjusted_close.
    async fn fetch_ohlcv(
        &self,
        code: &SecurityCode,
        start: NaiveDate,
        end: NaiveDate,
        frequency: DataFrequency,
    ) -> Result<DataFrame>;

    /// Fetches OHLCV data for multiple securities.
    ///
    /// Default implementation calls `fetch_ohlcv` sequentially and skips codes
    /// the provider does not know.
    async fn fetch_ohlcv_batch(
        &self,
        codes: &[SecurityCode],
        start: NaiveDate,
        end: NaiveDate,
        frequency: DataFrequency,
    ) -> Result<DataFrame> {
        use polars::prelude::*;

        let mut frames = Vec::with_capacity(codes.len());

        for code in codes {
            match self.fetch_ohlcv(code, start, end, frequency).await {
                Ok(df) => frames.push(df.lazy()),
                Err(DataError::SymbolNotFound(_)) => continue,
                Err(e) => return Err(e),
            }
        }

        if frames.is_empty() {
            return Ok(DataFrame::empty());
        }

        concat(frames, UnionArgs::default())
            .map_err(|e| DataError::Other(e.to_string()))?
            .collect()
            .map_err(|e| DataError::Other(e.to_string()))
    }
}

/// Provider for timely-disclosure events.
#[async_trait]
pub trait DisclosureEventProvider: DataProvider {
    /// Events published for `code` within the last `days` days, newest first.
    async fn fetch_recent_events(
        &self,
        code: &SecurityCode,
        days: u32,
    ) -> Result<Vec<DisclosureEvent>>;
}
