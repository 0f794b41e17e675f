//! Share holdings and their market value.
//!
//! Holdings persist as a JSON array keyed by security code. Valuation takes
//! the latest close of each holding's price history; all codes trade on the
//! TSE, so values are in yen.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use kessan_core::{DataError, Result, SecurityCode};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::indicators::latest_value;
use crate::json_file::write_atomically;

/// Shares held in one security.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Holding {
    /// Holding id.
    pub id: Uuid,
    /// Security held.
    #[serde(alias = "ticker")]
    pub code: SecurityCode,
    /// Number of shares, always positive.
    pub shares: f64,
}

// Lenient shape for records written by hand or by older versions.
#[derive(Deserialize)]
struct StoredHolding {
    id: Option<Uuid>,
    #[serde(alias = "ticker")]
    code: String,
    shares: f64,
}

impl StoredHolding {
    fn into_holding(self) -> Option<Holding> {
        let code = SecurityCode::new(self.code);
        if code.as_str().is_empty() || !(self.shares.is_finite() && self.shares > 0.0) {
            return None;
        }
        Some(Holding {
            id: self.id.unwrap_or_else(Uuid::new_v4),
            code,
            shares: self.shares,
        })
    }
}

/// JSON file of holdings.
#[derive(Clone, Debug)]
pub struct PortfolioStore {
    path: PathBuf,
}

impl PortfolioStore {
    /// Store backed by `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads all holdings.
    ///
    /// A missing or corrupt file yields none. Records without a code or with
    /// a non-positive share count are skipped; records without an id get one.
    #[must_use]
    pub fn load(&self) -> Vec<Holding> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) => {
                debug!(path = %self.path.display(), error = %e, "No portfolio file");
                return Vec::new();
            }
        };
        let records = match serde_json::from_str::<Vec<serde_json::Value>>(&text) {
            Ok(records) => records,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Ignoring corrupt portfolio file");
                return Vec::new();
            }
        };
        records
            .into_iter()
            .filter_map(|record| serde_json::from_value::<StoredHolding>(record).ok())
            .filter_map(StoredHolding::into_holding)
            .collect()
    }

    /// Replaces the stored holdings.
    pub fn save(&self, holdings: &[Holding]) -> Result<()> {
        write_atomically(&self.path, holdings)?;
        debug!(path = %self.path.display(), count = holdings.len(), "Saved portfolio");
        Ok(())
    }

    /// Sets the share count for `code`, adding a holding when none exists.
    ///
    /// # Errors
    /// [`DataError::InvalidParameter`] for an empty code or a share count
    /// that is not positive.
    pub fn upsert(&self, code: &SecurityCode, shares: f64) -> Result<Holding> {
        let code = SecurityCode::new(code.as_str());
        if code.as_str().is_empty() {
            return Err(DataError::InvalidParameter("Security code is required".to_string()));
        }
        if !(shares.is_finite() && shares > 0.0) {
            return Err(DataError::InvalidParameter(format!(
                "Shares must be positive, got {}",
                shares
            )));
        }

        let mut holdings = self.load();
        let holding = match holdings.iter_mut().find(|h| h.code == code) {
            Some(existing) => {
                existing.shares = shares;
                existing.clone()
            }
            None => {
                let holding = Holding {
                    id: Uuid::new_v4(),
                    code,
                    shares,
                };
                holdings.push(holding.clone());
                holding
            }
        };
        self.save(&holdings)?;
        Ok(holding)
    }

    /// Deletes a holding. Returns false when no holding has `id`.
    pub fn remove(&self, id: Uuid) -> Result<bool> {
        let mut holdings = self.load();
        let before = holdings.len();
        holdings.retain(|h| h.id != id);
        if holdings.len() == before {
            return Ok(false);
        }
        self.save(&holdings)?;
        Ok(true)
    }
}

/// Market value of one holding.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HoldingValue {
    /// Holding id.
    pub holding_id: Uuid,
    /// Security held.
    pub code: SecurityCode,
    /// Number of shares.
    pub shares: f64,
    /// Latest close, when prices were available.
    pub price: Option<f64>,
    /// Trading day of that close.
    pub price_date: Option<NaiveDate>,
    /// `shares * price`.
    pub value: Option<f64>,
}

impl HoldingValue {
    /// Values `holding` at the latest close in `prices`. Without prices the
    /// value stays unknown.
    #[must_use]
    pub fn new(holding: &Holding, prices: Option<&DataFrame>) -> Self {
        let price = prices.and_then(|df| latest_value(df, "close"));
        Self {
            holding_id: holding.id,
            code: holding.code.clone(),
            shares: holding.shares,
            price,
            price_date: prices.and_then(latest_close_date),
            value: price.map(|p| p * holding.shares),
        }
    }
}

/// Values of every holding, ordered by code, and their sum.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PortfolioValuation {
    /// One row per holding.
    pub holdings: Vec<HoldingValue>,
    /// Sum of the known values; `None` when no holding could be priced.
    pub total: Option<f64>,
}

impl PortfolioValuation {
    /// Sorts the rows and totals them.
    #[must_use]
    pub fn new(mut holdings: Vec<HoldingValue>) -> Self {
        holdings.sort_by(|a, b| a.code.cmp(&b.code));
        let total = holdings
            .iter()
            .filter_map(|h| h.value)
            .fold(None, |sum: Option<f64>, v| Some(sum.unwrap_or(0.0) + v));
        Self { holdings, total }
    }

    /// Share of the total per priced holding. Empty unless the total is
    /// positive.
    #[must_use]
    pub fn weights(&self) -> Vec<(SecurityCode, f64)> {
        let Some(total) = self.total.filter(|t| *t > 0.0) else {
            return Vec::new();
        };
        self.holdings
            .iter()
            .filter_map(|h| Some((h.code.clone(), h.value? / total)))
            .collect()
    }
}

fn latest_close_date(df: &DataFrame) -> Option<NaiveDate> {
    let closes = df.column("close").ok()?.cast(&DataType::Float64).ok()?;
    let dates = df.column("date").ok()?.cast(&DataType::Date).ok()?;
    let dates = dates.as_materialized_series().date().ok()?;
    closes
        .f64()
        .ok()?
        .into_iter()
        .zip(dates.as_date_iter())
        .filter_map(|(close, date)| close.and(date))
        .last()
}
