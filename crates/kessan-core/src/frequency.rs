//! Data frequency and fiscal period definitions.
//!
//! This module defines [`DataFrequency`] for the granularity of price series
//! and [`FiscalPeriod`] for the reporting period a disclosed figure covers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Frequency/granularity of time series data.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataFrequency {
    /// Daily bars.
    Daily,
    /// Weekly bars.
    Weekly,
    /// Monthly bars.
    Monthly,
    /// Quarterly data (for disclosures).
    Quarterly,
    /// Annual data (for disclosures).
    Annual,
}

impl DataFrequency {
    /// Returns true if this is a disclosure frequency (quarterly or annual).
    #[must_use]
    pub const fn is_fundamental(&self) -> bool {
        matches!(self, Self::Quarterly | Self::Annual)
    }
}

/// Reporting period of a disclosed figure within its fiscal year.
///
/// Quarterly figures under Japanese disclosure rules are cumulative from the
/// start of the fiscal year, so `Q2` usually covers six months.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum FiscalPeriod {
    /// First quarter.
    Q1,
    /// Second quarter (half year when cumulative).
    Q2,
    /// Third quarter.
    Q3,
    /// Fourth quarter.
    Q4,
    /// Full fiscal year.
    #[default]
    Annual,
}

impl FiscalPeriod {
    /// Maps a quarter index (1-4) to a period.
    #[must_use]
    pub const fn from_quarter(quarter: u32) -> Option<Self> {
        match quarter {
            1 => Some(Self::Q1),
            2 => Some(Self::Q2),
            3 => Some(Self::Q3),
            4 => Some(Self::Q4),
            _ => None,
        }
    }

    /// Quarter index, or `None` for [`FiscalPeriod::Annual`].
    #[must_use]
    pub const fn quarter(&self) -> Option<u32> {
        match self {
            Self::Q1 => Some(1),
            Self::Q2 => Some(2),
            Self::Q3 => Some(3),
            Self::Q4 => Some(4),
            Self::Annual => None,
        }
    }

    /// The preceding quarter, used when de-cumulating quarterly figures.
    #[must_use]
    pub const fn previous_quarter(&self) -> Option<Self> {
        match self {
            Self::Q2 => Some(Self::Q1),
            Self::Q3 => Some(Self::Q2),
            Self::Q4 => Some(Self::Q3),
            Self::Q1 | Self::Annual => None,
        }
    }

    /// Returns a short label (`FY`, `Q1`..`Q4`).
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Q1 => "Q1",
            Self::Q2 => "Q2",
            Self::Q3 => "Q3",
            Self::Q4 => "Q4",
            Self::Annual => "FY",
        }
    }
}

impl fmt::Display for FiscalPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FiscalPeriod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "FY" | "ANNUAL" => Ok(Self::Annual),
            "Q1" => Ok(Self::Q1),
            "Q2" => Ok(Self::Q2),
            "Q3" => Ok(Self::Q3),
            "Q4" => Ok(Self::Q4),
            other => Err(format!("Invalid fiscal period: {}", other)),
        }
    }
}
