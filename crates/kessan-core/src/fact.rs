//! Fact records passed between the XBRL pipeline stages.
//!
//! A fact moves through three shapes, each a new value built from the last:
//! [`FactEntry`] (as extracted), [`ResolvedFact`] (context resolved) and
//! [`NormalizedFact`] (unit resolved). Arithmetic only ever touches the last.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::PipelineError;
use crate::frequency::FiscalPeriod;
use crate::types::AccountingStandard;

/// Canonical financial metrics produced by the pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    /// Net sales / revenue.
    Revenue,
    /// Operating income.
    OperatingIncome,
    /// Profit attributable to owners of the parent.
    NetIncome,
    /// Net cash from operating activities.
    OperatingCashFlow,
}

impl Metric {
    /// Every canonical metric, in presentation order.
    pub const ALL: [Self; 4] = [
        Self::Revenue,
        Self::OperatingIncome,
        Self::NetIncome,
        Self::OperatingCashFlow,
    ];

    /// The canonical snake_case name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Revenue => "revenue",
            Self::OperatingIncome => "operating_income",
            Self::NetIncome => "net_income",
            Self::OperatingCashFlow => "operating_cash_flow",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Metric {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| PipelineError::UnknownMetric(s.to_string()))
    }
}

/// Class of unit a metric must be reported in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitKind {
    /// A monetary amount.
    Currency,
    /// A monetary amount per share.
    PerShare,
    /// A share count.
    Shares,
    /// A dimensionless ratio.
    Pure,
}

impl fmt::Display for UnitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Currency => "currency",
            Self::PerShare => "per-share",
            Self::Shares => "shares",
            Self::Pure => "pure",
        };
        f.write_str(s)
    }
}

/// A single numeric assertion as found in one document.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FactEntry {
    /// Canonical metric the element maps to.
    pub metric: Metric,
    /// Matched element id in `prefix:LocalName` form.
    pub element: String,
    /// Position of the element in the metric's candidate list (0 is preferred).
    pub rank: usize,
    /// Accounting standard the candidate belongs to, when the map tags it.
    pub standard: Option<AccountingStandard>,
    /// Numeric value as written, sign applied.
    pub value: f64,
    /// Unit measure (`iso4217:JPY`), or the bare unit id when undefined.
    pub unit: String,
    /// Id of the context the fact refers to.
    pub context_ref: String,
    /// Inline XBRL `scale` exponent; zero for instance documents.
    pub scale: i32,
    /// `decimals` precision; `None` when absent or `INF`.
    #[serde(default)]
    pub decimals: Option<i32>,
}

/// Reporting period of a context.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Period {
    /// A point in time (balance sheet items).
    Instant(NaiveDate),
    /// A span of time (flow items).
    Duration {
        /// First day, inclusive.
        start: NaiveDate,
        /// Last day, inclusive.
        end: NaiveDate,
    },
}

impl Period {
    /// The end date (or the instant).
    #[must_use]
    pub const fn end(&self) -> NaiveDate {
        match self {
            Self::Instant(date) => *date,
            Self::Duration { end, .. } => *end,
        }
    }

    /// The start date for durations.
    #[must_use]
    pub const fn start(&self) -> Option<NaiveDate> {
        match self {
            Self::Instant(_) => None,
            Self::Duration { start, .. } => Some(*start),
        }
    }

    /// Instant or duration.
    #[must_use]
    pub const fn kind(&self) -> PeriodKind {
        match self {
            Self::Instant(_) => PeriodKind::Instant,
            Self::Duration { .. } => PeriodKind::Duration,
        }
    }
}

/// Whether a fact covers a point in time or a span.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeriodKind {
    /// Point in time.
    Instant,
    /// Span of time.
    Duration,
}

/// One `xbrldi:explicitMember` of a context.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExplicitMember {
    /// Axis, e.g. `jppfs_cor:ConsolidatedOrNonConsolidatedAxis`.
    pub dimension: String,
    /// Member, e.g. `jppfs_cor:NonConsolidatedMember`.
    pub member: String,
}

/// A parsed `xbrli:context`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextDefinition {
    /// Context id.
    pub id: String,
    /// Reporting period.
    pub period: Period,
    /// Explicit dimension members from segment and scenario.
    pub dimensions: Vec<ExplicitMember>,
}

impl ContextDefinition {
    /// Member for `dimension`, if the context carries one.
    #[must_use]
    pub fn member(&self, dimension: &str) -> Option<&str> {
        self.dimensions
            .iter()
            .find(|m| m.dimension == dimension)
            .map(|m| m.member.as_str())
    }
}

/// Where a fact came from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    /// Source document id.
    pub document_id: String,
    /// Filing date of the source document.
    pub filing_date: NaiveDate,
    /// Whether the source is a correction filing.
    pub amendment: bool,
    /// Accounting standard of the source document, when known.
    pub accounting_standard: Option<AccountingStandard>,
}

/// A fact with its context resolved to a fiscal period.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResolvedFact {
    /// The extracted fact.
    pub fact: FactEntry,
    /// First day of a duration.
    pub period_start: Option<NaiveDate>,
    /// Last day of the period (or the instant).
    pub period_end: NaiveDate,
    /// Instant or duration.
    pub period_kind: PeriodKind,
    /// Fiscal year label.
    pub fiscal_year: i32,
    /// Period within the fiscal year.
    pub fiscal_period: FiscalPeriod,
    /// True for durations that begin at the fiscal year start.
    pub cumulative: bool,
    /// True for consolidated figures.
    pub consolidated: bool,
    /// Source filing.
    pub provenance: Provenance,
}

/// Canonical unit of a normalized value.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalUnit {
    /// Currency ones, ISO 4217 code.
    Currency(String),
    /// Currency per share, ISO 4217 code.
    PerShare(String),
    /// Share count.
    Shares,
    /// Dimensionless.
    Pure,
}

impl CanonicalUnit {
    /// Unit class.
    #[must_use]
    pub const fn kind(&self) -> UnitKind {
        match self {
            Self::Currency(_) => UnitKind::Currency,
            Self::PerShare(_) => UnitKind::PerShare,
            Self::Shares => UnitKind::Shares,
            Self::Pure => UnitKind::Pure,
        }
    }
}

impl fmt::Display for CanonicalUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Currency(code) => write!(f, "{}", code),
            Self::PerShare(code) => write!(f, "{}/share", code),
            Self::Shares => f.write_str("shares"),
            Self::Pure => f.write_str("pure"),
        }
    }
}

/// Power-of-ten scale a figure was presented in.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum DisplayScale {
    /// 10^0
    #[default]
    Ones,
    /// 10^3 (千円)
    Thousands,
    /// 10^6 (百万円)
    Millions,
    /// 10^9
    Billions,
}

impl DisplayScale {
    /// Maps a scale exponent to a display scale.
    #[must_use]
    pub const fn from_exponent(exponent: i32) -> Option<Self> {
        match exponent {
            0 => Some(Self::Ones),
            3 => Some(Self::Thousands),
            6 => Some(Self::Millions),
            9 => Some(Self::Billions),
            _ => None,
        }
    }

    /// Display scale implied by a `decimals` precision: a figure accurate to
    /// millions (`-6`) reads in millions. Precision finer than thousands reads
    /// in ones.
    #[must_use]
    pub const fn from_decimals(decimals: i32) -> Self {
        match decimals {
            ..=-9 => Self::Billions,
            -8..=-6 => Self::Millions,
            -5..=-3 => Self::Thousands,
            _ => Self::Ones,
        }
    }

    /// The exponent.
    #[must_use]
    pub const fn exponent(&self) -> i32 {
        match self {
            Self::Ones => 0,
            Self::Thousands => 3,
            Self::Millions => 6,
            Self::Billions => 9,
        }
    }

    /// `10^exponent`.
    #[must_use]
    pub fn factor(&self) -> f64 {
        10f64.powi(self.exponent())
    }

    /// Rescales a displayed figure to canonical ones.
    #[must_use]
    pub fn to_canonical(&self, displayed: f64) -> f64 {
        displayed * self.factor()
    }

    /// Rescales a canonical value back to this display scale.
    #[must_use]
    pub fn to_display(&self, canonical: f64) -> f64 {
        canonical / self.factor()
    }
}

/// A resolved fact with its value in canonical units.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NormalizedFact {
    /// The resolved fact.
    pub resolved: ResolvedFact,
    /// Value in canonical ones.
    pub value: f64,
    /// Canonical unit.
    pub unit: CanonicalUnit,
    /// Scale the raw value was presented in.
    pub scale: DisplayScale,
}

impl NormalizedFact {
    /// Canonical metric of the fact.
    #[must_use]
    pub const fn metric(&self) -> Metric {
        self.resolved.fact.metric
    }

    /// Fiscal year of the fact.
    #[must_use]
    pub const fn fiscal_year(&self) -> i32 {
        self.resolved.fiscal_year
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_parse() {
        assert_eq!("revenue".parse::<Metric>().unwrap(), Metric::Revenue);
        assert_eq!(
            "operating_cash_flow".parse::<Metric>().unwrap(),
            Metric::OperatingCashFlow
        );
        assert_eq!(
            "ebitda".parse::<Metric>(),
            Err(PipelineError::UnknownMetric("ebitda".to_string()))
        );
    }

    #[test]
    fn test_display_scale_round_trip() {
        let scale = DisplayScale::from_exponent(6).unwrap();
        assert_eq!(scale, DisplayScale::Millions);
        let canonical = scale.to_canonical(1_234.5);
        assert!((canonical - 1_234_500_000.0).abs() < 1e-3);
        assert!((scale.to_display(canonical) - 1_234.5).abs() < 1e-9);
        assert!(DisplayScale::from_exponent(2).is_none());
    }

    #[test]
    fn test_display_scale_from_decimals() {
        assert_eq!(DisplayScale::from_decimals(-12), DisplayScale::Billions);
        assert_eq!(DisplayScale::from_decimals(-9), DisplayScale::Billions);
        assert_eq!(DisplayScale::from_decimals(-7), DisplayScale::Millions);
        assert_eq!(DisplayScale::from_decimals(-6), DisplayScale::Millions);
        assert_eq!(DisplayScale::from_decimals(-3), DisplayScale::Thousands);
        assert_eq!(DisplayScale::from_decimals(-2), DisplayScale::Ones);
        assert_eq!(DisplayScale::from_decimals(2), DisplayScale::Ones);
    }

    #[test]
    fn test_canonical_unit_display() {
        assert_eq!(CanonicalUnit::Currency("JPY".into()).to_string(), "JPY");
        assert_eq!(CanonicalUnit::PerShare("JPY".into()).to_string(), "JPY/share");
        assert_eq!(CanonicalUnit::Shares.kind(), UnitKind::Shares);
    }

    #[test]
    fn test_context_member_lookup() {
        let end = NaiveDate::from_ymd_opt(2024, 3, 31).unwrap();
        let ctx = ContextDefinition {
            id: "CurrentYearInstant_NonConsolidatedMember".to_string(),
            period: Period::Instant(end),
            dimensions: vec![ExplicitMember {
                dimension: "jppfs_cor:ConsolidatedOrNonConsolidatedAxis".to_string(),
                member: "jppfs_cor:NonConsolidatedMember".to_string(),
            }],
        };
        assert_eq!(
            ctx.member("jppfs_cor:ConsolidatedOrNonConsolidatedAxis"),
            Some("jppfs_cor:NonConsolidatedMember")
        );
        assert_eq!(ctx.period.kind(), PeriodKind::Instant);
        assert_eq!(ctx.period.start(), None);
        assert_eq!(ctx.period.end(), end);
    }
}
