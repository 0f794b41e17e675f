//! Pipeline output: metric series, warnings and the per-security report.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::PipelineError;
use crate::fact::{CanonicalUnit, DisplayScale, Metric};
use crate::frequency::FiscalPeriod;

/// One fiscal year of a metric series.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    /// Fiscal year label.
    pub fiscal_year: i32,
    /// Value in canonical ones.
    pub value: f64,
    /// Canonical unit.
    pub unit: CanonicalUnit,
    /// Scale the winning figure was presented in.
    pub scale: DisplayScale,
    /// Period the value covers.
    pub period: FiscalPeriod,
    /// Whether the value is a consolidated figure.
    pub consolidated: bool,
    /// Document the value was taken from.
    pub source_document: String,
    /// Change against the previous fiscal year, as a fraction.
    pub yoy: Option<f64>,
    /// Compound annual growth over the configured window, as a fraction.
    pub cagr: Option<f64>,
}

/// A per-metric time series ordered by fiscal year.
///
/// Fiscal years are unique and strictly increasing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MetricSeries {
    /// Metric the series describes.
    pub metric: Metric,
    /// Period selector the series was built for.
    pub period: FiscalPeriod,
    /// Points, oldest first.
    pub points: Vec<SeriesPoint>,
}

impl MetricSeries {
    /// Point for `fiscal_year`.
    #[must_use]
    pub fn point(&self, fiscal_year: i32) -> Option<&SeriesPoint> {
        self.points
            .binary_search_by_key(&fiscal_year, |p| p.fiscal_year)
            .ok()
            .map(|idx| &self.points[idx])
    }

    /// The most recent point.
    #[must_use]
    pub fn latest(&self) -> Option<&SeriesPoint> {
        self.points.last()
    }

    /// Fiscal years present in the series.
    #[must_use]
    pub fn years(&self) -> Vec<i32> {
        self.points.iter().map(|p| p.fiscal_year).collect()
    }

    /// Compound annual growth between two fiscal years of this series.
    #[must_use]
    pub fn cagr(&self, from_year: i32, to_year: i32) -> Option<f64> {
        let start = self.point(from_year)?;
        let end = self.point(to_year)?;
        if start.unit != end.unit {
            return None;
        }
        compound_growth(start.value, end.value, to_year.checked_sub(from_year)?)
    }
}

/// Year-over-year change `(current - previous) / |previous|`.
///
/// `None` when the previous value is zero or the result is not finite.
#[must_use]
pub fn year_over_year(previous: f64, current: f64) -> Option<f64> {
    if previous == 0.0 {
        return None;
    }
    let change = (current - previous) / previous.abs();
    change.is_finite().then_some(change)
}

/// Compound annual growth `(end / start)^(1 / years) - 1`.
///
/// `None` for a non-positive window, a non-positive start value, or a
/// non-finite result.
#[must_use]
pub fn compound_growth(start: f64, end: f64, years: i32) -> Option<f64> {
    if years <= 0 || start <= 0.0 {
        return None;
    }
    let growth = (end / start).powf(1.0 / f64::from(years)) - 1.0;
    growth.is_finite().then_some(growth)
}

/// What went wrong with a fact or document.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WarningKind {
    /// A matched fact node could not be read.
    SkippedFact {
        /// Element id of the node.
        element: String,
        /// Why it was skipped.
        reason: String,
    },
    /// The document is not well-formed XBRL.
    UnparsableDocument {
        /// Parser message.
        reason: String,
    },
    /// A fact refers to a context the document does not define.
    UnresolvableContext {
        /// Missing context id.
        context_ref: String,
    },
    /// A fact's unit could not be normalized for its metric.
    IncompatibleUnit {
        /// Raw unit.
        unit: String,
        /// Why it was rejected.
        reason: String,
    },
    /// A non-consolidated figure was dropped in favour of consolidated ones.
    DiscardedNonConsolidated,
    /// The document could not be downloaded.
    DocumentFetchFailed {
        /// Transport error.
        reason: String,
    },
}

impl From<PipelineError> for WarningKind {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::UnparsableDocument { reason, .. } => Self::UnparsableDocument { reason },
            PipelineError::UnresolvableContext { context_ref } => {
                Self::UnresolvableContext { context_ref }
            }
            PipelineError::IncompatibleUnit { unit, reason, .. } => {
                Self::IncompatibleUnit { unit, reason }
            }
            other => Self::SkippedFact {
                element: String::new(),
                reason: other.to_string(),
            },
        }
    }
}

/// A non-fatal data-quality record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineWarning {
    /// Document the problem was found in.
    pub document_id: Option<String>,
    /// Metric affected.
    pub metric: Option<Metric>,
    /// Fiscal year affected.
    pub fiscal_year: Option<i32>,
    /// The problem.
    pub kind: WarningKind,
}

impl PipelineWarning {
    /// Creates a warning with no attribution.
    #[must_use]
    pub const fn new(kind: WarningKind) -> Self {
        Self {
            document_id: None,
            metric: None,
            fiscal_year: None,
            kind,
        }
    }

    /// Attributes the warning to a document.
    #[must_use]
    pub fn with_document(mut self, document_id: impl Into<String>) -> Self {
        self.document_id = Some(document_id.into());
        self
    }

    /// Attributes the warning to a metric.
    #[must_use]
    pub const fn with_metric(mut self, metric: Metric) -> Self {
        self.metric = Some(metric);
        self
    }

    /// Attributes the warning to a fiscal year.
    #[must_use]
    pub const fn with_fiscal_year(mut self, fiscal_year: i32) -> Self {
        self.fiscal_year = Some(fiscal_year);
        self
    }
}

impl fmt::Display for PipelineWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            WarningKind::SkippedFact { element, reason } => {
                write!(f, "skipped fact {}: {}", element, reason)?
            }
            WarningKind::UnparsableDocument { reason } => {
                write!(f, "unparsable document: {}", reason)?
            }
            WarningKind::UnresolvableContext { context_ref } => {
                write!(f, "unresolvable context {}", context_ref)?
            }
            WarningKind::IncompatibleUnit { unit, reason } => {
                write!(f, "incompatible unit {}: {}", unit, reason)?
            }
            WarningKind::DiscardedNonConsolidated => {
                f.write_str("discarded non-consolidated figure")?
            }
            WarningKind::DocumentFetchFailed { reason } => {
                write!(f, "document fetch failed: {}", reason)?
            }
        }
        if let Some(doc) = &self.document_id {
            write!(f, " [doc {}]", doc)?;
        }
        if let Some(metric) = &self.metric {
            write!(f, " [{}]", metric)?;
        }
        if let Some(year) = self.fiscal_year {
            write!(f, " [FY{}]", year)?;
        }
        Ok(())
    }
}

/// The latest figure of one series, as consumed by alert evaluation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LatestPoint {
    /// Metric.
    pub metric: Metric,
    /// Fiscal year of the figure.
    pub fiscal_year: i32,
    /// Value in canonical ones.
    pub value: f64,
    /// Canonical unit.
    pub unit: CanonicalUnit,
    /// Year-over-year change, as a fraction.
    pub yoy: Option<f64>,
}

/// Pipeline output for one security.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricReport {
    /// One series per metric with at least one point.
    pub series: Vec<MetricSeries>,
    /// Data-quality warnings collected across all documents.
    pub warnings: Vec<PipelineWarning>,
    /// Number of documents that contributed facts.
    pub documents_used: usize,
}

impl MetricReport {
    /// Series for `metric`, if any point survived.
    #[must_use]
    pub fn series_for(&self, metric: Metric) -> Option<&MetricSeries> {
        self.series.iter().find(|s| s.metric == metric)
    }

    /// Latest point of every series.
    #[must_use]
    pub fn latest_points(&self) -> Vec<LatestPoint> {
        self.series
            .iter()
            .filter_map(|s| {
                s.latest().map(|p| LatestPoint {
                    metric: s.metric,
                    fiscal_year: p.fiscal_year,
                    value: p.value,
                    unit: p.unit.clone(),
                    yoy: p.yoy,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(year: i32, value: f64) -> SeriesPoint {
        SeriesPoint {
            fiscal_year: year,
            value,
            unit: CanonicalUnit::Currency("JPY".to_string()),
            scale: DisplayScale::Ones,
            period: FiscalPeriod::Annual,
            consolidated: true,
            source_document: format!("S{}", year),
            yoy: None,
            cagr: None,
        }
    }

    #[test]
    fn test_year_over_year() {
        assert!((year_over_year(800.0, 880.0).unwrap() - 0.10).abs() < 1e-12);
        assert!((year_over_year(-100.0, 50.0).unwrap() - 1.5).abs() < 1e-12);
        assert_eq!(year_over_year(0.0, 50.0), None);
    }

    #[test]
    fn test_compound_growth() {
        assert!((compound_growth(800.0, 968.0, 2).unwrap() - 0.10).abs() < 1e-12);
        assert_eq!(compound_growth(0.0, 968.0, 2), None);
        assert_eq!(compound_growth(-5.0, 968.0, 2), None);
        assert_eq!(compound_growth(800.0, 968.0, 0), None);
    }

    #[test]
    fn test_series_cagr_window() {
        let series = MetricSeries {
            metric: Metric::Revenue,
            period: FiscalPeriod::Annual,
            points: vec![point(2021, 800.0), point(2022, 880.0), point(2023, 968.0)],
        };
        assert!((series.cagr(2021, 2023).unwrap() - 0.10).abs() < 1e-12);
        assert_eq!(series.cagr(2023, 2021), None);
        assert_eq!(series.cagr(2019, 2023), None);
        assert_eq!(series.years(), vec![2021, 2022, 2023]);
    }

    #[test]
    fn test_series_cagr_unit_mismatch() {
        let mut later = point(2023, 968.0);
        later.unit = CanonicalUnit::Currency("USD".to_string());
        let series = MetricSeries {
            metric: Metric::Revenue,
            period: FiscalPeriod::Annual,
            points: vec![point(2021, 800.0), later],
        };
        assert_eq!(series.cagr(2021, 2023), None);
    }

    #[test]
    fn test_latest_points() {
        let mut last = point(2023, 968.0);
        last.yoy = Some(0.1);
        let report = MetricReport {
            series: vec![MetricSeries {
                metric: Metric::Revenue,
                period: FiscalPeriod::Annual,
                points: vec![point(2022, 880.0), last],
            }],
            warnings: Vec::new(),
            documents_used: 2,
        };
        let latest = report.latest_points();
        assert_eq!(latest.len(), 1);
        assert_eq!(latest[0].fiscal_year, 2023);
        assert_eq!(latest[0].yoy, Some(0.1));
        assert!(report.series_for(Metric::NetIncome).is_none());
    }

    #[test]
    fn test_warning_display() {
        let warning = PipelineWarning::new(WarningKind::DiscardedNonConsolidated)
            .with_document("S100ABCD")
            .with_metric(Metric::Revenue)
            .with_fiscal_year(2023);
        let text = warning.to_string();
        assert!(text.contains("S100ABCD"));
        assert!(text.contains("revenue"));
        assert!(text.contains("FY2023"));
    }
}
