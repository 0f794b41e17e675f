//! Metric series builder.
//!
//! Turns the normalized facts of one security into per-metric, per-year
//! series. Facts are grouped and sorted explicitly, so the output does not
//! depend on the order documents arrived in.

use kessan_core::{
    FiscalPeriod, Metric, MetricSeries, NormalizedFact, PipelineWarning, SeriesPoint,
    WarningKind, year_over_year,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::precedence::{self, PrecedenceOrder};

/// How non-consolidated figures are treated.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsolidationPolicy {
    /// Drop every non-consolidated figure of a metric that has any
    /// consolidated figure. Years left empty stay missing.
    #[default]
    PreferConsolidated,
    /// Use non-consolidated figures only for years without a consolidated one.
    FallbackPerYear,
    /// Use only non-consolidated figures.
    NonConsolidatedOnly,
}

/// Settings for [`SeriesBuilder`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Period the series is built for.
    pub period: FiscalPeriod,
    /// Consolidation policy.
    pub consolidation: ConsolidationPolicy,
    /// Precedence between competing figures.
    pub precedence: PrecedenceOrder,
    /// Window for each point's CAGR, in years.
    pub cagr_years: Option<u32>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            period: FiscalPeriod::Annual,
            consolidation: ConsolidationPolicy::default(),
            precedence: PrecedenceOrder::default(),
            cagr_years: None,
        }
    }
}

/// Aggregates normalized facts into metric series.
#[derive(Clone, Debug, Default)]
pub struct SeriesBuilder {
    config: BuildConfig,
}

impl SeriesBuilder {
    /// Creates a builder.
    #[must_use]
    pub const fn new(config: BuildConfig) -> Self {
        Self { config }
    }

    /// Current settings.
    #[must_use]
    pub const fn config(&self) -> &BuildConfig {
        &self.config
    }

    /// Builds one series per metric with at least one point.
    pub fn build(&self, facts: &[NormalizedFact]) -> (Vec<MetricSeries>, Vec<PipelineWarning>) {
        let period = self.config.period;
        let mut by_metric: BTreeMap<Metric, Vec<&NormalizedFact>> = BTreeMap::new();
        for fact in facts {
            let r = &fact.resolved;
            if r.fiscal_period == period && (period == FiscalPeriod::Annual || r.cumulative) {
                by_metric.entry(fact.metric()).or_default().push(fact);
            }
        }

        let mut series = Vec::new();
        let mut discarded = BTreeSet::new();

        for (metric, candidates) in by_metric {
            let kept = self.apply_consolidation(metric, candidates, &mut discarded);

            let mut by_year: BTreeMap<i32, Vec<&NormalizedFact>> = BTreeMap::new();
            for fact in kept {
                by_year.entry(fact.fiscal_year()).or_default().push(fact);
            }

            let points: Vec<SeriesPoint> = by_year
                .into_values()
                .filter_map(|group| precedence::select(group, self.config.precedence))
                .map(|winner| SeriesPoint {
                    fiscal_year: winner.fiscal_year(),
                    value: winner.value,
                    unit: winner.unit.clone(),
                    scale: winner.scale,
                    period,
                    consolidated: winner.resolved.consolidated,
                    source_document: winner.resolved.provenance.document_id.clone(),
                    yoy: None,
                    cagr: None,
                })
                .collect();

            if points.is_empty() {
                continue;
            }

            let mut built = MetricSeries {
                metric,
                period,
                points,
            };
            fill_yoy(&mut built);
            if let Some(years) = self.config.cagr_years {
                fill_cagr(&mut built, years);
            }
            series.push(built);
        }

        let warnings = discarded
            .into_iter()
            .map(|(metric, year, doc)| {
                PipelineWarning::new(WarningKind::DiscardedNonConsolidated)
                    .with_document(doc)
                    .with_metric(metric)
                    .with_fiscal_year(year)
            })
            .collect();

        (series, warnings)
    }

    fn apply_consolidation<'a>(
        &self,
        metric: Metric,
        facts: Vec<&'a NormalizedFact>,
        discarded: &mut BTreeSet<(Metric, i32, String)>,
    ) -> Vec<&'a NormalizedFact> {
        let consolidated_years: BTreeSet<i32> = facts
            .iter()
            .filter(|f| f.resolved.consolidated)
            .map(|f| f.fiscal_year())
            .collect();

        facts
            .into_iter()
            .filter(|f| {
                let keep = match self.config.consolidation {
                    ConsolidationPolicy::PreferConsolidated => {
                        f.resolved.consolidated || consolidated_years.is_empty()
                    }
                    ConsolidationPolicy::FallbackPerYear => {
                        f.resolved.consolidated || !consolidated_years.contains(&f.fiscal_year())
                    }
                    ConsolidationPolicy::NonConsolidatedOnly => !f.resolved.consolidated,
                };
                if !keep && !f.resolved.consolidated {
                    discarded.insert((
                        metric,
                        f.fiscal_year(),
                        f.resolved.provenance.document_id.clone(),
                    ));
                }
                keep
            })
            .collect()
    }
}

fn fill_yoy(series: &mut MetricSeries) {
    for idx in 1..series.points.len() {
        let (before, after) = series.points.split_at_mut(idx);
        let prev = &before[idx - 1];
        let cur = &mut after[0];
        cur.yoy = if prev.fiscal_year == cur.fiscal_year - 1 && prev.unit == cur.unit {
            year_over_year(prev.value, cur.value)
        } else {
            None
        };
    }
}

fn fill_cagr(series: &mut MetricSeries, years: u32) {
    let Ok(window) = i32::try_from(years) else {
        return;
    };
    let values: Vec<Option<f64>> = series
        .points
        .iter()
        .map(|p| {
            let from = p.fiscal_year.checked_sub(window)?;
            series.cagr(from, p.fiscal_year)
        })
        .collect();
    for (point, cagr) in series.points.iter_mut().zip(values) {
        point.cagr = cagr;
    }
}

/// Derives a single-quarter value from two cumulative figures.
///
/// `current` is a cumulative figure for Q1-Q4 or the full year and `prior`
/// the cumulative figure of the preceding quarter in the same fiscal year
/// (Q3 for the full year). Q1 is its own cumulative figure. Returns `None`
/// when `prior` is missing or does not line up.
#[must_use]
pub fn discrete_quarter(current: &SeriesPoint, prior: Option<&SeriesPoint>) -> Option<f64> {
    let expected_prior = match current.period {
        FiscalPeriod::Q1 => return Some(current.value),
        FiscalPeriod::Annual => FiscalPeriod::Q3,
        quarter => quarter.previous_quarter()?,
    };
    let prior = prior?;
    if prior.period != expected_prior
        || prior.fiscal_year != current.fiscal_year
        || prior.unit != current.unit
    {
        return None;
    }
    Some(current.value - prior.value)
}
