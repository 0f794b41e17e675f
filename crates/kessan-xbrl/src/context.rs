//! Context resolution: fiscal year, fiscal period and consolidation.

use chrono::NaiveDate;
use kessan_core::{
    FactEntry, FilingMeta, FiscalPeriod, FiscalYearEnd, Period, PipelineError, Provenance,
    ResolvedFact,
};

use crate::extractor::ExtractedDocument;

const AVERAGE_MONTH_DAYS: f64 = 30.44;

/// Settings for [`ContextResolver`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolverConfig {
    /// The company's fiscal year end.
    pub fiscal_year_end: FiscalYearEnd,
    /// Dimension that separates consolidated from parent-only figures.
    pub consolidation_axis: String,
    /// Member of that dimension marking parent-only figures.
    pub non_consolidated_member: String,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            fiscal_year_end: FiscalYearEnd::default(),
            consolidation_axis: "jppfs_cor:ConsolidatedOrNonConsolidatedAxis".to_string(),
            non_consolidated_member: "jppfs_cor:NonConsolidatedMember".to_string(),
        }
    }
}

impl ResolverConfig {
    /// Same settings with another fiscal year end.
    #[must_use]
    pub fn with_fiscal_year_end(mut self, fiscal_year_end: FiscalYearEnd) -> Self {
        self.fiscal_year_end = fiscal_year_end;
        self
    }
}

/// Resolves fact contexts to fiscal periods.
#[derive(Clone, Debug, Default)]
pub struct ContextResolver {
    config: ResolverConfig,
}

impl ContextResolver {
    /// Creates a resolver.
    #[must_use]
    pub const fn new(config: ResolverConfig) -> Self {
        Self { config }
    }

    /// Current settings.
    #[must_use]
    pub const fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Resolves one fact.
    ///
    /// Returns `Ok(None)` for facts whose context carries a dimension other
    /// than the consolidation axis; those are segment breakdowns, not company
    /// totals.
    pub fn resolve(
        &self,
        fact: &FactEntry,
        document: &ExtractedDocument,
        meta: &FilingMeta,
    ) -> Result<Option<ResolvedFact>, PipelineError> {
        let context = document.contexts.get(&fact.context_ref).ok_or_else(|| {
            PipelineError::UnresolvableContext {
                context_ref: fact.context_ref.clone(),
            }
        })?;

        let mut consolidation_member = None;
        for dim in &context.dimensions {
            if same_concept(&dim.dimension, &self.config.consolidation_axis) {
                consolidation_member = Some(dim.member.as_str());
            } else {
                return Ok(None);
            }
        }

        let consolidated = match consolidation_member {
            Some(member) => !same_concept(member, &self.config.non_consolidated_member),
            None => document.consolidated_prepared != Some(false),
        };

        let fye = self.config.fiscal_year_end;
        let end = context.period.end();
        let fiscal_year = fye.fiscal_year_of(end);
        let year_start = fye.start_of(fiscal_year);
        let at_year_end = end == fye.boundary(fiscal_year);

        let (fiscal_period, cumulative) = match context.period {
            Period::Duration { start, end } => {
                let months = months_between(start, end);
                let period = if at_year_end && (11..=13).contains(&months) {
                    FiscalPeriod::Annual
                } else {
                    quarter_of(year_start, end)
                };
                (period, start == year_start)
            }
            Period::Instant(_) if at_year_end => (FiscalPeriod::Annual, false),
            Period::Instant(date) => (quarter_of(year_start, date), false),
        };

        Ok(Some(ResolvedFact {
            fact: fact.clone(),
            period_start: context.period.start(),
            period_end: end,
            period_kind: context.period.kind(),
            fiscal_year,
            fiscal_period,
            cumulative,
            consolidated,
            provenance: Provenance {
                document_id: meta.document_id.clone(),
                filing_date: meta.filing_date,
                amendment: meta.is_amendment(),
                accounting_standard: document.accounting_standard.or(meta.accounting_standard),
            },
        }))
    }
}

/// Compares two qualified names, ignoring the namespace prefix.
fn same_concept(a: &str, b: &str) -> bool {
    let local = |s: &str| s.rsplit(':').next().unwrap_or(s).to_string();
    local(a) == local(b)
}

/// Whole months covered by an inclusive date span.
fn months_between(start: NaiveDate, end: NaiveDate) -> i64 {
    let days = (end - start).num_days() + 1;
    (days as f64 / AVERAGE_MONTH_DAYS).round() as i64
}

fn quarter_of(year_start: NaiveDate, end: NaiveDate) -> FiscalPeriod {
    let elapsed = months_between(year_start, end);
    let quarter = ((elapsed as f64) / 3.0).round().clamp(1.0, 4.0) as u32;
    FiscalPeriod::from_quarter(quarter).unwrap_or(FiscalPeriod::Q4)
}
