//! Deterministic choice between competing facts for one metric and year.
//!
//! Competing values are never averaged or summed: [`select`] sorts the
//! candidates with a total order and returns the first.

use kessan_core::NormalizedFact;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Which tie-breaker outranks the other when a consolidated original and a
/// non-consolidated amendment compete.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrecedenceOrder {
    /// Consolidated figures first, then the most recent filing.
    #[default]
    ConsolidationFirst,
    /// The most recent filing first, then consolidated figures.
    RecencyFirst,
}

/// Orders two facts; `Less` means `a` is preferred.
#[must_use]
pub fn compare(a: &NormalizedFact, b: &NormalizedFact, order: PrecedenceOrder) -> Ordering {
    let (ra, rb) = (&a.resolved, &b.resolved);

    // `true` sorts after `false`, so preferred flags compare b against a.
    let consolidation = rb.consolidated.cmp(&ra.consolidated);
    let recency = rb
        .provenance
        .filing_date
        .cmp(&ra.provenance.filing_date)
        .then_with(|| rb.provenance.amendment.cmp(&ra.provenance.amendment));

    let primary = match order {
        PrecedenceOrder::ConsolidationFirst => consolidation.then(recency),
        PrecedenceOrder::RecencyFirst => recency.then(consolidation),
    };

    primary
        .then_with(|| standard_match(b).cmp(&standard_match(a)))
        .then_with(|| ra.fact.rank.cmp(&rb.fact.rank))
        .then_with(|| ra.provenance.document_id.cmp(&rb.provenance.document_id))
        .then_with(|| ra.fact.element.cmp(&rb.fact.element))
        .then_with(|| ra.fact.context_ref.cmp(&rb.fact.context_ref))
        .then_with(|| a.value.total_cmp(&b.value))
}

/// True when the candidate's tagged standard matches its filing's standard.
fn standard_match(fact: &NormalizedFact) -> bool {
    match (fact.resolved.fact.standard, fact.resolved.provenance.accounting_standard) {
        (Some(candidate), Some(filing)) => candidate == filing,
        _ => false,
    }
}

/// Picks the preferred fact.
#[must_use]
pub fn select<'a, I>(candidates: I, order: PrecedenceOrder) -> Option<&'a NormalizedFact>
where
    I: IntoIterator<Item = &'a NormalizedFact>,
{
    candidates
        .into_iter()
        .min_by(|a, b| compare(a, b, order))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use kessan_core::{
        AccountingStandard, CanonicalUnit, DisplayScale, FactEntry, FiscalPeriod, Metric,
        PeriodKind, Provenance, ResolvedFact,
    };

    struct Case {
        doc: &'static str,
        filed: (i32, u32, u32),
        amendment: bool,
        consolidated: bool,
        rank: usize,
        value: f64,
    }

    fn fact(case: Case) -> NormalizedFact {
        let (y, m, d) = case.filed;
        NormalizedFact {
            resolved: ResolvedFact {
                fact: FactEntry {
                    metric: Metric::Revenue,
                    element: "jppfs_cor:NetSales".to_string(),
                    rank: case.rank,
                    standard: None,
                    value: case.value,
                    unit: "iso4217:JPY".to_string(),
                    context_ref: "CurrentYearDuration".to_string(),
                    scale: 0,
                    decimals: None,
                },
                period_start: None,
                period_end: NaiveDate::from_ymd_opt(2023, 12, 31).unwrap(),
                period_kind: PeriodKind::Duration,
                fiscal_year: 2023,
                fiscal_period: FiscalPeriod::Annual,
                cumulative: true,
                consolidated: case.consolidated,
                provenance: Provenance {
                    document_id: case.doc.to_string(),
                    filing_date: NaiveDate::from_ymd_opt(y, m, d).unwrap(),
                    amendment: case.amendment,
                    accounting_standard: None,
                },
            },
            value: case.value,
            unit: CanonicalUnit::Currency("JPY".to_string()),
            scale: DisplayScale::Ones,
        }
    }

    fn original() -> NormalizedFact {
        fact(Case {
            doc: "S100ORIG",
            filed: (2024, 3, 25),
            amendment: false,
            consolidated: true,
            rank: 0,
            value: 1_000_000_000.0,
        })
    }

    fn amendment(consolidated: bool) -> NormalizedFact {
        fact(Case {
            doc: "S100AMND",
            filed: (2024, 6, 10),
            amendment: true,
            consolidated,
            rank: 0,
            value: 1_050_000_000.0,
        })
    }

    #[test]
    fn test_later_amendment_wins() {
        let facts = [original(), amendment(true)];
        let winner = select(&facts, PrecedenceOrder::default()).unwrap();
        assert_eq!(winner.value, 1_050_000_000.0);
    }

    #[test]
    fn test_consolidation_outranks_recency_by_default() {
        let facts = [original(), amendment(false)];
        let winner = select(&facts, PrecedenceOrder::ConsolidationFirst).unwrap();
        assert_eq!(winner.resolved.provenance.document_id, "S100ORIG");

        let winner = select(&facts, PrecedenceOrder::RecencyFirst).unwrap();
        assert_eq!(winner.resolved.provenance.document_id, "S100AMND");
    }

    #[test]
    fn test_rank_breaks_ties_within_document() {
        let preferred = fact(Case {
            doc: "S100ORIG",
            filed: (2024, 3, 25),
            amendment: false,
            consolidated: true,
            rank: 0,
            value: 10.0,
        });
        let summary = fact(Case {
            doc: "S100ORIG",
            filed: (2024, 3, 25),
            amendment: false,
            consolidated: true,
            rank: 2,
            value: 11.0,
        });
        let facts = [summary, preferred];
        assert_eq!(select(&facts, PrecedenceOrder::default()).unwrap().value, 10.0);
    }

    #[test]
    fn test_standard_match_outranks_rank() {
        let mut ifrs = original();
        ifrs.resolved.fact.rank = 4;
        ifrs.resolved.fact.standard = Some(AccountingStandard::Ifrs);
        ifrs.resolved.provenance.accounting_standard = Some(AccountingStandard::Ifrs);
        ifrs.value = 7.0;

        let mut jgaap = original();
        jgaap.resolved.fact.standard = Some(AccountingStandard::JapanGaap);
        jgaap.resolved.provenance.accounting_standard = Some(AccountingStandard::Ifrs);

        let facts = [jgaap, ifrs];
        assert_eq!(select(&facts, PrecedenceOrder::default()).unwrap().value, 7.0);
    }

    #[test]
    fn test_selection_ignores_input_order() {
        let a = original();
        let b = amendment(true);
        let c = amendment(false);
        let forward = [a.clone(), b.clone(), c.clone()];
        let backward = [c, b, a];
        assert_eq!(
            select(&forward, PrecedenceOrder::default()),
            select(&backward, PrecedenceOrder::default())
        );
    }

    #[test]
    fn test_empty_input() {
        let facts: [NormalizedFact; 0] = [];
        assert!(select(&facts, PrecedenceOrder::default()).is_none());
    }
}
