//! Pipeline scenarios over XBRL fixtures.

use chrono::NaiveDate;
use kessan_core::{
    AccountingStandard, CanonicalUnit, FilingMeta, FiscalPeriod, FiscalYearEnd, FormType, Metric,
    PipelineError, SecurityCode, WarningKind,
};
use kessan_xbrl::{BuildConfig, MetricPipeline, ResolverConfig};

fn fixture(name: &str) -> Vec<u8> {
    let path = format!("{}/tests/fixtures/{}", env!("CARGO_MANIFEST_DIR"), name);
    std::fs::read(&path).unwrap_or_else(|e| panic!("reading {path}: {e}"))
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn annual_meta(doc: &str, fiscal_year: i32, filed: NaiveDate) -> FilingMeta {
    FilingMeta::new(doc, FormType::AnnualReport, filed, date(fiscal_year, 12, 31))
        .with_security_code(SecurityCode::new("9999"))
}

fn three_years() -> Vec<(FilingMeta, Vec<u8>)> {
    vec![
        (
            annual_meta("S1002021", 2021, date(2022, 3, 25)),
            fixture("annual_2021.xbrl"),
        ),
        (
            annual_meta("S1002022", 2022, date(2023, 3, 24)),
            fixture("annual_2022.xbrl"),
        ),
        (
            annual_meta("S1002023", 2023, date(2024, 3, 22)),
            fixture("annual_2023.xbrl"),
        ),
    ]
}

#[test]
fn test_growth_series() {
    let pipeline = MetricPipeline::default().with_build_config(BuildConfig {
        cagr_years: Some(2),
        ..BuildConfig::default()
    });
    let report = pipeline.run(three_years()).unwrap();

    assert_eq!(report.documents_used, 3);
    assert_eq!(report.series.len(), 4);

    let revenue = report.series_for(Metric::Revenue).unwrap();
    assert_eq!(revenue.years(), vec![2021, 2022, 2023]);
    let values: Vec<f64> = revenue.points.iter().map(|p| p.value).collect();
    assert_eq!(values, vec![800.0, 880.0, 968.0]);
    assert!(revenue.points.iter().all(|p| p.consolidated));
    assert_eq!(revenue.points[0].yoy, None);
    assert!((revenue.points[1].yoy.unwrap() - 0.10).abs() < 1e-9);
    assert!((revenue.points[2].yoy.unwrap() - 0.10).abs() < 1e-9);
    assert!((revenue.cagr(2021, 2023).unwrap() - 0.10).abs() < 1e-9);
    assert!((revenue.points[2].cagr.unwrap() - 0.10).abs() < 1e-9);
    assert_eq!(revenue.points[2].source_document, "S1002023");
    assert_eq!(revenue.points[2].unit, CanonicalUnit::Currency("JPY".to_string()));
}

#[test]
fn test_segment_facts_never_reach_series() {
    let report = MetricPipeline::default().run(three_years()).unwrap();
    let revenue = report.series_for(Metric::Revenue).unwrap();
    // Segment values are 500/550/605; non-consolidated 300/330/363.
    assert!(revenue.points.iter().all(|p| p.value < 1_000.0 && p.value >= 800.0));
    assert!(
        report
            .warnings
            .iter()
            .filter(|w| w.kind == WarningKind::DiscardedNonConsolidated)
            .count()
            == 3
    );
}

#[test]
fn test_output_ignores_document_order() {
    let pipeline = MetricPipeline::default();
    let forward = pipeline.run(three_years()).unwrap();
    let mut shuffled = three_years();
    shuffled.swap(0, 2);
    shuffled.swap(1, 2);
    let backward = pipeline.run(shuffled).unwrap();
    assert_eq!(forward, backward);
}

#[test]
fn test_later_amendment_wins() {
    let original = annual_meta("S100ORIG", 2023, date(2024, 3, 25));
    let amended = FilingMeta::new(
        "S100AMND",
        FormType::AmendedAnnualReport,
        date(2024, 6, 10),
        date(2023, 12, 31),
    );
    let documents = vec![
        (amended, fixture("amendment_corrected_2023.xbrl")),
        (original, fixture("amendment_original_2023.xbrl")),
    ];

    let report = MetricPipeline::default().run(documents).unwrap();
    let revenue = report.series_for(Metric::Revenue).unwrap();
    assert_eq!(revenue.points.len(), 1);
    assert_eq!(revenue.points[0].fiscal_year, 2023);
    assert_eq!(revenue.points[0].value, 1_050_000_000.0);
    assert_eq!(revenue.points[0].source_document, "S100AMND");
}

#[test]
fn test_non_consolidated_year_stays_missing() {
    let documents = vec![
        (
            annual_meta("S1002022", 2022, date(2023, 3, 24)),
            fixture("annual_2022.xbrl"),
        ),
        (
            annual_meta("S100NONC", 2023, date(2024, 3, 22)),
            fixture("nonconsolidated_only_2023.xbrl"),
        ),
    ];

    let report = MetricPipeline::default().run(documents).unwrap();
    let revenue = report.series_for(Metric::Revenue).unwrap();
    assert_eq!(revenue.years(), vec![2022]);
    assert!(report.warnings.iter().any(|w| {
        w.kind == WarningKind::DiscardedNonConsolidated
            && w.fiscal_year == Some(2023)
            && w.document_id.as_deref() == Some("S100NONC")
    }));
}

#[test]
fn test_per_share_unit_is_rejected_for_revenue() {
    let documents = vec![
        (
            annual_meta("S1002021", 2021, date(2022, 3, 25)),
            fixture("annual_2021.xbrl"),
        ),
        (
            annual_meta("S100PERS", 2022, date(2023, 3, 24)),
            fixture("per_share_revenue_2022.xbrl"),
        ),
        (
            annual_meta("S1002023", 2023, date(2024, 3, 22)),
            fixture("annual_2023.xbrl"),
        ),
    ];

    let report = MetricPipeline::default().run(documents).unwrap();

    let revenue = report.series_for(Metric::Revenue).unwrap();
    assert_eq!(revenue.years(), vec![2021, 2023]);
    assert_eq!(revenue.points[1].yoy, None);

    let operating = report.series_for(Metric::OperatingIncome).unwrap();
    assert_eq!(operating.years(), vec![2021, 2022, 2023]);

    let warning = report
        .warnings
        .iter()
        .find(|w| matches!(w.kind, WarningKind::IncompatibleUnit { .. }))
        .unwrap();
    assert_eq!(warning.document_id.as_deref(), Some("S100PERS"));
    assert_eq!(warning.metric, Some(Metric::Revenue));
    assert_eq!(warning.fiscal_year, Some(2022));
}

#[test]
fn test_unparsable_document_does_not_abort_siblings() {
    let mut documents = three_years();
    let broken = annual_meta("S100BRKN", 2020, date(2021, 3, 25));
    documents.push((broken, b"<xbrli:xbrl><unclosed>".to_vec()));

    let report = MetricPipeline::default().run(documents).unwrap();
    assert_eq!(report.documents_used, 3);
    assert!(report.warnings.iter().any(|w| {
        matches!(w.kind, WarningKind::UnparsableDocument { .. })
            && w.document_id.as_deref() == Some("S100BRKN")
    }));
}

#[test]
fn test_no_usable_document() {
    let broken = annual_meta("S100BRKN", 2020, date(2021, 3, 25));
    let err = MetricPipeline::default()
        .run(vec![(broken, b"not xml".to_vec())])
        .unwrap_err();
    assert_eq!(err, PipelineError::NoDataAvailable("9999".to_string()));
}

#[test]
fn test_ifrs_inline_with_march_year_end() {
    let meta = FilingMeta::new(
        "S100IFRS",
        FormType::AnnualReport,
        date(2024, 6, 20),
        date(2024, 3, 31),
    )
    .with_fiscal_period(2024, FiscalPeriod::Annual);

    let pipeline = MetricPipeline::default()
        .with_resolver_config(ResolverConfig::default().with_fiscal_year_end(FiscalYearEnd::MARCH));
    let outcome = pipeline.process_document(&meta, &fixture("ifrs_inline_2024.htm"));
    assert!(outcome.usable);
    assert!(
        outcome
            .facts
            .iter()
            .all(|f| f.resolved.provenance.accounting_standard == Some(AccountingStandard::Ifrs))
    );

    let report = pipeline.build(vec![outcome]).unwrap();
    let revenue = report.series_for(Metric::Revenue).unwrap();
    assert_eq!(revenue.years(), vec![2023, 2024]);
    assert_eq!(revenue.points[1].value, 45_095_325_000_000.0);

    let expected = (45_095_325.0 - 37_154_298.0) / 37_154_298.0;
    assert!((revenue.points[1].yoy.unwrap() - expected).abs() < 1e-12);

    let cash_flow = report.series_for(Metric::OperatingCashFlow).unwrap();
    assert_eq!(cash_flow.years(), vec![2024]);
    assert!(report.series_for(Metric::NetIncome).is_none());
}

#[test]
fn test_latest_points_feed_alerts() {
    let report = MetricPipeline::default().run(three_years()).unwrap();
    let latest = report.latest_points();
    assert_eq!(latest.len(), 4);
    assert!(latest.iter().all(|p| p.fiscal_year == 2023));
    let revenue = latest.iter().find(|p| p.metric == Metric::Revenue).unwrap();
    assert!((revenue.yoy.unwrap() - 0.10).abs() < 1e-9);
}
