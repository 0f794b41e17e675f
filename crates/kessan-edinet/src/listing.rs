//! EDINET document listing rows.

use chrono::{NaiveDate, NaiveDateTime};
use kessan_core::{FilingMeta, FiscalPeriod, FiscalYearEnd, FormType, SecurityCode};
use serde::{Deserialize, Serialize};

/// Response of `documents.json`.
#[derive(Debug, Deserialize)]
pub(crate) struct DocumentListResponse {
    #[serde(default)]
    pub(crate) results: Vec<DocumentRow>,
}

/// One row of an EDINET daily document listing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentRow {
    /// Document id (`S100XXXX`).
    #[serde(rename = "docID")]
    pub doc_id: Option<String>,
    /// EDINET filer code.
    #[serde(default)]
    pub edinet_code: Option<String>,
    /// Five-character security code.
    #[serde(default)]
    pub sec_code: Option<String>,
    /// Filer name.
    #[serde(default)]
    pub filer_name: Option<String>,
    /// Form code (`120` annual report, `130` amendment, ...).
    #[serde(default)]
    pub doc_type_code: Option<String>,
    /// First day of the reporting period.
    #[serde(default)]
    pub period_start: Option<String>,
    /// Last day of the reporting period.
    #[serde(default)]
    pub period_end: Option<String>,
    /// Submission time, `YYYY-MM-DD hh:mm`.
    #[serde(default)]
    pub submit_date_time: Option<String>,
    /// Free-text description.
    #[serde(default)]
    pub doc_description: Option<String>,
}

/// Which identifier a listing row must carry to match.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FilerTarget {
    /// Match on `edinetCode`.
    EdinetCode(String),
    /// Match on `secCode`.
    SecurityCode(SecurityCode),
}

impl DocumentRow {
    /// Returns true when the row belongs to `target` and has an allowed form.
    #[must_use]
    pub fn matches(&self, target: &FilerTarget, forms: &[FormType]) -> bool {
        let form_ok = self
            .form_type()
            .is_some_and(|form| forms.is_empty() || forms.contains(&form));
        if !form_ok || self.doc_id.is_none() {
            return false;
        }
        match target {
            FilerTarget::EdinetCode(code) => self
                .edinet_code
                .as_deref()
                .is_some_and(|c| c.eq_ignore_ascii_case(code)),
            FilerTarget::SecurityCode(code) => self
                .sec_code
                .as_deref()
                .is_some_and(|c| SecurityCode::new(c) == *code),
        }
    }

    /// Form type of the row.
    #[must_use]
    pub fn form_type(&self) -> Option<FormType> {
        FormType::from_edinet_code(self.doc_type_code.as_deref()?)
    }

    /// Submission date.
    #[must_use]
    pub fn submitted_on(&self) -> Option<NaiveDate> {
        let raw = self.submit_date_time.as_deref()?.trim();
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M")
            .map(|dt| dt.date())
            .or_else(|_| NaiveDate::parse_from_str(raw.get(..10).unwrap_or(raw), "%Y-%m-%d"))
            .ok()
    }

    /// Converts the row into filing metadata.
    ///
    /// The fiscal year is derived from the period end and the company's fiscal
    /// year end; the quarter from the months elapsed since the period start.
    #[must_use]
    pub fn to_filing_meta(&self, fiscal_year_end: FiscalYearEnd) -> Option<FilingMeta> {
        let doc_id = self.doc_id.as_deref()?;
        let form = self.form_type()?;
        let filed = self.submitted_on()?;
        let period_end = parse_date(self.period_end.as_deref()?)?;
        let fiscal_year = fiscal_year_end.fiscal_year_of(period_end);

        let fiscal_period = match form {
            FormType::AnnualReport | FormType::AmendedAnnualReport => FiscalPeriod::Annual,
            FormType::SemiAnnualReport | FormType::AmendedSemiAnnualReport => FiscalPeriod::Q2,
            FormType::QuarterlyReport | FormType::AmendedQuarterlyReport => {
                let start = self
                    .period_start
                    .as_deref()
                    .and_then(parse_date)
                    .unwrap_or_else(|| fiscal_year_end.start_of(fiscal_year));
                let days = (period_end - start).num_days() + 1;
                let quarter = ((days as f64 / 91.3).round() as u32).clamp(1, 3);
                FiscalPeriod::from_quarter(quarter).unwrap_or(FiscalPeriod::Q1)
            }
        };

        let mut meta = FilingMeta::new(doc_id, form, filed, period_end)
            .with_fiscal_period(fiscal_year, fiscal_period);
        if let Some(code) = self.sec_code.as_deref() {
            meta = meta.with_security_code(SecurityCode::new(code));
        }
        Some(meta)
    }
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw.get(..10).unwrap_or(raw), "%Y-%m-%d").ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = r#"{
        "metadata": { "title": "提出された書類を把握するためのAPI", "status": "200", "message": "OK" },
        "results": [
            {
                "seqNumber": 1, "docID": "S100TOYO", "edinetCode": "E02144", "secCode": "72030",
                "filerName": "トヨタ自動車株式会社", "docTypeCode": "120",
                "periodStart": "2023-04-01", "periodEnd": "2024-03-31",
                "submitDateTime": "2024-06-18 15:00", "docDescription": "有価証券報告書－第120期"
            },
            {
                "seqNumber": 2, "docID": "S100QTR3", "edinetCode": "E02144", "secCode": "72030",
                "docTypeCode": "140", "periodStart": "2023-04-01", "periodEnd": "2023-12-31",
                "submitDateTime": "2024-02-13 15:00"
            },
            {
                "seqNumber": 3, "docID": "S100FUND", "edinetCode": "G00001", "secCode": null,
                "docTypeCode": "030", "submitDateTime": "2024-06-18 09:00"
            }
        ]
    }"#;

    fn rows() -> Vec<DocumentRow> {
        serde_json::from_str::<DocumentListResponse>(LISTING).unwrap().results
    }

    #[test]
    fn test_matches_by_security_code() {
        let rows = rows();
        let target = FilerTarget::SecurityCode(SecurityCode::new("7203"));
        let annual = [FormType::AnnualReport, FormType::AmendedAnnualReport];
        assert!(rows[0].matches(&target, &annual));
        assert!(!rows[1].matches(&target, &annual));
        assert!(rows[1].matches(&target, &[]));
        assert!(!rows[2].matches(&target, &[]));
    }

    #[test]
    fn test_matches_by_edinet_code() {
        let rows = rows();
        let target = FilerTarget::EdinetCode("e02144".to_string());
        assert!(rows[0].matches(&target, &[FormType::AnnualReport]));
        assert!(!rows[2].matches(&target, &[]));
    }

    #[test]
    fn test_annual_row_to_meta() {
        let meta = rows()[0].to_filing_meta(FiscalYearEnd::MARCH).unwrap();
        assert_eq!(meta.document_id, "S100TOYO");
        assert_eq!(meta.form_type, FormType::AnnualReport);
        assert_eq!(meta.fiscal_year, 2024);
        assert_eq!(meta.fiscal_period, FiscalPeriod::Annual);
        assert_eq!(meta.filing_date, NaiveDate::from_ymd_opt(2024, 6, 18).unwrap());
        assert_eq!(meta.security_code, Some(SecurityCode::new("7203")));
    }

    #[test]
    fn test_quarterly_row_to_meta() {
        let meta = rows()[1].to_filing_meta(FiscalYearEnd::MARCH).unwrap();
        assert_eq!(meta.fiscal_year, 2024);
        assert_eq!(meta.fiscal_period, FiscalPeriod::Q3);
    }

    #[test]
    fn test_incomplete_row_has_no_meta() {
        assert!(rows()[2].to_filing_meta(FiscalYearEnd::MARCH).is_none());
    }
}
