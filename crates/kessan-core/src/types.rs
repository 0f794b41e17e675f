//! Reference data types shared by every crate.
//!
//! - [`SecurityCode`] - TSE security code
//! - [`FiscalYearEnd`] - month/day on which a company's fiscal year closes
//! - [`FormType`] - EDINET disclosure form
//! - [`AccountingStandard`] - Japanese GAAP, IFRS or US GAAP
//! - [`FilingMeta`] - identity of one disclosure document
//! - [`DisclosureEvent`] - a TDnet timely-disclosure headline

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::frequency::FiscalPeriod;

/// A Tokyo Stock Exchange security code.
///
/// Codes are normalized on creation: whitespace and a Yahoo-style `.T` suffix
/// are stripped, letters are uppercased, and the five-character EDINET form
/// (`72030`) is shortened to the four-character display form (`7203`).
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SecurityCode(String);

impl SecurityCode {
    /// Creates a new code from any of the accepted spellings.
    #[must_use]
    pub fn new(s: impl Into<String>) -> Self {
        let raw = s.into();
        let mut code = raw.trim().to_uppercase();
        if let Some(stripped) = code.strip_suffix(".T") {
            code = stripped.to_string();
        }
        if code.len() == 5 && code.ends_with('0') {
            code.truncate(4);
        }
        Self(code)
    }

    /// Returns the four-character display form.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true for four ASCII alphanumeric characters.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.0.len() == 4 && self.0.chars().all(|c| c.is_ascii_alphanumeric())
    }

    /// The five-character code EDINET lists in `secCode`.
    #[must_use]
    pub fn edinet_form(&self) -> String {
        format!("{}0", self.0)
    }

    /// The ticker Yahoo Finance uses for TSE listings.
    #[must_use]
    pub fn yahoo_symbol(&self) -> String {
        format!("{}.T", self.0)
    }
}

impl fmt::Display for SecurityCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SecurityCode {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(s))
    }
}

impl From<&str> for SecurityCode {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for SecurityCode {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// The month and day on which a company's fiscal year closes.
///
/// Most Japanese issuers close on March 31; the default is the calendar
/// year end. Serialized as `MM-DD`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FiscalYearEnd {
    month: u32,
    day: u32,
}

impl FiscalYearEnd {
    /// December 31.
    pub const CALENDAR: Self = Self { month: 12, day: 31 };

    /// March 31, the dominant fiscal year end in Japan.
    pub const MARCH: Self = Self { month: 3, day: 31 };

    /// Creates a fiscal year end, validating the month/day pair.
    ///
    /// February 28 and 29 both mean the last day of February, so a February
    /// closer stays in one fiscal year across leap years.
    #[must_use]
    pub fn new(month: u32, day: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(2000, month, day)?;
        let day = if month == 2 && day == 28 { 29 } else { day };
        Some(Self { month, day })
    }

    /// Month component.
    #[must_use]
    pub const fn month(&self) -> u32 {
        self.month
    }

    /// Day component.
    #[must_use]
    pub const fn day(&self) -> u32 {
        self.day
    }

    /// The closing date of the fiscal year labelled `year`.
    #[must_use]
    pub fn boundary(&self, year: i32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, self.month, self.day)
            .or_else(|| NaiveDate::from_ymd_opt(year, self.month, 28))
            .unwrap_or(NaiveDate::MIN)
    }

    /// Fiscal year label of `date`: the year in which its fiscal year closes.
    #[must_use]
    pub fn fiscal_year_of(&self, date: NaiveDate) -> i32 {
        if date <= self.boundary(date.year()) {
            date.year()
        } else {
            date.year() + 1
        }
    }

    /// First day of the fiscal year labelled `year`.
    #[must_use]
    pub fn start_of(&self, year: i32) -> NaiveDate {
        self.boundary(year - 1) + Duration::days(1)
    }
}

impl Default for FiscalYearEnd {
    fn default() -> Self {
        Self::CALENDAR
    }
}

impl fmt::Display for FiscalYearEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}-{:02}", self.month, self.day)
    }
}

impl FromStr for FiscalYearEnd {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (month, day) = s
            .trim()
            .split_once(['-', '/'])
            .ok_or_else(|| format!("Invalid fiscal year end: {}", s))?;
        let month = month
            .parse::<u32>()
            .map_err(|_| format!("Invalid fiscal year end month: {}", s))?;
        let day = day
            .parse::<u32>()
            .map_err(|_| format!("Invalid fiscal year end day: {}", s))?;
        Self::new(month, day).ok_or_else(|| format!("Invalid fiscal year end: {}", s))
    }
}

impl TryFrom<String> for FiscalYearEnd {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<FiscalYearEnd> for String {
    fn from(value: FiscalYearEnd) -> Self {
        value.to_string()
    }
}

/// EDINET disclosure form types relevant to financial statements.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormType {
    /// Annual securities report (有価証券報告書, form 120).
    AnnualReport,
    /// Amendment to an annual securities report (form 130).
    AmendedAnnualReport,
    /// Quarterly report (四半期報告書, form 140).
    QuarterlyReport,
    /// Amendment to a quarterly report (form 150).
    AmendedQuarterlyReport,
    /// Semi-annual report (半期報告書, form 160).
    SemiAnnualReport,
    /// Amendment to a semi-annual report (form 170).
    AmendedSemiAnnualReport,
}

impl FormType {
    /// Maps an EDINET `docTypeCode` to a form type.
    #[must_use]
    pub fn from_edinet_code(code: &str) -> Option<Self> {
        match code.trim() {
            "120" => Some(Self::AnnualReport),
            "130" => Some(Self::AmendedAnnualReport),
            "140" => Some(Self::QuarterlyReport),
            "150" => Some(Self::AmendedQuarterlyReport),
            "160" => Some(Self::SemiAnnualReport),
            "170" => Some(Self::AmendedSemiAnnualReport),
            _ => None,
        }
    }

    /// The EDINET `docTypeCode` for this form.
    #[must_use]
    pub const fn edinet_code(&self) -> &'static str {
        match self {
            Self::AnnualReport => "120",
            Self::AmendedAnnualReport => "130",
            Self::QuarterlyReport => "140",
            Self::AmendedQuarterlyReport => "150",
            Self::SemiAnnualReport => "160",
            Self::AmendedSemiAnnualReport => "170",
        }
    }

    /// Returns true for correction filings.
    #[must_use]
    pub const fn is_amendment(&self) -> bool {
        matches!(
            self,
            Self::AmendedAnnualReport | Self::AmendedQuarterlyReport | Self::AmendedSemiAnnualReport
        )
    }

    /// Returns true for full-year reports.
    #[must_use]
    pub const fn is_annual(&self) -> bool {
        matches!(self, Self::AnnualReport | Self::AmendedAnnualReport)
    }
}

/// Accounting standard a filing is prepared under.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AccountingStandard {
    /// Japanese GAAP.
    #[serde(rename = "jgaap")]
    JapanGaap,
    /// International Financial Reporting Standards.
    #[serde(rename = "ifrs")]
    Ifrs,
    /// US GAAP.
    #[serde(rename = "usgaap")]
    UsGaap,
}

impl AccountingStandard {
    /// Parses the value of `jpdei_cor:AccountingStandardsDEI`.
    #[must_use]
    pub fn from_dei(value: &str) -> Option<Self> {
        let normalized: String = value
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "japangaap" | "jgaap" | "japanesegaap" => Some(Self::JapanGaap),
            "ifrs" => Some(Self::Ifrs),
            "usgaap" => Some(Self::UsGaap),
            _ => None,
        }
    }
}

/// Identity of one disclosure document.
///
/// Constructed once by the filing source from a listing row; the `with_*`
/// methods consume and return the value, so a meta is never edited in place.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilingMeta {
    /// Provider document identifier (EDINET `docID`).
    pub document_id: String,
    /// Issuer security code, when the listing carries one.
    pub security_code: Option<SecurityCode>,
    /// Fiscal year label of the reporting period.
    pub fiscal_year: i32,
    /// Reporting period within the fiscal year.
    pub fiscal_period: FiscalPeriod,
    /// Form of the document.
    pub form_type: FormType,
    /// Date the document was submitted.
    pub filing_date: NaiveDate,
    /// End date of the reporting period.
    pub period_end: NaiveDate,
    /// Accounting standard, when known before parsing.
    pub accounting_standard: Option<AccountingStandard>,
}

impl FilingMeta {
    /// Creates a new filing meta with required fields.
    ///
    /// The fiscal year defaults to the period end's calendar year and the
    /// fiscal period to annual; use [`FilingMeta::with_fiscal_period`] when
    /// the company closes its books on another date.
    #[must_use]
    pub fn new(
        document_id: impl Into<String>,
        form_type: FormType,
        filing_date: NaiveDate,
        period_end: NaiveDate,
    ) -> Self {
        Self {
            document_id: document_id.into(),
            security_code: None,
            fiscal_year: period_end.year(),
            fiscal_period: FiscalPeriod::Annual,
            form_type,
            filing_date,
            period_end,
            accounting_standard: None,
        }
    }

    /// Sets the fiscal year and period.
    #[must_use]
    pub fn with_fiscal_period(mut self, fiscal_year: i32, fiscal_period: FiscalPeriod) -> Self {
        self.fiscal_year = fiscal_year;
        self.fiscal_period = fiscal_period;
        self
    }

    /// Sets the issuer's security code.
    #[must_use]
    pub fn with_security_code(mut self, code: SecurityCode) -> Self {
        self.security_code = Some(code);
        self
    }

    /// Sets the accounting standard.
    #[must_use]
    pub fn with_accounting_standard(mut self, standard: AccountingStandard) -> Self {
        self.accounting_standard = Some(standard);
        self
    }

    /// Returns true for correction filings.
    #[must_use]
    pub const fn is_amendment(&self) -> bool {
        self.form_type.is_amendment()
    }
}

/// A timely-disclosure headline published on TDnet.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisclosureEvent {
    /// Issuer security code.
    pub code: SecurityCode,
    /// Headline.
    pub title: String,
    /// Publication time, when the feed carries a parsable one.
    pub published_at: Option<NaiveDateTime>,
    /// Link to the PDF or page.
    pub url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_security_code_normalization() {
        assert_eq!(SecurityCode::new("7203").as_str(), "7203");
        assert_eq!(SecurityCode::new(" 7203.t ").as_str(), "7203");
        assert_eq!(SecurityCode::new("72030").as_str(), "7203");
        assert_eq!(SecurityCode::new("285a").as_str(), "285A");
        assert_eq!(SecurityCode::new("285A0").edinet_form(), "285A0");
        assert_eq!(SecurityCode::new("6857").yahoo_symbol(), "6857.T");
        assert!(SecurityCode::new("6857").is_valid());
        assert!(!SecurityCode::new("68").is_valid());
    }

    #[test]
    fn test_fiscal_year_of_march_close() {
        let fye = FiscalYearEnd::MARCH;
        let d = |y, m, d| NaiveDate::from_ymd_opt(y, m, d).unwrap();
        assert_eq!(fye.fiscal_year_of(d(2024, 3, 31)), 2024);
        assert_eq!(fye.fiscal_year_of(d(2024, 4, 1)), 2025);
        assert_eq!(fye.fiscal_year_of(d(2023, 12, 31)), 2024);
        assert_eq!(fye.start_of(2024), d(2023, 4, 1));
    }

    #[test]
    fn test_fiscal_year_end_calendar_default() {
        let fye = FiscalYearEnd::default();
        let date = NaiveDate::from_ymd_opt(2023, 12, 31).unwrap();
        assert_eq!(fye.fiscal_year_of(date), 2023);
        assert_eq!(fye.start_of(2023), NaiveDate::from_ymd_opt(2023, 1, 1).unwrap());
    }

    #[test]
    fn test_fiscal_year_end_leap_day_clamps() {
        let fye = FiscalYearEnd::new(2, 29).unwrap();
        assert_eq!(fye.boundary(2023), NaiveDate::from_ymd_opt(2023, 2, 28).unwrap());
        assert_eq!(fye.boundary(2024), NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
    }

    #[test]
    fn test_february_28_means_month_end() {
        let d = |y, m, d| NaiveDate::from_ymd_opt(y, m, d).unwrap();
        let fye = FiscalYearEnd::new(2, 28).unwrap();
        assert_eq!(fye, FiscalYearEnd::new(2, 29).unwrap());
        assert_eq!(fye.boundary(2024), d(2024, 2, 29));
        assert_eq!(fye.boundary(2025), d(2025, 2, 28));
        assert_eq!(fye.fiscal_year_of(d(2024, 2, 29)), 2024);
        assert_eq!(fye.fiscal_year_of(d(2024, 3, 1)), 2025);
        assert_eq!(fye.start_of(2024), d(2023, 3, 1));
        assert_eq!("02-28".parse::<FiscalYearEnd>().unwrap(), fye);
    }

    #[test]
    fn test_fiscal_year_end_parse_and_serde() {
        assert_eq!("03-31".parse::<FiscalYearEnd>().unwrap(), FiscalYearEnd::MARCH);
        assert_eq!("9/30".parse::<FiscalYearEnd>().unwrap().month(), 9);
        assert!("13-01".parse::<FiscalYearEnd>().is_err());
        assert!("0331".parse::<FiscalYearEnd>().is_err());

        let json = serde_json::to_string(&FiscalYearEnd::MARCH).unwrap();
        assert_eq!(json, "\"03-31\"");
    }

    #[test]
    fn test_form_type_codes() {
        let amended = FormType::from_edinet_code("130").unwrap();
        assert!(amended.is_amendment());
        assert!(amended.is_annual());
        assert_eq!(amended.edinet_code(), "130");
        assert!(FormType::from_edinet_code("350").is_none());
    }

    #[test]
    fn test_accounting_standard_from_dei() {
        assert_eq!(
            AccountingStandard::from_dei("Japan GAAP"),
            Some(AccountingStandard::JapanGaap)
        );
        assert_eq!(AccountingStandard::from_dei("IFRS"), Some(AccountingStandard::Ifrs));
        assert_eq!(AccountingStandard::from_dei("US GAAP"), Some(AccountingStandard::UsGaap));
        assert_eq!(AccountingStandard::from_dei("other"), None);
    }
}
