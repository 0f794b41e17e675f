#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/kessan-rs/kessan/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! EDINET filing source.
//!
//! This crate provides access to the FSA's EDINET API v2:
//!
//! - Daily document listings (`documents.json`), cached per day
//! - Submission archive download and primary XBRL extraction
//! - Security code to EDINET code mapping with per-company fiscal year ends
//!
//! # Example
//!
//! ```no_run
//! use kessan_edinet::EdinetProvider;
//! use kessan_core::{FilingSource, SecurityCode};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let provider = EdinetProvider::new("MyApp/1.0 (contact@example.com)")
//!         .with_api_key("your-subscription-key");
//!
//!     let code = SecurityCode::new("7203");
//!     for meta in provider.list_filings(&code, 3).await? {
//!         let xbrl = provider.fetch_document(&meta).await?;
//!         println!("{} FY{}: {} bytes", meta.document_id, meta.fiscal_year, xbrl.len());
//!     }
//!
//!     Ok(())
//! }
//! ```

/// Submission archive handling.
pub mod archive;
/// Daily listing rows.
pub mod listing;
/// Security code mapping.
pub mod mapping;

pub use archive::extract_primary_xbrl;
pub use listing::{DocumentRow, FilerTarget};
pub use mapping::{CodeMapping, CodeMappingEntry};

use async_trait::async_trait;
use chrono::{Duration as DateDuration, Local, NaiveDate};
use kessan_core::{
    DataError, DataFrequency, DataProvider, FilingMeta, FilingSource, FiscalYearEnd, FormType,
    RateLimiter, Result, SecurityCode,
};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};

use crate::listing::DocumentListResponse;

/// EDINET API v2 base URL
const EDINET_BASE_URL: &str = "https://disclosure.edinet-fsa.go.jp/api/v2";

/// Default minimum interval between requests
const DEFAULT_RATE_LIMIT: Duration = Duration::from_millis(200);

/// Annual securities reports and their amendments.
const DEFAULT_FORMS: [FormType; 2] = [FormType::AnnualReport, FormType::AmendedAnnualReport];

/// Days walked back per requested filing.
const DAYS_PER_FILING: usize = 400;

/// EDINET filing source.
///
/// Lists and downloads disclosure documents from EDINET. Daily listings are
/// cached for the lifetime of the provider.
#[derive(Debug)]
pub struct EdinetProvider {
    client: reqwest::Client,
    rate_limiter: Arc<Mutex<RateLimiter>>,
    base_url: String,
    api_key: Option<String>,
    mapping: CodeMapping,
    forms: Vec<FormType>,
    daily: Arc<RwLock<HashMap<NaiveDate, Arc<Vec<DocumentRow>>>>>,
}

impl EdinetProvider {
    /// Create a new EDINET provider with the specified user agent.
    ///
    /// # Example
    /// ```
    /// use kessan_edinet::EdinetProvider;
    ///
    /// let provider = EdinetProvider::new("MyApp/1.0 (contact@example.com)");
    /// ```
    pub fn new(user_agent: &str) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to build HTTP client");

        Self::with_client(client)
    }

    /// Create a new EDINET provider with a custom HTTP client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            client,
            rate_limiter: Arc::new(Mutex::new(RateLimiter::new(DEFAULT_RATE_LIMIT))),
            base_url: EDINET_BASE_URL.to_string(),
            api_key: None,
            mapping: CodeMapping::default(),
            forms: DEFAULT_FORMS.to_vec(),
            daily: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Sets the `Subscription-Key` sent with every request.
    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Overrides the API base URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Sets the security code mapping.
    #[must_use]
    pub fn with_mapping(mut self, mapping: CodeMapping) -> Self {
        self.mapping = mapping;
        self
    }

    /// Sets the forms [`FilingSource::list_filings`] collects.
    #[must_use]
    pub fn with_forms(mut self, forms: Vec<FormType>) -> Self {
        self.forms = forms;
        self
    }

    /// The security code mapping in use.
    pub const fn mapping(&self) -> &CodeMapping {
        &self.mapping
    }

    /// Target identifier for a security: the mapped EDINET code when known,
    /// the security code otherwise.
    #[must_use]
    pub fn target_for(&self, code: &SecurityCode) -> FilerTarget {
        self.mapping.edinet_code(code).map_or_else(
            || FilerTarget::SecurityCode(code.clone()),
            |edinet| FilerTarget::EdinetCode(edinet.to_string()),
        )
    }

    fn with_key(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.query(&[("Subscription-Key", key.as_str())]),
            None => request,
        }
    }

    /// Fetch the document listing for one day.
    ///
    /// A 404 response yields an empty day. Results are cached per date.
    pub async fn documents_for_date(&self, date: NaiveDate) -> Result<Arc<Vec<DocumentRow>>> {
        if let Some(rows) = self.daily.read().await.get(&date) {
            debug!("Listing cache hit for {}", date);
            return Ok(Arc::clone(rows));
        }

        // Rate limit
        self.rate_limiter.lock().await.wait().await;

        let url = format!("{}/documents.json", self.base_url);
        let date_str = date.format("%Y-%m-%d").to_string();
        debug!("Fetching EDINET listing {} for {}", url, date_str);

        let request = self
            .client
            .get(&url)
            .query(&[("date", date_str.as_str()), ("type", "2")]);
        let response = self
            .with_key(request)
            .send()
            .await
            .map_err(|e| DataError::Network(e.to_string()))?;

        let rows = match response.status().as_u16() {
            404 => Vec::new(),
            429 => {
                return Err(DataError::RateLimited {
                    provider: "EDINET".to_string(),
                    retry_after: Some(Duration::from_secs(60)),
                });
            }
            401 | 403 => {
                return Err(DataError::ProviderNotConfigured(
                    "EDINET rejected the subscription key".to_string(),
                ));
            }
            status if !response.status().is_success() => {
                return Err(DataError::Network(format!(
                    "Failed to fetch EDINET listing for {}: HTTP {}",
                    date_str, status
                )));
            }
            _ => {
                let listing: DocumentListResponse = response.json().await.map_err(|e| {
                    DataError::Parse(format!("Failed to parse EDINET listing: {}", e))
                })?;
                listing.results
            }
        };

        let rows = Arc::new(rows);
        self.daily.write().await.insert(date, Arc::clone(&rows));
        Ok(rows)
    }

    /// List documents filed by `target`, newest submission first.
    ///
    /// Walks back one day at a time from today, for at most
    /// `max(limit * 400, 400)` days, until `limit` documents are found.
    pub async fn list_documents(
        &self,
        target: &FilerTarget,
        forms: &[FormType],
        limit: usize,
    ) -> Result<Vec<DocumentRow>> {
        self.list_documents_from(Local::now().date_naive(), target, forms, limit)
            .await
    }

    async fn list_documents_from(
        &self,
        start: NaiveDate,
        target: &FilerTarget,
        forms: &[FormType],
        limit: usize,
    ) -> Result<Vec<DocumentRow>> {
        let mut found = Vec::new();
        let mut seen = HashSet::new();
        let max_days = limit.saturating_mul(DAYS_PER_FILING).max(DAYS_PER_FILING);

        let mut day = start;
        for _ in 0..max_days {
            if found.len() >= limit {
                break;
            }
            let rows = self.documents_for_date(day).await?;
            for row in rows.iter().filter(|row| row.matches(target, forms)) {
                if found.len() >= limit {
                    break;
                }
                if let Some(doc_id) = &row.doc_id
                    && seen.insert(doc_id.clone())
                {
                    found.push(row.clone());
                }
            }
            day -= DateDuration::days(1);
        }

        found.sort_by(|a, b| b.submit_date_time.cmp(&a.submit_date_time));
        debug!("Found {} EDINET documents for {:?}", found.len(), target);
        Ok(found)
    }

    /// Download a submission archive (`type=1`).
    pub async fn download_document(&self, doc_id: &str) -> Result<Vec<u8>> {
        // Rate limit
        self.rate_limiter.lock().await.wait().await;

        let url = format!("{}/documents/{}", self.base_url, doc_id);
        debug!("Downloading EDINET document {}", url);

        let request = self.client.get(&url).query(&[("type", "1")]);
        let response = self
            .with_key(request)
            .send()
            .await
            .map_err(|e| DataError::Network(e.to_string()))?;

        match response.status().as_u16() {
            404 => return Err(DataError::SymbolNotFound(doc_id.to_string())),
            429 => {
                return Err(DataError::RateLimited {
                    provider: "EDINET".to_string(),
                    retry_after: Some(Duration::from_secs(60)),
                });
            }
            _ if !response.status().is_success() => {
                return Err(DataError::Network(format!(
                    "Failed to download {}: HTTP {}",
                    doc_id,
                    response.status()
                )));
            }
            _ => {}
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| DataError::Network(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

impl DataProvider for EdinetProvider {
    fn name(&self) -> &str {
        "EDINET"
    }

    fn description(&self) -> &str {
        "FSA EDINET electronic disclosure system (annual and quarterly securities reports)"
    }

    fn supported_frequencies(&self) -> &[DataFrequency] {
        &[DataFrequency::Annual, DataFrequency::Quarterly]
    }
}

#[async_trait]
impl FilingSource for EdinetProvider {
    async fn list_filings(&self, code: &SecurityCode, limit: usize) -> Result<Vec<FilingMeta>> {
        if !code.is_valid() {
            return Err(DataError::InvalidParameter(format!(
                "Invalid security code: {}",
                code
            )));
        }
        if limit == 0 {
            return Ok(Vec::new());
        }

        let target = self.target_for(code);
        let fiscal_year_end = self.fiscal_year_end(code).await?;
        let rows = self.list_documents(&target, &self.forms, limit).await?;

        let metas = rows
            .iter()
            .filter_map(|row| {
                let meta = row.to_filing_meta(fiscal_year_end);
                if meta.is_none() {
                    warn!("Skipping incomplete EDINET row {:?}", row.doc_id);
                }
                meta
            })
            .map(|meta| {
                if meta.security_code.is_some() {
                    meta
                } else {
                    meta.with_security_code(code.clone())
                }
            })
            .collect();

        Ok(metas)
    }

    async fn fetch_document(&self, meta: &FilingMeta) -> Result<Vec<u8>> {
        let archive = self.download_document(&meta.document_id).await?;
        extract_primary_xbrl(&archive)?.ok_or_else(|| {
            DataError::Parse(format!("No XBRL instance in document {}", meta.document_id))
        })
    }

    async fn fiscal_year_end(&self, code: &SecurityCode) -> Result<FiscalYearEnd> {
        Ok(self.mapping.fiscal_year_end(code).unwrap_or_default())
    }
}
