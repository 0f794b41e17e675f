//! Application settings read from the environment.
//!
//! [`AppConfig::from_env`] loads a `.env` file first when one is present.
//! Unset variables and unparsable numbers fall back to the defaults.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use kessan_core::PipelineError;
use kessan_xbrl::ConceptMap;

use crate::alerts::AlertStore;
use crate::portfolio::PortfolioStore;

/// Default TDnet feed location.
pub const DEFAULT_TDNET_BASE_URL: &str = "https://www.release.tdnet.info/inbs";

/// Settings shared by the command-line and server front ends.
#[derive(Clone, Debug, PartialEq)]
pub struct AppConfig {
    /// Organisation named in the user agent.
    pub company_name: String,
    /// Contact address named in the user agent.
    pub email_address: String,
    /// Annual filings fetched per security.
    pub filings_years: usize,
    /// Cache entry lifetime in hours.
    pub cache_ttl_hours: u64,
    /// SQLite cache file. In-memory caching when unset.
    pub cache_path: Option<PathBuf>,
    /// EDINET subscription key.
    pub edinet_api_key: Option<String>,
    /// TDnet feed location.
    pub tdnet_base_url: String,
    /// Code mapping JSON file.
    pub code_mapping: PathBuf,
    /// Concept map override. The built-in map is used when unset.
    pub concept_map: Option<PathBuf>,
    /// Alert rule file.
    pub alerts_file: PathBuf,
    /// Holdings file.
    pub portfolio_file: PathBuf,
    /// Default threshold for new RSI alerts.
    pub rsi_alert_threshold: f64,
    /// RSI look-back in bars.
    pub rsi_period: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            company_name: "TradeChart JP".to_string(),
            email_address: "support@example.com".to_string(),
            filings_years: 5,
            cache_ttl_hours: 12,
            cache_path: None,
            edinet_api_key: None,
            tdnet_base_url: DEFAULT_TDNET_BASE_URL.to_string(),
            code_mapping: PathBuf::from("data/mappings/code_mapping.json"),
            concept_map: None,
            alerts_file: PathBuf::from("data/alerts.json"),
            portfolio_file: PathBuf::from("data/portfolio.json"),
            rsi_alert_threshold: 40.0,
            rsi_period: 14,
        }
    }
}

impl AppConfig {
    /// Reads the process environment after loading `.env`.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads settings through `lookup`, which returns a variable's value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let text = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        Self {
            company_name: text("APP_COMPANY_NAME").unwrap_or(defaults.company_name),
            email_address: text("APP_EMAIL_ADDRESS").unwrap_or(defaults.email_address),
            filings_years: parsed(text("APP_FILINGS_YEARS"), defaults.filings_years),
            cache_ttl_hours: parsed(text("APP_CACHE_TTL_HOURS"), defaults.cache_ttl_hours),
            cache_path: text("APP_CACHE_PATH").map(PathBuf::from),
            edinet_api_key: text("EDINET_API_KEY"),
            tdnet_base_url: text("TDNET_BASE_URL").unwrap_or(defaults.tdnet_base_url),
            code_mapping: text("APP_CODE_MAPPING").map_or(defaults.code_mapping, PathBuf::from),
            concept_map: text("APP_CONCEPT_MAP").map(PathBuf::from),
            alerts_file: text("APP_ALERTS_FILE").map_or(defaults.alerts_file, PathBuf::from),
            portfolio_file: text("APP_PORTFOLIO_FILE")
                .map_or(defaults.portfolio_file, PathBuf::from),
            rsi_alert_threshold: parsed(
                text("RSI_ALERT_THRESHOLD"),
                defaults.rsi_alert_threshold,
            ),
            rsi_period: parsed(text("RSI_PERIOD"), defaults.rsi_period),
        }
    }

    /// User agent sent to the disclosure sites.
    #[must_use]
    pub fn user_agent(&self) -> String {
        format!("{} {}", self.company_name, self.email_address)
    }

    /// Cache entry lifetime.
    #[must_use]
    pub const fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_hours * 3600)
    }

    /// Loads the configured concept map, or the built-in one.
    pub fn concept_map(&self) -> Result<ConceptMap, PipelineError> {
        match &self.concept_map {
            Some(path) => ConceptMap::from_path(path),
            None => Ok(ConceptMap::builtin()),
        }
    }

    /// Alert store over the configured file.
    #[must_use]
    pub fn alert_store(&self) -> AlertStore {
        AlertStore::new(self.alerts_file.clone())
    }

    /// Holdings store over the configured file.
    #[must_use]
    pub fn portfolio_store(&self) -> PortfolioStore {
        PortfolioStore::new(self.portfolio_file.clone())
    }
}

fn parsed<T: FromStr>(value: Option<String>, default: T) -> T {
    value.and_then(|v| v.parse().ok()).unwrap_or(default)
}
