#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/kessan-rs/kessan/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! TDnet timely-disclosure feed.
//!
//! The feed publishes one JSON file per day, `I_main_00_YYYYMMDD.json`,
//! either as `{"items": [...]}` or as a bare array of items.

use async_trait::async_trait;
use chrono::{Duration as DateDuration, Local, NaiveDate, NaiveDateTime};
use kessan_core::{
    DataFrequency, DataProvider, DisclosureEvent, DisclosureEventProvider, RateLimiter, Result,
    SecurityCode,
};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Default TDnet feed location
pub const TDNET_BASE_URL: &str = "https://www.release.tdnet.info/inbs";

const DEFAULT_RATE_LIMIT: Duration = Duration::from_millis(100);

const TIMESTAMP_FORMATS: [&str; 5] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
];

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Feed {
    Wrapped { items: Vec<FeedItem> },
    Bare(Vec<FeedItem>),
}

#[derive(Debug, Default, Deserialize)]
struct FeedItem {
    #[serde(default)]
    code: Option<Value>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    date: Option<String>,
    #[serde(default)]
    tdnet_date: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

impl FeedItem {
    fn code(&self) -> Option<SecurityCode> {
        match self.code.as_ref()? {
            Value::String(s) => Some(SecurityCode::new(s.as_str())),
            Value::Number(n) => Some(SecurityCode::new(n.to_string())),
            _ => None,
        }
    }

    fn timestamp(&self) -> Option<NaiveDateTime> {
        let raw = self.date.as_deref().or(self.tdnet_date.as_deref())?.trim();
        TIMESTAMP_FORMATS
            .iter()
            .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
            .or_else(|| {
                NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                    .ok()
                    .and_then(|d| d.and_hms_opt(0, 0, 0))
            })
    }
}

/// Parses one day's feed, keeping events for `code`.
///
/// Returns `None` when the body is not a recognizable feed.
pub fn parse_feed(body: &[u8], code: &SecurityCode) -> Option<Vec<DisclosureEvent>> {
    let items = match serde_json::from_slice::<Feed>(body).ok()? {
        Feed::Wrapped { items } | Feed::Bare(items) => items,
    };

    Some(
        items
            .into_iter()
            .filter(|item| item.code().is_some_and(|c| c == *code))
            .map(|item| DisclosureEvent {
                code: code.clone(),
                published_at: item.timestamp(),
                title: item.title.unwrap_or_default(),
                url: item.url.unwrap_or_default(),
            })
            .collect(),
    )
}

/// Sorts events newest first; undated events go last.
pub fn sort_newest_first(events: &mut [DisclosureEvent]) {
    events.sort_by(|a, b| match (a.published_at, b.published_at) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => a.title.cmp(&b.title),
    });
}

/// TDnet disclosure event provider.
#[derive(Debug)]
pub struct TdnetProvider {
    client: reqwest::Client,
    rate_limiter: Arc<Mutex<RateLimiter>>,
    base_url: String,
}

impl TdnetProvider {
    /// Create a provider reading the feed under `base_url`.
    pub fn new(base_url: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to build HTTP client");

        Self::with_client(client, base_url)
    }

    /// Create a provider with a custom HTTP client.
    pub fn with_client(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            rate_limiter: Arc::new(Mutex::new(RateLimiter::new(DEFAULT_RATE_LIMIT))),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// URL of the feed file for `day`.
    #[must_use]
    pub fn feed_url(&self, day: NaiveDate) -> String {
        format!("{}/{}", self.base_url, day.format("I_main_00_%Y%m%d.json"))
    }

    /// Fetch one day's events for `code`. Unavailable or undecodable days
    /// yield no events.
    async fn events_on(&self, day: NaiveDate, code: &SecurityCode) -> Vec<DisclosureEvent> {
        self.rate_limiter.lock().await.wait().await;

        let url = self.feed_url(day);
        debug!("Fetching TDnet feed {}", url);

        let response = match self.client.get(&url).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!("TDnet request for {} failed: {}", day, e);
                return Vec::new();
            }
        };
        if response.status().as_u16() != 200 {
            debug!("TDnet feed {} returned HTTP {}", day, response.status());
            return Vec::new();
        }

        let body = match response.bytes().await {
            Ok(body) => body,
            Err(e) => {
                warn!("Failed to read TDnet feed {}: {}", day, e);
                return Vec::new();
            }
        };

        parse_feed(&body, code).unwrap_or_else(|| {
            warn!("Skipping undecodable TDnet feed for {}", day);
            Vec::new()
        })
    }
}

impl Default for TdnetProvider {
    fn default() -> Self {
        Self::new(TDNET_BASE_URL)
    }
}

impl DataProvider for TdnetProvider {
    fn name(&self) -> &str {
        "TDnet"
    }

    fn description(&self) -> &str {
        "Tokyo Stock Exchange timely disclosure headlines"
    }

    fn supported_frequencies(&self) -> &[DataFrequency] {
        &[DataFrequency::Daily]
    }
}

#[async_trait]
impl DisclosureEventProvider for TdnetProvider {
    async fn fetch_recent_events(
        &self,
        code: &SecurityCode,
        days: u32,
    ) -> Result<Vec<DisclosureEvent>> {
        let today = Local::now().date_naive();
        let mut events = Vec::new();
        for offset in 0..days {
            let day = today - DateDuration::days(i64::from(offset));
            events.extend(self.events_on(day, code).await);
        }

        sort_newest_first(&mut events);
        debug!("Found {} TDnet events for {}", events.len(), code);
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WRAPPED: &str = r#"{
        "items": [
            { "code": "72030", "title": "決算短信", "date": "2024-05-08 13:55:00", "url": "https://example.com/a.pdf" },
            { "code": "67580", "title": "配当予想の修正", "date": "2024-05-08 15:00:00", "url": "https://example.com/b.pdf" },
            { "code": 7203, "title": "自己株式の取得", "tdnet_date": "2024/05/08 15:30", "url": "https://example.com/c.pdf" }
        ]
    }"#;

    #[test]
    fn test_parse_wrapped_feed() {
        let code = SecurityCode::new("7203");
        let events = parse_feed(WRAPPED.as_bytes(), &code).unwrap();

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].title, "決算短信");
        assert_eq!(
            events[1].published_at,
            NaiveDate::from_ymd_opt(2024, 5, 8).unwrap().and_hms_opt(15, 30, 0)
        );
    }

    #[test]
    fn test_parse_bare_array() {
        let body = r#"[{ "code": "6758", "title": "業績予想", "date": "2024-05-14" }]"#;
        let events = parse_feed(body.as_bytes(), &SecurityCode::new("6758")).unwrap();

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].url, "");
        assert!(events[0].published_at.is_some());
    }

    #[test]
    fn test_undecodable_body() {
        assert!(parse_feed(b"<html>maintenance</html>", &SecurityCode::new("7203")).is_none());
    }

    #[test]
    fn test_sort_newest_first() {
        let code = SecurityCode::new("7203");
        let mut events = parse_feed(WRAPPED.as_bytes(), &code).unwrap();
        events.push(DisclosureEvent {
            code: code.clone(),
            title: "undated".to_string(),
            published_at: None,
            url: String::new(),
        });

        sort_newest_first(&mut events);
        assert_eq!(events[0].title, "自己株式の取得");
        assert_eq!(events[1].title, "決算短信");
        assert_eq!(events[2].title, "undated");
    }

    #[test]
    fn test_feed_url() {
        let provider = TdnetProvider::new("https://www.release.tdnet.info/inbs/");
        let day = NaiveDate::from_ymd_opt(2024, 5, 8).unwrap();
        assert_eq!(
            provider.feed_url(day),
            "https://www.release.tdnet.info/inbs/I_main_00_20240508.json"
        );
    }

    #[tokio::test]
    async fn test_zero_days_is_empty() {
        let provider = TdnetProvider::default();
        let events = provider
            .fetch_recent_events(&SecurityCode::new("7203"), 0)
            .await
            .unwrap();
        assert!(events.is_empty());
        assert_eq!(provider.name(), "TDnet");
    }
}
