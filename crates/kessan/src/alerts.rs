//! Threshold alerts on RSI and year-over-year growth.
//!
//! Rules persist as a JSON array. Evaluation is pure: callers supply the
//! latest RSI reading or the report's latest points and receive the rules
//! that fired. Delivery of the rendered digest is left to the caller.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use kessan_core::{LatestPoint, Metric, Result, SecurityCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::json_file::write_atomically;

/// Condition an alert watches.
///
/// YoY thresholds are fractions (`0.1` is 10%), like the report's values.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AlertKind {
    /// RSI at or below the threshold.
    #[serde(rename = "RSI")]
    RsiBelow,
    /// RSI at or above the threshold.
    #[serde(rename = "RSI_ABOVE")]
    RsiAbove,
    /// Latest YoY of `metric` at or below the threshold.
    #[serde(rename = "YOY_BELOW")]
    YoyBelow {
        /// Watched metric.
        metric: Metric,
    },
    /// Latest YoY of `metric` at or above the threshold.
    #[serde(rename = "YOY_ABOVE")]
    YoyAbove {
        /// Watched metric.
        metric: Metric,
    },
}

impl AlertKind {
    const fn is_rsi(&self) -> bool {
        matches!(self, Self::RsiBelow | Self::RsiAbove)
    }

    const fn metric(&self) -> Option<Metric> {
        match self {
            Self::YoyBelow { metric } | Self::YoyAbove { metric } => Some(*metric),
            Self::RsiBelow | Self::RsiAbove => None,
        }
    }

    fn fires(&self, value: f64, threshold: f64) -> bool {
        match self {
            Self::RsiBelow | Self::YoyBelow { .. } => value <= threshold,
            Self::RsiAbove | Self::YoyAbove { .. } => value >= threshold,
        }
    }

    const fn comparator(&self) -> &'static str {
        match self {
            Self::RsiBelow | Self::YoyBelow { .. } => "<=",
            Self::RsiAbove | Self::YoyAbove { .. } => ">=",
        }
    }
}

/// A stored alert definition.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AlertRule {
    /// Rule id.
    pub id: Uuid,
    /// Watched security.
    #[serde(alias = "ticker")]
    pub code: SecurityCode,
    /// Condition.
    #[serde(flatten)]
    pub kind: AlertKind,
    /// Threshold the condition compares against.
    pub threshold: f64,
    /// Free-form note.
    #[serde(default)]
    pub note: String,
}

impl AlertRule {
    /// Creates a rule with a fresh id.
    #[must_use]
    pub fn new(code: SecurityCode, kind: AlertKind, threshold: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            code,
            kind,
            threshold,
            note: String::new(),
        }
    }

    /// Attaches a note.
    #[must_use]
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = note.into();
        self
    }
}

/// A rule that fired.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AlertMatch {
    /// Rule that fired.
    pub rule_id: Uuid,
    /// Security.
    pub code: SecurityCode,
    /// Condition.
    pub kind: AlertKind,
    /// Observed value.
    pub value: f64,
    /// Rule threshold.
    pub threshold: f64,
    /// Trading day of an RSI reading.
    pub date: Option<NaiveDate>,
    /// Fiscal year of a YoY reading.
    pub fiscal_year: Option<i32>,
}

/// Checks the RSI rules for `code` against the latest reading.
#[must_use]
pub fn evaluate_rsi(
    rules: &[AlertRule],
    code: &SecurityCode,
    rsi: f64,
    date: Option<NaiveDate>,
) -> Vec<AlertMatch> {
    if !rsi.is_finite() {
        return Vec::new();
    }
    rules
        .iter()
        .filter(|rule| rule.code == *code && rule.kind.is_rsi())
        .filter(|rule| rule.kind.fires(rsi, rule.threshold))
        .map(|rule| AlertMatch {
            rule_id: rule.id,
            code: rule.code.clone(),
            kind: rule.kind,
            value: rsi,
            threshold: rule.threshold,
            date,
            fiscal_year: None,
        })
        .collect()
}

/// Checks the YoY rules for `code` against the report's latest points.
///
/// A point without a YoY value never fires.
#[must_use]
pub fn evaluate_metrics(
    rules: &[AlertRule],
    code: &SecurityCode,
    latest: &[LatestPoint],
) -> Vec<AlertMatch> {
    rules
        .iter()
        .filter(|rule| rule.code == *code)
        .filter_map(|rule| {
            let metric = rule.kind.metric()?;
            let point = latest.iter().find(|p| p.metric == metric)?;
            let yoy = point.yoy.filter(|v| v.is_finite())?;
            rule.kind.fires(yoy, rule.threshold).then(|| AlertMatch {
                rule_id: rule.id,
                code: rule.code.clone(),
                kind: rule.kind,
                value: yoy,
                threshold: rule.threshold,
                date: None,
                fiscal_year: Some(point.fiscal_year),
            })
        })
        .collect()
}

/// Renders matches as a plain-text digest, one line per match.
///
/// When every dated match shares one day the date goes in the header;
/// otherwise each dated line carries its own. Empty input renders nothing.
#[must_use]
pub fn format_alert_message(matches: &[AlertMatch]) -> String {
    if matches.is_empty() {
        return String::new();
    }

    let mut dates: Vec<NaiveDate> = matches.iter().filter_map(|m| m.date).collect();
    dates.sort_unstable();
    dates.dedup();
    let shared_date = match dates.as_slice() {
        [only] => Some(*only),
        _ => None,
    };

    let mut message = match shared_date {
        Some(day) => format!("アラート ({})", day),
        None => "アラート".to_string(),
    };

    for m in matches {
        message.push('\n');
        let op = m.kind.comparator();
        let _ = match m.kind.metric() {
            None => write!(
                message,
                "{} RSI {:.1} ({} {:.1})",
                m.code, m.value, op, m.threshold
            ),
            Some(metric) => write!(
                message,
                "{} {} YoY {:.1}% ({} {:.1}%)",
                m.code,
                metric,
                m.value * 100.0,
                op,
                m.threshold * 100.0
            ),
        };
        if let Some(year) = m.fiscal_year {
            let _ = write!(message, " FY{}", year);
        }
        if shared_date.is_none()
            && let Some(day) = m.date
        {
            let _ = write!(message, " on {}", day);
        }
    }
    message
}

/// JSON file of alert rules.
#[derive(Clone, Debug)]
pub struct AlertStore {
    path: PathBuf,
}

impl AlertStore {
    /// Store backed by `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads all rules. A missing or unreadable file yields no rules.
    #[must_use]
    pub fn load(&self) -> Vec<AlertRule> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) => {
                debug!(path = %self.path.display(), error = %e, "No alert file");
                return Vec::new();
            }
        };
        match serde_json::from_str::<Vec<AlertRule>>(&text) {
            Ok(mut rules) => {
                for rule in &mut rules {
                    rule.code = SecurityCode::new(rule.code.as_str());
                }
                rules
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Ignoring corrupt alert file");
                Vec::new()
            }
        }
    }

    /// Replaces the stored rules.
    ///
    /// Writes a sibling temporary file and renames it over the target.
    pub fn save(&self, rules: &[AlertRule]) -> Result<()> {
        write_atomically(&self.path, rules)?;
        debug!(path = %self.path.display(), count = rules.len(), "Saved alerts");
        Ok(())
    }

    /// Adds a rule and returns it.
    pub fn add(&self, rule: AlertRule) -> Result<AlertRule> {
        let mut rules = self.load();
        rules.push(rule.clone());
        self.save(&rules)?;
        Ok(rule)
    }

    /// Changes the threshold and note of a rule. Returns false when no rule
    /// has `id`.
    pub fn update(&self, id: Uuid, threshold: f64, note: impl Into<String>) -> Result<bool> {
        let mut rules = self.load();
        let Some(rule) = rules.iter_mut().find(|r| r.id == id) else {
            return Ok(false);
        };
        rule.threshold = threshold;
        rule.note = note.into();
        self.save(&rules)?;
        Ok(true)
    }

    /// Deletes a rule. Returns false when no rule has `id`.
    pub fn remove(&self, id: Uuid) -> Result<bool> {
        let mut rules = self.load();
        let before = rules.len();
        rules.retain(|r| r.id != id);
        if rules.len() == before {
            return Ok(false);
        }
        self.save(&rules)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kessan_core::CanonicalUnit;

    fn code() -> SecurityCode {
        SecurityCode::new("7203")
    }

    fn latest(metric: Metric, yoy: Option<f64>) -> LatestPoint {
        LatestPoint {
            metric,
            fiscal_year: 2024,
            value: 45_095_325_000_000.0,
            unit: CanonicalUnit::Currency("JPY".to_string()),
            yoy,
        }
    }

    #[test]
    fn test_evaluate_rsi() {
        let rules = vec![
            AlertRule::new(code(), AlertKind::RsiBelow, 40.0),
            AlertRule::new(code(), AlertKind::RsiAbove, 70.0),
            AlertRule::new(SecurityCode::new("6758"), AlertKind::RsiBelow, 40.0),
            AlertRule::new(code(), AlertKind::YoyBelow { metric: Metric::Revenue }, 0.0),
        ];
        let day = NaiveDate::from_ymd_opt(2024, 5, 8);

        let matches = evaluate_rsi(&rules, &code(), 35.2, day);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].rule_id, rules[0].id);
        assert_eq!(matches[0].date, day);

        assert_eq!(evaluate_rsi(&rules, &code(), 40.0, day).len(), 1);
        assert_eq!(evaluate_rsi(&rules, &code(), 55.0, day).len(), 0);
        assert_eq!(evaluate_rsi(&rules, &code(), 71.0, day)[0].kind, AlertKind::RsiAbove);
        assert!(evaluate_rsi(&rules, &code(), f64::NAN, day).is_empty());
    }

    #[test]
    fn test_evaluate_metrics() {
        let rules = vec![
            AlertRule::new(code(), AlertKind::YoyBelow { metric: Metric::NetIncome }, -0.1),
            AlertRule::new(code(), AlertKind::YoyAbove { metric: Metric::Revenue }, 0.2),
            AlertRule::new(code(), AlertKind::YoyAbove { metric: Metric::OperatingIncome }, 0.0),
            AlertRule::new(code(), AlertKind::RsiBelow, 40.0),
        ];
        let points = vec![
            latest(Metric::Revenue, Some(0.214)),
            latest(Metric::NetIncome, Some(-0.05)),
            latest(Metric::OperatingIncome, None),
        ];

        let matches = evaluate_metrics(&rules, &code(), &points);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].kind, AlertKind::YoyAbove { metric: Metric::Revenue });
        assert_eq!(matches[0].fiscal_year, Some(2024));
        assert!((matches[0].value - 0.214).abs() < 1e-12);
    }

    #[test]
    fn test_format_single_day() {
        let day = NaiveDate::from_ymd_opt(2024, 5, 8);
        let rules = vec![AlertRule::new(code(), AlertKind::RsiBelow, 40.0)];
        let matches = evaluate_rsi(&rules, &code(), 35.24, day);

        assert_eq!(
            format_alert_message(&matches),
            "アラート (2024-05-08)\n7203 RSI 35.2 (<= 40.0)"
        );
    }

    #[test]
    fn test_format_mixed() {
        let rsi_rules = vec![
            AlertRule::new(code(), AlertKind::RsiBelow, 40.0),
            AlertRule::new(SecurityCode::new("6758"), AlertKind::RsiBelow, 30.0),
        ];
        let mut matches = evaluate_rsi(&rsi_rules, &code(), 35.0, NaiveDate::from_ymd_opt(2024, 5, 8));
        matches.extend(evaluate_rsi(
            &rsi_rules,
            &SecurityCode::new("6758"),
            25.0,
            NaiveDate::from_ymd_opt(2024, 5, 9),
        ));
        let yoy_rules = vec![AlertRule::new(
            code(),
            AlertKind::YoyAbove { metric: Metric::Revenue },
            0.2,
        )];
        matches.extend(evaluate_metrics(
            &yoy_rules,
            &code(),
            &[latest(Metric::Revenue, Some(0.214))],
        ));

        let message = format_alert_message(&matches);
        let lines: Vec<&str> = message.lines().collect();
        assert_eq!(lines[0], "アラート");
        assert_eq!(lines[1], "7203 RSI 35.0 (<= 40.0) on 2024-05-08");
        assert_eq!(lines[2], "6758 RSI 25.0 (<= 30.0) on 2024-05-09");
        assert_eq!(lines[3], "7203 revenue YoY 21.4% (>= 20.0%) FY2024");
        assert_eq!(format_alert_message(&[]), "");
    }

    #[test]
    fn test_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = AlertStore::new(dir.path().join("nested").join("alerts.json"));
        assert!(store.load().is_empty());

        let rule = store
            .add(AlertRule::new(code(), AlertKind::RsiBelow, 40.0).with_note("押し目"))
            .unwrap();
        let other = store
            .add(AlertRule::new(
                SecurityCode::new("6758"),
                AlertKind::YoyBelow { metric: Metric::OperatingIncome },
                -0.1,
            ))
            .unwrap();

        let rules = store.load();
        assert_eq!(rules, vec![rule.clone(), other.clone()]);

        assert!(store.update(rule.id, 35.0, "").unwrap());
        assert_eq!(store.load()[0].threshold, 35.0);

        assert!(store.remove(other.id).unwrap());
        assert!(!store.remove(other.id).unwrap());
        assert_eq!(store.load().len(), 1);
        assert!(!dir.path().join("nested").join("alerts.json.tmp").exists());
    }

    #[test]
    fn test_store_reads_legacy_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alerts.json");
        fs::write(
            &path,
            r#"[{ "id": "0b6c3c36-5d0e-4a57-9c7e-2f7f5b0f9d11", "ticker": "7203.T",
                  "type": "RSI", "threshold": 40.0, "note": "" }]"#,
        )
        .unwrap();

        let rules = AlertStore::new(&path).load();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].code, code());
        assert_eq!(rules[0].kind, AlertKind::RsiBelow);
    }

    #[test]
    fn test_store_corrupt_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alerts.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(AlertStore::new(path).load().is_empty());
    }
}
