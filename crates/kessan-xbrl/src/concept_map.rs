//! Taxonomy concept map.
//!
//! Maps each canonical [`Metric`] to the ordered list of taxonomy elements that
//! may carry it across Japanese GAAP, IFRS and US GAAP filings. The map is
//! plain JSON so it can be edited without rebuilding:
//!
//! ```json
//! {
//!   "revenue": {
//!     "unit": "currency",
//!     "candidates": [
//!       { "element": "jppfs_cor:NetSales", "standard": "jgaap" },
//!       "ifrs-full:Revenue"
//!     ]
//!   }
//! }
//! ```
//!
//! Earlier candidates are preferred. Keys outside the canonical metric set are
//! rejected when the map is loaded.

use kessan_core::{AccountingStandard, Metric, PipelineError, UnitKind};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

const BUILTIN_MAP: &str = include_str!("../data/concept_map.json");

/// One taxonomy element that may represent a metric.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Candidate {
    /// Element id in `prefix:LocalName` form.
    pub element: String,
    /// Accounting standard the element belongs to, if tagged.
    pub standard: Option<AccountingStandard>,
}

/// Result of a reverse lookup.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConceptMatch {
    /// Metric the element maps to.
    pub metric: Metric,
    /// Position in the metric's candidate list.
    pub rank: usize,
    /// Standard the candidate is tagged with.
    pub standard: Option<AccountingStandard>,
}

#[derive(Clone, Debug)]
struct MetricConcepts {
    unit: UnitKind,
    candidates: Vec<Candidate>,
}

/// Immutable mapping from canonical metrics to taxonomy elements.
#[derive(Clone, Debug)]
pub struct ConceptMap {
    metrics: BTreeMap<Metric, MetricConcepts>,
    index: HashMap<String, ConceptMatch>,
}

#[derive(Deserialize)]
struct RawEntry {
    #[serde(default = "default_unit")]
    unit: UnitKind,
    candidates: Vec<RawCandidate>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawCandidate {
    Bare(String),
    Tagged {
        element: String,
        #[serde(default)]
        standard: Option<AccountingStandard>,
    },
}

const fn default_unit() -> UnitKind {
    UnitKind::Currency
}

impl ConceptMap {
    /// The map bundled with the crate.
    #[must_use]
    pub fn builtin() -> Self {
        Self::from_json(BUILTIN_MAP).expect("bundled concept map is valid")
    }

    /// Parses a map from JSON text.
    pub fn from_json(json: &str) -> Result<Self, PipelineError> {
        let raw: BTreeMap<String, RawEntry> =
            serde_json::from_str(json).map_err(|e| PipelineError::InvalidConcept(e.to_string()))?;

        let mut metrics = BTreeMap::new();
        let mut index = HashMap::new();

        for (name, entry) in raw {
            let metric: Metric = name.parse()?;
            let candidates: Vec<Candidate> = entry
                .candidates
                .into_iter()
                .map(|c| match c {
                    RawCandidate::Bare(element) => Candidate {
                        element,
                        standard: None,
                    },
                    RawCandidate::Tagged { element, standard } => Candidate { element, standard },
                })
                .collect();

            for (rank, candidate) in candidates.iter().enumerate() {
                if !candidate.element.contains(':') {
                    return Err(PipelineError::InvalidConcept(format!(
                        "element {} has no namespace prefix",
                        candidate.element
                    )));
                }
                let matched = ConceptMatch {
                    metric,
                    rank,
                    standard: candidate.standard,
                };
                if let Some(existing) = index.insert(candidate.element.clone(), matched) {
                    return Err(PipelineError::InvalidConcept(format!(
                        "element {} listed for both {} and {}",
                        candidate.element, existing.metric, metric
                    )));
                }
            }

            metrics.insert(
                metric,
                MetricConcepts {
                    unit: entry.unit,
                    candidates,
                },
            );
        }

        Ok(Self { metrics, index })
    }

    /// Loads a map from a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, PipelineError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| PipelineError::InvalidConcept(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&text)
    }

    /// Ordered candidate elements for a canonical metric name.
    pub fn candidates(&self, name: &str) -> Result<&[Candidate], PipelineError> {
        let metric: Metric = name.parse()?;
        Ok(self
            .metrics
            .get(&metric)
            .map(|m| m.candidates.as_slice())
            .unwrap_or_default())
    }

    /// Reverse lookup of a qualified element id.
    #[must_use]
    pub fn lookup(&self, element: &str) -> Option<ConceptMatch> {
        self.index.get(element).copied()
    }

    /// Unit class a metric must be reported in.
    #[must_use]
    pub fn expected_unit(&self, metric: Metric) -> UnitKind {
        self.metrics
            .get(&metric)
            .map_or(UnitKind::Currency, |m| m.unit)
    }

    /// Number of mapped elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Returns true if no element is mapped.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}

impl Default for ConceptMap {
    fn default() -> Self {
        Self::builtin()
    }
}
