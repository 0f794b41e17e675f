//! Fact extraction from XBRL instance and inline XBRL documents.
//!
//! One pass over the element tree collects contexts, units, the DEI flags and
//! every fact whose element id appears in the [`ConceptMap`]. Contexts are
//! parsed here but resolved later by the [`ContextResolver`](crate::ContextResolver).

use chrono::NaiveDate;
use kessan_core::{
    AccountingStandard, ContextDefinition, ExplicitMember, FactEntry, PipelineError,
    PipelineWarning, Period, WarningKind,
};
use roxmltree::{Document, Node, ParsingOptions};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::concept_map::ConceptMap;

const XBRLI_NS: &str = "http://www.xbrl.org/2003/instance";
const XBRLDI_NS: &str = "http://xbrl.org/2006/xbrldi";
const XSI_NS: &str = "http://www.w3.org/2001/XMLSchema-instance";

const DEI_ACCOUNTING_STANDARD: &str = "AccountingStandardsDEI";
const DEI_CONSOLIDATED: &str = "WhetherConsolidatedFinancialStatementsArePreparedDEI";

/// Everything the extractor read from one document.
#[derive(Clone, Debug, Default)]
pub struct ExtractedDocument {
    /// Facts for mapped elements, in document order.
    pub facts: Vec<FactEntry>,
    /// Context definitions keyed by id.
    pub contexts: HashMap<String, ContextDefinition>,
    /// Unit measures keyed by unit id.
    pub units: HashMap<String, String>,
    /// Standard declared by `jpdei_cor:AccountingStandardsDEI`.
    pub accounting_standard: Option<AccountingStandard>,
    /// Value of `jpdei_cor:WhetherConsolidatedFinancialStatementsArePreparedDEI`.
    pub consolidated_prepared: Option<bool>,
    /// Skipped fact nodes.
    pub warnings: Vec<PipelineWarning>,
}

/// Extracts mapped facts from raw document bytes.
#[derive(Clone, Debug)]
pub struct FactExtractor {
    concepts: Arc<ConceptMap>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum DocumentKind {
    Instance,
    Inline,
}

impl FactExtractor {
    /// Creates an extractor over a shared concept map.
    #[must_use]
    pub const fn new(concepts: Arc<ConceptMap>) -> Self {
        Self { concepts }
    }

    /// The concept map in use.
    #[must_use]
    pub fn concepts(&self) -> &ConceptMap {
        &self.concepts
    }

    /// Parses one document.
    ///
    /// Fails only when the bytes are not a well-formed XBRL instance or inline
    /// XBRL document. Unreadable fact nodes become warnings.
    pub fn extract(
        &self,
        document_id: &str,
        bytes: &[u8],
    ) -> Result<ExtractedDocument, PipelineError> {
        let unparsable = |reason: String| PipelineError::UnparsableDocument {
            document_id: document_id.to_string(),
            reason,
        };

        let text = std::str::from_utf8(bytes).map_err(|e| unparsable(e.to_string()))?;
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);
        let options = ParsingOptions {
            allow_dtd: true,
            ..ParsingOptions::default()
        };
        let doc = Document::parse_with_options(text, options)
            .map_err(|e| unparsable(e.to_string()))?;

        let root = doc.root_element();
        let kind = match (root.tag_name().name(), root.tag_name().namespace()) {
            ("xbrl", Some(XBRLI_NS)) => DocumentKind::Instance,
            ("html", _) => DocumentKind::Inline,
            (name, _) => return Err(unparsable(format!("unexpected root element <{}>", name))),
        };

        let mut out = ExtractedDocument::default();

        for node in root.descendants().filter(Node::is_element) {
            let tag = node.tag_name();
            if tag.namespace() == Some(XBRLI_NS) {
                match tag.name() {
                    "context" => {
                        if let Some(ctx) = parse_context(node) {
                            out.contexts.insert(ctx.id.clone(), ctx);
                        }
                    }
                    "unit" => {
                        if let Some((id, measure)) = parse_unit(node) {
                            out.units.insert(id, measure);
                        }
                    }
                    _ => {}
                }
                continue;
            }

            let Some(name) = fact_name(node, kind) else {
                continue;
            };

            if name.ends_with(DEI_ACCOUNTING_STANDARD) {
                out.accounting_standard = AccountingStandard::from_dei(&text_of(node));
                continue;
            }
            if name.ends_with(DEI_CONSOLIDATED) {
                out.consolidated_prepared = parse_bool(&text_of(node));
                continue;
            }

            let Some(hit) = self.concepts.lookup(&name) else {
                continue;
            };

            match read_fact(node, kind) {
                Ok(raw) => out.facts.push(FactEntry {
                    metric: hit.metric,
                    element: name,
                    rank: hit.rank,
                    standard: hit.standard,
                    value: raw.value,
                    unit: raw.unit_ref,
                    context_ref: raw.context_ref,
                    scale: raw.scale,
                    decimals: raw.decimals,
                }),
                Err(reason) => out.warnings.push(
                    PipelineWarning::new(WarningKind::SkippedFact {
                        element: name,
                        reason,
                    })
                    .with_document(document_id)
                    .with_metric(hit.metric),
                ),
            }
        }

        // Unit refs resolve once every unit has been seen; units may follow facts.
        for fact in &mut out.facts {
            if let Some(measure) = out.units.get(&fact.unit) {
                fact.unit = measure.clone();
            }
        }

        debug!(
            document_id,
            facts = out.facts.len(),
            contexts = out.contexts.len(),
            skipped = out.warnings.len(),
            "Extracted document"
        );

        Ok(out)
    }
}

struct RawFact {
    value: f64,
    unit_ref: String,
    context_ref: String,
    scale: i32,
    decimals: Option<i32>,
}

/// Qualified `prefix:local` name of a fact node, or `None` for structural nodes.
fn fact_name(node: Node<'_, '_>, kind: DocumentKind) -> Option<String> {
    let tag = node.tag_name();
    if kind == DocumentKind::Inline {
        return match tag.name() {
            "nonFraction" | "nonNumeric" => node.attribute("name").map(str::to_string),
            _ => None,
        };
    }
    let ns = tag.namespace()?;
    let prefix = node.lookup_prefix(ns)?;
    Some(format!("{}:{}", prefix, tag.name()))
}

fn read_fact(node: Node<'_, '_>, kind: DocumentKind) -> Result<RawFact, String> {
    if kind == DocumentKind::Inline && node.tag_name().name() != "nonFraction" {
        return Err("non-numeric fact".to_string());
    }
    if matches!(node.attribute((XSI_NS, "nil")), Some("true" | "1")) {
        return Err("nil fact".to_string());
    }
    let context_ref = node
        .attribute("contextRef")
        .ok_or_else(|| "missing contextRef".to_string())?
        .to_string();
    let unit_ref = node.attribute("unitRef").unwrap_or_default().to_string();

    let scale = match node.attribute("scale") {
        Some(s) => s
            .trim()
            .parse::<i32>()
            .map_err(|_| format!("invalid scale {}", s))?,
        None => 0,
    };
    let decimals = node
        .attribute("decimals")
        .and_then(|d| d.trim().parse::<i32>().ok());

    let raw = text_of(node);
    let zero_format = node
        .attribute("format")
        .is_some_and(|f| f.ends_with("fixed-zero") || f.ends_with("zerodash"));
    let mut value = if zero_format {
        0.0
    } else {
        parse_number(&raw).ok_or_else(|| format!("unparsable value {:?}", raw))?
    };
    if node.attribute("sign") == Some("-") {
        value = -value;
    }

    Ok(RawFact {
        value,
        unit_ref,
        context_ref,
        scale,
        decimals,
    })
}

fn parse_number(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ',')
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}

fn text_of(node: Node<'_, '_>) -> String {
    node.descendants()
        .filter(Node::is_text)
        .filter_map(|n| n.text())
        .collect::<String>()
        .trim()
        .to_string()
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw.get(..10).unwrap_or(raw), "%Y-%m-%d").ok()
}

fn xbrli_child<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.descendants()
        .find(|n| n.tag_name().namespace() == Some(XBRLI_NS) && n.tag_name().name() == name)
}

fn parse_context(node: Node<'_, '_>) -> Option<ContextDefinition> {
    let id = node.attribute("id")?.to_string();
    let period_node = xbrli_child(node, "period")?;

    let period = if let Some(instant) = xbrli_child(period_node, "instant") {
        Period::Instant(parse_date(&text_of(instant))?)
    } else {
        let start = parse_date(&text_of(xbrli_child(period_node, "startDate")?))?;
        let end = parse_date(&text_of(xbrli_child(period_node, "endDate")?))?;
        Period::Duration { start, end }
    };

    let dimensions = node
        .descendants()
        .filter(|n| n.tag_name().namespace() == Some(XBRLDI_NS))
        .filter_map(|n| {
            let dimension = n.attribute("dimension")?.to_string();
            let member = match n.tag_name().name() {
                "explicitMember" => text_of(n),
                "typedMember" => format!("typed:{}", text_of(n)),
                _ => return None,
            };
            Some(ExplicitMember { dimension, member })
        })
        .collect();

    Some(ContextDefinition {
        id,
        period,
        dimensions,
    })
}

fn parse_unit(node: Node<'_, '_>) -> Option<(String, String)> {
    let id = node.attribute("id")?.to_string();

    let measure = if let Some(divide) = xbrli_child(node, "divide") {
        let numerator = measure_in(xbrli_child(divide, "unitNumerator")?)?;
        let denominator = measure_in(xbrli_child(divide, "unitDenominator")?)?;
        format!("{}/{}", numerator, denominator)
    } else {
        measure_in(node)?
    };

    Some((id, measure))
}

fn measure_in(parent: Node<'_, '_>) -> Option<String> {
    xbrli_child(parent, "measure").map(text_of)
}
