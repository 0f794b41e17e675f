//! End-to-end pipeline: documents in, [`MetricReport`] out.
//!
//! [`MetricPipeline::process_document`] handles one document and never fails;
//! everything that goes wrong becomes a warning on the returned
//! [`DocumentOutcome`]. [`MetricPipeline::build`] then feeds every usable
//! outcome to a single builder pass.

use kessan_core::{
    FilingMeta, MetricReport, NormalizedFact, PipelineError, PipelineWarning, SecurityCode,
    WarningKind,
};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::{
    concept_map::ConceptMap,
    context::{ContextResolver, ResolverConfig},
    extractor::FactExtractor,
    series::{BuildConfig, SeriesBuilder},
    units,
};

/// What one document contributed.
#[derive(Clone, Debug, PartialEq)]
pub struct DocumentOutcome {
    /// Source document id.
    pub document_id: String,
    /// Issuer of the document, when known.
    pub security_code: Option<SecurityCode>,
    /// False when the document could not be fetched or parsed.
    pub usable: bool,
    /// Normalized facts.
    pub facts: Vec<NormalizedFact>,
    /// Data-quality warnings.
    pub warnings: Vec<PipelineWarning>,
}

impl DocumentOutcome {
    /// Outcome for a document that could not be downloaded.
    #[must_use]
    pub fn fetch_failed(meta: &FilingMeta, reason: impl Into<String>) -> Self {
        Self {
            document_id: meta.document_id.clone(),
            security_code: meta.security_code.clone(),
            usable: false,
            facts: Vec::new(),
            warnings: vec![
                PipelineWarning::new(WarningKind::DocumentFetchFailed {
                    reason: reason.into(),
                })
                .with_document(meta.document_id.clone()),
            ],
        }
    }
}

/// Extract, resolve, normalize and build in one place.
#[derive(Clone, Debug)]
pub struct MetricPipeline {
    extractor: FactExtractor,
    resolver: ContextResolver,
    builder: SeriesBuilder,
}

impl MetricPipeline {
    /// Creates a pipeline with default resolver and builder settings.
    #[must_use]
    pub fn new(concepts: Arc<ConceptMap>) -> Self {
        Self {
            extractor: FactExtractor::new(concepts),
            resolver: ContextResolver::default(),
            builder: SeriesBuilder::default(),
        }
    }

    /// Replaces the resolver settings.
    #[must_use]
    pub fn with_resolver_config(mut self, config: ResolverConfig) -> Self {
        self.resolver = ContextResolver::new(config);
        self
    }

    /// Replaces the builder settings.
    #[must_use]
    pub fn with_build_config(mut self, config: BuildConfig) -> Self {
        self.builder = SeriesBuilder::new(config);
        self
    }

    /// Current resolver settings.
    #[must_use]
    pub const fn resolver_config(&self) -> &ResolverConfig {
        self.resolver.config()
    }

    /// The concept map in use.
    #[must_use]
    pub fn concepts(&self) -> &ConceptMap {
        self.extractor.concepts()
    }

    /// Processes one document.
    pub fn process_document(&self, meta: &FilingMeta, bytes: &[u8]) -> DocumentOutcome {
        let mut outcome = DocumentOutcome {
            document_id: meta.document_id.clone(),
            security_code: meta.security_code.clone(),
            usable: false,
            facts: Vec::new(),
            warnings: Vec::new(),
        };

        let document = match self.extractor.extract(&meta.document_id, bytes) {
            Ok(document) => document,
            Err(err) => {
                warn!(document_id = %meta.document_id, error = %err, "Dropping unparsable document");
                outcome.warnings.push(
                    PipelineWarning::new(WarningKind::from(err)).with_document(meta.document_id.clone()),
                );
                return outcome;
            }
        };

        outcome.usable = true;
        outcome.warnings.extend(document.warnings.iter().cloned());

        for fact in &document.facts {
            let attributed = |kind: WarningKind| {
                PipelineWarning::new(kind)
                    .with_document(meta.document_id.clone())
                    .with_metric(fact.metric)
            };

            let resolved = match self.resolver.resolve(fact, &document, meta) {
                Ok(Some(resolved)) => resolved,
                Ok(None) => continue,
                Err(err) => {
                    outcome.warnings.push(attributed(err.into()));
                    continue;
                }
            };

            let fiscal_year = resolved.fiscal_year;
            let expected = self.concepts().expected_unit(fact.metric);
            match units::normalize(resolved, expected) {
                Ok(normalized) => outcome.facts.push(normalized),
                Err(err) => {
                    warn!(
                        document_id = %meta.document_id,
                        metric = %fact.metric,
                        fiscal_year,
                        error = %err,
                        "Dropping fact"
                    );
                    outcome
                        .warnings
                        .push(attributed(err.into()).with_fiscal_year(fiscal_year));
                }
            }
        }

        debug!(
            document_id = %meta.document_id,
            facts = outcome.facts.len(),
            warnings = outcome.warnings.len(),
            "Processed document"
        );

        outcome
    }

    /// Builds the report from processed documents.
    ///
    /// Fails with [`PipelineError::NoDataAvailable`] only when no document was
    /// usable.
    pub fn build<I>(&self, outcomes: I) -> Result<MetricReport, PipelineError>
    where
        I: IntoIterator<Item = DocumentOutcome>,
    {
        let mut facts = Vec::new();
        let mut warnings = Vec::new();
        let mut documents_used = 0;
        let mut subject = None;

        for outcome in outcomes {
            if subject.is_none() {
                subject = outcome.security_code.clone();
            }
            if outcome.usable {
                documents_used += 1;
                facts.extend(outcome.facts);
            }
            warnings.extend(outcome.warnings);
        }

        if documents_used == 0 {
            let subject = subject.map_or_else(|| "requested documents".to_string(), |c| c.to_string());
            return Err(PipelineError::NoDataAvailable(subject));
        }

        let (series, build_warnings) = self.builder.build(&facts);
        warnings.extend(build_warnings);

        // Input order must not leak into the report.
        warnings.sort_by(|a, b| {
            (&a.document_id, a.metric, a.fiscal_year)
                .cmp(&(&b.document_id, b.metric, b.fiscal_year))
                .then_with(|| a.to_string().cmp(&b.to_string()))
        });

        Ok(MetricReport {
            series,
            warnings,
            documents_used,
        })
    }

    /// Processes and builds in one call.
    pub fn run<I, B>(&self, documents: I) -> Result<MetricReport, PipelineError>
    where
        I: IntoIterator<Item = (FilingMeta, B)>,
        B: AsRef<[u8]>,
    {
        let outcomes: Vec<DocumentOutcome> = documents
            .into_iter()
            .map(|(meta, bytes)| self.process_document(&meta, bytes.as_ref()))
            .collect();
        self.build(outcomes)
    }
}

impl Default for MetricPipeline {
    fn default() -> Self {
        Self::new(Arc::new(ConceptMap::builtin()))
    }
}
