//! Error types for data and pipeline operations.
//!
//! [`DataError`] covers everything that can go wrong while fetching, caching or
//! decoding provider responses. [`PipelineError`] covers the XBRL pipeline
//! stages; most of its variants are caught at the smallest scope and turned
//! into [`PipelineWarning`](crate::PipelineWarning)s rather than propagated.

use thiserror::Error;

/// Errors raised by the XBRL extraction and normalization stages.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    /// A metric name outside the fixed canonical set was requested.
    #[error("Unknown metric: {0}")]
    UnknownMetric(String),

    /// The document is not well-formed XBRL. Fatal for that document only.
    #[error("Unparsable document {document_id}: {reason}")]
    UnparsableDocument {
        /// Identifier of the offending document.
        document_id: String,
        /// Parser message.
        reason: String,
    },

    /// A fact references a context that the document does not define.
    #[error("Unresolvable context: {context_ref}")]
    UnresolvableContext {
        /// The missing context id.
        context_ref: String,
    },

    /// A fact's unit cannot be mapped to the unit class its metric expects.
    #[error("Incompatible unit {unit} for {metric}: {reason}")]
    IncompatibleUnit {
        /// Canonical metric name.
        metric: String,
        /// Raw unit identifier as found in the document.
        unit: String,
        /// Why the unit was rejected.
        reason: String,
    },

    /// A concept map could not be loaded.
    #[error("Invalid concept map: {0}")]
    InvalidConcept(String),

    /// No usable document was available for the security.
    #[error("No data available for {0}")]
    NoDataAvailable(String),
}

/// Errors that can occur during data operations.
#[derive(Error, Debug)]
pub enum DataError {
    /// Network-related errors (connection failures, timeouts, etc.).
    #[error("Network error: {0}")]
    Network(String),

    /// Rate limit exceeded by a provider.
    #[error("Rate limited by {provider}: retry after {retry_after:?}")]
    RateLimited {
        /// The provider that rate limited the request.
        provider: String,
        /// Suggested time to wait before retrying.
        retry_after: Option<std::time::Duration>,
    },

    /// The requested security code was not found.
    #[error("Symbol not found: {0}")]
    SymbolNotFound(String),

    /// Data is not available for the requested code and date range.
    #[error("Data not available for {symbol} in range {start} to {end}")]
    DataNotAvailable {
        /// The security code that was requested.
        symbol: String,
        /// Start of the requested date range.
        start: String,
        /// End of the requested date range.
        end: String,
    },

    /// Error parsing data from a provider.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Error interacting with the cache.
    #[error("Cache error: {0}")]
    Cache(String),

    /// The requested provider is not configured.
    #[error("Provider not configured: {0}")]
    ProviderNotConfigured(String),

    /// An invalid parameter was provided.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// The requested feature is not supported.
    #[error("Feature not supported: {0}")]
    NotSupported(String),

    /// Local file-system failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A pipeline failure that escaped to the caller.
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    /// Any other error.
    #[error("{0}")]
    Other(String),
}

/// Result type alias using [`DataError`].
pub type Result<T> = std::result::Result<T, DataError>;
