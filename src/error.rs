//! Error types for the filing ingestion pipeline.
//!
//! `IngestError` is the closed set of failure modes the pipeline can produce. Every
//! fallible operation in this crate returns `Result<T, IngestError>`. Errors carry
//! enough context (URLs, previews, counts) to diagnose a failed filing without
//! re-fetching it, since filings are discarded once processing for them ends.
//!
//! The orchestrator and supervisor classify these into "fatal" (`ConfigError`, and
//! propagating panics) versus per-filing/per-ticker failures that are caught, logged,
//! and recorded in an `Outcome` rather than aborting a run.

use thiserror::Error;

/// Comprehensive error type for all ingestion operations.
#[derive(Error, Debug)]
pub enum IngestError {
    /// Missing contact email, missing sink credentials, or an otherwise unusable
    /// configuration. Fatal: the supervisor aborts before any fetch is attempted.
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// CIK could not be resolved, a filing list came back empty, or a referenced
    /// document is missing from a filing's directory. Non-fatal, recorded per filing.
    #[error("not found")]
    NotFound,

    /// Repeated HTTP 429 responses survived every retry.
    #[error("rate limited after exhausting retries")]
    RateLimited,

    /// Network failure, or an HTTP status the fetcher does not retry.
    #[error("fetch failed: {0}")]
    FetchError(String),

    /// Every parsing strategy in the format detector's fallback list failed.
    #[error("parse error: {0}")]
    ParseError(String),

    /// The serializer produced no output, or the sink refused the write. The
    /// write-then-rename commit is skipped so no partial artifact is visible.
    #[error("serialize error: {0}")]
    SerializeError(String),

    /// Fiscal-period attribution could not be made with full confidence. A warning,
    /// not a failure: the pipeline continues with the best-effort attribution.
    #[error("fiscal attribution ambiguous: {0}")]
    FiscalAmbiguous(String),

    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("file error: {0}")]
    FileError(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("XML parsing error: {0}")]
    XmlError(#[from] quick_xml::Error),
}

pub type Result<T> = std::result::Result<T, IngestError>;
