//! Error taxonomy for the change application engine
//!
//! The engine does not recover locally: every error terminates the run and is
//! surfaced to the caller with enough context (phase, id batch, query prefix)
//! to reproduce.

use osmsync_core::CoreError;

/// Engine error type
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The change document could not be parsed or has unexpected structure
    #[error("Malformed change file: {0}")]
    MalformedChangeFile(String),

    /// A gzip or bzip2 frame was invalid
    #[error("Decompression failed: {0}")]
    Decompression(String),

    /// The endpoint's XML or JSON response does not match the expected shape
    #[error("Malformed response from endpoint: {0}")]
    MalformedResponse(String),

    /// The endpoint returned a JSON envelope with `status=ERROR`
    #[error("SPARQL endpoint rejected the request: {0}")]
    EndpointRejected(String),

    /// Connection or timeout failure under the HTTP transport
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The endpoint returned more geometries than ids requested, which can
    /// only happen if duplicate geometries exist in the store
    #[error("Size mismatch: requested {expected} ids but endpoint returned {actual} results")]
    SizeMismatch { expected: usize, actual: usize },

    /// The external OSM→RDF converter exited non-zero
    #[error("Converter failed: {0}")]
    ConverterFailed(String),

    /// An internal set-disjointness assertion fired (a bug)
    #[error("Invariant violated: {0}")]
    InvariantViolated(String),

    /// Identifier or turtle-level failure from the core layer
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Filesystem failure on scratch files or the query log
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration value
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias using EngineError
pub type EngineResult<T> = Result<T, EngineError>;
