//! Core error types for osmsync
//!
//! This module provides the value-level errors shared by the object model and
//! the turtle line parser. The engine crate wraps these in its own error type.

/// Core error type for model and turtle-level operations
#[derive(Debug, Clone, thiserror::Error)]
pub enum CoreError {
    /// An IRI whose trailing segment does not parse to a positive OSM id
    #[error("Bad identifier in '{0}': expected a positive integer suffix")]
    BadIdentifier(String),

    /// A turtle line that does not split into subject, predicate and object
    #[error("Malformed triple line: '{0}'")]
    MalformedTriple(String),

    /// A WKT literal that does not contain a POINT
    #[error("No WKT point found in '{0}'")]
    InvalidWkt(String),
}

/// Result type alias using CoreError
pub type CoreResult<T> = Result<T, CoreError>;
