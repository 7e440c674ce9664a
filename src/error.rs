//! Engine error taxonomy

use thiserror::Error;

/// Errors raised while resolving or rewriting query parameters.
#[derive(Debug, Error)]
pub enum ParameterError {
    /// A keyword directive comment was found but no keyword pattern family
    /// is configured. This is a workspace misconfiguration and is surfaced
    /// to the caller instead of being swallowed.
    #[error("keyword query parameter patterns are not defined in the settings")]
    KeywordQueryParametersNotDefined,

    /// A configured pattern did not compile as a regex.
    #[error("invalid query parameter pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Errors raised by the statement splitter.
#[derive(Debug, Error)]
pub enum SplitError {
    #[error("invalid statement separator pattern {pattern:?}: {source}")]
    InvalidSeparator {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Errors surfaced by the database session collaborator.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The server rejected a statement. Carries the error fields needed to
    /// map the failure back onto the source document.
    #[error("{}", .0.message)]
    Db(DbErrorInfo),

    /// Connection-level failure (connect, socket, pool exhaustion).
    #[error("database connection error: {0}")]
    Connection(String),
}

/// Database error fields relevant for diagnostics.
#[derive(Debug, Clone)]
pub struct DbErrorInfo {
    pub message: String,
    /// 1-based character position inside the executed statement, when the
    /// server reported one.
    pub position: Option<usize>,
    pub code: Option<String>,
}
