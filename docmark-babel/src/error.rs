//! Error and warning types for conversion operations
//!
//! Errors abort a conversion. Warnings describe recoverable degradations (an unresolved citation
//! key, an equation that could not be converted, a damaged optional part) and travel alongside
//! the successful result.

use std::fmt;

/// Errors that can occur during format operations
#[derive(Debug, Clone, PartialEq)]
pub enum FormatError {
    /// Format not found in registry
    FormatNotFound(String),
    /// Error during parsing
    ParseError(String),
    /// Error during serialization
    SerializationError(String),
    /// Format does not support the requested operation
    NotSupported(String),
    /// A part the conversion cannot proceed without is absent from the package
    MissingPart(String),
    /// The input is not a readable zip archive
    Archive(String),
}

impl fmt::Display for FormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormatError::FormatNotFound(name) => write!(f, "Format '{name}' not found"),
            FormatError::ParseError(msg) => write!(f, "Parse error: {msg}"),
            FormatError::SerializationError(msg) => write!(f, "Serialization error: {msg}"),
            FormatError::NotSupported(msg) => write!(f, "Operation not supported: {msg}"),
            FormatError::MissingPart(part) => write!(f, "Required part '{part}' is missing"),
            FormatError::Archive(msg) => write!(f, "Archive error: {msg}"),
        }
    }
}

impl std::error::Error for FormatError {}

impl From<zip::result::ZipError> for FormatError {
    fn from(err: zip::result::ZipError) -> Self {
        FormatError::Archive(err.to_string())
    }
}

impl From<std::io::Error> for FormatError {
    fn from(err: std::io::Error) -> Self {
        FormatError::SerializationError(err.to_string())
    }
}

/// Recoverable problems found while converting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    /// A citation key has no bibliography entry and was written as literal text
    UnresolvedCitation { key: String },
    /// An equation could not be converted and a placeholder was used
    MathConversion { source: String, reason: String },
    /// The citation engine failed and the fallback renderer was used
    CitationEngine { reason: String },
    /// A comment range has no body anywhere in the document
    MissingCommentBody { id: String },
    /// An optional package part is absent or unreadable and was skipped
    PartUnavailable { part: String, reason: String },
    /// A field instruction could not be interpreted
    MalformedField { instruction: String, reason: String },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::UnresolvedCitation { key } => {
                write!(f, "citation key '@{key}' not found in bibliography")
            }
            Warning::MathConversion { source, reason } => {
                write!(f, "could not convert equation '{source}': {reason}")
            }
            Warning::CitationEngine { reason } => {
                write!(f, "citation engine failed, using fallback rendering: {reason}")
            }
            Warning::MissingCommentBody { id } => {
                write!(f, "comment '{id}' has a range but no body")
            }
            Warning::PartUnavailable { part, reason } => {
                write!(f, "part '{part}' skipped: {reason}")
            }
            Warning::MalformedField {
                instruction,
                reason,
            } => write!(f, "field '{instruction}' ignored: {reason}"),
        }
    }
}

/// Append a warning to `warnings`, logging it as it is recorded.
pub(crate) fn record(warnings: &mut Vec<Warning>, warning: Warning) {
    tracing::warn!("{warning}");
    warnings.push(warning);
}
