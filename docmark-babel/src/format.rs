//! Format trait definition
//!
//! This module defines the core Format trait that both document formats implement. Each format
//! knows how to turn its own source into its counterpart: markup becomes a word-processor
//! package, a package becomes markup.

use crate::collaborators::Environment;
use crate::error::{FormatError, Warning};

/// Serialized output produced by a [`Format`] implementation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SerializedDocument {
    /// UTF-8 text output (markup)
    Text(String),
    /// Binary output (zip package)
    Binary(Vec<u8>),
}

impl SerializedDocument {
    /// Consume the serialized output and return the underlying bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            SerializedDocument::Text(text) => text.into_bytes(),
            SerializedDocument::Binary(bytes) => bytes,
        }
    }
}

/// Result of converting one document.
#[derive(Debug, Clone)]
pub struct Conversion {
    pub output: SerializedDocument,
    pub warnings: Vec<Warning>,
}

/// Trait for document formats
///
/// Implementors convert documents in their own representation into the format named by
/// [`Format::target`]. Formats hold no state; everything a conversion needs arrives through the
/// [`Environment`].
///
/// # Examples
///
/// ```ignore
/// let format = MarkdownFormat;
/// let mut env = Environment::default();
/// let conversion = format.convert(b"# Title", &mut env)?;
/// std::fs::write("out.docx", conversion.output.into_bytes())?;
/// ```
pub trait Format: Send + Sync {
    /// The name of this format (e.g., "markdown", "docx")
    fn name(&self) -> &str;

    /// Optional description of this format
    fn description(&self) -> &str {
        ""
    }

    /// File extensions associated with this format (e.g., ["md", "markdown"])
    ///
    /// Returns a slice of file extensions without the leading dot.
    /// Used for automatic format detection from filenames.
    fn file_extensions(&self) -> &[&str] {
        &[]
    }

    /// Name of the format this one converts into
    fn target(&self) -> &str;

    /// Convert source bytes into the target format
    fn convert(&self, source: &[u8], env: &mut Environment<'_>) -> Result<Conversion, FormatError>;
}
