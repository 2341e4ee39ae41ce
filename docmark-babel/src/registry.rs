//! Format registry for format discovery and selection
//!
//! This module provides a centralized registry for the available formats.
//! Formats can be registered and retrieved by name or detected from a filename.

use crate::collaborators::Environment;
use crate::error::FormatError;
use crate::format::{Conversion, Format};
use std::collections::HashMap;

/// Registry of document formats
///
/// # Examples
///
/// ```ignore
/// let registry = FormatRegistry::default();
/// let name = registry.detect_format_from_filename("paper.md").unwrap();
/// let conversion = registry.convert(source.as_bytes(), &name, &mut env)?;
/// ```
pub struct FormatRegistry {
    formats: HashMap<String, Box<dyn Format>>,
}

impl FormatRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        FormatRegistry {
            formats: HashMap::new(),
        }
    }

    /// Register a format
    ///
    /// If a format with the same name already exists, it will be replaced.
    pub fn register<F: Format + 'static>(&mut self, format: F) {
        self.formats
            .insert(format.name().to_string(), Box::new(format));
    }

    /// Get a format by name
    pub fn get(&self, name: &str) -> Result<&dyn Format, FormatError> {
        self.formats
            .get(name)
            .map(|f| f.as_ref())
            .ok_or_else(|| FormatError::FormatNotFound(name.to_string()))
    }

    /// Check if a format exists
    pub fn has(&self, name: &str) -> bool {
        self.formats.contains_key(name)
    }

    /// List all available format names (sorted)
    pub fn list_formats(&self) -> Vec<String> {
        let mut names: Vec<_> = self.formats.keys().cloned().collect();
        names.sort();
        names
    }

    /// Detect format from filename based on file extension
    ///
    /// Returns the format name if a matching extension is found, or None otherwise.
    pub fn detect_format_from_filename(&self, filename: &str) -> Option<String> {
        let extension = std::path::Path::new(filename)
            .extension()
            .and_then(|ext| ext.to_str())?;

        self.formats
            .values()
            .find(|format| format.file_extensions().contains(&extension))
            .map(|format| format.name().to_string())
    }

    /// Convert source bytes with the named format
    pub fn convert(
        &self,
        source: &[u8],
        format: &str,
        env: &mut Environment<'_>,
    ) -> Result<Conversion, FormatError> {
        let fmt = self.get(format)?;
        tracing::debug!(from = format, to = fmt.target(), "converting");
        fmt.convert(source, env)
    }

    /// Create a registry with default formats
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(crate::formats::markdown::MarkdownFormat);
        registry.register(crate::formats::docx::DocxFormat);
        registry
    }
}

impl Default for FormatRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::SerializedDocument;

    struct EchoFormat;
    impl Format for EchoFormat {
        fn name(&self) -> &str {
            "echo"
        }
        fn file_extensions(&self) -> &[&str] {
            &["echo"]
        }
        fn target(&self) -> &str {
            "echo"
        }
        fn convert(
            &self,
            source: &[u8],
            _env: &mut Environment<'_>,
        ) -> Result<Conversion, FormatError> {
            Ok(Conversion {
                output: SerializedDocument::Binary(source.to_vec()),
                warnings: Vec::new(),
            })
        }
    }

    #[test]
    fn test_registry_creation() {
        let registry = FormatRegistry::new();
        assert_eq!(registry.formats.len(), 0);
    }

    #[test]
    fn test_registry_register_and_replace() {
        let mut registry = FormatRegistry::new();
        registry.register(EchoFormat);
        registry.register(EchoFormat);

        assert!(registry.has("echo"));
        assert_eq!(registry.list_formats(), vec!["echo"]);
    }

    #[test]
    fn test_registry_get_nonexistent() {
        let registry = FormatRegistry::new();
        match registry.get("nonexistent") {
            Err(FormatError::FormatNotFound(name)) => assert_eq!(name, "nonexistent"),
            _ => panic!("Expected FormatNotFound error"),
        }
    }

    #[test]
    fn test_registry_convert() {
        let mut registry = FormatRegistry::new();
        registry.register(EchoFormat);

        let mut env = Environment::default();
        let conversion = registry.convert(b"abc", "echo", &mut env).unwrap();
        assert_eq!(conversion.output.into_bytes(), b"abc");
    }

    #[test]
    fn test_registry_with_defaults() {
        let registry = FormatRegistry::default();
        assert_eq!(registry.list_formats(), vec!["docx", "markdown"]);
        assert_eq!(registry.get("markdown").unwrap().target(), "docx");
        assert_eq!(registry.get("docx").unwrap().target(), "markdown");
    }

    #[test]
    fn test_detect_format_from_filename() {
        let registry = FormatRegistry::with_defaults();

        assert_eq!(
            registry.detect_format_from_filename("paper.md"),
            Some("markdown".to_string())
        );
        assert_eq!(
            registry.detect_format_from_filename("/path/to/paper.markdown"),
            Some("markdown".to_string())
        );
        assert_eq!(
            registry.detect_format_from_filename("review.docx"),
            Some("docx".to_string())
        );
        assert_eq!(registry.detect_format_from_filename("paper.pdf"), None);
        assert_eq!(registry.detect_format_from_filename("paper"), None);
    }
}
