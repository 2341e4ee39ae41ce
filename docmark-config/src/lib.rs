//! Shared configuration loader for the docmark toolchain.
//!
//! `defaults/docmark.default.toml` is embedded into every binary so that docs and
//! runtime behavior stay in sync. Applications layer user-specific files on top
//! of those defaults via [`Loader`] before deserializing into [`DocmarkConfig`].

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, File, FileFormat, ValueKind};
use docmark_babel::options::{is_highlight_color, ConvertOptions};
use serde::Deserialize;
use std::path::Path;

const DEFAULT_TOML: &str = include_str!("../defaults/docmark.default.toml");

/// Top-level configuration consumed by docmark applications.
#[derive(Debug, Clone, Deserialize)]
pub struct DocmarkConfig {
    pub markdown: MarkdownConfig,
    pub docx: DocxConfig,
    pub comments: CommentsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MarkdownConfig {
    pub highlight_color: String,
}

/// Knobs for the generated Word package.
#[derive(Debug, Clone, Deserialize)]
pub struct DocxConfig {
    pub revision_author: String,
    pub sources_heading: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommentsConfig {
    pub force_identifiers: bool,
}

impl From<&DocmarkConfig> for ConvertOptions {
    fn from(config: &DocmarkConfig) -> Self {
        ConvertOptions {
            highlight_color: config.markdown.highlight_color.clone(),
            revision_author: config.docx.revision_author.clone(),
            sources_heading: config.docx.sources_heading.clone(),
            force_comment_ids: config.comments.force_identifiers,
        }
    }
}

impl From<DocmarkConfig> for ConvertOptions {
    fn from(config: DocmarkConfig) -> Self {
        ConvertOptions::from(&config)
    }
}

/// Helper for layering user overrides over the built-in defaults.
#[derive(Debug, Clone)]
pub struct Loader {
    builder: ConfigBuilder<DefaultState>,
}

impl Loader {
    /// Start a loader seeded with the embedded defaults.
    pub fn new() -> Self {
        let builder = Config::builder().add_source(File::from_str(DEFAULT_TOML, FileFormat::Toml));
        Self { builder }
    }

    /// Layer a configuration file. Missing files trigger an error.
    pub fn with_file(mut self, path: impl AsRef<Path>) -> Self {
        let source = File::from(path.as_ref())
            .format(FileFormat::Toml)
            .required(true);
        self.builder = self.builder.add_source(source);
        self
    }

    /// Layer an optional configuration file (ignored if the file is absent).
    pub fn with_optional_file(mut self, path: impl AsRef<Path>) -> Self {
        let source = File::from(path.as_ref())
            .format(FileFormat::Toml)
            .required(false);
        self.builder = self.builder.add_source(source);
        self
    }

    /// Apply a single key/value override (useful for CLI settings).
    pub fn set_override<I>(mut self, key: &str, value: I) -> Result<Self, ConfigError>
    where
        I: Into<ValueKind>,
    {
        self.builder = self.builder.set_override(key, value)?;
        Ok(self)
    }

    /// Finalize the builder and deserialize the resulting configuration.
    ///
    /// Unknown highlight colors are rejected here rather than surfacing mid-conversion.
    pub fn build(self) -> Result<DocmarkConfig, ConfigError> {
        let config: DocmarkConfig = self.builder.build()?.try_deserialize()?;
        if !is_highlight_color(&config.markdown.highlight_color) {
            return Err(ConfigError::Message(format!(
                "markdown.highlight_color: unknown color '{}'",
                config.markdown.highlight_color
            )));
        }
        Ok(config)
    }
}

impl Default for Loader {
    fn default() -> Self {
        Self::new()
    }
}

/// Convenience helper for callers that only need the defaults.
pub fn load_defaults() -> Result<DocmarkConfig, ConfigError> {
    Loader::new().build()
}
