//! Round-trip conversion between annotated Markdown and Word documents
//!
//!     This crate converts manuscripts written in Markdown, extended with review annotations
//!     (`{++ ++}`, `{-- --}`, `{~~ ~> ~~}`, `{== ==}`, `{>> <<}`), citation clusters (`[@key]`) and
//!     math (`$..$`), into `.docx` packages and back. Round-trip fidelity is the overriding goal:
//!     converting a document to Word and back yields the same markup, annotation scope included.
//!
//!     This is a pure lib, that is, it powers the docmark cli but is shell agnostic: no code here
//!     prints, reads env vars or touches files. Problems that do not abort a conversion are
//!     returned as [`Warning`]s next to the result (and logged through `tracing`).
//!
//! Architecture
//!
//!     Both directions go through an intermediate representation (./ir/mod.rs). The markup side
//!     produces and consumes the generation model (blocks of runs); the Word side is read into the
//!     extraction model (a flat stream of content items carrying their active comment sets).
//!     The format-agnostic algorithms live in ./common: the comment overlap resolver, the field
//!     instruction accumulator and the grid table preprocessor.
//!
//!     The file structure :
//!     .
//!     ├── error.rs                # FormatError and Warning
//!     ├── format.rs               # Format trait definition
//!     ├── registry.rs             # FormatRegistry for discovery and selection
//!     ├── options.rs              # ConvertOptions
//!     ├── collaborators.rs        # CitationEngine, MathConverter, Environment
//!     ├── bibliography.rs         # CSL-JSON entries and the fallback renderer
//!     ├── formats
//!     │   ├── markdown            # tokenizer, inline extensions, serializer
//!     │   └── docx                # generator, extractor, package and XML parts
//!     ├── ir                      # Intermediate Representation
//!     └── common                  # Shared algorithms
//!
//! Testing
//!     tests
//!     └── <area>
//!         └── <testname>.rs
//!
//!     Note that rust does not by default discover tests in subdirectories, so we need to include
//!     these in the mod.
//!
//! Core Algorithms
//!
//!     The hard part is comment scope. Word anchors comments with independent start and end
//!     markers that may nest or cross freely, while bracket markup (`{==text==}{>>c<<}`) can only
//!     express properly nested spans. On the way in, the overlap resolver picks bracket form when
//!     every span nests and falls back to identifier markers (`{#1}..{/1}{#1>>c<<}`) otherwise,
//!     renumbering IDs densely. On the way out, identifier markers and brackets share one dense ID
//!     space. See ./common/overlap.rs.
//!
//! Library Choices
//!
//!     The base Markdown grammar is comrak's; the extensions are pre-scanned and hidden behind
//!     placeholders. Word XML is read with roxmltree and written as strings; packages go through
//!     the zip crate. Citation payloads and bibliographies are CSL-JSON handled with serde.

pub mod bibliography;
pub mod collaborators;
pub mod common;
pub mod error;
pub mod format;
pub mod formats;
pub mod ir;
pub mod options;
pub mod registry;

pub use collaborators::{CitationEngine, Environment, LiteralMath, MathConverter};
pub use error::{FormatError, Warning};
pub use format::{Conversion, Format, SerializedDocument};
pub use options::ConvertOptions;
pub use registry::FormatRegistry;

/// A generated Word package.
#[derive(Debug, Clone)]
pub struct Generated {
    pub bytes: Vec<u8>,
    pub warnings: Vec<Warning>,
}

/// Markup extracted from a Word package.
#[derive(Debug, Clone)]
pub struct Extracted {
    pub markdown: String,
    pub warnings: Vec<Warning>,
}

/// Converts annotated markup into `.docx` bytes.
pub fn markdown_to_docx(source: &str, env: &mut Environment<'_>) -> Result<Generated, FormatError> {
    let blocks = formats::markdown::tokenize(source, &env.options);
    tracing::debug!(blocks = blocks.len(), "tokenized markup");
    let generation = formats::docx::generate(&blocks, env)?;
    Ok(Generated {
        bytes: generation.package.write()?,
        warnings: generation.warnings,
    })
}

/// Converts `.docx` bytes into annotated markup.
///
/// Fails only when the archive is unreadable or the main document part is missing or malformed;
/// damaged optional parts become warnings.
pub fn docx_to_markdown(bytes: &[u8], env: &mut Environment<'_>) -> Result<Extracted, FormatError> {
    let extraction = formats::docx::extract(bytes, env)?;
    tracing::debug!(blocks = extraction.blocks.len(), "extracted document");
    Ok(Extracted {
        markdown: formats::markdown::serialize(&extraction.blocks, &env.options),
        warnings: extraction.warnings,
    })
}
