//! Word (OOXML) format implementation
//!
//! This module reads and writes `.docx` packages. Only the parts the conversion needs are
//! produced: the main document, styles, numbering (when lists occur), comments (when comments
//! occur) and the relationships tying them together.
//!
//! # Element Mapping Table
//!
//! | Markup                  | Word                                              |
//! |-------------------------|---------------------------------------------------|
//! | `#` .. `######`         | Paragraph style `Heading1` .. `Heading6`          |
//! | `-` / `1.` list items   | `w:numPr` against numbering IDs 1 (bullet) / 2    |
//! | `>` quotes              | `Quote` style, left indent 720 twips per level    |
//! | fenced code             | `SourceCode` paragraphs, one per line             |
//! | `` `code` ``            | `VerbatimChar` character style                    |
//! | `[text](url)`           | `w:hyperlink` with an external relationship       |
//! | `{++ ++}` / `{-- --}`   | `w:ins` / `w:del` tracked changes                 |
//! | `{== ==}{>> <<}`        | comment range, reference and `comments.xml` entry |
//! | `[@key]`                | citation field carrying CSL-JSON item data        |
//! | `$..$` / `$$..$$`       | `m:oMath` / `m:oMathPara`                         |
//!
//! # Lossy Conversions
//!
//! - Paragraph style formatting is not inherited into runs; only direct run properties count
//! - Code block languages are not stored in the document
//! - Page breaks, images, footnotes and section properties are dropped on import

pub mod citations;
pub mod extractor;
pub mod generator;
pub mod numbering;
pub mod package;
pub mod parts;
pub mod tree;
pub mod xml;

use crate::collaborators::Environment;
use crate::error::FormatError;
use crate::format::{Conversion, Format, SerializedDocument};
use crate::formats::markdown::serializer;

pub use extractor::{extract, Extraction};
pub use generator::{generate, Generation};

/// Reads Word documents and converts them to markup.
#[derive(Default)]
pub struct DocxFormat;

impl Format for DocxFormat {
    fn name(&self) -> &str {
        "docx"
    }

    fn description(&self) -> &str {
        "Office Open XML word processing document"
    }

    fn file_extensions(&self) -> &[&str] {
        &["docx"]
    }

    fn target(&self) -> &str {
        "markdown"
    }

    fn convert(&self, source: &[u8], env: &mut Environment<'_>) -> Result<Conversion, FormatError> {
        let extraction = extract(source, env)?;
        let markup = serializer::serialize(&extraction.blocks, &env.options);
        Ok(Conversion {
            output: SerializedDocument::Text(markup),
            warnings: extraction.warnings,
        })
    }
}
