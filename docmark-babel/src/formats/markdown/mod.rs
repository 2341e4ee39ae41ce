//! Markdown format implementation
//!
//! This module implements the markup side of the conversion: CommonMark extended with review
//! annotations, citation clusters, math and colored highlights.
//!
//! # Library Choice
//!
//! We use the `comrak` crate for the base grammar (headings, lists, quotes, code, pipe tables,
//! emphasis, links). The extensions are recognized by a pre-scan in [`inline`] that hides them
//! from comrak behind placeholders, so comrak never needs to know about them.
//!
//! Output is printed by [`serializer`] rather than comrak's formatter, which would escape the
//! extension syntax.
//!
//! # Element Mapping Table
//!
//! | Markup                         | Generation model                               |
//! |--------------------------------|------------------------------------------------|
//! | `{++text++}` / `{--text--}`    | `Run::Insert` / `Run::Delete`                  |
//! | `{~~old~>new~~}`               | `Run::Substitute`                              |
//! | `{==text==}{>>comment<<}`      | `Run::Highlight` carrying its comment          |
//! | `{>>comment<<}`                | `Run::Comment` (point comment)                 |
//! | `{#id}` `{/id}` `{#id>>c<<}`   | `CommentStart` / `CommentEnd` / `CommentBody`  |
//! | `[@key, loc; @other]`          | `Run::Citation`                                |
//! | `$..$` / `$$..$$`              | `Run::Math` inline / display                   |
//! | `==text==` / `==text=={green}` | text with a highlight color                    |
//! | `<u>` `<sub>` `<sup>`          | underline / subscript / superscript toggles    |
//! | grid tables                    | `Block::Table` through the grid preprocessor   |
//!
//! # Lossy Conversions
//!
//! - Leading indentation of paragraph lines is dropped
//! - List numbering restarts at 1; start numbers are not kept
//! - Loose and tight lists render the same
//! - Setext headings come back as ATX headings

pub mod inline;
pub mod serializer;
pub mod tokenizer;

use crate::collaborators::Environment;
use crate::error::FormatError;
use crate::format::{Conversion, Format, SerializedDocument};
use crate::formats::docx::generate;

pub use serializer::serialize;
pub use tokenizer::tokenize;

/// Format implementation for Markdown
#[derive(Default)]
pub struct MarkdownFormat;

impl Format for MarkdownFormat {
    fn name(&self) -> &str {
        "markdown"
    }

    fn description(&self) -> &str {
        "CommonMark Markdown with review, citation and math extensions"
    }

    fn file_extensions(&self) -> &[&str] {
        &["md", "markdown"]
    }

    fn target(&self) -> &str {
        "docx"
    }

    fn convert(&self, source: &[u8], env: &mut Environment<'_>) -> Result<Conversion, FormatError> {
        let source = std::str::from_utf8(source)
            .map_err(|e| FormatError::ParseError(format!("markup is not valid UTF-8: {e}")))?;
        let blocks = tokenize(source, &env.options);
        let generation = generate(&blocks, env)?;
        Ok(Conversion {
            output: SerializedDocument::Binary(generation.package.write()?),
            warnings: generation.warnings,
        })
    }
}
