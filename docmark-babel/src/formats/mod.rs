//! Format implementations
//!
//! This module contains the two formats the crate converts between: annotated markup and Word
//! packages.

pub mod docx;
pub mod markdown;

pub use docx::DocxFormat;
pub use markdown::MarkdownFormat;
