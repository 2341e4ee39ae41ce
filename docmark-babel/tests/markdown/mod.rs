//! Markdown format tests
//!
//! Tokenizer behavior on whole documents and the format's registry entry.

mod format;
mod tokenize;
