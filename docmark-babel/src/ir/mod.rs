//! Intermediate representations shared by both conversion directions.
//!
//! - [`nodes`]: the generation model (blocks of runs), produced by the markup tokenizer and
//!   consumed by the docx generator and the markup renderer.
//! - [`items`]: the extraction model (flat content items with active comment sets), produced by
//!   the docx extractor.

pub mod items;
pub mod nodes;
