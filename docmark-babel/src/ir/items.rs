//! Extraction model: a flat stream of content items.
//!
//! The docx extractor produces this stream in document order. Each inline item records the set
//! of comment IDs active over it; the overlap resolver turns those sets back into markup.

use crate::ir::nodes::{CiteKey, Formatting};
use std::collections::BTreeSet;

/// Comment IDs active over an item, as found in the source package.
pub type CommentSet = BTreeSet<String>;

/// Tracked-change kind of a text item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Revision {
    Insert,
    Delete,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextItem {
    pub text: String,
    pub comments: CommentSet,
    pub format: Formatting,
    pub link: Option<String>,
    pub revision: Option<Revision>,
    /// Carries the unresolved-citation character style
    pub literal_citation: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CitationItem {
    /// Visible text as rendered in the document
    pub text: String,
    pub comments: CommentSet,
    /// Recovered markup keys
    pub keys: Vec<CiteKey>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MathItem {
    pub latex: String,
    pub display: bool,
    pub comments: CommentSet,
}

/// List metadata resolved from the numbering part.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListInfo {
    pub ordered: bool,
    pub level: usize,
}

/// Starts a paragraph and records its block kind.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParagraphMarker {
    pub heading: Option<u8>,
    pub list: Option<ListInfo>,
    pub quote_level: Option<usize>,
    pub code: bool,
    pub rule: bool,
}

/// A table whose cells are item streams of their own.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableItem {
    pub rows: Vec<Vec<Vec<ContentItem>>>,
    pub header: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ContentItem {
    Text(TextItem),
    Citation(CitationItem),
    Paragraph(ParagraphMarker),
    Math(MathItem),
    /// Hard line break
    Break,
    /// A comment whose range covers no content
    CommentPoint(String),
    Table(TableItem),
}

impl ContentItem {
    /// The comment set of an inline span, `None` for structural items.
    pub fn comments(&self) -> Option<&CommentSet> {
        match self {
            ContentItem::Text(t) => Some(&t.comments),
            ContentItem::Citation(c) => Some(&c.comments),
            ContentItem::Math(m) => Some(&m.comments),
            _ => None,
        }
    }
}

/// Merge adjacent text items that agree on formatting, link, revision and comment set.
pub fn merge_adjacent_text(items: Vec<ContentItem>) -> Vec<ContentItem> {
    let mut out: Vec<ContentItem> = Vec::with_capacity(items.len());
    for item in items {
        let item = match item {
            ContentItem::Text(t) if t.text.is_empty() => continue,
            ContentItem::Table(table) => ContentItem::Table(TableItem {
                header: table.header,
                rows: table
                    .rows
                    .into_iter()
                    .map(|row| row.into_iter().map(merge_adjacent_text).collect())
                    .collect(),
            }),
            other => other,
        };
        if let (Some(ContentItem::Text(prev)), ContentItem::Text(next)) = (out.last_mut(), &item)
        {
            if prev.format == next.format
                && prev.link == next.link
                && prev.revision == next.revision
                && prev.literal_citation == next.literal_citation
                && prev.comments == next.comments
            {
                prev.text.push_str(&next.text);
                continue;
            }
        }
        out.push(item);
    }
    out
}
