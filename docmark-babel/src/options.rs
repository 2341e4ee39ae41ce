//! Conversion options shared by both directions.

/// Highlight color names accepted after `==text==` (the word processor's highlight palette).
pub const HIGHLIGHT_COLORS: &[&str] = &[
    "yellow",
    "green",
    "cyan",
    "magenta",
    "blue",
    "red",
    "darkBlue",
    "darkCyan",
    "darkGreen",
    "darkMagenta",
    "darkRed",
    "darkYellow",
    "darkGray",
    "lightGray",
    "black",
];

pub fn is_highlight_color(name: &str) -> bool {
    HIGHLIGHT_COLORS.contains(&name)
}

/// Knobs that influence how documents are converted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertOptions {
    /// Color used for `==text==` without an explicit color, and for `{== ==}` spans
    pub highlight_color: String,
    /// Author recorded on tracked insertions and deletions
    pub revision_author: String,
    /// Heading written above the generated bibliography; extraction stops at it
    pub sources_heading: String,
    /// Always render comments with identifier markers, even when brackets would do
    pub force_comment_ids: bool,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        ConvertOptions {
            highlight_color: "yellow".to_string(),
            revision_author: "docmark".to_string(),
            sources_heading: "Sources".to_string(),
            force_comment_ids: false,
        }
    }
}
