//! Generation model: blocks of formatting runs.
//!
//! The markup tokenizer produces this model and the docx generator consumes it. The extractor
//! also lands here (through the overlap resolver) so a single renderer prints markup for both
//! directions.

/// Character formatting toggles carried by a text run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Formatting {
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub strikethrough: bool,
    pub superscript: bool,
    pub subscript: bool,
    pub code: bool,
    /// Highlight color name, e.g. `yellow`
    pub highlight: Option<String>,
}

impl Formatting {
    pub fn is_plain(&self) -> bool {
        *self == Formatting::default()
    }
}

/// A run of text sharing one formatting and hyperlink target.
#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    pub text: String,
    pub format: Formatting,
    pub link: Option<String>,
}

impl TextRun {
    pub fn plain(text: impl Into<String>) -> Self {
        TextRun {
            text: text.into(),
            format: Formatting::default(),
            link: None,
        }
    }

    pub fn styled(text: impl Into<String>, format: Formatting) -> Self {
        TextRun {
            text: text.into(),
            format,
            link: None,
        }
    }
}

/// Review comment metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Comment {
    pub author: Option<String>,
    pub timestamp: Option<String>,
    pub body: String,
}

/// One key of a citation cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CiteKey {
    pub key: String,
    pub locator: Option<String>,
}

impl CiteKey {
    pub fn new(key: impl Into<String>) -> Self {
        CiteKey {
            key: key.into(),
            locator: None,
        }
    }

    pub fn with_locator(key: impl Into<String>, locator: impl Into<String>) -> Self {
        CiteKey {
            key: key.into(),
            locator: Some(locator.into()),
        }
    }
}

/// A citation cluster: ordered keys rendered together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Citation {
    pub keys: Vec<CiteKey>,
}

/// A LaTeX math span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Math {
    pub latex: String,
    pub display: bool,
}

/// Atomic inline unit of the generation model.
#[derive(Debug, Clone, PartialEq)]
pub enum Run {
    Text(TextRun),
    /// `{++ ... ++}`
    Insert(Vec<Run>),
    /// `{-- ... --}`
    Delete(Vec<Run>),
    /// `{~~ old ~> new ~~}`
    Substitute { old: Vec<Run>, new: Vec<Run> },
    /// `{== ... ==}`, optionally followed directly by the comment it anchors
    Highlight {
        runs: Vec<Run>,
        comment: Option<Comment>,
    },
    /// Standalone `{>> ... <<}`
    Comment(Comment),
    Citation(Citation),
    Math(Math),
    SoftBreak,
    LineBreak,
    /// `{#id}`
    CommentStart(String),
    /// `{/id}`
    CommentEnd(String),
    /// `{#id>> ... <<}`
    CommentBody { id: String, comment: Comment },
}

impl Run {
    pub fn text(text: impl Into<String>) -> Self {
        Run::Text(TextRun::plain(text))
    }
}

/// A table cell is a run sequence.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TableCell {
    pub runs: Vec<Run>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TableRow {
    pub cells: Vec<TableCell>,
}

/// A table; when `header` is set the first row is the header row.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    pub rows: Vec<TableRow>,
    pub header: bool,
}

impl Table {
    pub fn column_count(&self) -> usize {
        self.rows.iter().map(|r| r.cells.len()).max().unwrap_or(0)
    }
}

/// Block-level element of the generation model.
#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    Paragraph(Vec<Run>),
    Heading {
        level: u8,
        runs: Vec<Run>,
    },
    ListItem {
        ordered: bool,
        level: usize,
        runs: Vec<Run>,
    },
    BlockQuote {
        level: usize,
        runs: Vec<Run>,
    },
    CodeBlock {
        language: Option<String>,
        code: String,
    },
    Table(Table),
    HorizontalRule,
}

impl Block {
    /// Inline runs held directly by this block (empty for code, tables and rules).
    pub fn runs(&self) -> &[Run] {
        match self {
            Block::Paragraph(runs)
            | Block::Heading { runs, .. }
            | Block::ListItem { runs, .. }
            | Block::BlockQuote { runs, .. } => runs,
            Block::CodeBlock { .. } | Block::Table(_) | Block::HorizontalRule => &[],
        }
    }
}

/// Visit every run list in document order, table cells included.
pub fn for_each_run_list<'a>(blocks: &'a [Block], mut visit: impl FnMut(&'a [Run])) {
    for block in blocks {
        match block {
            Block::Table(table) => {
                for row in &table.rows {
                    for cell in &row.cells {
                        visit(&cell.runs);
                    }
                }
            }
            other => visit(other.runs()),
        }
    }
}

/// Visit every run depth-first, annotation payloads included.
pub fn walk_runs<'a>(runs: &'a [Run], visit: &mut impl FnMut(&'a Run)) {
    for run in runs {
        visit(run);
        match run {
            Run::Insert(inner) | Run::Delete(inner) | Run::Highlight { runs: inner, .. } => {
                walk_runs(inner, visit)
            }
            Run::Substitute { old, new } => {
                walk_runs(old, visit);
                walk_runs(new, visit);
            }
            _ => {}
        }
    }
}

/// Merge adjacent text runs that share formatting and link target.
///
/// Nested annotation payloads are normalized too. Empty text runs are dropped.
pub fn normalize_runs(runs: Vec<Run>) -> Vec<Run> {
    let mut out: Vec<Run> = Vec::with_capacity(runs.len());
    for run in runs {
        let run = match run {
            Run::Text(t) if t.text.is_empty() => continue,
            Run::Insert(inner) => Run::Insert(normalize_runs(inner)),
            Run::Delete(inner) => Run::Delete(normalize_runs(inner)),
            Run::Substitute { old, new } => Run::Substitute {
                old: normalize_runs(old),
                new: normalize_runs(new),
            },
            Run::Highlight { runs, comment } => Run::Highlight {
                runs: normalize_runs(runs),
                comment,
            },
            other => other,
        };
        if let (Some(Run::Text(prev)), Run::Text(next)) = (out.last_mut(), &run) {
            if prev.format == next.format && prev.link == next.link {
                prev.text.push_str(&next.text);
                continue;
            }
        }
        out.push(run);
    }
    out
}

/// Normalize every run list of a block sequence.
pub fn normalize_blocks(blocks: Vec<Block>) -> Vec<Block> {
    blocks
        .into_iter()
        .map(|block| match block {
            Block::Paragraph(runs) => Block::Paragraph(normalize_runs(runs)),
            Block::Heading { level, runs } => Block::Heading {
                level,
                runs: normalize_runs(runs),
            },
            Block::ListItem {
                ordered,
                level,
                runs,
            } => Block::ListItem {
                ordered,
                level,
                runs: normalize_runs(runs),
            },
            Block::BlockQuote { level, runs } => Block::BlockQuote {
                level,
                runs: normalize_runs(runs),
            },
            Block::Table(table) => Block::Table(Table {
                header: table.header,
                rows: table
                    .rows
                    .into_iter()
                    .map(|row| TableRow {
                        cells: row
                            .cells
                            .into_iter()
                            .map(|cell| TableCell {
                                runs: normalize_runs(cell.runs),
                            })
                            .collect(),
                    })
                    .collect(),
            }),
            other => other,
        })
        .collect()
}
