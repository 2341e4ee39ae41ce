//! Markdown tokenizing (markup → generation model)
//!
//! Pipeline: markup → grid table preprocessing → extension scan → comrak AST → blocks of runs.
//!
//! comrak supplies the base grammar. Extension syntax has already been replaced by
//! placeholders (see [`super::inline`]); text nodes are split on them and each placeholder is
//! expanded into runs that inherit the emphasis and link around it. Annotation payloads are
//! markup in their own right and go through a nested parse.

use super::inline::{self, restore, segments, Extension, Placed, Segment};
use crate::common::grid_table::{self, placeholder_index, GridTable};
use crate::ir::nodes::{normalize_blocks, Block, Formatting, Run, Table, TableCell, TableRow, TextRun};
use crate::options::ConvertOptions;
use comrak::nodes::{AstNode, ListType, NodeValue};
use comrak::{parse_document, Arena, ComrakOptions};
use once_cell::sync::Lazy;
use regex::Regex;

/// Paragraph openers that would turn a fragment into block structure.
static BLOCK_START: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:#{1,6}(?:\s|$)|[-+*](?:\s|$)|>|(?P<ordinal>\d{1,9})[.)](?:\s|$))")
        .expect("block start pattern")
});

/// Tokenize markup into blocks.
pub fn tokenize(source: &str, options: &ConvertOptions) -> Vec<Block> {
    let pre = grid_table::preprocess(source);
    let scanned = inline::scan(&pre.source, true);
    tracing::debug!(
        grid_tables = pre.tables.len(),
        extensions = scanned.placed.len(),
        "markup scanned"
    );

    let arena = Arena::new();
    let root = parse_document(&arena, &scanned.text, &comrak_options());
    let mut builder = BlockBuilder {
        options,
        tables: &pre.tables,
        placed: &scanned.placed,
        blocks: Vec::new(),
    };
    builder.node(root, Scope::default());
    normalize_blocks(builder.blocks)
}

fn comrak_options() -> ComrakOptions<'static> {
    let mut options = ComrakOptions::default();
    options.extension.table = true;
    options.extension.strikethrough = true;
    options.extension.superscript = true;
    options
}

/// Where a block sits: quote depth and enclosing list item.
#[derive(Debug, Clone, Copy, Default)]
struct Scope {
    quote: usize,
    list: Option<(bool, usize)>,
}

struct BlockBuilder<'a> {
    options: &'a ConvertOptions,
    tables: &'a [GridTable],
    placed: &'a [Placed],
    blocks: Vec<Block>,
}

impl BlockBuilder<'_> {
    fn node<'a>(&mut self, node: &'a AstNode<'a>, scope: Scope) {
        let value = node.data.borrow().value.clone();
        match value {
            NodeValue::Document => self.children(node, scope),

            NodeValue::Paragraph => {
                if let Some(table) = self.grid_table(node) {
                    self.blocks.push(Block::Table(table));
                    return;
                }
                let runs = self.inlines(node);
                if runs.is_empty() {
                    return;
                }
                let block = match scope {
                    Scope {
                        list: Some((ordered, level)),
                        ..
                    } => Block::ListItem {
                        ordered,
                        level,
                        runs,
                    },
                    Scope { quote, .. } if quote > 0 => Block::BlockQuote { level: quote, runs },
                    _ => Block::Paragraph(runs),
                };
                self.blocks.push(block);
            }

            NodeValue::Heading(heading) => {
                let runs = self.inlines(node);
                self.blocks.push(Block::Heading {
                    level: heading.level.clamp(1, 6),
                    runs,
                });
            }

            NodeValue::List(list) => {
                let ordered = matches!(list.list_type, ListType::Ordered);
                let level = scope.list.map_or(0, |(_, level)| level + 1);
                for item in node.children() {
                    self.children(
                        item,
                        Scope {
                            list: Some((ordered, level)),
                            ..scope
                        },
                    );
                }
            }

            NodeValue::BlockQuote => self.children(
                node,
                Scope {
                    quote: scope.quote + 1,
                    ..scope
                },
            ),

            NodeValue::CodeBlock(code_block) => {
                let literal = restore(&code_block.literal, self.placed);
                let language = code_block
                    .info
                    .split_whitespace()
                    .next()
                    .map(str::to_string);
                self.blocks.push(Block::CodeBlock {
                    language,
                    code: literal.strip_suffix('\n').unwrap_or(&literal).to_string(),
                });
            }

            NodeValue::ThematicBreak => self.blocks.push(Block::HorizontalRule),

            NodeValue::Table(_) => {
                let mut rows = Vec::new();
                let mut header = false;
                for (index, row) in node.children().enumerate() {
                    if index == 0 {
                        header = matches!(row.data.borrow().value, NodeValue::TableRow(true));
                    }
                    let cells = row
                        .children()
                        .map(|cell| TableCell {
                            runs: self.inlines(cell),
                        })
                        .collect();
                    rows.push(TableRow { cells });
                }
                self.blocks.push(Block::Table(Table { rows, header }));
            }

            NodeValue::HtmlBlock(_) | NodeValue::FrontMatter(_) => {}

            _ => self.children(node, scope),
        }
    }

    fn children<'a>(&mut self, node: &'a AstNode<'a>, scope: Scope) {
        for child in node.children() {
            self.node(child, scope);
        }
    }

    fn inlines<'a>(&self, node: &'a AstNode<'a>) -> Vec<Run> {
        let mut walker = InlineWalker::new(self.placed, self.options);
        walker.children(node, &Formatting::default(), None);
        walker.out
    }

    /// A paragraph that is nothing but a grid table placeholder.
    fn grid_table<'a>(&self, node: &'a AstNode<'a>) -> Option<Table> {
        let mut children = node.children();
        let only = children.next()?;
        if children.next().is_some() {
            return None;
        }
        let index = match &only.data.borrow().value {
            NodeValue::Text(text) => placeholder_index(text)?,
            _ => return None,
        };
        let grid = self.tables.get(index)?;
        let rows = grid
            .rows
            .iter()
            .map(|row| TableRow {
                cells: row
                    .iter()
                    .map(|cell| TableCell {
                        runs: fragment(cell, true, self.options),
                    })
                    .collect(),
            })
            .collect();
        Some(Table {
            rows,
            header: grid.header,
        })
    }
}

/// Inline HTML toggles open at the current point.
#[derive(Debug, Clone, Copy, Default)]
struct HtmlToggles {
    underline: usize,
    superscript: usize,
    subscript: usize,
}

struct InlineWalker<'p> {
    placed: &'p [Placed],
    options: &'p ConvertOptions,
    html: HtmlToggles,
    out: Vec<Run>,
}

impl<'p> InlineWalker<'p> {
    fn new(placed: &'p [Placed], options: &'p ConvertOptions) -> Self {
        InlineWalker {
            placed,
            options,
            html: HtmlToggles::default(),
            out: Vec::new(),
        }
    }

    fn children<'a>(&mut self, node: &'a AstNode<'a>, format: &Formatting, link: Option<&str>) {
        for child in node.children() {
            self.node(child, format, link);
        }
    }

    fn node<'a>(&mut self, node: &'a AstNode<'a>, format: &Formatting, link: Option<&str>) {
        let value = node.data.borrow().value.clone();
        match value {
            NodeValue::Text(text) => self.text(&text, format, link),
            NodeValue::Strong => {
                let inner = Formatting {
                    bold: true,
                    ..format.clone()
                };
                self.children(node, &inner, link);
            }
            NodeValue::Emph => {
                let inner = Formatting {
                    italic: true,
                    ..format.clone()
                };
                self.children(node, &inner, link);
            }
            NodeValue::Strikethrough => {
                let inner = Formatting {
                    strikethrough: true,
                    ..format.clone()
                };
                self.children(node, &inner, link);
            }
            NodeValue::Superscript => {
                let inner = Formatting {
                    superscript: true,
                    ..format.clone()
                };
                self.children(node, &inner, link);
            }
            NodeValue::Code(code) => {
                let format = Formatting {
                    code: true,
                    ..self.effective(format)
                };
                self.out.push(Run::Text(TextRun {
                    text: restore(&code.literal, self.placed),
                    format,
                    link: link.map(str::to_string),
                }));
            }
            NodeValue::Link(target) => self.children(node, format, Some(&target.url)),
            NodeValue::SoftBreak => self.out.push(Run::SoftBreak),
            NodeValue::LineBreak => self.out.push(Run::LineBreak),
            NodeValue::HtmlInline(html) => self.html(&html),
            _ => self.children(node, format, link),
        }
    }

    fn effective(&self, format: &Formatting) -> Formatting {
        Formatting {
            underline: format.underline || self.html.underline > 0,
            superscript: format.superscript || self.html.superscript > 0,
            subscript: format.subscript || self.html.subscript > 0,
            ..format.clone()
        }
    }

    fn html(&mut self, tag: &str) {
        let tag = tag.trim().to_ascii_lowercase();
        let html = &mut self.html;
        match tag.as_str() {
            "<u>" => html.underline += 1,
            "</u>" => html.underline = html.underline.saturating_sub(1),
            "<sup>" => html.superscript += 1,
            "</sup>" => html.superscript = html.superscript.saturating_sub(1),
            "<sub>" => html.subscript += 1,
            "</sub>" => html.subscript = html.subscript.saturating_sub(1),
            "<br>" | "<br/>" | "<br />" => self.out.push(Run::LineBreak),
            _ => {}
        }
    }

    fn text(&mut self, text: &str, format: &Formatting, link: Option<&str>) {
        let format = self.effective(format);
        for segment in segments(text) {
            match segment {
                Segment::Text(text) => self.out.push(Run::Text(TextRun {
                    text: text.to_string(),
                    format: format.clone(),
                    link: link.map(str::to_string),
                })),
                Segment::Placed(index) => {
                    if let Some(placed) = self.placed.get(index) {
                        let runs = expand(&placed.extension, self.options);
                        self.out.extend(inherit(runs, &format, link));
                    }
                }
            }
        }
    }
}

/// Runs for one extension construct.
fn expand(extension: &Extension, options: &ConvertOptions) -> Vec<Run> {
    let run = match extension {
        Extension::Insert(content) => Run::Insert(fragment(content, false, options)),
        Extension::Delete(content) => Run::Delete(fragment(content, false, options)),
        Extension::Substitute { old, new } => Run::Substitute {
            old: fragment(old, false, options),
            new: fragment(new, false, options),
        },
        Extension::Highlight { content, comment } => Run::Highlight {
            runs: fragment(content, false, options),
            comment: comment.clone(),
        },
        Extension::Comment(comment) => Run::Comment(comment.clone()),
        Extension::CommentStart(id) => Run::CommentStart(id.clone()),
        Extension::CommentEnd(id) => Run::CommentEnd(id.clone()),
        Extension::CommentBody { id, comment } => Run::CommentBody {
            id: id.clone(),
            comment: comment.clone(),
        },
        Extension::Citation(keys) => Run::Citation(crate::ir::nodes::Citation { keys: keys.clone() }),
        Extension::Math(math) => Run::Math(math.clone()),
        Extension::Colored { content, color } => {
            let highlight = Formatting {
                highlight: Some(
                    color
                        .clone()
                        .unwrap_or_else(|| options.highlight_color.clone()),
                ),
                ..Default::default()
            };
            return inherit(fragment(content, false, options), &highlight, None);
        }
    };
    vec![run]
}

/// Inline runs of a markup fragment (annotation payload or grid table cell).
///
/// Edge whitespace is kept, and a leading block marker is escaped so the fragment always
/// parses as one paragraph. Payloads pass `annotations: false`; they cannot nest.
pub(crate) fn fragment(content: &str, annotations: bool, options: &ConvertOptions) -> Vec<Run> {
    let core = content.trim();
    if core.is_empty() {
        return if content.is_empty() {
            Vec::new()
        } else {
            vec![Run::text(content)]
        };
    }
    let start = content.find(core).unwrap_or(0);
    let lead = &content[..start];
    let trail = &content[start + core.len()..];

    let protected = match BLOCK_START.captures(core) {
        Some(caps) => {
            let marker_at = caps.name("ordinal").map_or(0, |ordinal| ordinal.end());
            format!("{}\\{}", &core[..marker_at], &core[marker_at..])
        }
        None => core.to_string(),
    };
    let scanned = inline::scan(&protected, annotations);
    let arena = Arena::new();
    let root = parse_document(&arena, &scanned.text, &comrak_options());

    let mut walker = InlineWalker::new(&scanned.placed, options);
    if !lead.is_empty() {
        walker.out.push(Run::text(lead));
    }
    collect_fragment(root, &mut walker, &mut false);
    if !trail.is_empty() {
        walker.out.push(Run::text(trail));
    }
    walker.out
}

/// `started` is set once the first paragraph is out; later ones are joined by a soft break.
fn collect_fragment<'a>(
    node: &'a AstNode<'a>,
    walker: &mut InlineWalker<'_>,
    started: &mut bool,
) {
    let value = node.data.borrow().value.clone();
    match value {
        NodeValue::Paragraph | NodeValue::Heading(_) | NodeValue::TableCell => {
            if *started && !matches!(walker.out.last(), Some(Run::SoftBreak)) {
                walker.out.push(Run::SoftBreak);
            }
            *started = true;
            walker.children(node, &Formatting::default(), None);
        }
        NodeValue::CodeBlock(code) => {
            if *started {
                walker.out.push(Run::SoftBreak);
            }
            *started = true;
            let text = restore(&code.literal, walker.placed);
            walker.out.push(Run::text(text.trim_end()));
        }
        _ => {
            for child in node.children() {
                collect_fragment(child, walker, started);
            }
        }
    }
}

/// Apply surrounding formatting and link to runs expanded from a placeholder.
fn inherit(runs: Vec<Run>, format: &Formatting, link: Option<&str>) -> Vec<Run> {
    let each = |runs: Vec<Run>| inherit(runs, format, link);
    runs.into_iter()
        .map(|run| match run {
            Run::Text(mut text) => {
                let own = &mut text.format;
                own.bold |= format.bold;
                own.italic |= format.italic;
                own.underline |= format.underline;
                own.strikethrough |= format.strikethrough;
                own.superscript |= format.superscript;
                own.subscript |= format.subscript;
                own.code |= format.code;
                if own.highlight.is_none() {
                    own.highlight = format.highlight.clone();
                }
                if text.link.is_none() {
                    text.link = link.map(str::to_string);
                }
                Run::Text(text)
            }
            Run::Insert(inner) => Run::Insert(each(inner)),
            Run::Delete(inner) => Run::Delete(each(inner)),
            Run::Substitute { old, new } => Run::Substitute {
                old: each(old),
                new: each(new),
            },
            Run::Highlight { runs, comment } => Run::Highlight {
                runs: each(runs),
                comment,
            },
            other => other,
        })
        .collect()
}
