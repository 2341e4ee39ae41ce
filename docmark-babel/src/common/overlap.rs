//! Comment overlap resolution between range anchors and bracket markup.
//!
//! # The High-Level Concept
//!
//! Word anchors a comment with two independent points (`commentRangeStart` and
//! `commentRangeEnd`), so comment ranges may overlap in any way. Bracket markup
//! (`{==text==}{>>note<<}`) can only express ranges that are contiguous, non-overlapping and
//! confined to one paragraph. Identifier markup (`{#1}text{/1}` plus `{#1>>note<<}`) can express
//! anything, but is noisier to read.
//!
//! Generation only needs dense numeric IDs ([IdAllocator]) and the identifier bodies collected up
//! front ([collect_comment_bodies]). Extraction needs the full treatment: given the flat item
//! stream with the set of comment IDs active over each span, decide on one encoding for the
//! whole document ([choose_encoding]) and rebuild the generation model in that encoding
//! ([resolve]).
//!
//! # The Algorithm
//!
//! 1. **Layout:** paragraph markers split the stream into units (one per paragraph, one per
//!    table cell). Tables keep their shape so cells can be rebuilt afterwards.
//!
//! 2. **Encoding choice:** brackets are used iff no span carries more than one comment, no
//!    commented span is a tracked change, and every comment's spans are consecutive and inside
//!    one unit. Forcing identifiers overrides the choice.
//!
//! 3. **Bracket rendering:** maximal runs of spans carrying the same comment become one
//!    `Highlight` run with the comment attached. The default highlight color is implied by the
//!    markup and dropped from the runs.
//!
//! 4. **Identifier rendering:** IDs are renumbered 1, 2, 3... in order of first appearance
//!    across the document, table cells included. A start marker precedes the first span of a
//!    comment and an end marker follows its last span; simultaneous starts open in ascending
//!    order and simultaneous ends close in reverse. Each body is placed once, at the end of the
//!    unit where its comment closes.
//!
//! 5. **Revisions:** consecutive spans of the same tracked-change kind are grouped; a deletion
//!    directly followed by an insertion becomes a substitution.
//!
//! Comments anchored on no content are written as standalone `{>>...<<}` in both encodings.

use crate::error::{record, Warning};
use crate::ir::items::{CommentSet, ContentItem, ParagraphMarker, Revision, TableItem};
use crate::ir::nodes::{
    for_each_run_list, normalize_blocks, walk_runs, Block, Citation, Comment, Math, Run, Table,
    TableCell, TableRow, TextRun,
};
use crate::options::ConvertOptions;
use std::collections::{BTreeMap, HashMap};

/// Hands out dense numeric IDs in first-appearance order.
#[derive(Debug, Clone)]
pub struct IdAllocator {
    next: usize,
    base: usize,
    named: HashMap<String, usize>,
}

impl IdAllocator {
    pub fn new(base: usize) -> Self {
        IdAllocator {
            next: base,
            base,
            named: HashMap::new(),
        }
    }

    /// A new anonymous ID.
    pub fn fresh(&mut self) -> usize {
        let id = self.next;
        self.next += 1;
        id
    }

    /// The ID bound to `key`, allocating it on first use.
    pub fn allocate(&mut self, key: &str) -> usize {
        if let Some(&id) = self.named.get(key) {
            return id;
        }
        let id = self.fresh();
        self.named.insert(key.to_string(), id);
        id
    }

    pub fn get(&self, key: &str) -> Option<usize> {
        self.named.get(key).copied()
    }

    /// Number of IDs handed out so far.
    pub fn len(&self) -> usize {
        self.next - self.base
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Identifier comment bodies keyed by markup ID, table cells and annotation payloads included.
///
/// The first body wins when an ID is given several.
pub fn collect_comment_bodies(blocks: &[Block]) -> BTreeMap<String, Comment> {
    let mut bodies = BTreeMap::new();
    for_each_run_list(blocks, |runs| {
        walk_runs(runs, &mut |run| {
            if let Run::CommentBody { id, comment } = run {
                bodies.entry(id.clone()).or_insert_with(|| comment.clone());
            }
        })
    });
    bodies
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    /// `{==text==}{>>note<<}`
    Bracketed,
    /// `{#1}text{/1}{#1>>note<<}`
    Identified,
}

/// One inline span as seen by the encoding decision.
#[derive(Debug, Clone, Copy)]
pub struct SpanInfo<'a> {
    /// Unit (paragraph or table cell) the span lives in
    pub block: usize,
    pub comments: &'a CommentSet,
    /// The span is a tracked insertion or deletion
    pub revised: bool,
}

/// Decide how comments are written. Pure function of the span sequence.
pub fn choose_encoding(spans: &[SpanInfo<'_>], force_identifiers: bool) -> Encoding {
    if force_identifiers {
        return Encoding::Identified;
    }
    let mut last_seen: HashMap<&str, (usize, usize)> = HashMap::new();
    for (index, span) in spans.iter().enumerate() {
        if span.comments.len() > 1 || (!span.comments.is_empty() && span.revised) {
            return Encoding::Identified;
        }
        for id in span.comments {
            if let Some(&(prev_index, prev_block)) = last_seen.get(id.as_str()) {
                if prev_index + 1 != index || prev_block != span.block {
                    return Encoding::Identified;
                }
            }
            last_seen.insert(id, (index, span.block));
        }
    }
    Encoding::Bracketed
}

/// Extraction result in generation-model form.
#[derive(Debug, Clone)]
pub struct Resolved {
    pub blocks: Vec<Block>,
    pub encoding: Encoding,
    pub warnings: Vec<Warning>,
}

/// Rebuild blocks from an extracted item stream, placing comment markup.
///
/// `comments` maps the package's comment IDs to their metadata.
pub fn resolve(
    items: Vec<ContentItem>,
    comments: &BTreeMap<String, Comment>,
    options: &ConvertOptions,
) -> Resolved {
    let layout = Layout::build(items);
    let spans = layout.spans();
    let encoding = choose_encoding(&spans, options.force_comment_ids);
    tracing::debug!(
        units = layout.units.len(),
        spans = spans.len(),
        ?encoding,
        "resolving comment encoding"
    );

    let mut renderer = Renderer {
        comments,
        default_highlight: &options.highlight_color,
        warnings: Vec::new(),
    };
    let rendered: Vec<Vec<Run>> = match encoding {
        Encoding::Bracketed => layout
            .units
            .iter()
            .map(|unit| renderer.bracketed(unit))
            .collect(),
        Encoding::Identified => {
            let plan = IdPlan::new(&layout.units);
            layout
                .units
                .iter()
                .enumerate()
                .map(|(index, unit)| renderer.identified(index, unit, &plan))
                .collect()
        }
    };

    let blocks = layout.into_blocks(rendered);
    Resolved {
        blocks: normalize_blocks(blocks),
        encoding,
        warnings: renderer.warnings,
    }
}

enum Shape {
    Para(ParagraphMarker, usize),
    Table { header: bool, rows: Vec<Vec<usize>> },
}

#[derive(Default)]
struct Layout {
    units: Vec<Vec<ContentItem>>,
    shapes: Vec<Shape>,
}

impl Layout {
    fn build(items: Vec<ContentItem>) -> Self {
        let mut layout = Layout::default();
        let mut current: Option<(ParagraphMarker, Vec<ContentItem>)> = None;
        for item in items {
            match item {
                ContentItem::Paragraph(marker) => {
                    layout.push_paragraph(current.take());
                    current = Some((marker, Vec::new()));
                }
                ContentItem::Table(table) => {
                    layout.push_paragraph(current.take());
                    layout.push_table(table);
                }
                inline => current
                    .get_or_insert_with(|| (ParagraphMarker::default(), Vec::new()))
                    .1
                    .push(inline),
            }
        }
        layout.push_paragraph(current.take());
        layout
    }

    fn push_paragraph(&mut self, paragraph: Option<(ParagraphMarker, Vec<ContentItem>)>) {
        let Some((marker, mut items)) = paragraph else {
            return;
        };
        if marker.code {
            // comment ranges cannot be written inside fenced code
            items.retain(|item| !matches!(item, ContentItem::CommentPoint(_)));
            for item in &mut items {
                clear_comments(item);
            }
        }
        self.shapes.push(Shape::Para(marker, self.units.len()));
        self.units.push(items);
    }

    fn push_table(&mut self, table: TableItem) {
        let mut rows = Vec::with_capacity(table.rows.len());
        for row in table.rows {
            let mut cells = Vec::with_capacity(row.len());
            for cell in row {
                let mut unit = Vec::new();
                flatten_cell(cell, &mut unit);
                cells.push(self.units.len());
                self.units.push(unit);
            }
            rows.push(cells);
        }
        self.shapes.push(Shape::Table {
            header: table.header,
            rows,
        });
    }

    fn spans(&self) -> Vec<SpanInfo<'_>> {
        self.units
            .iter()
            .enumerate()
            .flat_map(|(block, items)| {
                items.iter().filter_map(move |item| {
                    Some(SpanInfo {
                        block,
                        comments: item.comments()?,
                        revised: matches!(item, ContentItem::Text(t) if t.revision.is_some()),
                    })
                })
            })
            .collect()
    }

    fn into_blocks(self, mut rendered: Vec<Vec<Run>>) -> Vec<Block> {
        let mut take = |index: usize| std::mem::take(&mut rendered[index]);
        let mut blocks: Vec<Block> = Vec::new();
        for shape in self.shapes {
            match shape {
                Shape::Para(marker, index) => {
                    let runs = take(index);
                    if marker.rule {
                        blocks.push(Block::HorizontalRule);
                    } else if marker.code {
                        let code = code_text(&runs);
                        match blocks.last_mut() {
                            Some(Block::CodeBlock { code: previous, .. }) => {
                                previous.push('\n');
                                previous.push_str(&code);
                            }
                            _ => blocks.push(Block::CodeBlock {
                                language: None,
                                code,
                            }),
                        }
                    } else if runs.is_empty() {
                        continue;
                    } else if let Some(level) = marker.heading {
                        blocks.push(Block::Heading { level, runs });
                    } else if let Some(list) = marker.list {
                        blocks.push(Block::ListItem {
                            ordered: list.ordered,
                            level: list.level,
                            runs,
                        });
                    } else if let Some(level) = marker.quote_level {
                        blocks.push(Block::BlockQuote { level, runs });
                    } else {
                        blocks.push(Block::Paragraph(runs));
                    }
                }
                Shape::Table { header, rows } => {
                    let rows = rows
                        .into_iter()
                        .map(|cells| TableRow {
                            cells: cells
                                .into_iter()
                                .map(|index| TableCell { runs: take(index) })
                                .collect(),
                        })
                        .collect();
                    blocks.push(Block::Table(Table { rows, header }));
                }
            }
        }
        blocks
    }
}

fn clear_comments(item: &mut ContentItem) {
    match item {
        ContentItem::Text(t) => t.comments.clear(),
        ContentItem::Citation(c) => c.comments.clear(),
        ContentItem::Math(m) => m.comments.clear(),
        _ => {}
    }
}

/// Cell paragraphs are joined with line breaks; nested tables are inlined.
fn flatten_cell(items: Vec<ContentItem>, unit: &mut Vec<ContentItem>) {
    for item in items {
        match item {
            ContentItem::Paragraph(_) => {
                if unit.iter().any(|i| i.comments().is_some()) {
                    unit.push(ContentItem::Break);
                }
            }
            ContentItem::Table(nested) => {
                for cell in nested.rows.into_iter().flatten() {
                    flatten_cell(cell, unit);
                }
            }
            other => unit.push(other),
        }
    }
    while matches!(unit.last(), Some(ContentItem::Break)) {
        unit.pop();
    }
}

fn code_text(runs: &[Run]) -> String {
    let mut code = String::new();
    for run in runs {
        match run {
            Run::Text(t) => code.push_str(&t.text),
            Run::SoftBreak | Run::LineBreak => code.push('\n'),
            Run::Math(m) => code.push_str(&m.latex),
            _ => {}
        }
    }
    code
}

/// Identifier numbering and marker positions for the whole document.
struct IdPlan {
    /// Original ID for each dense number (index = number - 1)
    originals: Vec<String>,
    starts: BTreeMap<(usize, usize), Vec<usize>>,
    ends: BTreeMap<(usize, usize), Vec<usize>>,
}

impl IdPlan {
    fn new(units: &[Vec<ContentItem>]) -> Self {
        let mut numbers: HashMap<&str, usize> = HashMap::new();
        let mut originals: Vec<String> = Vec::new();
        let mut first: Vec<(usize, usize)> = Vec::new();
        let mut last: Vec<(usize, usize)> = Vec::new();

        for (unit, items) in units.iter().enumerate() {
            for (position, item) in items.iter().enumerate() {
                let Some(set) = item.comments() else { continue };
                for id in set {
                    let index = match numbers.get(id.as_str()) {
                        Some(&index) => index,
                        None => {
                            let index = originals.len();
                            numbers.insert(id, index);
                            originals.push(id.clone());
                            first.push((unit, position));
                            last.push((unit, position));
                            index
                        }
                    };
                    last[index] = (unit, position);
                }
            }
        }

        let mut starts: BTreeMap<(usize, usize), Vec<usize>> = BTreeMap::new();
        let mut ends: BTreeMap<(usize, usize), Vec<usize>> = BTreeMap::new();
        for index in 0..originals.len() {
            starts.entry(first[index]).or_default().push(index + 1);
            ends.entry(last[index]).or_default().push(index + 1);
        }
        for numbers in ends.values_mut() {
            numbers.reverse();
        }
        IdPlan {
            originals,
            starts,
            ends,
        }
    }

    fn original(&self, number: usize) -> &str {
        &self.originals[number - 1]
    }
}

enum Piece {
    Content(Run, Option<Revision>),
    Fixed(Run),
}

struct Renderer<'a> {
    comments: &'a BTreeMap<String, Comment>,
    default_highlight: &'a str,
    warnings: Vec<Warning>,
}

impl Renderer<'_> {
    fn comment(&mut self, id: &str) -> Option<Comment> {
        match self.comments.get(id) {
            Some(comment) => Some(comment.clone()),
            None => {
                record(
                    &mut self.warnings,
                    Warning::MissingCommentBody { id: id.to_string() },
                );
                None
            }
        }
    }

    fn content(&self, item: &ContentItem) -> Option<(Run, Option<Revision>)> {
        match item {
            ContentItem::Text(t) => {
                let mut format = t.format.clone();
                let commented = !t.comments.is_empty();
                if commented && format.highlight.as_deref() == Some(self.default_highlight) {
                    format.highlight = None;
                }
                Some((
                    Run::Text(TextRun {
                        text: t.text.clone(),
                        format,
                        link: t.link.clone(),
                    }),
                    t.revision,
                ))
            }
            ContentItem::Citation(c) if c.keys.is_empty() => Some((Run::text(c.text.clone()), None)),
            ContentItem::Citation(c) => Some((
                Run::Citation(Citation {
                    keys: c.keys.clone(),
                }),
                None,
            )),
            ContentItem::Math(m) => Some((
                Run::Math(Math {
                    latex: m.latex.clone(),
                    display: m.display,
                }),
                None,
            )),
            ContentItem::Break => Some((Run::LineBreak, None)),
            _ => None,
        }
    }

    fn bracketed(&mut self, items: &[ContentItem]) -> Vec<Run> {
        let mut pieces = Vec::new();
        let mut index = 0;
        while index < items.len() {
            let item = &items[index];
            if let ContentItem::CommentPoint(id) = item {
                if let Some(comment) = self.comment(id) {
                    pieces.push(Piece::Fixed(Run::Comment(comment)));
                }
                index += 1;
                continue;
            }
            let set = match item.comments() {
                Some(set) if !set.is_empty() => set,
                _ => {
                    if let Some((run, revision)) = self.content(item) {
                        pieces.push(Piece::Content(run, revision));
                    }
                    index += 1;
                    continue;
                }
            };

            let end = group_end(items, index, set);
            let runs = items[index..end]
                .iter()
                .filter_map(|item| self.content(item).map(|(run, _)| run))
                .collect();
            let comment = set.iter().next().and_then(|id| self.comment(id));
            pieces.push(Piece::Fixed(Run::Highlight { runs, comment }));
            index = end;
        }
        group_revisions(pieces)
    }

    fn identified(&mut self, unit: usize, items: &[ContentItem], plan: &IdPlan) -> Vec<Run> {
        let mut pieces = Vec::new();
        let mut closed = Vec::new();
        for (position, item) in items.iter().enumerate() {
            if let ContentItem::CommentPoint(id) = item {
                if let Some(comment) = self.comment(id) {
                    pieces.push(Piece::Fixed(Run::Comment(comment)));
                }
                continue;
            }
            if let Some(numbers) = plan.starts.get(&(unit, position)) {
                for number in numbers {
                    pieces.push(Piece::Fixed(Run::CommentStart(number.to_string())));
                }
            }
            if let Some((run, revision)) = self.content(item) {
                pieces.push(Piece::Content(run, revision));
            }
            if let Some(numbers) = plan.ends.get(&(unit, position)) {
                for &number in numbers {
                    pieces.push(Piece::Fixed(Run::CommentEnd(number.to_string())));
                    closed.push(number);
                }
            }
        }
        for number in closed {
            if let Some(comment) = self.comment(plan.original(number)) {
                pieces.push(Piece::Fixed(Run::CommentBody {
                    id: number.to_string(),
                    comment,
                }));
            }
        }
        group_revisions(pieces)
    }
}

/// End (exclusive) of the bracket group starting at `start`: spans with the same comment set,
/// line breaks allowed between them.
fn group_end(items: &[ContentItem], start: usize, set: &CommentSet) -> usize {
    let mut end = start + 1;
    let mut probe = end;
    while probe < items.len() {
        match &items[probe] {
            ContentItem::Break => probe += 1,
            item if item.comments() == Some(set) => {
                probe += 1;
                end = probe;
            }
            _ => break,
        }
    }
    end
}

fn group_revisions(pieces: Vec<Piece>) -> Vec<Run> {
    fn flush(pending: Option<(Revision, Vec<Run>)>, out: &mut Vec<Run>) {
        match pending {
            Some((Revision::Insert, new)) => {
                if let Some(Run::Delete(_)) = out.last() {
                    if let Some(Run::Delete(old)) = out.pop() {
                        out.push(Run::Substitute { old, new });
                    }
                } else {
                    out.push(Run::Insert(new));
                }
            }
            Some((Revision::Delete, old)) => out.push(Run::Delete(old)),
            None => {}
        }
    }

    let mut out = Vec::new();
    let mut pending: Option<(Revision, Vec<Run>)> = None;
    for piece in pieces {
        match piece {
            Piece::Content(run, Some(revision)) => match &mut pending {
                Some((kind, runs)) if *kind == revision => runs.push(run),
                _ => {
                    flush(pending.take(), &mut out);
                    pending = Some((revision, vec![run]));
                }
            },
            Piece::Content(run, None) | Piece::Fixed(run) => {
                flush(pending.take(), &mut out);
                out.push(run);
            }
        }
    }
    flush(pending, &mut out);
    out
}
