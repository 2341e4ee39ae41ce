//! Word document extraction into the content-item stream.
//!
//! The main document part is parsed into the typed tree and walked in document order. The walk
//! keeps the state Word spreads over sibling elements: the formatting of the current run, the
//! active hyperlink, the set of comments whose range is open, the tracked-change kind and the
//! field accumulator. Each paragraph produces a marker followed by its inline items; tables
//! produce one item holding the item streams of their cells.
//!
//! Optional parts (comments, numbering, relationships) that are missing or broken only degrade
//! the output and raise a warning. A missing or unreadable `word/document.xml` is an error.

use super::citations::find_literals;
use super::numbering::Numbering;
use super::package::{Package, COMMENTS, DOCUMENT, DOCUMENT_RELS, NUMBERING};
use super::parts::{LITERAL_CITATION_STYLE, QUOTE_INDENT_TWIPS};
use super::tree::{self, Element, Tag};
use crate::collaborators::{Environment, MathConverter};
use crate::common::fields::{citation_keys, Disposition, FieldAccumulator, FieldKind};
use crate::common::overlap::{self, Encoding};
use crate::error::{record, FormatError, Warning};
use crate::ir::items::{
    merge_adjacent_text, CitationItem, CommentSet, ContentItem, MathItem, ParagraphMarker,
    Revision, TableItem, TextItem,
};
use crate::ir::nodes::{Block, Comment, Formatting};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeMap, HashMap, HashSet};

/// LaTeX written for equations the converter cannot read.
pub const MATH_PLACEHOLDER: &str = r"\text{[equation]}";

static HEADING_STYLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[Hh]eading ?([1-9])$").expect("heading style pattern"));

/// Extracted blocks plus the comment encoding chosen for them.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub blocks: Vec<Block>,
    pub encoding: Encoding,
    pub warnings: Vec<Warning>,
}

pub fn extract(bytes: &[u8], env: &Environment<'_>) -> Result<Extraction, FormatError> {
    let package = Package::read(bytes)?;
    let document = match package.text(DOCUMENT) {
        None => return Err(FormatError::MissingPart(DOCUMENT.to_string())),
        Some(Err(e)) => return Err(FormatError::ParseError(format!("{DOCUMENT}: {e}"))),
        Some(Ok(text)) => {
            tree::parse(text).map_err(|e| FormatError::ParseError(format!("{DOCUMENT}: {e}")))?
        }
    };
    let body = document
        .child(&Tag::Body)
        .ok_or_else(|| FormatError::ParseError(format!("{DOCUMENT}: no w:body element")))?;

    let mut warnings = Vec::new();
    let relationships = OptionalPart::load(&package, DOCUMENT_RELS, parse_relationships, &mut warnings);
    let numbering = OptionalPart::load(&package, NUMBERING, Numbering::parse, &mut warnings);
    let mut comments = OptionalPart::load(&package, COMMENTS, parse_comments, &mut warnings);

    let mut walker = Walker {
        relationships,
        numbering,
        math: env.math,
        fields: FieldAccumulator::new(),
        active: CommentSet::new(),
        started: HashSet::new(),
        spanned: HashSet::new(),
        items: Vec::new(),
        has_bibliography: false,
        warnings,
    };
    walker.block_container(body);

    let Walker {
        items,
        has_bibliography,
        mut warnings,
        started,
        ..
    } = walker;
    let items = recognize_literal_citations(merge_adjacent_text(items));
    let mut items = merge_adjacent_text(items);
    if has_bibliography {
        truncate_at_sources(&mut items, &env.options.sources_heading);
    }

    let referenced = !started.is_empty()
        || items
            .iter()
            .any(|item| matches!(item, ContentItem::CommentPoint(_)));
    let empty = BTreeMap::new();
    let comment_map = if referenced {
        comments.get(&mut warnings).unwrap_or(&empty)
    } else {
        &empty
    };

    tracing::debug!(items = items.len(), has_bibliography, "document walked");
    let resolved = overlap::resolve(items, comment_map, &env.options);
    warnings.extend(resolved.warnings);
    Ok(Extraction {
        blocks: resolved.blocks,
        encoding: resolved.encoding,
        warnings,
    })
}

/// An optional part; absence is reported the first time the part is needed.
struct OptionalPart<T> {
    value: Option<T>,
    missing: Option<&'static str>,
}

impl<T> OptionalPart<T> {
    fn load(
        package: &Package,
        name: &'static str,
        parse: impl FnOnce(&Element) -> T,
        warnings: &mut Vec<Warning>,
    ) -> Self {
        let unavailable = |reason: String, warnings: &mut Vec<Warning>| {
            record(
                warnings,
                Warning::PartUnavailable {
                    part: name.to_string(),
                    reason,
                },
            );
            OptionalPart {
                value: None,
                missing: None,
            }
        };
        match package.text(name) {
            None => OptionalPart {
                value: None,
                missing: Some(name),
            },
            Some(Err(e)) => unavailable(e.to_string(), warnings),
            Some(Ok(text)) => match tree::parse(text) {
                Ok(root) => OptionalPart {
                    value: Some(parse(&root)),
                    missing: None,
                },
                Err(e) => unavailable(e.to_string(), warnings),
            },
        }
    }

    fn get(&mut self, warnings: &mut Vec<Warning>) -> Option<&T> {
        if let Some(part) = self.missing.take() {
            record(
                warnings,
                Warning::PartUnavailable {
                    part: part.to_string(),
                    reason: "part is missing from the package".to_string(),
                },
            );
        }
        self.value.as_ref()
    }
}

fn parse_relationships(root: &Element) -> HashMap<String, String> {
    root.elements()
        .filter(|e| e.name.ends_with("Relationship"))
        .filter_map(|rel| Some((rel.attr("Id")?.to_string(), rel.attr("Target")?.to_string())))
        .collect()
}

fn parse_comments(root: &Element) -> BTreeMap<String, Comment> {
    root.elements()
        .filter(|e| e.name == "w:comment")
        .filter_map(|comment| {
            let id = comment.attr("w:id")?.to_string();
            let author = comment
                .attr("w:author")
                .map(str::trim)
                .filter(|a| !a.is_empty())
                .map(str::to_string);
            let timestamp = comment
                .attr("w:date")
                .filter(|d| !d.is_empty())
                .map(str::to_string);
            let paragraphs: Vec<String> = comment
                .elements()
                .filter(|e| e.tag == Tag::Paragraph)
                .map(visible_text)
                .map(|text| text.trim().to_string())
                .filter(|text| !text.is_empty())
                .collect();
            Some((
                id,
                Comment {
                    author,
                    timestamp,
                    body: paragraphs.join(" "),
                },
            ))
        })
        .collect()
}

/// Text of the `w:t` descendants only.
fn visible_text(element: &Element) -> String {
    let mut out = String::new();
    for child in element.elements() {
        match child.tag {
            Tag::Text => out.push_str(&child.text()),
            Tag::Tab => out.push('\t'),
            _ => out.push_str(&visible_text(child)),
        }
    }
    out
}

/// Styling inherited by the runs inside an element.
#[derive(Debug, Clone, Default)]
struct RunState {
    format: Formatting,
    link: Option<String>,
    revision: Option<Revision>,
}

struct Walker<'m> {
    relationships: OptionalPart<HashMap<String, String>>,
    numbering: OptionalPart<Numbering>,
    math: &'m dyn MathConverter,
    fields: FieldAccumulator,
    active: CommentSet,
    /// Comments whose range start has been seen
    started: HashSet<String>,
    /// Comments that cover at least one span
    spanned: HashSet<String>,
    items: Vec<ContentItem>,
    has_bibliography: bool,
    warnings: Vec<Warning>,
}

impl Walker<'_> {
    /// Body, cell or content-control children: paragraphs and tables.
    fn block_container(&mut self, container: &Element) {
        for child in container.elements() {
            match child.tag {
                Tag::Paragraph => self.paragraph(child),
                Tag::Table => self.table(child),
                Tag::Container => self.block_container(child),
                Tag::CommentRangeStart | Tag::CommentRangeEnd => {
                    self.inline(child, &RunState::default())
                }
                _ => {}
            }
        }
    }

    fn table(&mut self, table: &Element) {
        let outer = std::mem::take(&mut self.items);
        let mut rows = Vec::new();
        let mut header = false;
        for (index, row) in table.elements().filter(|e| e.tag == Tag::TableRow).enumerate() {
            if index == 0 {
                header = row
                    .child(&Tag::TableRowProps)
                    .and_then(|props| props.child_named("w:tblHeader"))
                    .is_some_and(|flag| !is_off(flag));
            }
            let mut cells = Vec::new();
            for cell in row.elements() {
                match cell.tag {
                    Tag::TableCell => {
                        self.block_container(cell);
                        cells.push(std::mem::take(&mut self.items));
                    }
                    Tag::Container => {
                        for inner in cell.elements().flat_map(|e| e.elements()) {
                            if inner.tag == Tag::TableCell {
                                self.block_container(inner);
                                cells.push(std::mem::take(&mut self.items));
                            }
                        }
                    }
                    _ => {}
                }
            }
            rows.push(cells);
        }
        self.items = outer;
        self.items.push(ContentItem::Table(TableItem { rows, header }));
    }

    fn paragraph(&mut self, paragraph: &Element) {
        let props = paragraph.child(&Tag::ParagraphProps);
        let marker = match props {
            Some(props) => self.paragraph_marker(props),
            None => ParagraphMarker::default(),
        };
        let bordered = props
            .and_then(|p| p.child_named("w:pBdr"))
            .and_then(|border| border.child_named("w:bottom"))
            .is_some();

        let marker_index = self.items.len();
        self.items.push(ContentItem::Paragraph(marker));
        let state = RunState::default();
        for child in paragraph.elements() {
            if child.tag != Tag::ParagraphProps {
                self.inline(child, &state);
            }
        }
        let empty = self.items.len() == marker_index + 1;
        if bordered && empty {
            if let Some(ContentItem::Paragraph(marker)) = self.items.get_mut(marker_index) {
                marker.rule = true;
            }
        }
    }

    fn paragraph_marker(&mut self, props: &Element) -> ParagraphMarker {
        let mut marker = ParagraphMarker::default();
        let style = props.child_val("w:pStyle").unwrap_or_default();

        if let Some(caps) = HEADING_STYLE.captures(style) {
            let level: u8 = caps[1].parse().unwrap_or(0);
            if (1..=6).contains(&level) {
                marker.heading = Some(level);
            }
        }
        match style {
            "Quote" | "IntenseQuote" => {
                let indent = props
                    .child_named("w:ind")
                    .and_then(|ind| ind.attr("w:left").or_else(|| ind.attr("w:start")))
                    .and_then(|left| left.parse::<usize>().ok())
                    .unwrap_or(0);
                marker.quote_level = Some((indent / QUOTE_INDENT_TWIPS).max(1));
            }
            "SourceCode" => marker.code = true,
            _ => {}
        }

        if let Some(num_pr) = props.child_named("w:numPr") {
            let level = num_pr
                .child_val("w:ilvl")
                .and_then(|l| l.parse().ok())
                .unwrap_or(0);
            if let Some(num_id) = num_pr.child_val("w:numId") {
                marker.list = self
                    .numbering
                    .get(&mut self.warnings)
                    .and_then(|numbering| numbering.resolve(num_id, level));
            }
        }
        marker
    }

    fn inline(&mut self, element: &Element, state: &RunState) {
        match &element.tag {
            Tag::Run => self.run(element, state),
            Tag::Hyperlink => {
                let link = element
                    .attr("r:id")
                    .and_then(|id| {
                        self.relationships
                            .get(&mut self.warnings)
                            .and_then(|rels| rels.get(id).cloned())
                    })
                    .or_else(|| element.attr("w:anchor").map(|anchor| format!("#{anchor}")));
                let inner = RunState {
                    link: link.or_else(|| state.link.clone()),
                    ..state.clone()
                };
                self.inline_children(element, &inner);
            }
            Tag::Inserted | Tag::Deleted => {
                let revision = if element.tag == Tag::Inserted {
                    Revision::Insert
                } else {
                    Revision::Delete
                };
                let inner = RunState {
                    revision: Some(revision),
                    ..state.clone()
                };
                self.inline_children(element, &inner);
            }
            Tag::Container => self.inline_children(element, state),
            Tag::CommentRangeStart => {
                if let Some(id) = element.attr("w:id") {
                    self.active.insert(id.to_string());
                    self.started.insert(id.to_string());
                }
            }
            Tag::CommentRangeEnd => {
                if let Some(id) = element.attr("w:id") {
                    self.active.remove(id);
                    if !self.spanned.contains(id) && self.started.contains(id) {
                        self.items.push(ContentItem::CommentPoint(id.to_string()));
                        self.spanned.insert(id.to_string());
                    }
                }
            }
            Tag::SimpleField => {
                self.fields.begin();
                self.fields.instruction(element.attr("w:instr").unwrap_or_default());
                self.fields.separate();
                self.inline_children(element, state);
                self.field_end();
            }
            Tag::MathPara => {
                for math in element.elements().filter(|e| e.tag == Tag::Math) {
                    self.math(math, true);
                }
            }
            Tag::Math => self.math(element, false),
            _ => {}
        }
    }

    fn inline_children(&mut self, element: &Element, state: &RunState) {
        for child in element.elements() {
            self.inline(child, state);
        }
    }

    fn run(&mut self, run: &Element, state: &RunState) {
        let mut format = state.format.clone();
        let mut literal = false;
        if let Some(props) = run.child(&Tag::RunProps) {
            apply_run_properties(&mut format, props);
            literal = props.child_val("w:rStyle") == Some(LITERAL_CITATION_STYLE);
        }
        for child in run.elements() {
            match &child.tag {
                Tag::Text | Tag::DeletedText => self.text(&child.text(), &format, state, literal),
                Tag::Tab => self.text("\t", &format, state, literal),
                Tag::Break => {
                    let page = matches!(child.attr("w:type"), Some("page" | "column"));
                    if !page && self.fields.disposition() == Disposition::Pass {
                        self.items.push(ContentItem::Break);
                    }
                }
                Tag::FieldChar => match child.attr("w:fldCharType") {
                    Some("begin") => self.fields.begin(),
                    Some("separate") => self.fields.separate(),
                    Some("end") => self.field_end(),
                    _ => {}
                },
                Tag::InstrText => self.fields.instruction(&child.text()),
                Tag::CommentReference => {
                    if let Some(id) = child.attr("w:id") {
                        if !self.started.contains(id) && !self.spanned.contains(id) {
                            self.items.push(ContentItem::CommentPoint(id.to_string()));
                            self.spanned.insert(id.to_string());
                        }
                    }
                }
                Tag::Other(name) if name == "w:noBreakHyphen" => {
                    self.text("-", &format, state, literal)
                }
                _ => {}
            }
        }
    }

    fn text(&mut self, text: &str, format: &Formatting, state: &RunState, literal: bool) {
        if text.is_empty() {
            return;
        }
        match self.fields.disposition() {
            Disposition::Pass => {
                self.spanned.extend(self.active.iter().cloned());
                self.items.push(ContentItem::Text(TextItem {
                    text: text.to_string(),
                    comments: self.active.clone(),
                    format: format.clone(),
                    link: state.link.clone(),
                    revision: state.revision,
                    literal_citation: literal,
                }));
            }
            Disposition::Capture => self.fields.capture(text),
            Disposition::Suppress => {}
        }
    }

    fn field_end(&mut self) {
        let Some(field) = self.fields.end() else {
            return;
        };
        match field.kind {
            FieldKind::Bibliography => self.has_bibliography = true,
            FieldKind::Citation if self.fields.disposition() == Disposition::Pass => {
                self.spanned.extend(self.active.iter().cloned());
                match citation_keys(&field.instruction) {
                    Ok(keys) => self.items.push(ContentItem::Citation(CitationItem {
                        text: field.result,
                        comments: self.active.clone(),
                        keys,
                    })),
                    Err(reason) => {
                        record(
                            &mut self.warnings,
                            Warning::MalformedField {
                                instruction: field.instruction.trim().chars().take(60).collect(),
                                reason,
                            },
                        );
                        self.items.push(ContentItem::Text(TextItem {
                            text: field.result,
                            comments: self.active.clone(),
                            format: Formatting::default(),
                            link: None,
                            revision: None,
                            literal_citation: false,
                        }));
                    }
                }
            }
            FieldKind::Citation | FieldKind::Other => {}
        }
    }

    fn math(&mut self, math: &Element, display: bool) {
        if self.fields.disposition() != Disposition::Pass {
            return;
        }
        let omml = math.to_xml();
        let latex = match self.math.omml_to_latex(&omml) {
            Ok(latex) => latex,
            Err(err) => {
                record(
                    &mut self.warnings,
                    Warning::MathConversion {
                        source: math.text(),
                        reason: err.to_string(),
                    },
                );
                MATH_PLACEHOLDER.to_string()
            }
        };
        self.spanned.extend(self.active.iter().cloned());
        self.items.push(ContentItem::Math(MathItem {
            latex,
            display,
            comments: self.active.clone(),
        }));
    }
}

/// `w:val="0"`, `"false"` and `"off"` switch a toggle property off.
fn is_off(element: &Element) -> bool {
    matches!(element.attr("w:val"), Some("0" | "false" | "off"))
}

/// Override the toggles a run's `w:rPr` specifies; everything else is inherited.
fn apply_run_properties(format: &mut Formatting, props: &Element) {
    for prop in props.elements() {
        let on = !is_off(prop);
        match prop.name.as_str() {
            "w:b" => format.bold = on,
            "w:i" => format.italic = on,
            "w:strike" | "w:dstrike" => format.strikethrough = on,
            "w:u" => format.underline = on && prop.attr("w:val") != Some("none"),
            "w:highlight" => {
                format.highlight = prop
                    .attr("w:val")
                    .filter(|color| *color != "none")
                    .map(str::to_string)
            }
            "w:vertAlign" => {
                let align = prop.attr("w:val").unwrap_or("baseline");
                format.superscript = align == "superscript";
                format.subscript = align == "subscript";
            }
            "w:rStyle" => {
                if prop.attr("w:val") == Some("VerbatimChar") {
                    format.code = true;
                }
            }
            _ => {}
        }
    }
}

/// Split literal `(@key)` citations out of text written with the unresolved-citation style.
///
/// Prose that merely looks like `(@handle)` is left alone. A literal that directly follows a
/// citation field after a single space continues that cluster, which is how mixed
/// resolved/unresolved clusters are written.
fn recognize_literal_citations(items: Vec<ContentItem>) -> Vec<ContentItem> {
    let mut out: Vec<ContentItem> = Vec::with_capacity(items.len());
    for item in items {
        let text = match item {
            ContentItem::Text(text)
                if text.literal_citation && text.revision.is_none() && text.link.is_none() =>
            {
                text
            }
            ContentItem::Table(table) => {
                out.push(ContentItem::Table(TableItem {
                    header: table.header,
                    rows: table
                        .rows
                        .into_iter()
                        .map(|row| row.into_iter().map(recognize_literal_citations).collect())
                        .collect(),
                }));
                continue;
            }
            other => {
                out.push(other);
                continue;
            }
        };
        let literals = find_literals(&text.text);
        if literals.is_empty() {
            out.push(ContentItem::Text(text));
            continue;
        }

        let piece = |range: std::ops::Range<usize>| TextItem {
            text: text.text[range].to_string(),
            literal_citation: false,
            ..text.clone()
        };
        let mut cursor = 0;
        for literal in literals {
            let before = &text.text[cursor..literal.start];
            let continues = before == " "
                && matches!(out.last(), Some(ContentItem::Citation(c)) if c.comments == text.comments);
            if continues {
                if let Some(ContentItem::Citation(previous)) = out.last_mut() {
                    previous.keys.extend(literal.keys);
                    previous.text.push_str(&text.text[cursor..literal.end]);
                }
            } else {
                if !before.is_empty() {
                    out.push(ContentItem::Text(piece(cursor..literal.start)));
                }
                out.push(ContentItem::Citation(CitationItem {
                    text: text.text[literal.start..literal.end].to_string(),
                    comments: text.comments.clone(),
                    keys: literal.keys,
                }));
            }
            cursor = literal.end;
        }
        if cursor < text.text.len() {
            out.push(ContentItem::Text(piece(cursor..text.text.len())));
        }
    }
    out
}

/// Drop the generated bibliography: everything from the last sources heading on.
fn truncate_at_sources(items: &mut Vec<ContentItem>, heading: &str) {
    let mut cut = None;
    for (index, item) in items.iter().enumerate() {
        let ContentItem::Paragraph(marker) = item else {
            continue;
        };
        if marker.heading.is_none() {
            continue;
        }
        let text: String = items[index + 1..]
            .iter()
            .take_while(|i| !matches!(i, ContentItem::Paragraph(_) | ContentItem::Table(_)))
            .filter_map(|i| match i {
                ContentItem::Text(t) => Some(t.text.as_str()),
                _ => None,
            })
            .collect();
        if text.trim() == heading.trim() {
            cut = Some(index);
        }
    }
    if let Some(index) = cut {
        tracing::debug!(index, "dropping generated bibliography");
        items.truncate(index);
    }
}
