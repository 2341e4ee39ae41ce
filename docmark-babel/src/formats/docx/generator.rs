//! Word document generation from the block model.
//!
//! Every block becomes one XML paragraph (tables become `w:tbl`). The walk carries a
//! [GenerationState] by `&mut` that owns everything shared across the document: comment IDs and
//! metadata, hyperlink relationships, revision IDs, citation bookkeeping and warnings. The state
//! is created per call and decides which optional parts the package gets.

use super::citations::{bibliography_instruction, citation_instruction, unresolved_literal};
use super::package::{
    Package, COMMENTS, CONTENT_TYPES, DOCUMENT, DOCUMENT_RELS, NUMBERING, PACKAGE_RELS, STYLES,
};
use super::parts::{
    self, BULLET_NUM_ID, LITERAL_CITATION_STYLE, MAX_LIST_LEVEL, ORDERED_NUM_ID,
    QUOTE_INDENT_TWIPS,
};
use super::xml::{escape_attr, escape_text, M_NS, R_NS, W_NS, XML_DECLARATION};
use crate::bibliography::{fallback_bibliography, fallback_cluster, BibEntry};
use crate::collaborators::Environment;
use crate::common::overlap::{collect_comment_bodies, IdAllocator};
use crate::error::{record, FormatError, Warning};
use crate::ir::items::Revision;
use crate::ir::nodes::{
    for_each_run_list, walk_runs, Block, CiteKey, Citation, Comment, Formatting, Math, Run, Table,
    TextRun,
};
use std::collections::{BTreeMap, BTreeSet};

/// First relationship number handed to hyperlinks; lower numbers belong to fixed parts.
const FIRST_HYPERLINK_REL: usize = 10;

const PLACEHOLDER_OMML: &str =
    "<m:oMath><m:r><m:t xml:space=\"preserve\">[equation]</m:t></m:r></m:oMath>";

const SECTION_PROPERTIES: &str = "<w:sectPr><w:pgSz w:w=\"12240\" w:h=\"15840\"/>\
    <w:pgMar w:top=\"1440\" w:right=\"1440\" w:bottom=\"1440\" w:left=\"1440\" \
    w:header=\"720\" w:footer=\"720\" w:gutter=\"0\"/></w:sectPr>";

/// Document-wide state of one generation run.
#[derive(Debug)]
pub struct GenerationState {
    pub comment_ids: IdAllocator,
    /// Comment metadata by numeric ID
    pub comments: Vec<(usize, Comment)>,
    /// (URL, relationship ID) in allocation order
    pub hyperlinks: Vec<(String, String)>,
    next_rel: usize,
    next_revision: usize,
    pub warnings: Vec<Warning>,
    pub uses_lists: bool,
    pub has_comments: bool,
    pub unresolved: BTreeSet<String>,
    /// Identifier bodies collected before the walk
    bodies: BTreeMap<String, Comment>,
    /// Identifier keys that have a start or end marker somewhere
    ranged: BTreeSet<String>,
    registered: BTreeSet<String>,
    open: Vec<String>,
    /// Resolved keys in order of first citation
    cited: Vec<String>,
    clusters: usize,
    engine_usable: bool,
}

impl Default for GenerationState {
    fn default() -> Self {
        GenerationState {
            comment_ids: IdAllocator::new(0),
            comments: Vec::new(),
            hyperlinks: Vec::new(),
            next_rel: FIRST_HYPERLINK_REL,
            next_revision: 1,
            warnings: Vec::new(),
            uses_lists: false,
            has_comments: false,
            unresolved: BTreeSet::new(),
            bodies: BTreeMap::new(),
            ranged: BTreeSet::new(),
            registered: BTreeSet::new(),
            open: Vec::new(),
            cited: Vec::new(),
            clusters: 0,
            engine_usable: true,
        }
    }
}

impl GenerationState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Relationship ID for a URL; one relationship per distinct URL.
    pub fn hyperlink_id(&mut self, url: &str) -> String {
        if let Some((_, id)) = self.hyperlinks.iter().find(|(known, _)| known == url) {
            return id.clone();
        }
        let id = format!("rId{}", self.next_rel);
        self.next_rel += 1;
        self.hyperlinks.push((url.to_string(), id.clone()));
        id
    }

    pub fn revision_id(&mut self) -> usize {
        let id = self.next_revision;
        self.next_revision += 1;
        id
    }

    fn add_comment(&mut self, id: usize, comment: Comment) {
        self.comments.push((id, comment));
        self.has_comments = true;
    }

    /// Numeric ID of an identifier comment, registering its metadata on first use.
    fn identified_comment(&mut self, key: &str) -> usize {
        let id = self.comment_ids.allocate(key);
        if self.registered.insert(key.to_string()) {
            let comment = match self.bodies.get(key) {
                Some(comment) => comment.clone(),
                None => {
                    record(
                        &mut self.warnings,
                        Warning::MissingCommentBody { id: key.to_string() },
                    );
                    Comment::default()
                }
            };
            self.add_comment(id, comment);
        }
        id
    }
}

/// A generated package and the warnings raised while building it.
#[derive(Debug)]
pub struct Generation {
    pub package: Package,
    pub warnings: Vec<Warning>,
}

pub fn generate(blocks: &[Block], env: &mut Environment<'_>) -> Result<Generation, FormatError> {
    let mut state = GenerationState::new();
    state.bodies = collect_comment_bodies(blocks);
    for_each_run_list(blocks, |runs| {
        walk_runs(runs, &mut |run| match run {
            Run::CommentStart(key) | Run::CommentEnd(key) => {
                state.ranged.insert(key.clone());
            }
            _ => {}
        })
    });

    let mut writer = Writer {
        env,
        state,
        body: String::new(),
    };
    writer.register_citations(blocks);
    for block in blocks {
        writer.block(block)?;
    }
    if matches!(blocks.last(), Some(Block::Table(_))) {
        writer.body.push_str("<w:p/>");
    }
    writer.close_dangling_ranges();
    writer.bibliography()?;

    let Writer {
        mut state, body, ..
    } = writer;
    tracing::debug!(
        comments = state.comments.len(),
        hyperlinks = state.hyperlinks.len(),
        lists = state.uses_lists,
        "document generated"
    );

    let document = format!(
        "{XML_DECLARATION}<w:document xmlns:w=\"{W_NS}\" xmlns:r=\"{R_NS}\" xmlns:m=\"{M_NS}\">\
         <w:body>{body}{SECTION_PROPERTIES}</w:body></w:document>"
    );

    let mut package = Package::new();
    package.insert(
        CONTENT_TYPES,
        parts::content_types(state.uses_lists, state.has_comments),
    );
    package.insert(PACKAGE_RELS, parts::package_relationships());
    package.insert(DOCUMENT, document);
    package.insert(
        DOCUMENT_RELS,
        parts::document_relationships(state.uses_lists, state.has_comments, &state.hyperlinks),
    );
    package.insert(STYLES, parts::styles());
    if state.uses_lists {
        package.insert(NUMBERING, parts::numbering());
    }
    if state.has_comments {
        state.comments.sort_by_key(|(id, _)| *id);
        package.insert(COMMENTS, parts::comments(&state.comments));
    }

    Ok(Generation {
        package,
        warnings: state.warnings,
    })
}

/// Inherited run styling.
#[derive(Debug, Clone, Default)]
struct Context {
    /// Header cells are bold
    bold: bool,
    /// Highlight applied to runs without their own
    highlight: Option<String>,
    revision: Option<Revision>,
}

struct Writer<'e, 'a> {
    env: &'e mut Environment<'a>,
    state: GenerationState,
    body: String,
}

impl Writer<'_, '_> {
    fn block(&mut self, block: &Block) -> Result<(), FormatError> {
        let ctx = Context::default();
        match block {
            Block::Paragraph(runs) => self.paragraph("", runs, &ctx),
            Block::Heading { level, runs } => {
                let level = (*level).clamp(1, 6);
                self.paragraph(&format!("<w:pStyle w:val=\"Heading{level}\"/>"), runs, &ctx)
            }
            Block::ListItem {
                ordered,
                level,
                runs,
            } => {
                self.state.uses_lists = true;
                let num_id = if *ordered {
                    ORDERED_NUM_ID
                } else {
                    BULLET_NUM_ID
                };
                let level = (*level).min(MAX_LIST_LEVEL);
                self.paragraph(
                    &format!(
                        "<w:numPr><w:ilvl w:val=\"{level}\"/><w:numId w:val=\"{num_id}\"/></w:numPr>"
                    ),
                    runs,
                    &ctx,
                )
            }
            Block::BlockQuote { level, runs } => {
                let indent = (*level).max(1) * QUOTE_INDENT_TWIPS;
                self.paragraph(
                    &format!("<w:pStyle w:val=\"Quote\"/><w:ind w:left=\"{indent}\"/>"),
                    runs,
                    &ctx,
                )
            }
            Block::CodeBlock { code, .. } => {
                self.body
                    .push_str("<w:p><w:pPr><w:pStyle w:val=\"SourceCode\"/></w:pPr>");
                for (index, line) in code.split('\n').enumerate() {
                    if index > 0 {
                        self.body.push_str("<w:r><w:br/></w:r>");
                    }
                    self.text(&TextRun::plain(line), &ctx);
                }
                self.body.push_str("</w:p>");
                Ok(())
            }
            Block::Table(table) => self.table(table),
            Block::HorizontalRule => {
                self.body.push_str(
                    "<w:p><w:pPr><w:pBdr><w:bottom w:val=\"single\" w:sz=\"6\" w:space=\"1\" \
                     w:color=\"auto\"/></w:pBdr></w:pPr></w:p>",
                );
                Ok(())
            }
        }
    }

    fn paragraph(&mut self, properties: &str, runs: &[Run], ctx: &Context) -> Result<(), FormatError> {
        self.body.push_str("<w:p>");
        if !properties.is_empty() {
            self.body.push_str("<w:pPr>");
            self.body.push_str(properties);
            self.body.push_str("</w:pPr>");
        }
        self.runs(runs, ctx)?;
        self.body.push_str("</w:p>");
        Ok(())
    }

    fn table(&mut self, table: &Table) -> Result<(), FormatError> {
        let columns = table.column_count().max(1);
        self.body.push_str(
            "<w:tbl><w:tblPr><w:tblStyle w:val=\"Table\"/><w:tblW w:w=\"0\" w:type=\"auto\"/>\
             <w:tblLook w:val=\"04A0\" w:firstRow=\"1\"/></w:tblPr><w:tblGrid>",
        );
        for _ in 0..columns {
            self.body.push_str("<w:gridCol w:w=\"2000\"/>");
        }
        self.body.push_str("</w:tblGrid>");

        for (index, row) in table.rows.iter().enumerate() {
            let header = table.header && index == 0;
            self.body.push_str("<w:tr>");
            if header {
                self.body.push_str("<w:trPr><w:tblHeader/></w:trPr>");
            }
            let ctx = Context {
                bold: header,
                ..Default::default()
            };
            for column in 0..columns {
                self.body.push_str(
                    "<w:tc><w:tcPr><w:tcW w:w=\"0\" w:type=\"auto\"/></w:tcPr><w:p>",
                );
                if let Some(cell) = row.cells.get(column) {
                    self.runs(&cell.runs, &ctx)?;
                }
                self.body.push_str("</w:p></w:tc>");
            }
            self.body.push_str("</w:tr>");
        }
        self.body.push_str("</w:tbl>");
        Ok(())
    }

    fn runs(&mut self, runs: &[Run], ctx: &Context) -> Result<(), FormatError> {
        for run in runs {
            self.run(run, ctx)?;
        }
        Ok(())
    }

    fn run(&mut self, run: &Run, ctx: &Context) -> Result<(), FormatError> {
        match run {
            Run::Text(text) => self.text(text, ctx),
            Run::Insert(runs) => self.revised(runs, ctx, Revision::Insert)?,
            Run::Delete(runs) => self.revised(runs, ctx, Revision::Delete)?,
            Run::Substitute { old, new } => {
                self.revised(old, ctx, Revision::Delete)?;
                self.revised(new, ctx, Revision::Insert)?;
            }
            Run::Highlight { runs, comment } => {
                let highlighted = Context {
                    highlight: Some(self.env.options.highlight_color.clone()),
                    ..ctx.clone()
                };
                match comment {
                    Some(comment) => {
                        let id = self.state.comment_ids.fresh();
                        self.state.add_comment(id, comment.clone());
                        self.range_start(id);
                        self.runs(runs, &highlighted)?;
                        self.range_end(id);
                    }
                    None => self.runs(runs, &highlighted)?,
                }
            }
            Run::Comment(comment) => {
                let id = self.state.comment_ids.fresh();
                self.state.add_comment(id, comment.clone());
                self.range_start(id);
                self.range_end(id);
            }
            Run::CommentStart(key) => {
                let id = self.state.identified_comment(key);
                if !self.state.open.contains(key) {
                    self.state.open.push(key.clone());
                }
                self.range_start(id);
            }
            Run::CommentEnd(key) => {
                let started = self.state.open.iter().position(|k| k == key);
                let id = self.state.identified_comment(key);
                match started {
                    Some(index) => {
                        self.state.open.remove(index);
                    }
                    None => self.range_start(id),
                }
                self.range_end(id);
            }
            Run::CommentBody { id: key, .. } => {
                if !self.state.ranged.contains(key) && self.state.comment_ids.get(key).is_none() {
                    let id = self.state.identified_comment(key);
                    self.range_start(id);
                    self.range_end(id);
                }
            }
            Run::Citation(citation) => self.citation(citation, ctx)?,
            Run::Math(math) => self.math(math),
            Run::SoftBreak => self.text(&TextRun::plain(" "), ctx),
            Run::LineBreak => self.body.push_str("<w:r><w:br/></w:r>"),
        }
        Ok(())
    }

    fn revised(&mut self, runs: &[Run], ctx: &Context, revision: Revision) -> Result<(), FormatError> {
        let ctx = Context {
            revision: Some(revision),
            ..ctx.clone()
        };
        self.runs(runs, &ctx)
    }

    fn text(&mut self, run: &TextRun, ctx: &Context) {
        let style = run.link.as_ref().map(|_| "Hyperlink");
        self.styled_text(run, ctx, style);
    }

    fn styled_text(&mut self, run: &TextRun, ctx: &Context, style: Option<&str>) {
        let mut format = run.format.clone();
        format.bold |= ctx.bold;
        if format.highlight.is_none() {
            format.highlight = ctx.highlight.clone();
        }
        let text_tag = match ctx.revision {
            Some(Revision::Delete) => "w:delText",
            _ => "w:t",
        };

        let mut content = String::new();
        for (index, piece) in run.text.split('\t').enumerate() {
            if index > 0 {
                content.push_str("<w:tab/>");
            }
            if !piece.is_empty() {
                content.push_str(&format!(
                    "<{text_tag} xml:space=\"preserve\">{}</{text_tag}>",
                    escape_text(piece)
                ));
            }
        }
        if content.is_empty() {
            return;
        }
        let mut xml = format!(
            "<w:r>{}{content}</w:r>",
            run_properties(&format, style)
        );

        if let Some(revision) = ctx.revision {
            let tag = match revision {
                Revision::Insert => "w:ins",
                Revision::Delete => "w:del",
            };
            xml = format!(
                "<{tag} w:id=\"{}\" w:author=\"{}\">{xml}</{tag}>",
                self.state.revision_id(),
                escape_attr(&self.env.options.revision_author)
            );
        }
        if let Some(url) = &run.link {
            let id = self.state.hyperlink_id(url);
            xml = format!("<w:hyperlink r:id=\"{id}\">{xml}</w:hyperlink>");
        }
        self.body.push_str(&xml);
    }

    fn range_start(&mut self, id: usize) {
        self.body
            .push_str(&format!("<w:commentRangeStart w:id=\"{id}\"/>"));
    }

    fn range_end(&mut self, id: usize) {
        self.body.push_str(&format!(
            "<w:commentRangeEnd w:id=\"{id}\"/><w:r><w:rPr><w:rStyle w:val=\"CommentReference\"/></w:rPr>\
             <w:commentReference w:id=\"{id}\"/></w:r>"
        ));
    }

    /// Ranges opened with `{#id}` but never closed end in a paragraph of their own.
    fn close_dangling_ranges(&mut self) {
        if self.state.open.is_empty() {
            return;
        }
        let open = std::mem::take(&mut self.state.open);
        self.body.push_str("<w:p>");
        for key in open.iter().rev() {
            let id = self.state.identified_comment(key);
            self.range_end(id);
        }
        self.body.push_str("</w:p>");
    }

    fn field(&mut self, instruction: &str, result: &str) {
        self.body.push_str(&format!(
            "<w:r><w:fldChar w:fldCharType=\"begin\"/></w:r>\
             <w:r><w:instrText xml:space=\"preserve\">{}</w:instrText></w:r>\
             <w:r><w:fldChar w:fldCharType=\"separate\"/></w:r>{result}\
             <w:r><w:fldChar w:fldCharType=\"end\"/></w:r>",
            escape_text(instruction)
        ));
    }

    /// Hand the resolved keys to the citation engine before anything is rendered.
    fn register_citations(&mut self, blocks: &[Block]) {
        let Some(bibliography) = self.env.bibliography else {
            return;
        };
        let mut keys: Vec<String> = Vec::new();
        for_each_run_list(blocks, |runs| {
            walk_runs(runs, &mut |run| {
                if let Run::Citation(citation) = run {
                    for cite in &citation.keys {
                        if bibliography.get(&cite.key).is_some() && !keys.contains(&cite.key) {
                            keys.push(cite.key.clone());
                        }
                    }
                }
            })
        });
        if keys.is_empty() {
            return;
        }
        if let Some(engine) = self.env.engine.as_deref_mut() {
            if let Err(err) = engine.register(&keys) {
                record(
                    &mut self.state.warnings,
                    Warning::CitationEngine {
                        reason: err.to_string(),
                    },
                );
                self.state.engine_usable = false;
            }
        }
    }

    fn citation(&mut self, citation: &Citation, ctx: &Context) -> Result<(), FormatError> {
        let bibliography = self.env.bibliography;
        let lookup = |cite: &CiteKey| bibliography.and_then(|b| b.get(&cite.key));
        let resolved: Vec<(&BibEntry, &CiteKey)> = citation
            .keys
            .iter()
            .filter_map(|cite| Some((lookup(cite)?, cite)))
            .collect();
        let unresolved: Vec<&CiteKey> = citation
            .keys
            .iter()
            .filter(|cite| lookup(cite).is_none())
            .collect();

        for cite in &unresolved {
            if self.state.unresolved.insert(cite.key.clone()) {
                record(
                    &mut self.state.warnings,
                    Warning::UnresolvedCitation {
                        key: cite.key.clone(),
                    },
                );
            }
        }

        if !resolved.is_empty() {
            for (_, cite) in &resolved {
                if !self.state.cited.contains(&cite.key) {
                    self.state.cited.push(cite.key.clone());
                }
            }
            let text = self.cluster_text(&resolved);
            self.state.clusters += 1;
            let instruction = citation_instruction(self.state.clusters, &resolved, &text)
                .map_err(|e| FormatError::SerializationError(e.to_string()))?;
            let result = self.plain_run(&text, ctx);
            self.field(&instruction, &result);
        }
        if !unresolved.is_empty() {
            let mut literal = unresolved_literal(&unresolved);
            if !resolved.is_empty() {
                literal.insert(0, ' ');
            }
            self.styled_text(&TextRun::plain(literal), ctx, Some(LITERAL_CITATION_STYLE));
        }
        Ok(())
    }

    fn cluster_text(&mut self, items: &[(&BibEntry, &CiteKey)]) -> String {
        if self.state.engine_usable {
            if let Some(engine) = self.env.engine.as_deref_mut() {
                let keys: Vec<CiteKey> = items.iter().map(|(_, cite)| (*cite).clone()).collect();
                match engine.render_cluster(&keys) {
                    Ok(text) => return text,
                    Err(err) => record(
                        &mut self.state.warnings,
                        Warning::CitationEngine {
                            reason: err.to_string(),
                        },
                    ),
                }
            }
        }
        fallback_cluster(items)
    }

    fn plain_run(&self, text: &str, ctx: &Context) -> String {
        let format = Formatting {
            bold: ctx.bold,
            highlight: ctx.highlight.clone(),
            ..Default::default()
        };
        format!(
            "<w:r>{}<w:t xml:space=\"preserve\">{}</w:t></w:r>",
            run_properties(&format, None),
            escape_text(text)
        )
    }

    fn math(&mut self, math: &Math) {
        let omml = match self.env.math.latex_to_omml(&math.latex) {
            Ok(omml) => omml,
            Err(err) => {
                record(
                    &mut self.state.warnings,
                    Warning::MathConversion {
                        source: math.latex.clone(),
                        reason: err.to_string(),
                    },
                );
                PLACEHOLDER_OMML.to_string()
            }
        };
        if math.display {
            self.body.push_str(&format!("<m:oMathPara>{omml}</m:oMathPara>"));
        } else {
            self.body.push_str(&omml);
        }
    }

    /// Sources heading plus one bibliography field spanning a paragraph per entry.
    fn bibliography(&mut self) -> Result<(), FormatError> {
        if self.state.cited.is_empty() {
            return Ok(());
        }
        let mut entries = None;
        if self.state.engine_usable {
            if let Some(engine) = self.env.engine.as_deref_mut() {
                match engine.render_bibliography() {
                    Ok(rendered) => entries = Some(rendered),
                    Err(err) => record(
                        &mut self.state.warnings,
                        Warning::CitationEngine {
                            reason: err.to_string(),
                        },
                    ),
                }
            }
        }
        let entries = match entries {
            Some(entries) => entries,
            None => {
                let records: Vec<&BibEntry> = self
                    .state
                    .cited
                    .iter()
                    .filter_map(|key| self.env.bibliography.and_then(|b| b.get(key)))
                    .collect();
                fallback_bibliography(&records)
            }
        };
        if entries.is_empty() {
            return Ok(());
        }

        let heading = TextRun::plain(self.env.options.sources_heading.clone());
        self.paragraph(
            "<w:pStyle w:val=\"Heading1\"/>",
            &[Run::Text(heading)],
            &Context::default(),
        )?;
        let last = entries.len() - 1;
        for (index, entry) in entries.iter().enumerate() {
            self.body
                .push_str("<w:p><w:pPr><w:pStyle w:val=\"Bibliography\"/></w:pPr>");
            let run = self.plain_run(entry, &Context::default());
            if index == 0 {
                self.body.push_str(&format!(
                    "<w:r><w:fldChar w:fldCharType=\"begin\"/></w:r>\
                     <w:r><w:instrText xml:space=\"preserve\">{}</w:instrText></w:r>\
                     <w:r><w:fldChar w:fldCharType=\"separate\"/></w:r>",
                    escape_text(&bibliography_instruction())
                ));
            }
            self.body.push_str(&run);
            if index == last {
                self.body
                    .push_str("<w:r><w:fldChar w:fldCharType=\"end\"/></w:r>");
            }
            self.body.push_str("</w:p>");
        }
        Ok(())
    }
}

/// `w:rPr` for a formatting set, in schema order.
fn run_properties(format: &Formatting, style: Option<&str>) -> String {
    let mut props = String::new();
    if format.code {
        props.push_str("<w:rStyle w:val=\"VerbatimChar\"/>");
    } else if let Some(style) = style {
        props.push_str(&format!("<w:rStyle w:val=\"{style}\"/>"));
    }
    if format.bold {
        props.push_str("<w:b/>");
    }
    if format.italic {
        props.push_str("<w:i/>");
    }
    if format.strikethrough {
        props.push_str("<w:strike/>");
    }
    if let Some(color) = &format.highlight {
        props.push_str(&format!("<w:highlight w:val=\"{}\"/>", escape_attr(color)));
    }
    if format.underline {
        props.push_str("<w:u w:val=\"single\"/>");
    }
    if format.superscript {
        props.push_str("<w:vertAlign w:val=\"superscript\"/>");
    } else if format.subscript {
        props.push_str("<w:vertAlign w:val=\"subscript\"/>");
    }
    if props.is_empty() {
        props
    } else {
        format!("<w:rPr>{props}</w:rPr>")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bibliography::{Bibliography, Issued, Name};
    use crate::formats::docx::tree::parse;

    fn document(blocks: &[Block], env: &mut Environment<'_>) -> (String, Generation) {
        let generation = generate(blocks, env).unwrap();
        let xml = std::str::from_utf8(generation.package.get(DOCUMENT).unwrap())
            .unwrap()
            .to_string();
        assert!(parse(&xml).is_ok(), "document.xml is not well-formed");
        (xml, generation)
    }

    fn linked(text: &str, url: &str) -> Run {
        Run::Text(TextRun {
            text: text.to_string(),
            format: Formatting::default(),
            link: Some(url.to_string()),
        })
    }

    #[test]
    fn run_properties_follow_schema_order() {
        let format = Formatting {
            bold: true,
            italic: true,
            underline: true,
            superscript: true,
            highlight: Some("green".to_string()),
            ..Default::default()
        };
        assert_eq!(
            run_properties(&format, None),
            "<w:rPr><w:b/><w:i/><w:highlight w:val=\"green\"/><w:u w:val=\"single\"/>\
             <w:vertAlign w:val=\"superscript\"/></w:rPr>"
        );
        assert_eq!(run_properties(&Formatting::default(), None), "");
    }

    #[test]
    fn hyperlinks_share_one_relationship_per_url() {
        let blocks = vec![Block::Paragraph(vec![
            linked("a", "https://x.test"),
            Run::text(" "),
            linked("b", "https://x.test"),
            Run::text(" "),
            linked("c", "https://y.test"),
        ])];
        let (xml, generation) = document(&blocks, &mut Environment::default());
        assert_eq!(xml.matches("r:id=\"rId10\"").count(), 2);
        assert_eq!(xml.matches("r:id=\"rId11\"").count(), 1);
        let rels = std::str::from_utf8(generation.package.get(DOCUMENT_RELS).unwrap()).unwrap();
        assert_eq!(rels.matches("TargetMode=\"External\"").count(), 2);
    }

    #[test]
    fn optional_parts_only_when_needed() {
        let blocks = vec![Block::Paragraph(vec![Run::text("plain")])];
        let (_, generation) = document(&blocks, &mut Environment::default());
        assert!(!generation.package.contains(NUMBERING));
        assert!(!generation.package.contains(COMMENTS));

        let blocks = vec![
            Block::ListItem {
                ordered: false,
                level: 0,
                runs: vec![Run::text("item")],
            },
            Block::Paragraph(vec![Run::Comment(Comment {
                author: Some("Ann".to_string()),
                timestamp: None,
                body: "note".to_string(),
            })]),
        ];
        let (xml, generation) = document(&blocks, &mut Environment::default());
        assert!(generation.package.contains(NUMBERING));
        assert!(generation.package.contains(COMMENTS));
        assert!(xml.contains("<w:numId w:val=\"1\"/>"));
    }

    #[test]
    fn comment_ids_are_dense_and_zero_based() {
        let note = |body: &str| Comment {
            author: None,
            timestamp: None,
            body: body.to_string(),
        };
        let blocks = vec![
            Block::Paragraph(vec![Run::Highlight {
                runs: vec![Run::text("one")],
                comment: Some(note("first")),
            }]),
            Block::Paragraph(vec![
                Run::CommentStart("x".to_string()),
                Run::text("two"),
                Run::CommentEnd("x".to_string()),
                Run::CommentBody {
                    id: "x".to_string(),
                    comment: note("second"),
                },
            ]),
        ];
        let (xml, generation) = document(&blocks, &mut Environment::default());
        assert!(xml.contains("<w:commentRangeStart w:id=\"0\"/>"));
        assert!(xml.contains("<w:commentRangeStart w:id=\"1\"/>"));
        assert!(!xml.contains("w:id=\"2\""));
        assert!(generation.warnings.is_empty());
        let comments = std::str::from_utf8(generation.package.get(COMMENTS).unwrap()).unwrap();
        assert!(comments.contains("second"));
    }

    #[test]
    fn mixed_citation_writes_field_then_literal() {
        let bibliography: Bibliography = [BibEntry {
            id: "a".to_string(),
            kind: "book".to_string(),
            author: vec![Name::person("Smith", "Jane")],
            issued: Some(Issued::year(2020)),
            ..Default::default()
        }]
        .into_iter()
        .collect();
        let blocks = vec![Block::Paragraph(vec![Run::Citation(Citation {
            keys: vec![CiteKey::new("a"), CiteKey::new("b")],
        })])];
        let mut env = Environment::default().with_bibliography(&bibliography);
        let (xml, generation) = document(&blocks, &mut env);
        assert!(xml.contains("ADDIN ZOTERO_ITEM CSL_CITATION"));
        assert!(xml.contains("(Smith 2020)"));
        assert!(xml.contains("<w:rStyle w:val=\"UnresolvedCitation\"/></w:rPr><w:t xml:space=\"preserve\"> (@b)<"));
        assert!(xml.contains("ADDIN ZOTERO_BIBL"));
        assert_eq!(
            generation.warnings,
            vec![Warning::UnresolvedCitation {
                key: "b".to_string()
            }]
        );
    }

    #[test]
    fn tracked_changes_carry_author_and_dense_ids() {
        let blocks = vec![Block::Paragraph(vec![Run::Substitute {
            old: vec![Run::text("old")],
            new: vec![Run::text("new")],
        }])];
        let (xml, _) = document(&blocks, &mut Environment::default());
        assert!(xml.contains(
            "<w:del w:id=\"1\" w:author=\"docmark\"><w:r><w:delText xml:space=\"preserve\">old</w:delText></w:r></w:del>"
        ));
        assert!(xml.contains("<w:ins w:id=\"2\" w:author=\"docmark\">"));
    }
}
