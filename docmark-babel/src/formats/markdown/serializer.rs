//! Markdown serialization (generation model → markup)
//!
//! comrak's own formatter cannot be used here: it would escape the annotation, citation and
//! math syntax this renderer needs to emit. Instead blocks are printed directly, escaping text
//! so that tokenizing the output yields the same blocks again:
//!
//! - ASCII punctuation that comrak or the extension scan would act on is backslash-escaped.
//! - Literal text that opens a line is checked for block openers (`#`, `>`, `-`, `1.`); the
//!   renderer's own delimiters never are.
//! - Emphasis delimiters hug non-blank text; edge whitespace moves outside them.
//! - Header rows of tables drop bold, which the Word side adds to every header cell.

use super::inline::render_comment;
use crate::ir::nodes::{Block, Citation, Math, Run, Table, TextRun};
use crate::options::{is_highlight_color, ConvertOptions};
use once_cell::sync::Lazy;
use regex::Regex;

static ORDINAL_START: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{1,9}[.)]").expect("ordinal start pattern"));

/// Render blocks as markup.
pub fn serialize(blocks: &[Block], options: &ConvertOptions) -> String {
    let mut renderer = Renderer {
        options,
        columns: Vec::new(),
        counters: Vec::new(),
    };
    let mut out = String::new();
    let mut previous: Option<&Block> = None;
    for block in blocks {
        if !matches!(block, Block::ListItem { .. }) {
            renderer.columns.clear();
            renderer.counters.clear();
        }
        let Some(rendered) = renderer.block(block) else {
            continue;
        };
        if let Some(previous) = previous {
            out.push_str(&separator(previous, block));
        }
        out.push_str(&rendered);
        previous = Some(block);
    }
    if !out.is_empty() {
        out.push('\n');
    }
    out
}

/// Consecutive list items stay tight; consecutive quote paragraphs share one quote.
fn separator(previous: &Block, next: &Block) -> String {
    match (previous, next) {
        (Block::ListItem { .. }, Block::ListItem { .. }) => "\n".to_string(),
        (Block::BlockQuote { level: a, .. }, Block::BlockQuote { level: b, .. }) => {
            format!("\n{}\n", "> ".repeat((*a).min(*b).max(1)).trim_end())
        }
        _ => "\n\n".to_string(),
    }
}

/// Where inline content is printed; decides how breaks and pipes come out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Place {
    Block,
    Heading,
    Cell,
}

struct Renderer<'o> {
    options: &'o ConvertOptions,
    /// Content column of the open list item at each level
    columns: Vec<usize>,
    /// Kind and last number of the list at each level
    counters: Vec<(bool, usize)>,
}

impl Renderer<'_> {
    fn block(&mut self, block: &Block) -> Option<String> {
        match block {
            Block::Paragraph(runs) => {
                let text = tidy_lines(&self.runs(runs, Place::Block));
                (!text.trim().is_empty()).then_some(text)
            }
            Block::Heading { level, runs } => {
                let text = protect_closing_hashes(self.runs(runs, Place::Heading).trim());
                let marks = "#".repeat(usize::from((*level).clamp(1, 6)));
                Some(format!("{marks} {text}").trim_end().to_string())
            }
            Block::ListItem {
                ordered,
                level,
                runs,
            } => Some(self.list_item(*ordered, *level, runs)),
            Block::BlockQuote { level, runs } => {
                let text = tidy_lines(&self.runs(runs, Place::Block));
                if text.trim().is_empty() {
                    return None;
                }
                let prefix = "> ".repeat((*level).max(1));
                Some(
                    text.lines()
                        .map(|line| format!("{prefix}{line}").trim_end().to_string())
                        .collect::<Vec<_>>()
                        .join("\n"),
                )
            }
            Block::CodeBlock { language, code } => {
                let fence = "`".repeat(longest_run(code, '`').max(2) + 1);
                let info = language.as_deref().unwrap_or_default();
                Some(format!("{fence}{info}\n{code}\n{fence}"))
            }
            Block::Table(table) => self.table(table),
            Block::HorizontalRule => Some("---".to_string()),
        }
    }

    fn list_item(&mut self, ordered: bool, level: usize, runs: &[Run]) -> String {
        // markup cannot skip a nesting level
        let level = level.min(self.columns.len());
        self.columns.truncate(level);
        let number = match self.counters.get(level) {
            Some(&(kind, number)) if kind == ordered => number + 1,
            _ => 1,
        };
        self.counters.truncate(level);
        self.counters.push((ordered, number));

        let indent = if level == 0 { 0 } else { self.columns[level - 1] };
        let marker = if ordered {
            format!("{number}. ")
        } else {
            "- ".to_string()
        };
        let column = indent + marker.len();
        self.columns.push(column);

        let text = tidy_lines(&self.runs(runs, Place::Block));
        let mut out = format!("{}{marker}", " ".repeat(indent));
        for (index, line) in text.lines().enumerate() {
            if index > 0 {
                out.push('\n');
                out.push_str(&" ".repeat(column));
            }
            out.push_str(line);
        }
        out.trim_end().to_string()
    }

    fn table(&self, table: &Table) -> Option<String> {
        let columns = table.column_count();
        if table.rows.is_empty() || columns == 0 {
            return None;
        }
        let cells: Vec<Vec<String>> = table
            .rows
            .iter()
            .enumerate()
            .map(|(index, row)| {
                (0..columns)
                    .map(|column| {
                        let runs = row.cells.get(column).map_or(&[][..], |c| &c.runs[..]);
                        let text = if table.header && index == 0 {
                            self.runs(&strip_bold(runs), Place::Cell)
                        } else {
                            self.runs(runs, Place::Cell)
                        };
                        text.trim().to_string()
                    })
                    .collect()
            })
            .collect();

        Some(if table.header {
            pipe_table(&cells)
        } else {
            grid_table(&cells)
        })
    }

    fn runs(&self, runs: &[Run], place: Place) -> String {
        let mut out = String::new();
        self.runs_into(&mut out, runs, place);
        out
    }

    /// Render into `out`, so escaping sees the delimiters already written before the runs.
    fn runs_into(&self, out: &mut String, runs: &[Run], place: Place) {
        let mut index = 0;
        while index < runs.len() {
            if let Run::Text(TextRun {
                link: Some(url), ..
            }) = &runs[index]
            {
                let end = runs[index..]
                    .iter()
                    .position(|run| !matches!(run, Run::Text(t) if t.link.as_ref() == Some(url)))
                    .map_or(runs.len(), |offset| index + offset);
                out.push('[');
                for run in &runs[index..end] {
                    if let Run::Text(text) = run {
                        self.text(out, text, place);
                    }
                }
                out.push_str(&format!("]({})", link_destination(url)));
                index = end;
                continue;
            }
            self.run(out, &runs[index], place);
            index += 1;
        }
    }

    fn run(&self, out: &mut String, run: &Run, place: Place) {
        match run {
            Run::Text(text) => self.text(out, text, place),
            Run::Insert(runs) => self.delimited(out, "{++", runs, "++}", place),
            Run::Delete(runs) => self.delimited(out, "{--", runs, "--}", place),
            Run::Substitute { old, new } => {
                self.delimited(out, "{~~", old, "~>", place);
                self.delimited(out, "", new, "~~}", place);
            }
            Run::Highlight { runs, comment } => {
                self.delimited(out, "{==", runs, "==}", place);
                if let Some(comment) = comment {
                    out.push_str(&format!("{{>>{}<<}}", render_comment(comment)));
                }
            }
            Run::Comment(comment) => {
                out.push_str(&format!("{{>>{}<<}}", render_comment(comment)));
            }
            Run::CommentStart(id) => out.push_str(&format!("{{#{id}}}")),
            Run::CommentEnd(id) => out.push_str(&format!("{{/{id}}}")),
            Run::CommentBody { id, comment } => {
                out.push_str(&format!("{{#{id}>>{}<<}}", render_comment(comment)));
            }
            Run::Citation(citation) => out.push_str(&citation_markup(citation)),
            Run::Math(math) => out.push_str(&math_markup(math)),
            Run::SoftBreak => out.push_str(match place {
                Place::Block => "\n",
                Place::Heading | Place::Cell => " ",
            }),
            Run::LineBreak => out.push_str(match place {
                Place::Block => "\\\n",
                Place::Heading => " ",
                Place::Cell => "<br>",
            }),
        }
    }

    fn delimited(&self, out: &mut String, open: &str, runs: &[Run], close: &str, place: Place) {
        out.push_str(open);
        self.runs_into(out, runs, place);
        out.push_str(close);
    }

    fn text(&self, out: &mut String, run: &TextRun, place: Place) {
        if run.text.is_empty() {
            return;
        }
        let format = &run.format;
        let text = run.text.replace('\n', " ");
        let line_start = place == Place::Block && at_line_start(out);

        if format.code {
            let mut span = code_span(&text, place);
            span = wrap(span, format.bold, format.italic, format.strikethrough);
            span = self.wrap_html(span, run);
            out.push_str(&self.highlight(span, run));
            return;
        }

        let core = text.trim_matches([' ', '\t']);
        let lead_len = text.len() - text.trim_start_matches([' ', '\t']).len();
        let lead = &text[..lead_len];
        let trail = &text[lead_len + core.len()..];

        if line_start && core.is_empty() {
            return;
        }
        if !line_start {
            let escaped_lead = escape(lead, out);
            out.push_str(&escaped_lead);
        }
        if !core.is_empty() {
            let mut escaped = escape(core, out);
            if out.ends_with(']') && escaped.starts_with('(') {
                escaped.insert(0, '\\');
            }
            if line_start && format.is_plain() {
                escaped = protect_line_start(escaped);
            }
            let wrapped = wrap(escaped, format.bold, format.italic, format.strikethrough);
            let wrapped = self.wrap_html(wrapped, run);
            out.push_str(&self.highlight(wrapped, run));
        }
        let escaped_trail = escape(trail, out);
        out.push_str(&escaped_trail);
    }

    fn wrap_html(&self, mut text: String, run: &TextRun) -> String {
        if run.format.subscript {
            text = format!("<sub>{text}</sub>");
        }
        if run.format.superscript {
            text = format!("<sup>{text}</sup>");
        }
        if run.format.underline {
            text = format!("<u>{text}</u>");
        }
        text
    }

    fn highlight(&self, text: String, run: &TextRun) -> String {
        match run.format.highlight.as_deref() {
            None => text,
            Some(color) if color == self.options.highlight_color || !is_highlight_color(color) => {
                format!("=={text}==")
            }
            Some(color) => format!("=={text}=={{{color}}}"),
        }
    }
}

fn wrap(text: String, bold: bool, italic: bool, strikethrough: bool) -> String {
    let mut text = text;
    if strikethrough {
        text = format!("~~{text}~~");
    }
    if italic {
        text = format!("*{text}*");
    }
    if bold {
        text = format!("**{text}**");
    }
    text
}

/// Escape text for inline markup. `before` is what has been written so far on this line.
fn escape(text: &str, before: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    for (index, &c) in chars.iter().enumerate() {
        let previous = if index == 0 {
            before.chars().next_back()
        } else {
            Some(chars[index - 1])
        };
        let next = chars.get(index + 1).copied();
        let needs_escape = match c {
            '\\' | '*' | '_' | '`' | '[' | ']' | '<' | '$' | '~' | '^' | '|' | '&' => true,
            '{' => matches!(next, Some('+' | '-' | '~' | '=' | '>' | '#' | '/')),
            '}' => matches!(previous, Some('+' | '-' | '~' | '=' | '<')),
            '=' => next == Some('='),
            '>' => previous == Some('~'),
            _ => false,
        };
        if needs_escape {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Nothing but indentation has been written on the current line.
fn at_line_start(out: &str) -> bool {
    let line = out.rsplit('\n').next().unwrap_or_default();
    line.trim_start_matches([' ', '\t']).is_empty()
}

/// Escape a block opener at the front of escaped literal text.
fn protect_line_start(escaped: String) -> String {
    if escaped.starts_with(['#', '>', '-', '+', '=']) {
        format!("\\{escaped}")
    } else if let Some(found) = ORDINAL_START.find(&escaped) {
        let marker = found.end() - 1;
        format!("{}\\{}", &escaped[..marker], &escaped[marker..])
    } else {
        escaped
    }
}

/// Drop indentation and trailing blanks, which would read back as code or hard breaks.
fn tidy_lines(text: &str) -> String {
    text.split('\n')
        .map(|line| line.trim_matches([' ', '\t']))
        .collect::<Vec<_>>()
        .join("\n")
}

/// A trailing `#` run after a space would close the heading; escape its first mark.
fn protect_closing_hashes(text: &str) -> String {
    let body = text.trim_end_matches('#');
    if body.len() < text.len() && (body.is_empty() || body.ends_with([' ', '\t'])) {
        format!("{body}\\{}", &text[body.len()..])
    } else {
        text.to_string()
    }
}

fn code_span(text: &str, place: Place) -> String {
    let text = if place == Place::Cell {
        text.replace('|', "\\|")
    } else {
        text.to_string()
    };
    let fence = "`".repeat(longest_run(&text, '`') + 1);
    let padded = text.starts_with('`')
        || text.ends_with('`')
        || (text.starts_with(' ') && text.ends_with(' ') && !text.trim().is_empty());
    if padded {
        format!("{fence} {text} {fence}")
    } else {
        format!("{fence}{text}{fence}")
    }
}

fn longest_run(text: &str, c: char) -> usize {
    text.split(|ch| ch != c).map(str::len).max().unwrap_or(0)
}

fn link_destination(url: &str) -> String {
    if url.contains(|c: char| c.is_whitespace() || c == '(' || c == ')') {
        format!("<{}>", url.replace('<', "%3C").replace('>', "%3E"))
    } else {
        url.to_string()
    }
}

fn citation_markup(citation: &Citation) -> String {
    let parts: Vec<String> = citation
        .keys
        .iter()
        .map(|cite| match &cite.locator {
            Some(locator) => format!("@{}, {locator}", cite.key),
            None => format!("@{}", cite.key),
        })
        .collect();
    format!("[{}]", parts.join("; "))
}

fn math_markup(math: &Math) -> String {
    let latex = math.latex.trim();
    if math.display {
        format!("$${latex}$$")
    } else {
        format!("${latex}$")
    }
}

/// Header cells are bold in Word; the header row already says so.
fn strip_bold(runs: &[Run]) -> Vec<Run> {
    runs.iter()
        .map(|run| match run {
            Run::Text(text) => {
                let mut text = text.clone();
                text.format.bold = false;
                Run::Text(text)
            }
            Run::Insert(inner) => Run::Insert(strip_bold(inner)),
            Run::Delete(inner) => Run::Delete(strip_bold(inner)),
            Run::Substitute { old, new } => Run::Substitute {
                old: strip_bold(old),
                new: strip_bold(new),
            },
            Run::Highlight { runs, comment } => Run::Highlight {
                runs: strip_bold(runs),
                comment: comment.clone(),
            },
            other => other.clone(),
        })
        .collect()
}

fn pipe_row(cells: &[String]) -> String {
    let cells: Vec<&str> = cells
        .iter()
        .map(|c| if c.is_empty() { " " } else { c.as_str() })
        .collect();
    format!("| {} |", cells.join(" | "))
}

fn pipe_table(rows: &[Vec<String>]) -> String {
    let mut lines = Vec::with_capacity(rows.len() + 1);
    if let Some((header, body)) = rows.split_first() {
        lines.push(pipe_row(header));
        lines.push(format!("|{}", " --- |".repeat(header.len())));
        lines.extend(body.iter().map(|row| pipe_row(row)));
    }
    lines.join("\n")
}

fn grid_table(rows: &[Vec<String>]) -> String {
    let columns = rows.first().map_or(0, Vec::len);
    let widths: Vec<usize> = (0..columns)
        .map(|column| {
            rows.iter()
                .map(|row| row[column].chars().count())
                .max()
                .unwrap_or(0)
                .max(1)
        })
        .collect();
    let border: String = widths
        .iter()
        .map(|w| format!("{}+", "-".repeat(w + 2)))
        .fold("+".to_string(), |acc, part| acc + &part);

    let mut lines = vec![border.clone()];
    for row in rows {
        let mut line = "|".to_string();
        for (cell, width) in row.iter().zip(&widths) {
            let pad = width - cell.chars().count();
            line.push_str(&format!(" {cell}{} |", " ".repeat(pad)));
        }
        lines.push(line);
        lines.push(border.clone());
    }
    lines.join("\n")
}
