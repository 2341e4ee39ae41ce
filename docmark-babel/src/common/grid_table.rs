//! Grid table preprocessor
//!
//!     comrak knows pipe tables only. Grid tables are recognized here, before tokenization, and
//!     replaced by a block placeholder on a line of its own; the tokenizer swaps the placeholder
//!     for the parsed table. Cell text stays raw markup so the tokenizer can run the inline rules
//!     on it.
//!
//!     +-------+-------+
//!     | Name  | Value |
//!     +=======+=======+
//!     | alpha | 1     |
//!     +-------+-------+
//!
//!     Border lines define the column boundaries. A `=` border marks every row above it as header.
//!     Multi-line cells are joined with a space. Anything that does not line up (spanning cells,
//!     ragged lines, unterminated tables) is left untouched and reads as ordinary text. Fenced
//!     code blocks are skipped.

/// Opens a block placeholder: `\u{E002}` index `\u{E003}`.
pub const BLOCK_OPEN: char = '\u{E002}';
pub const BLOCK_CLOSE: char = '\u{E003}';

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridTable {
    /// Raw markup of each cell, row by row
    pub rows: Vec<Vec<String>>,
    pub header: bool,
}

/// Source with grid tables replaced by placeholders, plus the tables in placeholder order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preprocessed {
    pub source: String,
    pub tables: Vec<GridTable>,
}

pub fn placeholder(index: usize) -> String {
    format!("{BLOCK_OPEN}{index}{BLOCK_CLOSE}")
}

/// Index of a block placeholder that makes up all of `text`.
pub fn placeholder_index(text: &str) -> Option<usize> {
    text.trim()
        .strip_prefix(BLOCK_OPEN)?
        .strip_suffix(BLOCK_CLOSE)?
        .parse()
        .ok()
}

pub fn preprocess(source: &str) -> Preprocessed {
    let lines: Vec<&str> = source.lines().collect();
    let mut out: Vec<String> = Vec::with_capacity(lines.len());
    let mut tables = Vec::new();
    let mut fence: Option<String> = None;
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i];
        if let Some(marker) = &fence {
            if line.trim_start().starts_with(marker.as_str()) {
                fence = None;
            }
            out.push(line.to_string());
            i += 1;
            continue;
        }
        if let Some(marker) = fence_marker(line) {
            fence = Some(marker);
            out.push(line.to_string());
            i += 1;
            continue;
        }
        if border_columns(line).is_some() {
            let end = lines[i..]
                .iter()
                .position(|l| !(l.starts_with('+') || l.starts_with('|')))
                .map_or(lines.len(), |offset| i + offset);
            if let Some(table) = parse_table(&lines[i..end]) {
                tracing::debug!(rows = table.rows.len(), "grid table recognized");
                out.push(String::new());
                out.push(placeholder(tables.len()));
                out.push(String::new());
                tables.push(table);
                i = end;
                continue;
            }
        }
        out.push(line.to_string());
        i += 1;
    }

    let mut source_out = out.join("\n");
    if source.ends_with('\n') {
        source_out.push('\n');
    }
    Preprocessed {
        source: source_out,
        tables,
    }
}

pub(crate) fn fence_marker(line: &str) -> Option<String> {
    let trimmed = line.trim_start();
    if line.len() - trimmed.len() > 3 {
        return None;
    }
    for fence_char in ['`', '~'] {
        let count = trimmed.chars().take_while(|&c| c == fence_char).count();
        if count >= 3 {
            return Some(fence_char.to_string().repeat(count));
        }
    }
    None
}

/// Character offsets of the `+` corners when `line` is a border, and whether it is a header
/// separator.
fn border_columns(line: &str) -> Option<(Vec<usize>, bool)> {
    let chars: Vec<char> = line.trim_end().chars().collect();
    if chars.len() < 3 || chars[0] != '+' || chars[chars.len() - 1] != '+' {
        return None;
    }
    let mut corners = Vec::new();
    let mut header = false;
    for (offset, &c) in chars.iter().enumerate() {
        match c {
            '+' => corners.push(offset),
            '=' => header = true,
            '-' | ':' => {}
            _ => return None,
        }
    }
    let all_cells_filled = corners.windows(2).all(|w| w[1] > w[0] + 1);
    (corners.len() >= 2 && all_cells_filled).then_some((corners, header))
}

fn parse_table(lines: &[&str]) -> Option<GridTable> {
    let (corners, _) = border_columns(lines.first()?)?;
    if lines.len() < 3 || border_columns(lines.last()?).is_none() {
        return None;
    }

    let mut rows: Vec<Vec<String>> = Vec::new();
    let mut pending: Vec<Vec<String>> = Vec::new();
    let mut header_rows = None;

    for line in &lines[1..] {
        if let Some((border, is_header)) = border_columns(line) {
            if border != corners || pending.is_empty() {
                return None;
            }
            rows.push(join_cell_lines(std::mem::take(&mut pending), corners.len() - 1));
            if is_header && header_rows.is_none() {
                header_rows = Some(rows.len());
            }
            continue;
        }
        let chars: Vec<char> = line.trim_end().chars().collect();
        if chars.len() != corners[corners.len() - 1] + 1 {
            return None;
        }
        if corners.iter().any(|&c| chars[c] != '|') {
            return None;
        }
        let cells = corners
            .windows(2)
            .map(|w| chars[w[0] + 1..w[1]].iter().collect::<String>())
            .collect();
        pending.push(cells);
    }

    if !pending.is_empty() || rows.is_empty() {
        return None;
    }
    // a header separator is only meaningful under exactly one row
    let header = header_rows == Some(1);
    Some(GridTable { rows, header })
}

fn join_cell_lines(lines: Vec<Vec<String>>, columns: usize) -> Vec<String> {
    (0..columns)
        .map(|column| {
            lines
                .iter()
                .map(|line| line[column].trim())
                .filter(|part| !part.is_empty())
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect()
}
