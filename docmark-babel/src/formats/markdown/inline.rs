//! Inline extensions recognized ahead of comrak.
//!
//!     comrak has no notion of review annotations, citation clusters, math spans or colored
//!     highlights. They are found by a single forward scan over the source and each match is
//!     replaced by a placeholder (`\u{E000}` index `\u{E001}`) that comrak passes through as
//!     plain text. The tokenizer swaps placeholders back for runs while walking the comrak tree,
//!     so emphasis, links and lists around an annotation keep working.
//!
//!     The scan tries, at every position outside code: escapes, annotation brackets,
//!     identifier comment markers, citations, display then inline math, colored highlights.
//!     Anything that fails to close stays text. Annotation payloads are not rescanned for
//!     annotation brackets.

use crate::common::grid_table::fence_marker;
use crate::ir::nodes::{CiteKey, Comment, Math};
use crate::options::is_highlight_color;
use once_cell::sync::Lazy;
use regex::Regex;

pub const INLINE_OPEN: char = '\u{E000}';
pub const INLINE_CLOSE: char = '\u{E001}';

/// A recognized extension construct.
#[derive(Debug, Clone, PartialEq)]
pub enum Extension {
    Insert(String),
    Delete(String),
    Substitute { old: String, new: String },
    /// `{==content==}`, optionally directly followed by its comment
    Highlight {
        content: String,
        comment: Option<Comment>,
    },
    Comment(Comment),
    CommentStart(String),
    CommentEnd(String),
    CommentBody { id: String, comment: Comment },
    Citation(Vec<CiteKey>),
    Math(Math),
    /// `==content==` with an optional `{color}`
    Colored {
        content: String,
        color: Option<String>,
    },
}

/// An extension plus the source text it replaced.
#[derive(Debug, Clone, PartialEq)]
pub struct Placed {
    pub extension: Extension,
    pub source: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Scanned {
    pub text: String,
    pub placed: Vec<Placed>,
}

/// A slice of scanned text: literal text or a placeholder index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment<'t> {
    Text(&'t str),
    Placed(usize),
}

static COMMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^(?P<author>[^:\n()]+?)(?: \((?P<ts>[^()]*)\))?:(?:\s(?P<body>.*))?$")
        .expect("comment pattern")
});

static COMMENT_START: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\{#([A-Za-z0-9_-]+)\}").expect("comment start pattern"));

static COMMENT_END: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\{/([A-Za-z0-9_-]+)\}").expect("comment end pattern"));

static COMMENT_BODY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\{#([A-Za-z0-9_-]+)>>").expect("comment body pattern"));

static CITE_KEY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s;,@\[\]()]+$").expect("citation key pattern"));

/// Replace extension syntax in `source` with placeholders.
pub fn scan(source: &str, annotations: bool) -> Scanned {
    let mut scanner = Scanner {
        src: source,
        pos: 0,
        out: String::with_capacity(source.len()),
        placed: Vec::new(),
        annotations,
    };
    scanner.run();
    Scanned {
        text: scanner.out,
        placed: scanner.placed,
    }
}

/// Split scanned text into literal text and placeholders.
pub fn segments(text: &str) -> Vec<Segment<'_>> {
    let mut out = Vec::new();
    let mut rest = text;
    while let Some(open) = rest.find(INLINE_OPEN) {
        let after = &rest[open + INLINE_OPEN.len_utf8()..];
        let parsed = after.find(INLINE_CLOSE).and_then(|close| {
            let index = after[..close].parse::<usize>().ok()?;
            Some((index, close))
        });
        match parsed {
            Some((index, close)) => {
                if open > 0 {
                    out.push(Segment::Text(&rest[..open]));
                }
                out.push(Segment::Placed(index));
                rest = &after[close + INLINE_CLOSE.len_utf8()..];
            }
            None => {
                let split = open + INLINE_OPEN.len_utf8();
                out.push(Segment::Text(&rest[..split]));
                rest = &rest[split..];
            }
        }
    }
    if !rest.is_empty() {
        out.push(Segment::Text(rest));
    }
    out
}

/// Put the original syntax back, for text comrak treats as code.
pub fn restore(text: &str, placed: &[Placed]) -> String {
    segments(text)
        .into_iter()
        .map(|segment| match segment {
            Segment::Text(text) => text,
            Segment::Placed(index) => placed.get(index).map_or("", |p| p.source.as_str()),
        })
        .collect()
}

struct Scanner<'s> {
    src: &'s str,
    pos: usize,
    out: String,
    placed: Vec<Placed>,
    annotations: bool,
}

impl Scanner<'_> {
    fn run(&mut self) {
        while self.pos < self.src.len() {
            let rest = &self.src[self.pos..];
            if self.at_line_start() {
                if let Some(fence) = fence_marker(rest.lines().next().unwrap_or_default()) {
                    self.copy_fenced(&fence);
                    continue;
                }
            }
            if rest.starts_with('\\') {
                let len = 1 + rest[1..].chars().next().map_or(0, char::len_utf8);
                self.copy(len);
                continue;
            }
            if rest.starts_with('`') {
                self.copy_code_span();
                continue;
            }
            if let Some((extension, len)) = self.extension(rest) {
                self.place(extension, len);
                continue;
            }
            let len = rest.chars().next().map_or(1, char::len_utf8);
            self.copy(len);
        }
    }

    fn at_line_start(&self) -> bool {
        self.pos == 0 || self.src[..self.pos].ends_with('\n')
    }

    fn copy(&mut self, len: usize) {
        self.out.push_str(&self.src[self.pos..self.pos + len]);
        self.pos += len;
    }

    fn place(&mut self, extension: Extension, len: usize) {
        let source = self.src[self.pos..self.pos + len].to_string();
        self.out.push(INLINE_OPEN);
        self.out.push_str(&self.placed.len().to_string());
        self.out.push(INLINE_CLOSE);
        self.placed.push(Placed { extension, source });
        self.pos += len;
    }

    fn copy_fenced(&mut self, fence: &str) {
        let rest = &self.src[self.pos..];
        let mut len = 0;
        for (index, line) in rest.split_inclusive('\n').enumerate() {
            len += line.len();
            if index > 0 && line.trim_start().starts_with(fence) {
                break;
            }
        }
        self.copy(len);
    }

    /// Code spans are copied untouched; an unmatched backtick run is plain text.
    fn copy_code_span(&mut self) {
        let rest = &self.src[self.pos..];
        let ticks = rest.chars().take_while(|&c| c == '`').count();
        let mut search = ticks;
        while let Some(offset) = rest[search..].find('`') {
            let start = search + offset;
            let run = rest[start..].chars().take_while(|&c| c == '`').count();
            if run == ticks {
                self.copy(start + run);
                return;
            }
            search = start + run;
        }
        self.copy(ticks);
    }

    fn previous_char(&self) -> Option<char> {
        self.src[..self.pos].chars().next_back()
    }

    fn extension(&self, rest: &str) -> Option<(Extension, usize)> {
        if self.annotations && rest.starts_with('{') {
            if let Some(found) = annotation(rest).or_else(|| identifier_marker(rest)) {
                return Some(found);
            }
        }
        if rest.starts_with("[@") {
            return citation(rest);
        }
        if rest.starts_with("$$") {
            return display_math(rest);
        }
        if rest.starts_with('$') {
            return inline_math(rest, self.previous_char());
        }
        if rest.starts_with("==") && self.previous_char() != Some('=') && !self.on_rule_line() {
            return colored_highlight(rest);
        }
        None
    }

    /// Lines made only of `=` are setext underlines.
    fn on_rule_line(&self) -> bool {
        let start = self.src[..self.pos].rfind('\n').map_or(0, |i| i + 1);
        let end = self.src[self.pos..]
            .find('\n')
            .map_or(self.src.len(), |i| self.pos + i);
        self.src[start..end].trim().chars().all(|c| c == '=')
    }
}

/// Offset of `marker` in `text`, honoring escapes and stopping at a blank line.
fn find_close(text: &str, marker: &str) -> Option<usize> {
    let mut chars = text.char_indices().peekable();
    while let Some((index, c)) = chars.next() {
        if text[index..].starts_with(marker) {
            return Some(index);
        }
        match c {
            '\\' => {
                chars.next();
            }
            '\n' if text[index + 1..].trim_start_matches([' ', '\t']).starts_with('\n') => {
                return None
            }
            _ => {}
        }
    }
    None
}

/// Content between `open` and its close marker, and the total length consumed.
fn delimited<'t>(rest: &'t str, open: &str, close: &str) -> Option<(&'t str, usize)> {
    let body = rest.strip_prefix(open)?;
    let end = find_close(body, close)?;
    Some((&body[..end], open.len() + end + close.len()))
}

fn annotation(rest: &str) -> Option<(Extension, usize)> {
    if let Some((content, len)) = delimited(rest, "{++", "++}") {
        return Some((Extension::Insert(content.to_string()), len));
    }
    if let Some((content, len)) = delimited(rest, "{--", "--}") {
        return Some((Extension::Delete(content.to_string()), len));
    }
    if let Some((content, len)) = delimited(rest, "{~~", "~~}") {
        let (old, new) = content.split_once("~>")?;
        return Some((
            Extension::Substitute {
                old: old.to_string(),
                new: new.to_string(),
            },
            len,
        ));
    }
    if let Some((content, len)) = delimited(rest, "{==", "==}") {
        let comment = delimited(&rest[len..], "{>>", "<<}");
        let total = len + comment.map_or(0, |(_, comment_len)| comment_len);
        return Some((
            Extension::Highlight {
                content: content.to_string(),
                comment: comment.map(|(body, _)| parse_comment(body)),
            },
            total,
        ));
    }
    if let Some((content, len)) = delimited(rest, "{>>", "<<}") {
        return Some((Extension::Comment(parse_comment(content)), len));
    }
    None
}

fn identifier_marker(rest: &str) -> Option<(Extension, usize)> {
    if let Some(caps) = COMMENT_BODY.captures(rest) {
        let open = caps.get(0)?.len();
        let end = find_close(&rest[open..], "<<}")?;
        let comment = parse_comment(&rest[open..open + end]);
        return Some((
            Extension::CommentBody {
                id: caps[1].to_string(),
                comment,
            },
            open + end + 3,
        ));
    }
    if let Some(caps) = COMMENT_START.captures(rest) {
        return Some((Extension::CommentStart(caps[1].to_string()), caps.get(0)?.len()));
    }
    if let Some(caps) = COMMENT_END.captures(rest) {
        return Some((Extension::CommentEnd(caps[1].to_string()), caps.get(0)?.len()));
    }
    None
}

fn citation(rest: &str) -> Option<(Extension, usize)> {
    let (content, len) = delimited(rest, "[@", "]")?;
    // `[@handle](url)` is a link
    if rest[len..].starts_with(['(', '[']) {
        return None;
    }
    let keys = parse_citation(content)?;
    Some((Extension::Citation(keys), len))
}

/// Parse the inside of `[@...]` after the opening `@`.
pub fn parse_citation(content: &str) -> Option<Vec<CiteKey>> {
    content
        .split(';')
        .enumerate()
        .map(|(index, part)| {
            let part = part.trim();
            let part = if index == 0 {
                part
            } else {
                part.strip_prefix('@')?
            };
            let (key, locator) = match part.split_once(',') {
                Some((key, locator)) => (key.trim(), Some(locator.trim())),
                None => (part, None),
            };
            if !CITE_KEY.is_match(key) {
                return None;
            }
            Some(match locator.filter(|l| !l.is_empty()) {
                Some(locator) => CiteKey::with_locator(key, locator),
                None => CiteKey::new(key),
            })
        })
        .collect()
}

fn display_math(rest: &str) -> Option<(Extension, usize)> {
    let (content, len) = delimited(rest, "$$", "$$")?;
    let latex = content.trim();
    if latex.is_empty() {
        return None;
    }
    Some((
        Extension::Math(Math {
            latex: latex.to_string(),
            display: true,
        }),
        len,
    ))
}

fn is_word(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn inline_math(rest: &str, previous: Option<char>) -> Option<(Extension, usize)> {
    if previous.is_some_and(is_word) {
        return None;
    }
    let (content, len) = delimited(rest, "$", "$")?;
    let starts_blank = content.starts_with(char::is_whitespace);
    let ends_blank = content.ends_with(char::is_whitespace);
    if content.is_empty() || starts_blank || ends_blank {
        return None;
    }
    if rest[len..].chars().next().is_some_and(is_word) {
        return None;
    }
    Some((
        Extension::Math(Math {
            latex: content.to_string(),
            display: false,
        }),
        len,
    ))
}

fn colored_highlight(rest: &str) -> Option<(Extension, usize)> {
    let (content, len) = delimited(rest, "==", "==")?;
    let blank_edge = content.starts_with(char::is_whitespace) || content.ends_with(char::is_whitespace);
    if content.is_empty() || blank_edge {
        return None;
    }
    let color = rest[len..]
        .strip_prefix('{')
        .and_then(|after| after.split_once('}'))
        .map(|(color, _)| color)
        .filter(|color| is_highlight_color(color));
    let total = len + color.map_or(0, |c| c.len() + 2);
    Some((
        Extension::Colored {
            content: content.to_string(),
            color: color.map(str::to_string),
        },
        total,
    ))
}

/// Split comment text into author, timestamp and body.
///
/// A single bare word is an author with no body; `author (timestamp): body` and
/// `author: body` carry metadata; anything else is all body.
pub fn parse_comment(content: &str) -> Comment {
    let trimmed = content.trim();
    if is_bare_word(trimmed) {
        return Comment {
            author: Some(trimmed.to_string()),
            timestamp: None,
            body: String::new(),
        };
    }
    if let Some(caps) = COMMENT.captures(content.trim_start()) {
        return Comment {
            author: Some(caps["author"].trim().to_string()),
            timestamp: caps
                .name("ts")
                .map(|ts| ts.as_str().trim().to_string())
                .filter(|ts| !ts.is_empty()),
            body: caps.name("body").map_or("", |b| b.as_str()).trim().to_string(),
        };
    }
    Comment {
        author: None,
        timestamp: None,
        body: trimmed.to_string(),
    }
}

/// The text between `{>>` and `<<}` that [`parse_comment`] reads back as `comment`.
pub fn render_comment(comment: &Comment) -> String {
    let author = comment
        .author
        .as_deref()
        .map(|a| a.replace([':', '(', ')', '\n'], " ").trim().to_string())
        .filter(|a| !a.is_empty());
    let body = comment.body.trim();
    match (author, comment.timestamp.as_deref()) {
        (Some(author), Some(timestamp)) => format!("{author} ({timestamp}): {body}"),
        (Some(author), None) if body.is_empty() => {
            if is_bare_word(&author) {
                author
            } else {
                format!("{author}: ")
            }
        }
        (Some(author), None) => format!("{author}: {body}"),
        (None, _) => body.to_string(),
    }
}

fn is_bare_word(text: &str) -> bool {
    !text.is_empty() && text.chars().all(char::is_alphanumeric)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extensions(source: &str) -> Vec<Extension> {
        scan(source, true).placed.into_iter().map(|p| p.extension).collect()
    }

    #[test]
    fn annotations_become_placeholders() {
        let scanned = scan("a {++new++} b", true);
        assert_eq!(scanned.text, format!("a {INLINE_OPEN}0{INLINE_CLOSE} b"));
        assert_eq!(scanned.placed[0].source, "{++new++}");
        assert_eq!(
            segments(&scanned.text),
            vec![Segment::Text("a "), Segment::Placed(0), Segment::Text(" b")]
        );
    }

    #[test]
    fn unterminated_annotation_stays_text() {
        assert!(extensions("a {++new b").is_empty());
        assert!(extensions("a {++new\n\nb++}").is_empty());
    }

    #[test]
    fn highlight_absorbs_following_comment() {
        assert_eq!(
            extensions("{==x==}{>>Ann: check<<}"),
            vec![Extension::Highlight {
                content: "x".to_string(),
                comment: Some(Comment {
                    author: Some("Ann".to_string()),
                    timestamp: None,
                    body: "check".to_string(),
                }),
            }]
        );
    }

    #[test]
    fn substitution_splits_on_first_arrow() {
        assert_eq!(
            extensions("{~~a~>b~>c~~}"),
            vec![Extension::Substitute {
                old: "a".to_string(),
                new: "b~>c".to_string(),
            }]
        );
    }

    #[test]
    fn code_is_never_scanned() {
        assert!(extensions("`{++x++}` and ``$a$``").is_empty());
        assert!(extensions("```\n{++x++}\n```\n").is_empty());
        assert!(extensions(r"\{++x++}").is_empty());
    }

    #[test]
    fn citation_clusters_keep_order_and_locators() {
        assert_eq!(
            extensions("see [@b; @a, p. 4]"),
            vec![Extension::Citation(vec![
                CiteKey::new("b"),
                CiteKey::with_locator("a", "p. 4"),
            ])]
        );
        assert!(extensions("[@handle](https://example.com)").is_empty());
        assert!(extensions("[@a; b]").is_empty());
    }

    #[test]
    fn inline_math_rules() {
        assert_eq!(
            extensions("cost $x^2$."),
            vec![Extension::Math(Math {
                latex: "x^2".to_string(),
                display: false,
            })]
        );
        assert!(extensions("from $5 to $6").is_empty());
        assert!(extensions("a$x$").is_empty());
        assert!(extensions("$x$1").is_empty());
        assert!(extensions("$ x$").is_empty());
    }

    #[test]
    fn display_math_spans_lines() {
        assert_eq!(
            extensions("$$\na + b\n$$"),
            vec![Extension::Math(Math {
                latex: "a + b".to_string(),
                display: true,
            })]
        );
    }

    #[test]
    fn colored_highlight_reads_allowed_colors_only() {
        assert_eq!(
            extensions("==a=={green} ==b=={teal}"),
            vec![
                Extension::Colored {
                    content: "a".to_string(),
                    color: Some("green".to_string()),
                },
                Extension::Colored {
                    content: "b".to_string(),
                    color: None,
                },
            ]
        );
        assert!(extensions("Title\n=====\n").is_empty());
    }

    #[test]
    fn identifier_markers() {
        assert_eq!(
            extensions("{#c1}x{/c1}{#c1>>check this<<}"),
            vec![
                Extension::CommentStart("c1".to_string()),
                Extension::CommentEnd("c1".to_string()),
                Extension::CommentBody {
                    id: "c1".to_string(),
                    comment: Comment {
                        author: None,
                        timestamp: None,
                        body: "check this".to_string(),
                    },
                },
            ]
        );
    }

    #[test]
    fn annotation_brackets_do_not_nest() {
        let scanned = scan("{++a++}", false);
        assert!(scanned.placed.is_empty());
    }

    #[test]
    fn comment_metadata_forms() {
        let full = parse_comment("Ann Lee (2024-05-01T10:00:00Z): fix this");
        assert_eq!(full.author.as_deref(), Some("Ann Lee"));
        assert_eq!(full.timestamp.as_deref(), Some("2024-05-01T10:00:00Z"));
        assert_eq!(full.body, "fix this");

        let author_only = parse_comment("reviewer");
        assert_eq!(author_only.author.as_deref(), Some("reviewer"));
        assert!(author_only.body.is_empty());

        let body_only = parse_comment("needs a source");
        assert_eq!(body_only.author, None);
        assert_eq!(body_only.body, "needs a source");
    }

    #[test]
    fn rendered_comments_parse_back() {
        let comments = [
            Comment {
                author: Some("Ann Lee".to_string()),
                timestamp: Some("2024-05-01T10:00:00Z".to_string()),
                body: "fix".to_string(),
            },
            Comment {
                author: Some("Ann Lee".to_string()),
                timestamp: None,
                body: String::new(),
            },
            Comment {
                author: Some("Ann".to_string()),
                timestamp: None,
                body: "why not?".to_string(),
            },
            Comment {
                author: None,
                timestamp: None,
                body: "two words".to_string(),
            },
        ];
        for comment in comments {
            assert_eq!(parse_comment(&render_comment(&comment)), comment);
        }
    }
}
