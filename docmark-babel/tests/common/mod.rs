//! Shared helpers for the integration tests.

use docmark_babel::bibliography::{BibEntry, Bibliography, Issued, Name};
use docmark_babel::collaborators::{CitationEngine, CitationError};
use docmark_babel::formats::docx::package::{Package, CONTENT_TYPES, COMMENTS, DOCUMENT};
use docmark_babel::ir::nodes::CiteKey;
use docmark_babel::{docx_to_markdown, markdown_to_docx, ConvertOptions, Environment};

pub const W_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";

/// Markup to package bytes with default options.
pub fn to_docx(markup: &str) -> Vec<u8> {
    markdown_to_docx(markup, &mut Environment::default())
        .expect("markup to convert")
        .bytes
}

/// Package bytes back to markup with the given options.
pub fn to_markdown_with(bytes: &[u8], options: ConvertOptions) -> String {
    docx_to_markdown(bytes, &mut Environment::new(options))
        .expect("package to convert")
        .markdown
}

pub fn to_markdown(bytes: &[u8]) -> String {
    to_markdown_with(bytes, ConvertOptions::default())
}

pub fn round_trip(markup: &str) -> String {
    to_markdown(&to_docx(markup))
}

/// Text of one part of a package.
pub fn part(bytes: &[u8], name: &str) -> String {
    let package = Package::read(bytes).expect("package to read");
    let content = package.get(name).expect("part to exist");
    String::from_utf8(content.to_vec()).expect("part to be UTF-8")
}

/// A minimal package with the given body and optional comments.
pub fn package(body: &str, comments: &[(&str, &str)]) -> Vec<u8> {
    let mut package = Package::new();
    package.insert(CONTENT_TYPES, "<Types/>");
    package.insert(
        DOCUMENT,
        format!(
            "<w:document xmlns:w=\"{W_NS}\" \
             xmlns:r=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships\">\
             <w:body>{body}</w:body></w:document>"
        ),
    );
    if !comments.is_empty() {
        let mut xml = format!("<w:comments xmlns:w=\"{W_NS}\">");
        for (id, body) in comments {
            xml.push_str(&format!(
                "<w:comment w:id=\"{id}\" w:author=\"\"><w:p><w:r><w:t>{body}</w:t></w:r></w:p></w:comment>"
            ));
        }
        xml.push_str("</w:comments>");
        package.insert(COMMENTS, xml);
    }
    package.write().expect("package to write")
}

pub fn text_run(text: &str) -> String {
    format!("<w:r><w:t xml:space=\"preserve\">{text}</w:t></w:r>")
}

pub fn range_start(id: &str) -> String {
    format!("<w:commentRangeStart w:id=\"{id}\"/>")
}

pub fn range_end(id: &str) -> String {
    format!(
        "<w:commentRangeEnd w:id=\"{id}\"/><w:r><w:commentReference w:id=\"{id}\"/></w:r>"
    )
}

pub fn sample_bibliography() -> Bibliography {
    [
        BibEntry {
            id: "smith2020".to_string(),
            kind: "book".to_string(),
            title: Some("Field Notes".to_string()),
            author: vec![Name::person("Smith", "Jane")],
            issued: Some(Issued::year(2020)),
            ..Default::default()
        },
        BibEntry {
            id: "lee2018".to_string(),
            kind: "article-journal".to_string(),
            title: Some("On Margins".to_string()),
            author: vec![Name::person("Lee", "Ann")],
            issued: Some(Issued::year(2018)),
            ..Default::default()
        },
    ]
    .into_iter()
    .collect()
}

/// Citation engine that numbers keys in registration order.
#[derive(Default)]
pub struct NumberingEngine {
    pub registered: Vec<String>,
    pub fail: bool,
}

impl CitationEngine for NumberingEngine {
    fn register(&mut self, keys: &[String]) -> Result<(), CitationError> {
        if self.fail {
            return Err(CitationError("engine offline".to_string()));
        }
        self.registered = keys.to_vec();
        Ok(())
    }

    fn render_cluster(&mut self, items: &[CiteKey]) -> Result<String, CitationError> {
        let numbers: Vec<String> = items
            .iter()
            .filter_map(|item| self.registered.iter().position(|k| *k == item.key))
            .map(|index| (index + 1).to_string())
            .collect();
        Ok(format!("[{}]", numbers.join(", ")))
    }

    fn render_bibliography(&mut self) -> Result<Vec<String>, CitationError> {
        Ok(self
            .registered
            .iter()
            .enumerate()
            .map(|(index, key)| format!("{}. {key}", index + 1))
            .collect())
    }
}
