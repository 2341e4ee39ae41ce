//! Citation field payloads and the literal form of unresolved citations.
//!
//! Resolved keys travel as a citation field whose instruction carries CSL-JSON item data plus
//! the markup key, so a reference manager can refresh the field and the extractor can recover
//! the keys. Keys missing from the bibliography are written as literal text, `(@a; @b, p. 4)`,
//! which the extractor recognizes again.

use crate::bibliography::BibEntry;
use crate::common::fields::{BIBLIOGRAPHY_INSTRUCTION, CITATION_INSTRUCTION};
use crate::ir::nodes::CiteKey;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Value};

const CSL_CITATION_SCHEMA: &str =
    "https://github.com/citation-style-language/schema/raw/master/csl-citation.json";

/// Instruction text of a citation field.
pub fn citation_instruction(
    cluster: usize,
    items: &[(&BibEntry, &CiteKey)],
    rendered: &str,
) -> Result<String, serde_json::Error> {
    let citation_items = items
        .iter()
        .map(|(entry, cite)| -> Result<Value, serde_json::Error> {
            let mut item = json!({
                "id": cite.key,
                "itemData": serde_json::to_value(entry)?,
                "citekey": cite.key,
            });
            if let (Some(locator), Value::Object(map)) = (&cite.locator, &mut item) {
                map.insert("locator".to_string(), Value::from(locator.as_str()));
            }
            Ok(item)
        })
        .collect::<Result<Vec<Value>, serde_json::Error>>()?;

    let payload = json!({
        "citationID": format!("docmark{cluster}"),
        "properties": {
            "formattedCitation": rendered,
            "plainCitation": rendered,
            "noteIndex": 0,
        },
        "citationItems": citation_items,
        "schema": CSL_CITATION_SCHEMA,
    });
    Ok(format!(
        " {CITATION_INSTRUCTION} {} ",
        serde_json::to_string(&payload)?
    ))
}

/// Instruction text of the bibliography field.
pub fn bibliography_instruction() -> String {
    format!(
        " {BIBLIOGRAPHY_INSTRUCTION} {} CSL_BIBLIOGRAPHY ",
        json!({"uncited": [], "omitted": [], "custom": []})
    )
}

/// `(@a; @b, p. 4)`
pub fn unresolved_literal(keys: &[&CiteKey]) -> String {
    let parts: Vec<String> = keys
        .iter()
        .map(|cite| match &cite.locator {
            Some(locator) => format!("@{}, {locator}", cite.key),
            None => format!("@{}", cite.key),
        })
        .collect();
    format!("({})", parts.join("; "))
}

static LITERAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\((@[^()]*)\)").expect("literal citation pattern"));

static LITERAL_PART: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^@(?P<key>[^\s;,@\[\]()]+)(?:, (?P<locator>[^;]+))?$")
        .expect("literal citation part pattern")
});

/// A literal citation found inside a text span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiteralCitation {
    /// Byte range of the literal within the text
    pub start: usize,
    pub end: usize,
    pub keys: Vec<CiteKey>,
}

/// Literal citations in `text`, in order.
pub fn find_literals(text: &str) -> Vec<LiteralCitation> {
    LITERAL
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let inner = caps.get(1)?.as_str();
            let keys = inner
                .split("; ")
                .map(|part| {
                    let parts = LITERAL_PART.captures(part)?;
                    let key = parts.name("key")?.as_str();
                    Some(match parts.name("locator") {
                        Some(locator) => CiteKey::with_locator(key, locator.as_str()),
                        None => CiteKey::new(key),
                    })
                })
                .collect::<Option<Vec<_>>>()?;
            Some(LiteralCitation {
                start: whole.start(),
                end: whole.end(),
                keys,
            })
        })
        .collect()
}
