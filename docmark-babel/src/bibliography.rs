//! Bibliography records and the deterministic fallback citation renderer.
//!
//! Records follow the CSL-JSON field names so a CSL-JSON export can be loaded directly and so the
//! same data can be embedded in citation field payloads.

use crate::ir::nodes::CiteKey;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// A personal or institutional name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Name {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub given: Option<String>,
    /// Institutional or otherwise unparsed name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub literal: Option<String>,
}

impl Name {
    pub fn person(family: &str, given: &str) -> Self {
        Name {
            family: Some(family.to_string()),
            given: Some(given.to_string()),
            literal: None,
        }
    }

    pub fn institution(name: &str) -> Self {
        Name {
            literal: Some(name.to_string()),
            ..Default::default()
        }
    }

    /// Family name, or the literal name for institutions.
    pub fn short(&self) -> Option<&str> {
        self.family.as_deref().or(self.literal.as_deref())
    }
}

/// CSL `issued` date.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Issued {
    #[serde(rename = "date-parts", default)]
    pub date_parts: Vec<Vec<Value>>,
}

impl Issued {
    pub fn year(year: i32) -> Self {
        Issued {
            date_parts: vec![vec![Value::from(year)]],
        }
    }
}

/// One bibliography record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BibEntry {
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub author: Vec<Name>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issued: Option<Issued>,
    #[serde(
        rename = "container-title",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub container_title: Option<String>,
    #[serde(
        default,
        deserialize_with = "string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub volume: Option<String>,
    #[serde(
        default,
        deserialize_with = "string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub page: Option<String>,
    #[serde(rename = "DOI", default, skip_serializing_if = "Option::is_none")]
    pub doi: Option<String>,
    #[serde(rename = "URL", default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(rename = "ISBN", default, skip_serializing_if = "Option::is_none")]
    pub isbn: Option<String>,
}

impl BibEntry {
    /// Publication year, if the first date part holds one.
    pub fn year(&self) -> Option<String> {
        let first = self.issued.as_ref()?.date_parts.first()?.first()?;
        match first {
            Value::Number(n) => Some(n.to_string()),
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            _ => None,
        }
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Keyed collection of bibliography records.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bibliography {
    entries: BTreeMap<String, BibEntry>,
}

impl Bibliography {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a CSL-JSON array of records.
    pub fn from_csl_json(source: &str) -> Result<Self, serde_json::Error> {
        let entries: Vec<BibEntry> = serde_json::from_str(source)?;
        Ok(entries.into_iter().collect())
    }

    pub fn insert(&mut self, entry: BibEntry) {
        self.entries.insert(entry.id.clone(), entry);
    }

    pub fn get(&self, key: &str) -> Option<&BibEntry> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<BibEntry> for Bibliography {
    fn from_iter<T: IntoIterator<Item = BibEntry>>(iter: T) -> Self {
        let mut bibliography = Bibliography::new();
        for entry in iter {
            bibliography.insert(entry);
        }
        bibliography
    }
}

/// Plain author-year rendering used when no citation engine is available.
///
/// `(Smith 2020, p. 12; World Health Organization n.d.)`
pub fn fallback_cluster(items: &[(&BibEntry, &CiteKey)]) -> String {
    let parts: Vec<String> = items
        .iter()
        .map(|(entry, cite)| {
            let who = entry
                .author
                .first()
                .and_then(Name::short)
                .or(entry.title.as_deref())
                .unwrap_or(cite.key.as_str());
            let year = entry.year().unwrap_or_else(|| "n.d.".to_string());
            match &cite.locator {
                Some(locator) => format!("{who} {year}, {locator}"),
                None => format!("{who} {year}"),
            }
        })
        .collect();
    format!("({})", parts.join("; "))
}

/// One plain bibliography line per entry, in the given order.
pub fn fallback_bibliography(entries: &[&BibEntry]) -> Vec<String> {
    entries
        .iter()
        .map(|entry| {
            let mut line = String::new();
            let names: Vec<String> = entry
                .author
                .iter()
                .map(|name| match (&name.family, &name.given, &name.literal) {
                    (Some(family), Some(given), _) => format!("{family}, {given}"),
                    (Some(family), None, _) => family.clone(),
                    (None, _, Some(literal)) => literal.clone(),
                    _ => String::new(),
                })
                .filter(|n| !n.is_empty())
                .collect();
            if !names.is_empty() {
                line.push_str(&names.join("; "));
                line.push_str(". ");
            }
            line.push_str(&entry.year().unwrap_or_else(|| "n.d.".to_string()));
            line.push('.');
            if let Some(title) = &entry.title {
                line.push(' ');
                line.push_str(title);
                line.push('.');
            }
            let mut tail = Vec::new();
            if let Some(container) = &entry.container_title {
                tail.push(container.clone());
            }
            if let Some(volume) = &entry.volume {
                tail.push(volume.clone());
            }
            if let Some(page) = &entry.page {
                tail.push(page.clone());
            }
            if !tail.is_empty() {
                line.push(' ');
                line.push_str(&tail.join(", "));
                line.push('.');
            }
            if let Some(doi) = &entry.doi {
                line.push_str(" https://doi.org/");
                line.push_str(doi);
            }
            line
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn smith() -> BibEntry {
        BibEntry {
            id: "smith2020".to_string(),
            kind: "article-journal".to_string(),
            title: Some("On Things".to_string()),
            author: vec![Name::person("Smith", "Jane")],
            issued: Some(Issued::year(2020)),
            container_title: Some("Journal of Stuff".to_string()),
            volume: Some("4".to_string()),
            page: Some("1-10".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn loads_csl_json_with_numeric_fields() {
        let json = r#"[{"id": "a", "type": "book", "title": "T", "volume": 3,
            "author": [{"literal": "WHO"}], "issued": {"date-parts": [["2019"]]}}]"#;
        let bib = Bibliography::from_csl_json(json).unwrap();
        let entry = bib.get("a").unwrap();
        assert_eq!(entry.volume.as_deref(), Some("3"));
        assert_eq!(entry.year().as_deref(), Some("2019"));
        assert_eq!(entry.author[0].short(), Some("WHO"));
    }

    #[test]
    fn fallback_cluster_uses_family_year_and_locator() {
        let entry = smith();
        let cite = CiteKey::with_locator("smith2020", "p. 12");
        assert_eq!(fallback_cluster(&[(&entry, &cite)]), "(Smith 2020, p. 12)");
    }

    #[test]
    fn fallback_cluster_handles_missing_year_and_institutions() {
        let entry = BibEntry {
            id: "who".to_string(),
            author: vec![Name::institution("World Health Organization")],
            ..Default::default()
        };
        let cite = CiteKey::new("who");
        assert_eq!(
            fallback_cluster(&[(&entry, &cite)]),
            "(World Health Organization n.d.)"
        );
    }

    #[test]
    fn fallback_bibliography_line() {
        let entry = smith();
        assert_eq!(
            fallback_bibliography(&[&entry]),
            vec!["Smith, Jane. 2020. On Things. Journal of Stuff, 4, 1-10.".to_string()]
        );
    }
}
