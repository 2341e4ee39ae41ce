//! List numbering resolution (`word/numbering.xml`).
//!
//! A paragraph names a numbering instance (`w:numId`) and a level (`w:ilvl`). The instance points
//! at an abstract definition whose level carries the number format; `bullet` makes an unordered
//! list, any other format an ordered one.

use super::tree::Element;
use crate::ir::items::ListInfo;
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct Numbering {
    /// numId -> abstractNumId
    instances: HashMap<String, String>,
    /// (numId, ilvl) -> numFmt from `w:lvlOverride`
    overrides: HashMap<(String, usize), String>,
    /// (abstractNumId, ilvl) -> numFmt
    formats: HashMap<(String, usize), String>,
}

impl Numbering {
    pub fn parse(root: &Element) -> Self {
        let mut numbering = Numbering::default();
        for element in root.elements() {
            match element.name.as_str() {
                "w:abstractNum" => {
                    let Some(abstract_id) = element.attr("w:abstractNumId") else {
                        continue;
                    };
                    for (level, format) in level_formats(element) {
                        numbering
                            .formats
                            .insert((abstract_id.to_string(), level), format);
                    }
                }
                "w:num" => {
                    let Some(num_id) = element.attr("w:numId") else {
                        continue;
                    };
                    if let Some(abstract_id) = element.child_val("w:abstractNumId") {
                        numbering
                            .instances
                            .insert(num_id.to_string(), abstract_id.to_string());
                    }
                    for level_override in element.elements().filter(|e| e.name == "w:lvlOverride") {
                        for (level, format) in level_formats(level_override) {
                            numbering
                                .overrides
                                .insert((num_id.to_string(), level), format);
                        }
                    }
                }
                _ => {}
            }
        }
        numbering
    }

    /// List metadata for a paragraph's `numPr`, `None` when it cannot be resolved.
    pub fn resolve(&self, num_id: &str, level: usize) -> Option<ListInfo> {
        if num_id == "0" {
            return None;
        }
        let format = match self.overrides.get(&(num_id.to_string(), level)) {
            Some(format) => format,
            None => {
                let abstract_id = self.instances.get(num_id)?;
                self.formats.get(&(abstract_id.clone(), level))?
            }
        };
        Some(ListInfo {
            ordered: !matches!(format.as_str(), "bullet" | "none"),
            level,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}

fn level_formats(parent: &Element) -> Vec<(usize, String)> {
    parent
        .elements()
        .filter(|e| e.name == "w:lvl")
        .filter_map(|lvl| {
            let level = lvl.attr("w:ilvl")?.parse().ok()?;
            let format = lvl.child_val("w:numFmt").unwrap_or("decimal");
            Some((level, format.to_string()))
        })
        .collect()
}
