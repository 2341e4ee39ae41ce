//! Field-instruction accumulator
//!
//!     Word stores computed content (citations, bibliographies, page numbers) as complex fields:
//!     a begin marker, instruction text, a separator, the visible result and an end marker, each
//!     carried by its own run and possibly spread over several paragraphs. Fields nest.
//!
//!     The accumulator is a small state machine with one frame per open field. Each frame moves
//!     from the instruction phase to the result phase at the separator. While walking runs the
//!     extractor asks [FieldAccumulator::disposition] what to do with visible text: pass it
//!     through, capture it into the innermost citation, or drop it.
//!
//!     Simple fields (`w:fldSimple`) are fed through the same protocol by the caller.

use crate::ir::nodes::CiteKey;
use serde_json::Value;

/// Prefix written before the citation JSON payload.
pub const CITATION_INSTRUCTION: &str = "ADDIN ZOTERO_ITEM CSL_CITATION";
/// Prefix written before the bibliography JSON payload.
pub const BIBLIOGRAPHY_INSTRUCTION: &str = "ADDIN ZOTERO_BIBL";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Citation,
    Bibliography,
    Other,
}

impl FieldKind {
    pub fn classify(instruction: &str) -> Self {
        let trimmed = instruction.trim_start();
        if trimmed.starts_with("ADDIN ZOTERO_ITEM") || trimmed.contains("CSL_CITATION") {
            FieldKind::Citation
        } else if trimmed.starts_with(BIBLIOGRAPHY_INSTRUCTION)
            || trimmed.contains("CSL_BIBLIOGRAPHY")
        {
            FieldKind::Bibliography
        } else {
            FieldKind::Other
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Instruction,
    Result,
}

#[derive(Debug, Clone)]
struct Frame {
    phase: Phase,
    instruction: String,
    result: String,
}

impl Frame {
    fn kind(&self) -> FieldKind {
        FieldKind::classify(&self.instruction)
    }
}

/// What to do with visible text at the current point of the walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Emit as ordinary content
    Pass,
    /// Append to the innermost citation's result
    Capture,
    /// Drop (instruction phase, or inside a bibliography)
    Suppress,
}

/// A field whose end marker has been seen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedField {
    pub kind: FieldKind,
    pub instruction: String,
    pub result: String,
}

#[derive(Debug, Clone, Default)]
pub struct FieldAccumulator {
    frames: Vec<Frame>,
}

impl FieldAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_idle(&self) -> bool {
        self.frames.is_empty()
    }

    /// `w:fldChar w:fldCharType="begin"`
    pub fn begin(&mut self) {
        self.frames.push(Frame {
            phase: Phase::Instruction,
            instruction: String::new(),
            result: String::new(),
        });
    }

    /// `w:instrText` content. Ignored outside an instruction phase.
    pub fn instruction(&mut self, text: &str) {
        if let Some(frame) = self.frames.last_mut() {
            if frame.phase == Phase::Instruction {
                frame.instruction.push_str(text);
            }
        }
    }

    /// `w:fldChar w:fldCharType="separate"`
    pub fn separate(&mut self) {
        if let Some(frame) = self.frames.last_mut() {
            frame.phase = Phase::Result;
        }
    }

    /// `w:fldChar w:fldCharType="end"`. A stray end marker yields `None`.
    pub fn end(&mut self) -> Option<CompletedField> {
        let frame = self.frames.pop()?;
        let kind = frame.kind();
        if kind == FieldKind::Citation {
            // a citation nested in another capturing field still contributes its text
            if let Some(outer) = self.frames.last_mut() {
                if outer.phase == Phase::Result && outer.kind() == FieldKind::Citation {
                    outer.result.push_str(&frame.result);
                }
            }
        }
        Some(CompletedField {
            kind,
            instruction: frame.instruction,
            result: frame.result,
        })
    }

    pub fn disposition(&self) -> Disposition {
        if self.frames.is_empty() {
            return Disposition::Pass;
        }
        if self.frames.iter().any(|f| f.phase == Phase::Instruction) {
            return Disposition::Suppress;
        }
        if self
            .frames
            .iter()
            .any(|f| f.kind() == FieldKind::Bibliography)
        {
            return Disposition::Suppress;
        }
        if self.frames.iter().any(|f| f.kind() == FieldKind::Citation) {
            return Disposition::Capture;
        }
        Disposition::Pass
    }

    /// Append visible text to the innermost citation frame.
    pub fn capture(&mut self, text: &str) {
        if let Some(frame) = self
            .frames
            .iter_mut()
            .rev()
            .find(|f| f.kind() == FieldKind::Citation)
        {
            frame.result.push_str(text);
        }
    }
}

/// Recover the markup keys from a citation instruction's JSON payload.
///
/// Each `citationItems` entry yields its `citekey`, falling back to `itemData.id` and then `id`;
/// `locator` is kept when present.
pub fn citation_keys(instruction: &str) -> Result<Vec<CiteKey>, String> {
    let start = instruction
        .find('{')
        .ok_or_else(|| "no JSON payload".to_string())?;
    let mut stream = serde_json::Deserializer::from_str(&instruction[start..]).into_iter::<Value>();
    let payload = match stream.next() {
        Some(Ok(value)) => value,
        Some(Err(e)) => return Err(e.to_string()),
        None => return Err("no JSON payload".to_string()),
    };
    let items = payload
        .get("citationItems")
        .and_then(Value::as_array)
        .ok_or_else(|| "missing citationItems".to_string())?;

    let mut keys = Vec::with_capacity(items.len());
    for item in items {
        let key = item
            .get("citekey")
            .and_then(value_as_string)
            .or_else(|| item.pointer("/itemData/id").and_then(value_as_string))
            .or_else(|| item.get("id").and_then(value_as_string))
            .ok_or_else(|| "citation item without a key".to_string())?;
        let locator = item
            .get("locator")
            .and_then(value_as_string)
            .filter(|l| !l.is_empty());
        keys.push(CiteKey { key, locator });
    }
    if keys.is_empty() {
        return Err("empty citationItems".to_string());
    }
    Ok(keys)
}

fn value_as_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
