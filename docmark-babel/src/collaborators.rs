//! External collaborators of the conversion core.
//!
//! The core never formats citations in a particular style or converts LaTeX itself. Those jobs
//! belong to the implementations injected through [`Environment`]: a [`CitationEngine`] (optional,
//! the fallback renderer in [`crate::bibliography`] is used when absent) and a [`MathConverter`]
//! ([`LiteralMath`] is bundled).

use crate::bibliography::Bibliography;
use crate::ir::nodes::CiteKey;
use crate::options::ConvertOptions;
use std::fmt;

/// Failure reported by a citation engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CitationError(pub String);

impl fmt::Display for CitationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for CitationError {}

/// Citation-style rendering engine.
pub trait CitationEngine {
    /// Make the given keys known to the engine before any rendering.
    fn register(&mut self, keys: &[String]) -> Result<(), CitationError>;

    /// Render one in-text citation for the ordered keys and locators.
    fn render_cluster(&mut self, items: &[CiteKey]) -> Result<String, CitationError>;

    /// Render the bibliography of every registered key, one string per entry.
    fn render_bibliography(&mut self) -> Result<Vec<String>, CitationError>;
}

/// Failure converting one equation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MathError(pub String);

impl fmt::Display for MathError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for MathError {}

/// LaTeX ↔ Office Math Markup converter.
pub trait MathConverter {
    /// Convert LaTeX to a complete `<m:oMath>` element.
    fn latex_to_omml(&self, latex: &str) -> Result<String, MathError>;

    /// Convert a standalone `<m:oMath>` element (namespaces declared on it) back to LaTeX.
    fn omml_to_latex(&self, omml: &str) -> Result<String, MathError>;
}

pub(crate) const MATH_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/math";

/// Stores the LaTeX source verbatim as the text of a single math run.
///
/// Word shows the source rather than typeset math, but the equation survives any number of
/// round trips unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct LiteralMath;

impl MathConverter for LiteralMath {
    fn latex_to_omml(&self, latex: &str) -> Result<String, MathError> {
        if latex.trim().is_empty() {
            return Err(MathError("empty equation".to_string()));
        }
        Ok(format!(
            "<m:oMath><m:r><m:t xml:space=\"preserve\">{}</m:t></m:r></m:oMath>",
            crate::formats::docx::xml::escape_text(latex)
        ))
    }

    fn omml_to_latex(&self, omml: &str) -> Result<String, MathError> {
        let doc = roxmltree::Document::parse(omml).map_err(|e| MathError(e.to_string()))?;
        let text: String = doc
            .descendants()
            .filter(|n| n.is_element() && n.has_tag_name((MATH_NS, "t")))
            .filter_map(|n| n.text())
            .collect();
        if text.is_empty() {
            Err(MathError("equation has no text".to_string()))
        } else {
            Ok(text)
        }
    }
}

static LITERAL_MATH: LiteralMath = LiteralMath;

/// Everything a conversion needs besides its input.
pub struct Environment<'a> {
    pub options: ConvertOptions,
    pub bibliography: Option<&'a Bibliography>,
    pub engine: Option<&'a mut dyn CitationEngine>,
    pub math: &'a dyn MathConverter,
}

impl<'a> Environment<'a> {
    pub fn new(options: ConvertOptions) -> Self {
        Environment {
            options,
            bibliography: None,
            engine: None,
            math: &LITERAL_MATH,
        }
    }

    pub fn with_bibliography(mut self, bibliography: &'a Bibliography) -> Self {
        self.bibliography = Some(bibliography);
        self
    }

    pub fn with_engine(mut self, engine: &'a mut dyn CitationEngine) -> Self {
        self.engine = Some(engine);
        self
    }

    pub fn with_math(mut self, math: &'a dyn MathConverter) -> Self {
        self.math = math;
        self
    }
}

impl Default for Environment<'_> {
    fn default() -> Self {
        Environment::new(ConvertOptions::default())
    }
}
