//! Namespace constants and escaping helpers for the WordprocessingML parts.

pub const W_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";
pub const R_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
pub const M_NS: &str = crate::collaborators::MATH_NS;
pub const XML_NS: &str = "http://www.w3.org/XML/1998/namespace";
pub const PKG_REL_NS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";

pub const REL_HYPERLINK: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/hyperlink";
pub const REL_STYLES: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles";
pub const REL_NUMBERING: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/numbering";
pub const REL_COMMENTS: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/comments";
pub const REL_OFFICE_DOCUMENT: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument";

pub const XML_DECLARATION: &str =
    "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n";

/// Known namespace URIs and the prefixes the typed tree uses for them.
pub const PREFIXES: &[(&str, &str)] = &[
    (W_NS, "w"),
    (R_NS, "r"),
    (M_NS, "m"),
    (XML_NS, "xml"),
    (PKG_REL_NS, "rel"),
];

pub fn prefix_for(namespace: &str) -> Option<&'static str> {
    PREFIXES
        .iter()
        .find(|(ns, _)| *ns == namespace)
        .map(|(_, prefix)| *prefix)
}

pub fn namespace_for(prefix: &str) -> Option<&'static str> {
    PREFIXES
        .iter()
        .find(|(_, p)| *p == prefix)
        .map(|(ns, _)| *ns)
}

/// Escape character data.
pub fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            c if is_xml_char(c) => out.push(c),
            _ => {}
        }
    }
    out
}

/// Escape an attribute value (double-quoted).
pub fn escape_attr(text: &str) -> String {
    escape_text(text).replace('"', "&quot;")
}

fn is_xml_char(c: char) -> bool {
    matches!(c, '\t' | '\n' | '\r') || (c >= ' ' && c != '\u{FFFE}' && c != '\u{FFFF}')
}
