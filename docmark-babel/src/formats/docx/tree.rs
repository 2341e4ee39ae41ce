//! Typed XML tree for WordprocessingML parts.
//!
//! roxmltree parses the part; this module copies it into owned elements whose tag is one of a
//! closed set of kinds the extractor understands. Everything else keeps its prefixed name in
//! [`Tag::Other`] so property lookups (`w:b`, `w:numId`, ...) still work by name.

use super::xml::{escape_attr, escape_text, namespace_for, prefix_for, M_NS, W_NS};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tag {
    Document,
    Body,
    Paragraph,
    ParagraphProps,
    Run,
    RunProps,
    Text,
    DeletedText,
    Tab,
    Break,
    Hyperlink,
    Table,
    TableRow,
    TableRowProps,
    TableCell,
    Inserted,
    Deleted,
    CommentRangeStart,
    CommentRangeEnd,
    CommentReference,
    FieldChar,
    InstrText,
    SimpleField,
    /// `w:sdt`, `w:sdtContent`, `w:smartTag`, `w:customXml`: walked through transparently
    Container,
    MathPara,
    Math,
    Other(String),
}

impl Tag {
    fn classify(namespace: Option<&str>, local: &str, qualified: &str) -> Tag {
        match namespace {
            Some(W_NS) => match local {
                "document" => Tag::Document,
                "body" => Tag::Body,
                "p" => Tag::Paragraph,
                "pPr" => Tag::ParagraphProps,
                "r" => Tag::Run,
                "rPr" => Tag::RunProps,
                "t" => Tag::Text,
                "delText" => Tag::DeletedText,
                "tab" => Tag::Tab,
                "br" | "cr" => Tag::Break,
                "hyperlink" => Tag::Hyperlink,
                "tbl" => Tag::Table,
                "tr" => Tag::TableRow,
                "trPr" => Tag::TableRowProps,
                "tc" => Tag::TableCell,
                "ins" => Tag::Inserted,
                "del" => Tag::Deleted,
                "commentRangeStart" => Tag::CommentRangeStart,
                "commentRangeEnd" => Tag::CommentRangeEnd,
                "commentReference" => Tag::CommentReference,
                "fldChar" => Tag::FieldChar,
                "instrText" | "delInstrText" => Tag::InstrText,
                "fldSimple" => Tag::SimpleField,
                "sdt" | "sdtContent" | "smartTag" | "customXml" => Tag::Container,
                _ => Tag::Other(qualified.to_string()),
            },
            Some(M_NS) => match local {
                "oMathPara" => Tag::MathPara,
                "oMath" => Tag::Math,
                _ => Tag::Other(qualified.to_string()),
            },
            _ => Tag::Other(qualified.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum XmlNode {
    Element(Element),
    Text(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub tag: Tag,
    /// Prefixed name, e.g. `w:p`; unknown namespaces keep the local name only
    pub name: String,
    pub namespace: Option<String>,
    /// Attributes keyed by prefixed name, e.g. `w:val`, `r:id`
    pub attrs: BTreeMap<String, String>,
    pub children: Vec<XmlNode>,
}

impl Element {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(String::as_str)
    }

    /// Child elements in order.
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|child| match child {
            XmlNode::Element(element) => Some(element),
            XmlNode::Text(_) => None,
        })
    }

    pub fn child(&self, tag: &Tag) -> Option<&Element> {
        self.elements().find(|e| &e.tag == tag)
    }

    pub fn child_named(&self, name: &str) -> Option<&Element> {
        self.elements().find(|e| e.name == name)
    }

    /// `w:val` of the named child, e.g. `pPr.child_val("w:pStyle")`.
    pub fn child_val(&self, name: &str) -> Option<&str> {
        self.child_named(name)?.attr("w:val")
    }

    /// Concatenated text of all descendants.
    pub fn text(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        for child in &self.children {
            match child {
                XmlNode::Text(text) => out.push_str(text),
                XmlNode::Element(element) => element.collect_text(out),
            }
        }
    }

    /// Serialize this element as a standalone fragment, declaring every known prefix it uses.
    pub fn to_xml(&self) -> String {
        let mut prefixes = Vec::new();
        self.collect_prefixes(&mut prefixes);
        let mut out = String::new();
        self.write_xml(&mut out, Some(&prefixes));
        out
    }

    fn collect_prefixes(&self, prefixes: &mut Vec<&'static str>) {
        let names = std::iter::once(self.name.as_str()).chain(self.attrs.keys().map(String::as_str));
        for name in names {
            if let Some((prefix, _)) = name.split_once(':') {
                if let Some(ns) = namespace_for(prefix) {
                    let prefix = prefix_for(ns).unwrap_or_default();
                    if prefix != "xml" && !prefixes.contains(&prefix) {
                        prefixes.push(prefix);
                    }
                }
            }
        }
        for element in self.elements() {
            element.collect_prefixes(prefixes);
        }
    }

    fn write_xml(&self, out: &mut String, declare: Option<&[&'static str]>) {
        out.push('<');
        out.push_str(&self.name);
        if let Some(prefixes) = declare {
            for prefix in prefixes {
                if let Some(ns) = namespace_for(prefix) {
                    out.push_str(&format!(" xmlns:{prefix}=\"{ns}\""));
                }
            }
        }
        if !self.name.contains(':') {
            if let Some(ns) = &self.namespace {
                out.push_str(&format!(" xmlns=\"{}\"", escape_attr(ns)));
            }
        }
        for (key, value) in &self.attrs {
            out.push_str(&format!(" {key}=\"{}\"", escape_attr(value)));
        }
        if self.children.is_empty() {
            out.push_str("/>");
            return;
        }
        out.push('>');
        for child in &self.children {
            match child {
                XmlNode::Text(text) => out.push_str(&escape_text(text)),
                XmlNode::Element(element) => element.write_xml(out, None),
            }
        }
        out.push_str("</");
        out.push_str(&self.name);
        out.push('>');
    }
}

/// Parse a part into its typed root element.
pub fn parse(source: &str) -> Result<Element, roxmltree::Error> {
    let options = roxmltree::ParsingOptions {
        allow_dtd: true,
        ..Default::default()
    };
    let doc = roxmltree::Document::parse_with_options(source, options)?;
    Ok(convert(doc.root_element()))
}

fn qualify(namespace: Option<&str>, local: &str) -> String {
    match namespace.and_then(prefix_for) {
        Some(prefix) => format!("{prefix}:{local}"),
        None => local.to_string(),
    }
}

fn convert(node: roxmltree::Node<'_, '_>) -> Element {
    let namespace = node.tag_name().namespace();
    let local = node.tag_name().name();
    let name = qualify(namespace, local);
    let tag = Tag::classify(namespace, local, &name);

    let attrs = node
        .attributes()
        .map(|attr| (qualify(attr.namespace(), attr.name()), attr.value().to_string()))
        .collect();

    let children = node
        .children()
        .filter_map(|child| {
            if child.is_element() {
                Some(XmlNode::Element(convert(child)))
            } else if child.is_text() {
                child.text().map(|t| XmlNode::Text(t.to_string()))
            } else {
                None
            }
        })
        .collect();

    Element {
        tag,
        name,
        namespace: namespace.map(str::to_string),
        attrs,
        children,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"
        xmlns:m="http://schemas.openxmlformats.org/officeDocument/2006/math">
        <w:body><w:p><w:pPr><w:pStyle w:val="Heading2"/></w:pPr>
        <w:r><w:t>Hi</w:t></w:r><m:oMath><m:r><m:t>x</m:t></m:r></m:oMath></w:p></w:body></w:document>"#;

    #[test]
    fn classifies_known_tags_and_prefixes_attributes() {
        let root = parse(SAMPLE).unwrap();
        assert_eq!(root.tag, Tag::Document);
        let body = root.child(&Tag::Body).unwrap();
        let para = body.child(&Tag::Paragraph).unwrap();
        let props = para.child(&Tag::ParagraphProps).unwrap();
        assert_eq!(props.child_val("w:pStyle"), Some("Heading2"));
        assert_eq!(para.child(&Tag::Run).unwrap().text(), "Hi");
    }

    #[test]
    fn math_fragments_serialize_with_namespace() {
        let root = parse(SAMPLE).unwrap();
        let para = root.child(&Tag::Body).unwrap().child(&Tag::Paragraph).unwrap();
        let math = para.child(&Tag::Math).unwrap();
        let xml = math.to_xml();
        assert!(xml.starts_with("<m:oMath xmlns:m=\""));
        assert!(xml.contains("<m:t>x</m:t>"));
        assert!(roxmltree::Document::parse(&xml).is_ok());
    }
}
