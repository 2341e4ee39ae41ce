//! Fixed and near-fixed package parts: content types, relationships, styles, numbering and
//! comments.

use super::package::{COMMENTS, NUMBERING};
use super::xml::{
    escape_attr, escape_text, PKG_REL_NS, REL_COMMENTS, REL_HYPERLINK, REL_NUMBERING,
    REL_OFFICE_DOCUMENT, REL_STYLES, W_NS, XML_DECLARATION,
};
use crate::ir::nodes::Comment;

/// Left indent per block quote level, in twentieths of a point.
pub const QUOTE_INDENT_TWIPS: usize = 720;
/// Left indent step per list level in the numbering part.
pub const LIST_INDENT_TWIPS: usize = 360;
/// Numbering instance used for bullet list items.
pub const BULLET_NUM_ID: u32 = 1;
/// Numbering instance used for ordered list items.
pub const ORDERED_NUM_ID: u32 = 2;
/// Deepest list level the numbering part defines.
pub const MAX_LIST_LEVEL: usize = 8;
/// Character style marking citation keys the bibliography could not resolve.
pub const LITERAL_CITATION_STYLE: &str = "UnresolvedCitation";

/// A relationship of `word/document.xml`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    pub id: String,
    pub kind: &'static str,
    pub target: String,
    pub external: bool,
}

pub fn content_types(numbering: bool, comments: bool) -> String {
    let mut xml = String::from(XML_DECLARATION);
    xml.push_str(
        "<Types xmlns=\"http://schemas.openxmlformats.org/package/2006/content-types\">\
         <Default Extension=\"rels\" ContentType=\"application/vnd.openxmlformats-package.relationships+xml\"/>\
         <Default Extension=\"xml\" ContentType=\"application/xml\"/>\
         <Override PartName=\"/word/document.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml\"/>\
         <Override PartName=\"/word/styles.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.wordprocessingml.styles+xml\"/>",
    );
    if numbering {
        xml.push_str(&format!(
            "<Override PartName=\"/{NUMBERING}\" ContentType=\"application/vnd.openxmlformats-officedocument.wordprocessingml.numbering+xml\"/>"
        ));
    }
    if comments {
        xml.push_str(&format!(
            "<Override PartName=\"/{COMMENTS}\" ContentType=\"application/vnd.openxmlformats-officedocument.wordprocessingml.comments+xml\"/>"
        ));
    }
    xml.push_str("</Types>");
    xml
}

pub fn package_relationships() -> String {
    relationships_xml(&[Relationship {
        id: "rId1".to_string(),
        kind: REL_OFFICE_DOCUMENT,
        target: "word/document.xml".to_string(),
        external: false,
    }])
}

/// Relationships of the main document: styles, optional numbering and comments, then hyperlinks.
pub fn document_relationships(
    numbering: bool,
    comments: bool,
    hyperlinks: &[(String, String)],
) -> String {
    let mut rels = vec![Relationship {
        id: "rId1".to_string(),
        kind: REL_STYLES,
        target: "styles.xml".to_string(),
        external: false,
    }];
    if numbering {
        rels.push(Relationship {
            id: "rId2".to_string(),
            kind: REL_NUMBERING,
            target: "numbering.xml".to_string(),
            external: false,
        });
    }
    if comments {
        rels.push(Relationship {
            id: "rId3".to_string(),
            kind: REL_COMMENTS,
            target: "comments.xml".to_string(),
            external: false,
        });
    }
    rels.extend(hyperlinks.iter().map(|(url, id)| Relationship {
        id: id.clone(),
        kind: REL_HYPERLINK,
        target: url.clone(),
        external: true,
    }));
    relationships_xml(&rels)
}

fn relationships_xml(rels: &[Relationship]) -> String {
    let mut xml = String::from(XML_DECLARATION);
    xml.push_str(&format!("<Relationships xmlns=\"{PKG_REL_NS}\">"));
    for rel in rels {
        xml.push_str(&format!(
            "<Relationship Id=\"{}\" Type=\"{}\" Target=\"{}\"{}/>",
            escape_attr(&rel.id),
            rel.kind,
            escape_attr(&rel.target),
            if rel.external {
                " TargetMode=\"External\""
            } else {
                ""
            }
        ));
    }
    xml.push_str("</Relationships>");
    xml
}

fn paragraph_style(id: &str, name: &str, extra_ppr: &str, rpr: &str) -> String {
    format!(
        "<w:style w:type=\"paragraph\" w:styleId=\"{id}\"><w:name w:val=\"{name}\"/>\
         <w:basedOn w:val=\"Normal\"/><w:next w:val=\"Normal\"/><w:qFormat/>\
         <w:pPr>{extra_ppr}</w:pPr><w:rPr>{rpr}</w:rPr></w:style>"
    )
}

pub fn styles() -> String {
    let mut xml = String::from(XML_DECLARATION);
    xml.push_str(&format!("<w:styles xmlns:w=\"{W_NS}\">"));
    xml.push_str(
        "<w:docDefaults><w:rPrDefault><w:rPr><w:sz w:val=\"24\"/></w:rPr></w:rPrDefault>\
         <w:pPrDefault><w:pPr><w:spacing w:after=\"160\"/></w:pPr></w:pPrDefault></w:docDefaults>\
         <w:style w:type=\"paragraph\" w:default=\"1\" w:styleId=\"Normal\"><w:name w:val=\"Normal\"/><w:qFormat/></w:style>",
    );
    const HEADING_SIZES: [u32; 6] = [36, 32, 28, 26, 24, 22];
    for (index, size) in HEADING_SIZES.iter().enumerate() {
        let level = index + 1;
        xml.push_str(&paragraph_style(
            &format!("Heading{level}"),
            &format!("heading {level}"),
            &format!(
                "<w:keepNext/><w:spacing w:before=\"240\" w:after=\"120\"/><w:outlineLvl w:val=\"{index}\"/>"
            ),
            &format!("<w:b/><w:sz w:val=\"{size}\"/>"),
        ));
    }
    xml.push_str(&paragraph_style(
        "Quote",
        "Quote",
        &format!("<w:ind w:left=\"{QUOTE_INDENT_TWIPS}\"/>"),
        "<w:i/>",
    ));
    xml.push_str(&paragraph_style(
        "SourceCode",
        "Source Code",
        "<w:spacing w:after=\"0\"/>",
        "<w:rFonts w:ascii=\"Consolas\" w:hAnsi=\"Consolas\"/><w:sz w:val=\"20\"/>",
    ));
    xml.push_str(&paragraph_style(
        "Bibliography",
        "Bibliography",
        "<w:ind w:left=\"720\" w:hanging=\"720\"/>",
        "",
    ));
    xml.push_str(
        "<w:style w:type=\"character\" w:styleId=\"VerbatimChar\"><w:name w:val=\"Verbatim Char\"/>\
         <w:rPr><w:rFonts w:ascii=\"Consolas\" w:hAnsi=\"Consolas\"/><w:sz w:val=\"20\"/></w:rPr></w:style>\
         <w:style w:type=\"character\" w:styleId=\"Hyperlink\"><w:name w:val=\"Hyperlink\"/>\
         <w:rPr><w:color w:val=\"0563C1\"/><w:u w:val=\"single\"/></w:rPr></w:style>\
         <w:style w:type=\"character\" w:styleId=\"UnresolvedCitation\"><w:name w:val=\"Unresolved Citation\"/>\
         <w:rPr><w:color w:val=\"C00000\"/></w:rPr></w:style>\
         <w:style w:type=\"table\" w:styleId=\"Table\"><w:name w:val=\"Table\"/><w:tblPr><w:tblBorders>\
         <w:top w:val=\"single\" w:sz=\"4\" w:space=\"0\" w:color=\"auto\"/>\
         <w:left w:val=\"single\" w:sz=\"4\" w:space=\"0\" w:color=\"auto\"/>\
         <w:bottom w:val=\"single\" w:sz=\"4\" w:space=\"0\" w:color=\"auto\"/>\
         <w:right w:val=\"single\" w:sz=\"4\" w:space=\"0\" w:color=\"auto\"/>\
         <w:insideH w:val=\"single\" w:sz=\"4\" w:space=\"0\" w:color=\"auto\"/>\
         <w:insideV w:val=\"single\" w:sz=\"4\" w:space=\"0\" w:color=\"auto\"/>\
         </w:tblBorders></w:tblPr></w:style>",
    );
    xml.push_str("</w:styles>");
    xml
}

/// Two abstract definitions (bullets and decimals) and their instances.
pub fn numbering() -> String {
    const BULLETS: [&str; 3] = ["\u{2022}", "\u{25E6}", "\u{25AA}"];
    let mut xml = String::from(XML_DECLARATION);
    xml.push_str(&format!("<w:numbering xmlns:w=\"{W_NS}\">"));

    xml.push_str("<w:abstractNum w:abstractNumId=\"0\"><w:multiLevelType w:val=\"hybridMultilevel\"/>");
    for level in 0..=MAX_LIST_LEVEL {
        xml.push_str(&list_level(
            level,
            "bullet",
            BULLETS[level % BULLETS.len()],
        ));
    }
    xml.push_str("</w:abstractNum>");

    xml.push_str("<w:abstractNum w:abstractNumId=\"1\"><w:multiLevelType w:val=\"hybridMultilevel\"/>");
    for level in 0..=MAX_LIST_LEVEL {
        xml.push_str(&list_level(level, "decimal", &format!("%{}.", level + 1)));
    }
    xml.push_str("</w:abstractNum>");

    xml.push_str(&format!(
        "<w:num w:numId=\"{BULLET_NUM_ID}\"><w:abstractNumId w:val=\"0\"/></w:num>\
         <w:num w:numId=\"{ORDERED_NUM_ID}\"><w:abstractNumId w:val=\"1\"/></w:num>"
    ));
    xml.push_str("</w:numbering>");
    xml
}

fn list_level(level: usize, format: &str, text: &str) -> String {
    let indent = LIST_INDENT_TWIPS * (level + 2);
    format!(
        "<w:lvl w:ilvl=\"{level}\"><w:start w:val=\"1\"/><w:numFmt w:val=\"{format}\"/>\
         <w:lvlText w:val=\"{}\"/><w:lvlJc w:val=\"left\"/>\
         <w:pPr><w:ind w:left=\"{indent}\" w:hanging=\"{LIST_INDENT_TWIPS}\"/></w:pPr></w:lvl>",
        escape_attr(text)
    )
}

/// `word/comments.xml` for the comments in ID order.
///
/// A comment without author is written with an empty `w:author`, which the extractor reads back
/// as no author.
pub fn comments(comments: &[(usize, Comment)]) -> String {
    let mut xml = String::from(XML_DECLARATION);
    xml.push_str(&format!("<w:comments xmlns:w=\"{W_NS}\">"));
    for (id, comment) in comments {
        let author = comment.author.as_deref().unwrap_or("");
        xml.push_str(&format!(
            "<w:comment w:id=\"{id}\" w:author=\"{}\"",
            escape_attr(author)
        ));
        if let Some(timestamp) = &comment.timestamp {
            xml.push_str(&format!(" w:date=\"{}\"", escape_attr(timestamp)));
        }
        let initials: String = author
            .split_whitespace()
            .filter_map(|word| word.chars().next())
            .collect();
        if !initials.is_empty() {
            xml.push_str(&format!(" w:initials=\"{}\"", escape_attr(&initials)));
        }
        xml.push('>');
        xml.push_str("<w:p><w:pPr><w:pStyle w:val=\"CommentText\"/></w:pPr>");
        xml.push_str("<w:r><w:annotationRef/></w:r>");
        if !comment.body.is_empty() {
            xml.push_str(&format!(
                "<w:r><w:t xml:space=\"preserve\">{}</w:t></w:r>",
                escape_text(&comment.body)
            ));
        }
        xml.push_str("</w:p></w:comment>");
    }
    xml.push_str("</w:comments>");
    xml
}
