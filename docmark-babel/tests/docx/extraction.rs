use crate::common::{package, range_end, range_start, round_trip, text_run, to_markdown};
use docmark_babel::formats::docx::package::{Package, COMMENTS, DOCUMENT, NUMBERING, STYLES};
use docmark_babel::{docx_to_markdown, Environment, FormatError, Warning};

fn extract(bytes: &[u8]) -> Result<docmark_babel::Extracted, FormatError> {
    docx_to_markdown(bytes, &mut Environment::default())
}

#[test]
fn invalid_archive_is_an_error() {
    let err = extract(b"definitely not a zip").unwrap_err();
    assert!(matches!(err, FormatError::Archive(_)));
}

#[test]
fn missing_main_document_is_an_error() {
    let mut package = Package::new();
    package.insert(STYLES, "<w:styles/>");
    let err = extract(&package.write().unwrap()).unwrap_err();
    assert_eq!(err, FormatError::MissingPart(DOCUMENT.to_string()));
}

#[test]
fn missing_comments_part_warns_only_when_referenced() {
    let plain = package(&format!("<w:p>{}</w:p>", text_run("quiet")), &[]);
    assert!(extract(&plain).unwrap().warnings.is_empty());

    let body = format!(
        "<w:p>{}{}{}</w:p>",
        range_start("1"),
        text_run("loud"),
        range_end("1")
    );
    let extracted = extract(&package(&body, &[])).unwrap();
    assert!(extracted
        .warnings
        .iter()
        .any(|w| matches!(w, Warning::PartUnavailable { part, .. } if part == COMMENTS)));
    assert!(extracted.markdown.contains("loud"));
}

#[test]
fn damaged_numbering_degrades_to_paragraphs() {
    let body = format!(
        "<w:p><w:pPr><w:numPr><w:ilvl w:val=\"0\"/><w:numId w:val=\"1\"/></w:numPr></w:pPr>{}</w:p>",
        text_run("item")
    );
    let mut package = Package::read(&package(&body, &[])).unwrap();
    package.insert(NUMBERING, "<w:numbering");
    let extracted = extract(&package.write().unwrap()).unwrap();

    assert_eq!(extracted.markdown, "item\n");
    assert!(extracted
        .warnings
        .iter()
        .any(|w| matches!(w, Warning::PartUnavailable { part, .. } if part == NUMBERING)));
}

#[test]
fn breaks_and_hyphens() {
    let body = "<w:p><w:r><w:t>one</w:t><w:br/><w:t>two</w:t></w:r>\
                <w:r><w:br w:type=\"page\"/></w:r>\
                <w:r><w:t>co</w:t><w:noBreakHyphen/><w:t>op</w:t></w:r></w:p>";
    assert_eq!(to_markdown(&package(body, &[])), "one\\\ntwoco-op\n");
}

#[test]
fn internal_anchor_becomes_fragment_link() {
    let body = "<w:p><w:hyperlink w:anchor=\"results\"><w:r><w:t>see results</w:t></w:r></w:hyperlink></w:p>";
    assert_eq!(to_markdown(&package(body, &[])), "[see results](#results)\n");
}

#[test]
fn tracked_changes_inside_comment_force_identifiers() {
    let body = format!(
        "<w:p>{}<w:ins w:id=\"1\" w:author=\"x\">{}</w:ins>{}</w:p>",
        range_start("0"),
        text_run("added"),
        range_end("0")
    );
    let markup = to_markdown(&package(&body, &[("0", "about the addition")]));
    assert_eq!(markup, "{#1}{++added++}{/1}{#1>>about the addition<<}\n");
}

#[test]
fn headerless_table_annotations_reach_a_fixed_point() {
    let cell = |content: String| format!("<w:tc><w:p>{content}</w:p></w:tc>");
    let body = format!(
        "<w:tbl><w:tr>{}{}</w:tr><w:tr>{}{}</w:tr></w:tbl>",
        cell(format!(
            "{}{}{}<w:ins w:id=\"5\" w:author=\"x\">{}</w:ins>",
            range_start("0"),
            text_run("checked"),
            range_end("0"),
            text_run(" since")
        )),
        cell(text_run("b")),
        cell(text_run("c")),
        cell(text_run("d")),
    );
    let markup = to_markdown(&package(&body, &[("0", "cell note")]));
    assert!(markup.starts_with('+'), "expected a grid table: {markup}");
    assert!(markup.contains("{==checked==}{>>cell note<<}{++ since++}"), "{markup}");
    assert_eq!(round_trip(&markup), markup);
}

#[test]
fn comment_metadata_renders_author_and_date() {
    let comments = format!(
        "<w:comments xmlns:w=\"{}\"><w:comment w:id=\"2\" w:author=\"Ann Lee\" \
         w:date=\"2024-03-01T10:00:00Z\"><w:p><w:r><w:t>tighten this</w:t></w:r></w:p>\
         <w:p><w:r><w:t>and this</w:t></w:r></w:p></w:comment></w:comments>",
        crate::common::W_NS
    );
    let body = format!(
        "<w:p>{}{}{}</w:p>",
        range_start("2"),
        text_run("wordy"),
        range_end("2")
    );
    let mut package = Package::read(&package(&body, &[])).unwrap();
    package.insert(COMMENTS, comments);

    assert_eq!(
        to_markdown(&package.write().unwrap()),
        "{==wordy==}{>>Ann Lee (2024-03-01T10:00:00Z): tighten this and this<<}\n"
    );
}
