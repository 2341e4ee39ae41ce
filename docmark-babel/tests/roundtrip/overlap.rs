//! Comment scope across the two encodings.

use crate::common::{package, range_end, range_start, round_trip, text_run, to_docx, to_markdown, W_NS};
use docmark_babel::ConvertOptions;

#[test]
fn separate_comments_keep_bracket_form() {
    let body = format!(
        "<w:p>{}{}{}{}{}{}{}</w:p>",
        range_start("4"),
        text_run("first"),
        range_end("4"),
        text_run(" and "),
        range_start("8"),
        text_run("second"),
        range_end("8"),
    );
    let bytes = package(&body, &[("4", "check this"), ("8", "and this too")]);
    assert_eq!(
        to_markdown(&bytes),
        "{==first==}{>>check this<<} and {==second==}{>>and this too<<}\n"
    );
}

#[test]
fn overlapping_comments_are_renumbered_densely() {
    let body = format!(
        "<w:p>{}{}{}{}{}{}{}</w:p>",
        range_start("7"),
        text_run("a "),
        range_start("3"),
        text_run("b"),
        range_end("7"),
        text_run(" c"),
        range_end("3"),
    );
    let bytes = package(&body, &[("7", "outer note"), ("3", "inner note")]);
    let markup = to_markdown(&bytes);

    assert!(markup.starts_with("{#1}a {#2}b{/1} c{/2}"), "{markup}");
    assert_eq!(markup.matches("{#1>>outer note<<}").count(), 1);
    assert_eq!(markup.matches("{#2>>inner note<<}").count(), 1);
    assert!(!markup.contains("{#7") && !markup.contains("{#3"));
}

#[test]
fn table_only_comments_join_the_dense_sequence() {
    let cell = format!(
        "<w:tc><w:p>{}{}{}</w:p></w:tc>",
        range_start("9"),
        text_run("cell"),
        range_end("9"),
    );
    let body = format!(
        "<w:p>{}{}{}{}{}</w:p><w:tbl><w:tr>{cell}</w:tr></w:tbl>",
        range_start("5"),
        range_start("6"),
        text_run("both"),
        range_end("6"),
        range_end("5"),
    );
    let bytes = package(&body, &[("5", "one note"), ("6", "two notes"), ("9", "table note")]);
    let markup = to_markdown(&bytes);

    assert!(markup.contains("{#3}cell{/3}{#3>>table note<<}"), "{markup}");
    assert!(!markup.contains("{#9"));
    assert!(!markup.contains("{#5") && !markup.contains("{#6"));

    // the identifier form survives a further trip unchanged
    assert_eq!(round_trip(&markup), markup);
}

#[test]
fn body_is_written_once_for_a_multi_paragraph_comment() {
    let body = format!(
        "<w:p>{}{}</w:p><w:p>{}{}</w:p><w:p>{}</w:p>",
        range_start("0"),
        text_run("first paragraph"),
        text_run("second paragraph"),
        range_end("0"),
        text_run("third paragraph"),
    );
    let bytes = package(&body, &[("0", "spans two paragraphs")]);
    let markup = to_markdown(&bytes);

    assert_eq!(
        markup,
        "{#1}first paragraph\n\nsecond paragraph{/1}{#1>>spans two paragraphs<<}\n\nthird paragraph\n"
    );
    assert_eq!(markup.matches(">>spans two paragraphs<<").count(), 1);
}

#[test]
fn identifier_markup_generates_one_range_per_comment() {
    let markup = "{#a}one {#b}two{/a} three{/b}{#a>>first note<<}{#b>>second note<<}\n";
    let bytes = to_docx(markup);
    let document = crate::common::part(&bytes, docmark_babel::formats::docx::package::DOCUMENT);
    let comments = crate::common::part(&bytes, docmark_babel::formats::docx::package::COMMENTS);

    assert_eq!(document.matches("<w:commentRangeStart ").count(), 2);
    assert_eq!(document.matches("<w:commentRangeEnd ").count(), 2);
    assert!(document.contains("<w:commentRangeStart w:id=\"0\"/>"));
    assert!(document.contains("<w:commentRangeStart w:id=\"1\"/>"));
    assert_eq!(comments.matches("<w:comment ").count(), 2);
    assert!(comments.contains(&format!("xmlns:w=\"{W_NS}\"")));

    // arbitrary identifiers come back as dense numbers
    assert_eq!(
        to_markdown(&bytes),
        "{#1}one {#2}two{/1} three{/2}{#1>>first note<<}{#2>>second note<<}\n"
    );
}

#[test]
fn forced_identifiers_apply_to_simple_comments() {
    let bytes = to_docx("A {==short==}{>>plain note<<} span.\n");
    let options = ConvertOptions {
        force_comment_ids: true,
        ..Default::default()
    };
    assert_eq!(
        crate::common::to_markdown_with(&bytes, options),
        "A {#1}short{/1} span.{#1>>plain note<<}\n"
    );
}
