use crate::common::{part, round_trip, sample_bibliography, to_docx};
use docmark_babel::collaborators::{MathConverter, MathError};
use docmark_babel::formats::docx::package::DOCUMENT;
use docmark_babel::{docx_to_markdown, markdown_to_docx, Environment, Warning};

struct Rejecting;

impl MathConverter for Rejecting {
    fn latex_to_omml(&self, _latex: &str) -> Result<String, MathError> {
        Err(MathError("unsupported".to_string()))
    }

    fn omml_to_latex(&self, _omml: &str) -> Result<String, MathError> {
        Err(MathError("unsupported".to_string()))
    }
}

fn assert_round_trip(markup: &str) {
    assert_eq!(round_trip(markup), markup);
}

#[test]
fn headings_and_inline_formatting() {
    assert_round_trip("# Methods\n\nWe used **bold**, *italic* and `code` here.\n\n## Details\n\nPlain.\n");
}

#[test]
fn nested_and_ordered_lists() {
    assert_round_trip("- alpha\n- beta\n  - gamma\n\nBetween lists.\n\n1. first\n2. second\n");
}

#[test]
fn quotes_code_and_rules() {
    assert_round_trip("> A quoted remark.\n\n```\nlet x = 1;\nlet y = 2;\n```\n\n---\n\nAfter.\n");
}

#[test]
fn consecutive_quote_paragraphs() {
    assert_round_trip("> First remark.\n>\n> Second remark.\n>\n> > Nested reply.\n\nAfter.\n");
}

#[test]
fn highlight_opening_a_paragraph() {
    assert_round_trip("==key== point.\n\n==flagged=={green} as well.\n");
}

#[test]
fn payload_with_edge_spaces() {
    assert_round_trip("x{++ added++} y and z{-- gone --}.\n");
}

#[test]
fn heading_ending_in_a_hash() {
    assert_round_trip("# Use C \\#\n\nBody.\n");
}

#[test]
fn parenthesized_handles_stay_prose() {
    assert_round_trip("Write to me (@jdoe) soon.\n");
}

#[test]
fn tracked_changes() {
    assert_round_trip("The {++new ++}text {--was --}is {~~bad~>good~~}.\n");
}

#[test]
fn bracketed_comments() {
    assert_round_trip(
        "See {==this claim==}{>>Reviewer: needs a source<<} and {>>general remark<<} here.\n",
    );
}

#[test]
fn math_links_and_highlights() {
    assert_round_trip(
        "Energy $E = mc^2$ holds, see [the site](https://example.com/a).\n\nMark ==this== and ==that=={green}.\n",
    );
}

#[test]
fn pipe_table() {
    assert_round_trip("| Name | Value |\n| --- | --- |\n| a | 1 |\n| b | 2 |\n");
}

#[test]
fn resolved_and_unresolved_citations() {
    let bibliography = sample_bibliography();
    let markup = "As shown [@smith2020; @nobody], and later [@lee2018, p. 4].\n";

    let mut env = Environment::default().with_bibliography(&bibliography);
    let generated = markdown_to_docx(markup, &mut env).unwrap();
    let extracted = docx_to_markdown(&generated.bytes, &mut Environment::default()).unwrap();

    assert_eq!(extracted.markdown, markup);
    assert!(extracted.warnings.is_empty());
}

#[test]
fn display_math() {
    assert_round_trip("Display:\n\n$$\\sum_i x_i$$\n");
}

#[test]
fn failed_equation_becomes_placeholder() {
    let generated =
        markdown_to_docx("Value $\\frac{a}{b}$ here.\n", &mut Environment::default().with_math(&Rejecting))
            .unwrap();
    assert_eq!(
        generated.warnings,
        vec![Warning::MathConversion {
            source: "\\frac{a}{b}".to_string(),
            reason: "unsupported".to_string(),
        }]
    );
    assert!(part(&generated.bytes, DOCUMENT).contains("[equation]"));
}

#[test]
fn one_trip_reaches_a_fixed_point() {
    let loose = "Title\n=====\n\n* one\n\n* two\n\n3) three\n\nText with trailing  \nbreak and <u>under</u> and <sub>low</sub>.\n\n+-----+-----+\n| a   | b   |\n+-----+-----+\n";
    let once = round_trip(loose);
    let twice = round_trip(&once);
    assert_eq!(once, twice);
    assert!(once.starts_with("# Title\n"));
}

#[test]
fn empty_document() {
    assert_eq!(round_trip(""), "");
    assert!(!to_docx("").is_empty());
}
