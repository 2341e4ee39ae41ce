use crate::common::{part, sample_bibliography, to_docx, NumberingEngine};
use docmark_babel::formats::docx::package::{
    Package, COMMENTS, CONTENT_TYPES, DOCUMENT, DOCUMENT_RELS, NUMBERING, PACKAGE_RELS, STYLES,
};
use docmark_babel::{markdown_to_docx, Environment, Warning};

#[test]
fn package_contains_required_parts() {
    let bytes = to_docx("Just text.\n");
    let package = Package::read(&bytes).unwrap();
    for name in [CONTENT_TYPES, PACKAGE_RELS, DOCUMENT, DOCUMENT_RELS, STYLES] {
        assert!(package.contains(name), "missing {name}");
    }
    assert!(!package.contains(NUMBERING));
    assert!(!package.contains(COMMENTS));
}

#[test]
fn repeated_urls_share_one_relationship() {
    let bytes = to_docx(
        "[one](https://a.example) [two](https://b.example) [three](https://a.example)\n",
    );
    let rels = part(&bytes, DOCUMENT_RELS);
    assert_eq!(rels.matches("TargetMode=\"External\"").count(), 2);
    assert_eq!(rels.matches("Target=\"https://a.example\"").count(), 1);

    let document = part(&bytes, DOCUMENT);
    assert_eq!(document.matches("<w:hyperlink ").count(), 3);
}

#[test]
fn table_keeps_rows_columns_and_bold_header() {
    let bytes = to_docx("| A | B | C |\n| --- | --- | --- |\n| 1 | 2 | 3 |\n| 4 | 5 | 6 |\n");
    let document = part(&bytes, DOCUMENT);
    assert_eq!(document.matches("<w:tr>").count(), 3);
    assert_eq!(document.matches("<w:tc>").count(), 9);
    assert_eq!(document.matches("<w:tblHeader/>").count(), 1);
    assert_eq!(document.matches("<w:b/>").count(), 3);
}

#[test]
fn lists_bring_numbering_part() {
    let bytes = to_docx("- a\n  - b\n\n1. c\n");
    let document = part(&bytes, DOCUMENT);
    assert!(document.contains("<w:ilvl w:val=\"1\"/><w:numId w:val=\"1\"/>"));
    assert!(document.contains("<w:ilvl w:val=\"0\"/><w:numId w:val=\"2\"/>"));
    assert!(part(&bytes, NUMBERING).contains("w:numId=\"2\""));
}

#[test]
fn mixed_cluster_splits_into_field_and_literal() {
    let bibliography = sample_bibliography();
    let mut env = Environment::default().with_bibliography(&bibliography);
    let generated = markdown_to_docx("See [@smith2020; @ghost].\n", &mut env).unwrap();

    let document = part(&generated.bytes, DOCUMENT);
    assert_eq!(document.matches("ADDIN ZOTERO_ITEM CSL_CITATION").count(), 1);
    assert!(document.contains("(Smith 2020)"));
    assert!(document.contains(" (@ghost)"));
    assert!(document.contains("Field Notes"));
    assert_eq!(
        generated.warnings,
        vec![Warning::UnresolvedCitation {
            key: "ghost".to_string()
        }]
    );
}

#[test]
fn unresolved_keys_warn_once() {
    let generated = markdown_to_docx(
        "First [@ghost], again [@ghost].\n",
        &mut Environment::default(),
    )
    .unwrap();
    assert_eq!(generated.warnings.len(), 1);
    let document = part(&generated.bytes, DOCUMENT);
    assert_eq!(document.matches("(@ghost)").count(), 2);
    assert!(!document.contains("ZOTERO"));
}

#[test]
fn citation_engine_renders_clusters_and_bibliography() {
    let bibliography = sample_bibliography();
    let mut engine = NumberingEngine::default();
    let generated = {
        let mut env = Environment::default()
            .with_bibliography(&bibliography)
            .with_engine(&mut engine);
        markdown_to_docx("One [@lee2018], two [@smith2020; @lee2018].\n", &mut env).unwrap()
    };

    assert_eq!(engine.registered, vec!["lee2018", "smith2020"]);
    let document = part(&generated.bytes, DOCUMENT);
    assert!(document.contains(">[1]<"));
    assert!(document.contains(">[2, 1]<"));
    assert!(document.contains("1. lee2018"));
    assert!(generated.warnings.is_empty());
}

#[test]
fn failing_engine_falls_back_with_warning() {
    let bibliography = sample_bibliography();
    let mut engine = NumberingEngine {
        fail: true,
        ..Default::default()
    };
    let mut env = Environment::default()
        .with_bibliography(&bibliography)
        .with_engine(&mut engine);
    let generated = markdown_to_docx("See [@smith2020].\n", &mut env).unwrap();

    assert!(part(&generated.bytes, DOCUMENT).contains("(Smith 2020)"));
    assert!(generated
        .warnings
        .iter()
        .any(|w| matches!(w, Warning::CitationEngine { reason } if reason == "engine offline")));
}

#[test]
fn identifier_without_body_warns() {
    let generated =
        markdown_to_docx("{#x}orphan{/x} text.\n", &mut Environment::default()).unwrap();
    assert_eq!(
        generated.warnings,
        vec![Warning::MissingCommentBody {
            id: "x".to_string()
        }]
    );
    assert!(part(&generated.bytes, COMMENTS).contains("w:id=\"0\""));
}
