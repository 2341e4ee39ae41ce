use docmark_babel::formats::markdown::tokenize;
use docmark_babel::ir::nodes::{Block, Citation, CiteKey, Comment, Formatting, Run, TextRun};
use docmark_babel::ConvertOptions;

fn blocks(source: &str) -> Vec<Block> {
    tokenize(source, &ConvertOptions::default())
}

#[test]
fn manuscript_paragraph() {
    let source = "Prior work {~~claims~>suggests~~} this [@lee2018, ch. 2]. {>>Ann: check<<}\n";
    assert_eq!(
        blocks(source),
        vec![Block::Paragraph(vec![
            Run::text("Prior work "),
            Run::Substitute {
                old: vec![Run::text("claims")],
                new: vec![Run::text("suggests")],
            },
            Run::text(" this "),
            Run::Citation(Citation {
                keys: vec![CiteKey::with_locator("lee2018", "ch. 2")],
            }),
            Run::text(". "),
            Run::Comment(Comment {
                author: Some("Ann".to_string()),
                timestamp: None,
                body: "check".to_string(),
            }),
        ])]
    );
}

#[test]
fn unterminated_syntax_is_literal() {
    assert_eq!(
        blocks("Open {++ never closed and [@ half\n"),
        vec![Block::Paragraph(vec![Run::text(
            "Open {++ never closed and [@ half"
        )])]
    );
}

#[test]
fn grid_table_with_annotations() {
    let source = "+-----------+------+\n| {++new++} | old  |\n+-----------+------+\n";
    let tokens = blocks(source);
    let [Block::Table(table)] = tokens.as_slice() else {
        panic!("expected one table");
    };
    assert!(!table.header);
    assert_eq!(table.rows.len(), 1);
    assert_eq!(
        table.rows[0].cells[0].runs,
        vec![Run::Insert(vec![Run::text("new")])]
    );
    assert_eq!(table.rows[0].cells[1].runs, vec![Run::text("old")]);
}

#[test]
fn highlight_color_option_applies_to_plain_highlights() {
    let options = ConvertOptions {
        highlight_color: "cyan".to_string(),
        ..Default::default()
    };
    let cyan = Formatting {
        highlight: Some("cyan".to_string()),
        ..Default::default()
    };
    assert_eq!(
        tokenize("==mark==\n", &options),
        vec![Block::Paragraph(vec![Run::Text(TextRun::styled("mark", cyan))])]
    );
}
