//! Property-based tests for the overlap resolver, the markup escaper and annotation layout.

use docmark_babel::common::overlap::{resolve, Encoding};
use docmark_babel::formats::markdown::{serialize, tokenize};
use docmark_babel::ir::items::{CommentSet, ContentItem, ParagraphMarker, TextItem};
use docmark_babel::ir::nodes::{
    for_each_run_list, walk_runs, Block, Comment, Formatting, Run, Table, TableCell, TableRow,
    TextRun,
};
use docmark_babel::ConvertOptions;
use proptest::prelude::*;
use std::collections::{BTreeMap, BTreeSet};

/// Paragraphs of spans, each span carrying a set of comment numbers.
fn document_strategy() -> impl Strategy<Value = Vec<Vec<BTreeSet<u8>>>> {
    prop::collection::vec(
        prop::collection::vec(prop::collection::btree_set(0u8..5, 0..3), 1..6),
        1..4,
    )
}

fn items(paragraphs: &[Vec<BTreeSet<u8>>]) -> Vec<ContentItem> {
    let mut items = Vec::new();
    for (p, spans) in paragraphs.iter().enumerate() {
        items.push(ContentItem::Paragraph(ParagraphMarker::default()));
        for (s, ids) in spans.iter().enumerate() {
            let comments: CommentSet = ids.iter().map(|id| format!("c{id}")).collect();
            items.push(ContentItem::Text(TextItem {
                text: format!("w{p}x{s} "),
                comments,
                format: Formatting::default(),
                link: None,
                revision: None,
                literal_citation: false,
            }));
        }
    }
    items
}

fn metadata() -> BTreeMap<String, Comment> {
    (0u8..5)
        .map(|id| {
            (
                format!("c{id}"),
                Comment {
                    author: None,
                    timestamp: None,
                    body: format!("note number {id}"),
                },
            )
        })
        .collect()
}

fn note(body: &str) -> Comment {
    Comment {
        author: None,
        timestamp: None,
        body: body.to_string(),
    }
}

fn highlighted(text: &str) -> Run {
    Run::Text(TextRun::styled(
        text,
        Formatting {
            highlight: Some("yellow".to_string()),
            ..Default::default()
        },
    ))
}

/// Annotation payloads whose text may start or end with spaces.
fn payload_strategy() -> impl Strategy<Value = Run> {
    ("[a-z]{1,8}( [a-z]{1,8})?", " {0,2}", " {0,2}", 0..4u8).prop_map(
        |(word, lead, trail, kind)| {
            let runs = vec![Run::text(format!("{lead}{word}{trail}"))];
            match kind {
                0 => Run::Insert(runs),
                1 => Run::Delete(runs),
                2 => Run::Substitute {
                    old: runs,
                    new: vec![Run::text(word)],
                },
                _ => Run::Highlight {
                    runs,
                    comment: Some(note("see this")),
                },
            }
        },
    )
}

/// Cell content of a table without a header row.
fn cell_strategy() -> impl Strategy<Value = TableCell> {
    ("[a-z]{1,6}", 0..5u8).prop_map(|(word, kind)| {
        let runs = match kind {
            0 => vec![Run::text(word)],
            1 => vec![Run::Insert(vec![Run::text(word)])],
            2 => vec![Run::text("was "), Run::Delete(vec![Run::text(word)])],
            3 => vec![Run::Highlight {
                runs: vec![Run::text(word)],
                comment: Some(note("cell remark")),
            }],
            _ => vec![highlighted(&word), Run::text(" end")],
        };
        TableCell { runs }
    })
}

fn headerless_table_strategy() -> impl Strategy<Value = Table> {
    (1..4usize, 1..4usize)
        .prop_flat_map(|(rows, columns)| {
            prop::collection::vec(prop::collection::vec(cell_strategy(), columns), rows)
        })
        .prop_map(|rows| Table {
            rows: rows.into_iter().map(|cells| TableRow { cells }).collect(),
            header: false,
        })
}

#[derive(Default)]
struct Markers {
    starts: BTreeMap<String, usize>,
    ends: BTreeMap<String, usize>,
    bodies: BTreeMap<String, usize>,
}

fn markers(blocks: &[Block]) -> Markers {
    let mut found = Markers::default();
    for_each_run_list(blocks, |runs| {
        walk_runs(runs, &mut |run| match run {
            Run::CommentStart(id) => *found.starts.entry(id.clone()).or_default() += 1,
            Run::CommentEnd(id) => *found.ends.entry(id.clone()).or_default() += 1,
            Run::CommentBody { id, .. } => *found.bodies.entry(id.clone()).or_default() += 1,
            _ => {}
        })
    });
    found
}

proptest! {
    #[test]
    fn identifier_markers_are_balanced_and_dense(paragraphs in document_strategy()) {
        let used: BTreeSet<u8> = paragraphs.iter().flatten().flatten().copied().collect();
        let options = ConvertOptions {
            force_comment_ids: true,
            ..Default::default()
        };
        let resolved = resolve(items(&paragraphs), &metadata(), &options);
        prop_assert_eq!(resolved.encoding, Encoding::Identified);
        prop_assert!(resolved.warnings.is_empty());

        let found = markers(&resolved.blocks);
        let expected: BTreeSet<String> = (1..=used.len()).map(|n| n.to_string()).collect();
        prop_assert_eq!(found.starts.keys().cloned().collect::<BTreeSet<_>>(), expected.clone());
        prop_assert_eq!(found.ends.keys().cloned().collect::<BTreeSet<_>>(), expected.clone());
        prop_assert_eq!(found.bodies.keys().cloned().collect::<BTreeSet<_>>(), expected);
        prop_assert!(found.starts.values().chain(found.ends.values()).chain(found.bodies.values()).all(|&n| n == 1));
    }

    #[test]
    fn bracket_form_only_without_overlap(paragraphs in document_strategy()) {
        let resolved = resolve(items(&paragraphs), &metadata(), &ConvertOptions::default());
        let overlapping = paragraphs.iter().flatten().any(|ids| ids.len() > 1);
        if overlapping {
            prop_assert_eq!(resolved.encoding, Encoding::Identified);
        }
        if resolved.encoding == Encoding::Bracketed {
            let found = markers(&resolved.blocks);
            prop_assert!(found.starts.is_empty() && found.bodies.is_empty());
        }
    }

    #[test]
    fn escaped_text_reads_back_verbatim(
        text in "[a-z0-9*_\\[\\]{}=~$#>+.-]([a-z0-9 *_\\[\\]{}=~$#>+.-]{0,28}[a-z0-9*_\\[\\]{}=~$#>+.-])?"
    ) {
        let options = ConvertOptions::default();
        let blocks = vec![Block::Paragraph(vec![Run::text(text.clone())])];
        let markup = serialize(&blocks, &options);
        prop_assert_eq!(tokenize(&markup, &options), blocks, "markup: {}", markup);
    }

    #[test]
    fn payload_edge_spaces_read_back(payload in payload_strategy()) {
        let options = ConvertOptions::default();
        let blocks = vec![Block::Paragraph(vec![Run::text("x"), payload, Run::text(" y")])];
        let markup = serialize(&blocks, &options);
        prop_assert_eq!(tokenize(&markup, &options), blocks, "markup: {}", markup);
    }

    #[test]
    fn highlights_opening_a_line_stay_highlights(
        first in "[a-z]{1,8}",
        second in "[a-z]{1,8}",
        tail in "( [a-z]{1,6}){1,3}",
    ) {
        let options = ConvertOptions::default();
        let blocks = vec![
            Block::Paragraph(vec![highlighted(&first), Run::text(tail.clone())]),
            Block::Paragraph(vec![
                Run::text("lead"),
                Run::SoftBreak,
                highlighted(&second),
                Run::text(tail),
            ]),
        ];
        let markup = serialize(&blocks, &options);
        prop_assert_eq!(tokenize(&markup, &options), blocks, "markup: {}", markup);
    }

    #[test]
    fn headerless_table_cells_keep_annotations(table in headerless_table_strategy()) {
        let options = ConvertOptions::default();
        let blocks = vec![Block::Table(table)];
        let markup = serialize(&blocks, &options);
        prop_assert_eq!(tokenize(&markup, &options), blocks, "markup: {}", markup);
    }
}
