//! Property-based tests for the document store's position arithmetic.
//!
//! Run with: cargo test -p metalls-lsp --test `property_tests`

use lsp_types::{Position, Range, TextDocumentContentChangeEvent};
use metalls_lsp::vfs::Document;
use proptest::prelude::*;

fn arb_text() -> impl Strategy<Value = String> {
    let piece = prop_oneof![
        Just("\n".to_string()),
        Just("\r\n".to_string()),
        Just("é".to_string()),
        Just("😀".to_string()),
        Just("中".to_string()),
        "[a-z ;{}()]{0,6}",
    ];
    prop::collection::vec(piece, 0..24).prop_map(|pieces| pieces.concat())
}

/// Every valid position in `text`: each UTF-16 column at a character
/// boundary of each line's content.
fn valid_positions(text: &str) -> Vec<Position> {
    let mut out = Vec::new();
    for (line, content) in text.split('\n').enumerate() {
        let content = content.strip_suffix('\r').unwrap_or(content);
        let mut col = 0u32;
        out.push(Position::new(line as u32, 0));
        for ch in content.chars() {
            col += ch.len_utf16() as u32;
            out.push(Position::new(line as u32, col));
        }
    }
    out
}

fn doc(text: &str) -> Document {
    Document::new("file:///p.metal".parse().unwrap(), text.to_string(), 1)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn prop_position_round_trip(text in arb_text()) {
        let doc = doc(&text);
        for position in valid_positions(&text) {
            let offset = doc.offset_at(position);
            prop_assert!(text.is_char_boundary(offset));
            prop_assert_eq!(doc.position_at(offset), position);
        }
    }

    #[test]
    fn prop_offset_never_out_of_bounds(text in arb_text(), line in 0u32..40, character in 0u32..40) {
        let doc = doc(&text);
        let offset = doc.offset_at(Position::new(line, character));
        prop_assert!(offset <= text.len());
        prop_assert!(text.is_char_boundary(offset));
    }

    #[test]
    fn prop_incremental_edit_matches_splice(
        text in arb_text(),
        a in any::<prop::sample::Index>(),
        b in any::<prop::sample::Index>(),
        insert in "[a-z\n]{0,5}",
    ) {
        let positions = valid_positions(&text);
        let (mut start, mut end) = (a.get(&positions).to_owned(), b.get(&positions).to_owned());
        if (end.line, end.character) < (start.line, start.character) {
            std::mem::swap(&mut start, &mut end);
        }

        let mut document = doc(&text);
        let (s, e) = (document.offset_at(start), document.offset_at(end));
        let expected = format!("{}{}{}", &text[..s], insert, &text[e..]);

        document.apply_changes(
            vec![TextDocumentContentChangeEvent {
                range: Some(Range::new(start, end)),
                range_length: None,
                text: insert.clone(),
            }],
            2,
        );
        prop_assert_eq!(document.text(), expected.as_str());
        prop_assert_eq!(document.version(), 2);
    }
}
