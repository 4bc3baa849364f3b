//! Document formatting handler.
//!
//! Runs the configured formatter; if it is unavailable the document is
//! re-indented by brace depth instead. The result replaces the whole
//! document in a single edit.

use lsp_types::{DocumentFormattingParams, Range, TextEdit};

use crate::toolchain::{basic_indent, Formatter};
use crate::vfs::Document;

/// Handle a document formatting request.
pub fn handle_formatting(
    params: &DocumentFormattingParams,
    doc: &Document,
    formatter: &dyn Formatter,
) -> Option<Vec<TextEdit>> {
    let tab_size = params.options.tab_size;
    let insert_spaces = params.options.insert_spaces;

    let formatted = formatter
        .format(doc.text(), tab_size, insert_spaces)
        .unwrap_or_else(|| basic_indent(doc.text(), tab_size, insert_spaces));

    if formatted == doc.text() {
        return Some(Vec::new());
    }

    let end = doc.position_at(doc.text().len());
    Some(vec![TextEdit {
        range: Range::new(lsp_types::Position::new(0, 0), end),
        new_text: formatted,
    }])
}

#[cfg(test)]
mod tests {
    use super::*;
    use lsp_types::{FormattingOptions, Position, TextDocumentIdentifier};

    struct Unavailable;

    impl Formatter for Unavailable {
        fn format(&self, _: &str, _: u32, _: bool) -> Option<String> {
            None
        }
    }

    struct Upper;

    impl Formatter for Upper {
        fn format(&self, source: &str, _: u32, _: bool) -> Option<String> {
            Some(source.to_uppercase())
        }
    }

    fn params(tab_size: u32) -> DocumentFormattingParams {
        DocumentFormattingParams {
            text_document: TextDocumentIdentifier {
                uri: "file:///a.metal".parse().unwrap(),
            },
            options: FormattingOptions {
                tab_size,
                insert_spaces: true,
                ..Default::default()
            },
            work_done_progress_params: Default::default(),
        }
    }

    fn doc(text: &str) -> Document {
        Document::new("file:///a.metal".parse().unwrap(), text.to_string(), 1)
    }

    #[test]
    fn test_fallback_indent_whole_document_edit() {
        let d = doc("void f() {\nx();\n}\n");
        let edits = handle_formatting(&params(2), &d, &Unavailable).unwrap();
        assert_eq!(edits.len(), 1);
        assert_eq!(edits[0].new_text, "void f() {\n  x();\n}\n");
        assert_eq!(edits[0].range.start, Position::new(0, 0));
        assert_eq!(edits[0].range.end, Position::new(3, 0));
    }

    #[test]
    fn test_formatter_output_used_and_unchanged_is_empty() {
        let edits = handle_formatting(&params(4), &doc("abc"), &Upper).unwrap();
        assert_eq!(edits[0].new_text, "ABC");

        let edits = handle_formatting(&params(4), &doc("ABC"), &Upper).unwrap();
        assert!(edits.is_empty());
    }
}
