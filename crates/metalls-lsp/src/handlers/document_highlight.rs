//! Document highlight handler.
//!
//! Highlights every whole-word occurrence of the symbol under the cursor in
//! the current document. Declaration sites are marked as writes.

use std::collections::HashSet;

use lsp_types::{DocumentHighlight, DocumentHighlightKind, DocumentHighlightParams};
use metalls_syntax::SearchView;

use super::utils::word_at;
use crate::vfs::Document;

/// Handle a document highlight request.
pub fn handle_document_highlight(
    params: &DocumentHighlightParams,
    doc: &Document,
) -> Option<Vec<DocumentHighlight>> {
    let offset = doc.offset_at(params.text_document_position_params.position);
    let (word, _) = word_at(doc.text(), offset)?;

    let view = SearchView::new(doc.text());
    let declared: HashSet<usize> = view
        .declarations(&word)
        .iter()
        .map(|d| d.span.start)
        .collect();

    let highlights: Vec<DocumentHighlight> = view
        .references(&word)
        .into_iter()
        .map(|span| DocumentHighlight {
            range: doc.line_index().range(span),
            kind: Some(if declared.contains(&span.start) {
                DocumentHighlightKind::WRITE
            } else {
                DocumentHighlightKind::READ
            }),
        })
        .collect();

    if highlights.is_empty() {
        None
    } else {
        Some(highlights)
    }
}
