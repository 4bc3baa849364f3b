//! Find references handler.

use lsp_types::{Location, ReferenceParams};

use super::utils::word_at;
use crate::vfs::Document;

/// Handle a find references request.
///
/// `search` runs the workspace-wide query for a name, honoring
/// `includeDeclaration`.
pub fn handle_references(
    params: &ReferenceParams,
    doc: &Document,
    search: impl FnOnce(&str, bool) -> Vec<Location>,
) -> Option<Vec<Location>> {
    let offset = doc.offset_at(params.text_document_position.position);
    let (word, _) = word_at(doc.text(), offset)?;

    tracing::debug!("Find references for: {:?}", word);

    Some(search(&word, params.context.include_declaration))
}

#[cfg(test)]
mod tests {
    use super::*;
    use lsp_types::{Position, ReferenceContext, TextDocumentIdentifier, TextDocumentPositionParams};

    #[test]
    fn test_passes_word_and_flag() {
        let uri: lsp_types::Uri = "file:///a.metal".parse().unwrap();
        let doc = Document::new(uri.clone(), "float value = 1;".to_string(), 1);
        let params = ReferenceParams {
            text_document_position: TextDocumentPositionParams {
                text_document: TextDocumentIdentifier { uri },
                position: Position::new(0, 8),
            },
            work_done_progress_params: Default::default(),
            partial_result_params: Default::default(),
            context: ReferenceContext {
                include_declaration: false,
            },
        };

        let result = handle_references(&params, &doc, |name, include| {
            assert_eq!(name, "value");
            assert!(!include);
            Vec::new()
        });
        assert_eq!(result, Some(Vec::new()));
    }
}
