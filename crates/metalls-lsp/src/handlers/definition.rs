//! Go-to-definition handler.
//!
//! The cursor on a quoted `#include` path opens that file. Anything else is
//! resolved by name through the workspace resolver.

use lsp_types::{GotoDefinitionParams, GotoDefinitionResponse, Location, Position, Range};
use metalls_syntax::include_at;

use super::document_links::include_target;
use super::utils::{path_to_uri, word_at};
use crate::vfs::Document;
use crate::workspace::Definition;

/// Handle a go-to-definition request.
pub fn handle_goto_definition(
    params: &GotoDefinitionParams,
    doc: &Document,
    resolve: impl FnOnce(&str) -> Option<Definition>,
) -> Option<GotoDefinitionResponse> {
    let offset = doc.offset_at(params.text_document_position_params.position);

    if let Some(include) = include_at(doc.text(), offset) {
        tracing::debug!("Go-to-definition on include: {:?}", include.path);
        let target = include_target(doc.uri(), &include.path)?;
        let start = Position::new(0, 0);
        return Some(GotoDefinitionResponse::Scalar(Location::new(
            path_to_uri(&target)?,
            Range::new(start, start),
        )));
    }

    let (word, _) = word_at(doc.text(), offset)?;
    tracing::debug!("Go-to-definition for word: {:?}", word);

    let definition = resolve(&word)?;
    Some(GotoDefinitionResponse::Scalar(definition.location))
}
