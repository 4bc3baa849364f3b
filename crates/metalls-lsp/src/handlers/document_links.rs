//! Document links handler: quoted `#include` paths become clickable.

use std::path::PathBuf;

use lsp_types::{DocumentLink, DocumentLinkParams, Uri};
use metalls_syntax::find_includes;

use super::utils::{path_to_uri, uri_to_path};
use crate::vfs::Document;

/// Handle a document links request.
///
/// Only includes that resolve to an existing file are reported.
pub fn handle_document_links(
    _params: &DocumentLinkParams,
    doc: &Document,
) -> Option<Vec<DocumentLink>> {
    let links: Vec<DocumentLink> = find_includes(doc.text())
        .into_iter()
        .filter_map(|include| {
            let target = include_target(doc.uri(), &include.path)?;
            Some(DocumentLink {
                range: doc.line_index().range(include.path_span),
                target: Some(path_to_uri(&target)?),
                tooltip: Some(target.display().to_string()),
                data: None,
            })
        })
        .collect();

    if links.is_empty() {
        None
    } else {
        Some(links)
    }
}

/// Resolve an include path against the including document's directory.
///
/// Returns `None` unless the target exists on disk.
pub fn include_target(document: &Uri, include_path: &str) -> Option<PathBuf> {
    let dir = uri_to_path(document)?.parent()?.to_path_buf();
    let target = dir.join(include_path);
    target.is_file().then_some(target)
}
