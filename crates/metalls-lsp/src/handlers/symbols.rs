//! Document symbols handler for the outline view.
//!
//! Top-level functions (including kernel, vertex and fragment entry points)
//! and structs, with struct fields as children.

use lsp_types::{DocumentSymbol, DocumentSymbolParams, DocumentSymbolResponse, SymbolKind};
use metalls_syntax::{SymbolKind as MetalKind, SymbolNode};

use super::utils::LineIndex;
use crate::db::Analysis;
use crate::vfs::Document;

/// Handle a document symbols request.
pub fn handle_document_symbols(
    _params: &DocumentSymbolParams,
    doc: &Document,
    analysis: &Analysis,
) -> Option<DocumentSymbolResponse> {
    let symbols: Vec<DocumentSymbol> = analysis
        .index
        .symbols
        .iter()
        .map(|node| node_to_symbol(node, doc.line_index()))
        .collect();

    if symbols.is_empty() {
        None
    } else {
        Some(DocumentSymbolResponse::Nested(symbols))
    }
}

/// LSP symbol kind for an indexed declaration.
pub const fn lsp_kind(kind: MetalKind) -> SymbolKind {
    match kind {
        MetalKind::Function | MetalKind::Kernel | MetalKind::Vertex | MetalKind::Fragment => {
            SymbolKind::FUNCTION
        }
        MetalKind::Struct => SymbolKind::STRUCT,
        MetalKind::Variable => SymbolKind::FIELD,
        MetalKind::Unknown => SymbolKind::VARIABLE,
    }
}

#[allow(deprecated)] // DocumentSymbol::deprecated is deprecated but required
fn node_to_symbol(node: &SymbolNode, line_index: &LineIndex) -> DocumentSymbol {
    let children: Vec<DocumentSymbol> = node
        .children
        .iter()
        .map(|child| node_to_symbol(child, line_index))
        .collect();

    DocumentSymbol {
        name: node.name.clone(),
        detail: node.detail.clone(),
        kind: lsp_kind(node.kind),
        tags: None,
        deprecated: None,
        range: line_index.range(node.range),
        selection_range: line_index.range(node.selection_range),
        children: if children.is_empty() {
            None
        } else {
            Some(children)
        },
    }
}
