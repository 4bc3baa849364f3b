//! Hover handler.
//!
//! Lookup order: a function signature or struct outline from this document's
//! index, then the builtin tables, then the declaration line of a workspace
//! definition.

use lsp_types::{Hover, HoverContents, HoverParams, MarkupContent, MarkupKind};
use metalls_syntax::{builtins, DocumentIndex, SymbolKind};

use super::utils::word_at;
use crate::db::Analysis;
use crate::vfs::Document;
use crate::workspace::Definition;

/// Handle a hover request.
///
/// `resolve` is only consulted when nothing local or builtin matches.
pub fn handle_hover(
    params: &HoverParams,
    doc: &Document,
    analysis: &Analysis,
    resolve: impl FnOnce(&str) -> Option<Definition>,
) -> Option<Hover> {
    let offset = doc.offset_at(params.text_document_position_params.position);
    let (word, span) = word_at(doc.text(), offset)?;

    tracing::debug!("Hover for word: {:?}", word);

    let value = local_info(&word, &analysis.index)
        .or_else(|| builtins::documentation(&word))
        .or_else(|| resolve(&word).map(|def| workspace_info(&def)))?;

    Some(Hover {
        contents: HoverContents::Markup(MarkupContent {
            kind: MarkupKind::Markdown,
            value,
        }),
        range: Some(doc.line_index().range(span)),
    })
}

fn local_info(word: &str, index: &DocumentIndex) -> Option<String> {
    if let Some(signature) = index.function_signatures.get(word) {
        return Some(format!("```metal\n{}\n```", signature.label));
    }
    let node = index.symbol(word).filter(|n| n.kind == SymbolKind::Struct)?;

    let mut info = format!("```metal\nstruct {} {{\n", node.name);
    for field in &node.children {
        let decl = field.detail.as_deref().unwrap_or(&field.name);
        info.push_str(&format!("    {};\n", decl.trim_end_matches(';')));
    }
    info.push_str("};\n```");
    Some(info)
}

fn workspace_info(def: &Definition) -> String {
    let file = def
        .location
        .uri
        .as_str()
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .to_string();
    format!(
        "```metal\n{}\n```\n\nDefined in `{}` (line {})",
        def.line,
        file,
        def.location.range.start.line + 1
    )
}
