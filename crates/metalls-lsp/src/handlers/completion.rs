//! Completion handler for autocompletion.
//!
//! Provides context-aware completions for:
//! - Attributes inside an unclosed `[[`
//! - Struct fields after `.` or `->`
//! - Keywords, builtin types and functions, and local functions and structs
//!
//! Every list is filtered by the identifier prefix under the cursor.

use lsp_types::{
    CompletionItem, CompletionItemKind, CompletionParams, CompletionResponse, Documentation,
    MarkupContent, MarkupKind,
};
use metalls_syntax::signature::identifier_before;
use metalls_syntax::{builtins, DocumentIndex, SymbolKind, SymbolNode};

use super::type_definition::declared_type;
use super::utils::prefix_at;
use crate::db::Analysis;
use crate::vfs::Document;

/// Completion context detected from the cursor position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionContext {
    /// Inside `[[ ... ` on the current line.
    Attribute,
    /// After a member access; carries the receiver identifier if there is one.
    Member {
        /// The expression name before the `.` or `->`.
        receiver: Option<String>,
    },
    /// Anywhere else.
    General,
}

/// Handle a completion request.
pub fn handle_completion(
    params: &CompletionParams,
    doc: &Document,
    analysis: &Analysis,
) -> Option<CompletionResponse> {
    let offset = doc.offset_at(params.text_document_position.position);
    let text = doc.text();
    let prefix = prefix_at(text, offset);
    let context = detect_context(text, offset - prefix.len());

    tracing::debug!("Completion context: {:?}, prefix: {:?}", context, prefix);

    let items = match context {
        CompletionContext::Attribute => attribute_completions(),
        CompletionContext::Member { receiver } => {
            field_completions(text, receiver.as_deref(), &analysis.index)
        }
        CompletionContext::General => general_completions(&analysis.index),
    };

    let items: Vec<CompletionItem> = items
        .into_iter()
        .filter(|item| item.label.starts_with(prefix))
        .collect();

    if items.is_empty() {
        None
    } else {
        Some(CompletionResponse::Array(items))
    }
}

/// Work out what kind of completion applies at `word_start`.
pub fn detect_context(text: &str, word_start: usize) -> CompletionContext {
    let line_start = text[..word_start].rfind('\n').map_or(0, |i| i + 1);
    let before = &text[line_start..word_start];

    if let Some(open) = before.rfind("[[") {
        if !before[open..].contains("]]") {
            return CompletionContext::Attribute;
        }
    }

    let trimmed = before.trim_end();
    let receiver_end = if trimmed.ends_with("->") {
        Some(line_start + trimmed.len() - 2)
    } else if trimmed.ends_with('.') && !trimmed.ends_with("..") {
        Some(line_start + trimmed.len() - 1)
    } else {
        None
    };
    match receiver_end {
        // A digit before the dot is a numeric literal, not a member access.
        Some(end) if !text[..end].ends_with(|c: char| c.is_ascii_digit()) => {
            CompletionContext::Member {
                receiver: identifier_before(text, end),
            }
        }
        _ => CompletionContext::General,
    }
}

fn item(label: &str, kind: CompletionItemKind, detail: Option<String>) -> CompletionItem {
    CompletionItem {
        label: label.to_string(),
        kind: Some(kind),
        detail,
        ..Default::default()
    }
}

fn attribute_completions() -> Vec<CompletionItem> {
    builtins::ATTRIBUTES
        .iter()
        .map(|attr| CompletionItem {
            documentation: Some(Documentation::String(attr.description.to_string())),
            ..item(attr.name, CompletionItemKind::PROPERTY, Some(attr.signature.to_string()))
        })
        .collect()
}

fn field_completions(
    text: &str,
    receiver: Option<&str>,
    index: &DocumentIndex,
) -> Vec<CompletionItem> {
    let owner = receiver
        .and_then(|name| declared_type(text, name))
        .and_then(|ty| index.symbol(&ty).filter(|n| n.kind == SymbolKind::Struct));

    let fields = |node: &SymbolNode| -> Vec<CompletionItem> {
        node.children
            .iter()
            .map(|f| item(&f.name, CompletionItemKind::FIELD, f.detail.clone()))
            .collect()
    };

    match owner {
        Some(node) => fields(node),
        None => {
            let mut items: Vec<CompletionItem> = index.structs().flat_map(fields).collect();
            items.sort_by(|a, b| a.label.cmp(&b.label));
            items.dedup_by(|a, b| a.label == b.label);
            items
        }
    }
}

fn general_completions(index: &DocumentIndex) -> Vec<CompletionItem> {
    let mut items = Vec::new();

    for symbol in &index.symbols {
        match symbol.kind {
            SymbolKind::Struct => {
                items.push(item(&symbol.name, CompletionItemKind::STRUCT, None));
            }
            kind if kind.is_function() => {
                let detail = index
                    .function_signatures
                    .get(&symbol.name)
                    .map(|s| s.label.clone());
                items.push(item(&symbol.name, CompletionItemKind::FUNCTION, detail));
            }
            _ => {}
        }
    }

    for keyword in builtins::KEYWORDS {
        items.push(item(keyword, CompletionItemKind::KEYWORD, None));
    }
    for ty in builtins::builtin_types() {
        items.push(item(&ty, CompletionItemKind::CLASS, Some("builtin type".to_string())));
    }
    for function in builtins::FUNCTIONS {
        items.push(CompletionItem {
            documentation: Some(Documentation::MarkupContent(MarkupContent {
                kind: MarkupKind::Markdown,
                value: function.description.to_string(),
            })),
            ..item(
                function.name,
                CompletionItemKind::FUNCTION,
                Some(function.signature.to_string()),
            )
        });
    }
    items
}
