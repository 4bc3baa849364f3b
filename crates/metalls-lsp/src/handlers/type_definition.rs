//! Go to type definition handler.
//!
//! A struct name resolves to its own declaration. A variable resolves to the
//! struct named by the type token in front of its declaration.

use lsp_types::request::{GotoTypeDefinitionParams, GotoTypeDefinitionResponse};
use lsp_types::Location;
use metalls_syntax::signature::identifier_before;
use metalls_syntax::{builtins, SearchView, SymbolKind};

use super::utils::word_at;
use crate::vfs::Document;

/// Handle a type definition request.
///
/// `find_struct` resolves a struct name to its declaration anywhere in the
/// workspace.
pub fn handle_type_definition(
    params: &GotoTypeDefinitionParams,
    doc: &Document,
    mut find_struct: impl FnMut(&str) -> Option<Location>,
) -> Option<GotoTypeDefinitionResponse> {
    let offset = doc.offset_at(params.text_document_position_params.position);
    let (word, _) = word_at(doc.text(), offset)?;

    let location = find_struct(&word).or_else(|| {
        let ty = declared_type(doc.text(), &word)?;
        tracing::debug!("Type of {} is {}", word, ty);
        find_struct(&ty)
    })?;
    Some(GotoTypeDefinitionResponse::Scalar(location))
}

/// The type name written in front of the first variable declaration of `name`.
///
/// Pointer and reference markers are skipped, and a template argument list
/// (`texture2d<float> t`) is skipped back to its template name.
pub fn declared_type(source: &str, name: &str) -> Option<String> {
    let view = SearchView::new(source);
    let masked = view.masked();

    view.declarations(name)
        .into_iter()
        .filter(|d| d.kind == SymbolKind::Variable)
        .find_map(|decl| {
            let bytes = masked.as_bytes();
            let mut pos = decl.span.start;
            while pos > 0 && matches!(bytes[pos - 1], b' ' | b'\t' | b'*' | b'&') {
                pos -= 1;
            }
            if pos > 0 && bytes[pos - 1] == b'>' {
                let mut depth = 0usize;
                while pos > 0 {
                    pos -= 1;
                    match bytes[pos] {
                        b'>' => depth += 1,
                        b'<' => {
                            depth -= 1;
                            if depth == 0 {
                                break;
                            }
                        }
                        b'\n' | b';' | b'{' | b'}' => return None,
                        _ => {}
                    }
                }
            }
            let ty = identifier_before(masked, pos)?;
            (!builtins::is_keyword(&ty)).then_some(ty)
        })
}
