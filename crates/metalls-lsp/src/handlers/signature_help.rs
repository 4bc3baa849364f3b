//! Signature help handler.
//!
//! The enclosing call is found by scanning backward from the cursor over the
//! masked text. Signatures come from this document's index, then from other
//! open documents, then from the builtin table.

use lsp_types::{
    Documentation, MarkupContent, MarkupKind, ParameterInformation, ParameterLabel,
    SignatureHelp, SignatureHelpParams, SignatureInformation,
};
use metalls_syntax::{active_call, builtins, mask, FunctionSignature};

use crate::db::Analysis;
use crate::vfs::Document;

/// Handle a signature help request.
///
/// `elsewhere` looks the function up in other open documents.
pub fn handle_signature_help(
    params: &SignatureHelpParams,
    doc: &Document,
    analysis: &Analysis,
    elsewhere: impl FnOnce(&str) -> Option<FunctionSignature>,
) -> Option<SignatureHelp> {
    let offset = doc.offset_at(params.text_document_position_params.position);
    let masked = mask(doc.text());
    let call = active_call(&masked, offset)?;

    tracing::debug!(
        "Signature help for {} (parameter {})",
        call.name,
        call.active_parameter
    );

    let (signature, documentation) = match analysis.index.function_signatures.get(&call.name) {
        Some(local) => (local.clone(), None),
        None => match elsewhere(&call.name) {
            Some(found) => (found, None),
            None => {
                let builtin = builtins::function(&call.name)?;
                (
                    FunctionSignature::from_label(builtin.name, builtin.signature),
                    Some(builtin.description),
                )
            }
        },
    };

    let parameters: Vec<ParameterInformation> = signature
        .parameters
        .iter()
        .map(|p| ParameterInformation {
            label: ParameterLabel::Simple(p.clone()),
            documentation: None,
        })
        .collect();

    Some(SignatureHelp {
        signatures: vec![SignatureInformation {
            label: signature.label,
            documentation: documentation.map(|d| {
                Documentation::MarkupContent(MarkupContent {
                    kind: MarkupKind::Markdown,
                    value: d.to_string(),
                })
            }),
            parameters: Some(parameters),
            active_parameter: Some(call.active_parameter),
        }],
        active_signature: Some(0),
        active_parameter: Some(call.active_parameter),
    })
}
