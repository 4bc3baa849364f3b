//! Diagnostics handler for publishing compiler output.

use lsp_types::{Diagnostic, DiagnosticSeverity, Position, Range, Uri};

use crate::db::DiagnosticGroups;
use crate::toolchain::{CompilerDiagnostic, ToolError};

const SOURCE: &str = "metal";

/// Convert a compiler diagnostic to an LSP diagnostic covering one column.
pub fn compiler_to_diagnostic(diag: &CompilerDiagnostic) -> Diagnostic {
    Diagnostic {
        range: Range {
            start: Position::new(diag.line, diag.column),
            end: Position::new(diag.line, diag.column + 1),
        },
        severity: Some(diag.severity),
        source: Some(SOURCE.to_string()),
        message: diag.message.clone(),
        ..Default::default()
    }
}

/// Group diagnostics by the file they belong to.
///
/// The root document always comes first, with an empty list if it has no
/// diagnostics, so stale markers on it are cleared. Other files follow in
/// order of first appearance.
pub fn group_by_file(root: &Uri, diagnostics: &[CompilerDiagnostic]) -> DiagnosticGroups {
    let mut groups: DiagnosticGroups = vec![(root.clone(), Vec::new())];
    for diag in diagnostics {
        let converted = compiler_to_diagnostic(diag);
        match groups.iter_mut().find(|(uri, _)| *uri == diag.uri) {
            Some((_, list)) => list.push(converted),
            None => groups.push((diag.uri.clone(), vec![converted])),
        }
    }
    groups
}

/// A single warning describing why the compiler could not run.
pub fn tool_failure_diagnostic(error: &ToolError) -> Diagnostic {
    Diagnostic {
        range: Range::default(),
        severity: Some(DiagnosticSeverity::WARNING),
        source: Some(SOURCE.to_string()),
        message: format!("Diagnostics unavailable: {error}"),
        ..Default::default()
    }
}
