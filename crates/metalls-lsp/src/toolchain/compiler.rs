//! Diagnostics from the Metal compiler.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::OnceLock;

use lsp_types::{DiagnosticSeverity, Uri};
use regex::Regex;

use super::{include_flags, Compiler, CompilerDiagnostic, ToolError};
use crate::handlers::utils::{path_to_uri, uri_to_path};

/// Runs `<program> <args> -fsyntax-only -I... <tempfile>` and parses stderr.
#[derive(Debug, Clone)]
pub struct MetalCompiler {
    /// Program to spawn.
    pub program: String,
    /// Leading arguments (e.g. `-sdk macosx metal` for `xcrun`).
    pub args: Vec<String>,
    /// Extra include directories, already resolved.
    pub include_paths: Vec<PathBuf>,
    /// Workspace root, added as the last include directory.
    pub root: Option<PathBuf>,
}

impl Compiler for MetalCompiler {
    fn check(&self, source: &str, uri: &Uri) -> Result<Vec<CompilerDiagnostic>, ToolError> {
        let origin = uri_to_path(uri);
        let document_dir = origin.as_deref().and_then(Path::parent);

        let mut staged = tempfile::Builder::new()
            .prefix("metalls-")
            .suffix(".metal")
            .tempfile()?;
        staged.write_all(source.as_bytes())?;
        staged.flush()?;

        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .arg("-fsyntax-only")
            .args(include_flags(document_dir, &self.include_paths, self.root.as_deref()))
            .arg(staged.path());

        tracing::debug!("Running compiler: {:?}", command);
        let output = command.output().map_err(|source| ToolError::Spawn {
            program: self.program.clone(),
            source,
        })?;
        let stderr = String::from_utf8(output.stderr).map_err(|_| ToolError::NonUtf8Output)?;

        Ok(parse_compiler_output(&stderr, staged.path(), uri, document_dir))
    }
}

fn diagnostic_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(.*?):(\d+):(\d+):\s*(fatal error|error|warning|note):\s*(.*)$").ok()
    })
    .as_ref()
}

/// Parse `path:line:col: severity: message` lines.
///
/// Diagnostics in `staged` (the temp copy) are attributed to `origin`.
/// Other paths resolve against `base_dir` when relative. A path that cannot
/// be turned into a URI falls back to `origin`.
pub fn parse_compiler_output(
    stderr: &str,
    staged: &Path,
    origin: &Uri,
    base_dir: Option<&Path>,
) -> Vec<CompilerDiagnostic> {
    let Some(re) = diagnostic_regex() else {
        return Vec::new();
    };
    let staged_name = staged.file_name();

    stderr
        .lines()
        .filter_map(|line| {
            let caps = re.captures(line.trim_end())?;
            let file = caps.get(1)?.as_str();
            let line_no: u32 = caps.get(2)?.as_str().parse().ok()?;
            let column: u32 = caps.get(3)?.as_str().parse().ok()?;
            let severity = match caps.get(4)?.as_str() {
                "warning" => DiagnosticSeverity::WARNING,
                "note" => DiagnosticSeverity::INFORMATION,
                _ => DiagnosticSeverity::ERROR,
            };

            let path = PathBuf::from(file);
            let uri = if path.as_path() == staged || path.file_name() == staged_name {
                origin.clone()
            } else {
                let absolute = match base_dir {
                    Some(dir) if path.is_relative() => dir.join(&path),
                    _ => path,
                };
                path_to_uri(&absolute).unwrap_or_else(|| origin.clone())
            };

            Some(CompilerDiagnostic {
                uri,
                line: line_no.saturating_sub(1),
                column: column.saturating_sub(1),
                severity,
                message: caps.get(5)?.as_str().trim().to_string(),
            })
        })
        .collect()
}
