//! External collaborators: the shader compiler and the code formatter.
//!
//! Both sit behind traits so the server can run against fakes in tests.

mod compiler;
mod formatter;

use std::path::{Path, PathBuf};

use lsp_types::{DiagnosticSeverity, Uri};
use thiserror::Error;

pub use compiler::{parse_compiler_output, MetalCompiler};
pub use formatter::{basic_indent, ClangFormat};

use crate::config::Config;

/// Errors from running an external tool.
#[derive(Debug, Error)]
pub enum ToolError {
    /// The program could not be started.
    #[error("failed to run {program}: {source}")]
    Spawn {
        /// Program name or path.
        program: String,
        /// Underlying error.
        source: std::io::Error,
    },
    /// I/O failure while talking to the process or staging files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// The process wrote something that is not UTF-8.
    #[error("tool output is not valid UTF-8")]
    NonUtf8Output,
    /// The formatter exited unsuccessfully.
    #[error("formatter exited with status {0:?}")]
    FormatterStatus(Option<i32>),
}

/// One diagnostic reported by the compiler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilerDiagnostic {
    /// File the diagnostic belongs to.
    pub uri: Uri,
    /// Zero-based line.
    pub line: u32,
    /// Zero-based column.
    pub column: u32,
    /// Severity.
    pub severity: DiagnosticSeverity,
    /// Message text.
    pub message: String,
}

/// Checks a source file and reports diagnostics.
pub trait Compiler {
    /// Compile `source` as if it were the file at `uri`.
    fn check(&self, source: &str, uri: &Uri) -> Result<Vec<CompilerDiagnostic>, ToolError>;
}

/// Formats a whole document.
pub trait Formatter {
    /// Formatted text, or `None` if the formatter is unavailable or failed.
    fn format(&self, source: &str, tab_size: u32, insert_spaces: bool) -> Option<String>;
}

/// The collaborators used by the server.
pub struct Toolchain {
    /// Diagnostics provider.
    pub compiler: Box<dyn Compiler>,
    /// Formatting provider.
    pub formatter: Box<dyn Formatter>,
}

impl Toolchain {
    /// Build a toolchain from explicit collaborators.
    pub fn new(compiler: Box<dyn Compiler>, formatter: Box<dyn Formatter>) -> Self {
        Self { compiler, formatter }
    }

    /// The default external tools, configured from `config`.
    pub fn from_config(config: &Config, root: Option<&Path>) -> Self {
        let compiler = MetalCompiler {
            program: config.compiler_path.clone(),
            args: config.compiler_args.clone(),
            include_paths: config.resolved_include_paths(root),
            root: root.map(Path::to_path_buf),
        };
        let formatter = ClangFormat {
            program: config.formatter_path.clone(),
        };
        Self::new(Box::new(compiler), Box::new(formatter))
    }
}

impl std::fmt::Debug for Toolchain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Toolchain").finish_non_exhaustive()
    }
}

/// `-I` flags for a document: its own directory, the configured paths, then the root.
pub fn include_flags(document_dir: Option<&Path>, include_paths: &[PathBuf], root: Option<&Path>) -> Vec<String> {
    let mut dirs: Vec<&Path> = Vec::new();
    dirs.extend(document_dir);
    dirs.extend(include_paths.iter().map(PathBuf::as_path));
    dirs.extend(root);

    let mut flags = Vec::new();
    let mut seen = Vec::new();
    for dir in dirs {
        if seen.contains(&dir) {
            continue;
        }
        seen.push(dir);
        flags.push("-I".to_string());
        flags.push(dir.display().to_string());
    }
    flags
}
