//! Document formatting: `clang-format`, with a brace-depth fallback.

use std::io::Write;
use std::process::{Command, Stdio};

use metalls_syntax::mask;

use super::{Formatter, ToolError};

/// Pipes the document through `clang-format`.
#[derive(Debug, Clone)]
pub struct ClangFormat {
    /// Program to spawn.
    pub program: String,
}

impl ClangFormat {
    fn run(&self, source: &str, tab_size: u32, insert_spaces: bool) -> Result<String, ToolError> {
        let style = format!(
            "--style={{BasedOnStyle: LLVM, IndentWidth: {tab_size}, TabWidth: {tab_size}, UseTab: {}}}",
            if insert_spaces { "Never" } else { "Always" }
        );
        let mut child = Command::new(&self.program)
            .arg(style)
            .arg("--assume-filename=document.metal")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| ToolError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(source.as_bytes())?;
        }
        let output = child.wait_with_output()?;
        if !output.status.success() {
            return Err(ToolError::FormatterStatus(output.status.code()));
        }
        String::from_utf8(output.stdout).map_err(|_| ToolError::NonUtf8Output)
    }
}

impl Formatter for ClangFormat {
    fn format(&self, source: &str, tab_size: u32, insert_spaces: bool) -> Option<String> {
        match self.run(source, tab_size, insert_spaces) {
            Ok(text) => Some(text),
            Err(e) => {
                tracing::warn!("Formatter unavailable, using basic indentation: {}", e);
                None
            }
        }
    }
}

/// Re-indent every line by brace depth.
///
/// Depth is counted on the masked text, so braces in comments and strings
/// are ignored. A line's leading closing braces dedent the line itself.
/// Preprocessor lines stay at column 0; blank lines lose their whitespace.
pub fn basic_indent(source: &str, tab_size: u32, insert_spaces: bool) -> String {
    let unit = if insert_spaces {
        " ".repeat(tab_size.max(1) as usize)
    } else {
        "\t".to_string()
    };
    let masked = mask(source);

    let mut out = String::with_capacity(source.len());
    let mut depth: usize = 0;
    let mut start = 0;
    for line in source.split_inclusive('\n') {
        let end = start + line.len();
        let masked_line = &masked[start..end];
        start = end;

        let (body, newline) = match line.strip_suffix("\r\n") {
            Some(body) => (body, "\r\n"),
            None => match line.strip_suffix('\n') {
                Some(body) => (body, "\n"),
                None => (line, ""),
            },
        };
        let content = body.trim();
        let code = masked_line.trim();

        if content.is_empty() {
            out.push_str(newline);
            continue;
        }

        let leading_closers = code.bytes().take_while(|&b| b == b'}').count();
        let level = depth.saturating_sub(leading_closers);
        if !content.starts_with('#') {
            out.push_str(&unit.repeat(level));
        }
        out.push_str(content);
        out.push_str(newline);

        for b in code.bytes() {
            match b {
                b'{' => depth += 1,
                b'}' => depth = depth.saturating_sub(1),
                _ => {}
            }
        }
    }
    out
}
