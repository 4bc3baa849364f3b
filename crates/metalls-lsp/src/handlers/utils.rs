//! Shared utility functions for LSP handlers.
//!
//! This module contains the UTF-16 aware line index, word extraction and
//! URI/path conversion used across handlers.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use lsp_types::{Position, Range, Uri};
use metalls_syntax::{is_ident_byte, Span};

/// A multi-byte character on a line, located by byte column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct WideChar {
    /// Byte column of the first byte.
    start: u32,
    /// Length in UTF-8 bytes.
    len_utf8: u32,
}

impl WideChar {
    const fn len_utf16(self) -> u32 {
        if self.len_utf8 == 4 {
            2
        } else {
            1
        }
    }

    const fn end(self) -> u32 {
        self.start + self.len_utf8
    }
}

/// A line index for converting between byte offsets and LSP positions.
///
/// Offsets are UTF-8 byte offsets into the document text. Positions use
/// UTF-16 code unit columns, as LSP requires. Lines that contain non-ASCII
/// characters carry a table of those characters, so conversion on plain
/// ASCII lines is a subtraction.
///
/// Out-of-range positions clamp to the end of their line, and lines past
/// the end clamp to the end of the document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineIndex {
    /// Byte offset of the start of each line (line 0 starts at offset 0).
    line_starts: Vec<usize>,
    /// Multi-byte characters, keyed by line.
    wide_chars: HashMap<u32, Vec<WideChar>>,
    /// Byte offsets where each line's content ends (before `\r\n` or `\n`).
    line_ends: Vec<usize>,
    /// Total length of the source in bytes.
    len: usize,
}

impl LineIndex {
    /// Build a line index from source text.
    pub fn new(source: &str) -> Self {
        let mut line_starts = vec![0];
        let mut line_ends = Vec::new();
        let mut wide_chars: HashMap<u32, Vec<WideChar>> = HashMap::new();
        let mut line = 0u32;
        let mut line_start = 0usize;

        for (i, ch) in source.char_indices() {
            if ch == '\n' {
                let end = if i > line_start && source.as_bytes()[i - 1] == b'\r' {
                    i - 1
                } else {
                    i
                };
                line_ends.push(end);
                line_starts.push(i + 1);
                line_start = i + 1;
                line += 1;
            } else if !ch.is_ascii() {
                wide_chars.entry(line).or_default().push(WideChar {
                    start: (i - line_start) as u32,
                    len_utf8: ch.len_utf8() as u32,
                });
            }
        }
        line_ends.push(source.len());

        Self {
            line_starts,
            wide_chars,
            line_ends,
            len: source.len(),
        }
    }

    /// Number of lines (a trailing newline starts an empty last line).
    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    /// Total length of the indexed text in bytes.
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Whether the indexed text is empty.
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Byte range of a line's content, without its line terminator.
    pub fn line_span(&self, line: u32) -> Option<Span> {
        let idx = line as usize;
        Some(Span::new(*self.line_starts.get(idx)?, *self.line_ends.get(idx)?))
    }

    /// Convert a byte offset to a position. Offsets past the end clamp.
    pub fn position(&self, offset: usize) -> Position {
        let offset = offset.min(self.len);
        let line = self.line_starts.partition_point(|&start| start <= offset) - 1;
        let byte_col = (offset - self.line_starts[line]) as u32;

        let shrink: u32 = self
            .wide_chars_on(line as u32)
            .iter()
            .take_while(|wc| wc.end() <= byte_col)
            .map(|wc| wc.len_utf8 - wc.len_utf16())
            .sum();

        Position::new(line as u32, byte_col - shrink)
    }

    /// Convert a position to a byte offset.
    ///
    /// A column past the end of its line clamps to the line end; a line past
    /// the last line clamps to the end of the text. A column that falls
    /// inside a surrogate pair snaps to the start of that character.
    pub fn offset(&self, position: Position) -> usize {
        let Some(span) = self.line_span(position.line) else {
            return self.len;
        };

        let mut shift = 0u32;
        let mut byte_col = None;
        for wc in self.wide_chars_on(position.line) {
            let start_utf16 = wc.start - shift;
            if position.character <= start_utf16 {
                break;
            }
            if position.character < start_utf16 + wc.len_utf16() {
                byte_col = Some(wc.start);
                break;
            }
            shift += wc.len_utf8 - wc.len_utf16();
        }
        let byte_col = byte_col.unwrap_or_else(|| position.character.saturating_add(shift));

        (span.start + byte_col as usize).min(span.end)
    }

    /// Convert a byte span to an LSP range.
    pub fn range(&self, span: Span) -> Range {
        Range::new(self.position(span.start), self.position(span.end))
    }

    /// Convert an LSP range to a byte span (start and end clamp independently).
    pub fn span(&self, range: Range) -> Span {
        let start = self.offset(range.start);
        let end = self.offset(range.end).max(start);
        Span::new(start, end)
    }

    fn wide_chars_on(&self, line: u32) -> &[WideChar] {
        self.wide_chars.get(&line).map_or(&[], Vec::as_slice)
    }
}

/// The identifier touching `offset`, with its byte span.
///
/// A cursor right after the last character of a word still selects it.
pub fn word_at(text: &str, offset: usize) -> Option<(String, Span)> {
    let bytes = text.as_bytes();
    let offset = offset.min(bytes.len());

    let mut start = offset;
    while start > 0 && is_ident_byte(bytes[start - 1]) {
        start -= 1;
    }
    let mut end = offset;
    while end < bytes.len() && is_ident_byte(bytes[end]) {
        end += 1;
    }

    if start == end || bytes[start].is_ascii_digit() {
        return None;
    }
    Some((text[start..end].to_string(), Span::new(start, end)))
}

/// The identifier prefix ending at `offset` (for completion filtering).
pub fn prefix_at(text: &str, offset: usize) -> &str {
    let bytes = text.as_bytes();
    let offset = offset.min(bytes.len());
    let mut start = offset;
    while start > 0 && is_ident_byte(bytes[start - 1]) {
        start -= 1;
    }
    &text[start..offset]
}

/// Convert a `file://` URI to a filesystem path.
pub fn uri_to_path(uri: &Uri) -> Option<PathBuf> {
    url::Url::parse(uri.as_str()).ok()?.to_file_path().ok()
}

/// Convert a filesystem path to a `file://` URI.
pub fn path_to_uri(path: &Path) -> Option<Uri> {
    url::Url::from_file_path(path).ok()?.as_str().parse().ok()
}
