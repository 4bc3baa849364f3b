//! Folding ranges handler for collapsible regions.
//!
//! Provides folding ranges for:
//! - Multi-line `{ ... }` blocks (braces in comments and strings ignored)
//! - Multi-line block comments
//! - Runs of consecutive `#include` lines

use lsp_types::{FoldingRange, FoldingRangeKind, FoldingRangeParams};
use metalls_syntax::{mask, TokenKind};

use super::utils::LineIndex;
use crate::db::Analysis;
use crate::vfs::Document;

/// Handle a folding range request.
pub fn handle_folding_ranges(
    _params: &FoldingRangeParams,
    doc: &Document,
    analysis: &Analysis,
) -> Option<Vec<FoldingRange>> {
    let line_index = doc.line_index();
    let mut ranges = brace_ranges(doc.text(), line_index);

    for token in &analysis.tokens {
        if token.value != TokenKind::Comment {
            continue;
        }
        let start = line_index.position(token.span.start).line;
        let end = line_index.position(token.span.end).line;
        if end > start {
            ranges.push(range(start, end, FoldingRangeKind::Comment));
        }
    }

    ranges.extend(include_runs(doc.text()));
    ranges.sort_by_key(|r| (r.start_line, r.end_line));

    if ranges.is_empty() {
        None
    } else {
        Some(ranges)
    }
}

fn range(start_line: u32, end_line: u32, kind: FoldingRangeKind) -> FoldingRange {
    FoldingRange {
        start_line,
        start_character: None,
        end_line,
        end_character: None,
        kind: Some(kind),
        collapsed_text: None,
    }
}

/// Blocks fold from the line of `{` to the line before `}`.
fn brace_ranges(source: &str, line_index: &LineIndex) -> Vec<FoldingRange> {
    let masked = mask(source);
    let mut stack = Vec::new();
    let mut out = Vec::new();

    for (offset, b) in masked.bytes().enumerate() {
        match b {
            b'{' => stack.push(offset),
            b'}' => {
                let Some(open) = stack.pop() else {
                    continue;
                };
                let start = line_index.position(open).line;
                let end = line_index.position(offset).line.saturating_sub(1);
                if end > start {
                    out.push(range(start, end, FoldingRangeKind::Region));
                }
            }
            _ => {}
        }
    }
    out
}

fn include_runs(source: &str) -> Vec<FoldingRange> {
    let mut out = Vec::new();
    let mut run_start: Option<u32> = None;
    let mut last = 0u32;

    for (line_no, line) in source.lines().enumerate() {
        let line_no = line_no as u32;
        let is_include = line
            .trim_start()
            .strip_prefix('#')
            .is_some_and(|rest| rest.trim_start().starts_with("include"));

        if is_include {
            run_start.get_or_insert(line_no);
            last = line_no;
        } else if let Some(start) = run_start.take() {
            if last > start {
                out.push(range(start, last, FoldingRangeKind::Imports));
            }
        }
    }
    if let Some(start) = run_start {
        if last > start {
            out.push(range(start, last, FoldingRangeKind::Imports));
        }
    }
    out
}
