//! `#include` directive scanning.

use std::sync::OnceLock;

use regex::Regex;

use crate::mask::mask;
use crate::span::Span;

/// A quoted `#include "path"` directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncludeDirective {
    /// The path between the quotes.
    pub path: String,
    /// Span of the path text (quotes excluded).
    pub path_span: Span,
    /// Span of the whole directive line.
    pub line_span: Span,
}

fn include_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"(?m)^[ \t]*#[ \t]*include[ \t]*"([^"\n]+)""#).ok())
        .as_ref()
}

/// Every quoted include in `source`, in source order.
///
/// Angle-bracket includes name system headers and are not reported, and
/// neither are directives inside block comments.
pub fn find_includes(source: &str) -> Vec<IncludeDirective> {
    let Some(re) = include_regex() else {
        return Vec::new();
    };
    let masked = mask(source);
    re.captures_iter(source)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let path = caps.get(1)?;
            let hash = whole.start() + whole.as_str().find('#')?;
            if masked.as_bytes().get(hash) != Some(&b'#') {
                return None;
            }
            Some(IncludeDirective {
                path: path.as_str().to_string(),
                path_span: Span::new(path.start(), path.end()),
                line_span: Span::new(whole.start(), whole.end()),
            })
        })
        .collect()
}

/// The include whose quoted path contains `offset`, if any.
pub fn include_at(source: &str, offset: usize) -> Option<IncludeDirective> {
    find_includes(source)
        .into_iter()
        .find(|inc| inc.path_span.touches(offset))
}
