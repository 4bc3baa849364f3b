//! Regex-based declaration and reference finder.
//!
//! This engine backs go-to-definition, find-references and highlights. It is
//! deliberately independent of the structural indexer and works on its own
//! masked view (comments, strings *and* character literals blanked). The two
//! can disagree: the finder also reports declarations nested inside function
//! bodies, which the indexer never does.

use regex::Regex;

use crate::index::SymbolKind;
use crate::mask::mask_with_char_literals;
use crate::span::{is_ident_byte, line_end, line_start, Span};

/// A declaration site found by the finder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Declaration {
    /// The kind inferred from the surrounding text.
    pub kind: SymbolKind,
    /// Span of the declared name.
    pub span: Span,
}

/// Words that can precede a call but never a declared name.
const NON_DECLARATOR_WORDS: &[&str] = &[
    "return", "else", "case", "sizeof", "new", "delete", "throw", "co_return",
];

/// A masked document ready for repeated searches.
#[derive(Debug, Clone)]
pub struct SearchView<'a> {
    source: &'a str,
    masked: String,
    /// `depths[i]` is the net `(` minus `)` count in `masked[..i]`.
    depths: Vec<i32>,
}

impl<'a> SearchView<'a> {
    /// Build the search view of `source`.
    pub fn new(source: &'a str) -> Self {
        let masked = mask_with_char_literals(source);
        let depths = paren_depths(&masked);
        Self {
            source,
            masked,
            depths,
        }
    }

    /// The masked text.
    pub fn masked(&self) -> &str {
        &self.masked
    }

    /// Every declaration of `name`, in source order.
    pub fn declarations(&self, name: &str) -> Vec<Declaration> {
        if name.is_empty() {
            return Vec::new();
        }
        let escaped = regex::escape(name);
        let mut found = Vec::new();

        self.function_declarations(&escaped, &mut found);
        self.struct_declarations(&escaped, &mut found);
        self.variable_declarations(&escaped, &mut found);
        self.macro_declarations(&escaped, &mut found);

        found.sort_by_key(|d| (d.span.start, d.kind.rank()));
        found.dedup_by_key(|d| d.span.start);
        found
    }

    /// The best declaration of `name`: lowest kind rank, then earliest position.
    pub fn best_declaration(&self, name: &str) -> Option<Declaration> {
        self.declarations(name)
            .into_iter()
            .min_by_key(|d| (d.kind.rank(), d.span.start))
    }

    /// Every whole-word occurrence of `name` outside comments and literals.
    pub fn references(&self, name: &str) -> Vec<Span> {
        let Some(re) = compile(&format!(r"\b{}\b", regex::escape(name))) else {
            return Vec::new();
        };
        re.find_iter(&self.masked)
            .map(|m| Span::new(m.start(), m.end()))
            .collect()
    }

    fn function_declarations(&self, escaped: &str, found: &mut Vec<Declaration>) {
        let Some(re) = compile(&format!(r"\b({escaped})\s*\(")) else {
            return;
        };
        for caps in re.captures_iter(&self.masked) {
            let Some(m) = caps.get(1) else { continue };
            if self.paren_depth(m.start()) != 0 || !self.has_declarator(m.start()) {
                continue;
            }
            found.push(Declaration {
                kind: self.function_kind(m.start()),
                span: Span::new(m.start(), m.end()),
            });
        }
    }

    fn struct_declarations(&self, escaped: &str, found: &mut Vec<Declaration>) {
        let Some(re) = compile(&format!(r"\bstruct\s+({escaped})\b")) else {
            return;
        };
        for caps in re.captures_iter(&self.masked) {
            if let Some(m) = caps.get(1) {
                found.push(Declaration {
                    kind: SymbolKind::Struct,
                    span: Span::new(m.start(), m.end()),
                });
            }
        }
    }

    fn variable_declarations(&self, escaped: &str, found: &mut Vec<Declaration>) {
        let Some(re) = compile(&format!(r"\b({escaped})\s*([=;])")) else {
            return;
        };
        let bytes = self.masked.as_bytes();
        for caps in re.captures_iter(&self.masked) {
            let (Some(m), Some(op)) = (caps.get(1), caps.get(2)) else {
                continue;
            };
            if op.as_str() == "=" && bytes.get(op.end()) == Some(&b'=') {
                continue;
            }
            if self.paren_depth(m.start()) != 0 {
                continue;
            }
            found.push(Declaration {
                kind: SymbolKind::Variable,
                span: Span::new(m.start(), m.end()),
            });
        }
    }

    fn macro_declarations(&self, escaped: &str, found: &mut Vec<Declaration>) {
        // Preprocessor lines are never masked, so this runs on the masked view too.
        let Some(re) = compile(&format!(r"(?m)^[ \t]*#[ \t]*define[ \t]+({escaped})\b")) else {
            return;
        };
        for caps in re.captures_iter(&self.masked) {
            if let Some(m) = caps.get(1) {
                found.push(Declaration {
                    kind: SymbolKind::Unknown,
                    span: Span::new(m.start(), m.end()),
                });
            }
        }
    }

    fn paren_depth(&self, offset: usize) -> i32 {
        self.depths.get(offset).copied().unwrap_or(0)
    }

    /// Whether the name at `start` is preceded by a type-like token.
    ///
    /// Line breaks are skipped, so `kernel void\nname(...)` still qualifies.
    /// Pointer and reference return types (`float* name(`) count only when the
    /// type itself starts a declaration, so `a * name(` in an expression does
    /// not.
    fn has_declarator(&self, start: usize) -> bool {
        let before = self.masked[..start].trim_end();
        let Some(last) = before.bytes().last() else {
            return false;
        };
        match last {
            b'*' | b'&' => {
                let ty = before.trim_end_matches(['*', '&']).trim_end();
                ends_with_type(ty)
            }
            b'>' => ends_with_type(before),
            b']' => ends_with_attribute(before),
            b if is_ident_byte(b) => ends_with_declarator_word(before),
            _ => false,
        }
    }

    fn function_kind(&self, start: usize) -> SymbolKind {
        let line = &self.source[line_start(self.source, start)..line_end(self.source, start)];
        for (word, kind) in [
            ("kernel", SymbolKind::Kernel),
            ("vertex", SymbolKind::Vertex),
            ("fragment", SymbolKind::Fragment),
        ] {
            if crate::signature::find_word(line, word).is_some() {
                return kind;
            }
        }
        SymbolKind::Function
    }
}

/// Running parenthesis depth before every byte of `text`, plus one past the end.
fn paren_depths(text: &str) -> Vec<i32> {
    let mut depths = Vec::with_capacity(text.len() + 1);
    let mut depth = 0i32;
    depths.push(depth);
    for b in text.bytes() {
        match b {
            b'(' => depth += 1,
            b')' => depth -= 1,
            _ => {}
        }
        depths.push(depth);
    }
    depths
}

/// The identifier that `text` ends with, and the text before it.
fn split_last_word(text: &str) -> (&str, &str) {
    let word_start = text
        .bytes()
        .rposition(|b| !is_ident_byte(b))
        .map_or(0, |i| i + 1);
    (&text[..word_start], &text[word_start..])
}

/// Whether `text` ends with a word that may precede a declared name.
fn ends_with_declarator_word(text: &str) -> bool {
    let (_, word) = split_last_word(text);
    !word.is_empty()
        && !word.as_bytes()[0].is_ascii_digit()
        && !NON_DECLARATOR_WORDS.contains(&word)
}

/// Whether `text` ends with a type (`T`, `ns::T`, `T<...>`) in declaration position.
fn ends_with_type(text: &str) -> bool {
    let text = match text.bytes().last() {
        Some(b'>') => match template_open(text) {
            Some(open) => text[..open].trim_end(),
            None => return false,
        },
        Some(b) if is_ident_byte(b) => text,
        _ => return false,
    };
    if !ends_with_declarator_word(text) {
        return false;
    }
    let (prefix, _) = split_last_word(text);
    starts_declaration(prefix.trim_end())
}

/// Whether a type following `prefix` starts a declaration rather than an
/// operand of some expression.
fn starts_declaration(prefix: &str) -> bool {
    let Some(last) = prefix.bytes().last() else {
        return true;
    };
    let last_line = &prefix[line_start(prefix, prefix.len())..];
    if last_line.trim_start().starts_with('#') {
        return true;
    }
    match last {
        b';' | b'{' | b'}' => true,
        b':' => prefix.ends_with("::"),
        b'>' => template_open(prefix).is_some(),
        b']' => ends_with_attribute(prefix),
        b if is_ident_byte(b) => ends_with_declarator_word(prefix),
        _ => false,
    }
}

/// Offset of the `<` matching the `>` that `text` ends with, when the span
/// between them reads as template arguments.
fn template_open(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    for (i, b) in text.bytes().enumerate().rev() {
        match b {
            b'>' => depth += 1,
            b'<' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    let (_, word) = split_last_word(text[..i].trim_end());
                    return (!word.is_empty()).then_some(i);
                }
            }
            b',' | b':' | b'*' | b'&' => {}
            b if is_ident_byte(b) || b.is_ascii_whitespace() => {}
            _ => return None,
        }
    }
    None
}

/// Whether `text` ends with a `[[attribute]]` block.
fn ends_with_attribute(text: &str) -> bool {
    let Some(body) = text.strip_suffix("]]") else {
        return false;
    };
    body.rfind("[[")
        .is_some_and(|open| !body[open + 2..].contains(['[', ']', ';', '{', '}']))
}

fn compile(pattern: &str) -> Option<Regex> {
    Regex::new(pattern).ok()
}

/// Find every declaration of `name` in `source`.
pub fn find_declarations(source: &str, name: &str) -> Vec<Declaration> {
    SearchView::new(source).declarations(name)
}

/// Find every reference to `name` in `source`.
pub fn find_references(source: &str, name: &str) -> Vec<Span> {
    SearchView::new(source).references(name)
}
