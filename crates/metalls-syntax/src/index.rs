//! Structural indexer.
//!
//! A single forward pass over the masked source that recovers top-level
//! functions (with their signatures) and structs (with their fields) by
//! tracking brace depth. There is no grammar: declarations are recognized
//! only when they start at brace depth 0, so local declarations and anything
//! nested in a namespace block are intentionally not reported.
//!
//! A rejected candidate never desynchronizes the scan. The scanner simply
//! continues with the next byte after the rejected position.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::mask::mask;
use crate::signature::{collapse_whitespace, find_word, FunctionSignature};
use crate::span::{is_ident_byte, is_identifier, line_end, line_start, Span};

/// The kind of a declared symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SymbolKind {
    /// A plain function.
    Function,
    /// A compute kernel entry point.
    Kernel,
    /// A vertex shader entry point.
    Vertex,
    /// A fragment shader entry point.
    Fragment,
    /// A struct type.
    Struct,
    /// A variable or struct field.
    Variable,
    /// Anything else (e.g. a macro).
    Unknown,
}

impl SymbolKind {
    /// Whether the symbol is callable.
    pub const fn is_function(self) -> bool {
        matches!(
            self,
            Self::Function | Self::Kernel | Self::Vertex | Self::Fragment
        )
    }

    /// Rank used when several declarations share a name; lower wins.
    pub const fn rank(self) -> u8 {
        match self {
            Self::Function | Self::Kernel | Self::Vertex | Self::Fragment => 0,
            Self::Struct => 1,
            Self::Variable => 2,
            Self::Unknown => 3,
        }
    }

    /// Kind of a function whose normalized signature starts with a stage keyword.
    pub fn from_signature(signature: &str) -> Self {
        match signature
            .split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .next()
        {
            Some("kernel") => Self::Kernel,
            Some("vertex") => Self::Vertex,
            Some("fragment") => Self::Fragment,
            _ => Self::Function,
        }
    }
}

/// A node of the document outline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolNode {
    /// Symbol name.
    pub name: String,
    /// Symbol kind.
    pub kind: SymbolKind,
    /// Whole declaration.
    pub range: Span,
    /// The name itself.
    pub selection_range: Span,
    /// Signature or declaration text shown next to the name.
    pub detail: Option<String>,
    /// Struct fields.
    pub children: Vec<SymbolNode>,
}

/// Output of one indexing pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentIndex {
    /// Top-level declarations in source order.
    pub symbols: Vec<SymbolNode>,
    /// Signatures of every indexed function, by name.
    pub function_signatures: HashMap<String, FunctionSignature>,
}

impl DocumentIndex {
    /// Find a top-level symbol by name.
    pub fn symbol(&self, name: &str) -> Option<&SymbolNode> {
        self.symbols.iter().find(|s| s.name == name)
    }

    /// Iterate over indexed structs.
    pub fn structs(&self) -> impl Iterator<Item = &SymbolNode> {
        self.symbols.iter().filter(|s| s.kind == SymbolKind::Struct)
    }
}

const CONTROL_KEYWORDS: &[&str] = &["if", "for", "while", "switch"];
const EXPRESSION_KEYWORDS: &[&str] = &["return", "case", "sizeof"];

/// Index a document.
pub fn index_document(source: &str) -> DocumentIndex {
    let masked = mask(source);
    Indexer::new(source, &masked).run()
}

struct Indexer<'a> {
    source: &'a str,
    masked: &'a str,
    bytes: &'a [u8],
    index: DocumentIndex,
}

impl<'a> Indexer<'a> {
    fn new(source: &'a str, masked: &'a str) -> Self {
        Self {
            source,
            masked,
            bytes: masked.as_bytes(),
            index: DocumentIndex::default(),
        }
    }

    fn run(mut self) -> DocumentIndex {
        let mut depth = 0u32;
        let mut i = 0;

        while i < self.bytes.len() {
            let b = self.bytes[i];
            match b {
                b'{' => depth += 1,
                b'}' => depth = depth.saturating_sub(1),
                b'(' if depth == 0 => {
                    if let Some(end) = self.function_at(i) {
                        i = end;
                        continue;
                    }
                }
                _ if depth == 0 && (b.is_ascii_alphabetic() || b == b'_') => {
                    let word_end = self.word_end(i);
                    if &self.masked[i..word_end] == "struct" {
                        if let Some(end) = self.struct_at(i, word_end) {
                            i = end;
                            continue;
                        }
                    }
                    i = word_end;
                    continue;
                }
                _ if b.is_ascii_digit() => {
                    // Skip numeric literals like `1e5f` as a unit.
                    i = self.word_end(i);
                    continue;
                }
                _ => {}
            }
            i += 1;
        }

        self.index
    }

    fn word_end(&self, start: usize) -> usize {
        let mut end = start;
        while end < self.bytes.len() && is_ident_byte(self.bytes[end]) {
            end += 1;
        }
        end
    }

    fn skip_whitespace(&self, mut i: usize) -> usize {
        while i < self.bytes.len() && self.bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        i
    }

    /// Index of the byte matching the opener at `open`.
    fn matching(&self, open: usize, opener: u8, closer: u8) -> Option<usize> {
        let mut depth = 0u32;
        for (offset, &b) in self.bytes[open..].iter().enumerate() {
            if b == opener {
                depth += 1;
            } else if b == closer {
                depth -= 1;
                if depth == 0 {
                    return Some(open + offset);
                }
            }
        }
        None
    }

    /// Skip any number of `[[...]]` attribute blocks and surrounding whitespace.
    fn skip_attributes(&self, mut i: usize) -> usize {
        loop {
            i = self.skip_whitespace(i);
            if self.bytes.get(i) == Some(&b'[') && self.bytes.get(i + 1) == Some(&b'[') {
                match self.matching(i, b'[', b']') {
                    Some(close) => i = close + 1,
                    None => return i,
                }
            } else {
                return i;
            }
        }
    }

    /// Try to recognize a struct whose `struct` keyword spans `kw_start..kw_end`.
    ///
    /// Returns the offset just past the declaration.
    fn struct_at(&mut self, kw_start: usize, kw_end: usize) -> Option<usize> {
        let name_start = self.skip_whitespace(kw_end);
        let name_end = self.word_end(name_start);
        let name = &self.masked[name_start..name_end];
        if !is_identifier(name) {
            return None;
        }

        let mut i = name_end;
        let open = loop {
            match self.bytes.get(i)? {
                b'{' => break i,
                // Forward declarations, variable declarations and return types.
                b';' | b'\n' | b'(' => return None,
                _ => i += 1,
            }
        };
        let close = self.matching(open, b'{', b'}')?;

        let mut end = close + 1;
        let after = self.skip_whitespace(end);
        if self.bytes.get(after) == Some(&b';') {
            end = after + 1;
        }

        let children = self.struct_fields(open + 1, close);
        self.index.symbols.push(SymbolNode {
            name: name.to_string(),
            kind: SymbolKind::Struct,
            range: Span::new(kw_start, end),
            selection_range: Span::new(name_start, name_end),
            detail: Some(format!("struct {name}")),
            children,
        });
        Some(end)
    }

    /// Derive field nodes from the struct body `body_start..body_end`.
    fn struct_fields(&self, body_start: usize, body_end: usize) -> Vec<SymbolNode> {
        let mut fields = Vec::new();
        let mut line_start = body_start;

        while line_start < body_end {
            let line_stop = self.masked[line_start..body_end]
                .find('\n')
                .map_or(body_end, |i| line_start + i);
            self.fields_on_line(line_start, line_stop, &mut fields);
            line_start = line_stop + 1;
        }

        fields
    }

    fn fields_on_line(&self, start: usize, end: usize, fields: &mut Vec<SymbolNode>) {
        let trimmed = self.masked[start..end].trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            return;
        }
        let declarations = strip_brackets(trimmed);
        if declarations.contains('(') {
            return;
        }

        let original_line = &self.source[start..end];
        let mut search_from = 0;
        // Every `;`-terminated statement on the line; trailing text without `;` is ignored.
        let mut statements: Vec<&str> = declarations.split(';').collect();
        statements.pop();

        for statement in statements {
            let Some(token) = statement.split_whitespace().last() else {
                continue;
            };
            let name = token.trim_start_matches(['*', '&']);
            if !is_identifier(name) {
                continue;
            }

            let rest = &original_line[search_from..];
            let found = find_word(rest, name).or_else(|| rest.find(name));
            let name_offset = found.map_or(start, |i| start + search_from + i);
            if let Some(i) = found {
                search_from += i + name.len();
            }
            let name_span = Span::new(name_offset, name_offset + name.len());

            fields.push(SymbolNode {
                name: name.to_string(),
                kind: SymbolKind::Variable,
                range: name_span,
                selection_range: name_span,
                detail: Some(collapse_whitespace(statement)),
                children: Vec::new(),
            });
        }
    }

    /// Try to recognize a function whose parameter list opens at `open`.
    ///
    /// Returns the offset just past the body or prototype.
    fn function_at(&mut self, open: usize) -> Option<usize> {
        let mut name_end = open;
        while name_end > 0 && self.bytes[name_end - 1].is_ascii_whitespace() {
            name_end -= 1;
        }
        let mut name_start = name_end;
        while name_start > 0 && is_ident_byte(self.bytes[name_start - 1]) {
            name_start -= 1;
        }
        let name = &self.masked[name_start..name_end];
        if !is_identifier(name) || CONTROL_KEYWORDS.contains(&name) {
            return None;
        }

        let mut before = name_start;
        while before > 0 && self.bytes[before - 1].is_ascii_whitespace() {
            before -= 1;
        }
        if before > 0 && matches!(self.bytes[before - 1], b'=' | b',' | b'(' | b'[' | b'{' | b'.') {
            return None;
        }
        let mut prev_start = before;
        while prev_start > 0 && is_ident_byte(self.bytes[prev_start - 1]) {
            prev_start -= 1;
        }
        if EXPRESSION_KEYWORDS.contains(&&self.masked[prev_start..before]) {
            return None;
        }

        let close = self.matching(open, b'(', b')')?;
        let after = self.skip_attributes(close + 1);
        let end = match self.bytes.get(after)? {
            b'{' => self.matching(after, b'{', b'}')? + 1,
            b';' => after + 1,
            _ => return None,
        };

        let decl_line = line_start(self.masked, name_start);
        let decl_start = self.skip_whitespace(decl_line).min(name_start);
        let label = collapse_whitespace(&self.source[decl_line..=close]);
        let kind = SymbolKind::from_signature(&label);

        let signature = FunctionSignature::from_label(name, &label);
        self.index
            .function_signatures
            .entry(name.to_string())
            .or_insert(signature);

        self.index.symbols.push(SymbolNode {
            name: name.to_string(),
            kind,
            range: Span::new(decl_start, end),
            selection_range: Span::new(name_start, name_end),
            detail: Some(label),
            children: Vec::new(),
        });
        Some(end)
    }
}

/// Remove `[[attr]]` blocks and `[N]` array suffixes from a field declaration.
fn strip_brackets(statement: &str) -> String {
    let mut out = String::with_capacity(statement.len());
    let mut depth = 0u32;
    for ch in statement.chars() {
        match ch {
            '[' => depth += 1,
            ']' => depth = depth.saturating_sub(1),
            _ if depth == 0 => out.push(ch),
            _ => {}
        }
    }
    out
}

/// Text of the line containing `offset`, without its newline.
pub fn line_text(source: &str, offset: usize) -> &str {
    &source[line_start(source, offset)..line_end(source, offset)]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_struct_with_attribute_field() {
        let src = "struct VertexIn { float3 position [[attribute(0)]]; };";
        let index = index_document(src);
        assert_eq!(index.symbols.len(), 1);
        let s = &index.symbols[0];
        assert_eq!(s.name, "VertexIn");
        assert_eq!(s.kind, SymbolKind::Struct);
        assert_eq!(s.children.len(), 1);
        assert_eq!(s.children[0].name, "position");
        assert_eq!(s.children[0].selection_range.text(src), "position");
        assert_eq!(s.range.text(src), src);
    }

    #[test]
    fn test_struct_fields_multiline() {
        let src = "struct Light {\n    float3 color; // rgb\n    float intensity[4];\n    #if FOO\n    float4 pos [[position]];\n    float helper(float x);\n    device float *ptr;\n    int noterm\n};\n";
        let index = index_document(src);
        let names: Vec<_> = index.symbols[0]
            .children
            .iter()
            .map(|f| f.name.as_str())
            .collect();
        assert_eq!(names, vec!["color", "intensity", "pos", "ptr"]);
    }

    #[test]
    fn test_forward_declaration_rejected() {
        let index = index_document("struct Foo;\nstruct Foo bar;\n");
        assert!(index.structs().next().is_none());
    }

    #[test]
    fn test_function_with_body() {
        let src = "float4 foo(float3 a, float b){ return float4(a,b); }";
        let index = index_document(src);
        assert_eq!(index.symbols.len(), 1);
        let f = &index.symbols[0];
        assert_eq!(f.name, "foo");
        assert_eq!(f.kind, SymbolKind::Function);
        assert_eq!(f.detail.as_deref(), Some("float4 foo(float3 a, float b)"));
        let sig = &index.function_signatures["foo"];
        assert_eq!(sig.parameters, vec!["float3 a", "float b"]);
    }

    #[test]
    fn test_kernel_with_attributes_and_multiline_params() {
        let src = "kernel void add(device float *a [[buffer(0)]],\n                uint id [[thread_position_in_grid]])\n{\n    a[id] += 1.0;\n}\n";
        let index = index_document(src);
        assert_eq!(index.symbols.len(), 1);
        let f = &index.symbols[0];
        assert_eq!(f.kind, SymbolKind::Kernel);
        assert_eq!(
            f.detail.as_deref(),
            Some("kernel void add(device float *a [[buffer(0)]], uint id [[thread_position_in_grid]])")
        );
        assert_eq!(index.function_signatures["add"].parameters.len(), 2);
    }

    #[test]
    fn test_prototype_and_stage_kinds() {
        let src = "vertex VOut vmain(VIn in [[stage_in]]);\nfragment float4 fmain(VOut in [[stage_in]]) { return in.color; }\n";
        let index = index_document(src);
        let kinds: Vec<_> = index.symbols.iter().map(|s| (s.name.as_str(), s.kind)).collect();
        assert_eq!(
            kinds,
            vec![("vmain", SymbolKind::Vertex), ("fmain", SymbolKind::Fragment)]
        );
    }

    #[test]
    fn test_nested_function_not_indexed() {
        let src = "void outer() {\n    void inner();\n    if (x) { y(); }\n}\n";
        let index = index_document(src);
        let names: Vec<_> = index.symbols.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["outer"]);
    }

    #[test]
    fn test_calls_and_initializers_rejected() {
        let src = "constant float k = compute(1.0);\n#define SQR(x) ((x)*(x))\n";
        let index = index_document(src);
        assert!(index.symbols.is_empty(), "{:?}", index.symbols);
    }

    #[test]
    fn test_commented_declaration_ignored() {
        let src = "// float hidden(int a) {}\n/* struct Gone { int a; }; */\nfloat shown() { return 1.0; }\n";
        let index = index_document(src);
        let names: Vec<_> = index.symbols.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["shown"]);
    }

    #[test]
    fn test_rejection_does_not_desync() {
        let src = "garbage(;\nstruct After { int a; };\n";
        let index = index_document(src);
        assert_eq!(index.symbol("After").map(|s| s.kind), Some(SymbolKind::Struct));
    }

    #[test]
    fn test_single_line_struct_with_several_fields() {
        let src = "struct P { float a; float b; int c };";
        let index = index_document(src);
        let fields: Vec<_> = index.symbols[0]
            .children
            .iter()
            .map(|f| (f.name.as_str(), f.selection_range.text(src)))
            .collect();
        assert_eq!(fields, vec![("a", "a"), ("b", "b")]);
    }

    #[test]
    fn test_rank_order() {
        assert!(SymbolKind::Kernel.rank() < SymbolKind::Struct.rank());
        assert!(SymbolKind::Struct.rank() < SymbolKind::Variable.rank());
        assert!(SymbolKind::Variable.rank() < SymbolKind::Unknown.rank());
    }
}
