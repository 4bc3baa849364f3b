//! Function signatures and call-site context.

use serde::{Deserialize, Serialize};

use crate::span::is_ident_byte;

/// A callable signature derived from a declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionSignature {
    /// Function name.
    pub name: String,
    /// Whitespace-normalized declaration text through the closing `)`.
    pub label: String,
    /// Parameter declarations, in order.
    pub parameters: Vec<String>,
}

impl FunctionSignature {
    /// Build a signature from a normalized declaration label.
    ///
    /// The parameter list is the text between the first `(` following the
    /// name and the final `)` of the label.
    pub fn from_label(name: &str, label: &str) -> Self {
        let search_from = find_word(label, name).map_or(0, |i| i + name.len());
        let parameters = label[search_from..]
            .find('(')
            .map(|open| {
                let open = search_from + open;
                let close = label.rfind(')').filter(|&c| c > open).unwrap_or(label.len());
                split_parameters(&label[open + 1..close])
            })
            .unwrap_or_default();

        Self {
            name: name.to_string(),
            label: label.to_string(),
            parameters,
        }
    }
}

/// Split a parameter list on top-level commas.
///
/// Commas nested inside `()`, `<>` or `[]` do not split, so template
/// arguments and attribute arguments stay attached to their parameter.
pub fn split_parameters(list: &str) -> Vec<String> {
    let mut params = Vec::new();
    let mut depth = 0i32;
    let mut current = String::new();

    for ch in list.chars() {
        match ch {
            '(' | '<' | '[' => depth += 1,
            ')' | '>' | ']' => depth = (depth - 1).max(0),
            ',' if depth == 0 => {
                push_param(&mut params, &current);
                current.clear();
                continue;
            }
            _ => {}
        }
        current.push(ch);
    }
    push_param(&mut params, &current);
    params
}

fn push_param(params: &mut Vec<String>, raw: &str) {
    let trimmed = raw.trim();
    if !trimmed.is_empty() && trimmed != "void" {
        params.push(trimmed.to_string());
    }
}

/// Collapse every run of whitespace into a single space and trim the ends.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// The call expression enclosing a cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallContext {
    /// Name of the function being called.
    pub name: String,
    /// Zero-based index of the argument containing the cursor.
    pub active_parameter: u32,
}

/// Find the innermost call whose argument list contains `offset`.
///
/// `masked` must be a masked view of the document (see [`crate::mask`]), so
/// parentheses and commas inside literals and comments are already gone.
/// The scan stops at a statement or block boundary.
pub fn active_call(masked: &str, offset: usize) -> Option<CallContext> {
    let bytes = masked.as_bytes();
    let mut i = offset.min(bytes.len());
    let mut depth = 0i32;
    let mut commas = 0u32;

    while i > 0 {
        i -= 1;
        match bytes[i] {
            b')' | b']' => depth += 1,
            b'(' | b'[' if depth > 0 => depth -= 1,
            b'[' => return None,
            b'(' => {
                let name = identifier_before(masked, i)?;
                return Some(CallContext {
                    name,
                    active_parameter: commas,
                });
            }
            b',' if depth == 0 => commas += 1,
            b';' | b'{' | b'}' if depth == 0 => return None,
            _ => {}
        }
    }
    None
}

/// The identifier ending right before `pos` (whitespace allowed in between).
pub fn identifier_before(text: &str, pos: usize) -> Option<String> {
    let bytes = text.as_bytes();
    let mut end = pos.min(bytes.len());
    while end > 0 && bytes[end - 1].is_ascii_whitespace() {
        end -= 1;
    }
    let mut start = end;
    while start > 0 && is_ident_byte(bytes[start - 1]) {
        start -= 1;
    }
    if start == end || bytes[start].is_ascii_digit() {
        return None;
    }
    Some(text[start..end].to_string())
}

/// Find `word` in `text` as a whole identifier.
pub fn find_word(text: &str, word: &str) -> Option<usize> {
    if word.is_empty() {
        return None;
    }
    let bytes = text.as_bytes();
    text.match_indices(word).map(|(i, _)| i).find(|&i| {
        let before_ok = i == 0 || !is_ident_byte(bytes[i - 1]);
        let after = i + word.len();
        let after_ok = after >= bytes.len() || !is_ident_byte(bytes[after]);
        before_ok && after_ok
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_parameters_nested() {
        let params = split_parameters(
            "texture2d<float, access::read> tex [[texture(0)]], uint2 gid [[thread_position_in_grid]]",
        );
        assert_eq!(
            params,
            vec![
                "texture2d<float, access::read> tex [[texture(0)]]",
                "uint2 gid [[thread_position_in_grid]]"
            ]
        );
    }

    #[test]
    fn test_split_parameters_empty_and_void() {
        assert!(split_parameters("").is_empty());
        assert!(split_parameters("  void ").is_empty());
    }

    #[test]
    fn test_signature_from_label() {
        let sig = FunctionSignature::from_label("foo", "float4 foo(float3 a, float b)");
        assert_eq!(sig.parameters, vec!["float3 a", "float b"]);
        assert_eq!(sig.label, "float4 foo(float3 a, float b)");
    }

    #[test]
    fn test_active_call_second_argument() {
        let text = "x = foo(float3(0.0), 1.0)";
        let offset = text.find("1.0").unwrap();
        let ctx = active_call(text, offset).unwrap();
        assert_eq!(ctx.name, "foo");
        assert_eq!(ctx.active_parameter, 1);
    }

    #[test]
    fn test_active_call_inner_call() {
        let text = "foo(float3(0.0, ";
        let ctx = active_call(text, text.len()).unwrap();
        assert_eq!(ctx.name, "float3");
        assert_eq!(ctx.active_parameter, 1);
    }

    #[test]
    fn test_active_call_stops_at_statement() {
        let text = "foo(1); bar";
        assert!(active_call(text, text.len()).is_none());
    }

    #[test]
    fn test_collapse_whitespace() {
        assert_eq!(collapse_whitespace("  kernel   void\n  f( int a )"), "kernel void f( int a )");
    }

    #[test]
    fn test_find_word_boundaries() {
        assert_eq!(find_word("float3 position;", "position"), Some(7));
        assert_eq!(find_word("positions position", "position"), Some(10));
        assert_eq!(find_word("abc", "b"), None);
    }
}
