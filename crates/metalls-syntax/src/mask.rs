//! Lexical masking of comments and literals.
//!
//! The scanners in this crate match braces, parentheses and identifiers with
//! plain byte comparisons. To keep them from misreading a `{` inside a comment
//! or a `;` inside a string, they run over a *masked* copy of the source in
//! which every comment and literal is replaced with spaces.
//!
//! The masked text always has the same byte length as the source and keeps
//! every `\n` at its original offset, so offsets and line numbers computed on
//! the masked view are valid in the original text.

/// Scanner state while walking the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Code,
    LineComment,
    BlockComment,
    StringLiteral,
    CharLiteral,
}

/// Mask comments and string literals.
///
/// This is the view used by the structural indexer. Character literals are
/// left untouched.
pub fn mask(source: &str) -> String {
    mask_impl(source, false)
}

/// Mask comments, string literals and character literals.
///
/// This is the view used by the declaration/reference finder.
pub fn mask_with_char_literals(source: &str) -> String {
    mask_impl(source, true)
}

fn mask_impl(source: &str, char_literals: bool) -> String {
    let bytes = source.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut state = State::Code;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        let next = bytes.get(i + 1).copied();

        match state {
            State::Code => match (b, next) {
                (b'/', Some(b'/')) => {
                    out.extend_from_slice(b"  ");
                    state = State::LineComment;
                    i += 2;
                    continue;
                }
                (b'/', Some(b'*')) => {
                    out.extend_from_slice(b"  ");
                    state = State::BlockComment;
                    i += 2;
                    continue;
                }
                (b'"', _) => {
                    out.push(b' ');
                    state = State::StringLiteral;
                }
                (b'\'', _) if char_literals => {
                    out.push(b' ');
                    state = State::CharLiteral;
                }
                _ => out.push(b),
            },
            State::LineComment => {
                if b == b'\n' {
                    out.push(b'\n');
                    state = State::Code;
                } else {
                    out.push(b' ');
                }
            }
            State::BlockComment => {
                if b == b'*' && next == Some(b'/') {
                    out.extend_from_slice(b"  ");
                    state = State::Code;
                    i += 2;
                    continue;
                }
                out.push(blank(b));
            }
            State::StringLiteral | State::CharLiteral => {
                let close = if state == State::StringLiteral {
                    b'"'
                } else {
                    b'\''
                };
                if b == b'\n' {
                    // Unterminated literal: recover at end of line.
                    out.push(b'\n');
                    state = State::Code;
                } else if b == b'\\' {
                    out.push(b' ');
                    if let Some(escaped) = next {
                        if escaped != b'\n' {
                            out.push(b' ');
                            i += 2;
                            continue;
                        }
                    }
                } else {
                    out.push(b' ');
                    if b == close {
                        state = State::Code;
                    }
                }
            }
        }
        i += 1;
    }

    // Only ASCII bytes are ever substituted, and multi-byte sequences are
    // either copied whole or blanked whole, so the result is valid UTF-8.
    String::from_utf8(out).unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned())
}

const fn blank(b: u8) -> u8 {
    if b == b'\n' {
        b'\n'
    } else {
        b' '
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn newline_offsets(s: &str) -> Vec<usize> {
        s.match_indices('\n').map(|(i, _)| i).collect()
    }

    #[test]
    fn test_line_comment() {
        let src = "float a; // brace { here\nfloat b;";
        let masked = mask(src);
        assert_eq!(masked, format!("float a;{}\nfloat b;", " ".repeat(16)));
    }

    #[test]
    fn test_block_comment_keeps_newlines() {
        let src = "a /* x {\n y } */ b";
        let masked = mask(src);
        assert_eq!(masked.len(), src.len());
        assert_eq!(newline_offsets(&masked), newline_offsets(src));
        assert!(!masked.contains('{'));
        assert!(!masked.contains('}'));
        assert!(masked.starts_with("a "));
        assert!(masked.ends_with(" b"));
    }

    #[test]
    fn test_string_literal_with_escape() {
        let src = r#"x = "a \" { b"; y"#;
        let masked = mask(src);
        assert_eq!(masked.len(), src.len());
        assert!(!masked.contains('{'));
        assert!(masked.ends_with("; y"));
    }

    #[test]
    fn test_unterminated_string_recovers_at_newline() {
        let src = "s = \"oops\nfloat c;";
        let masked = mask(src);
        assert!(masked.ends_with("\nfloat c;"));
    }

    #[test]
    fn test_char_literals_only_in_search_view() {
        let src = "char c = '{';";
        assert!(mask(src).contains('{'));
        let masked = mask_with_char_literals(src);
        assert!(!masked.contains('{'));
        assert_eq!(masked.len(), src.len());
    }

    #[test]
    fn test_multibyte_comment_preserves_byte_length() {
        let src = "// héllo wörld\nint x;";
        let masked = mask(src);
        assert_eq!(masked.len(), src.len());
        assert!(masked.ends_with("\nint x;"));
    }

    #[test]
    fn test_comment_markers_inside_string_ignored() {
        let src = "a = \"// not comment\"; b = 1;";
        let masked = mask(src);
        assert!(masked.ends_with("; b = 1;"));
    }
}
