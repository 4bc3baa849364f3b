//! Semantic tokens handler for enhanced syntax highlighting.
//!
//! Tokens come from the cached analysis. Multi-line tokens (block comments)
//! are split into one token per line, since not every client supports
//! multi-line tokens. `full/delta` always answers with full tokens.


use lsp_types::{
    Range, SemanticToken, SemanticTokenType, SemanticTokens, SemanticTokensFullDeltaResult,
    SemanticTokensFullOptions, SemanticTokensLegend, SemanticTokensOptions,
    SemanticTokensRangeParams, SemanticTokensRangeResult, SemanticTokensResult,
    SemanticTokensServerCapabilities,
};
use metalls_syntax::{Spanned, TokenKind};

use super::utils::LineIndex;
use crate::vfs::Document;

/// Token types we support, indexed by [`token_type`].
pub const TOKEN_TYPES: &[SemanticTokenType] = &[
    SemanticTokenType::KEYWORD,  // 0
    SemanticTokenType::TYPE,     // 1
    SemanticTokenType::FUNCTION, // 2
    SemanticTokenType::STRUCT,   // 3
    SemanticTokenType::PROPERTY, // 4
    SemanticTokenType::VARIABLE, // 5
    SemanticTokenType::NUMBER,   // 6
    SemanticTokenType::STRING,   // 7
    SemanticTokenType::COMMENT,  // 8
    SemanticTokenType::MACRO,    // 9
    SemanticTokenType::OPERATOR, // 10: attributes
];

/// Get the semantic tokens legend for capability registration.
pub fn get_legend() -> SemanticTokensLegend {
    SemanticTokensLegend {
        token_types: TOKEN_TYPES.to_vec(),
        token_modifiers: Vec::new(),
    }
}

/// Get the semantic tokens server capabilities.
pub fn get_capabilities() -> SemanticTokensServerCapabilities {
    SemanticTokensServerCapabilities::SemanticTokensOptions(SemanticTokensOptions {
        legend: get_legend(),
        full: Some(SemanticTokensFullOptions::Delta { delta: Some(true) }),
        range: Some(true),
        work_done_progress_options: Default::default(),
    })
}

/// Legend index for a token kind.
pub const fn token_type(kind: TokenKind) -> u32 {
    match kind {
        TokenKind::Keyword => 0,
        TokenKind::Type => 1,
        TokenKind::Function => 2,
        TokenKind::Struct => 3,
        TokenKind::Property => 4,
        TokenKind::Variable => 5,
        TokenKind::Number => 6,
        TokenKind::String => 7,
        TokenKind::Comment => 8,
        TokenKind::Macro => 9,
        TokenKind::Attribute => 10,
    }
}

/// A token on a single line, in UTF-16 columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RawToken {
    line: u32,
    start: u32,
    length: u32,
    token_type: u32,
}

/// Split every token into per-line pieces and convert to UTF-16 positions.
fn raw_tokens(tokens: &[Spanned<TokenKind>], line_index: &LineIndex) -> Vec<RawToken> {
    let mut out = Vec::with_capacity(tokens.len());
    for token in tokens {
        let token_type = token_type(token.value);
        let start = line_index.position(token.span.start);
        let end = line_index.position(token.span.end);

        for line in start.line..=end.line {
            let Some(line_span) = line_index.line_span(line) else {
                break;
            };
            let from = if line == start.line { start.character } else { 0 };
            let to = if line == end.line {
                end.character
            } else {
                line_index.position(line_span.end).character
            };
            if to > from {
                out.push(RawToken {
                    line,
                    start: from,
                    length: to - from,
                    token_type,
                });
            }
        }
    }
    out.sort_by_key(|t| (t.line, t.start));
    out
}

/// Delta-encode sorted tokens.
fn encode(raw: &[RawToken]) -> Vec<SemanticToken> {
    let mut prev_line = 0u32;
    let mut prev_start = 0u32;
    raw.iter()
        .map(|t| {
            let delta_line = t.line - prev_line;
            let delta_start = if delta_line == 0 {
                t.start - prev_start
            } else {
                t.start
            };
            prev_line = t.line;
            prev_start = t.start;
            SemanticToken {
                delta_line,
                delta_start,
                length: t.length,
                token_type: t.token_type,
                token_modifiers_bitset: 0,
            }
        })
        .collect()
}

fn full_tokens(
    doc: &Document,
    tokens: &[Spanned<TokenKind>],
    result_id: String,
) -> SemanticTokens {
    SemanticTokens {
        result_id: Some(result_id),
        data: encode(&raw_tokens(tokens, doc.line_index())),
    }
}

/// Handle a semantic tokens request. `result_id` comes from the server.
pub fn handle_semantic_tokens(
    doc: &Document,
    tokens: &[Spanned<TokenKind>],
    result_id: String,
) -> Option<SemanticTokensResult> {
    Some(SemanticTokensResult::Tokens(full_tokens(doc, tokens, result_id)))
}

/// Handle a semantic tokens delta request with a full token set.
pub fn handle_semantic_tokens_delta(
    doc: &Document,
    tokens: &[Spanned<TokenKind>],
    result_id: String,
) -> Option<SemanticTokensFullDeltaResult> {
    Some(SemanticTokensFullDeltaResult::Tokens(full_tokens(doc, tokens, result_id)))
}

/// Handle a semantic tokens range request: tokens on the requested lines.
pub fn handle_semantic_tokens_range(
    params: &SemanticTokensRangeParams,
    doc: &Document,
    tokens: &[Spanned<TokenKind>],
) -> Option<SemanticTokensRangeResult> {
    let raw: Vec<RawToken> = raw_tokens(tokens, doc.line_index())
        .into_iter()
        .filter(|t| in_lines(t, &params.range))
        .collect();

    Some(SemanticTokensRangeResult::Tokens(SemanticTokens {
        result_id: None,
        data: encode(&raw),
    }))
}

fn in_lines(token: &RawToken, range: &Range) -> bool {
    token.line >= range.start.line && token.line <= range.end.line
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Analysis;
    use lsp_types::{Position, TextDocumentIdentifier};

    fn doc(source: &str) -> Document {
        Document::new("file:///t.metal".parse().unwrap(), source.to_string(), 1)
    }

    fn data(result: Option<SemanticTokensResult>) -> Vec<SemanticToken> {
        match result {
            Some(SemanticTokensResult::Tokens(tokens)) => tokens.data,
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_legend_matches_indices() {
        assert_eq!(TOKEN_TYPES[token_type(TokenKind::Struct) as usize], SemanticTokenType::STRUCT);
        assert_eq!(
            TOKEN_TYPES[token_type(TokenKind::Attribute) as usize],
            SemanticTokenType::OPERATOR
        );
        assert_eq!(TOKEN_TYPES.len(), 11);
    }

    #[test]
    fn test_delta_encoding() {
        let source = "float x;\n  return 1;";
        let analysis = Analysis::compute(source);
        let tokens = data(handle_semantic_tokens(&doc(source), &analysis.tokens, "1".to_string()));

        // float, x, return, 1
        assert_eq!(tokens.len(), 4);
        assert_eq!((tokens[0].delta_line, tokens[0].delta_start, tokens[0].length), (0, 0, 5));
        assert_eq!(tokens[0].token_type, token_type(TokenKind::Type));
        assert_eq!((tokens[1].delta_line, tokens[1].delta_start), (0, 6));
        assert_eq!((tokens[2].delta_line, tokens[2].delta_start), (1, 2));
        assert_eq!(tokens[2].token_type, token_type(TokenKind::Keyword));
        assert_eq!((tokens[3].delta_line, tokens[3].delta_start), (0, 7));
    }

    #[test]
    fn test_block_comment_split_per_line() {
        let source = "/* one\ntwo */ int";
        let analysis = Analysis::compute(source);
        let tokens = data(handle_semantic_tokens(&doc(source), &analysis.tokens, "1".to_string()));

        assert_eq!(tokens.len(), 3);
        assert_eq!((tokens[0].delta_line, tokens[0].length), (0, 6));
        assert_eq!((tokens[1].delta_line, tokens[1].delta_start, tokens[1].length), (1, 0, 6));
        assert_eq!(tokens[1].token_type, token_type(TokenKind::Comment));
    }

    #[test]
    fn test_range_filters_lines() {
        let source = "float a;\nfloat b;\nfloat c;\n";
        let analysis = Analysis::compute(source);
        let params = SemanticTokensRangeParams {
            work_done_progress_params: Default::default(),
            partial_result_params: Default::default(),
            text_document: TextDocumentIdentifier {
                uri: "file:///t.metal".parse().unwrap(),
            },
            range: Range::new(Position::new(1, 0), Position::new(1, 8)),
        };
        let Some(SemanticTokensRangeResult::Tokens(tokens)) =
            handle_semantic_tokens_range(&params, &doc(source), &analysis.tokens)
        else {
            panic!("expected tokens");
        };
        assert_eq!(tokens.data.len(), 2);
        // Positions are encoded relative to the start of the document.
        assert_eq!(tokens.data[0].delta_line, 1);
    }

    #[test]
    fn test_delta_returns_full_tokens() {
        let source = "kernel void k() {}";
        let analysis = Analysis::compute(source);
        let result = handle_semantic_tokens_delta(&doc(source), &analysis.tokens, "1".to_string());
        assert!(matches!(result, Some(SemanticTokensFullDeltaResult::Tokens(t)) if !t.data.is_empty()));
    }
}
