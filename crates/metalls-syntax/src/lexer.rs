//! Logos-based tokenizer used for semantic highlighting.
//!
//! Tokens are classified with the help of a [`DocumentIndex`], so local
//! functions and structs highlight differently from plain identifiers.

use logos::Logos;
use serde::{Deserialize, Serialize};

use crate::builtins;
use crate::index::{DocumentIndex, SymbolKind};
use crate::span::{Span, Spanned};

/// Raw tokens produced by the Logos lexer.
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
#[logos(skip r"[ \t\r\n\f]+")]
pub enum Token {
    /// A `// ...` comment.
    #[regex(r"//[^\n]*")]
    LineComment,

    /// A terminated `/* ... */` comment.
    #[regex(r"/\*([^*]|\*+[^*/])*\*+/")]
    BlockComment,

    /// A double-quoted string literal.
    #[regex(r#""([^"\\\n]|\\.)*""#)]
    String,

    /// A character literal.
    #[regex(r"'([^'\\\n]|\\.)*'")]
    Char,

    /// An integer or floating-point literal with optional suffix.
    #[regex(r"(0[xX][0-9a-fA-F]+|[0-9]+(\.[0-9]*)?([eE][+-]?[0-9]+)?|\.[0-9]+([eE][+-]?[0-9]+)?)[fFhHuUlL]*")]
    Number,

    /// A preprocessor directive name such as `#include`.
    #[regex(r"#[ \t]*[a-zA-Z_]+")]
    Directive,

    /// Opening `[[` of an attribute.
    #[token("[[")]
    AttributeOpen,

    /// Closing `]]` of an attribute.
    #[token("]]")]
    AttributeClose,

    /// An identifier or keyword.
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*")]
    Ident,

    /// `(`
    #[token("(")]
    LParen,

    /// `.` or `->`
    #[token(".")]
    #[token("->")]
    Member,

    /// Any other operator or punctuation.
    #[regex(r"[-+*/%=<>!&|^~?:;,{}\[\])]")]
    Punct,
}

/// Semantic classification of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenKind {
    /// Language keyword.
    Keyword,
    /// Builtin type.
    Type,
    /// Function name (local or builtin).
    Function,
    /// Struct name declared in the document.
    Struct,
    /// Member accessed with `.` or `->`.
    Property,
    /// Any other identifier.
    Variable,
    /// Numeric literal.
    Number,
    /// String or character literal.
    String,
    /// Comment.
    Comment,
    /// Preprocessor directive or macro name.
    Macro,
    /// Identifier inside `[[...]]`.
    Attribute,
}

/// Lex `source` into raw tokens. Unrecognized bytes are skipped.
pub fn lex(source: &str) -> Vec<(Token, Span)> {
    Token::lexer(source)
        .spanned()
        .filter_map(|(token, span)| token.ok().map(|t| (t, Span::from(span))))
        .collect()
}

/// Tokenize and classify `source` for highlighting.
pub fn tokenize(source: &str, index: &DocumentIndex) -> Vec<Spanned<TokenKind>> {
    let raw = lex(source);
    let mut out = Vec::with_capacity(raw.len());
    let mut in_attribute = false;
    let mut after_define = false;

    for (i, &(token, span)) in raw.iter().enumerate() {
        let kind = match token {
            Token::LineComment | Token::BlockComment => Some(TokenKind::Comment),
            Token::String | Token::Char => Some(TokenKind::String),
            Token::Number => Some(TokenKind::Number),
            Token::Directive => {
                after_define = span.text(source).ends_with("define");
                out.push(Spanned::new(TokenKind::Macro, span));
                continue;
            }
            Token::AttributeOpen => {
                in_attribute = true;
                None
            }
            Token::AttributeClose => {
                in_attribute = false;
                None
            }
            Token::Ident => Some(classify_ident(source, index, &raw, i, in_attribute, after_define)),
            Token::LParen | Token::Member | Token::Punct => None,
        };
        after_define = false;
        if let Some(kind) = kind {
            out.push(Spanned::new(kind, span));
        }
    }
    out
}

fn classify_ident(
    source: &str,
    index: &DocumentIndex,
    raw: &[(Token, Span)],
    i: usize,
    in_attribute: bool,
    after_define: bool,
) -> TokenKind {
    let text = raw[i].1.text(source);
    if in_attribute {
        return TokenKind::Attribute;
    }
    if after_define {
        return TokenKind::Macro;
    }
    if builtins::is_keyword(text) {
        return TokenKind::Keyword;
    }
    if builtins::is_builtin_type(text) {
        return TokenKind::Type;
    }
    if let Some(symbol) = index.symbol(text) {
        match symbol.kind {
            SymbolKind::Struct => return TokenKind::Struct,
            kind if kind.is_function() => return TokenKind::Function,
            _ => {}
        }
    }
    let previous = i.checked_sub(1).map(|p| raw[p].0);
    if previous == Some(Token::Member) {
        return TokenKind::Property;
    }
    let next = raw.get(i + 1).map(|(t, _)| *t);
    if next == Some(Token::LParen) && builtins::function(text).is_some() {
        return TokenKind::Function;
    }
    TokenKind::Variable
}
