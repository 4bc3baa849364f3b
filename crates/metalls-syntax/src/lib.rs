//! Lightweight source analysis for the Metal Shading Language.
//!
//! This crate recovers the structure of Metal (and C-like header) sources
//! without a real grammar. It is built from a few small, independent scanners:
//!
//! - [`mask`] blanks comments and literals while preserving byte offsets
//! - [`index`] recovers top-level functions, structs and struct fields with
//!   brace-depth tracking
//! - [`finder`] locates declarations and references of a name with regexes
//! - [`signature`] splits parameter lists and finds the call under a cursor
//! - [`include`] scans quoted `#include` directives
//! - [`lexer`] tokenizes for semantic highlighting
//! - [`builtins`] holds the static keyword, type and function tables
//!
//! The indexer and the finder deliberately disagree on nested declarations:
//! the indexer only reports top-level symbols, while the finder matches
//! anywhere in the file.
//!
//! # Example
//!
//! ```
//! use metalls_syntax::{index_document, SymbolKind};
//!
//! let index = index_document("struct VertexIn { float3 position [[attribute(0)]]; };");
//! let vertex_in = index.symbol("VertexIn").unwrap();
//! assert_eq!(vertex_in.kind, SymbolKind::Struct);
//! assert_eq!(vertex_in.children[0].name, "position");
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod builtins;
pub mod finder;
pub mod include;
pub mod index;
pub mod lexer;
pub mod mask;
pub mod signature;
mod span;

pub use finder::{find_declarations, find_references, Declaration, SearchView};
pub use include::{find_includes, include_at, IncludeDirective};
pub use index::{index_document, line_text, DocumentIndex, SymbolKind, SymbolNode};
pub use lexer::{tokenize, TokenKind};
pub use mask::{mask, mask_with_char_literals};
pub use signature::{active_call, CallContext, FunctionSignature};
pub use span::{is_ident_byte, is_identifier, line_end, line_start, Span, Spanned};
