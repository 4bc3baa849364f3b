//! LSP request and notification handlers.
//!
//! Each handler answers one request type from a document snapshot and its
//! cached analysis. Cross-file lookups go through the workspace resolver.

pub mod utils;

pub mod completion;
pub mod definition;
pub mod diagnostics;
pub mod document_color;
pub mod document_highlight;
pub mod document_links;
pub mod folding;
pub mod formatting;
pub mod hover;
pub mod references;
pub mod semantic_tokens;
pub mod signature_help;
pub mod symbols;
pub mod type_definition;
