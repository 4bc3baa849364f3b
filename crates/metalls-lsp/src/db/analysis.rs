//! Analysis cache: structural index and tokens per document.

use std::collections::HashMap;
use std::sync::Arc;

use lsp_types::Uri;
use metalls_syntax::{index_document, tokenize, DocumentIndex, Spanned, TokenKind};

use super::{content_hash, ContentHash};
use crate::vfs::Document;

/// The result of one analysis pass over a document snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Analysis {
    /// Symbols and function signatures.
    pub index: DocumentIndex,
    /// Classified tokens for semantic highlighting.
    pub tokens: Vec<Spanned<TokenKind>>,
}

impl Analysis {
    /// Run the indexer and tokenizer over `text`.
    pub fn compute(text: &str) -> Self {
        let index = index_document(text);
        let tokens = tokenize(text, &index);
        Self { index, tokens }
    }
}

#[derive(Debug)]
struct Entry {
    version: i32,
    hash: ContentHash,
    analysis: Arc<Analysis>,
}

/// Memoized [`Analysis`] per document URI.
///
/// An entry is served only while both the document version and the content
/// hash still match.
#[derive(Debug, Default)]
pub struct AnalysisCache {
    entries: HashMap<Uri, Entry>,
    computations: u64,
}

impl AnalysisCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the analysis for `document`, recomputing on a miss.
    pub fn get(&mut self, document: &Document) -> Arc<Analysis> {
        let hash = content_hash(document.text());
        if let Some(entry) = self.entries.get(document.uri()) {
            if entry.version == document.version() && entry.hash == hash {
                tracing::debug!("Analysis cache hit: {}", document.uri().as_str());
                return Arc::clone(&entry.analysis);
            }
        }

        tracing::debug!("Analysis cache miss: {}", document.uri().as_str());
        self.computations += 1;
        let analysis = Arc::new(Analysis::compute(document.text()));
        self.entries.insert(
            document.uri().clone(),
            Entry {
                version: document.version(),
                hash,
                analysis: Arc::clone(&analysis),
            },
        );
        analysis
    }

    /// Drop the entry for `uri`.
    pub fn evict(&mut self, uri: &Uri) {
        self.entries.remove(uri);
    }

    /// Whether an entry exists for `uri`.
    pub fn contains(&self, uri: &Uri) -> bool {
        self.entries.contains_key(uri)
    }

    /// Number of analysis passes run so far.
    pub const fn computations(&self) -> u64 {
        self.computations
    }
}
