//! Virtual File System for document management.
//!
//! The VFS holds the authoritative text and version of every open document.
//! Edits arrive as full replacements or UTF-16 ranged changes; each ranged
//! change is resolved against the text as it stands after the previous one.

use std::collections::HashMap;

use lsp_types::{Position, TextDocumentContentChangeEvent, Uri};

use crate::handlers::utils::LineIndex;

/// A document in the virtual file system.
#[derive(Debug, Clone)]
pub struct Document {
    uri: Uri,
    text: String,
    version: i32,
    line_index: LineIndex,
}

impl Document {
    /// Create a new document with the given content.
    pub fn new(uri: Uri, text: String, version: i32) -> Self {
        let line_index = LineIndex::new(&text);
        Self {
            uri,
            text,
            version,
            line_index,
        }
    }

    /// The document URI.
    pub const fn uri(&self) -> &Uri {
        &self.uri
    }

    /// The document content.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The document version.
    pub const fn version(&self) -> i32 {
        self.version
    }

    /// The line index for the current text.
    pub const fn line_index(&self) -> &LineIndex {
        &self.line_index
    }

    /// Convert a position to a byte offset.
    pub fn offset_at(&self, position: Position) -> usize {
        self.line_index.offset(position)
    }

    /// Convert a byte offset to a position.
    pub fn position_at(&self, offset: usize) -> Position {
        self.line_index.position(offset)
    }

    /// Apply a list of content changes in order, then set the version.
    pub fn apply_changes(&mut self, changes: Vec<TextDocumentContentChangeEvent>, version: i32) {
        for change in changes {
            match change.range {
                Some(range) => {
                    let span = self.line_index.span(range);
                    self.text.replace_range(span.start..span.end, &change.text);
                }
                None => self.text = change.text,
            }
            self.line_index = LineIndex::new(&self.text);
        }
        self.version = version;
    }
}

/// Virtual file system for managing open documents.
#[derive(Debug, Default)]
pub struct Vfs {
    /// Open documents indexed by URI.
    documents: HashMap<Uri, Document>,
}

impl Vfs {
    /// Create a new empty VFS.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open (or reopen) a document.
    pub fn open(&mut self, uri: Uri, text: String, version: i32) {
        self.documents
            .insert(uri.clone(), Document::new(uri, text, version));
    }

    /// Apply edits to an open document. Returns `false` if it is not open.
    pub fn update(
        &mut self,
        uri: &Uri,
        changes: Vec<TextDocumentContentChangeEvent>,
        version: i32,
    ) -> bool {
        match self.documents.get_mut(uri) {
            Some(doc) => {
                doc.apply_changes(changes, version);
                true
            }
            None => false,
        }
    }

    /// Close a document. Returns the removed document, if any.
    pub fn close(&mut self, uri: &Uri) -> Option<Document> {
        self.documents.remove(uri)
    }

    /// Get a document by URI.
    pub fn get(&self, uri: &Uri) -> Option<&Document> {
        self.documents.get(uri)
    }

    /// Get a document's text by URI.
    pub fn get_content(&self, uri: &Uri) -> Option<String> {
        self.documents.get(uri).map(|d| d.text.clone())
    }

    /// All open document URIs, sorted for deterministic iteration.
    pub fn all_uris(&self) -> Vec<Uri> {
        let mut uris: Vec<Uri> = self.documents.keys().cloned().collect();
        uris.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        uris
    }

    /// Iterate over all open documents.
    pub fn iter(&self) -> impl Iterator<Item = &Document> {
        self.documents.values()
    }
}
