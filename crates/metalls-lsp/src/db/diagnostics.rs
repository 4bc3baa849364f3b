//! Diagnostics cache: compiler output per root document.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::UNIX_EPOCH;

use lsp_types::{Diagnostic, Uri};
use metalls_syntax::find_includes;
use sha2::{Digest, Sha256};

use super::{content_hash, to_hex};

/// Diagnostics grouped by the file they belong to, root document first.
pub type DiagnosticGroups = Vec<(Uri, Vec<Diagnostic>)>;

/// Fingerprint every file reachable through quoted `#include`s.
///
/// Each include resolves against the directory of the file containing it.
/// Entries are `path|mtime|size` (or `path|missing`), one per line, in
/// depth-first source order. Headers are read to follow nested includes;
/// each path is visited once.
pub fn include_fingerprint(source: &str, base_dir: Option<&Path>) -> String {
    let mut out = String::new();
    let mut seen = HashSet::new();
    fingerprint_into(source, base_dir, &mut seen, &mut out);
    out
}

fn fingerprint_into(
    source: &str,
    base_dir: Option<&Path>,
    seen: &mut HashSet<PathBuf>,
    out: &mut String,
) {
    for include in find_includes(source) {
        let path = match base_dir {
            Some(dir) => dir.join(&include.path),
            None => PathBuf::from(&include.path),
        };
        if !seen.insert(path.clone()) {
            continue;
        }

        match std::fs::metadata(&path) {
            Ok(meta) if meta.is_file() => {
                let mtime = meta
                    .modified()
                    .ok()
                    .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                    .map_or(0, |d| d.as_nanos());
                out.push_str(&format!("{}|{}|{}\n", path.display(), mtime, meta.len()));

                if let Ok(nested) = std::fs::read_to_string(&path) {
                    fingerprint_into(&nested, path.parent(), seen, out);
                }
            }
            _ => out.push_str(&format!("{}|missing\n", path.display())),
        }
    }
}

/// Cache key for `source`: its hash combined with the include fingerprint hash.
pub fn cache_key(source: &str, base_dir: Option<&Path>) -> String {
    let fingerprint = include_fingerprint(source, base_dir);
    let mut hasher = Sha256::new();
    hasher.update(content_hash(source));
    hasher.update(content_hash(&fingerprint));
    to_hex(&hasher.finalize().into())
}

#[derive(Debug)]
struct Entry {
    key: String,
    groups: Arc<DiagnosticGroups>,
}

/// Memoized compiler diagnostics per root document URI.
#[derive(Debug, Default)]
pub struct DiagnosticsCache {
    entries: HashMap<Uri, Entry>,
}

impl DiagnosticsCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached groups for `uri`, if stored under the same key.
    pub fn get(&self, uri: &Uri, key: &str) -> Option<Arc<DiagnosticGroups>> {
        self.entries
            .get(uri)
            .filter(|entry| entry.key == key)
            .map(|entry| Arc::clone(&entry.groups))
    }

    /// Store groups for `uri` under `key`.
    pub fn store(&mut self, uri: Uri, key: String, groups: DiagnosticGroups) -> Arc<DiagnosticGroups> {
        let groups = Arc::new(groups);
        self.entries.insert(
            uri,
            Entry {
                key,
                groups: Arc::clone(&groups),
            },
        );
        groups
    }

    /// Drop the entry for `uri`.
    pub fn evict(&mut self, uri: &Uri) {
        self.entries.remove(uri);
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Whether an entry exists for `uri`.
    pub fn contains(&self, uri: &Uri) -> bool {
        self.entries.contains_key(uri)
    }
}
