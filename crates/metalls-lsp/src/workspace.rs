//! Workspace-wide symbol resolution.
//!
//! The resolver extends single-file finder queries across the project: it
//! enumerates source files under the workspace root, serves their text from
//! the open document when there is one and from an mtime/size validated disk
//! cache otherwise.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use lsp_types::{Location, Range, Uri};
use metalls_syntax::{SearchView, SymbolKind};
use walkdir::{DirEntry, WalkDir};

use crate::handlers::utils::{path_to_uri, uri_to_path, LineIndex};
use crate::vfs::Vfs;

/// File extensions considered part of the workspace.
pub const SOURCE_EXTENSIONS: &[&str] = &[
    "metal", "h", "hpp", "hh", "hxx", "c", "cc", "cpp", "cxx", "m", "mm", "inl",
];

/// Directories never descended into.
pub const EXCLUDED_DIRS: &[&str] = &[
    ".git",
    ".hg",
    ".svn",
    "build",
    "Build",
    "DerivedData",
    "node_modules",
    "target",
    ".build",
    "Pods",
    "out",
    "dist",
];

/// A resolved declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Definition {
    /// Where the declared name is.
    pub location: Location,
    /// The declaration kind.
    pub kind: SymbolKind,
    /// The full source line of the declaration, trimmed.
    pub line: String,
}

#[derive(Debug, Clone)]
struct CachedFile {
    modified: Option<SystemTime>,
    size: u64,
    source: Arc<str>,
}

/// Enumerates workspace files and answers cross-file queries.
#[derive(Debug, Default)]
pub struct WorkspaceResolver {
    root: Option<PathBuf>,
    files: Option<Vec<Uri>>,
    file_cache: HashMap<Uri, CachedFile>,
    disk_reads: u64,
}

impl WorkspaceResolver {
    /// Create a resolver with no root.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the workspace root. The file list and disk cache are dropped if
    /// the root changes.
    pub fn set_root(&mut self, root: Option<PathBuf>) {
        if self.root != root {
            self.root = root;
            self.files = None;
            self.file_cache.clear();
        }
    }

    /// The workspace root, if any.
    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    /// Forget the enumerated file list so the next query walks the tree again.
    pub fn invalidate_files(&mut self) {
        self.files = None;
    }

    /// Number of files read from disk so far.
    pub const fn disk_reads(&self) -> u64 {
        self.disk_reads
    }

    /// Source files under the root, in a stable (sorted) walk order.
    pub fn files(&mut self) -> &[Uri] {
        let root = self.root.clone();
        self.files
            .get_or_insert_with(|| root.as_deref().map(enumerate_files).unwrap_or_default())
    }

    /// Open documents first, then every enumerated file not already listed.
    pub fn candidates(&mut self, vfs: &Vfs) -> Vec<Uri> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for uri in vfs.all_uris() {
            if seen.insert(uri.as_str().to_string()) {
                out.push(uri);
            }
        }
        for uri in self.files() {
            if seen.insert(uri.as_str().to_string()) {
                out.push(uri.clone());
            }
        }
        out
    }

    /// Text for `uri`: the open document if any, else the (cached) file on disk.
    pub fn source(&mut self, uri: &Uri, vfs: &Vfs) -> Option<Arc<str>> {
        if let Some(doc) = vfs.get(uri) {
            return Some(Arc::from(doc.text()));
        }

        let path = uri_to_path(uri)?;
        let meta = match std::fs::metadata(&path) {
            Ok(meta) => meta,
            Err(_) => {
                // Deleted or unreadable.
                self.file_cache.remove(uri);
                return None;
            }
        };
        let modified = meta.modified().ok();
        if let Some(cached) = self.file_cache.get(uri) {
            if cached.modified == modified && cached.size == meta.len() {
                return Some(Arc::clone(&cached.source));
            }
        }

        let text = match std::fs::read(&path) {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(e) => {
                tracing::debug!("Failed to read {}: {}", path.display(), e);
                return None;
            }
        };
        self.disk_reads += 1;
        let source: Arc<str> = Arc::from(text);
        self.file_cache.insert(
            uri.clone(),
            CachedFile {
                modified,
                size: meta.len(),
                source: Arc::clone(&source),
            },
        );
        Some(source)
    }

    /// Resolve the declaration of `name`.
    ///
    /// The primary document wins if it declares the name at all. Otherwise
    /// the first candidate file (in order) with any declaration answers,
    /// with its best-ranked declaration.
    pub fn find_definition(&mut self, vfs: &Vfs, primary: &Uri, name: &str) -> Option<Definition> {
        if let Some(source) = self.source(primary, vfs) {
            if let Some(def) = best_in(primary, &source, name) {
                return Some(def);
            }
        }

        for uri in self.candidates(vfs) {
            if &uri == primary {
                continue;
            }
            let Some(source) = self.source(&uri, vfs) else {
                continue;
            };
            if let Some(def) = best_in(&uri, &source, name) {
                tracing::debug!("Resolved {} in {}", name, uri.as_str());
                return Some(def);
            }
        }
        None
    }

    /// Every reference to `name` across the workspace, de-duplicated.
    ///
    /// Declaration sites are dropped unless `include_declaration` is set.
    pub fn find_references(
        &mut self,
        vfs: &Vfs,
        name: &str,
        include_declaration: bool,
    ) -> Vec<Location> {
        let mut seen: HashSet<(String, u32, u32)> = HashSet::new();
        let mut out = Vec::new();

        for uri in self.candidates(vfs) {
            let Some(source) = self.source(&uri, vfs) else {
                continue;
            };
            if !source.contains(name) {
                continue;
            }
            let view = SearchView::new(&source);
            let declared: HashSet<usize> = if include_declaration {
                HashSet::new()
            } else {
                view.declarations(name).iter().map(|d| d.span.start).collect()
            };

            let index = LineIndex::new(&source);
            for span in view.references(name) {
                if declared.contains(&span.start) {
                    continue;
                }
                let range = index.range(span);
                let key = (uri.as_str().to_string(), range.start.line, range.start.character);
                if seen.insert(key) {
                    out.push(Location::new(uri.clone(), range));
                }
            }
        }
        out
    }
}

/// The best declaration of `name` in one file.
fn best_in(uri: &Uri, source: &str, name: &str) -> Option<Definition> {
    let decl = SearchView::new(source).best_declaration(name)?;
    let index = LineIndex::new(source);
    let range: Range = index.range(decl.span);
    Some(Definition {
        location: Location::new(uri.clone(), range),
        kind: decl.kind,
        line: metalls_syntax::line_text(source, decl.span.start).trim().to_string(),
    })
}

fn is_excluded(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| EXCLUDED_DIRS.contains(&name))
}

fn has_source_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| SOURCE_EXTENSIONS.iter().any(|s| s.eq_ignore_ascii_case(ext)))
}

/// Walk `root` for source files.
pub fn enumerate_files(root: &Path) -> Vec<Uri> {
    let files: Vec<Uri> = WalkDir::new(root)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_excluded(e))
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file() && has_source_extension(e.path()))
        .filter_map(|e| path_to_uri(e.path()))
        .collect();
    tracing::debug!("Enumerated {} files under {}", files.len(), root.display());
    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(root: &Path, rel: &str, text: &str) -> Uri {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, text).unwrap();
        path_to_uri(&path).unwrap()
    }

    #[test]
    fn test_enumeration_filters() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.metal", "");
        write(dir.path(), "inc/b.h", "");
        write(dir.path(), "notes.txt", "");
        write(dir.path(), "build/gen.metal", "");
        write(dir.path(), ".git/x.h", "");
        write(dir.path(), "C.METAL", "");

        let files = enumerate_files(dir.path());
        let names: Vec<String> = files
            .iter()
            .map(|u| u.as_str().rsplit('/').next().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["C.METAL", "a.metal", "b.h"]);
    }

    #[test]
    fn test_definition_prefers_primary_then_first_file() {
        let dir = tempfile::tempdir().unwrap();
        let a = write(dir.path(), "A.metal", "float foo(float x) { return x; }\n");
        let b = write(dir.path(), "B.metal", "kernel void foo() {}\n");
        let use_uri = write(dir.path(), "Use.metal", "void g() { foo(1.0); }\n");

        let mut vfs = Vfs::new();
        vfs.open(use_uri.clone(), "void g() { foo(1.0); }\n".to_string(), 1);

        let mut resolver = WorkspaceResolver::new();
        resolver.set_root(Some(dir.path().to_path_buf()));

        // Use.metal has no declaration; A.metal comes first in walk order.
        let def = resolver.find_definition(&vfs, &use_uri, "foo").unwrap();
        assert_eq!(def.location.uri, a);
        assert_eq!(def.kind, SymbolKind::Function);
        assert_eq!(def.line, "float foo(float x) { return x; }");

        let def = resolver.find_definition(&vfs, &b, "foo").unwrap();
        assert_eq!(def.location.uri, b);
        assert_eq!(def.kind, SymbolKind::Kernel);
    }

    #[test]
    fn test_open_document_shadows_disk() {
        let dir = tempfile::tempdir().unwrap();
        let uri = write(dir.path(), "A.metal", "float old_name;\n");
        let mut vfs = Vfs::new();
        vfs.open(uri.clone(), "float new_name;\n".to_string(), 1);

        let mut resolver = WorkspaceResolver::new();
        resolver.set_root(Some(dir.path().to_path_buf()));
        assert!(resolver.find_definition(&vfs, &uri, "old_name").is_none());
        assert!(resolver.find_definition(&vfs, &uri, "new_name").is_some());
    }

    #[test]
    fn test_disk_cache_validated_by_size() {
        let dir = tempfile::tempdir().unwrap();
        let uri = write(dir.path(), "A.metal", "float a;\n");
        let vfs = Vfs::new();
        let mut resolver = WorkspaceResolver::new();

        assert_eq!(&*resolver.source(&uri, &vfs).unwrap(), "float a;\n");
        resolver.source(&uri, &vfs).unwrap();
        assert_eq!(resolver.disk_reads(), 1);

        fs::write(uri_to_path(&uri).unwrap(), "float abc;\n").unwrap();
        assert_eq!(&*resolver.source(&uri, &vfs).unwrap(), "float abc;\n");
        assert_eq!(resolver.disk_reads(), 2);
    }

    #[test]
    fn test_disk_cache_pruned_on_delete_and_root_change() {
        let dir = tempfile::tempdir().unwrap();
        let a = write(dir.path(), "A.metal", "float a;\n");
        let b = write(dir.path(), "B.metal", "float b;\n");
        let vfs = Vfs::new();
        let mut resolver = WorkspaceResolver::new();
        resolver.set_root(Some(dir.path().to_path_buf()));

        resolver.source(&a, &vfs).unwrap();
        resolver.source(&b, &vfs).unwrap();
        assert_eq!(resolver.file_cache.len(), 2);

        fs::remove_file(uri_to_path(&a).unwrap()).unwrap();
        assert!(resolver.source(&a, &vfs).is_none());
        assert!(!resolver.file_cache.contains_key(&a));
        assert_eq!(resolver.file_cache.len(), 1);

        let other = tempfile::tempdir().unwrap();
        resolver.set_root(Some(other.path().to_path_buf()));
        assert!(resolver.file_cache.is_empty());
    }

    #[test]
    fn test_references_deduplicated_across_open_and_disk() {
        let dir = tempfile::tempdir().unwrap();
        let src = "float foo(float x) { return x; }\nfloat y = foo(1.0) + foo(2.0);\n";
        let uri = write(dir.path(), "A.metal", src);
        let mut vfs = Vfs::new();
        vfs.open(uri, src.to_string(), 1);

        let mut resolver = WorkspaceResolver::new();
        resolver.set_root(Some(dir.path().to_path_buf()));

        assert_eq!(resolver.find_references(&vfs, "foo", true).len(), 3);
        assert_eq!(resolver.find_references(&vfs, "foo", false).len(), 2);
    }
}
