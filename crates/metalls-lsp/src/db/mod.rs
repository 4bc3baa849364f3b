//! Per-document caches.
//!
//! Both caches are owned by the server instance, so several servers in one
//! process (as in the integration tests) never share entries.
//!
//! - [`AnalysisCache`] memoizes the structural index and semantic tokens,
//!   keyed by document version and content hash.
//! - [`DiagnosticsCache`] memoizes compiler output, keyed by a content hash
//!   combined with a fingerprint of every included file.

mod analysis;
mod diagnostics;

pub use analysis::{Analysis, AnalysisCache};
pub use diagnostics::{cache_key, include_fingerprint, DiagnosticGroups, DiagnosticsCache};

use std::fmt::Write;

use sha2::{Digest, Sha256};

/// A SHA-256 digest.
pub type ContentHash = [u8; 32];

/// Hash document text.
pub fn content_hash(text: &str) -> ContentHash {
    Sha256::digest(text.as_bytes()).into()
}

/// Lowercase hex rendering of a digest.
pub fn to_hex(hash: &ContentHash) -> String {
    hash.iter().fold(String::with_capacity(64), |mut out, b| {
        let _ = write!(out, "{b:02x}");
        out
    })
}
