//! Deterministic identifiers for documents and chunks.
//!
//! Ids are hex-encoded SHA-256 digests, so they are stable across processes
//! and machines for the same input. Re-indexing a path therefore upserts the
//! same ids instead of creating duplicates.

use std::path::Path;

use sha2::{Digest, Sha256};

/// Derive the id of the document stored at `path`.
///
/// Callers pass the canonical path; two spellings of the same file produce
/// different ids.
#[must_use]
pub fn document_id(path: &Path) -> String {
    sha256_hex(path.to_string_lossy().as_bytes())
}

/// Derive the id of chunk `chunk_index` of document `doc_id`.
#[must_use]
pub fn chunk_id(doc_id: &str, chunk_index: usize) -> String {
    sha256_hex(format!("{doc_id}:{chunk_index}").as_bytes())
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}
