//! Storage backend trait and implementations.
//!
//! This module provides an abstraction over the files inside a vault root,
//! used when callers write raw content into a vault.

pub mod local;

use std::path::Path;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Failed to write: {0}")]
    WriteError(String),

    #[error("Unsupported format for writing: '{0}'")]
    UnsupportedFormat(String),
}

/// Trait for storage backends holding a vault's documents.
pub trait StorageBackend: Send + Sync {
    /// Write a document's content, creating parent directories. The format
    /// follows the path's extension.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::UnsupportedFormat` for extensions the backend
    /// cannot produce, or `StorageError::WriteError`.
    fn write_document(&self, path: &Path, content: &str) -> Result<(), StorageError>;

    /// Check if a path exists in storage.
    fn exists(&self, path: &Path) -> bool;
}
