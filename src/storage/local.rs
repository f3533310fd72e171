//! Local filesystem storage backend.

use std::fs;
use std::path::{Path, PathBuf};

use crate::extract::file_extension;
use crate::storage::{StorageBackend, StorageError};

/// Extensions [`LocalStorageBackend`] can write.
#[cfg(feature = "documents")]
pub const WRITABLE_EXTENSIONS: &[&str] = &["txt", "md", "docx"];

/// Extensions [`LocalStorageBackend`] can write.
#[cfg(not(feature = "documents"))]
pub const WRITABLE_EXTENSIONS: &[&str] = &["txt", "md"];

/// Storage backend for local filesystem operations.
pub struct LocalStorageBackend {
    root: PathBuf,
}

impl LocalStorageBackend {
    /// Create a new local storage backend rooted at the given path.
    #[must_use]
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }
}

impl StorageBackend for LocalStorageBackend {
    fn write_document(&self, path: &Path, content: &str) -> Result<(), StorageError> {
        let ext = file_extension(path);
        if !WRITABLE_EXTENSIONS.contains(&ext.as_str()) {
            return Err(StorageError::UnsupportedFormat(format!(".{ext}")));
        }

        let full_path = self.root.join(path);

        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                StorageError::WriteError(format!("create dir {}: {e}", parent.display()))
            })?;
        }

        let written = match ext.as_str() {
            #[cfg(feature = "documents")]
            "docx" => crate::extract::docx::write_docx(&full_path, content),
            _ => fs::write(&full_path, content),
        };

        written.map_err(|e| StorageError::WriteError(format!("{}: {e}", full_path.display())))
    }

    fn exists(&self, path: &Path) -> bool {
        self.root.join(path).exists()
    }
}
