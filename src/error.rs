//! Error taxonomy for vault operations.

use std::path::PathBuf;

use thiserror::Error;

use crate::extract::ExtractError;
use crate::registry::RegistryError;
use crate::store::StoreError;

/// Errors surfaced by the vault engine.
///
/// Vault identity and path containment errors abort the operation they occur
/// in. During batch operations per-file errors are recorded on the
/// [`Skipped`](crate::engine::Skipped) entry instead of being returned.
#[derive(Debug, Error)]
pub enum VaultError {
    #[error("Vault '{0}' already exists")]
    VaultAlreadyExists(String),

    #[error("Vault '{0}' does not exist")]
    VaultNotFound(String),

    #[error("Vault root {} is already used by vault '{vault}'", path.display())]
    VaultRootInUse { path: PathBuf, vault: String },

    #[error("Vault '{name}' is not initialized: store location {} is missing", location.display())]
    VaultNotInitialized { name: String, location: PathBuf },

    #[error("Path is outside the vault: {}", .0.display())]
    FileOutsideVault(PathBuf),

    #[error("Unsupported file type: '{0}'")]
    UnsupportedFileType(String),

    #[error("Failed to extract {}: {reason}", path.display())]
    ExtractionFailure { path: PathBuf, reason: String },

    #[error("File already exists: {}", .0.display())]
    FileAlreadyExists(PathBuf),

    #[error("Query text cannot be empty")]
    EmptyQuery,

    #[error("Nothing indexed at {}", .0.display())]
    NotIndexed(PathBuf),

    #[error("Path not found: {}", .0.display())]
    PathNotFound(PathBuf),

    #[error("Invalid vault name: {0}")]
    InvalidVaultName(String),

    #[error("Invalid chunking parameters: chunk_size={chunk_size}, overlap={overlap}")]
    InvalidChunkConfig { chunk_size: usize, overlap: usize },

    #[error("Embedding failed: {0}")]
    Embedding(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Registry(RegistryError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ExtractError> for VaultError {
    fn from(err: ExtractError) -> Self {
        match err {
            ExtractError::Unsupported(ext) => Self::UnsupportedFileType(ext),
            ExtractError::Failed { path, reason } => Self::ExtractionFailure { path, reason },
        }
    }
}

impl From<RegistryError> for VaultError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::AlreadyExists(name) => Self::VaultAlreadyExists(name),
            RegistryError::NotFound(name) => Self::VaultNotFound(name),
            RegistryError::InvalidName(reason) => Self::InvalidVaultName(reason),
            RegistryError::LocationInUse { path, vault } => Self::VaultRootInUse { path, vault },
            other => Self::Registry(other),
        }
    }
}

/// Result alias used across the crate.
pub type Result<T, E = VaultError> = std::result::Result<T, E>;

impl VaultError {
    /// True for per-file failures that a batch operation records as skipped
    /// instead of aborting.
    #[must_use]
    pub fn is_skippable(&self) -> bool {
        matches!(
            self,
            Self::FileOutsideVault(_)
                | Self::UnsupportedFileType(_)
                | Self::ExtractionFailure { .. }
                | Self::NotIndexed(_)
                | Self::PathNotFound(_)
        )
    }

    /// True when the error was caused by the caller's input rather than by
    /// the environment (I/O, corrupt store files and the like).
    #[must_use]
    pub fn is_caller_error(&self) -> bool {
        !matches!(
            self,
            Self::Embedding(_) | Self::Store(_) | Self::Registry(_) | Self::Io(_)
        )
    }
}
