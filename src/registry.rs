//! Durable registry of vaults.
//!
//! Maps vault names to their root directory and store location. The
//! registry file is the single source of truth shared by every process;
//! see [`FileRegistry`] for how writes are serialised.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::durable::{LockFile, write_atomic};

/// Name of the store directory created inside each vault root.
pub const STORE_DIR: &str = ".index";

/// Maximum length of a vault name.
const MAX_NAME_LENGTH: usize = 200;

/// Errors that can occur in the registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Vault '{0}' already exists")]
    AlreadyExists(String),

    #[error("Vault '{0}' does not exist")]
    NotFound(String),

    #[error("{0}")]
    InvalidName(String),

    #[error("{} is already used by vault '{vault}'", path.display())]
    LocationInUse { path: PathBuf, vault: String },

    #[error("Failed to read registry {path}: {reason}")]
    Read { path: String, reason: String },

    #[error("Failed to write registry {path}: {reason}")]
    Write { path: String, reason: String },
}

/// Where a vault lives on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultConfig {
    /// Directory whose files may be indexed into the vault.
    pub root_path: PathBuf,
    /// Directory holding the vault's vector store.
    pub store_location: PathBuf,
}

/// Registry file contents.
#[derive(Debug, Default, Serialize, Deserialize)]
struct RegistryFile {
    #[serde(default)]
    vaults: BTreeMap<String, VaultConfig>,
}

/// Vault lifecycle registry, injected into the engine.
pub trait VaultRegistry: Send + Sync {
    /// Register a new vault. An empty or absent `path` places the vault
    /// under the registry's default vaults directory.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::AlreadyExists` if `name` is taken,
    /// `RegistryError::InvalidName` for names unusable as directory names,
    /// `RegistryError::LocationInUse` if another vault already owns the root
    /// (or the root lies inside another vault's store), or a read/write
    /// error.
    fn create_vault(&self, name: &str, path: Option<&Path>) -> Result<VaultConfig, RegistryError>;

    /// Look up a vault.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::NotFound` if `name` is not registered.
    fn get_vault(&self, name: &str) -> Result<VaultConfig, RegistryError>;

    /// Names of all registered vaults, sorted.
    ///
    /// # Errors
    ///
    /// Returns a read error if the registry cannot be loaded.
    fn list_vaults(&self) -> Result<Vec<String>, RegistryError>;

    /// Human-readable location of the registry (e.g. its file path).
    fn location(&self) -> PathBuf;
}

/// Registry stored as JSON at `<home>/config.json`, with vaults created
/// under `<home>/vaults/` by default.
///
/// Reads load the file fresh every time. `create_vault` holds the registry's
/// lock file across the whole read-modify-write and replaces the file
/// atomically, so two processes registering vaults concurrently cannot lose
/// each other's entries or both claim one name.
#[derive(Debug, Clone)]
pub struct FileRegistry {
    path: PathBuf,
    vaults_dir: PathBuf,
}

impl FileRegistry {
    /// Registry rooted at `home`.
    #[must_use]
    pub fn new(home: &Path) -> Self {
        Self {
            path: home.join("config.json"),
            vaults_dir: home.join("vaults"),
        }
    }

    /// Default directory for vaults created without an explicit path.
    #[must_use]
    pub fn vaults_dir(&self) -> &Path {
        &self.vaults_dir
    }

    fn load(&self) -> Result<RegistryFile, RegistryError> {
        if !self.path.exists() {
            return Ok(RegistryFile::default());
        }

        let contents = fs::read_to_string(&self.path).map_err(|e| self.read_error(e))?;
        serde_json::from_str(&contents).map_err(|e| self.read_error(e))
    }

    fn save(&self, registry: &RegistryFile) -> Result<(), RegistryError> {
        let contents =
            serde_json::to_string_pretty(registry).map_err(|e| self.write_error(e))?;
        write_atomic(&self.path, contents.as_bytes()).map_err(|e| self.write_error(e))
    }

    fn read_error(&self, reason: impl ToString) -> RegistryError {
        RegistryError::Read {
            path: self.path.display().to_string(),
            reason: reason.to_string(),
        }
    }

    fn write_error(&self, reason: impl ToString) -> RegistryError {
        RegistryError::Write {
            path: self.path.display().to_string(),
            reason: reason.to_string(),
        }
    }
}

impl VaultRegistry for FileRegistry {
    fn create_vault(&self, name: &str, path: Option<&Path>) -> Result<VaultConfig, RegistryError> {
        validate_vault_name(name)?;

        let _lock = LockFile::acquire(&self.path).map_err(|e| self.write_error(e))?;
        let mut registry = self.load()?;

        if registry.vaults.contains_key(name) {
            return Err(RegistryError::AlreadyExists(name.to_string()));
        }

        let root = match path {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => self.vaults_dir.join(name),
        };

        fs::create_dir_all(&root).map_err(|e| self.write_error(format!("{}: {e}", root.display())))?;
        let root_path = root
            .canonicalize()
            .map_err(|e| self.write_error(format!("{}: {e}", root.display())))?;
        if let Some((vault, _)) = registry.vaults.iter().find(|(_, other)| {
            other.root_path == root_path || root_path.starts_with(&other.store_location)
        }) {
            return Err(RegistryError::LocationInUse {
                path: root_path,
                vault: vault.clone(),
            });
        }

        let store_location = root_path.join(STORE_DIR);
        fs::create_dir_all(&store_location)
            .map_err(|e| self.write_error(format!("{}: {e}", store_location.display())))?;

        let config = VaultConfig {
            root_path,
            store_location,
        };
        registry.vaults.insert(name.to_string(), config.clone());
        self.save(&registry)?;

        info!(vault = name, root = %config.root_path.display(), "created vault");
        Ok(config)
    }

    fn get_vault(&self, name: &str) -> Result<VaultConfig, RegistryError> {
        self.load()?
            .vaults
            .remove(name)
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))
    }

    fn list_vaults(&self) -> Result<Vec<String>, RegistryError> {
        Ok(self.load()?.vaults.into_keys().collect())
    }

    fn location(&self) -> PathBuf {
        self.path.clone()
    }
}

/// Validate a vault name. Names become directory names, so only
/// alphanumeric characters, hyphens, and underscores are allowed.
fn validate_vault_name(value: &str) -> Result<(), RegistryError> {
    let invalid = |reason: String| Err(RegistryError::InvalidName(reason));

    if value.is_empty() {
        return invalid("Vault name cannot be empty".to_string());
    }

    if value.len() > MAX_NAME_LENGTH {
        return invalid(format!(
            "Vault name too long: {} chars (max {MAX_NAME_LENGTH})",
            value.len()
        ));
    }

    // Must start with alphanumeric
    if !value.chars().next().is_some_and(char::is_alphanumeric) {
        return invalid("Vault name must start with a letter or number".to_string());
    }

    // Only allow safe characters
    for c in value.chars() {
        if !c.is_alphanumeric() && c != '-' && c != '_' {
            return invalid(format!(
                "Vault name contains invalid character: '{c}' \
                (only letters, numbers, hyphens, and underscores allowed)"
            ));
        }
    }

    Ok(())
}
