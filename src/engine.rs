//! The vault engine: index, reindex, delete, query and list over vaults.
//!
//! The engine owns every lifecycle transition of documents and chunks. It
//! resolves vaults through the injected [`VaultRegistry`], opens stores
//! through the shared [`HandleCache`], and delegates extraction, embedding
//! and similarity search to its collaborators.
//!
//! Batch operations never abort on a per-file problem: the file is recorded
//! as [`Skipped`] and the batch continues. Vault resolution failures and
//! environment failures (store I/O, embedding) are returned to the caller.

use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::cache::HandleCache;
use crate::chunking::ChunkSettings;
use crate::embed::{Embedder, HashingEmbedder, embed_checked};
use crate::error::{Result, VaultError};
use crate::extract::{ExtractorRegistry, file_extension};
use crate::identity::{chunk_id, document_id};
use crate::registry::{VaultConfig, VaultRegistry};
use crate::storage::local::LocalStorageBackend;
use crate::storage::{StorageBackend, StorageError};
use crate::store::{ChunkMetadata, ChunkRecord, Filter, VectorStore};

/// Default number of query results.
pub const DEFAULT_TOP_K: usize = 5;

/// A file a batch operation did not process, and why.
#[derive(Debug)]
pub struct Skipped {
    pub path: PathBuf,
    pub reason: VaultError,
}

/// Result of a batch operation: the files it handled and the ones it skipped.
/// An outcome where everything was skipped is still a successful call.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub succeeded: Vec<PathBuf>,
    pub skipped: Vec<Skipped>,
}

impl BatchOutcome {
    fn skip(&mut self, path: PathBuf, reason: VaultError) {
        warn!(path = %path.display(), %reason, "skipped");
        self.skipped.push(Skipped { path, reason });
    }
}

/// One chunk returned by a query.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryHit {
    pub text: String,
    pub source: String,
    pub chunk_index: usize,
    pub doc_id: String,
    /// Cosine similarity to the query, higher is closer.
    pub score: f32,
}

/// Summary of one indexed document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentInfo {
    pub doc_id: String,
    pub source: String,
    pub chunks_count: usize,
    pub filetype: String,
}

/// Options for [`VaultEngine::write_document`].
#[derive(Debug, Clone, Default)]
pub struct WriteOptions {
    /// Replace the file if it already exists.
    pub overwrite: bool,
    /// Who produced the content (e.g. an agent name), stored as chunk
    /// metadata.
    pub generated_by: Option<String>,
}

/// Result of [`VaultEngine::write_document`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOutcome {
    /// Canonical path of the written file.
    pub path: PathBuf,
    /// Number of chunks indexed for it.
    pub chunks: usize,
}

/// A resolved vault with its open store handle.
struct OpenVault {
    config: VaultConfig,
    store: Arc<dyn VectorStore>,
}

impl OpenVault {
    /// Canonical form of the operation target. Relative paths are taken
    /// relative to the vault root; no path means the whole vault.
    fn target(&self, path: Option<&Path>) -> Result<PathBuf> {
        let joined = match path {
            None => self.config.root_path.clone(),
            Some(p) if p.is_absolute() => p.to_path_buf(),
            Some(p) => self.config.root_path.join(p),
        };
        Ok(canonical_form(&joined)?)
    }

    fn contains(&self, path: &Path) -> bool {
        path.starts_with(&self.config.root_path)
    }

    /// Indexed documents whose source is `target` or lies under it, as
    /// `(doc_id, source)` pairs ordered by source.
    fn documents_under(&self, target: &Path) -> Result<Vec<(String, String)>> {
        let mut docs: BTreeMap<String, String> = BTreeMap::new();
        for meta in self.store.get_all_metadata()? {
            if Path::new(&meta.source).starts_with(target) {
                docs.entry(meta.doc_id).or_insert(meta.source);
            }
        }

        let mut docs: Vec<(String, String)> = docs.into_iter().collect();
        docs.sort_by(|a, b| a.1.cmp(&b.1));
        Ok(docs)
    }
}

/// Orchestrates extraction, chunking, embedding and storage for all vaults.
pub struct VaultEngine {
    registry: Arc<dyn VaultRegistry>,
    handles: Arc<HandleCache>,
    extractors: ExtractorRegistry,
    embedder: Arc<dyn Embedder>,
    chunking: ChunkSettings,
}

impl VaultEngine {
    /// Engine with the default extractors, the hashing embedder and default
    /// chunking.
    #[must_use]
    pub fn new(registry: Arc<dyn VaultRegistry>, handles: Arc<HandleCache>) -> Self {
        Self {
            registry,
            handles,
            extractors: ExtractorRegistry::default(),
            embedder: Arc::new(HashingEmbedder::default()),
            chunking: ChunkSettings::default(),
        }
    }

    #[must_use]
    pub fn with_embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = embedder;
        self
    }

    #[must_use]
    pub fn with_extractors(mut self, extractors: ExtractorRegistry) -> Self {
        self.extractors = extractors;
        self
    }

    /// Use different chunking parameters.
    ///
    /// # Errors
    ///
    /// Returns `VaultError::InvalidChunkConfig` if `overlap >= chunk_size`
    /// or `chunk_size` is zero.
    pub fn with_chunking(mut self, chunking: ChunkSettings) -> Result<Self> {
        chunking.validate()?;
        self.chunking = chunking;
        Ok(self)
    }

    /// Where the registry keeps its state.
    #[must_use]
    pub fn registry_location(&self) -> PathBuf {
        self.registry.location()
    }

    /// Create a vault. See [`VaultRegistry::create_vault`].
    ///
    /// # Errors
    ///
    /// Returns `VaultError::VaultAlreadyExists` if the name is taken, or
    /// `VaultError::InvalidVaultName`.
    pub fn init_vault(&self, name: &str, path: Option<&Path>) -> Result<VaultConfig> {
        Ok(self.registry.create_vault(name, path)?)
    }

    /// Names of all vaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry cannot be read.
    pub fn list_vaults(&self) -> Result<Vec<String>> {
        Ok(self.registry.list_vaults()?)
    }

    fn resolve(&self, name: &str) -> Result<OpenVault> {
        let config = self.registry.get_vault(name)?;
        if !config.store_location.is_dir() {
            return Err(VaultError::VaultNotInitialized {
                name: name.to_string(),
                location: config.store_location,
            });
        }

        let store = self.handles.handle_for(&config.store_location)?;
        Ok(OpenVault { config, store })
    }

    /// Index the file or directory at `path` (the whole vault if `None`).
    ///
    /// Re-indexing a file upserts the same chunk ids and deletes trailing
    /// chunks left over from a longer previous version.
    ///
    /// # Errors
    ///
    /// Returns vault resolution errors, and store or embedding failures.
    /// Per-file problems are reported in [`BatchOutcome::skipped`].
    pub fn index(&self, vault_name: &str, path: Option<&Path>) -> Result<BatchOutcome> {
        let vault = self.resolve(vault_name)?;
        let target = vault.target(path)?;
        let mut outcome = BatchOutcome::default();

        if target.exists() {
            for file in self.collect_files(&vault, &target, &mut outcome) {
                self.index_into(&vault, file, &mut outcome)?;
            }
        } else {
            outcome.skip(target.clone(), VaultError::PathNotFound(target));
        }

        info!(
            vault = vault_name,
            indexed = outcome.succeeded.len(),
            skipped = outcome.skipped.len(),
            "index finished"
        );
        Ok(outcome)
    }

    /// Delete and re-index every matched file, so no chunk of a previous
    /// version survives. Documents indexed under the target whose files no
    /// longer exist are deleted and reported as succeeded.
    ///
    /// # Errors
    ///
    /// Same as [`VaultEngine::index`].
    pub fn reindex(&self, vault_name: &str, path: Option<&Path>) -> Result<BatchOutcome> {
        let vault = self.resolve(vault_name)?;
        let target = vault.target(path)?;
        let mut outcome = BatchOutcome::default();

        if target.exists() {
            for file in self.collect_files(&vault, &target, &mut outcome) {
                vault
                    .store
                    .delete(&Filter::eq("doc_id", document_id(&file)))?;
                self.index_into(&vault, file, &mut outcome)?;
            }
        }

        if vault.contains(&target) {
            for (doc_id, source) in vault.documents_under(&target)? {
                if !Path::new(&source).exists() {
                    let removed = vault.store.delete(&Filter::eq("doc_id", doc_id))?;
                    debug!(%source, removed, "dropped chunks of vanished file");
                    outcome.succeeded.push(PathBuf::from(source));
                }
            }
        }

        if !target.exists() && outcome.succeeded.is_empty() {
            outcome.skip(target.clone(), VaultError::PathNotFound(target));
        }

        info!(
            vault = vault_name,
            reindexed = outcome.succeeded.len(),
            skipped = outcome.skipped.len(),
            "reindex finished"
        );
        Ok(outcome)
    }

    /// Delete every document at or under `path`. With no path nothing is
    /// deleted; there is no implicit "delete all".
    ///
    /// The path does not need to exist on disk, so documents of removed
    /// files can still be dropped.
    ///
    /// # Errors
    ///
    /// Returns vault resolution errors and store failures. A path outside
    /// the vault or with nothing indexed is reported as skipped.
    pub fn delete(&self, vault_name: &str, path: Option<&Path>) -> Result<BatchOutcome> {
        let vault = self.resolve(vault_name)?;
        let mut outcome = BatchOutcome::default();
        let Some(path) = path else {
            return Ok(outcome);
        };

        let target = vault.target(Some(path))?;
        if !vault.contains(&target) {
            outcome.skip(target.clone(), VaultError::FileOutsideVault(target));
            return Ok(outcome);
        }

        let docs = vault.documents_under(&target)?;
        if docs.is_empty() {
            outcome.skip(target.clone(), VaultError::NotIndexed(target));
            return Ok(outcome);
        }

        for (doc_id, source) in docs {
            let removed = vault.store.delete(&Filter::eq("doc_id", doc_id))?;
            debug!(%source, removed, "deleted document");
            outcome.succeeded.push(PathBuf::from(source));
        }

        info!(
            vault = vault_name,
            deleted = outcome.succeeded.len(),
            "delete finished"
        );
        Ok(outcome)
    }

    /// Semantic search over a vault.
    ///
    /// Returns up to `top_k` hits by descending similarity, restricted by
    /// `filter` when given. No hits is a valid result.
    ///
    /// # Errors
    ///
    /// Returns `VaultError::VaultNotFound` for an unknown vault,
    /// `VaultError::EmptyQuery` for blank text, or embedding/store failures.
    pub fn query(
        &self,
        vault_name: &str,
        text: &str,
        top_k: usize,
        filter: Option<&Filter>,
    ) -> Result<Vec<QueryHit>> {
        let vault = self.resolve(vault_name)?;

        let text = text.trim();
        if text.is_empty() {
            return Err(VaultError::EmptyQuery);
        }
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let embedding = embed_checked(self.embedder.as_ref(), &[text.to_string()])?
            .into_iter()
            .next()
            .ok_or_else(|| VaultError::Embedding("no vector for query".to_string()))?;

        let all = Filter::all();
        let matches = vault
            .store
            .query(&embedding, top_k, filter.unwrap_or(&all))?;

        debug!(vault = vault_name, hits = matches.len(), "query finished");
        Ok(matches
            .into_iter()
            .map(|m| QueryHit {
                text: m.text,
                source: m.metadata.source,
                chunk_index: m.metadata.chunk_index,
                doc_id: m.metadata.doc_id,
                score: m.score,
            })
            .collect())
    }

    /// One summary per indexed document, ordered by source. Reads chunk
    /// metadata only.
    ///
    /// # Errors
    ///
    /// Returns vault resolution errors and store failures.
    pub fn list_documents(&self, vault_name: &str) -> Result<Vec<DocumentInfo>> {
        let vault = self.resolve(vault_name)?;

        let mut docs: BTreeMap<String, DocumentInfo> = BTreeMap::new();
        for meta in vault.store.get_all_metadata()? {
            docs.entry(meta.doc_id.clone())
                .or_insert_with(|| DocumentInfo {
                    doc_id: meta.doc_id,
                    source: meta.source,
                    chunks_count: 0,
                    filetype: meta.filetype,
                })
                .chunks_count += 1;
        }

        let mut docs: Vec<DocumentInfo> = docs.into_values().collect();
        docs.sort_by(|a, b| a.source.cmp(&b.source));
        Ok(docs)
    }

    /// Store `content` as a new document at `relative_path` inside the vault
    /// and index it.
    ///
    /// # Errors
    ///
    /// Returns `VaultError::FileOutsideVault` if the path escapes the vault
    /// root, `VaultError::UnsupportedFileType` for formats that cannot be
    /// written, `VaultError::FileAlreadyExists` if the target exists and
    /// `overwrite` is false, plus resolution and indexing failures.
    pub fn write_document(
        &self,
        vault_name: &str,
        relative_path: &Path,
        content: &str,
        options: &WriteOptions,
    ) -> Result<WriteOutcome> {
        let vault = self.resolve(vault_name)?;
        let root = &vault.config.root_path;

        let full_path = validate_path_within_root(root, relative_path)?;
        if canonical_form(&full_path)?.starts_with(&vault.config.store_location) {
            return Err(VaultError::FileOutsideVault(relative_path.to_path_buf()));
        }

        let storage = LocalStorageBackend::new(root.clone());
        if storage.exists(relative_path) && !options.overwrite {
            return Err(VaultError::FileAlreadyExists(full_path));
        }

        storage
            .write_document(relative_path, content)
            .map_err(|e| match e {
                StorageError::UnsupportedFormat(ext) => VaultError::UnsupportedFileType(ext),
                other => VaultError::Io(io::Error::other(other.to_string())),
            })?;

        let file = full_path.canonicalize()?;
        let mut extra = BTreeMap::new();
        if let Some(author) = &options.generated_by {
            extra.insert("generated_by".to_string(), author.clone());
        }
        extra.insert("written_at".to_string(), chrono::Utc::now().to_rfc3339());

        let chunks = self.index_file(&vault, &file, &extra)?;
        info!(vault = vault_name, path = %file.display(), chunks, "wrote document");

        Ok(WriteOutcome { path: file, chunks })
    }

    /// Files to process for `target`: the file itself, or every supported
    /// file under the directory except the vault's store. Files and linked
    /// directories leading outside the vault root are recorded as skipped
    /// and never walked. A directory containing the vault root is narrowed
    /// to the root.
    fn collect_files(
        &self,
        vault: &OpenVault,
        target: &Path,
        outcome: &mut BatchOutcome,
    ) -> Vec<PathBuf> {
        let root = &vault.config.root_path;

        if target.is_file() {
            if vault.contains(target) {
                return vec![target.to_path_buf()];
            }
            outcome.skip(
                target.to_path_buf(),
                VaultError::FileOutsideVault(target.to_path_buf()),
            );
            return Vec::new();
        }

        let walk_root = if vault.contains(target) {
            target
        } else if root.starts_with(target) {
            root.as_path()
        } else {
            outcome.skip(
                target.to_path_buf(),
                VaultError::FileOutsideVault(target.to_path_buf()),
            );
            return Vec::new();
        };

        let store = &vault.config.store_location;
        let mut escaped = Vec::new();
        let mut files = Vec::new();

        let walker = WalkDir::new(walk_root)
            .follow_links(true)
            .into_iter()
            .filter_entry(|e| {
                if e.path() == store {
                    return false;
                }
                if e.path_is_symlink() && e.file_type().is_dir() {
                    let inside = e
                        .path()
                        .canonicalize()
                        .is_ok_and(|p| p.starts_with(root));
                    if !inside {
                        escaped.push(e.path().to_path_buf());
                    }
                    return inside;
                }
                true
            });

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    let path = err.path().map_or_else(|| target.to_path_buf(), Path::to_path_buf);
                    outcome.skip(path, VaultError::Io(err.into()));
                    continue;
                }
            };

            if !entry.file_type().is_file() || !self.extractors.supports(entry.path()) {
                continue;
            }

            match entry.path().canonicalize() {
                Ok(file) if vault.contains(&file) => files.push(file),
                Ok(file) => outcome.skip(file.clone(), VaultError::FileOutsideVault(file)),
                Err(err) => outcome.skip(entry.path().to_path_buf(), err.into()),
            }
        }

        for dir in escaped {
            outcome.skip(dir.clone(), VaultError::FileOutsideVault(dir));
        }

        files.sort();
        files.dedup();
        files
    }

    fn index_into(
        &self,
        vault: &OpenVault,
        file: PathBuf,
        outcome: &mut BatchOutcome,
    ) -> Result<()> {
        match self.index_file(vault, &file, &BTreeMap::new()) {
            Ok(chunks) => {
                debug!(path = %file.display(), chunks, "indexed");
                outcome.succeeded.push(file);
                Ok(())
            }
            Err(err) if err.is_skippable() => {
                outcome.skip(file, err);
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    /// Extract, chunk, embed and upsert one file, then drop chunk ids of a
    /// longer previous version. Returns the number of chunks stored.
    fn index_file(
        &self,
        vault: &OpenVault,
        file: &Path,
        extra: &BTreeMap<String, String>,
    ) -> Result<usize> {
        let text = self.extractors.extract(file)?;
        let chunks = self.chunking.split(&text)?;

        let doc_id = document_id(file);
        let previous = vault.store.get_metadata(&Filter::eq("doc_id", doc_id.as_str()))?;

        let records = if chunks.is_empty() {
            Vec::new()
        } else {
            let embeddings = embed_checked(self.embedder.as_ref(), &chunks)?;
            let source = file.to_string_lossy().into_owned();
            let filetype = file_extension(file);

            chunks
                .into_iter()
                .zip(embeddings)
                .enumerate()
                .map(|(chunk_index, (text, embedding))| ChunkRecord {
                    id: chunk_id(&doc_id, chunk_index),
                    embedding,
                    metadata: ChunkMetadata {
                        doc_id: doc_id.clone(),
                        chunk_index,
                        source: source.clone(),
                        filetype: filetype.clone(),
                        extra: extra.clone(),
                    },
                    text,
                })
                .collect()
        };

        vault.store.upsert(&records)?;

        let count = records.len();
        let stale: Vec<String> = previous
            .iter()
            .filter(|m| m.chunk_index >= count)
            .map(|m| m.chunk_index)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(|index| chunk_id(&doc_id, index))
            .collect();
        if !stale.is_empty() {
            let removed = vault.store.delete_ids(&stale)?;
            debug!(path = %file.display(), removed, "removed stale chunks");
        }

        Ok(count)
    }
}

/// Canonical form of `path`, which need not exist: the deepest existing
/// ancestor is canonicalized and the remaining components appended.
fn canonical_form(path: &Path) -> io::Result<PathBuf> {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }

    let mut existing = normalized.as_path();
    let mut missing = Vec::new();
    while !existing.exists() {
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                missing.push(name.to_os_string());
                existing = parent;
            }
            _ => {
                return Err(io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("no existing ancestor for {}", path.display()),
                ));
            }
        }
    }

    let mut canonical = existing.canonicalize()?;
    for name in missing.iter().rev() {
        canonical.push(name);
    }
    Ok(canonical)
}

/// Validate that a path is safely contained within a root directory.
///
/// Returns the full path if valid, or `VaultError::FileOutsideVault` if the
/// path would escape the root directory (e.g., via `..` components or
/// symlink tricks).
///
/// # Security
///
/// This function validates paths for new files that may not exist yet.
/// It walks up the path hierarchy to find an existing ancestor and
/// verifies that ancestor is within the root directory.
fn validate_path_within_root(root: &Path, relative_path: &Path) -> Result<PathBuf> {
    let outside = || VaultError::FileOutsideVault(relative_path.to_path_buf());

    // Reject paths with parent directory references
    if relative_path
        .components()
        .any(|c| matches!(c, Component::ParentDir))
    {
        return Err(outside());
    }

    // Reject absolute and empty paths
    if relative_path.is_absolute() || relative_path.as_os_str().is_empty() {
        return Err(outside());
    }

    let full_path = root.join(relative_path);
    let canonical_root = root.canonicalize()?;

    // Walk up the path hierarchy to find an existing ancestor
    // This handles the case where we're creating new directories
    let mut check_path = full_path.as_path();
    loop {
        if check_path.exists() {
            let canonical_check = check_path.canonicalize()?;
            if !canonical_check.starts_with(&canonical_root) {
                return Err(outside());
            }
            break;
        }

        match check_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => check_path = parent,
            _ => return Err(outside()),
        }
    }

    Ok(full_path)
}
