//! File-backed vector store.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::durable::{LockFile, write_atomic};
use crate::store::{
    ChunkMetadata, ChunkRecord, Filter, StoreError, StoreMatch, VectorStore, cosine_similarity,
};

/// File name of the collection inside a store location.
pub const COLLECTION_FILE: &str = "collection.json";

/// On-disk layout of a collection.
#[derive(Debug, Default, Serialize, Deserialize)]
struct Collection {
    /// Width of the stored embeddings, fixed by the first upsert.
    dimension: Option<usize>,
    records: BTreeMap<String, ChunkRecord>,
}

#[derive(Debug, Default)]
struct State {
    collection: Collection,
    /// Modification time and length of the file when last loaded or written.
    stamp: Option<(SystemTime, u64)>,
}

/// Vector store persisted as one JSON file under the store location.
///
/// Records are held in memory and searched by brute-force cosine
/// similarity. Mutations take the collection's lock file, reload if another
/// process wrote in the meantime, and replace the file atomically. Reads
/// reload when the file changed on disk.
pub struct LocalVectorStore {
    path: PathBuf,
    state: RwLock<State>,
}

impl LocalVectorStore {
    /// Open (or create) the store at `location`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Open` if the directory cannot be created or an
    /// existing collection file cannot be parsed.
    pub fn open(location: &Path) -> Result<Self, StoreError> {
        fs::create_dir_all(location).map_err(|e| StoreError::Open {
            path: location.display().to_string(),
            reason: e.to_string(),
        })?;

        let store = Self {
            path: location.join(COLLECTION_FILE),
            state: RwLock::new(State::default()),
        };
        {
            let mut state = store.state.write();
            store.reload_if_changed(&mut state).map_err(|e| StoreError::Open {
                path: location.display().to_string(),
                reason: e.to_string(),
            })?;
        }

        debug!(path = %store.path.display(), "opened local vector store");
        Ok(store)
    }

    /// Number of records currently stored.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Read` if the collection file cannot be reloaded.
    pub fn len(&self) -> Result<usize, StoreError> {
        self.read(|c| c.records.len())
    }

    /// # Errors
    ///
    /// Returns `StoreError::Read` if the collection file cannot be reloaded.
    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }

    fn file_stamp(&self) -> Option<(SystemTime, u64)> {
        let meta = fs::metadata(&self.path).ok()?;
        Some((meta.modified().ok()?, meta.len()))
    }

    fn reload_if_changed(&self, state: &mut State) -> Result<(), StoreError> {
        let stamp = self.file_stamp();
        if stamp == state.stamp {
            return Ok(());
        }

        state.collection = match stamp {
            Some(_) => {
                let contents = fs::read_to_string(&self.path)
                    .map_err(|e| StoreError::Read(format!("{}: {e}", self.path.display())))?;
                serde_json::from_str(&contents)
                    .map_err(|e| StoreError::Read(format!("{}: {e}", self.path.display())))?
            }
            None => Collection::default(),
        };
        state.stamp = stamp;
        Ok(())
    }

    fn persist(&self, state: &mut State) -> Result<(), StoreError> {
        let contents = serde_json::to_vec(&state.collection)
            .map_err(|e| StoreError::Write(e.to_string()))?;
        write_atomic(&self.path, &contents)
            .map_err(|e| StoreError::Write(format!("{}: {e}", self.path.display())))?;
        state.stamp = self.file_stamp();
        Ok(())
    }

    fn read<T>(&self, f: impl FnOnce(&Collection) -> T) -> Result<T, StoreError> {
        let mut state = self.state.write();
        self.reload_if_changed(&mut state)?;
        Ok(f(&state.collection))
    }

    /// Run `f` under the cross-process lock. `f` reports whether it changed
    /// the collection; only then is the file rewritten.
    fn mutate<T>(
        &self,
        f: impl FnOnce(&mut Collection) -> Result<(T, bool), StoreError>,
    ) -> Result<T, StoreError> {
        let _lock = LockFile::acquire(&self.path)
            .map_err(|e| StoreError::Write(format!("{}: {e}", self.path.display())))?;

        let mut state = self.state.write();
        self.reload_if_changed(&mut state)?;
        let (out, changed) = f(&mut state.collection)?;
        if changed {
            self.persist(&mut state)?;
        }
        Ok(out)
    }
}

impl VectorStore for LocalVectorStore {
    fn upsert(&self, records: &[ChunkRecord]) -> Result<(), StoreError> {
        if records.is_empty() {
            return Ok(());
        }

        self.mutate(|collection| {
            let expected = collection
                .dimension
                .unwrap_or_else(|| records[0].embedding.len());
            if let Some(bad) = records.iter().find(|r| r.embedding.len() != expected) {
                return Err(StoreError::DimensionMismatch {
                    expected,
                    actual: bad.embedding.len(),
                });
            }

            collection.dimension = Some(expected);
            for record in records {
                collection.records.insert(record.id.clone(), record.clone());
            }
            Ok(((), true))
        })?;

        debug!(count = records.len(), "upserted chunks");
        Ok(())
    }

    fn query(
        &self,
        embedding: &[f32],
        top_k: usize,
        filter: &Filter,
    ) -> Result<Vec<StoreMatch>, StoreError> {
        self.read(|collection| {
            let mut scored: Vec<(f32, &ChunkRecord)> = collection
                .records
                .values()
                .filter(|r| filter.matches(&r.metadata))
                .map(|r| (cosine_similarity(embedding, &r.embedding), r))
                .collect();

            // Stable sort: equal scores keep id order.
            scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

            scored
                .into_iter()
                .take(top_k)
                .map(|(score, r)| StoreMatch {
                    id: r.id.clone(),
                    text: r.text.clone(),
                    metadata: r.metadata.clone(),
                    score,
                })
                .collect()
        })
    }

    fn delete(&self, filter: &Filter) -> Result<usize, StoreError> {
        let removed = self.mutate(|collection| {
            let before = collection.records.len();
            collection.records.retain(|_, r| !filter.matches(&r.metadata));
            let removed = before - collection.records.len();
            Ok((removed, removed > 0))
        })?;

        debug!(removed, ?filter, "deleted chunks by filter");
        Ok(removed)
    }

    fn delete_ids(&self, ids: &[String]) -> Result<usize, StoreError> {
        if ids.is_empty() {
            return Ok(0);
        }

        let removed = self.mutate(|collection| {
            let removed = ids
                .iter()
                .filter(|id| collection.records.remove(*id).is_some())
                .count();
            Ok((removed, removed > 0))
        })?;

        debug!(removed, "deleted chunks by id");
        Ok(removed)
    }

    fn get_metadata(&self, filter: &Filter) -> Result<Vec<ChunkMetadata>, StoreError> {
        self.read(|collection| {
            collection
                .records
                .values()
                .filter(|r| filter.matches(&r.metadata))
                .map(|r| r.metadata.clone())
                .collect()
        })
    }
}
