//! Vector store trait and implementations.
//!
//! A vault's chunks live in the vector store at its store location. The
//! engine talks to it only through [`VectorStore`], addressing records by
//! chunk id and selecting them with metadata [`Filter`]s.

pub mod local;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Errors that can occur during store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Failed to open store at {path}: {reason}")]
    Open { path: String, reason: String },

    #[error("Failed to read store: {0}")]
    Read(String),

    #[error("Failed to write store: {0}")]
    Write(String),

    #[error("Embedding dimension mismatch: store has {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Metadata stored alongside every chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub doc_id: String,
    pub chunk_index: usize,
    /// Canonical path of the owning document.
    pub source: String,
    /// Lowercased extension without the dot (e.g. "md").
    pub filetype: String,
    /// Additional string metadata (e.g. `generated_by` for agent writes).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

impl ChunkMetadata {
    /// Look a field up by name, the way filters address it.
    #[must_use]
    pub fn field(&self, key: &str) -> Option<String> {
        match key {
            "doc_id" => Some(self.doc_id.clone()),
            "chunk_index" => Some(self.chunk_index.to_string()),
            "source" => Some(self.source.clone()),
            "filetype" => Some(self.filetype.clone()),
            other => self.extra.get(other).cloned(),
        }
    }
}

/// One chunk as written to the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub id: String,
    pub embedding: Vec<f32>,
    pub metadata: ChunkMetadata,
    pub text: String,
}

/// A nearest-neighbour match.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreMatch {
    pub id: String,
    pub text: String,
    pub metadata: ChunkMetadata,
    /// Cosine similarity, higher is closer.
    pub score: f32,
}

/// Conjunction of metadata equality conditions. An empty filter matches
/// every record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
    conditions: BTreeMap<String, String>,
}

impl Filter {
    /// Filter matching everything.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Filter on a single `key == value` condition.
    #[must_use]
    pub fn eq(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::default().and(key, value)
    }

    /// Add a `key == value` condition.
    #[must_use]
    pub fn and(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.conditions.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    #[must_use]
    pub fn matches(&self, metadata: &ChunkMetadata) -> bool {
        self.conditions
            .iter()
            .all(|(key, value)| metadata.field(key).as_deref() == Some(value.as_str()))
    }
}

impl FromIterator<(String, String)> for Filter {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            conditions: iter.into_iter().collect(),
        }
    }
}

/// Trait for vector store backends (local file store, remote services, etc.).
pub trait VectorStore: Send + Sync {
    /// Insert or replace records by id.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the records cannot be persisted.
    fn upsert(&self, records: &[ChunkRecord]) -> Result<(), StoreError>;

    /// Up to `top_k` records matching `filter`, by descending similarity to
    /// `embedding`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the store cannot be read.
    fn query(
        &self,
        embedding: &[f32],
        top_k: usize,
        filter: &Filter,
    ) -> Result<Vec<StoreMatch>, StoreError>;

    /// Delete every record matching `filter`. Returns the number removed.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the store cannot be updated.
    fn delete(&self, filter: &Filter) -> Result<usize, StoreError>;

    /// Delete records by id. Unknown ids are ignored.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the store cannot be updated.
    fn delete_ids(&self, ids: &[String]) -> Result<usize, StoreError>;

    /// Metadata of every record matching `filter`, without text or vectors.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the store cannot be read.
    fn get_metadata(&self, filter: &Filter) -> Result<Vec<ChunkMetadata>, StoreError>;

    /// Metadata of every record in the store.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the store cannot be read.
    fn get_all_metadata(&self) -> Result<Vec<ChunkMetadata>, StoreError> {
        self.get_metadata(&Filter::all())
    }
}

/// Cosine similarity of two vectors; 0 for mismatched lengths or zero norms.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}
