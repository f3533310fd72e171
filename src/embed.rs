//! Embedding capability and the offline hashing embedder.

use std::hash::{Hash, Hasher};

use serde::Deserialize;
use twox_hash::XxHash64;

use crate::error::{Result, VaultError};

/// Default embedding width.
pub const DEFAULT_DIMENSION: usize = 384;

/// Embedding settings, loaded from the `[embedding]` config section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct EmbeddingSettings {
    #[serde(default = "default_dimension")]
    pub dimension: usize,
}

fn default_dimension() -> usize {
    DEFAULT_DIMENSION
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            dimension: DEFAULT_DIMENSION,
        }
    }
}

/// Maps texts to fixed-width vectors.
pub trait Embedder: Send + Sync {
    /// Width of every vector this embedder returns.
    fn dimension(&self) -> usize;

    /// Embed each text. The output is one-to-one and in order with `texts`.
    ///
    /// # Errors
    ///
    /// Returns `VaultError::Embedding` if the model fails.
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Bag-of-words embedder using feature hashing.
///
/// Each lowercased alphanumeric token is hashed into one of `dimension`
/// buckets with a hash-derived sign, and the vector is L2-normalised. Texts
/// sharing vocabulary land close together under cosine similarity. Needs no
/// model files, so it works offline and in tests.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    #[must_use]
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0f32; self.dimension];

        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let mut hasher = XxHash64::with_seed(0);
            token.to_lowercase().hash(&mut hasher);
            let h = hasher.finish();

            #[allow(clippy::cast_possible_truncation)]
            let bucket = (h % self.dimension as u64) as usize;
            let sign = if h >> 63 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut vector {
                *x /= norm;
            }
        }
        vector
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_DIMENSION)
    }
}

impl Embedder for HashingEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}

/// Embed `texts` and check the embedder kept its one-to-one contract.
pub(crate) fn embed_checked(embedder: &dyn Embedder, texts: &[String]) -> Result<Vec<Vec<f32>>> {
    let vectors = embedder.embed(texts)?;
    if vectors.len() != texts.len() {
        return Err(VaultError::Embedding(format!(
            "expected {} vectors, got {}",
            texts.len(),
            vectors.len()
        )));
    }
    if let Some(bad) = vectors.iter().find(|v| v.len() != embedder.dimension()) {
        return Err(VaultError::Embedding(format!(
            "expected dimension {}, got {}",
            embedder.dimension(),
            bad.len()
        )));
    }
    Ok(vectors)
}
