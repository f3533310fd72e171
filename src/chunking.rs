//! Word-window chunking with overlap.

use serde::Deserialize;

use crate::error::{Result, VaultError};

/// Default number of words per chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 700;

/// Default number of words shared by consecutive chunks.
pub const DEFAULT_OVERLAP: usize = 100;

/// Chunking parameters, loaded from the `[chunking]` config section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ChunkSettings {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_overlap")]
    pub overlap: usize,
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_overlap() -> usize {
    DEFAULT_OVERLAP
}

impl Default for ChunkSettings {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_OVERLAP,
        }
    }
}

impl ChunkSettings {
    /// Check that `overlap < chunk_size` and `chunk_size > 0`.
    ///
    /// # Errors
    ///
    /// Returns `VaultError::InvalidChunkConfig` otherwise.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 || self.overlap >= self.chunk_size {
            return Err(VaultError::InvalidChunkConfig {
                chunk_size: self.chunk_size,
                overlap: self.overlap,
            });
        }
        Ok(())
    }

    /// Split `text` using these settings.
    ///
    /// # Errors
    ///
    /// Returns `VaultError::InvalidChunkConfig` if the settings are invalid.
    pub fn split(&self, text: &str) -> Result<Vec<String>> {
        chunk(text, self.chunk_size, self.overlap)
    }
}

/// Split `text` into windows of `chunk_size` whitespace-delimited words,
/// advancing `chunk_size - overlap` words per step.
///
/// Words inside a chunk are re-joined with a single space. The last window
/// may be shorter; windowing stops as soon as a window reaches the final
/// word.
///
/// # Errors
///
/// Returns `VaultError::InvalidChunkConfig` if `chunk_size` is zero or
/// `overlap >= chunk_size`.
pub fn chunk(text: &str, chunk_size: usize, overlap: usize) -> Result<Vec<String>> {
    ChunkSettings {
        chunk_size,
        overlap,
    }
    .validate()?;

    let words: Vec<&str> = text.split_whitespace().collect();
    let step = chunk_size - overlap;
    let mut chunks = Vec::new();

    let mut start = 0;
    while start < words.len() {
        let end = (start + chunk_size).min(words.len());
        chunks.push(words[start..end].join(" "));
        if end == words.len() {
            break;
        }
        start += step;
    }

    Ok(chunks)
}
