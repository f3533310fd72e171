//! Text extraction, one extractor per supported file extension.
//!
//! The engine looks extractors up by extension through [`ExtractorRegistry`];
//! unknown extensions produce [`ExtractError::Unsupported`] instead of
//! falling through to a default.

#[cfg(feature = "documents")]
pub mod docx;
pub mod markdown;
#[cfg(feature = "documents")]
pub mod pdf;
pub mod text;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Extensions the default registry can extract, without the leading dot.
#[cfg(feature = "documents")]
pub const SUPPORTED_EXTENSIONS: &[&str] = &["txt", "md", "pdf", "docx"];

/// Extensions the default registry can extract, without the leading dot.
#[cfg(not(feature = "documents"))]
pub const SUPPORTED_EXTENSIONS: &[&str] = &["txt", "md"];

/// Errors that can occur during extraction.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Unsupported file type: '{0}'")]
    Unsupported(String),

    #[error("Failed to extract {}: {reason}", path.display())]
    Failed { path: PathBuf, reason: String },
}

impl ExtractError {
    pub(crate) fn failed(path: &Path, reason: impl ToString) -> Self {
        Self::Failed {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        }
    }
}

/// Turns a file of one format into plain text.
pub trait TextExtractor: Send + Sync {
    /// Extract the text content of `path`.
    ///
    /// # Errors
    ///
    /// Returns `ExtractError::Failed` if the file cannot be read or parsed.
    fn extract(&self, path: &Path) -> Result<String, ExtractError>;
}

/// Lowercased extension of `path`, or an empty string if it has none.
#[must_use]
pub fn file_extension(path: &Path) -> String {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

/// Lookup table from extension to extractor.
pub struct ExtractorRegistry {
    extractors: HashMap<String, Box<dyn TextExtractor>>,
}

impl ExtractorRegistry {
    /// An empty registry.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            extractors: HashMap::new(),
        }
    }

    /// Register `extractor` for `extension` (without the dot), replacing any
    /// previous one.
    pub fn register(&mut self, extension: &str, extractor: Box<dyn TextExtractor>) {
        self.extractors
            .insert(extension.to_lowercase(), extractor);
    }

    #[must_use]
    pub fn supports(&self, path: &Path) -> bool {
        self.extractors.contains_key(&file_extension(path))
    }

    /// Extract `path` with the extractor registered for its extension.
    ///
    /// # Errors
    ///
    /// Returns `ExtractError::Unsupported` if no extractor is registered for
    /// the extension, or the extractor's own error.
    pub fn extract(&self, path: &Path) -> Result<String, ExtractError> {
        let ext = file_extension(path);
        let extractor = self
            .extractors
            .get(&ext)
            .ok_or_else(|| ExtractError::Unsupported(format!(".{ext}")))?;
        extractor.extract(path)
    }
}

impl Default for ExtractorRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register("txt", Box::new(text::PlainTextExtractor));
        registry.register("md", Box::new(markdown::MarkdownExtractor));
        #[cfg(feature = "documents")]
        {
            registry.register("pdf", Box::new(pdf::PdfExtractor));
            registry.register("docx", Box::new(docx::DocxExtractor));
        }
        registry
    }
}
