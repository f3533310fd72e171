//! PDF extraction using pdf-extract.

use std::fs;
use std::path::Path;

use crate::extract::{ExtractError, TextExtractor};

/// Extracts the text layer of `.pdf` files. Scanned pages without a text
/// layer produce no text.
pub struct PdfExtractor;

impl TextExtractor for PdfExtractor {
    fn extract(&self, path: &Path) -> Result<String, ExtractError> {
        let bytes = fs::read(path).map_err(|e| ExtractError::failed(path, e))?;

        let text = pdf_extract::extract_text_from_mem(&bytes)
            .map_err(|e| ExtractError::failed(path, e))?;

        // Pages are separated by form feeds.
        Ok(text
            .split('\x0C')
            .map(str::trim)
            .filter(|page| !page.is_empty())
            .collect::<Vec<_>>()
            .join("\n"))
    }
}
