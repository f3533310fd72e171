//! Plain text extraction.

use std::fs;
use std::path::Path;

use crate::extract::{ExtractError, TextExtractor};

/// Reads `.txt` files as UTF-8.
pub struct PlainTextExtractor;

impl TextExtractor for PlainTextExtractor {
    fn extract(&self, path: &Path) -> Result<String, ExtractError> {
        fs::read_to_string(path).map_err(|e| ExtractError::failed(path, e))
    }
}
