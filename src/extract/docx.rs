//! DOCX reading and writing using docx-rs.

use std::fs::{self, File};
use std::path::Path;

use docx_rs::{Docx, DocumentChild, Paragraph, ParagraphChild, Run, RunChild, read_docx};

use crate::extract::{ExtractError, TextExtractor};

/// Extracts paragraph text from `.docx` files, one line per paragraph.
pub struct DocxExtractor;

impl TextExtractor for DocxExtractor {
    fn extract(&self, path: &Path) -> Result<String, ExtractError> {
        let buf = fs::read(path).map_err(|e| ExtractError::failed(path, e))?;
        let docx = read_docx(&buf).map_err(|e| ExtractError::failed(path, e))?;

        let mut content = String::new();
        for child in &docx.document.children {
            if let DocumentChild::Paragraph(para) = child {
                let mut para_text = String::new();
                for child in &para.children {
                    if let ParagraphChild::Run(run) = child {
                        for run_child in &run.children {
                            if let RunChild::Text(text) = run_child {
                                para_text.push_str(&text.text);
                            }
                        }
                    }
                }

                let para_text = para_text.trim();
                if !para_text.is_empty() {
                    content.push_str(para_text);
                    content.push('\n');
                }
            }
        }

        Ok(content.trim_end().to_string())
    }
}

/// Write `content` to `path` as a DOCX document, one paragraph per line.
///
/// # Errors
///
/// Returns an I/O error if the file cannot be created or packed.
pub fn write_docx(path: &Path, content: &str) -> std::io::Result<()> {
    let docx = content.lines().fold(Docx::new(), |docx, line| {
        docx.add_paragraph(Paragraph::new().add_run(Run::new().add_text(line)))
    });

    let file = File::create(path)?;
    docx.build()
        .pack(file)
        .map_err(|e| std::io::Error::other(e.to_string()))
}
