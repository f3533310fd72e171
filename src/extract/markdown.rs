//! Markdown to plain text.

use std::fs;
use std::path::Path;

use pulldown_cmark::{Event, Parser, TagEnd};

use crate::extract::{ExtractError, TextExtractor};

/// Renders `.md` files to plain text, dropping markup.
pub struct MarkdownExtractor;

impl TextExtractor for MarkdownExtractor {
    fn extract(&self, path: &Path) -> Result<String, ExtractError> {
        let source = fs::read_to_string(path).map_err(|e| ExtractError::failed(path, e))?;
        Ok(to_plain_text(&source))
    }
}

/// Strip markdown syntax, keeping text and inline code.
#[must_use]
pub fn to_plain_text(markdown: &str) -> String {
    let mut plain = String::new();

    for event in Parser::new(markdown) {
        match event {
            Event::Text(text) | Event::Code(text) => plain.push_str(&text),
            Event::SoftBreak | Event::HardBreak => plain.push(' '),
            Event::End(
                TagEnd::Paragraph | TagEnd::Heading(_) | TagEnd::Item | TagEnd::CodeBlock,
            ) => plain.push('\n'),
            _ => {}
        }
    }

    plain.trim().to_string()
}
