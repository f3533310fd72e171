//! Command implementations shared by CLI and MCP server.
//!
//! The front ends build one [`VaultEngine`] from the loaded [`Config`] and
//! render engine results with the formatters below.

use std::fmt::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::cache::HandleCache;
use crate::config::Config;
use crate::embed::HashingEmbedder;
use crate::engine::{BatchOutcome, DocumentInfo, QueryHit, VaultEngine};
use crate::registry::{FileRegistry, VaultConfig};
use crate::store::Filter;

/// Longest chunk preview printed for a query hit.
const PREVIEW_CHARS: usize = 300;

/// Build the engine described by `config`: the file registry under the
/// ctxvault home, a fresh handle cache, and the hashing embedder.
///
/// # Errors
///
/// Returns an error if the chunking settings are invalid.
pub fn open_engine(config: &Config) -> anyhow::Result<VaultEngine> {
    let registry = FileRegistry::new(&config.home_dir());
    let embedder = HashingEmbedder::new(config.embedding.dimension);

    let engine = VaultEngine::new(Arc::new(registry), Arc::new(HandleCache::new()))
        .with_embedder(Arc::new(embedder))
        .with_chunking(config.chunking)?;

    Ok(engine)
}

/// Parse `key=value` pairs into an equality filter.
///
/// Returns `None` when no pairs are given. Whitespace around keys and values
/// is trimmed; a later pair for the same key wins.
///
/// # Errors
///
/// Returns an error for a pair without `=` or with an empty key.
pub fn parse_filter(pairs: &[String]) -> anyhow::Result<Option<Filter>> {
    if pairs.is_empty() {
        return Ok(None);
    }

    let mut filter = Filter::all();
    for pair in pairs {
        let Some((key, value)) = pair.split_once('=') else {
            anyhow::bail!("Invalid filter '{pair}': expected key=value");
        };
        let key = key.trim();
        if key.is_empty() {
            anyhow::bail!("Invalid filter '{pair}': key cannot be empty");
        }
        filter = filter.and(key, value.trim());
    }

    Ok(Some(filter))
}

/// Resolve a path given on the command line against `cwd`.
#[must_use]
pub fn resolve_against(cwd: &Path, path: Option<PathBuf>) -> Option<PathBuf> {
    path.map(|p| if p.is_absolute() { p } else { cwd.join(p) })
}

/// Render a batch outcome as one line per file followed by the totals.
#[must_use]
pub fn format_outcome(verb: &str, outcome: &BatchOutcome) -> String {
    let mut output = String::new();
    for path in &outcome.succeeded {
        let _ = writeln!(output, "{verb}: {}", path.display());
    }
    for skipped in &outcome.skipped {
        let _ = writeln!(
            output,
            "Skipped: {} ({})",
            skipped.path.display(),
            skipped.reason
        );
    }
    let _ = writeln!(output, "\n{verb}: {}", outcome.succeeded.len());
    let _ = write!(output, "Skipped: {}", outcome.skipped.len());
    output
}

/// Render query hits with score, source and a preview of the chunk.
#[must_use]
pub fn format_hits(hits: &[QueryHit]) -> String {
    if hits.is_empty() {
        return "No results found.".to_string();
    }

    let rule = "─".repeat(80);
    let mut output = format!("Found {} chunks\n{rule}\n", hits.len());
    for (idx, hit) in hits.iter().enumerate() {
        let _ = writeln!(output, "\n[{}] score: {:.3}", idx + 1, hit.score);
        let _ = writeln!(output, "    ▸ {} (chunk {})", hit.source, hit.chunk_index);
        let _ = writeln!(output, "    {}", preview(&hit.text));
    }
    let _ = write!(output, "\n{rule}");
    output
}

/// Render a vault's documents as a numbered list.
#[must_use]
pub fn format_documents(documents: &[DocumentInfo]) -> String {
    let mut output = format!("Found {} documents\n", documents.len());
    for (idx, doc) in documents.iter().enumerate() {
        let _ = write!(
            output,
            "\n{}. {} ({} chunks)",
            idx + 1,
            doc.source,
            doc.chunks_count
        );
    }
    output
}

/// Render vault names, one per line.
#[must_use]
pub fn format_vaults(vaults: &[String]) -> String {
    let mut output = format!("Found {} vaults\n", vaults.len());
    for name in vaults {
        let _ = write!(output, "\n>{name}");
    }
    output
}

/// Render a freshly created vault.
#[must_use]
pub fn format_init(name: &str, vault: &VaultConfig, registry: &Path) -> String {
    format!(
        "Context vault '{name}' initialized\nVault path: {}\nRegistry: {}",
        vault.root_path.display(),
        registry.display()
    )
}

/// Collapse whitespace and cut the text to [`PREVIEW_CHARS`] characters.
fn preview(text: &str) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= PREVIEW_CHARS {
        return flat;
    }
    let cut: String = flat.chars().take(PREVIEW_CHARS).collect();
    format!("{cut}...")
}
