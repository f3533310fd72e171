//! CLI interface for ctxvault.
//!
//! Provides command-line argument parsing using clap.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::engine::DEFAULT_TOP_K;

/// Command-line interface for ctxvault.
#[derive(Parser)]
#[command(name = "ctxvault")]
#[command(author, version, about = "Semantic document vaults", long_about = None)]
pub struct Cli {
    /// The subcommand to run.
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Create a new vault.
    Init {
        /// Vault name (letters, numbers, hyphens and underscores).
        name: String,

        /// Directory holding the vault's documents.
        /// Defaults to a directory under the ctxvault home.
        #[arg(short, long)]
        path: Option<PathBuf>,
    },

    /// Index a file or directory of a vault.
    Index {
        /// Vault name.
        name: String,

        /// File or directory to index (default: the whole vault).
        #[arg(short, long)]
        path: Option<PathBuf>,
    },

    /// Drop and rebuild the index of a file or directory.
    Reindex {
        /// Vault name.
        name: String,

        /// File or directory to reindex (default: the whole vault).
        #[arg(short, long)]
        path: Option<PathBuf>,
    },

    /// Remove a file or directory from a vault's index.
    Delete {
        /// Vault name.
        name: String,

        /// File or directory to remove. It need not exist on disk.
        #[arg(short, long)]
        path: PathBuf,
    },

    /// Semantic search over a vault.
    Query {
        /// Vault name.
        name: String,

        /// The query text.
        text: String,

        /// Maximum number of chunks to return.
        #[arg(short = 'k', long, default_value_t = DEFAULT_TOP_K)]
        top_k: usize,

        /// Restrict results by metadata, as key=value (repeatable).
        #[arg(short, long = "filter")]
        filters: Vec<String>,
    },

    /// List the documents indexed in a vault.
    Docs {
        /// Vault name.
        name: String,
    },

    /// List all vaults.
    Vaults,

    /// Write a new document into a vault and index it.
    Write {
        /// Vault name.
        name: String,

        /// Path inside the vault (.txt, .md or .docx).
        path: PathBuf,

        /// Read content from file instead of stdin.
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Replace the document if it already exists.
        #[arg(long)]
        overwrite: bool,

        /// Record who produced the content.
        #[arg(long)]
        generated_by: Option<String>,
    },

    /// Start the MCP server for AI agent integration.
    #[cfg(feature = "mcp")]
    Serve,
}
