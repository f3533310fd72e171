//! ctxvault - semantic document vaults for people and agents.
//!
//! A vault is a named directory of documents paired with a vector index.
//! Documents are extracted to text, split into overlapping word chunks,
//! embedded, and stored with their provenance so they can be searched by
//! meaning, listed, reindexed and removed.
//!
//! # Modules
//!
//! - [`engine`] - Vault operations (index, reindex, delete, query, list, write)
//! - [`registry`] - Persistent vault name to location mapping
//! - [`cache`] - One open store handle per store location
//! - [`store`] - Vector store trait and the file-backed implementation
//! - [`extract`] - Text extraction per file type
//! - [`chunking`] - Word-window chunking
//! - [`embed`] - Embedding trait and the hashing embedder
//! - [`identity`] - Document and chunk identifiers
//! - [`storage`] - Writing raw content into a vault
//! - [`config`] - Configuration loading
//! - [`cli`] - Command-line interface definitions

pub mod cache;
pub mod chunking;
pub mod cli;
pub mod commands;
pub mod config;
pub mod durable;
pub mod embed;
pub mod engine;
pub mod error;
pub mod extract;
pub mod identity;
pub mod logging;
pub mod registry;
pub mod storage;
pub mod store;

#[cfg(feature = "mcp")]
pub mod mcp;

pub use engine::VaultEngine;
pub use error::{Result, VaultError};
