//! Integration tests for the vault engine.
//!
//! Each test builds its own registry home and vault roots inside temporary
//! directories, so tests never share state.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;

use ctxvault::VaultError;
use ctxvault::cache::HandleCache;
use ctxvault::chunking::ChunkSettings;
use ctxvault::engine::{VaultEngine, WriteOptions};
use ctxvault::registry::{FileRegistry, STORE_DIR};
use ctxvault::store::Filter;
use tempfile::TempDir;

/// Test helper owning a registry home with a single vault named `notes`.
struct TestVault {
    _home: TempDir,
    engine: VaultEngine,
    root: PathBuf,
}

impl TestVault {
    fn new() -> Self {
        Self::with_chunking(ChunkSettings::default())
    }

    /// Vault whose engine uses small chunks so short texts span several.
    fn with_chunking(chunking: ChunkSettings) -> Self {
        let home = TempDir::new().expect("Failed to create temp dir");
        let registry = FileRegistry::new(home.path());
        let engine = VaultEngine::new(Arc::new(registry), Arc::new(HandleCache::new()))
            .with_chunking(chunking)
            .expect("Valid chunking");

        let vault = engine.init_vault("notes", None).expect("Failed to init vault");

        Self {
            _home: home,
            engine,
            root: vault.root_path,
        }
    }

    /// Write a file relative to the vault root and return its canonical path.
    fn write(&self, relative: &str, content: &str) -> PathBuf {
        let path = self.root.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create dir");
        }
        fs::write(&path, content).expect("Failed to write file");
        path.canonicalize().expect("Failed to canonicalize")
    }

    fn chunk_count(&self, source: &Path) -> usize {
        self.engine
            .list_documents("notes")
            .unwrap()
            .into_iter()
            .find(|d| d.source == source.to_string_lossy())
            .map_or(0, |d| d.chunks_count)
    }
}

fn small_chunks() -> ChunkSettings {
    ChunkSettings {
        chunk_size: 4,
        overlap: 1,
    }
}

// =============================================================================
// Vault lifecycle
// =============================================================================

mod vault_lifecycle_tests {
    use super::*;

    #[test]
    fn init_creates_root_and_store() {
        let vault = TestVault::new();

        assert!(vault.root.is_dir());
        assert!(vault.root.join(STORE_DIR).is_dir());
        assert_eq!(vault.engine.list_vaults().unwrap(), vec!["notes"]);
    }

    #[test]
    fn duplicate_vault_is_rejected() {
        let vault = TestVault::new();

        let err = vault.engine.init_vault("notes", None).unwrap_err();
        assert!(matches!(err, VaultError::VaultAlreadyExists(ref name) if name == "notes"));
    }

    #[test]
    fn init_at_explicit_path() {
        let vault = TestVault::new();
        let elsewhere = TempDir::new().unwrap();
        let target = elsewhere.path().join("work-docs");

        let config = vault.engine.init_vault("work", Some(&target)).unwrap();

        assert_eq!(config.root_path, target.canonicalize().unwrap());
        assert_eq!(vault.engine.list_vaults().unwrap(), vec!["notes", "work"]);
    }

    #[test]
    fn shared_root_is_rejected() {
        let vault = TestVault::new();

        let err = vault.engine.init_vault("work", Some(&vault.root)).unwrap_err();

        assert!(
            matches!(err, VaultError::VaultRootInUse { ref vault, .. } if vault == "notes"),
            "got {err:?}"
        );
        assert_eq!(vault.engine.list_vaults().unwrap(), vec!["notes"]);
    }

    #[test]
    fn invalid_name_is_rejected() {
        let vault = TestVault::new();
        let err = vault.engine.init_vault("../escape", None).unwrap_err();
        assert!(matches!(err, VaultError::InvalidVaultName(_)));
    }

    #[test]
    fn unknown_vault_is_not_found() {
        let vault = TestVault::new();

        assert!(matches!(
            vault.engine.index("missing", None),
            Err(VaultError::VaultNotFound(_))
        ));
        assert!(matches!(
            vault.engine.list_documents("missing"),
            Err(VaultError::VaultNotFound(_))
        ));
    }

    #[test]
    fn missing_store_is_not_initialized() {
        let vault = TestVault::new();
        fs::remove_dir_all(vault.root.join(STORE_DIR)).unwrap();

        let err = vault.engine.query("notes", "anything", 5, None).unwrap_err();
        assert!(matches!(err, VaultError::VaultNotInitialized { .. }));
    }
}

// =============================================================================
// Indexing
// =============================================================================

mod index_tests {
    use super::*;

    #[test]
    fn index_whole_vault() {
        let vault = TestVault::new();
        let a = vault.write("a.txt", "cats purr softly");
        let b = vault.write("sub/b.md", "# Dogs\n\nDogs bark loudly.");
        vault.write("ignored.xyz", "not a supported type");

        let outcome = vault.engine.index("notes", None).unwrap();

        assert_eq!(outcome.succeeded, vec![a.clone(), b.clone()]);
        assert!(outcome.skipped.is_empty());

        let docs = vault.engine.list_documents("notes").unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].source, a.to_string_lossy());
        assert_eq!(docs[0].filetype, "txt");
        assert_eq!(docs[1].source, b.to_string_lossy());
        assert_eq!(docs[1].filetype, "md");
    }

    #[test]
    fn relative_path_resolves_against_root() {
        let vault = TestVault::new();
        let a = vault.write("sub/a.txt", "alpha");
        vault.write("b.txt", "beta");

        let outcome = vault.engine.index("notes", Some(Path::new("sub"))).unwrap();

        assert_eq!(outcome.succeeded, vec![a]);
    }

    #[test]
    fn index_is_idempotent() {
        let vault = TestVault::with_chunking(small_chunks());
        let file = vault.write("a.txt", "one two three four five six seven eight nine ten");

        vault.engine.index("notes", None).unwrap();
        let first = vault.chunk_count(&file);
        vault.engine.index("notes", None).unwrap();

        assert_eq!(first, 3);
        assert_eq!(vault.chunk_count(&file), first);
    }

    #[test]
    fn shrinking_file_drops_stale_chunks() {
        let vault = TestVault::with_chunking(small_chunks());
        let file = vault.write(
            "a.txt",
            "one two three four five six seven eight nine ten eleven twelve",
        );
        vault.engine.index("notes", None).unwrap();
        assert_eq!(vault.chunk_count(&file), 4);

        fs::write(&file, "one two three four five").unwrap();
        vault.engine.index("notes", Some(&file)).unwrap();

        assert_eq!(vault.chunk_count(&file), 2);
        let hits = vault.engine.query("notes", "twelve", 10, None).unwrap();
        assert!(hits.iter().all(|h| h.chunk_index < 2));
        assert!(hits.iter().all(|h| !h.text.contains("twelve")));
    }

    #[test]
    fn empty_file_has_no_chunks() {
        let vault = TestVault::new();
        let file = vault.write("empty.txt", "   \n\t ");

        let outcome = vault.engine.index("notes", None).unwrap();

        assert_eq!(outcome.succeeded, vec![file]);
        assert!(vault.engine.list_documents("notes").unwrap().is_empty());
    }

    #[test]
    fn emptied_file_clears_its_chunks() {
        let vault = TestVault::new();
        let file = vault.write("a.txt", "some words here");
        vault.engine.index("notes", None).unwrap();

        fs::write(&file, "").unwrap();
        vault.engine.index("notes", None).unwrap();

        assert!(vault.engine.list_documents("notes").unwrap().is_empty());
    }

    #[test]
    fn unsupported_file_is_skipped() {
        let vault = TestVault::new();
        vault.write("data.xyz", "content");

        let outcome = vault
            .engine
            .index("notes", Some(Path::new("data.xyz")))
            .unwrap();

        assert!(outcome.succeeded.is_empty());
        assert_eq!(outcome.skipped.len(), 1);
        assert!(matches!(
            outcome.skipped[0].reason,
            VaultError::UnsupportedFileType(ref ext) if ext == ".xyz"
        ));
    }

    #[test]
    fn file_outside_vault_is_skipped() {
        let vault = TestVault::new();
        let outside = TempDir::new().unwrap();
        let file = outside.path().join("x.txt");
        fs::write(&file, "outside words").unwrap();

        let outcome = vault.engine.index("notes", Some(&file)).unwrap();

        assert!(outcome.succeeded.is_empty());
        assert!(matches!(
            outcome.skipped[0].reason,
            VaultError::FileOutsideVault(_)
        ));
        assert!(vault.engine.list_documents("notes").unwrap().is_empty());
    }

    #[test]
    fn outside_directory_is_skipped_without_walking() {
        let vault = TestVault::new();
        let outside = TempDir::new().unwrap();
        fs::create_dir_all(outside.path().join("deep")).unwrap();
        fs::write(outside.path().join("a.txt"), "outside words").unwrap();
        fs::write(outside.path().join("deep/b.md"), "more outside words").unwrap();

        let outcome = vault.engine.index("notes", Some(outside.path())).unwrap();

        assert!(outcome.succeeded.is_empty());
        assert_eq!(outcome.skipped.len(), 1);
        assert_eq!(
            outcome.skipped[0].path,
            outside.path().canonicalize().unwrap()
        );
        assert!(matches!(
            outcome.skipped[0].reason,
            VaultError::FileOutsideVault(_)
        ));
    }

    #[test]
    fn directory_containing_root_indexes_only_the_vault() {
        let home = TempDir::new().unwrap();
        let parent = TempDir::new().unwrap();
        let root = parent.path().join("vault");
        fs::write(parent.path().join("sibling.txt"), "not in the vault").unwrap();

        let engine = VaultEngine::new(
            Arc::new(FileRegistry::new(home.path())),
            Arc::new(HandleCache::new()),
        );
        engine.init_vault("notes", Some(&root)).unwrap();
        fs::write(root.join("inside.txt"), "vault words").unwrap();

        let outcome = engine.index("notes", Some(parent.path())).unwrap();

        assert_eq!(
            outcome.succeeded,
            vec![root.join("inside.txt").canonicalize().unwrap()]
        );
        assert!(outcome.skipped.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn symlink_to_outside_file_is_skipped() {
        let vault = TestVault::new();
        let inside = vault.write("inside.txt", "vault words");
        let outside = TempDir::new().unwrap();
        let secret = outside.path().join("secret.txt");
        fs::write(&secret, "outside words").unwrap();
        std::os::unix::fs::symlink(&secret, vault.root.join("link.txt")).unwrap();

        let outcome = vault.engine.index("notes", None).unwrap();

        assert_eq!(outcome.succeeded, vec![inside]);
        assert_eq!(outcome.skipped.len(), 1);
        assert!(matches!(
            outcome.skipped[0].reason,
            VaultError::FileOutsideVault(_)
        ));
        assert_eq!(vault.engine.list_documents("notes").unwrap().len(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_outside_directory_is_not_walked() {
        let vault = TestVault::new();
        let inside = vault.write("inside.txt", "vault words");
        let outside = TempDir::new().unwrap();
        fs::write(outside.path().join("a.txt"), "outside words").unwrap();
        fs::write(outside.path().join("b.txt"), "more outside words").unwrap();
        let link = vault.root.join("shared");
        std::os::unix::fs::symlink(outside.path(), &link).unwrap();

        let outcome = vault.engine.index("notes", None).unwrap();

        assert_eq!(outcome.succeeded, vec![inside]);
        assert_eq!(outcome.skipped.len(), 1);
        assert_eq!(outcome.skipped[0].path, link);
        assert!(matches!(
            outcome.skipped[0].reason,
            VaultError::FileOutsideVault(_)
        ));
    }

    #[test]
    fn missing_path_is_skipped() {
        let vault = TestVault::new();

        let outcome = vault
            .engine
            .index("notes", Some(Path::new("nope.txt")))
            .unwrap();

        assert!(matches!(
            outcome.skipped[0].reason,
            VaultError::PathNotFound(_)
        ));
    }

    #[test]
    fn corrupt_document_is_skipped_and_batch_continues() {
        let vault = TestVault::new();
        let good = vault.write("good.txt", "fine text");
        fs::write(vault.root.join("broken.txt"), [0xff, 0xfe, 0x00, 0x80]).unwrap();

        let outcome = vault.engine.index("notes", None).unwrap();

        assert_eq!(outcome.succeeded, vec![good]);
        assert_eq!(outcome.skipped.len(), 1);
        assert!(matches!(
            outcome.skipped[0].reason,
            VaultError::ExtractionFailure { .. }
        ));
    }

    #[test]
    fn concurrent_index_of_different_files() {
        let vault = TestVault::new();
        let files: Vec<PathBuf> = (0..4)
            .map(|i| vault.write(&format!("f{i}.txt"), &format!("document number {i}")))
            .collect();
        let engine = Arc::new(vault.engine);

        let handles: Vec<_> = files
            .iter()
            .cloned()
            .map(|file| {
                let engine = Arc::clone(&engine);
                thread::spawn(move || engine.index("notes", Some(&file)).unwrap())
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap().succeeded.len(), 1);
        }

        assert_eq!(engine.list_documents("notes").unwrap().len(), 4);
    }
}

// =============================================================================
// Reindex and delete
// =============================================================================

mod reindex_delete_tests {
    use super::*;

    #[test]
    fn reindex_rebuilds_document() {
        let vault = TestVault::with_chunking(small_chunks());
        let file = vault.write("a.txt", "one two three four five six seven");
        vault.engine.index("notes", None).unwrap();

        fs::write(&file, "one two").unwrap();
        let outcome = vault.engine.reindex("notes", Some(&file)).unwrap();

        assert_eq!(outcome.succeeded, vec![file.clone()]);
        assert_eq!(vault.chunk_count(&file), 1);
    }

    #[test]
    fn reindex_drops_removed_files() {
        let vault = TestVault::new();
        let keep = vault.write("keep.txt", "kept");
        let gone = vault.write("gone.txt", "soon removed");
        vault.engine.index("notes", None).unwrap();

        fs::remove_file(&gone).unwrap();
        let outcome = vault.engine.reindex("notes", None).unwrap();

        assert!(outcome.succeeded.contains(&keep));
        assert!(outcome.succeeded.contains(&gone));
        let docs = vault.engine.list_documents("notes").unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].source, keep.to_string_lossy());
    }

    #[test]
    fn delete_file_removes_its_chunks() {
        let vault = TestVault::new();
        let a = vault.write("a.txt", "alpha words");
        let b = vault.write("b.txt", "beta words");
        vault.engine.index("notes", None).unwrap();

        let outcome = vault.engine.delete("notes", Some(&a)).unwrap();

        assert_eq!(outcome.succeeded, vec![a]);
        let docs = vault.engine.list_documents("notes").unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].source, b.to_string_lossy());
    }

    #[test]
    fn delete_directory_removes_documents_under_it() {
        let vault = TestVault::new();
        let a = vault.write("sub/a.txt", "alpha");
        let b = vault.write("sub/deeper/b.txt", "beta");
        vault.write("c.txt", "gamma");
        vault.engine.index("notes", None).unwrap();

        let outcome = vault.engine.delete("notes", Some(Path::new("sub"))).unwrap();

        assert_eq!(outcome.succeeded, vec![a, b]);
        assert_eq!(vault.engine.list_documents("notes").unwrap().len(), 1);
    }

    #[test]
    fn delete_works_after_file_is_gone() {
        let vault = TestVault::new();
        let file = vault.write("a.txt", "alpha");
        vault.engine.index("notes", None).unwrap();
        fs::remove_file(&file).unwrap();

        let outcome = vault.engine.delete("notes", Some(&file)).unwrap();

        assert_eq!(outcome.succeeded, vec![file]);
        assert!(vault.engine.list_documents("notes").unwrap().is_empty());
    }

    #[test]
    fn delete_unindexed_is_skipped() {
        let vault = TestVault::new();
        vault.write("a.txt", "never indexed");

        let outcome = vault
            .engine
            .delete("notes", Some(Path::new("a.txt")))
            .unwrap();

        assert!(outcome.succeeded.is_empty());
        assert!(matches!(
            outcome.skipped[0].reason,
            VaultError::NotIndexed(_)
        ));
    }

    #[test]
    fn delete_without_path_does_nothing() {
        let vault = TestVault::new();
        vault.write("a.txt", "alpha");
        vault.engine.index("notes", None).unwrap();

        let outcome = vault.engine.delete("notes", None).unwrap();

        assert!(outcome.succeeded.is_empty());
        assert!(outcome.skipped.is_empty());
        assert_eq!(vault.engine.list_documents("notes").unwrap().len(), 1);
    }

    #[test]
    fn delete_outside_vault_is_skipped() {
        let vault = TestVault::new();
        let outside = TempDir::new().unwrap();

        let outcome = vault
            .engine
            .delete("notes", Some(&outside.path().join("x.txt")))
            .unwrap();

        assert!(matches!(
            outcome.skipped[0].reason,
            VaultError::FileOutsideVault(_)
        ));
    }
}

// =============================================================================
// Query
// =============================================================================

mod query_tests {
    use super::*;

    #[test]
    fn query_ranks_matching_document_first() {
        let vault = TestVault::new();
        let cats = vault.write("cats.txt", "cats purr and cats nap in the sun");
        vault.write("markets.txt", "stock markets fell sharply on tuesday");
        vault.engine.index("notes", None).unwrap();

        let hits = vault.engine.query("notes", "cats nap", 5, None).unwrap();

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].source, cats.to_string_lossy());
        assert_eq!(hits[0].chunk_index, 0);
        assert!(hits[0].score > hits[1].score);
    }

    #[test]
    fn query_respects_top_k() {
        let vault = TestVault::new();
        for i in 0..4 {
            vault.write(&format!("f{i}.txt"), "shared words everywhere");
        }
        vault.engine.index("notes", None).unwrap();

        assert_eq!(vault.engine.query("notes", "shared", 2, None).unwrap().len(), 2);
        assert!(vault.engine.query("notes", "shared", 0, None).unwrap().is_empty());
    }

    #[test]
    fn query_with_filter() {
        let vault = TestVault::new();
        vault.write("a.txt", "rust ownership rules");
        let md = vault.write("b.md", "rust ownership notes");
        vault.engine.index("notes", None).unwrap();

        let filter = Filter::eq("filetype", "md");
        let hits = vault
            .engine
            .query("notes", "rust ownership", 5, Some(&filter))
            .unwrap();

        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].source, md.to_string_lossy());
    }

    #[test]
    fn empty_query_is_rejected() {
        let vault = TestVault::new();

        assert!(matches!(
            vault.engine.query("notes", "   ", 5, None),
            Err(VaultError::EmptyQuery)
        ));
    }

    #[test]
    fn unknown_vault_wins_over_empty_query() {
        let vault = TestVault::new();

        assert!(matches!(
            vault.engine.query("missing", "", 5, None),
            Err(VaultError::VaultNotFound(_))
        ));
    }

    #[test]
    fn empty_vault_returns_no_hits() {
        let vault = TestVault::new();
        assert!(vault.engine.query("notes", "anything", 5, None).unwrap().is_empty());
    }
}

// =============================================================================
// Writing documents
// =============================================================================

mod write_tests {
    use super::*;

    #[test]
    fn write_creates_and_indexes() {
        let vault = TestVault::new();
        let options = WriteOptions {
            overwrite: false,
            generated_by: Some("planner".to_string()),
        };

        let written = vault
            .engine
            .write_document("notes", Path::new("agents/plan.md"), "# Plan\n\nShip it.", &options)
            .unwrap();

        assert_eq!(written.path, vault.root.join("agents/plan.md"));
        assert_eq!(written.chunks, 1);

        let filter = Filter::eq("generated_by", "planner");
        let hits = vault.engine.query("notes", "plan", 5, Some(&filter)).unwrap();
        assert_eq!(hits.len(), 1);
        assert!(hits[0].text.contains("Ship it."));
    }

    #[test]
    fn existing_file_needs_overwrite() {
        let vault = TestVault::new();
        vault.write("a.txt", "original");

        let err = vault
            .engine
            .write_document("notes", Path::new("a.txt"), "new", &WriteOptions::default())
            .unwrap_err();
        assert!(matches!(err, VaultError::FileAlreadyExists(_)));
        assert_eq!(fs::read_to_string(vault.root.join("a.txt")).unwrap(), "original");

        let options = WriteOptions {
            overwrite: true,
            generated_by: None,
        };
        vault
            .engine
            .write_document("notes", Path::new("a.txt"), "replaced", &options)
            .unwrap();
        assert_eq!(fs::read_to_string(vault.root.join("a.txt")).unwrap(), "replaced");
    }

    #[test]
    fn escaping_paths_are_rejected() {
        let vault = TestVault::new();
        let options = WriteOptions::default();

        for path in ["../escape.md", "/tmp/abs.md", ".index/sneaky.md"] {
            let err = vault
                .engine
                .write_document("notes", Path::new(path), "x", &options)
                .unwrap_err();
            assert!(
                matches!(err, VaultError::FileOutsideVault(_)),
                "{path} should be rejected, got {err:?}"
            );
        }
    }

    #[cfg(unix)]
    #[test]
    fn symlink_into_store_is_rejected() {
        let vault = TestVault::new();
        std::os::unix::fs::symlink(vault.root.join(STORE_DIR), vault.root.join("link")).unwrap();

        let err = vault
            .engine
            .write_document("notes", Path::new("link/x.md"), "x", &WriteOptions::default())
            .unwrap_err();

        assert!(matches!(err, VaultError::FileOutsideVault(_)), "got {err:?}");
        assert!(!vault.root.join(STORE_DIR).join("x.md").exists());
    }

    #[test]
    fn unwritable_format_is_rejected() {
        let vault = TestVault::new();

        let err = vault
            .engine
            .write_document("notes", Path::new("report.pdf"), "x", &WriteOptions::default())
            .unwrap_err();

        assert!(matches!(err, VaultError::UnsupportedFileType(ref ext) if ext == ".pdf"));
        assert!(!vault.root.join("report.pdf").exists());
    }

    #[cfg(feature = "documents")]
    #[test]
    fn docx_round_trips_through_index() {
        let vault = TestVault::new();

        let written = vault
            .engine
            .write_document(
                "notes",
                Path::new("memo.docx"),
                "Quarterly memo about budgets",
                &WriteOptions::default(),
            )
            .unwrap();

        assert_eq!(written.chunks, 1);
        let hits = vault.engine.query("notes", "budgets", 1, None).unwrap();
        assert!(hits[0].text.contains("budgets"));
    }
}
