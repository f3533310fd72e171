//! Cross-process lock files and atomic file replacement.
//!
//! The registry and the local vector store are plain files shared by every
//! CLI, MCP and library process on the machine. Writers hold a [`LockFile`]
//! for the whole read-modify-write and publish the result with
//! [`write_atomic`], so readers never observe a half-written file.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, SystemTime};

use tempfile::NamedTempFile;
use tracing::warn;

/// How long to wait for a lock before giving up.
const LOCK_TIMEOUT: Duration = Duration::from_secs(10);

/// Locks older than this are assumed to belong to a crashed process.
const STALE_AFTER: Duration = Duration::from_secs(30);

const RETRY_INTERVAL: Duration = Duration::from_millis(20);

/// Distinguishes stale-lock renames made by threads of this process.
static BREAK_SEQ: AtomicUsize = AtomicUsize::new(0);

/// An exclusive lock held by creating `<target>.lock`. Released on drop.
#[derive(Debug)]
pub struct LockFile {
    path: PathBuf,
}

impl LockFile {
    /// Acquire the lock guarding `target`, waiting up to 10 seconds.
    ///
    /// # Errors
    ///
    /// Returns `io::ErrorKind::TimedOut` if another holder keeps the lock,
    /// or any I/O error from creating the lock file.
    pub fn acquire(target: &Path) -> io::Result<Self> {
        let path = lock_path(target);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let started = SystemTime::now();
        loop {
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    // Holder pid, for humans inspecting a stuck lock.
                    let _ = write!(file, "{}", std::process::id());
                    return Ok(Self { path });
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    if is_stale(&path) && break_stale(&path) {
                        warn!(lock = %path.display(), "broke stale lock");
                        continue;
                    }
                    if started.elapsed().unwrap_or_default() > LOCK_TIMEOUT {
                        return Err(io::Error::new(
                            io::ErrorKind::TimedOut,
                            format!("timed out waiting for lock {}", path.display()),
                        ));
                    }
                    thread::sleep(RETRY_INTERVAL);
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl Drop for LockFile {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

fn lock_path(target: &Path) -> PathBuf {
    let mut name = target.file_name().unwrap_or_default().to_os_string();
    name.push(".lock");
    target.with_file_name(name)
}

fn is_stale(path: &Path) -> bool {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|modified| modified.elapsed().ok())
        .is_some_and(|age| age > STALE_AFTER)
}

/// Remove a stale lock at `path`. The lock is first renamed to a name owned
/// by this call and its age checked again there, so a lock another process
/// has just recreated is put back instead of deleted.
fn break_stale(path: &Path) -> bool {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(format!(
        ".stale.{}.{}",
        std::process::id(),
        BREAK_SEQ.fetch_add(1, Ordering::Relaxed)
    ));
    let aside = path.with_file_name(name);

    if fs::rename(path, &aside).is_err() {
        // Someone else moved it first.
        return false;
    }
    if is_stale(&aside) {
        let _ = fs::remove_file(&aside);
        return true;
    }

    // hard_link fails if a new lock already took the name.
    let _ = fs::hard_link(&aside, path);
    let _ = fs::remove_file(&aside);
    false
}

/// Replace `path` with `contents` atomically: write a temp file in the same
/// directory, then rename it over the target.
///
/// # Errors
///
/// Returns any I/O error from creating, writing or renaming the temp file.
pub fn write_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir)?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(contents)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
