//! Process-wide cache of open vector store handles.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::store::local::LocalVectorStore;
use crate::store::{StoreError, VectorStore};

/// Opens the store at a location. Injected so tests and alternative
/// backends can control how handles are materialised.
pub type StoreOpener = dyn Fn(&Path) -> Result<Arc<dyn VectorStore>, StoreError> + Send + Sync;

type Slot = Arc<Mutex<Option<Arc<dyn VectorStore>>>>;

/// One store handle per store location for the lifetime of the cache.
///
/// The outer map lock is only held to find or insert a location's slot.
/// Materialisation happens under the slot's own lock, so concurrent first
/// callers for the same location wait for a single open while other
/// locations proceed. A failed open leaves the slot empty for the next
/// caller to retry.
pub struct HandleCache {
    opener: Box<StoreOpener>,
    slots: Mutex<HashMap<PathBuf, Slot>>,
}

impl HandleCache {
    /// Cache backed by [`LocalVectorStore`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_opener(|location| {
            Ok(Arc::new(LocalVectorStore::open(location)?) as Arc<dyn VectorStore>)
        })
    }

    /// Cache using a custom opener.
    pub fn with_opener<F>(opener: F) -> Self
    where
        F: Fn(&Path) -> Result<Arc<dyn VectorStore>, StoreError> + Send + Sync + 'static,
    {
        Self {
            opener: Box::new(opener),
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// The handle for `location`, opening it on first use.
    ///
    /// # Errors
    ///
    /// Returns the opener's `StoreError` if the store cannot be opened.
    pub fn handle_for(&self, location: &Path) -> Result<Arc<dyn VectorStore>, StoreError> {
        let slot = {
            let mut slots = self.slots.lock();
            Arc::clone(slots.entry(location.to_path_buf()).or_default())
        };

        let mut handle = slot.lock();
        if let Some(store) = handle.as_ref() {
            return Ok(Arc::clone(store));
        }

        let store = (self.opener)(location)?;
        debug!(location = %location.display(), "materialized store handle");
        *handle = Some(Arc::clone(&store));
        Ok(store)
    }

    /// Number of locations with an open handle.
    #[must_use]
    pub fn len(&self) -> usize {
        let slots: Vec<Slot> = self.slots.lock().values().cloned().collect();
        slots.iter().filter(|slot| slot.lock().is_some()).count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for HandleCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    use tempfile::TempDir;

    fn counting_cache(opens: Arc<AtomicUsize>) -> HandleCache {
        HandleCache::with_opener(move |location| {
            opens.fetch_add(1, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(20));
            Ok(Arc::new(LocalVectorStore::open(location)?) as Arc<dyn VectorStore>)
        })
    }

    #[test]
    fn same_location_returns_same_handle() {
        let dir = TempDir::new().unwrap();
        let cache = HandleCache::new();

        let a = cache.handle_for(dir.path()).unwrap();
        let b = cache.handle_for(dir.path()).unwrap();

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn distinct_locations_get_distinct_handles() {
        let dir = TempDir::new().unwrap();
        let cache = HandleCache::new();

        let a = cache.handle_for(&dir.path().join("a")).unwrap();
        let b = cache.handle_for(&dir.path().join("b")).unwrap();

        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn concurrent_first_access_opens_once() {
        let dir = TempDir::new().unwrap();
        let opens = Arc::new(AtomicUsize::new(0));
        let cache = Arc::new(counting_cache(Arc::clone(&opens)));
        let location = dir.path().join("store");

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let location = location.clone();
                thread::spawn(move || cache.handle_for(&location).unwrap())
            })
            .collect();

        let stores: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(opens.load(Ordering::SeqCst), 1);
        assert!(stores.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    }

    #[test]
    fn failed_open_is_retried() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&attempts);
        let dir = TempDir::new().unwrap();

        let cache = HandleCache::with_opener(move |location| {
            if seen.fetch_add(1, Ordering::SeqCst) == 0 {
                return Err(StoreError::Open {
                    path: location.display().to_string(),
                    reason: "transient".to_string(),
                });
            }
            Ok(Arc::new(LocalVectorStore::open(location)?) as Arc<dyn VectorStore>)
        });

        assert!(cache.handle_for(dir.path()).is_err());
        assert!(cache.handle_for(dir.path()).is_ok());
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }
}
