//! Bounded in-memory cache of loaded per-document indexes.
//!
//! Populated lazily on the first query that needs a document, never
//! pre-warmed at startup. Eviction is LRU with a configurable resident
//! capacity so a long session cannot grow without bound. Concurrent loads
//! for the same document are coalesced: the second caller waits on the
//! first load instead of hitting the disk twice.

use lru::LruCache;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};
use tracing::debug;

use crate::error::StoreError;
use crate::models::{DocumentId, DocumentIndex};
use crate::store::IndexStore;

pub struct IndexCache {
    entries: Mutex<LruCache<DocumentId, Arc<DocumentIndex>>>,
    load_locks: Mutex<HashMap<DocumentId, Arc<Mutex<()>>>>,
}

impl IndexCache {
    /// Create a cache holding at most `capacity` loaded indexes.
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            load_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Return the cached index for `id`, loading it from the store on a
    /// miss. Loads for the same id are serialized; the loser of the race
    /// finds the winner's entry on its re-check and returns it.
    pub fn get_or_load(
        &self,
        id: &DocumentId,
        store: &IndexStore,
    ) -> Result<Arc<DocumentIndex>, StoreError> {
        if let Some(index) = self.peek(id) {
            return Ok(index);
        }

        let lock = self.load_lock(id);
        let _guard = lock.lock().expect("cache load lock poisoned");

        // Re-check under the load lock: another caller may have finished
        // the same load while we waited.
        if let Some(index) = self.peek(id) {
            return Ok(index);
        }

        match store.read(id) {
            Ok(index) => {
                let loaded = Arc::new(index);
                debug!(id = %id, chunks = loaded.chunks.len(), "loaded index into cache");
                self.entries
                    .lock()
                    .expect("cache lock poisoned")
                    .put(id.clone(), Arc::clone(&loaded));
                self.drop_load_lock(id);
                Ok(loaded)
            }
            Err(e) => {
                self.drop_load_lock(id);
                Err(e)
            }
        }
    }

    /// Drop one entry (after a re-index, so the next query reloads).
    pub fn invalidate(&self, id: &DocumentId) {
        self.entries.lock().expect("cache lock poisoned").pop(id);
    }

    /// Drop everything (corpus-wide reload).
    pub fn clear(&self) {
        self.entries.lock().expect("cache lock poisoned").clear();
    }

    /// Number of indexes currently resident.
    pub fn resident(&self) -> usize {
        self.entries.lock().expect("cache lock poisoned").len()
    }

    fn peek(&self, id: &DocumentId) -> Option<Arc<DocumentIndex>> {
        self.entries
            .lock()
            .expect("cache lock poisoned")
            .get(id)
            .cloned()
    }

    fn load_lock(&self, id: &DocumentId) -> Arc<Mutex<()>> {
        let mut locks = self.load_locks.lock().expect("load lock map poisoned");
        locks.entry(id.clone()).or_default().clone()
    }

    fn drop_load_lock(&self, id: &DocumentId) {
        self.load_locks
            .lock()
            .expect("load lock map poisoned")
            .remove(id);
    }
}
