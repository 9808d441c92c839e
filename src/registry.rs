//! Document metadata registry.
//!
//! The registry is the single source of truth for "what documents exist
//! and what is indexed". It is always fully loaded, stays small (metadata
//! only, near-linear in document *count*), and is persisted as one JSON
//! file with an explicit schema version.
//!
//! Persistence is atomic: every mutation rewrites the whole file to a
//! sibling temp file and publishes it with a rename, so a crash can never
//! leave a truncated registry behind. A corrupt file on load is recovered
//! by falling back to an empty registry — affected documents simply appear
//! unindexed and get rebuilt by the next corpus run.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::warn;

use crate::error::RegistryError;
use crate::models::{DocumentId, RegistryEntry, REGISTRY_SCHEMA_VERSION};

/// Name of the registry file inside the cache directory.
pub const REGISTRY_FILE: &str = "registry.json";

/// Persisted form: schema version plus the entry list.
#[derive(Debug, Serialize, Deserialize)]
struct RegistryFile {
    schema_version: u32,
    documents: Vec<RegistryEntry>,
}

/// In-memory registry handle. All reads go through [`all`](Registry::all)
/// and [`get`](Registry::get) snapshots; mutations serialize through one
/// mutex around the read-modify-persist sequence.
pub struct Registry {
    path: PathBuf,
    entries: Mutex<BTreeMap<DocumentId, RegistryEntry>>,
}

impl Registry {
    /// Load the registry from `path`, or start empty when the file is
    /// absent or unparseable. Only I/O failures other than "not found"
    /// propagate.
    pub fn load(path: PathBuf) -> Result<Self, RegistryError> {
        let entries = match std::fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str::<RegistryFile>(&content) {
                Ok(file) if file.schema_version <= REGISTRY_SCHEMA_VERSION => file
                    .documents
                    .into_iter()
                    .map(|e| (e.id.clone(), e))
                    .collect(),
                Ok(file) => {
                    warn!(
                        schema_version = file.schema_version,
                        supported = REGISTRY_SCHEMA_VERSION,
                        "registry written by a newer version, starting empty"
                    );
                    BTreeMap::new()
                }
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        error = %e,
                        "registry file is corrupt, starting empty; documents will be re-indexed"
                    );
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(RegistryError::Io(e)),
        };

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    /// Insert or replace one entry and persist the whole registry.
    pub fn upsert(&self, entry: RegistryEntry) -> Result<(), RegistryError> {
        let mut entries = self.entries.lock().expect("registry lock poisoned");
        entries.insert(entry.id.clone(), entry);
        self.persist(&entries)
    }

    /// Remove one entry and persist. Returns the removed entry, if any.
    pub fn remove(&self, id: &DocumentId) -> Result<Option<RegistryEntry>, RegistryError> {
        let mut entries = self.entries.lock().expect("registry lock poisoned");
        let removed = entries.remove(id);
        if removed.is_some() {
            self.persist(&entries)?;
        }
        Ok(removed)
    }

    /// Snapshot of one entry.
    pub fn get(&self, id: &DocumentId) -> Option<RegistryEntry> {
        self.entries
            .lock()
            .expect("registry lock poisoned")
            .get(id)
            .cloned()
    }

    /// Snapshot of all entries, ordered by id. This is the only way other
    /// components read registry state.
    pub fn all(&self) -> Vec<RegistryEntry> {
        self.entries
            .lock()
            .expect("registry lock poisoned")
            .values()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("registry lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Toggle a document's participation in retrieval. Returns `false`
    /// when the id is unknown.
    pub fn set_active(&self, id: &DocumentId, active: bool) -> Result<bool, RegistryError> {
        let mut entries = self.entries.lock().expect("registry lock poisoned");
        match entries.get_mut(id) {
            Some(entry) => {
                entry.active = active;
                self.persist(&entries)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Mark every entry unindexed (used by migration: the per-document
    /// pipeline rebuilds everything incrementally afterwards).
    pub fn reset_indexed_state(&self) -> Result<(), RegistryError> {
        let mut entries = self.entries.lock().expect("registry lock poisoned");
        for entry in entries.values_mut() {
            entry.indexed_at = None;
            entry.chunk_count = 0;
            entry.content_hash.clear();
        }
        self.persist(&entries)
    }

    /// Write-to-temp-then-rename. Callers hold the entries lock.
    fn persist(&self, entries: &BTreeMap<DocumentId, RegistryEntry>) -> Result<(), RegistryError> {
        let file = RegistryFile {
            schema_version: REGISTRY_SCHEMA_VERSION,
            documents: entries.values().cloned().collect(),
        };
        let json = serde_json::to_string_pretty(&file)?;

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

/// Registry file path inside a cache directory.
pub fn registry_path(cache_dir: &Path) -> PathBuf {
    cache_dir.join(REGISTRY_FILE)
}
