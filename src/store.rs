//! Per-document index persistence.
//!
//! One self-contained index per document, each in its own directory under
//! the cache root. Directories are named `<id>-<sanitized file name>` so a
//! human can tell what lives where; the id prefix alone is authoritative.
//! Indexes are never merged or shared across documents on disk.
//!
//! Writes stage the full index in a hidden sibling directory and publish
//! it with renames only, ordered so a concurrent reader always finds a
//! complete index under the id prefix: old or new, never a half-written
//! one and never a gap. Writes for the same document are serialized;
//! writes for different documents are independent.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::debug;

use crate::error::StoreError;
use crate::models::{DocumentId, DocumentIndex};

/// File holding the chunk/embedding records inside a document directory.
const INDEX_FILE: &str = "index.json";

/// Maximum length of the human-readable name fragment in directory names.
const NAME_FRAGMENT_MAX: usize = 40;

pub struct IndexStore {
    root: PathBuf,
    write_locks: Mutex<HashMap<DocumentId, Arc<Mutex<()>>>>,
}

impl IndexStore {
    /// Open a store rooted at `root`, creating the directory if needed.
    pub fn open(root: PathBuf) -> Result<Self, StoreError> {
        std::fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            write_locks: Mutex::new(HashMap::new()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Persist a complete index for one document, replacing any prior
    /// version wholesale.
    pub fn write(&self, index: &DocumentIndex) -> Result<(), StoreError> {
        let lock = self.write_lock(&index.id);
        let _guard = lock.lock().expect("store write lock poisoned");

        let final_dir = self.root.join(dir_name(&index.id, &index.file_name));
        let staging_dir = self.root.join(format!(".staging-{}", index.id));

        if staging_dir.exists() {
            std::fs::remove_dir_all(&staging_dir)?;
        }
        std::fs::create_dir_all(&staging_dir)?;
        let json = serde_json::to_string(index).map_err(|e| StoreError::Corrupt {
            id: index.id.clone(),
            source: e,
        })?;
        std::fs::write(staging_dir.join(INDEX_FILE), json)?;

        // Publish with renames only, in an order where the id-prefix scan
        // always finds at least one complete index: expose the staged copy
        // under an interim name, retire prior directories to hidden names,
        // then settle on the canonical name and drop the retired copies.
        let incoming_dir = self
            .root
            .join(format!("{}.incoming", dir_name(&index.id, &index.file_name)));
        if incoming_dir.exists() {
            std::fs::remove_dir_all(&incoming_dir)?;
        }
        std::fs::rename(&staging_dir, &incoming_dir)?;

        let mut retired = Vec::new();
        for (i, stale) in self.dirs_for(&index.id)?.into_iter().enumerate() {
            if stale == incoming_dir {
                continue;
            }
            let aside = self.root.join(format!(".retired-{}-{}", index.id, i));
            if aside.exists() {
                std::fs::remove_dir_all(&aside)?;
            }
            std::fs::rename(&stale, &aside)?;
            retired.push(aside);
        }
        std::fs::rename(&incoming_dir, &final_dir)?;
        for aside in retired {
            std::fs::remove_dir_all(&aside)?;
        }
        debug!(id = %index.id, chunks = index.chunks.len(), "published per-document index");
        Ok(())
    }

    /// Load one document's index fully into memory. This is the expensive
    /// operation the two-phase design exists to minimize.
    ///
    /// A concurrent rewrite can retire a directory between the scan and
    /// the open, so every candidate directory is tried and the scan is
    /// repeated on a transient miss before the index is reported missing.
    pub fn read(&self, id: &DocumentId) -> Result<DocumentIndex, StoreError> {
        for _ in 0..8 {
            let dirs = self.dirs_for(id)?;
            if dirs.is_empty() {
                return Err(StoreError::NotFound(id.clone()));
            }
            for dir in dirs {
                let content = match std::fs::read_to_string(dir.join(INDEX_FILE)) {
                    Ok(c) => c,
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                    Err(e) => return Err(StoreError::Io(e)),
                };
                return serde_json::from_str(&content).map_err(|e| StoreError::Corrupt {
                    id: id.clone(),
                    source: e,
                });
            }
        }
        Err(StoreError::NotFound(id.clone()))
    }

    /// Remove a document's index directory. Returns `false` when none
    /// existed.
    pub fn delete(&self, id: &DocumentId) -> Result<bool, StoreError> {
        let lock = self.write_lock(id);
        let _guard = lock.lock().expect("store write lock poisoned");

        let dirs = self.dirs_for(id)?;
        let existed = !dirs.is_empty();
        for dir in dirs {
            std::fs::remove_dir_all(&dir)?;
        }
        Ok(existed)
    }

    pub fn exists(&self, id: &DocumentId) -> bool {
        matches!(self.dirs_for(id), Ok(dirs) if !dirs.is_empty())
    }

    /// All directories under the root whose name carries this id prefix.
    fn dirs_for(&self, id: &DocumentId) -> Result<Vec<PathBuf>, StoreError> {
        let prefix = format!("{}-", id);
        let mut dirs = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with(&prefix) && entry.path().is_dir() {
                dirs.push(entry.path());
            }
        }
        Ok(dirs)
    }

    fn write_lock(&self, id: &DocumentId) -> Arc<Mutex<()>> {
        let mut locks = self.write_locks.lock().expect("store lock map poisoned");
        locks.entry(id.clone()).or_default().clone()
    }
}

/// Deterministic directory name: id plus a sanitized file-name fragment
/// for human inspectability.
fn dir_name(id: &DocumentId, file_name: &str) -> String {
    format!("{}-{}", id, sanitize_fragment(file_name))
}

fn sanitize_fragment(name: &str) -> String {
    let mut out: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect();
    out.truncate(NAME_FRAGMENT_MAX);
    if out.is_empty() {
        out.push_str("doc");
    }
    out
}
