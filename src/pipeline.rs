//! Corpus indexing pipeline.
//!
//! Coordinates the full flow for one document: extract → chunk → embed →
//! store write → registry upsert. Corpus runs iterate the unindexed-or-
//! stale subset and contain every per-document failure: one broken
//! document never corrupts or blocks the others, and its previous index
//! (if any) stays queryable.

use chrono::Utc;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::cache::IndexCache;
use crate::chunk::split_text;
use crate::config::ChunkingConfig;
use crate::embedding::EmbeddingProvider;
use crate::error::{ExtractError, IndexingError, RegistryError};
use crate::extract::TextExtractor;
use crate::models::{DocumentId, DocumentIndex, IndexedChunk, RegistryEntry};
use crate::progress::{IndexProgressEvent, ProgressReporter};
use crate::registry::Registry;
use crate::store::IndexStore;

/// Aggregate result of a corpus run. Individual failures are data, not
/// errors: "indexed 98/102" is a normal outcome.
#[derive(Debug, Default)]
pub struct IndexSummary {
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub failures: Vec<DocumentFailure>,
}

/// One failed document in a corpus run.
#[derive(Debug)]
pub struct DocumentFailure {
    pub id: DocumentId,
    pub path: PathBuf,
    pub reason: String,
}

/// Borrowed view over the components the pipeline needs. Constructed by
/// the engine facade per call; owns nothing.
pub struct Pipeline<'a> {
    pub registry: &'a Registry,
    pub store: &'a IndexStore,
    pub cache: &'a IndexCache,
    pub extractor: &'a dyn TextExtractor,
    pub embedder: &'a dyn EmbeddingProvider,
    pub chunking: &'a ChunkingConfig,
}

impl Pipeline<'_> {
    /// Index one document from scratch, replacing any prior index
    /// wholesale. On failure the registry entry and old index are left
    /// untouched.
    pub fn index_document(&self, path: &Path) -> Result<RegistryEntry, IndexingError> {
        let id = DocumentId::from_path(path);
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let content_hash = hash_file(path).map_err(|e| IndexingError::SourceUnreadable {
            path: path.to_path_buf(),
            source: e,
        })?;

        let text = self
            .extractor
            .extract(path)
            .map_err(|e| IndexingError::ExtractionFailed {
                path: path.to_path_buf(),
                source: e,
            })?;
        if text.trim().is_empty() {
            return Err(IndexingError::ExtractionFailed {
                path: path.to_path_buf(),
                source: ExtractError::Empty(path.to_path_buf()),
            });
        }

        let pieces = split_text(&text, self.chunking.target_chars);
        let mut chunks = Vec::with_capacity(pieces.len());
        for piece in pieces {
            let embedding =
                self.embedder
                    .embed(&piece.text)
                    .map_err(|e| IndexingError::EmbeddingFailed {
                        path: path.to_path_buf(),
                        source: e,
                    })?;
            chunks.push(IndexedChunk {
                text: piece.text,
                embedding,
                source_offset: piece.source_offset,
            });
        }

        let now = Utc::now();
        let chunk_count = chunks.len();
        let index = DocumentIndex {
            id: id.clone(),
            file_name: file_name.clone(),
            embedding_model: self.embedder.model_name().to_string(),
            dims: self.embedder.dims(),
            written_at: now,
            chunks,
        };
        self.store.write(&index)?;

        // Preserve the user's active flag across re-indexing.
        let active = self.registry.get(&id).map(|e| e.active).unwrap_or(true);
        let entry = RegistryEntry {
            id: id.clone(),
            path: path.to_path_buf(),
            file_name,
            content_hash,
            indexed_at: Some(now),
            chunk_count,
            active,
        };
        self.registry.upsert(entry.clone())?;
        self.cache.invalidate(&id);
        info!(id = %id, chunks = chunk_count, "indexed document");
        Ok(entry)
    }

    /// Index every registered document that is unindexed or stale.
    ///
    /// Never raises on individual failures — they are recorded in the
    /// summary and the run continues. Only structural registry failures
    /// propagate.
    pub fn index_corpus(
        &self,
        progress: &dyn ProgressReporter,
    ) -> Result<IndexSummary, RegistryError> {
        let mut summary = IndexSummary::default();
        let mut pending = Vec::new();

        for entry in self.registry.all() {
            match self.needs_index(&entry) {
                Ok(true) => pending.push(entry),
                Ok(false) => summary.skipped += 1,
                Err(e) => {
                    warn!(id = %entry.id, path = %entry.path.display(), error = %e,
                        "cannot stat document, recording as failed");
                    summary.failed += 1;
                    summary.failures.push(DocumentFailure {
                        id: entry.id.clone(),
                        path: entry.path.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        let total = pending.len() as u64;
        progress.report(IndexProgressEvent::Started { total });

        for (i, entry) in pending.iter().enumerate() {
            progress.report(IndexProgressEvent::Indexing {
                file_name: entry.file_name.clone(),
                n: i as u64 + 1,
                total,
            });
            match self.index_document(&entry.path) {
                Ok(_) => summary.succeeded += 1,
                Err(IndexingError::Registry(e)) => return Err(e),
                Err(e) => {
                    warn!(id = %entry.id, path = %entry.path.display(), error = %e,
                        "indexing failed, continuing with remaining documents");
                    summary.failed += 1;
                    summary.failures.push(DocumentFailure {
                        id: entry.id.clone(),
                        path: entry.path.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        progress.report(IndexProgressEvent::Finished {
            succeeded: summary.succeeded as u64,
            failed: summary.failed as u64,
            skipped: summary.skipped as u64,
        });
        Ok(summary)
    }

    /// A document needs indexing when it was never indexed, or when the
    /// file on disk no longer matches the stored content hash. A stale
    /// entry is treated identically to an unindexed one.
    fn needs_index(&self, entry: &RegistryEntry) -> Result<bool, std::io::Error> {
        if !entry.is_indexed() {
            return Ok(true);
        }
        let current = hash_file(&entry.path)?;
        Ok(current != entry.content_hash)
    }
}

/// SHA-256 of a file's contents, streamed.
pub fn hash_file(path: &Path) -> Result<String, std::io::Error> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    std::io::copy(&mut file, &mut hasher)?;
    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ChunkingConfig;
    use crate::embedding::HashingEmbedder;
    use crate::extract::PlainTextExtractor;
    use crate::progress::NoProgress;
    use crate::registry::{registry_path, Registry};

    struct Fixture {
        _tmp: tempfile::TempDir,
        docs: PathBuf,
        registry: Registry,
        store: IndexStore,
        cache: IndexCache,
        embedder: HashingEmbedder,
        chunking: ChunkingConfig,
    }

    impl Fixture {
        fn new() -> Self {
            let tmp = tempfile::tempdir().unwrap();
            let docs = tmp.path().join("docs");
            std::fs::create_dir_all(&docs).unwrap();
            let cache_dir = tmp.path().join("cache");
            let registry = Registry::load(registry_path(&cache_dir)).unwrap();
            let store = IndexStore::open(cache_dir).unwrap();
            Self {
                _tmp: tmp,
                docs,
                registry,
                store,
                cache: IndexCache::new(8),
                embedder: HashingEmbedder::new(64),
                chunking: ChunkingConfig { target_chars: 200 },
            }
        }

        fn pipeline(&self) -> Pipeline<'_> {
            Pipeline {
                registry: &self.registry,
                store: &self.store,
                cache: &self.cache,
                extractor: &PlainTextExtractor,
                embedder: &self.embedder,
                chunking: &self.chunking,
            }
        }

        fn write_doc(&self, name: &str, content: &str) -> PathBuf {
            let path = self.docs.join(name);
            std::fs::write(&path, content).unwrap();
            path
        }
    }

    #[test]
    fn index_document_writes_store_and_registry() {
        let fx = Fixture::new();
        let path = fx.write_doc("a.md", "Alpha notes.\n\nMore alpha text here.");

        let entry = fx.pipeline().index_document(&path).unwrap();
        assert!(entry.is_indexed());
        assert!(entry.chunk_count >= 1);
        assert!(!entry.content_hash.is_empty());

        let loaded = fx.store.read(&entry.id).unwrap();
        assert_eq!(loaded.chunks.len(), entry.chunk_count);
        assert_eq!(loaded.dims, 64);
        assert_eq!(fx.registry.get(&entry.id).unwrap().chunk_count, entry.chunk_count);
    }

    #[test]
    fn empty_extraction_fails_and_leaves_registry_untouched() {
        let fx = Fixture::new();
        let path = fx.write_doc("empty.md", "   \n\n   ");

        let err = fx.pipeline().index_document(&path).unwrap_err();
        assert!(matches!(err, IndexingError::ExtractionFailed { .. }));
        assert!(fx.registry.is_empty());
        assert!(!fx.store.exists(&DocumentId::from_path(&path)));
    }

    #[test]
    fn reindex_is_idempotent() {
        let fx = Fixture::new();
        let path = fx.write_doc("a.md", "Stable content.\n\nSecond paragraph.");

        let first = fx.pipeline().index_document(&path).unwrap();
        fx.registry.upsert(first.clone()).unwrap();

        let summary = fx.pipeline().index_corpus(&NoProgress).unwrap();
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.succeeded, 0);

        let second = fx.registry.get(&first.id).unwrap();
        assert_eq!(second.content_hash, first.content_hash);
        assert_eq!(second.chunk_count, first.chunk_count);
    }

    #[test]
    fn stale_document_is_reindexed() {
        let fx = Fixture::new();
        let path = fx.write_doc("a.md", "Original content.");
        fx.pipeline().index_document(&path).unwrap();

        fx.write_doc("a.md", "Rewritten content, noticeably different.");
        let summary = fx.pipeline().index_corpus(&NoProgress).unwrap();
        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.skipped, 0);

        let id = DocumentId::from_path(&path);
        let entry = fx.registry.get(&id).unwrap();
        assert_eq!(entry.content_hash, hash_file(&path).unwrap());
    }

    #[test]
    fn unregistered_entries_with_null_indexed_at_are_picked_up() {
        let fx = Fixture::new();
        let path = fx.write_doc("a.md", "Some content.");
        fx.registry
            .upsert(RegistryEntry::new(path.clone()))
            .unwrap();

        let summary = fx.pipeline().index_corpus(&NoProgress).unwrap();
        assert_eq!(summary.succeeded, 1);
        assert!(fx
            .registry
            .get(&DocumentId::from_path(&path))
            .unwrap()
            .is_indexed());
    }

    #[test]
    fn one_failure_does_not_block_others() {
        let fx = Fixture::new();
        for name in ["one.md", "two.md", "four.md", "five.md"] {
            let p = fx.write_doc(name, "Fine content here.");
            fx.registry.upsert(RegistryEntry::new(p)).unwrap();
        }
        // Register a path that does not exist on disk.
        fx.registry
            .upsert(RegistryEntry::new(fx.docs.join("three.md")))
            .unwrap();

        let summary = fx.pipeline().index_corpus(&NoProgress).unwrap();
        assert_eq!(summary.succeeded, 4);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.failures.len(), 1);
        assert!(summary.failures[0].path.ends_with("three.md"));

        // The four good documents are queryable.
        for name in ["one.md", "two.md", "four.md", "five.md"] {
            let id = DocumentId::from_path(&fx.docs.join(name));
            assert!(fx.store.read(&id).is_ok());
        }
    }

    #[test]
    fn reindex_preserves_inactive_flag() {
        let fx = Fixture::new();
        let path = fx.write_doc("a.md", "Content.");
        let entry = fx.pipeline().index_document(&path).unwrap();
        fx.registry.set_active(&entry.id, false).unwrap();

        fx.write_doc("a.md", "Changed content.");
        fx.pipeline().index_corpus(&NoProgress).unwrap();
        assert!(!fx.registry.get(&entry.id).unwrap().active);
    }

    #[test]
    fn reindex_invalidates_cache() {
        let fx = Fixture::new();
        let path = fx.write_doc("a.md", "Cached content.");
        let entry = fx.pipeline().index_document(&path).unwrap();

        let before = fx.cache.get_or_load(&entry.id, &fx.store).unwrap();
        fx.write_doc("a.md", "Fresh content after edit.");
        fx.pipeline().index_document(&path).unwrap();

        let after = fx.cache.get_or_load(&entry.id, &fx.store).unwrap();
        assert!(!std::sync::Arc::ptr_eq(&before, &after));
        assert!(after.chunks[0].text.contains("Fresh content"));
    }
}
