//! Engine facade.
//!
//! One handle over the whole retrieval engine: registry, per-document
//! store, index cache, and the injected extraction/embedding
//! collaborators. There are no process-wide singletons — every `Engine`
//! owns its own state, so tests (and applications) can run multiple
//! isolated corpora side by side.

use std::path::{Path, PathBuf};

use crate::cache::IndexCache;
use crate::config::Config;
use crate::embedding::EmbeddingProvider;
use crate::error::{EngineError, IndexingError};
use crate::extract::TextExtractor;
use crate::migrate::{self, MigrationOutcome};
use crate::models::{DocumentId, RegistryEntry};
use crate::pipeline::{IndexSummary, Pipeline};
use crate::progress::ProgressReporter;
use crate::registry::{registry_path, Registry};
use crate::retrieve::{self, CancelToken, RetrievalOutcome, RetrievalParams};
use crate::store::IndexStore;

pub struct Engine {
    config: Config,
    registry: Registry,
    store: IndexStore,
    cache: IndexCache,
    extractor: Box<dyn TextExtractor>,
    embedder: Box<dyn EmbeddingProvider>,
}

impl Engine {
    /// Open (or create) the corpus under `config.storage.cache_dir` with
    /// the given collaborators.
    pub fn open(
        config: Config,
        extractor: Box<dyn TextExtractor>,
        embedder: Box<dyn EmbeddingProvider>,
    ) -> Result<Self, EngineError> {
        let cache_dir = config.storage.cache_dir.clone();
        std::fs::create_dir_all(&cache_dir).map_err(|e| EngineError::CacheDir {
            path: cache_dir.clone(),
            source: e,
        })?;

        let registry = Registry::load(registry_path(&cache_dir))?;
        let store = IndexStore::open(cache_dir)?;
        let cache = IndexCache::new(config.cache.max_resident_documents);

        Ok(Self {
            config,
            registry,
            store,
            cache,
            extractor,
            embedder,
        })
    }

    /// Detect and migrate away from a legacy monolithic index. Call once
    /// at startup, before the first retrieval.
    pub fn check_and_migrate(&self) -> MigrationOutcome {
        let outcome = migrate::check_and_migrate(&self.config.storage.cache_dir, &self.registry);
        if matches!(outcome, MigrationOutcome::Migrated { .. }) {
            self.cache.clear();
        }
        outcome
    }

    /// Register a document without indexing it. Re-adding a known path is
    /// a no-op that returns the existing entry.
    pub fn add_document(&self, path: &Path) -> Result<RegistryEntry, EngineError> {
        let path = absolute_path(path);
        let id = DocumentId::from_path(&path);
        if let Some(existing) = self.registry.get(&id) {
            return Ok(existing);
        }
        let entry = RegistryEntry::new(path);
        self.registry.upsert(entry.clone())?;
        Ok(entry)
    }

    /// Remove a document: registry entry, on-disk index, and cache entry.
    /// Returns `false` when the id was unknown.
    pub fn remove_document(&self, id: &DocumentId) -> Result<bool, EngineError> {
        let removed = self.registry.remove(id)?.is_some();
        self.store.delete(id)?;
        self.cache.invalidate(id);
        Ok(removed)
    }

    /// Toggle a document's participation in retrieval.
    pub fn set_active(&self, id: &DocumentId, active: bool) -> Result<bool, EngineError> {
        Ok(self.registry.set_active(id, active)?)
    }

    /// Snapshot of all registry entries.
    pub fn documents(&self) -> Vec<RegistryEntry> {
        self.registry.all()
    }

    /// Index every registered document that is unindexed or stale.
    pub fn index_corpus(
        &self,
        progress: &dyn ProgressReporter,
    ) -> Result<IndexSummary, EngineError> {
        Ok(self.pipeline().index_corpus(progress)?)
    }

    /// Index one document immediately, registering it if needed.
    pub fn index_document(&self, path: &Path) -> Result<RegistryEntry, IndexingError> {
        let path = absolute_path(path);
        self.pipeline().index_document(&path)
    }

    /// Two-phase retrieval with the configured parameters.
    pub fn retrieve(
        &self,
        query: &str,
        cancel: Option<&CancelToken>,
    ) -> Result<RetrievalOutcome, crate::error::EmbeddingError> {
        let params = self.retrieval_params();
        self.retrieve_with(query, &params, cancel)
    }

    /// Two-phase retrieval with explicit parameters.
    pub fn retrieve_with(
        &self,
        query: &str,
        params: &RetrievalParams,
        cancel: Option<&CancelToken>,
    ) -> Result<RetrievalOutcome, crate::error::EmbeddingError> {
        retrieve::retrieve(
            &self.registry,
            &self.cache,
            &self.store,
            self.embedder.as_ref(),
            query,
            params,
            cancel,
        )
    }

    /// Parameters derived from the configuration.
    pub fn retrieval_params(&self) -> RetrievalParams {
        RetrievalParams {
            max_candidates: self.config.retrieval.max_candidates,
            max_results: self.config.retrieval.max_results,
            per_document_k: self.config.retrieval.per_document_k,
        }
    }

    /// Drop all cached indexes (corpus-wide reload).
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Number of loaded indexes currently resident in memory.
    pub fn resident_indexes(&self) -> usize {
        self.cache.resident()
    }

    pub fn cache_dir(&self) -> &Path {
        &self.config.storage.cache_dir
    }

    fn pipeline(&self) -> Pipeline<'_> {
        Pipeline {
            registry: &self.registry,
            store: &self.store,
            cache: &self.cache,
            extractor: self.extractor.as_ref(),
            embedder: self.embedder.as_ref(),
            chunking: &self.config.chunking,
        }
    }
}

/// Normalize to an absolute path so identity derivation is stable no
/// matter which working directory the caller runs from.
fn absolute_path(path: &Path) -> PathBuf {
    if let Ok(canonical) = std::fs::canonicalize(path) {
        return canonical;
    }
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    }
}
