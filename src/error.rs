//! Typed error taxonomy for the retrieval engine.
//!
//! The propagation policy: failures local to one document (indexing or
//! loading its index) are contained and reported as data by the pipeline
//! and the retrieval engine; only structural failures (registry
//! persistence, cache directory creation) propagate to the caller.

use std::path::PathBuf;
use thiserror::Error;

use crate::models::DocumentId;

/// Errors from the document registry.
///
/// A corrupt registry file is recovered internally (the registry falls
/// back to empty and documents are simply rebuilt), so `Corrupt` only
/// surfaces through logs; `Io` is structural and propagates.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("registry file is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
    #[error("registry I/O failure: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from the per-document index store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no index on disk for document {0}")]
    NotFound(DocumentId),
    #[error("index for document {id} is corrupt: {source}")]
    Corrupt {
        id: DocumentId,
        source: serde_json::Error,
    },
    #[error("index store I/O failure: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from a text-extraction collaborator.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("extraction produced no content for {0}")]
    Empty(PathBuf),
    #[error("unsupported document format: {0}")]
    Unsupported(PathBuf),
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("{0}")]
    Backend(String),
}

/// Errors from an embedding collaborator.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("embedding backend failed: {0}")]
    Backend(String),
}

/// Per-document indexing errors. One document failing never aborts a
/// corpus run; `index_corpus` records these and continues.
#[derive(Debug, Error)]
pub enum IndexingError {
    #[error("text extraction failed for {path}: {source}")]
    ExtractionFailed {
        path: PathBuf,
        source: ExtractError,
    },
    #[error("embedding failed for {path}: {source}")]
    EmbeddingFailed {
        path: PathBuf,
        source: EmbeddingError,
    },
    #[error("cannot read {path}: {source}")]
    SourceUnreadable {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Structural engine errors surfaced by [`Engine::open`](crate::engine::Engine::open)
/// and the document-management operations.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("cannot create cache directory {path}: {source}")]
    CacheDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Store(#[from] StoreError),
}
