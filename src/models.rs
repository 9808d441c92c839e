//! Core data models used throughout Docshelf.
//!
//! These types represent the documents, per-document indexes, and retrieval
//! results that flow through the indexing and retrieval pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::{Path, PathBuf};

/// Version of the persisted registry schema. Bumped whenever a field is
/// added or changes meaning, so older files can be detected explicitly.
pub const REGISTRY_SCHEMA_VERSION: u32 = 1;

/// Stable, deterministic document identifier derived from the document's
/// absolute path.
///
/// The same path always yields the same identity, which is the join key
/// between the registry, the per-document index directories, and the
/// in-memory cache. The identity is content-independent: editing a file
/// changes its `content_hash`, never its id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    /// Derive the identity from a document path.
    ///
    /// Callers should pass an absolute path; relative paths produce a
    /// different (but still deterministic) identity.
    pub fn from_path(path: &Path) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(path.to_string_lossy().as_bytes());
        let digest = format!("{:x}", hasher.finalize());
        Self(digest[..16].to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One registry record per known document. Metadata only — the registry
/// never stores chunk text or embedding vectors, which is what keeps
/// phase-1 candidate filtering cheap at any corpus size.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryEntry {
    /// Path-derived identity.
    pub id: DocumentId,
    /// Absolute path to the source file.
    pub path: PathBuf,
    /// File name component, kept denormalized for phase-1 scoring.
    pub file_name: String,
    /// SHA-256 of the file contents at the time of the last index run.
    /// Empty until the document has been indexed at least once.
    #[serde(default)]
    pub content_hash: String,
    /// When the document was last successfully indexed. `None` means no
    /// per-document index exists on disk for this entry.
    pub indexed_at: Option<DateTime<Utc>>,
    /// Number of chunks in the per-document index.
    #[serde(default)]
    pub chunk_count: usize,
    /// Whether the document participates in retrieval. Inactive documents
    /// are skipped even when indexed.
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl RegistryEntry {
    /// Create a fresh, unindexed entry for a document path.
    pub fn new(path: PathBuf) -> Self {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            id: DocumentId::from_path(&path),
            path,
            file_name,
            content_hash: String::new(),
            indexed_at: None,
            chunk_count: 0,
            active: true,
        }
    }

    pub fn is_indexed(&self) -> bool {
        self.indexed_at.is_some()
    }
}

/// One chunk of a document: the text, its embedding, and where in the
/// extracted text it came from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexedChunk {
    pub text: String,
    pub embedding: Vec<f32>,
    /// Byte offset of the chunk within the extracted document text.
    pub source_offset: usize,
}

/// A complete per-document index: ordered chunks plus document-level
/// metadata. This is both the persisted form (one `index.json` per
/// document directory) and the in-memory loaded form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentIndex {
    pub id: DocumentId,
    pub file_name: String,
    /// Embedding backend that produced the vectors. Mixing models across
    /// the corpus invalidates similarity comparison; retrieval skips
    /// documents whose dimensionality disagrees with the query vector.
    pub embedding_model: String,
    pub dims: usize,
    pub written_at: DateTime<Utc>,
    pub chunks: Vec<IndexedChunk>,
}

/// A phase-1 candidate: a document judged worth loading, with its lexical
/// relevance score. Transient, never persisted.
#[derive(Debug, Clone)]
pub struct RetrievalCandidate {
    pub id: DocumentId,
    pub lexical_score: f64,
}

/// A phase-2 result chunk, ready to be handed to the answer-generation
/// layer. Transient, never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredChunk {
    pub text: String,
    /// Identity of the document the chunk came from.
    pub document: DocumentId,
    /// File name of the source document, for display.
    pub file_name: String,
    /// Cosine similarity against the query embedding, in `[-1.0, 1.0]`.
    pub similarity: f32,
    /// Byte offset of the chunk within the extracted document text.
    pub source_offset: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_is_deterministic() {
        let a = DocumentId::from_path(Path::new("/home/user/notes/report.md"));
        let b = DocumentId::from_path(Path::new("/home/user/notes/report.md"));
        assert_eq!(a, b);
    }

    #[test]
    fn id_differs_by_path() {
        let a = DocumentId::from_path(Path::new("/home/user/a.md"));
        let b = DocumentId::from_path(Path::new("/home/user/b.md"));
        assert_ne!(a, b);
    }

    #[test]
    fn id_is_content_independent_hex() {
        let id = DocumentId::from_path(Path::new("/tmp/x.txt"));
        assert_eq!(id.as_str().len(), 16);
        assert!(id.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn new_entry_is_unindexed_and_active() {
        let entry = RegistryEntry::new(PathBuf::from("/tmp/Cat Among the Pigeons.epub"));
        assert_eq!(entry.file_name, "Cat Among the Pigeons.epub");
        assert!(!entry.is_indexed());
        assert!(entry.active);
        assert_eq!(entry.chunk_count, 0);
    }

    #[test]
    fn entry_roundtrips_through_json() {
        let mut entry = RegistryEntry::new(PathBuf::from("/tmp/a.md"));
        entry.indexed_at = Some(Utc::now());
        entry.chunk_count = 7;
        entry.content_hash = "abc".to_string();

        let json = serde_json::to_string(&entry).unwrap();
        let back: RegistryEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, entry.id);
        assert_eq!(back.chunk_count, 7);
        assert!(back.is_indexed());
    }
}
