//! Two-phase retrieval engine.
//!
//! Phase 1 scores every active registry entry against the query using a
//! cheap lexical heuristic over file names and paths; no index leaves
//! the disk. Phase 2 loads only the surviving candidates through the
//! index cache and runs embedding similarity search over their chunks.
//! Per-query cost is therefore bounded by `max_candidates` regardless of
//! corpus size, while phase 2 supplies the semantic quality that pure
//! keyword matching cannot.
//!
//! # Phase 1 scoring
//!
//! 1. Full lower-cased query contained in the file name → large bonus.
//! 2. Each query token found in the file name → medium bonus.
//! 3. Each query token found in the full path → small bonus.
//! 4. Zero-scoring documents are excluded, unless *nothing* scores, in
//!    which case the most recently indexed active documents are used so a
//!    query with no lexical overlap still searches something.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::cache::IndexCache;
use crate::embedding::{cosine_similarity, tokenize, EmbeddingProvider};
use crate::error::EmbeddingError;
use crate::models::{RegistryEntry, RetrievalCandidate, ScoredChunk};
use crate::registry::Registry;
use crate::store::IndexStore;

/// Full query string found inside the file name.
const EXACT_FILENAME_BONUS: f64 = 100.0;
/// One query token found in the file name.
const TOKEN_IN_FILENAME_BONUS: f64 = 10.0;
/// One query token found in the full path.
const TOKEN_IN_PATH_BONUS: f64 = 2.0;

/// Retrieval tuning parameters.
#[derive(Debug, Clone)]
pub struct RetrievalParams {
    /// Maximum documents loaded in phase 2.
    pub max_candidates: usize,
    /// Maximum chunks returned.
    pub max_results: usize,
    /// Top-k chunks taken per candidate document before merging.
    pub per_document_k: usize,
}

/// Cooperative cancellation for a slow phase-2 scan. Checked between
/// candidates, so cancelling aborts before the next index load.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Result of a retrieval. An empty active set is a distinct, valid state:
/// the caller can show "nothing to search" instead of a retrieval miss.
#[derive(Debug)]
pub enum RetrievalOutcome {
    NoActiveDocuments,
    Results(Vec<ScoredChunk>),
}

/// Run a two-phase retrieval over the registry and per-document indexes.
///
/// Per-candidate load failures are skipped with a warning; only a failure
/// to embed the query itself propagates.
pub fn retrieve(
    registry: &Registry,
    cache: &IndexCache,
    store: &IndexStore,
    embedder: &dyn EmbeddingProvider,
    query: &str,
    params: &RetrievalParams,
    cancel: Option<&CancelToken>,
) -> Result<RetrievalOutcome, EmbeddingError> {
    let entries = registry.all();
    let active: Vec<RegistryEntry> = entries.into_iter().filter(|e| e.active).collect();
    if active.is_empty() {
        return Ok(RetrievalOutcome::NoActiveDocuments);
    }

    let candidates = select_candidates(&active, query, params.max_candidates);
    if candidates.is_empty() {
        // Active documents exist but none is indexed yet.
        return Ok(RetrievalOutcome::Results(Vec::new()));
    }
    debug!(candidates = candidates.len(), "phase 1 selected candidates");

    let query_vec = embedder.embed(query)?;
    let mut merged: Vec<ScoredChunk> = Vec::new();

    for candidate in &candidates {
        if cancel.is_some_and(|c| c.is_cancelled()) {
            debug!("retrieval cancelled between candidates");
            break;
        }

        let index = match cache.get_or_load(&candidate.id, store) {
            Ok(index) => index,
            Err(e) => {
                warn!(id = %candidate.id, error = %e,
                    "skipping candidate whose index failed to load");
                continue;
            }
        };
        if index.dims != query_vec.len() {
            warn!(id = %candidate.id, index_dims = index.dims, query_dims = query_vec.len(),
                "skipping candidate indexed with a different embedding dimensionality");
            continue;
        }

        let mut doc_chunks: Vec<ScoredChunk> = index
            .chunks
            .iter()
            .map(|chunk| ScoredChunk {
                text: chunk.text.clone(),
                document: index.id.clone(),
                file_name: index.file_name.clone(),
                similarity: cosine_similarity(&query_vec, &chunk.embedding),
                source_offset: chunk.source_offset,
            })
            .collect();
        sort_by_similarity(&mut doc_chunks);
        doc_chunks.truncate(params.per_document_k);
        merged.extend(doc_chunks);
    }

    sort_by_similarity(&mut merged);
    merged.truncate(params.max_results);
    Ok(RetrievalOutcome::Results(merged))
}

/// Phase 1: narrow the active set to at most `max_candidates` documents
/// using registry metadata only. Only indexed documents can be
/// candidates. Never returns an empty set when at least one active
/// indexed document exists.
pub fn select_candidates(
    active: &[RegistryEntry],
    query: &str,
    max_candidates: usize,
) -> Vec<RetrievalCandidate> {
    let indexed: Vec<&RegistryEntry> = active.iter().filter(|e| e.is_indexed()).collect();
    if indexed.is_empty() {
        return Vec::new();
    }

    let query_lc = query.trim().to_lowercase();
    let tokens: Vec<String> = tokenize(&query_lc).collect();

    let mut scored: Vec<(&RegistryEntry, f64)> = indexed
        .iter()
        .map(|entry| (*entry, lexical_score(entry, &query_lc, &tokens)))
        .filter(|(_, score)| *score > 0.0)
        .collect();

    if scored.is_empty() {
        // No lexical overlap anywhere: fall back to the most recently
        // indexed documents rather than starving the query.
        let mut recent = indexed;
        recent.sort_by(|a, b| b.indexed_at.cmp(&a.indexed_at).then(a.id.cmp(&b.id)));
        return recent
            .into_iter()
            .take(max_candidates)
            .map(|e| RetrievalCandidate {
                id: e.id.clone(),
                lexical_score: 0.0,
            })
            .collect();
    }

    scored.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(b.0.indexed_at.cmp(&a.0.indexed_at))
            .then(a.0.id.cmp(&b.0.id))
    });
    scored
        .into_iter()
        .take(max_candidates)
        .map(|(e, score)| RetrievalCandidate {
            id: e.id.clone(),
            lexical_score: score,
        })
        .collect()
}

fn lexical_score(entry: &RegistryEntry, query_lc: &str, tokens: &[String]) -> f64 {
    let name_lc = entry.file_name.to_lowercase();
    let path_lc = entry.path.to_string_lossy().to_lowercase();

    let mut score = 0.0;
    if !query_lc.is_empty() && name_lc.contains(query_lc) {
        score += EXACT_FILENAME_BONUS;
    }
    for token in tokens {
        if name_lc.contains(token.as_str()) {
            score += TOKEN_IN_FILENAME_BONUS;
        }
        if path_lc.contains(token.as_str()) {
            score += TOKEN_IN_PATH_BONUS;
        }
    }
    score
}

/// Similarity descending, with a deterministic tie-break.
fn sort_by_similarity(chunks: &mut [ScoredChunk]) {
    chunks.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.document.cmp(&b.document))
            .then(a.source_offset.cmp(&b.source_offset))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use std::path::PathBuf;

    fn indexed_entry(path: &str, minutes_ago: i64) -> RegistryEntry {
        let mut entry = RegistryEntry::new(PathBuf::from(path));
        entry.indexed_at = Some(Utc::now() - Duration::minutes(minutes_ago));
        entry.chunk_count = 1;
        entry.content_hash = "hash".to_string();
        entry
    }

    #[test]
    fn exact_filename_match_outranks_token_matches() {
        let entries = vec![
            indexed_entry("/books/A.pdf", 0),
            indexed_entry("/books/B.pdf", 0),
            indexed_entry("/books/Cat Among the Pigeons.epub", 0),
        ];
        let candidates = select_candidates(&entries, "cat among the pigeons", 10);
        assert_eq!(candidates[0].id, entries[2].id);
        assert!(candidates[0].lexical_score >= EXACT_FILENAME_BONUS);
    }

    #[test]
    fn token_in_path_scores_lower_than_token_in_name() {
        let entries = vec![
            indexed_entry("/recipes/dinner.md", 0),
            indexed_entry("/other/recipes-index.md", 0),
        ];
        let candidates = select_candidates(&entries, "recipes", 10);
        // "recipes" appears in the second file's *name*, only in the
        // first file's path.
        assert_eq!(candidates[0].id, entries[1].id);
        assert!(candidates[0].lexical_score > candidates[1].lexical_score);
    }

    #[test]
    fn zero_overlap_falls_back_to_most_recent() {
        let entries = vec![
            indexed_entry("/docs/a.md", 30),
            indexed_entry("/docs/b.md", 10),
            indexed_entry("/docs/c.md", 20),
        ];
        let candidates = select_candidates(&entries, "zzz qqq", 2);
        assert_eq!(candidates.len(), 2);
        // Most recently indexed first.
        assert_eq!(candidates[0].id, entries[1].id);
        assert_eq!(candidates[1].id, entries[2].id);
        assert_eq!(candidates[0].lexical_score, 0.0);
    }

    #[test]
    fn candidate_count_is_bounded() {
        let entries: Vec<RegistryEntry> = (0..50)
            .map(|i| indexed_entry(&format!("/docs/report-{i}.md"), i))
            .collect();
        let candidates = select_candidates(&entries, "report", 10);
        assert_eq!(candidates.len(), 10);
    }

    #[test]
    fn unindexed_documents_are_never_candidates() {
        let mut unindexed = RegistryEntry::new(PathBuf::from("/docs/report.md"));
        unindexed.chunk_count = 0;
        let entries = vec![unindexed, indexed_entry("/docs/other.md", 0)];

        let candidates = select_candidates(&entries, "report", 10);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].id, entries[1].id);
    }

    #[test]
    fn no_indexed_documents_means_no_candidates() {
        let entries = vec![RegistryEntry::new(PathBuf::from("/docs/a.md"))];
        assert!(select_candidates(&entries, "anything", 10).is_empty());
    }

    #[test]
    fn cancel_token_flips() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());
        let clone = token.clone();
        clone.cancel();
        assert!(token.is_cancelled());
    }
}
