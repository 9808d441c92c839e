//! # Docshelf
//!
//! A local-first per-document retrieval engine for conversational assistants.
//!
//! Docshelf turns a user's personal document collection into a fast,
//! queryable knowledge base without ever loading the whole collection into
//! memory. Every document gets its own independent on-disk index; a
//! lightweight metadata registry stays resident and answers the question
//! "which documents are even worth loading for this query?" before any
//! index touches disk.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐   ┌─────────────┐   ┌───────────────────┐
//! │ Extractor │──▶│  Pipeline    │──▶│ Registry (JSON)    │
//! │ + Embedder│   │ chunk+embed │   │ + per-doc indexes  │
//! └───────────┘   └─────────────┘   └─────────┬─────────┘
//!                                             │
//!                          phase 1 (metadata) │ phase 2 (LRU cache)
//!                                             ▼
//!                                   ┌───────────────────┐
//!                                   │ Two-phase retrieve │──▶ ScoredChunk
//!                                   └───────────────────┘
//! ```
//!
//! Retrieval is two-phase: phase 1 narrows candidates using only registry
//! metadata (file names and paths), phase 2 loads just those candidates'
//! indexes through a bounded LRU cache and runs embedding similarity
//! search. Per-query cost is bounded by `max_candidates`, not corpus size.
//!
//! ## Quick Start
//!
//! ```bash
//! docshelf add ~/notes --recursive      # register documents
//! docshelf index                        # extract, chunk, embed
//! docshelf search "deployment checklist"
//! docshelf status
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`error`] | Typed error taxonomy |
//! | [`registry`] | Document metadata registry |
//! | [`store`] | Per-document index persistence |
//! | [`cache`] | Bounded in-memory index cache |
//! | [`chunk`] | Text chunking |
//! | [`extract`] | Text extraction trait |
//! | [`embedding`] | Embedding provider trait + similarity |
//! | [`pipeline`] | Corpus indexing pipeline |
//! | [`retrieve`] | Two-phase retrieval engine |
//! | [`migrate`] | Legacy monolithic-index migration |
//! | [`engine`] | Facade wiring all components together |
//! | [`progress`] | Indexing progress reporting |

pub mod cache;
pub mod chunk;
pub mod config;
pub mod embedding;
pub mod engine;
pub mod error;
pub mod extract;
pub mod migrate;
pub mod models;
pub mod pipeline;
pub mod progress;
pub mod registry;
pub mod retrieve;
pub mod store;
