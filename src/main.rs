//! # Docshelf CLI (`docshelf`)
//!
//! The `docshelf` binary is the primary interface for the retrieval
//! engine. It provides commands for registering documents, indexing the
//! corpus, searching, and migrating away from legacy on-disk layouts.
//!
//! ## Usage
//!
//! ```bash
//! docshelf --config ~/.docshelf/config.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docshelf add <path>` | Register a document (or a directory with `--recursive`) |
//! | `docshelf remove <id>` | Remove a document, its index, and its cache entry |
//! | `docshelf activate <id>` | Include a document in retrieval |
//! | `docshelf deactivate <id>` | Exclude a document from retrieval (index kept) |
//! | `docshelf index` | Index every unindexed or stale document |
//! | `docshelf search "<query>"` | Two-phase retrieval over the active corpus |
//! | `docshelf status` | Show registry entries and their indexing state |
//! | `docshelf migrate` | Check for (and run) legacy layout migration |
//!
//! Document ids may be abbreviated to any unique prefix.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use docshelf::config::{self, Config};
use docshelf::embedding::HashingEmbedder;
use docshelf::engine::Engine;
use docshelf::extract::PlainTextExtractor;
use docshelf::migrate::MigrationOutcome;
use docshelf::models::{DocumentId, RegistryEntry};
use docshelf::progress::ProgressMode;
use docshelf::retrieve::{RetrievalOutcome, RetrievalParams};

/// Docshelf — a local two-phase document retrieval engine.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. When the file does not exist, built-in defaults are used.
#[derive(Parser)]
#[command(
    name = "docshelf",
    about = "Docshelf — a local two-phase document retrieval engine",
    version,
    long_about = "Docshelf keeps a registry of local documents, indexes each one into its own \
    on-disk embedding index, and answers queries in two phases: a cheap lexical pass over \
    registry metadata narrows the corpus to a few candidates, then only those candidate \
    indexes are loaded and searched semantically."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `~/.docshelf/config.toml`. Storage, chunking,
    /// retrieval, and cache settings are read from this file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace). Logs go to stderr.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log warnings and errors.
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Register a document with the corpus.
    ///
    /// Registration records the path and derives a stable id; it does not
    /// index. Run `docshelf index` afterwards. Re-adding a known path is a
    /// no-op.
    Add {
        /// File to register, or a directory with `--recursive`.
        path: PathBuf,

        /// Walk a directory and register every `.txt` and `.md` file in it.
        #[arg(long)]
        recursive: bool,
    },

    /// Remove a document from the corpus.
    ///
    /// Deletes the registry entry, the on-disk index directory, and the
    /// in-memory cache entry. The source file is never touched.
    Remove {
        /// Document id (unique prefix accepted).
        id: String,
    },

    /// Include a document in retrieval again.
    Activate {
        /// Document id (unique prefix accepted).
        id: String,
    },

    /// Exclude a document from retrieval without deleting its index.
    Deactivate {
        /// Document id (unique prefix accepted).
        id: String,
    },

    /// Index every registered document that is unindexed or stale.
    ///
    /// Per-document failures are reported and do not stop the run; the
    /// exit code is zero as long as the corpus run itself completed.
    Index {
        /// Progress output: `human`, `json`, or `off`.
        /// Default: human when stderr is a terminal, otherwise off.
        #[arg(long)]
        progress: Option<String>,
    },

    /// Search the active corpus.
    ///
    /// Phase 1 ranks documents by file-name/path overlap with the query;
    /// phase 2 loads the top candidates and ranks their chunks by
    /// embedding similarity.
    Search {
        /// The search query string.
        query: String,

        /// Maximum documents loaded in phase 2.
        #[arg(long)]
        candidates: Option<usize>,

        /// Maximum chunks returned.
        #[arg(long)]
        limit: Option<usize>,

        /// Emit results as JSON on stdout.
        #[arg(long)]
        json: bool,
    },

    /// Show every registry entry and its indexing state.
    Status,

    /// Check for a legacy monolithic index and migrate away from it.
    ///
    /// Migration also runs automatically before any other command; this
    /// just makes the outcome explicit.
    Migrate,
}

fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if let Ok(env) = std::env::var("DOCSHELF_LOG") {
        EnvFilter::new(env)
    } else if quiet {
        EnvFilter::new("warn")
    } else {
        match verbose {
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    let cfg = load_config(cli.config.as_deref())?;
    let engine = open_engine(cfg)?;

    // Legacy layouts are handled before anything touches the store.
    let migration = engine.check_and_migrate();
    if let MigrationOutcome::Failed { ref reason } = migration {
        eprintln!("warning: legacy index migration failed: {reason}");
        eprintln!("warning: the corpus will appear unindexed until this is resolved");
    }

    match cli.command {
        Commands::Add { path, recursive } => run_add(&engine, &path, recursive)?,
        Commands::Remove { id } => {
            let id = resolve_id(&engine, &id)?;
            if engine.remove_document(&id)? {
                println!("Removed {id}.");
            } else {
                println!("No such document.");
            }
        }
        Commands::Activate { id } => {
            let id = resolve_id(&engine, &id)?;
            engine.set_active(&id, true)?;
            println!("Activated {id}.");
        }
        Commands::Deactivate { id } => {
            let id = resolve_id(&engine, &id)?;
            engine.set_active(&id, false)?;
            println!("Deactivated {id}.");
        }
        Commands::Index { progress } => run_index(&engine, progress.as_deref())?,
        Commands::Search {
            query,
            candidates,
            limit,
            json,
        } => run_search(&engine, &query, candidates, limit, json)?,
        Commands::Status => run_status(&engine),
        Commands::Migrate => match migration {
            MigrationOutcome::NoneNeeded => println!("No legacy index found."),
            MigrationOutcome::Migrated { backup } => {
                println!("Legacy index moved to {}.", backup.display());
                println!("Run `docshelf index` to rebuild per-document indexes.");
            }
            MigrationOutcome::Failed { reason } => bail!("migration failed: {reason}"),
        },
    }

    Ok(())
}

/// Load the config file, falling back to defaults when the default path
/// does not exist. An explicit `--config` that cannot be read is an error.
fn load_config(explicit: Option<&Path>) -> anyhow::Result<Config> {
    match explicit {
        Some(path) => config::load_config(path),
        None => {
            let default = config::default_config_path();
            if default.exists() {
                config::load_config(&default)
            } else {
                Ok(Config::default())
            }
        }
    }
}

fn open_engine(cfg: Config) -> anyhow::Result<Engine> {
    let engine = Engine::open(
        cfg,
        Box::new(PlainTextExtractor),
        Box::new(HashingEmbedder::default()),
    )
    .context("failed to open the document corpus")?;
    Ok(engine)
}

fn run_add(engine: &Engine, path: &Path, recursive: bool) -> anyhow::Result<()> {
    if recursive {
        if !path.is_dir() {
            bail!("--recursive requires a directory, got {}", path.display());
        }
        let mut added = 0usize;
        for entry in walkdir::WalkDir::new(path)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
        {
            let ext = entry
                .path()
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or("");
            if matches!(ext, "txt" | "md") {
                engine.add_document(entry.path())?;
                added += 1;
            }
        }
        println!("Registered {added} documents. Run `docshelf index` to index them.");
        return Ok(());
    }

    if !path.is_file() {
        bail!("not a file: {}", path.display());
    }
    let entry = engine.add_document(path)?;
    println!(
        "Registered {} as {}. Run `docshelf index` to index it.",
        entry.file_name, entry.id
    );
    Ok(())
}

fn run_index(engine: &Engine, progress: Option<&str>) -> anyhow::Result<()> {
    let mode = match progress {
        None => ProgressMode::default_for_tty(),
        Some("human") => ProgressMode::Human,
        Some("json") => ProgressMode::Json,
        Some("off") => ProgressMode::Off,
        Some(other) => bail!("unknown progress mode '{other}' (expected human, json, or off)"),
    };

    let summary = engine.index_corpus(mode.reporter().as_ref())?;
    println!(
        "Indexed {} documents ({} failed, {} already up to date).",
        summary.succeeded, summary.failed, summary.skipped
    );
    for failure in &summary.failures {
        eprintln!("  failed: {}: {}", failure.path.display(), failure.reason);
    }
    Ok(())
}

fn run_search(
    engine: &Engine,
    query: &str,
    candidates: Option<usize>,
    limit: Option<usize>,
    json: bool,
) -> anyhow::Result<()> {
    let mut params: RetrievalParams = engine.retrieval_params();
    if let Some(c) = candidates {
        params.max_candidates = c;
    }
    if let Some(l) = limit {
        params.max_results = l;
    }

    let outcome = engine
        .retrieve_with(query, &params, None)
        .context("retrieval failed")?;

    let results = match outcome {
        RetrievalOutcome::NoActiveDocuments => {
            if json {
                println!("{}", serde_json::json!({ "results": [], "empty_corpus": true }));
            } else {
                println!("No active documents. Add some with `docshelf add`.");
            }
            return Ok(());
        }
        RetrievalOutcome::Results(results) => results,
    };

    if json {
        let items: Vec<serde_json::Value> = results
            .iter()
            .map(|r| {
                serde_json::json!({
                    "document": r.document,
                    "file": r.file_name,
                    "similarity": r.similarity,
                    "offset": r.source_offset,
                    "text": r.text,
                })
            })
            .collect();
        println!("{}", serde_json::json!({ "results": items }));
        return Ok(());
    }

    if results.is_empty() {
        println!("No results.");
        return Ok(());
    }
    for (i, result) in results.iter().enumerate() {
        println!("{}. [{:.3}] {}", i + 1, result.similarity, result.file_name);
        println!("    id: {}", result.document);
        println!("    offset: {}", result.source_offset);
        println!(
            "    excerpt: \"{}\"",
            excerpt(&result.text).replace('\n', " ")
        );
        println!();
    }
    Ok(())
}

fn run_status(engine: &Engine) {
    let entries = engine.documents();
    if entries.is_empty() {
        println!("No documents registered.");
        return;
    }
    println!("{} documents:", entries.len());
    for entry in &entries {
        println!(
            "  {}  {}  {}  {}",
            entry.id,
            state_label(entry),
            if entry.active { "active" } else { "inactive" },
            entry.path.display()
        );
    }
}

fn state_label(entry: &RegistryEntry) -> &'static str {
    if entry.is_indexed() {
        "indexed  "
    } else {
        "unindexed"
    }
}

/// Resolve a possibly-abbreviated document id to exactly one registry
/// entry.
fn resolve_id(engine: &Engine, prefix: &str) -> anyhow::Result<DocumentId> {
    let mut matches: Vec<DocumentId> = engine
        .documents()
        .into_iter()
        .filter(|e| e.id.as_str().starts_with(prefix))
        .map(|e| e.id)
        .collect();
    match matches.len() {
        0 => bail!("no document matches id '{prefix}'"),
        1 => Ok(matches.remove(0)),
        n => bail!("id '{prefix}' is ambiguous ({n} matches); use more characters"),
    }
}

fn excerpt(text: &str) -> &str {
    let limit = 160usize.min(text.len());
    let mut end = limit;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}
