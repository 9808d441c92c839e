//! Migration from the legacy monolithic-index layout.
//!
//! Earlier versions kept the whole corpus in a single `corpus_index.json`
//! at the cache root (plus sibling `corpus_*` companion files). That
//! design loaded everything into memory on startup and rewrote the whole
//! file on every change. Migration runs once at startup, before any
//! retrieval: legacy files are relocated — never deleted — to a sibling
//! backup directory, and every registry entry is reset to unindexed so
//! the per-document pipeline rebuilds incrementally.

use chrono::Utc;
use std::path::{Path, PathBuf};
use tracing::{error, info};

use crate::registry::Registry;

/// On-disk marker of the legacy monolithic layout.
pub const LEGACY_MARKER: &str = "corpus_index.json";

/// Prefix shared by all legacy top-level files.
const LEGACY_PREFIX: &str = "corpus_";

/// Outcome of a migration check. `Failed` is a reportable state, not an
/// error: the application still starts, the corpus is simply unindexed
/// until the user triggers indexing.
#[derive(Debug)]
pub enum MigrationOutcome {
    /// No legacy layout present; nothing was touched.
    NoneNeeded,
    /// Legacy data relocated here and registry reset.
    Migrated { backup: PathBuf },
    /// Legacy data could not be relocated.
    Failed { reason: String },
}

/// Detect a legacy monolithic index and migrate away from it. Idempotent:
/// once the marker is gone, later runs are no-ops.
pub fn check_and_migrate(cache_dir: &Path, registry: &Registry) -> MigrationOutcome {
    if !cache_dir.join(LEGACY_MARKER).exists() {
        return MigrationOutcome::NoneNeeded;
    }

    let backup = backup_dir(cache_dir);
    match relocate_legacy_files(cache_dir, &backup) {
        Ok(moved) => {
            info!(files = moved, backup = %backup.display(), "relocated legacy index data");
        }
        Err(e) => {
            error!(error = %e, "failed to relocate legacy index data");
            return MigrationOutcome::Failed {
                reason: e.to_string(),
            };
        }
    }

    if let Err(e) = registry.reset_indexed_state() {
        error!(error = %e, "failed to reset registry after migration");
        return MigrationOutcome::Failed {
            reason: e.to_string(),
        };
    }

    MigrationOutcome::Migrated { backup }
}

/// Sibling `<cache_dir>_backup/legacy-<timestamp>/` directory; the
/// timestamp keeps repeated migrations from clobbering earlier backups.
fn backup_dir(cache_dir: &Path) -> PathBuf {
    let name = cache_dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "cache".to_string());
    let parent = cache_dir.parent().unwrap_or(Path::new("."));
    parent
        .join(format!("{name}_backup"))
        .join(format!("legacy-{}", Utc::now().format("%Y%m%d%H%M%S")))
}

/// Move every top-level legacy file into the backup directory.
fn relocate_legacy_files(cache_dir: &Path, backup: &Path) -> Result<usize, std::io::Error> {
    std::fs::create_dir_all(backup)?;
    let mut moved = 0usize;
    for entry in std::fs::read_dir(cache_dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if entry.path().is_file() && name.starts_with(LEGACY_PREFIX) {
            std::fs::rename(entry.path(), backup.join(&name))?;
            moved += 1;
        }
    }
    Ok(moved)
}
