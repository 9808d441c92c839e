//! Indexing progress reporting.
//!
//! Reports observable progress during corpus indexing so users see which
//! document is being processed and how much is left. Progress is emitted
//! on **stderr** so stdout remains parseable for scripts. Reporting is
//! fire-and-observe: it never affects indexing outcomes.

use std::io::Write;

/// A single progress event for a corpus indexing run.
#[derive(Clone, Debug)]
pub enum IndexProgressEvent {
    /// A corpus run is starting; `total` documents need (re-)indexing.
    Started { total: u64 },
    /// Document `n` of `total` is being indexed.
    Indexing {
        file_name: String,
        n: u64,
        total: u64,
    },
    /// The run finished with these aggregate counts.
    Finished {
        succeeded: u64,
        failed: u64,
        skipped: u64,
    },
}

/// Reports indexing progress. Implementations write to stderr (human or
/// JSON).
pub trait ProgressReporter: Send + Sync {
    /// Emit a progress event. Called from the indexing pipeline.
    fn report(&self, event: IndexProgressEvent);
}

/// Human-friendly progress on stderr: "index  3 / 12  report.pdf".
pub struct StderrProgress;

impl ProgressReporter for StderrProgress {
    fn report(&self, event: IndexProgressEvent) {
        let line = match &event {
            IndexProgressEvent::Started { total } => {
                format!("index  {} documents to process\n", total)
            }
            IndexProgressEvent::Indexing {
                file_name,
                n,
                total,
            } => {
                format!("index  {} / {}  {}\n", n, total, file_name)
            }
            IndexProgressEvent::Finished {
                succeeded,
                failed,
                skipped,
            } => {
                format!(
                    "index  done: {} indexed, {} failed, {} up to date\n",
                    succeeded, failed, skipped
                )
            }
        };
        let _ = std::io::stderr().lock().write_all(line.as_bytes());
        let _ = std::io::stderr().lock().flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl ProgressReporter for JsonProgress {
    fn report(&self, event: IndexProgressEvent) {
        let obj = match &event {
            IndexProgressEvent::Started { total } => serde_json::json!({
                "event": "progress",
                "phase": "started",
                "total": total
            }),
            IndexProgressEvent::Indexing {
                file_name,
                n,
                total,
            } => serde_json::json!({
                "event": "progress",
                "phase": "indexing",
                "file": file_name,
                "n": n,
                "total": total
            }),
            IndexProgressEvent::Finished {
                succeeded,
                failed,
                skipped,
            } => serde_json::json!({
                "event": "progress",
                "phase": "finished",
                "succeeded": succeeded,
                "failed": failed,
                "skipped": skipped
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let _ = writeln!(std::io::stderr().lock(), "{}", line);
            let _ = std::io::stderr().lock().flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn report(&self, _event: IndexProgressEvent) {}
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    /// Build a reporter for this mode.
    pub fn reporter(&self) -> Box<dyn ProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}
