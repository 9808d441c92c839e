//! Text extraction seam.
//!
//! Format-specific extraction (PDF, EPUB, HTML) lives outside the engine;
//! the pipeline only sees the [`TextExtractor`] trait. The bundled
//! [`PlainTextExtractor`] handles UTF-8 text files, which is enough for
//! the CLI and for tests; the surrounding application plugs in richer
//! extractors for binary formats.

use std::path::Path;

use crate::error::ExtractError;

/// Turns a document path into plain text.
pub trait TextExtractor: Send + Sync {
    fn extract(&self, path: &Path) -> Result<String, ExtractError>;
}

/// Reads UTF-8 text files as-is. Non-UTF-8 content is reported as an
/// unsupported format rather than an I/O failure, since it usually means
/// a binary document was handed to the wrong extractor.
pub struct PlainTextExtractor;

impl TextExtractor for PlainTextExtractor {
    fn extract(&self, path: &Path) -> Result<String, ExtractError> {
        match std::fs::read_to_string(path) {
            Ok(text) => Ok(text),
            Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {
                Err(ExtractError::Unsupported(path.to_path_buf()))
            }
            Err(e) => Err(ExtractError::Io {
                path: path.to_path_buf(),
                source: e,
            }),
        }
    }
}
