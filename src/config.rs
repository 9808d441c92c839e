use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub cache: CacheConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    /// Root cache directory holding the registry file and one subdirectory
    /// per indexed document.
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    /// Target chunk size in characters. Chunks end on paragraph
    /// boundaries, so actual sizes vary around this value.
    #[serde(default = "default_target_chars")]
    pub target_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            target_chars: default_target_chars(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    /// Maximum documents selected in phase 1 (and therefore maximum index
    /// loads per query).
    #[serde(default = "default_max_candidates")]
    pub max_candidates: usize,
    /// Maximum chunks returned from a query.
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    /// Top-k chunks taken from each candidate document before merging.
    #[serde(default = "default_per_document_k")]
    pub per_document_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            max_candidates: default_max_candidates(),
            max_results: default_max_results(),
            per_document_k: default_per_document_k(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    /// Maximum loaded per-document indexes held in memory at once.
    #[serde(default = "default_max_resident")]
    pub max_resident_documents: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_resident_documents: default_max_resident(),
        }
    }
}

fn default_cache_dir() -> PathBuf {
    home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".docshelf")
        .join("cache")
}

fn default_target_chars() -> usize {
    2000
}
fn default_max_candidates() -> usize {
    10
}
fn default_max_results() -> usize {
    5
}
fn default_per_document_k() -> usize {
    5
}
fn default_max_resident() -> usize {
    16
}

/// Default location of the configuration file.
pub fn default_config_path() -> PathBuf {
    home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".docshelf")
        .join("config.toml")
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let mut config: Config =
        toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    config.storage.cache_dir = expand_tilde(&config.storage.cache_dir);

    if config.chunking.target_chars == 0 {
        anyhow::bail!("chunking.target_chars must be > 0");
    }
    if config.retrieval.max_candidates < 1 {
        anyhow::bail!("retrieval.max_candidates must be >= 1");
    }
    if config.retrieval.max_results < 1 {
        anyhow::bail!("retrieval.max_results must be >= 1");
    }
    if config.retrieval.per_document_k < 1 {
        anyhow::bail!("retrieval.per_document_k must be >= 1");
    }
    if config.cache.max_resident_documents < 1 {
        anyhow::bail!("cache.max_resident_documents must be >= 1");
    }

    Ok(config)
}

/// Expand `~` at the start of a path to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
    let s = path.to_string_lossy();
    if s.starts_with("~/") || s == "~" {
        if let Some(home) = home_dir() {
            return home.join(s.strip_prefix("~/").unwrap_or(""));
        }
    }
    path.to_path_buf()
}

/// Get the user's home directory.
pub fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME").map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = Config::default();
        assert_eq!(config.retrieval.max_candidates, 10);
        assert_eq!(config.retrieval.max_results, 5);
        assert_eq!(config.cache.max_resident_documents, 16);
        assert!(config.chunking.target_chars > 0);
    }

    #[test]
    fn parse_partial_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("docshelf.toml");
        std::fs::write(
            &path,
            r#"
[storage]
cache_dir = "/tmp/shelf-cache"

[retrieval]
max_candidates = 3
"#,
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.storage.cache_dir, PathBuf::from("/tmp/shelf-cache"));
        assert_eq!(config.retrieval.max_candidates, 3);
        // Unspecified sections fall back to defaults.
        assert_eq!(config.retrieval.max_results, 5);
        assert_eq!(config.chunking.target_chars, 2000);
    }

    #[test]
    fn rejects_zero_candidates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("docshelf.toml");
        std::fs::write(&path, "[retrieval]\nmax_candidates = 0\n").unwrap();
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn rejects_zero_chunk_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("docshelf.toml");
        std::fs::write(&path, "[chunking]\ntarget_chars = 0\n").unwrap();
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn expand_tilde_noop_for_absolute() {
        let path = Path::new("/usr/local/share");
        assert_eq!(expand_tilde(path), path.to_path_buf());
    }
}
