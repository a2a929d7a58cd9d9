//! Process configuration.
//!
//! All state is wired explicitly at startup from this struct; nothing reads
//! ambient globals, so tests can point the engine at temp dirs and a fake
//! embedding model.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::errors::{CodeScopeError, Result};

pub const DEFAULT_EMBEDDING_DIMENSIONS: usize = 384;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// SQLite database holding structural records and alert history.
    pub database_path: PathBuf,
    /// Serialized vector index (vectors + record-id mapping).
    pub index_path: PathBuf,
    pub embedding: EmbeddingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Vector dimensionality, fixed at process start.
    pub dimensions: usize,
    /// Character budget for embedding input text.
    pub max_text_chars: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from(".codescope/analysis.db"),
            index_path: PathBuf::from(".codescope/index.json"),
            embedding: EmbeddingConfig::default(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
            max_text_chars: 8192,
        }
    }
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        toml::from_str(&raw)
            .map_err(|e| CodeScopeError::InvalidArgument(format!("bad config {}: {e}", path.display())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = Config::default();
        assert_eq!(config.embedding.dimensions, DEFAULT_EMBEDDING_DIMENSIONS);
        assert!(config.embedding.max_text_chars > 0);
    }

    #[test]
    fn parses_partial_toml() {
        let config: Config =
            toml::from_str("database_path = \"/tmp/x.db\"").expect("partial config");
        assert_eq!(config.database_path, PathBuf::from("/tmp/x.db"));
        assert_eq!(config.embedding.dimensions, DEFAULT_EMBEDDING_DIMENSIONS);
    }
}
