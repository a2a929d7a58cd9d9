//! Engine facade: wires the parser registry, store, embedding index, search
//! orchestrator, and alert correlator together behind the calls the CLI (or
//! an embedding application) uses.

use serde::Serialize;
use std::path::Path;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::alerts::AlertCorrelator;
use crate::config::Config;
use crate::database::{AnalysisDatabase, StoreStats};
use crate::embeddings::{build_text, EmbeddingIndexManager, EmbeddingModel, HashingEmbedder};
use crate::errors::{CodeScopeError, Result};
use crate::model::{AlertAnalysisResult, AlertRecord, Language, SearchResult, StructuralRecord};
use crate::parsers::ParserRegistry;
use crate::search::{SearchFilters, SearchOrchestrator, SearchType};

#[derive(Debug, Serialize)]
pub struct Health {
    pub store_connected: bool,
    pub index_loaded: bool,
    pub index_size: usize,
    pub supported_languages: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct FileFailure {
    pub path: String,
    pub error: String,
}

#[derive(Debug, Default, Serialize)]
pub struct RepositorySummary {
    pub total_files: usize,
    pub total_functions: usize,
    pub total_classes: usize,
    pub total_imports: usize,
}

/// Outcome of a repository walk. Per-file failures are collected, not fatal;
/// one unreadable file must never abort the batch.
#[derive(Debug, Serialize)]
pub struct RepositoryAnalysis {
    pub records: Vec<StructuralRecord>,
    pub failures: Vec<FileFailure>,
    pub summary: RepositorySummary,
}

#[derive(Debug, Serialize)]
pub struct EngineStats {
    #[serde(flatten)]
    pub store: StoreStats,
    pub index_size: usize,
    pub embedding_dimensions: usize,
}

pub struct CodeScopeEngine {
    config: Config,
    registry: ParserRegistry,
    db: Arc<Mutex<AnalysisDatabase>>,
    index: Arc<EmbeddingIndexManager>,
    orchestrator: Arc<SearchOrchestrator>,
    correlator: AlertCorrelator,
}

impl CodeScopeEngine {
    /// Engine with the default deterministic embedder.
    pub fn new(config: Config) -> Result<Self> {
        let model = HashingEmbedder::new(config.embedding.dimensions);
        Self::with_model(config, Box::new(model))
    }

    /// Engine with a caller-supplied embedding model.
    pub fn with_model(config: Config, model: Box<dyn EmbeddingModel>) -> Result<Self> {
        let db = Arc::new(Mutex::new(AnalysisDatabase::new(&config.database_path)?));
        let index = Arc::new(EmbeddingIndexManager::new(model));
        index.load(&config.index_path)?;

        let orchestrator = Arc::new(SearchOrchestrator::new(db.clone(), index.clone()));
        let correlator = AlertCorrelator::new(db.clone(), orchestrator.clone());
        Ok(Self {
            config,
            registry: ParserRegistry::new(),
            db,
            index,
            orchestrator,
            correlator,
        })
    }

    /// Parse one file, store the record, and (optionally) index its vector.
    pub fn analyze_file(&self, path: &Path, with_embeddings: bool) -> Result<StructuralRecord> {
        let path_str = path.to_string_lossy().to_string();
        let parser = self.registry.get_parser_for_path(&path_str)?;

        let bytes = std::fs::read(path)?;
        let content = String::from_utf8(bytes)
            .map_err(|e| CodeScopeError::Decode(format!("{path_str}: {e}")))?;
        let record = parser.parse(&content, &path_str)?;

        self.lock_db().upsert_analysis(&record)?;
        if with_embeddings {
            let text = build_text(&record, self.config.embedding.max_text_chars);
            let vector = self
                .index
                .embed(&[text.clone()])?
                .pop()
                .unwrap_or_default();
            self.index.add(&record.file_path, vector, &text)?;
            self.index.persist(&self.config.index_path)?;
        }
        Ok(record)
    }

    /// Walk a directory tree and analyze every supported file, optionally
    /// restricted to one language. Vectors are embedded in one batch and the
    /// index is persisted once at the end.
    pub fn analyze_repository(
        &self,
        root: &Path,
        language_filter: Option<Language>,
        with_embeddings: bool,
    ) -> Result<RepositoryAnalysis> {
        let mut records = Vec::new();
        let mut failures = Vec::new();

        let walker = WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_hidden(e.path()));
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("skipping unreadable entry under {}: {e}", root.display());
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let path_str = entry.path().to_string_lossy().to_string();
            let Ok(parser) = self.registry.get_parser_for_path(&path_str) else {
                continue;
            };
            if language_filter.is_some_and(|l| parser.language() != l) {
                continue;
            }
            match self.parse_and_store(entry.path(), &path_str) {
                Ok(record) => records.push(record),
                Err(e) => {
                    warn!("failed to analyze {path_str}: {e}");
                    failures.push(FileFailure {
                        path: path_str,
                        error: e.to_string(),
                    });
                }
            }
        }

        if with_embeddings && !records.is_empty() {
            let texts: Vec<String> = records
                .iter()
                .map(|r| build_text(r, self.config.embedding.max_text_chars))
                .collect();
            let vectors = self.index.embed(&texts)?;
            for ((record, vector), text) in records.iter().zip(vectors).zip(&texts) {
                self.index.add(&record.file_path, vector, text)?;
            }
            self.index.persist(&self.config.index_path)?;
        }

        let summary = RepositorySummary {
            total_files: records.len(),
            total_functions: records.iter().map(|r| r.functions.len()).sum(),
            total_classes: records.iter().map(|r| r.classes.len()).sum(),
            total_imports: records.iter().map(|r| r.imports.len()).sum(),
        };
        info!(
            "analyzed {} files under {} ({} failures)",
            summary.total_files,
            root.display(),
            failures.len()
        );
        Ok(RepositoryAnalysis {
            records,
            failures,
            summary,
        })
    }

    fn parse_and_store(&self, path: &Path, path_str: &str) -> Result<StructuralRecord> {
        let parser = self.registry.get_parser_for_path(path_str)?;
        let bytes = std::fs::read(path)?;
        let content = String::from_utf8(bytes)
            .map_err(|e| CodeScopeError::Decode(format!("{path_str}: {e}")))?;
        let record = parser.parse(&content, path_str)?;
        self.lock_db().upsert_analysis(&record)?;
        Ok(record)
    }

    /// Search with a textual search type. The type is validated before any
    /// store or index access so an unknown type fails fast.
    pub fn search(
        &self,
        query: &str,
        search_type: &str,
        top_k: usize,
        filters: &SearchFilters,
    ) -> Result<Vec<SearchResult>> {
        let search_type = SearchType::from_str(search_type)?;
        self.orchestrator.search(query, search_type, top_k, filters)
    }

    pub fn analyze_alert(&self, alert: AlertRecord) -> Result<AlertAnalysisResult> {
        self.correlator.analyze_alert(alert)
    }

    pub fn alert_history(&self, limit: usize) -> Result<Vec<AlertRecord>> {
        self.lock_db().alert_history(limit)
    }

    pub fn health(&self) -> Health {
        let store_connected = self.lock_db().ping().is_ok();
        Health {
            store_connected,
            index_loaded: self.index.is_loaded(),
            index_size: self.index.len(),
            supported_languages: self.registry.supported_languages(),
        }
    }

    pub fn stats(&self) -> Result<EngineStats> {
        Ok(EngineStats {
            store: self.lock_db().stats()?,
            index_size: self.index.len(),
            embedding_dimensions: self.index.dimensions(),
        })
    }

    fn lock_db(&self) -> MutexGuard<'_, AnalysisDatabase> {
        self.db.lock().unwrap_or_else(|poisoned| {
            warn!("database lock poisoned; continuing with inner value");
            poisoned.into_inner()
        })
    }
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with('.') && n.len() > 1)
        .unwrap_or(false)
}
