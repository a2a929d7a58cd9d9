//! Multi-modal search over the analyzed corpus.
//!
//! Three strategies share one entry point: semantic (vector index),
//! function-name (store scan), and complexity (store scan). Results are
//! always hydrated from the store so callers get full records, and every
//! ordering has a deterministic tie-break.

use std::cmp::Ordering;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::warn;

use crate::database::{AnalysisDatabase, AnalysisFilter};
use crate::embeddings::EmbeddingIndexManager;
use crate::errors::{CodeScopeError, Result};
use crate::model::{FunctionInfo, Language, SearchResult, StructuralRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchType {
    Semantic,
    FunctionName,
    Complexity,
}

impl FromStr for SearchType {
    type Err = CodeScopeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "semantic" => Ok(SearchType::Semantic),
            "function_name" => Ok(SearchType::FunctionName),
            "complexity" => Ok(SearchType::Complexity),
            other => Err(CodeScopeError::InvalidSearchType(other.to_string())),
        }
    }
}

/// Optional narrowing applied by every strategy.
#[derive(Debug, Clone, Default)]
pub struct SearchFilters {
    pub language: Option<Language>,
    pub min_complexity: Option<f64>,
    pub max_complexity: Option<f64>,
}

pub struct SearchOrchestrator {
    db: Arc<Mutex<AnalysisDatabase>>,
    index: Arc<EmbeddingIndexManager>,
}

impl SearchOrchestrator {
    pub fn new(db: Arc<Mutex<AnalysisDatabase>>, index: Arc<EmbeddingIndexManager>) -> Self {
        Self { db, index }
    }

    /// Dispatch to the strategy for `search_type`. `top_k` must be positive;
    /// it is clamped to the number of candidates, never an error past zero.
    pub fn search(
        &self,
        query: &str,
        search_type: SearchType,
        top_k: usize,
        filters: &SearchFilters,
    ) -> Result<Vec<SearchResult>> {
        if top_k == 0 {
            return Err(CodeScopeError::InvalidArgument(
                "top_k must be at least 1".to_string(),
            ));
        }
        match search_type {
            SearchType::Semantic => self.semantic_search(query, top_k, filters),
            SearchType::FunctionName => self.function_name_search(query, top_k, filters),
            SearchType::Complexity => self.complexity_search(top_k, filters),
        }
    }

    fn semantic_search(
        &self,
        query: &str,
        top_k: usize,
        filters: &SearchFilters,
    ) -> Result<Vec<SearchResult>> {
        let query_vector = self
            .index
            .embed(&[query.to_string()])?
            .pop()
            .unwrap_or_default();

        // With a post-hoc language filter the index must over-fetch, or
        // matching records behind filtered-out neighbors would be lost.
        let effective_k = if filters.language.is_some() {
            self.index.len()
        } else {
            top_k
        };
        let hits = self.index.search(&query_vector, effective_k)?;

        let db = self.lock_db();
        let mut results = Vec::new();
        for (record_id, score) in hits {
            let Some(record) = db.get_analysis(&record_id)? else {
                // Index and store can drift if a persist raced a crash; a
                // dangling reference is skipped, not fatal.
                warn!("vector index references missing record {record_id}");
                continue;
            };
            if !passes_filters(&record, filters) {
                continue;
            }
            results.push(SearchResult {
                file_path: record.file_path.clone(),
                language: record.language,
                score: score as f64,
                matched_function: None,
                complexity: None,
                record,
            });
            if results.len() == top_k {
                break;
            }
        }
        Ok(results)
    }

    fn function_name_search(
        &self,
        query: &str,
        top_k: usize,
        filters: &SearchFilters,
    ) -> Result<Vec<SearchResult>> {
        let records = self.filtered_records(filters)?;
        let needle = query.to_lowercase();

        let mut results = Vec::new();
        for record in records {
            if let Some((function, score)) = best_name_match(&record, &needle) {
                results.push(SearchResult {
                    file_path: record.file_path.clone(),
                    language: record.language,
                    score,
                    matched_function: Some(function),
                    complexity: None,
                    record,
                });
            }
        }

        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| {
                    let a_len = a.matched_function.as_ref().map_or(0, |f| f.name.len());
                    let b_len = b.matched_function.as_ref().map_or(0, |f| f.name.len());
                    a_len.cmp(&b_len)
                })
                .then_with(|| a.file_path.cmp(&b.file_path))
        });
        results.truncate(top_k);
        Ok(results)
    }

    /// No query text: ranks files by their most complex function or class
    /// within the `[min, max]` window.
    fn complexity_search(&self, top_k: usize, filters: &SearchFilters) -> Result<Vec<SearchResult>> {
        let records = self.filtered_records(filters)?;
        let min = filters.min_complexity.unwrap_or(0.0);
        let max = filters.max_complexity.unwrap_or(f64::MAX);

        let mut results = Vec::new();
        for record in records {
            let best = record
                .all_complexities()
                .map(f64::from)
                .chain(
                    record
                        .classes
                        .iter()
                        .map(|c| f64::from(c.cyclomatic_complexity)),
                )
                .filter(|c| *c >= min && *c <= max)
                .fold(None, |acc: Option<f64>, c| {
                    Some(acc.map_or(c, |best| best.max(c)))
                });
            if let Some(complexity) = best {
                results.push(SearchResult {
                    file_path: record.file_path.clone(),
                    language: record.language,
                    score: 1.0,
                    matched_function: None,
                    complexity: Some(complexity),
                    record,
                });
            }
        }

        results.sort_by(|a, b| {
            b.complexity
                .partial_cmp(&a.complexity)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.file_path.cmp(&b.file_path))
        });
        results.truncate(top_k);
        Ok(results)
    }

    fn filtered_records(&self, filters: &SearchFilters) -> Result<Vec<StructuralRecord>> {
        self.lock_db().search_analysis(&AnalysisFilter {
            language: filters.language,
            ..Default::default()
        })
    }

    fn lock_db(&self) -> MutexGuard<'_, AnalysisDatabase> {
        self.db.lock().unwrap_or_else(|poisoned| {
            warn!("database lock poisoned; continuing with inner value");
            poisoned.into_inner()
        })
    }
}

fn passes_filters(record: &StructuralRecord, filters: &SearchFilters) -> bool {
    if let Some(language) = filters.language {
        if record.language != language {
            return false;
        }
    }
    true
}

/// Exact name match scores 1.0, substring 0.5; among equal scores the
/// shortest name wins so `run` beats `run_with_retries` for query "run".
fn best_name_match(record: &StructuralRecord, needle: &str) -> Option<(FunctionInfo, f64)> {
    let candidates = record.functions.iter().chain(
        record
            .classes
            .iter()
            .flat_map(|class| class.methods.iter()),
    );

    let mut best: Option<(FunctionInfo, f64)> = None;
    for function in candidates {
        let name = function.name.to_lowercase();
        let score = if name == needle {
            1.0
        } else if name.contains(needle) {
            0.5
        } else {
            continue;
        };
        let better = match &best {
            None => true,
            Some((current, current_score)) => {
                score > *current_score
                    || (score == *current_score && function.name.len() < current.name.len())
            }
        };
        if better {
            best = Some((function.clone(), score));
        }
    }
    best
}
