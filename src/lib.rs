//! codescope: structural code analysis with semantic search and alert
//! correlation.
//!
//! The pipeline: tree-sitter parsers extract a language-agnostic
//! [`model::StructuralRecord`] per source file, the SQLite store keeps the
//! records, the embedding index keeps one vector per analyzed path, and the
//! search orchestrator answers semantic, function-name, and complexity
//! queries over both. [`engine::CodeScopeEngine`] wires it all together.

pub mod alerts;
pub mod config;
pub mod database;
pub mod embeddings;
pub mod engine;
pub mod errors;
pub mod model;
pub mod parsers;
pub mod search;

pub use config::Config;
pub use engine::CodeScopeEngine;
pub use errors::{CodeScopeError, Result};
pub use model::{
    AlertAnalysisResult, AlertRecord, ClassInfo, FunctionInfo, ImportInfo, Language, Metrics,
    SearchResult, Severity, StructuralRecord,
};
pub use search::{SearchFilters, SearchType};
