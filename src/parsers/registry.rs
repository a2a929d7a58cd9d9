// Parser registry: resolves a language name or file path to a shared parser
// instance. One instance is cached per language; parsers are stateless after
// setup so reuse is safe.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use super::go::GoParser;
use super::java::JavaParser;
use super::python::PythonParser;
use super::SourceParser;
use crate::errors::{CodeScopeError, Result};
use crate::model::Language;

pub struct ParserRegistry {
    parsers: HashMap<Language, Arc<dyn SourceParser>>,
    /// Extension (without dot) to language; first match wins.
    extensions: Vec<(String, Language)>,
}

impl Default for ParserRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ParserRegistry {
    /// Registry with the shipped languages. A new language is added by
    /// registering a new parser, not by modifying existing ones.
    pub fn new() -> Self {
        let mut registry = Self {
            parsers: HashMap::new(),
            extensions: Vec::new(),
        };
        registry.register(Arc::new(PythonParser));
        registry.register(Arc::new(GoParser));
        registry.register(Arc::new(JavaParser));
        registry
    }

    pub fn register(&mut self, parser: Arc<dyn SourceParser>) {
        let language = parser.language();
        for ext in language.extensions() {
            self.extensions.push((ext.to_string(), language));
        }
        self.parsers.insert(language, parser);
    }

    /// Exact language-name lookup, case-insensitive.
    pub fn get_parser(&self, language_name: &str) -> Result<Arc<dyn SourceParser>> {
        let language: Language = language_name.parse()?;
        self.parsers
            .get(&language)
            .cloned()
            .ok_or_else(|| CodeScopeError::UnsupportedLanguage(language_name.to_string()))
    }

    /// Resolve by file extension via the extension table.
    pub fn get_parser_for_path(&self, path: &str) -> Result<Arc<dyn SourceParser>> {
        let ext = Path::new(path)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .ok_or_else(|| CodeScopeError::UnsupportedLanguage(path.to_string()))?;

        let language = self
            .extensions
            .iter()
            .find(|(candidate, _)| *candidate == ext)
            .map(|(_, language)| *language)
            .ok_or_else(|| CodeScopeError::UnsupportedLanguage(path.to_string()))?;

        self.parsers
            .get(&language)
            .cloned()
            .ok_or_else(|| CodeScopeError::UnsupportedLanguage(path.to_string()))
    }

    pub fn is_supported_path(&self, path: &str) -> bool {
        self.get_parser_for_path(path).is_ok()
    }

    pub fn supported_languages(&self) -> Vec<String> {
        let mut names: Vec<String> = self.parsers.keys().map(|l| l.to_string()).collect();
        names.sort();
        names
    }
}
