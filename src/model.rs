// Shared data model for the analysis pipeline.
//
// Every language parser populates the same `StructuralRecord` schema so the
// store, the embedding index, and the search strategies never need to know
// which language a file was written in.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::CodeScopeError;

/// Languages with a registered parser.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Language {
    Python,
    Go,
    Java,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Python => "python",
            Language::Go => "go",
            Language::Java => "java",
        }
    }

    /// File extensions this language claims, without the leading dot.
    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            Language::Python => &["py"],
            Language::Go => &["go"],
            Language::Java => &["java"],
        }
    }

    pub fn all() -> &'static [Language] {
        &[Language::Python, Language::Go, Language::Java]
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Language {
    type Err = CodeScopeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "python" => Ok(Language::Python),
            "go" => Ok(Language::Go),
            "java" => Ok(Language::Java),
            other => Err(CodeScopeError::UnsupportedLanguage(other.to_string())),
        }
    }
}

/// One extracted function or method.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FunctionInfo {
    pub name: String,
    pub parameters: Vec<String>,
    /// 1-based line of the definition.
    pub start_line: u32,
    /// 1-based line of the last line of the definition.
    pub end_line: u32,
    /// Decision points + 1; never below 1.
    pub cyclomatic_complexity: u32,
}

/// One extracted class (or struct with receiver methods, for Go).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClassInfo {
    pub name: String,
    pub methods: Vec<FunctionInfo>,
    /// Sum of method complexities, floored at 1.
    pub cyclomatic_complexity: u32,
}

impl ClassInfo {
    pub fn new(name: String, methods: Vec<FunctionInfo>) -> Self {
        let aggregate: u32 = methods.iter().map(|m| m.cyclomatic_complexity).sum();
        Self {
            name,
            methods,
            cyclomatic_complexity: aggregate.max(1),
        }
    }
}

/// One raw import statement.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImportInfo {
    pub text: String,
    /// Language-dependent flavor: "import", "from_import", "static_import", ...
    pub kind: String,
}

/// File-level line and complexity statistics.
///
/// Invariant: `total_lines == code_lines + comment_lines + blank_lines`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Metrics {
    pub total_lines: u32,
    pub code_lines: u32,
    pub comment_lines: u32,
    pub blank_lines: u32,
    /// Mean over all function and method complexities; 0.0 if there are none.
    pub average_complexity: f64,
}

/// The language-agnostic summary of one analyzed source file.
///
/// `file_path` is the unique key: re-analysis of the same path upserts the
/// stored record in place rather than duplicating it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StructuralRecord {
    pub file_path: String,
    pub language: Language,
    pub functions: Vec<FunctionInfo>,
    pub classes: Vec<ClassInfo>,
    pub imports: Vec<ImportInfo>,
    pub metrics: Metrics,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StructuralRecord {
    pub fn new(
        file_path: String,
        language: Language,
        functions: Vec<FunctionInfo>,
        classes: Vec<ClassInfo>,
        imports: Vec<ImportInfo>,
        metrics: Metrics,
    ) -> Self {
        let now = Utc::now();
        Self {
            file_path,
            language,
            functions,
            classes,
            imports,
            metrics,
            created_at: now,
            updated_at: now,
        }
    }

    /// All function and method complexities, flattened.
    pub fn all_complexities(&self) -> impl Iterator<Item = u32> + '_ {
        self.functions
            .iter()
            .map(|f| f.cyclomatic_complexity)
            .chain(
                self.classes
                    .iter()
                    .flat_map(|c| c.methods.iter().map(|m| m.cyclomatic_complexity)),
            )
    }
}

/// Alert severity levels.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl FromStr for Severity {
    type Err = CodeScopeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            "critical" => Ok(Severity::Critical),
            other => Err(CodeScopeError::InvalidArgument(format!(
                "unknown severity: {other}"
            ))),
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An incoming alert to correlate against the analyzed corpus.
/// Immutable once stored; alert history is append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertRecord {
    pub alert_type: String,
    pub alert_message: String,
    #[serde(default)]
    pub file_path: Option<String>,
    #[serde(default)]
    pub line_number: Option<u32>,
    pub severity: Severity,
    pub created_at: DateTime<Utc>,
}

impl AlertRecord {
    pub fn new(
        alert_type: impl Into<String>,
        alert_message: impl Into<String>,
        severity: Severity,
    ) -> Self {
        Self {
            alert_type: alert_type.into(),
            alert_message: alert_message.into(),
            file_path: None,
            line_number: None,
            severity,
            created_at: Utc::now(),
        }
    }
}

/// One ranked hit from the search orchestrator, hydrated with the stored
/// record so callers never need a second round trip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub file_path: String,
    pub language: Language,
    pub score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_function: Option<FunctionInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub complexity: Option<f64>,
    pub record: StructuralRecord,
}

/// Outcome of correlating one alert against the corpus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertAnalysisResult {
    pub alert_id: i64,
    pub alert: AlertRecord,
    pub related_code: Vec<SearchResult>,
    pub insights: Vec<String>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn language_round_trips_case_insensitively() {
        assert_eq!("Python".parse::<Language>().unwrap(), Language::Python);
        assert_eq!("GO".parse::<Language>().unwrap(), Language::Go);
        assert_eq!(Language::Java.as_str(), "java");
        assert!("cobol".parse::<Language>().is_err());
    }

    #[test]
    fn class_complexity_is_sum_of_methods_floored_at_one() {
        let method = |c: u32| FunctionInfo {
            name: "m".into(),
            parameters: vec![],
            start_line: 1,
            end_line: 2,
            cyclomatic_complexity: c,
        };
        let class = ClassInfo::new("C".into(), vec![method(2), method(3)]);
        assert_eq!(class.cyclomatic_complexity, 5);

        let empty = ClassInfo::new("E".into(), vec![]);
        assert_eq!(empty.cyclomatic_complexity, 1);
    }

    #[test]
    fn all_complexities_covers_functions_and_methods() {
        let f = FunctionInfo {
            name: "f".into(),
            parameters: vec![],
            start_line: 1,
            end_line: 1,
            cyclomatic_complexity: 4,
        };
        let record = StructuralRecord::new(
            "a.py".into(),
            Language::Python,
            vec![f.clone()],
            vec![ClassInfo::new("C".into(), vec![f])],
            vec![],
            Metrics::default(),
        );
        let values: Vec<u32> = record.all_complexities().collect();
        assert_eq!(values, vec![4, 4]);
    }
}
