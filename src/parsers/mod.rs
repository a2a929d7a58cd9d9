// Language parser capability set.
//
// Each supported language implements `SourceParser` against its own
// tree-sitter grammar and delegates line/complexity statistics to the shared
// metrics engine. Parsers are stateless after setup; the registry caches one
// instance per language and hands out shared references.

pub mod go;
pub mod java;
pub mod metrics;
pub mod python;
pub mod registry;

use std::path::Path;
use tree_sitter::Node;

use crate::errors::{CodeScopeError, Result};
use crate::model::{Language, StructuralRecord};

pub use registry::ParserRegistry;

/// Capability contract all language parsers implement.
///
/// `parse` must tolerate syntactically invalid input by returning a
/// best-effort partial record (empty sections where extraction fails) so a
/// repository scan never halts on one bad file.
pub trait SourceParser: Send + Sync {
    fn language(&self) -> Language;

    fn parse(&self, content: &str, file_path: &str) -> Result<StructuralRecord>;

    /// Accepts either a language name or a file path.
    fn supports(&self, path_or_language: &str) -> bool {
        let needle = path_or_language.to_ascii_lowercase();
        if needle == self.language().as_str() {
            return true;
        }
        Path::new(&needle)
            .extension()
            .and_then(|e| e.to_str())
            .map(|ext| self.language().extensions().contains(&ext))
            .unwrap_or(false)
    }
}

/// Build a tree-sitter parser configured for the given grammar.
///
/// Parsers are constructed per call; grammar setup is cheap and this keeps
/// the `SourceParser` implementations free of interior mutability.
pub(crate) fn new_tree_parser(language: &tree_sitter::Language) -> Result<tree_sitter::Parser> {
    let mut parser = tree_sitter::Parser::new();
    parser
        .set_language(language)
        .map_err(|e| CodeScopeError::Parse(format!("grammar setup failed: {e}")))?;
    Ok(parser)
}

pub(crate) fn node_text(node: Node, source: &str) -> String {
    node.utf8_text(source.as_bytes()).unwrap_or("").to_string()
}

/// Depth-first search for the first descendant of the given kind.
pub(crate) fn first_descendant_of_kind<'tree>(
    node: Node<'tree>,
    kind: &str,
) -> Option<Node<'tree>> {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == kind {
            return Some(child);
        }
        if let Some(found) = first_descendant_of_kind(child, kind) {
            return Some(found);
        }
    }
    None
}

/// 1-based line span of a node.
pub(crate) fn line_span(node: Node) -> (u32, u32) {
    (
        node.start_position().row as u32 + 1,
        node.end_position().row as u32 + 1,
    )
}
