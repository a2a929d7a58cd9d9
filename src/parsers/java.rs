// Java parser: classes with methods and constructors, imports.
//
// Java has no free functions, so the record's `functions` section stays
// empty and every method lives under its class. This keeps average
// complexity from counting a method twice.

use tree_sitter::Node;

use super::metrics::{compute_cyclomatic_complexity, compute_metrics, CommentStyle};
use super::{first_descendant_of_kind, line_span, new_tree_parser, node_text, SourceParser};
use crate::errors::Result;
use crate::model::{ClassInfo, FunctionInfo, ImportInfo, Language, StructuralRecord};

const BRANCH_KINDS: &[&str] = &[
    "if_statement",
    "for_statement",
    "enhanced_for_statement",
    "while_statement",
    "do_statement",
    "catch_clause",
    "switch_block_statement_group",
    "switch_rule",
    "ternary_expression",
    "&&",
    "||",
];

const COMMENT_STYLE: CommentStyle = CommentStyle {
    line: "//",
    block: Some(("/*", "*/")),
};

pub struct JavaParser;

impl SourceParser for JavaParser {
    fn language(&self) -> Language {
        Language::Java
    }

    fn parse(&self, content: &str, file_path: &str) -> Result<StructuralRecord> {
        let mut parser = new_tree_parser(&tree_sitter_java::LANGUAGE.into())?;

        let mut classes = Vec::new();
        let mut imports = Vec::new();
        if let Some(tree) = parser.parse(content, None) {
            walk(tree.root_node(), content, &mut classes, &mut imports);
        } else {
            tracing::warn!("tree-sitter produced no tree for {file_path}; partial record");
        }

        let complexities: Vec<u32> = classes
            .iter()
            .flat_map(|c| c.methods.iter().map(|m| m.cyclomatic_complexity))
            .collect();
        let metrics = compute_metrics(content, &COMMENT_STYLE, &complexities);

        Ok(StructuralRecord::new(
            file_path.to_string(),
            Language::Java,
            Vec::new(),
            classes,
            imports,
            metrics,
        ))
    }
}

fn walk(node: Node, source: &str, classes: &mut Vec<ClassInfo>, imports: &mut Vec<ImportInfo>) {
    match node.kind() {
        "import_declaration" => {
            let mut cursor = node.walk();
            let is_static = node.children(&mut cursor).any(|c| c.kind() == "static");
            imports.push(ImportInfo {
                text: node_text(node, source),
                kind: if is_static { "static_import" } else { "import" }.to_string(),
            });
        }
        "class_declaration" => {
            if let Some(class) = class_info(node, source) {
                classes.push(class);
            }
            // Nested classes are reported as their own entries.
            if let Some(body) = node.child_by_field_name("body") {
                let mut cursor = body.walk();
                for child in body.named_children(&mut cursor) {
                    if child.kind() == "class_declaration" {
                        walk(child, source, classes, imports);
                    }
                }
            }
        }
        _ => {
            let mut cursor = node.walk();
            for child in node.children(&mut cursor) {
                walk(child, source, classes, imports);
            }
        }
    }
}

fn class_info(node: Node, source: &str) -> Option<ClassInfo> {
    let name = node_text(node.child_by_field_name("name")?, source);
    let mut methods = Vec::new();
    if let Some(body) = node.child_by_field_name("body") {
        let mut cursor = body.walk();
        for child in body.named_children(&mut cursor) {
            if matches!(child.kind(), "method_declaration" | "constructor_declaration") {
                if let Some(method) = method_info(child, source) {
                    methods.push(method);
                }
            }
        }
    }
    Some(ClassInfo::new(name, methods))
}

fn method_info(node: Node, source: &str) -> Option<FunctionInfo> {
    let name = node_text(node.child_by_field_name("name")?, source);
    let parameters = node
        .child_by_field_name("parameters")
        .map(|p| parameter_names(p, source))
        .unwrap_or_default();
    let (start_line, end_line) = line_span(node);
    Some(FunctionInfo {
        name,
        parameters,
        start_line,
        end_line,
        cyclomatic_complexity: compute_cyclomatic_complexity(node, BRANCH_KINDS),
    })
}

fn parameter_names(params: Node, source: &str) -> Vec<String> {
    let mut names = Vec::new();
    let mut cursor = params.walk();
    for child in params.named_children(&mut cursor) {
        if let Some(name) = child.child_by_field_name("name") {
            names.push(node_text(name, source));
        } else if let Some(id) = first_descendant_of_kind(child, "identifier") {
            names.push(node_text(id, source));
        }
    }
    names
}
