// Python parser: functions, classes with methods, imports.

use tree_sitter::Node;

use super::metrics::{compute_cyclomatic_complexity, compute_metrics, CommentStyle};
use super::{first_descendant_of_kind, line_span, new_tree_parser, node_text, SourceParser};
use crate::errors::Result;
use crate::model::{ClassInfo, FunctionInfo, ImportInfo, Language, StructuralRecord};

/// Node kinds counted as decision points. `and`/`or` are the anonymous
/// operator tokens inside `boolean_operator` nodes.
const BRANCH_KINDS: &[&str] = &[
    "if_statement",
    "elif_clause",
    "for_statement",
    "while_statement",
    "except_clause",
    "case_clause",
    "conditional_expression",
    "and",
    "or",
];

const COMMENT_STYLE: CommentStyle = CommentStyle {
    line: "#",
    block: None,
};

pub struct PythonParser;

impl SourceParser for PythonParser {
    fn language(&self) -> Language {
        Language::Python
    }

    fn parse(&self, content: &str, file_path: &str) -> Result<StructuralRecord> {
        let mut parser = new_tree_parser(&tree_sitter_python::LANGUAGE.into())?;

        let mut functions = Vec::new();
        let mut classes = Vec::new();
        let mut imports = Vec::new();
        if let Some(tree) = parser.parse(content, None) {
            walk(
                tree.root_node(),
                content,
                &mut functions,
                &mut classes,
                &mut imports,
            );
        } else {
            tracing::warn!("tree-sitter produced no tree for {file_path}; partial record");
        }

        let complexities: Vec<u32> = functions
            .iter()
            .map(|f| f.cyclomatic_complexity)
            .chain(
                classes
                    .iter()
                    .flat_map(|c: &ClassInfo| c.methods.iter().map(|m| m.cyclomatic_complexity)),
            )
            .collect();
        let metrics = compute_metrics(content, &COMMENT_STYLE, &complexities);

        Ok(StructuralRecord::new(
            file_path.to_string(),
            Language::Python,
            functions,
            classes,
            imports,
            metrics,
        ))
    }
}

fn walk(
    node: Node,
    source: &str,
    functions: &mut Vec<FunctionInfo>,
    classes: &mut Vec<ClassInfo>,
    imports: &mut Vec<ImportInfo>,
) {
    match node.kind() {
        "import_statement" => imports.push(ImportInfo {
            text: node_text(node, source),
            kind: "import".to_string(),
        }),
        "import_from_statement" => imports.push(ImportInfo {
            text: node_text(node, source),
            kind: "from_import".to_string(),
        }),
        "function_definition" => {
            if let Some(func) = function_info(node, source) {
                functions.push(func);
            }
        }
        "class_definition" => {
            if let Some(class) = class_info(node, source) {
                classes.push(class);
            }
        }
        _ => {
            let mut cursor = node.walk();
            for child in node.children(&mut cursor) {
                walk(child, source, functions, classes, imports);
            }
        }
    }
}

fn function_info(node: Node, source: &str) -> Option<FunctionInfo> {
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

fn class_info(node: Node, source: &str) -> Option<ClassInfo> {
    let name = node_text(node.child_by_field_name("name")?, source);
    let mut methods = Vec::new();
    if let Some(body) = node.child_by_field_name("body") {
        let mut cursor = body.walk();
        for child in body.named_children(&mut cursor) {
            let def = match child.kind() {
                "function_definition" => Some(child),
                // Decorated methods wrap the definition.
                "decorated_definition" => child
                    .child_by_field_name("definition")
                    .filter(|d| d.kind() == "function_definition"),
                _ => None,
            };
            if let Some(func) = def.and_then(|d| function_info(d, source)) {
                methods.push(func);
            }
        }
    }
    Some(ClassInfo::new(name, methods))
}

fn parameter_names(params: Node, source: &str) -> Vec<String> {
    let mut names = Vec::new();
    let mut cursor = params.walk();
    for child in params.named_children(&mut cursor) {
        if child.kind() == "identifier" {
            names.push(node_text(child, source));
        } else if let Some(id) = first_descendant_of_kind(child, "identifier") {
            names.push(node_text(id, source));
        }
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> StructuralRecord {
        PythonParser.parse(source, "test.py").expect("parse")
    }

    #[test]
    fn extracts_functions_with_parameters() {
        let record = parse("def greet(name, count=1):\n    return name * count\n");
        assert_eq!(record.functions.len(), 1);
        let func = &record.functions[0];
        assert_eq!(func.name, "greet");
        assert_eq!(func.parameters, vec!["name", "count"]);
        assert_eq!(func.cyclomatic_complexity, 1);
        assert_eq!(func.start_line, 1);
    }

    #[test]
    fn one_if_and_one_for_score_three() {
        let source = "def main():\n    if ready:\n        pass\n    for item in items:\n        pass\n";
        let record = parse(source);
        assert_eq!(record.functions[0].cyclomatic_complexity, 3);
    }

    #[test]
    fn boolean_operators_and_except_count() {
        let source = "def check(a, b):\n    try:\n        return a and b or a\n    except ValueError:\n        return None\n";
        let record = parse(source);
        // 1 + and + or + except
        assert_eq!(record.functions[0].cyclomatic_complexity, 4);
    }

    #[test]
    fn classes_collect_methods_not_free_functions() {
        let source = "class Greeter:\n    def hello(self):\n        pass\n    def bye(self, name):\n        if name:\n            pass\n\ndef outside():\n    pass\n";
        let record = parse(source);
        assert_eq!(record.classes.len(), 1);
        let class = &record.classes[0];
        assert_eq!(class.name, "Greeter");
        assert_eq!(class.methods.len(), 2);
        assert_eq!(class.cyclomatic_complexity, 3); // 1 + (1 + if)
        assert_eq!(record.functions.len(), 1);
        assert_eq!(record.functions[0].name, "outside");
    }

    #[test]
    fn imports_keep_raw_text_and_kind() {
        let source = "import os\nfrom pathlib import Path\n";
        let record = parse(source);
        assert_eq!(record.imports.len(), 2);
        assert_eq!(record.imports[0].text, "import os");
        assert_eq!(record.imports[0].kind, "import");
        assert_eq!(record.imports[1].kind, "from_import");
    }

    #[test]
    fn invalid_syntax_yields_partial_record() {
        let record = parse("def broken(:\n    ???\n\ndef fine():\n    pass\n");
        // The good function still comes out; nothing panics.
        assert!(record.functions.iter().any(|f| f.name == "fine"));
        let m = &record.metrics;
        assert_eq!(
            m.total_lines,
            m.code_lines + m.comment_lines + m.blank_lines
        );
    }

    #[test]
    fn metrics_classify_comment_lines() {
        let record = parse("# header\n\ndef f():\n    pass\n");
        assert_eq!(record.metrics.comment_lines, 1);
        assert_eq!(record.metrics.blank_lines, 1);
        assert_eq!(record.metrics.code_lines, 2);
    }
}
