// Go parser: functions, receiver methods grouped under their receiver type,
// struct declarations, imports.

use tree_sitter::Node;

use super::metrics::{compute_cyclomatic_complexity, compute_metrics, CommentStyle};
use super::{first_descendant_of_kind, line_span, new_tree_parser, node_text, SourceParser};
use crate::errors::Result;
use crate::model::{ClassInfo, FunctionInfo, ImportInfo, Language, StructuralRecord};

const BRANCH_KINDS: &[&str] = &[
    "if_statement",
    "for_statement",
    "expression_case",
    "type_case",
    "communication_case",
    "&&",
    "||",
];

const COMMENT_STYLE: CommentStyle = CommentStyle {
    line: "//",
    block: Some(("/*", "*/")),
};

pub struct GoParser;

#[derive(Default)]
struct Collector {
    functions: Vec<FunctionInfo>,
    imports: Vec<ImportInfo>,
    /// Struct names in declaration order.
    structs: Vec<String>,
    /// (receiver type, method) pairs in declaration order.
    methods: Vec<(String, FunctionInfo)>,
}

impl SourceParser for GoParser {
    fn language(&self) -> Language {
        Language::Go
    }

    fn parse(&self, content: &str, file_path: &str) -> Result<StructuralRecord> {
        let mut parser = new_tree_parser(&tree_sitter_go::LANGUAGE.into())?;

        let mut collector = Collector::default();
        if let Some(tree) = parser.parse(content, None) {
            walk(tree.root_node(), content, &mut collector);
        } else {
            tracing::warn!("tree-sitter produced no tree for {file_path}; partial record");
        }

        let classes = collector.assemble_classes();
        let complexities: Vec<u32> = collector
            .functions
            .iter()
            .map(|f| f.cyclomatic_complexity)
            .chain(
                classes
                    .iter()
                    .flat_map(|c| c.methods.iter().map(|m| m.cyclomatic_complexity)),
            )
            .collect();
        let metrics = compute_metrics(content, &COMMENT_STYLE, &complexities);

        Ok(StructuralRecord::new(
            file_path.to_string(),
            Language::Go,
            collector.functions,
            classes,
            collector.imports,
            metrics,
        ))
    }
}

impl Collector {
    /// Structs come first in declaration order; receiver types without a
    /// struct declaration in this file follow in first-mention order.
    fn assemble_classes(&self) -> Vec<ClassInfo> {
        let mut order = self.structs.clone();
        for (receiver, _) in &self.methods {
            if !order.contains(receiver) {
                order.push(receiver.clone());
            }
        }

        order
            .into_iter()
            .map(|name| {
                let methods = self
                    .methods
                    .iter()
                    .filter(|(receiver, _)| *receiver == name)
                    .map(|(_, method)| method.clone())
                    .collect();
                ClassInfo::new(name, methods)
            })
            .collect()
    }
}

fn walk(node: Node, source: &str, collector: &mut Collector) {
    match node.kind() {
        "import_declaration" => collect_imports(node, source, &mut collector.imports),
        "function_declaration" => {
            if let Some(func) = function_info(node, source) {
                collector.functions.push(func);
            }
        }
        "method_declaration" => {
            if let Some(func) = function_info(node, source) {
                if let Some(receiver) = receiver_type(node, source) {
                    collector.methods.push((receiver, func));
                } else {
                    collector.functions.push(func);
                }
            }
        }
        "type_declaration" => {
            let mut cursor = node.walk();
            for spec in node.named_children(&mut cursor) {
                if spec.kind() != "type_spec" {
                    continue;
                }
                let is_struct = spec
                    .child_by_field_name("type")
                    .map(|t| t.kind() == "struct_type")
                    .unwrap_or(false);
                if is_struct {
                    if let Some(name) = spec.child_by_field_name("name") {
                        collector.structs.push(node_text(name, source));
                    }
                }
            }
        }
        _ => {
            let mut cursor = node.walk();
            for child in node.children(&mut cursor) {
                walk(child, source, collector);
            }
        }
    }
}

fn collect_imports(node: Node, source: &str, imports: &mut Vec<ImportInfo>) {
    let mut specs = Vec::new();
    collect_descendants_of_kind(node, "import_spec", &mut specs);
    if specs.is_empty() {
        imports.push(ImportInfo {
            text: node_text(node, source),
            kind: "import".to_string(),
        });
        return;
    }
    for spec in specs {
        imports.push(ImportInfo {
            text: node_text(spec, source),
            kind: "import".to_string(),
        });
    }
}

fn collect_descendants_of_kind<'tree>(node: Node<'tree>, kind: &str, out: &mut Vec<Node<'tree>>) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == kind {
            out.push(child);
        }
        collect_descendants_of_kind(child, kind, out);
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

/// Receiver type name, pointer indirection stripped.
fn receiver_type(node: Node, source: &str) -> Option<String> {
    let receiver = node.child_by_field_name("receiver")?;
    first_descendant_of_kind(receiver, "type_identifier").map(|t| node_text(t, source))
}

fn parameter_names(params: Node, source: &str) -> Vec<String> {
    let mut names = Vec::new();
    let mut cursor = params.walk();
    for declaration in params.named_children(&mut cursor) {
        let mut inner = declaration.walk();
        for child in declaration.children(&mut inner) {
            if child.kind() == "identifier" {
                names.push(node_text(child, source));
            }
        }
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> StructuralRecord {
        GoParser.parse(source, "test.go").expect("parse")
    }

    #[test]
    fn extracts_functions_with_grouped_parameters() {
        let source = "package main\n\nfunc add(a, b int, label string) int {\n\treturn a + b\n}\n";
        let record = parse(source);
        assert_eq!(record.functions.len(), 1);
        let func = &record.functions[0];
        assert_eq!(func.name, "add");
        assert_eq!(func.parameters, vec!["a", "b", "label"]);
        assert_eq!(func.cyclomatic_complexity, 1);
    }

    #[test]
    fn one_if_and_one_for_score_three() {
        let source = "package main\n\nfunc main() {\n\tif ready {\n\t\treturn\n\t}\n\tfor i := 0; i < 10; i++ {\n\t}\n}\n";
        let record = parse(source);
        assert_eq!(record.functions[0].cyclomatic_complexity, 3);
    }

    #[test]
    fn short_circuit_and_switch_cases_count() {
        let source = "package main\n\nfunc pick(a, b bool, n int) int {\n\tif a && b {\n\t\treturn 0\n\t}\n\tswitch n {\n\tcase 1:\n\t\treturn 1\n\tcase 2:\n\t\treturn 2\n\tdefault:\n\t\treturn 3\n\t}\n}\n";
        let record = parse(source);
        // 1 + if + && + two expression cases (default is not a decision)
        assert_eq!(record.functions[0].cyclomatic_complexity, 5);
    }

    #[test]
    fn receiver_methods_group_under_struct() {
        let source = "package main\n\ntype Server struct {\n\taddr string\n}\n\nfunc (s *Server) Start() error {\n\tif s.addr == \"\" {\n\t\treturn nil\n\t}\n\treturn nil\n}\n\nfunc (s Server) Stop() {}\n";
        let record = parse(source);
        assert_eq!(record.classes.len(), 1);
        let class = &record.classes[0];
        assert_eq!(class.name, "Server");
        assert_eq!(class.methods.len(), 2);
        assert_eq!(class.cyclomatic_complexity, 3); // (1 + if) + 1
        assert!(record.functions.is_empty());
    }

    #[test]
    fn grouped_imports_become_individual_entries() {
        let source = "package main\n\nimport (\n\t\"fmt\"\n\t\"os\"\n)\n\nimport \"strings\"\n";
        let record = parse(source);
        let texts: Vec<&str> = record.imports.iter().map(|i| i.text.as_str()).collect();
        assert_eq!(texts, vec!["\"fmt\"", "\"os\"", "\"strings\""]);
    }

    #[test]
    fn block_comments_counted_in_metrics() {
        let source = "package main\n\n/*\ndoc block\n*/\nfunc f() {}\n";
        let record = parse(source);
        assert_eq!(record.metrics.comment_lines, 3);
        let m = &record.metrics;
        assert_eq!(
            m.total_lines,
            m.code_lines + m.comment_lines + m.blank_lines
        );
    }
}
