// Shared metric and complexity engine.
//
// The algorithms here are language-independent; parsers supply the
// language-specific pieces (comment tokens, branching node kinds) as data.

use tree_sitter::Node;

use crate::model::Metrics;

/// Comment syntax for line classification.
pub struct CommentStyle {
    /// Line-comment prefix ("#", "//").
    pub line: &'static str,
    /// Block-comment delimiters, if the language has them.
    pub block: Option<(&'static str, &'static str)>,
}

/// Classify every line as code, comment, or blank and fold in the
/// per-function complexities. Each line lands in exactly one bucket, so
/// `total_lines == code_lines + comment_lines + blank_lines` holds by
/// construction.
pub fn compute_metrics(source: &str, style: &CommentStyle, complexities: &[u32]) -> Metrics {
    let mut code_lines = 0u32;
    let mut comment_lines = 0u32;
    let mut blank_lines = 0u32;
    let mut in_block = false;

    for line in source.lines() {
        let trimmed = line.trim();
        if in_block {
            comment_lines += 1;
            if let Some((_, end)) = style.block {
                if trimmed.contains(end) {
                    in_block = false;
                }
            }
        } else if trimmed.is_empty() {
            blank_lines += 1;
        } else if trimmed.starts_with(style.line) {
            comment_lines += 1;
        } else if let Some((start, end)) = style.block {
            if trimmed.starts_with(start) {
                comment_lines += 1;
                if !trimmed[start.len()..].contains(end) {
                    in_block = true;
                }
            } else {
                code_lines += 1;
            }
        } else {
            code_lines += 1;
        }
    }

    let average_complexity = if complexities.is_empty() {
        0.0
    } else {
        complexities.iter().map(|c| *c as f64).sum::<f64>() / complexities.len() as f64
    };

    Metrics {
        total_lines: code_lines + comment_lines + blank_lines,
        code_lines,
        comment_lines,
        blank_lines,
        average_complexity,
    }
}

/// Cyclomatic complexity of a function subtree: decision points + 1.
///
/// `branch_kinds` is the per-language table of node kinds that count as
/// decision points (conditionals, loops, catch clauses, case arms, and the
/// anonymous short-circuit operator tokens). A function with no branching
/// constructs scores exactly 1.
pub fn compute_cyclomatic_complexity(node: Node, branch_kinds: &[&str]) -> u32 {
    1 + count_decision_points(node, branch_kinds)
}

fn count_decision_points(node: Node, branch_kinds: &[&str]) -> u32 {
    let mut count = 0;
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if branch_kinds.contains(&child.kind()) {
            count += 1;
        }
        count += count_decision_points(child, branch_kinds);
    }
    count
}
