// Text-representation builder.
//
// Renders a structural record into the natural-language string fed to the
// embedding model. Pure and deterministic: the same record always yields the
// same bytes, which downstream tests rely on for reproducible vectors.

use crate::model::StructuralRecord;

/// Fixed composition order: header, functions, classes, imports. Truncation
/// drops from the end (imports first) to preserve the higher-signal
/// function/class sections, and always cuts on a char boundary.
pub fn build_text(record: &StructuralRecord, max_chars: usize) -> String {
    let mut parts = Vec::new();

    parts.push(format!(
        "File: {} Language: {}",
        record.file_path, record.language
    ));

    for func in &record.functions {
        let mut text = format!("Function: {}", func.name);
        if !func.parameters.is_empty() {
            text.push_str(" Parameters: ");
            text.push_str(&func.parameters.join(", "));
        }
        parts.push(text);
    }

    for class in &record.classes {
        let mut text = format!("Class: {}", class.name);
        if !class.methods.is_empty() {
            text.push_str(" Methods: ");
            let names: Vec<&str> = class.methods.iter().map(|m| m.name.as_str()).collect();
            text.push_str(&names.join(", "));
        }
        parts.push(text);
    }

    if !record.imports.is_empty() {
        let imports: Vec<&str> = record.imports.iter().map(|i| i.text.as_str()).collect();
        parts.push(format!("Imports: {}", imports.join(" ")));
    }

    let mut text = parts.join(" ");
    if text.len() > max_chars {
        let mut cut = max_chars;
        while !text.is_char_boundary(cut) {
            cut -= 1;
        }
        text.truncate(cut);
    }
    text
}
