//! Generic Parser: text fallback for unrecognised languages and files
//! that fail structured/pattern/markdown parsing.
//!
//! Emits one `document` element spanning the whole file, plus `block`
//! elements for heuristically detected comment/doc blocks (runs of
//! consecutive `//`, `#`, or `/* */`-style comment lines).

use crate::element::{disambiguate_ids, Element, ElementType};

pub fn parse(source: &str, file_path: &str, language: &str) -> Vec<Element> {
    let line_count = source.lines().count().max(1) as u32;
    let doc = Element::new(
        ElementType::Document,
        file_path.rsplit('/').next().unwrap_or(file_path),
        file_path,
        1,
        line_count,
        source,
        language,
    );
    let doc_id = doc.id.clone();
    let mut elements = vec![doc];

    elements.extend(comment_blocks(source, file_path, language, &doc_id));
    disambiguate_ids(&mut elements);
    elements
}

fn comment_blocks(source: &str, file_path: &str, language: &str, parent_id: &str) -> Vec<Element> {
    let lines: Vec<&str> = source.lines().collect();
    let mut blocks = Vec::new();
    let mut run_start: Option<usize> = None;

    for (idx, line) in lines.iter().enumerate() {
        let trimmed = line.trim_start();
        let is_comment = trimmed.starts_with("//") || trimmed.starts_with('#') || trimmed.starts_with("/*") || trimmed.starts_with('*');
        if is_comment {
            run_start.get_or_insert(idx);
        } else if let Some(start) = run_start.take() {
            if idx - start >= 2 {
                blocks.push(make_block(&lines, start, idx - 1, file_path, language, parent_id));
            }
        }
    }
    if let Some(start) = run_start {
        if lines.len() - start >= 2 {
            blocks.push(make_block(&lines, start, lines.len() - 1, file_path, language, parent_id));
        }
    }
    blocks
}

fn make_block(lines: &[&str], start: usize, end: usize, file_path: &str, language: &str, parent_id: &str) -> Element {
    let content = lines[start..=end].join("\n");
    Element::new(
        ElementType::Block,
        format!("comment_block_{}", start + 1),
        file_path,
        (start + 1) as u32,
        (end + 1) as u32,
        content,
        language,
    )
    .with_parent(parent_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_single_document_element() {
        let elements = parse("", "a.txt", "text");
        assert_eq!(elements.len(), 1);
        assert_eq!(elements[0].element_type, ElementType::Document);
        assert_eq!(elements[0].content, "");
    }

    #[test]
    fn detects_comment_block() {
        let source = "// line one\n// line two\n// line three\ncode();\n";
        let elements = parse(source, "a.txt", "text");
        let block = elements.iter().find(|e| e.element_type == ElementType::Block);
        assert!(block.is_some());
        assert_eq!(block.unwrap().start_line, 1);
        assert_eq!(block.unwrap().end_line, 3);
    }

    #[test]
    fn single_comment_line_is_not_a_block() {
        let source = "// just one line\ncode();\n";
        let elements = parse(source, "a.txt", "text");
        assert!(!elements.iter().any(|e| e.element_type == ElementType::Block));
    }
}
