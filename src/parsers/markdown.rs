//! Markdown Parser: ATX/Setext heading hierarchy, per spec §4.3.
//!
//! No teacher equivalent exists for this tier; the tree-walking shape
//! (linear scan building a parent stack) follows the general dispatch
//! style of `parsers::mod`'s per-language registry, generalized to a
//! heading-level stack instead of an AST.

use std::sync::LazyLock;
use regex::Regex;

use crate::element::{disambiguate_ids, Element, ElementType};

static ATX_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(#{1,6})\s+(.*)$").unwrap());
static INLINE_MARKUP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*([^*]+)\*\*|\*([^*]+)\*|`([^`]+)`|\[([^\]]*)\]\([^)]*\)").unwrap());

struct StackEntry {
    level: u8,
    heading_id: String,
}

/// Parse Markdown source into a heading/section hierarchy. The second
/// value is `true` when the source held no headings to build a
/// hierarchy from and the result fell back to a single whole-file
/// `document` element, per §4.3.
pub fn parse(source: &str, file_path: &str) -> (Vec<Element>, bool) {
    let lines: Vec<&str> = source.lines().collect();
    let line_count = lines.len().max(1) as u32;

    if lines.is_empty() {
        return (vec![Element::new(ElementType::Document, doc_name(file_path), file_path, 1, 1, "", "markdown")], false);
    }

    let mut elements = Vec::new();
    let mut stack: Vec<StackEntry> = Vec::new();
    let mut headings: Vec<(u32, u8, String, String, String)> = Vec::new(); // (line, level, clean_name, raw, content-placeholder)

    let mut i = 0usize;
    while i < lines.len() {
        let line = lines[i];
        if let Some(caps) = ATX_RE.captures(line) {
            let level = caps[1].len() as u8;
            let raw = caps[2].trim().to_string();
            let clean = strip_inline_markup(&raw);
            headings.push(((i + 1) as u32, level, clean, raw, String::new()));
            i += 1;
            continue;
        }
        // Setext: a non-empty line followed by a line of all '=' (level 1) or '-' (level 2)
        if i + 1 < lines.len() {
            let next = lines[i + 1].trim();
            if !next.is_empty() && !line.trim().is_empty() {
                if next.chars().all(|c| c == '=') {
                    let raw = line.trim().to_string();
                    let clean = strip_inline_markup(&raw);
                    headings.push(((i + 1) as u32, 1, clean, raw, String::new()));
                    i += 2;
                    continue;
                }
                if next.chars().all(|c| c == '-') && next.len() >= 1 {
                    let raw = line.trim().to_string();
                    let clean = strip_inline_markup(&raw);
                    headings.push(((i + 1) as u32, 2, clean, raw, String::new()));
                    i += 2;
                    continue;
                }
            }
        }
        i += 1;
    }

    if headings.is_empty() {
        return (
            vec![Element::new(ElementType::Document, doc_name(file_path), file_path, 1, line_count, source, "markdown")],
            true,
        );
    }

    for idx in 0..headings.len() {
        let (line, level, ref clean, ref raw, _) = headings[idx];

        while let Some(top) = stack.last() {
            if top.level >= level {
                stack.pop();
            } else {
                break;
            }
        }
        let parent_heading = stack.last().map(|e| e.heading_id.clone());

        let mut heading_el = Element::new(ElementType::Heading, clean.clone(), file_path, line, line, raw.clone(), "markdown")
            .with_metadata("level", serde_json::json!(level))
            .with_metadata("raw_heading", serde_json::json!(raw));
        if let Some(ref parent) = parent_heading {
            heading_el = heading_el.with_parent(parent.clone());
        }
        let heading_id = heading_el.id.clone();

        // Section spans from the line after this heading up to (not
        // including) the next heading with level <= this one, or EOF.
        let section_start = line + 1;
        let mut section_end = line_count;
        for later in headings.iter().skip(idx + 1) {
            if later.1 <= level {
                section_end = later.0 - 1;
                break;
            }
        }
        let section_end = section_end.max(line); // heading with no body
        let section_content = if section_start <= section_end && (section_start as usize) <= lines.len() {
            lines[(section_start - 1) as usize..(section_end as usize).min(lines.len())].join("\n")
        } else {
            String::new()
        };

        let section_end = section_end.max(section_start);
        let section_el = Element::new(
            ElementType::Section,
            format!("{} (section)", clean),
            file_path,
            section_start,
            section_end,
            section_content,
            "markdown",
        )
        .with_parent(heading_id.clone());

        heading_el.children_ids.push(section_el.id.clone());
        elements.push(heading_el);
        elements.push(section_el);

        stack.push(StackEntry { level, heading_id });
    }

    disambiguate_ids(&mut elements);
    (elements, false)
}

fn doc_name(file_path: &str) -> String {
    file_path.rsplit('/').next().unwrap_or(file_path).to_string()
}

fn strip_inline_markup(raw: &str) -> String {
    let stripped = INLINE_MARKUP_RE.replace_all(raw, |caps: &regex::Captures| {
        caps.get(1)
            .or_else(|| caps.get(2))
            .or_else(|| caps.get(3))
            .or_else(|| caps.get(4))
            .map(|m| m.as_str().to_string())
            .unwrap_or_default()
    });
    stripped.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scenario_s2_markdown_hierarchy() {
        let source = "# Intro\nText A.\n## Install\nText B.\n## Usage\nText C.\n# API\nText D.\n";
        let (elements, degraded) = parse(source, "readme.md");
        assert!(!degraded);
        let headings: Vec<_> = elements.iter().filter(|e| e.element_type == ElementType::Heading).collect();
        let levels: Vec<i64> = headings.iter().map(|h| h.metadata["level"].as_i64().unwrap()).collect();
        assert_eq!(levels, vec![1, 2, 2, 1]);

        let install = headings.iter().find(|h| h.name == "Install").unwrap();
        let install_section = elements.iter().find(|e| e.parent_id.as_deref() == Some(install.id.as_str())).unwrap();
        assert_eq!(install_section.content.trim(), "Text B.");

        let intro = headings.iter().find(|h| h.name == "Intro").unwrap();
        let intro_section = elements
            .iter()
            .find(|e| e.element_type == ElementType::Section && e.parent_id.as_deref() == Some(intro.id.as_str()))
            .unwrap();
        assert_eq!(intro_section.start_line, 2);
        assert_eq!(intro_section.end_line, 6);

        let usage = headings.iter().find(|h| h.name == "Usage").unwrap();
        assert_eq!(usage.parent_id.as_deref(), Some(intro.id.as_str()));
        let api = headings.iter().find(|h| h.name == "API").unwrap();
        assert_eq!(api.parent_id, None);
    }

    #[test]
    fn heading_with_only_inline_markup_is_nonempty_and_markup_free() {
        let source = "# **Bold**\nbody\n";
        let (elements, _) = parse(source, "a.md");
        let heading = elements.iter().find(|e| e.element_type == ElementType::Heading).unwrap();
        assert_eq!(heading.name, "Bold");
        assert!(!heading.name.contains('*'));
        assert_eq!(heading.metadata["raw_heading"], serde_json::json!("**Bold**"));
    }

    #[test]
    fn empty_file_yields_single_document_element() {
        let (elements, degraded) = parse("", "a.md");
        assert_eq!(elements.len(), 1);
        assert_eq!(elements[0].element_type, ElementType::Document);
        assert!(!degraded);
    }

    #[test]
    fn no_headings_yields_single_document_element() {
        let (elements, degraded) = parse("just text\nmore text\n", "a.md");
        assert_eq!(elements.len(), 1);
        assert_eq!(elements[0].element_type, ElementType::Document);
        assert!(degraded);
    }
}
