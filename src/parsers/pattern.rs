//! Pattern Parser: regex-driven extraction for the curly-brace language
//! family (JS/TS/Go/Java/C#/C/C++), per the spec's explicit "Pattern
//! Parser... regex-driven extraction" design — a distinct tier from the
//! Structured Parser's full syntactic tree, not a tree-sitter grammar per
//! language as the teacher's `typescript.rs`/`rust.rs`/etc. modules do it.
//!
//! Bodies are delimited by matching braces where recoverable; otherwise by
//! a heuristic line range. Elements inside unbalanced braces are skipped.

use regex::Regex;
use std::sync::LazyLock;

use crate::element::{disambiguate_ids, Element, ElementType};

static FUNCTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:export\s+)?(?:async\s+)?function\s+(?P<name>[A-Za-z_$][\w$]*)\s*\((?P<params>[^)]*)\)").unwrap()
});

static ARROW_FN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:export\s+)?const\s+(?P<name>[A-Za-z_$][\w$]*)\s*=\s*(?:async\s*)?\((?P<params>[^)]*)\)\s*=>").unwrap()
});

static CLASS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:export\s+)?class\s+(?P<name>[A-Za-z_$][\w$]*)(?:\s+extends\s+(?P<base>[A-Za-z_$][\w$.]*))?").unwrap()
});

static IMPORT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^import\s+.*\s+from\s+["'](?P<path>[^"']+)["']"#).unwrap()
});

static REQUIRE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"require\(["'](?P<path>[^"']+)["']\)"#).unwrap()
});

static EXPORT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^export\s+(default\s+)?").unwrap());

static VARIABLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:const|let|var)\s+(?P<name>[A-Za-z_$][\w$]*)\s*=").unwrap()
});

/// Parse source into a flat element list. The second value is `true`
/// when at least one function/class body could not be brace-matched and
/// fell back to a heuristic single-line span, per §4.3.
pub fn parse(source: &str, file_path: &str, language: &str) -> (Vec<Element>, bool) {
    let lines: Vec<&str> = source.lines().collect();
    let line_count = lines.len().max(1) as u32;
    let module = Element::new(ElementType::Module, module_name(file_path), file_path, 1, line_count, "", language);
    let module_id = module.id.clone();
    let mut elements = vec![module];
    let mut degraded = false;

    let mut i = 0usize;
    while i < lines.len() {
        let trimmed = lines[i].trim_start();
        let lineno = (i + 1) as u32;

        if let Some(caps) = FUNCTION_RE.captures(trimmed) {
            let name = caps["name"].to_string();
            let params = caps.name("params").map(|m| m.as_str().to_string()).unwrap_or_default();
            let (end, body, fell_back) = body_span(&lines, i);
            degraded |= fell_back;
            elements.push(
                Element::new(ElementType::Function, name, file_path, lineno, end, body, language)
                    .with_parent(&module_id)
                    .with_signature(format!("({})", params)),
            );
            i = end as usize;
            continue;
        }

        if let Some(caps) = ARROW_FN_RE.captures(trimmed) {
            let name = caps["name"].to_string();
            let params = caps.name("params").map(|m| m.as_str().to_string()).unwrap_or_default();
            let (end, body, fell_back) = body_span(&lines, i);
            degraded |= fell_back;
            elements.push(
                Element::new(ElementType::Function, name, file_path, lineno, end, body, language)
                    .with_parent(&module_id)
                    .with_signature(format!("({})", params)),
            );
            i = end as usize;
            continue;
        }

        if let Some(caps) = CLASS_RE.captures(trimmed) {
            let name = caps["name"].to_string();
            let base = caps.name("base").map(|m| m.as_str().to_string());
            let (end, body, fell_back) = body_span(&lines, i);
            degraded |= fell_back;
            let mut el = Element::new(ElementType::Class, name, file_path, lineno, end, body, language)
                .with_parent(&module_id);
            if let Some(base) = base {
                el = el.with_metadata("bases", serde_json::json!([base]));
            }
            elements.push(el);
            i = end as usize;
            continue;
        }

        if let Some(caps) = IMPORT_RE.captures(trimmed) {
            let path = caps["path"].to_string();
            let mut el = Element::new(ElementType::Import, path.clone(), file_path, lineno, lineno, lines[i], language)
                .with_parent(&module_id)
                .with_metadata("module", serde_json::json!(path));
            el.dependencies.push(path);
            elements.push(el);
            i += 1;
            continue;
        }

        if let Some(caps) = REQUIRE_RE.captures(trimmed) {
            let path = caps["path"].to_string();
            let mut el = Element::new(ElementType::Import, path.clone(), file_path, lineno, lineno, lines[i], language)
                .with_parent(&module_id)
                .with_metadata("module", serde_json::json!(path));
            el.dependencies.push(path);
            elements.push(el);
            i += 1;
            continue;
        }

        if EXPORT_RE.is_match(trimmed) && !FUNCTION_RE.is_match(trimmed) && !CLASS_RE.is_match(trimmed) {
            elements.push(
                Element::new(ElementType::Export, export_name(trimmed), file_path, lineno, lineno, lines[i], language)
                    .with_parent(&module_id),
            );
            i += 1;
            continue;
        }

        if let Some(caps) = VARIABLE_RE.captures(trimmed) {
            let name = caps["name"].to_string();
            elements.push(
                Element::new(ElementType::Variable, name, file_path, lineno, lineno, lines[i], language)
                    .with_parent(&module_id),
            );
            i += 1;
            continue;
        }

        i += 1;
    }

    disambiguate_ids(&mut elements);
    (elements, degraded)
}

fn module_name(file_path: &str) -> String {
    file_path.rsplit('/').next().unwrap_or(file_path).to_string()
}

fn export_name(line: &str) -> String {
    line.trim_start()
        .trim_start_matches("export")
        .trim_start()
        .trim_start_matches("default")
        .trim()
        .chars()
        .take(40)
        .collect()
}

/// Finds the matching closing brace starting from the declaration line,
/// returning (end_line, body_text, fell_back_to_heuristic). Falls back to
/// a heuristic single-line range if braces never balance before end of
/// file.
fn body_span(lines: &[&str], start_idx: usize) -> (u32, String, bool) {
    let mut depth = 0i32;
    let mut seen_open = false;
    for (offset, line) in lines[start_idx..].iter().enumerate() {
        for ch in line.chars() {
            match ch {
                '{' => {
                    depth += 1;
                    seen_open = true;
                }
                '}' => depth -= 1,
                _ => {}
            }
        }
        if seen_open && depth <= 0 {
            let end_idx = start_idx + offset;
            let body = lines[start_idx..=end_idx].join("\n");
            return ((end_idx + 1) as u32, body, false);
        }
    }
    // Unbalanced: heuristic single-line span, per spec's "skipped rather
    // than mis-bracketed" edge case policy.
    ((start_idx + 1) as u32, lines[start_idx].to_string(), true)
}
