//! The canonical record produced by every parser.
//!
//! `Element` generalizes the teacher's separate `Function`/`Class`/`File`
//! structs into one closed-enum-tagged record, matching the uniform shape
//! every parser tier (structured, pattern, markdown, generic) must emit.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementType {
    Function,
    Method,
    Class,
    Module,
    Variable,
    Import,
    Export,
    Heading,
    Section,
    Block,
    Document,
}

impl ElementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ElementType::Function => "function",
            ElementType::Method => "method",
            ElementType::Class => "class",
            ElementType::Module => "module",
            ElementType::Variable => "variable",
            ElementType::Import => "import",
            ElementType::Export => "export",
            ElementType::Heading => "heading",
            ElementType::Section => "section",
            ElementType::Block => "block",
            ElementType::Document => "document",
        }
    }
}

impl std::fmt::Display for ElementType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A uniform record produced by every parser.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Element {
    pub id: String,
    #[serde(rename = "type")]
    pub element_type: ElementType,
    pub name: String,
    pub file_path: String,
    pub start_line: u32,
    pub end_line: u32,
    pub content: String,
    pub language: String,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub children_ids: Vec<String>,
    #[serde(default)]
    pub signature: Option<String>,
    #[serde(default)]
    pub docstring: Option<String>,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

/// Deterministic element id: hash of (relative_path, type, name, start_line).
///
/// Within-file collisions (same type/name/line, e.g. two nested lambdas on
/// the same line) are broken by the caller appending `#<ordinal>`; see
/// `ElementBuilder::finish_group`.
pub fn element_id(relative_path: &str, element_type: ElementType, name: &str, start_line: u32) -> String {
    let mut hasher = Sha256::new();
    hasher.update(relative_path.as_bytes());
    hasher.update([0u8]);
    hasher.update(element_type.as_str().as_bytes());
    hasher.update([0u8]);
    hasher.update(name.as_bytes());
    hasher.update([0u8]);
    hasher.update(start_line.to_le_bytes());
    let digest = hasher.finalize();
    hex_prefix(&digest, 16)
}

fn hex_prefix(bytes: &[u8], n: usize) -> String {
    bytes.iter().take(n).map(|b| format!("{:02x}", b)).collect()
}

/// Disambiguates ids for elements sharing (file_path, type, name, start_line)
/// by appending a within-file ordinal, per spec's documented open-question
/// resolution. Call once per file after all elements are built.
pub fn disambiguate_ids(elements: &mut [Element]) {
    let mut seen: HashMap<String, u32> = HashMap::new();
    for el in elements.iter_mut() {
        let base = el.id.clone();
        let count = seen.entry(base.clone()).or_insert(0);
        if *count > 0 {
            el.metadata.insert("id_ordinal".into(), serde_json::json!(*count));
            el.id = format!("{}#{}", base, count);
        }
        *count += 1;
    }
}

impl Element {
    pub fn new(
        element_type: ElementType,
        name: impl Into<String>,
        file_path: impl Into<String>,
        start_line: u32,
        end_line: u32,
        content: impl Into<String>,
        language: impl Into<String>,
    ) -> Self {
        let name = name.into();
        let file_path = file_path.into();
        let id = element_id(&file_path, element_type, &name, start_line);
        Self {
            id,
            element_type,
            name,
            file_path,
            start_line,
            end_line,
            content: content.into(),
            language: language.into(),
            parent_id: None,
            children_ids: Vec::new(),
            signature: None,
            docstring: None,
            dependencies: Vec::new(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    pub fn with_signature(mut self, sig: impl Into<String>) -> Self {
        self.signature = Some(sig.into());
        self
    }

    pub fn with_docstring(mut self, doc: impl Into<String>) -> Self {
        self.docstring = Some(doc.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}
