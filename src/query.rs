//! Query Layer: the read-only surface over the dual stores, shared by the
//! CLI and the MCP tool handlers. Grounded on the teacher's
//! `mcp::tools::*` handler shape (a thin function per capability, called
//! with a parameter struct and a shared `HandlerState`) but without a
//! mutable handler state — indexing and querying are separate concerns.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use crate::config::IndexConfig;
use crate::element::{Element, ElementType};
use crate::embed::Embedder;
use crate::error::IndexResult;
use crate::exclude::scan_dependency_files;
use crate::store::structured::StructuredIndex;
use crate::store::vector::{ScoredHit, VectorIndex};

pub struct QueryLayer<'a> {
    pub structured: &'a StructuredIndex,
    pub vectors: &'a VectorIndex,
    pub embedder: &'a dyn Embedder,
    pub config: &'a IndexConfig,
    pub root: &'a Path,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct ContextWindow {
    pub file_path: String,
    pub elements: Vec<Element>,
    /// Elements in other files whose `dependencies` reference a symbol
    /// this file exports, reached within `radius` hops of the import graph.
    pub importers: Vec<Element>,
    /// Elements in other files that export a symbol this file imports,
    /// reached within `radius` hops of the import graph.
    pub importees: Vec<Element>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct DependencyManifest {
    pub path: String,
    pub kind: String,
}

/// Per-file element counts, keyed by full relative path.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct FileSummary {
    pub file_path: String,
    pub element_count: usize,
    pub by_type: HashMap<String, usize>,
}

/// One level of the project's directory tree. The root node has an empty
/// `name`; each child corresponds to one path component.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct DirectoryNode {
    pub name: String,
    pub files: Vec<FileSummary>,
    pub children: Vec<DirectoryNode>,
}

/// `get_project_structure()`'s result: the project-wide aggregate
/// statistics plus the directory/file tree with per-file element counts
/// by type, per §4.7.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ProjectStructure {
    pub element_count: usize,
    pub by_type: HashMap<String, usize>,
    pub by_language: HashMap<String, usize>,
    pub tree: DirectoryNode,
}

impl<'a> QueryLayer<'a> {
    /// Six-step semantic search per spec §4.5: embed the query, retrieve
    /// `max(limit*3, 10)` candidates, filter, apply the similarity
    /// threshold, dedup by element, then truncate to `limit`.
    pub fn search_semantic(
        &self,
        query: &str,
        limit: usize,
        type_filter: Option<ElementType>,
        language_filter: Option<&str>,
        file_prefix_filter: Option<&str>,
    ) -> IndexResult<Vec<ScoredHit>> {
        let query_vector = self
            .embedder
            .embed_batch(&[query.to_string()])?
            .into_iter()
            .next()
            .unwrap_or_default();

        let type_str = type_filter.map(|t| t.as_str());
        Ok(self.vectors.search(
            &query_vector,
            self.config.similarity_threshold,
            limit,
            type_str,
            language_filter,
            file_prefix_filter,
        ))
    }

    pub fn search_structural(
        &self,
        pattern: &str,
        element_type: Option<ElementType>,
        language: Option<&str>,
        file: Option<&str>,
        limit: usize,
    ) -> Vec<Element> {
        self.structured.search_structural(pattern, element_type, language, file, limit)
    }

    /// All elements of `file_path`, plus direct importers and importees
    /// reached by walking the import graph up to `radius` file-hops, per
    /// §4.7: importers are elements elsewhere whose `dependencies` name a
    /// symbol this file exports; importees are elements elsewhere that
    /// export a symbol this file imports.
    pub fn get_context_for_file(&self, file_path: &str, radius: u32) -> ContextWindow {
        let elements = self.structured.get_by_file(file_path);

        let mut by_file: HashMap<String, Vec<Element>> = HashMap::new();
        for el in self.structured.all() {
            by_file.entry(el.file_path.clone()).or_default().push(el);
        }

        let mut visited: HashSet<String> = HashSet::new();
        visited.insert(file_path.to_string());
        let mut importers = Vec::new();
        let mut importees = Vec::new();
        let mut frontier = vec![file_path.to_string()];

        for _hop in 0..radius {
            if frontier.is_empty() {
                break;
            }
            let mut next_frontier = Vec::new();
            for current in &frontier {
                let current_elements = by_file.get(current).cloned().unwrap_or_default();
                let current_exported = exported_symbols(&current_elements);
                let current_imported = imported_symbols(&current_elements);

                for (other_path, other_elements) in &by_file {
                    if visited.contains(other_path) {
                        continue;
                    }
                    let other_imported = imported_symbols(other_elements);
                    let other_exported = exported_symbols(other_elements);

                    let is_importer = !current_exported.is_empty() && other_imported.iter().any(|s| current_exported.contains(s));
                    let is_importee = !current_imported.is_empty() && other_exported.iter().any(|s| current_imported.contains(s));

                    if is_importer || is_importee {
                        visited.insert(other_path.clone());
                        next_frontier.push(other_path.clone());
                        if is_importer {
                            importers.extend(other_elements.iter().cloned());
                        }
                        if is_importee {
                            importees.extend(other_elements.iter().cloned());
                        }
                    }
                }
            }
            frontier = next_frontier;
        }

        ContextWindow { file_path: file_path.to_string(), elements, importers, importees }
    }

    /// The project-wide aggregate statistics plus a directory/file tree
    /// with per-file element counts by type, per spec §4.7.
    pub fn get_project_structure(&self) -> ProjectStructure {
        let stats = self.structured.statistics();

        let mut by_file: HashMap<String, FileSummary> = HashMap::new();
        for element in self.structured.all() {
            let summary = by_file.entry(element.file_path.clone()).or_insert_with(|| FileSummary {
                file_path: element.file_path.clone(),
                element_count: 0,
                by_type: HashMap::new(),
            });
            summary.element_count += 1;
            *summary.by_type.entry(element.element_type.as_str().to_string()).or_insert(0) += 1;
        }

        let mut tree = DirectoryNode::default();
        for summary in by_file.into_values() {
            let file_path = summary.file_path.clone();
            let components: Vec<&str> = file_path.split('/').filter(|c| !c.is_empty()).collect();
            insert_file_summary(&mut tree, &components, summary);
        }
        sort_tree(&mut tree);

        ProjectStructure { element_count: stats.element_count, by_type: stats.by_type, by_language: stats.by_language, tree }
    }

    /// Locates recognised dependency manifests under the project root,
    /// independent of exclusion rules, per spec §4.1's `scan_dependency_files`.
    pub fn get_dependencies(&self) -> Vec<DependencyManifest> {
        scan_dependency_files(self.root)
            .into_iter()
            .map(|path| {
                let kind = path.file_name().and_then(|n| n.to_str()).unwrap_or("unknown").to_string();
                let rel = crate::walker::relative_path_str(self.root, &path);
                DependencyManifest { path: rel, kind }
            })
            .collect()
    }

    pub fn get_children(&self, element_id: &str) -> Vec<Element> {
        self.structured.get_children(element_id)
    }

    pub fn get_element(&self, element_id: &str) -> Option<Element> {
        self.structured.get(element_id)
    }
}

/// Symbols a file exports: explicit `export` elements, plus any top-level
/// (unparented, or parented directly by the file's `module` element)
/// function/method/class/variable name — languages without an explicit
/// export keyword (Python) export everything at module scope.
fn exported_symbols(file_elements: &[Element]) -> HashSet<String> {
    let module_id = file_elements.iter().find(|e| e.element_type == ElementType::Module).map(|e| e.id.clone());
    file_elements
        .iter()
        .filter(|e| {
            e.element_type == ElementType::Export
                || (matches!(
                    e.element_type,
                    ElementType::Function | ElementType::Method | ElementType::Class | ElementType::Variable
                ) && (e.parent_id.is_none() || e.parent_id == module_id))
        })
        .map(|e| e.name.clone())
        .collect()
}

/// Symbols a file imports: the union of every `import` element's
/// `dependencies`.
fn imported_symbols(file_elements: &[Element]) -> HashSet<String> {
    file_elements
        .iter()
        .filter(|e| e.element_type == ElementType::Import)
        .flat_map(|e| e.dependencies.iter().cloned())
        .collect()
}

/// Descends `tree` by `components`, creating directory nodes as needed,
/// and places `summary` in the final directory's `files`.
fn insert_file_summary(tree: &mut DirectoryNode, components: &[&str], summary: FileSummary) {
    match components.split_first() {
        None => tree.files.push(summary),
        Some((_head, [])) => tree.files.push(summary),
        Some((head, rest)) => {
            let child = match tree.children.iter().position(|c| c.name == *head) {
                Some(idx) => &mut tree.children[idx],
                None => {
                    tree.children.push(DirectoryNode { name: head.to_string(), ..Default::default() });
                    tree.children.last_mut().unwrap()
                }
            };
            insert_file_summary(child, rest, summary);
        }
    }
}

fn sort_tree(node: &mut DirectoryNode) {
    node.files.sort_by(|a, b| a.file_path.cmp(&b.file_path));
    node.children.sort_by(|a, b| a.name.cmp(&b.name));
    for child in &mut node.children {
        sort_tree(child);
    }
}

#[allow(dead_code)]
fn language_histogram(elements: &[Element]) -> HashMap<String, usize> {
    let mut map = HashMap::new();
    for e in elements {
        *map.entry(e.language.clone()).or_insert(0) += 1;
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embed::HashEmbedder;

    fn fixture() -> (StructuredIndex, VectorIndex, HashEmbedder) {
        let structured = StructuredIndex::in_memory();
        let vectors = VectorIndex::in_memory();
        structured
            .upsert_elements(
                "a.py",
                vec![
                    Element::new(ElementType::Function, "get_user", "a.py", 1, 3, "def get_user(): ...", "python"),
                    Element::new(ElementType::Function, "get_users", "a.py", 5, 7, "def get_users(): ...", "python"),
                ],
            )
            .unwrap();
        (structured, vectors, HashEmbedder::new(16))
    }

    #[test]
    fn search_structural_delegates_to_store() {
        let (structured, vectors, embedder) = fixture();
        let config = IndexConfig::default();
        let root = std::path::PathBuf::from(".");
        let query = QueryLayer { structured: &structured, vectors: &vectors, embedder: &embedder, config: &config, root: &root };
        let results = query.search_structural("get_*", Some(ElementType::Function), None, None, 10);
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn context_for_file_returns_all_elements_of_the_file() {
        let (structured, vectors, embedder) = fixture();
        let config = IndexConfig::default();
        let root = std::path::PathBuf::from(".");
        let query = QueryLayer { structured: &structured, vectors: &vectors, embedder: &embedder, config: &config, root: &root };
        let window = query.get_context_for_file("a.py", 1);
        assert_eq!(window.elements.len(), 2);
        assert!(window.importers.is_empty());
        assert!(window.importees.is_empty());
    }

    #[test]
    fn context_for_file_finds_direct_importer_and_importee() {
        let structured = StructuredIndex::in_memory();
        structured
            .upsert_elements(
                "db.py",
                vec![Element::new(ElementType::Function, "connect", "db.py", 1, 2, "def connect(): ...", "python")],
            )
            .unwrap();
        let mut importer = Element::new(ElementType::Import, "connect", "app.py", 1, 1, "from db import connect", "python");
        importer.dependencies = vec!["connect".to_string()];
        structured.upsert_elements("app.py", vec![importer]).unwrap();

        let vectors = VectorIndex::in_memory();
        let config = IndexConfig::default();
        let root = std::path::PathBuf::from(".");
        let embedder = HashEmbedder::new(16);
        let query = QueryLayer { structured: &structured, vectors: &vectors, embedder: &embedder, config: &config, root: &root };

        let from_db = query.get_context_for_file("db.py", 1);
        assert_eq!(from_db.importers.len(), 1);
        assert_eq!(from_db.importers[0].file_path, "app.py");

        let from_app = query.get_context_for_file("app.py", 1);
        assert_eq!(from_app.importees.len(), 1);
        assert_eq!(from_app.importees[0].file_path, "db.py");
    }
}
