//! Structured Index: a relational store of element metadata keyed by
//! element id, indexed by file_path/type/name/language.
//!
//! Grounded on `graph::store::GraphStore`'s `redb::Database` +
//! `RwLock<HashMap<..>>` dual-layer pattern, adapted from a petgraph
//! code-call-graph to a flat element store with the secondary indices
//! spec §4.4 requires.

use redb::{Database, ReadableTable, TableDefinition};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use crate::element::{Element, ElementType};
use crate::error::{IndexError, IndexResult};

const ELEMENTS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("elements");

pub struct StructuredIndex {
    elements: RwLock<HashMap<String, Element>>,
    db: Option<Database>,
    #[allow(dead_code)]
    db_path: Option<PathBuf>,
}

#[derive(Debug, Default, Clone, serde::Serialize)]
pub struct Statistics {
    pub element_count: usize,
    pub by_type: HashMap<String, usize>,
    pub by_language: HashMap<String, usize>,
}

impl StructuredIndex {
    /// Open (or create) a persisted structured index at `db_path`.
    pub fn open(db_path: &Path) -> IndexResult<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(db_path)?;
        let mut store = Self {
            elements: RwLock::new(HashMap::new()),
            db: Some(db),
            db_path: Some(db_path.to_path_buf()),
        };
        store.load()?;
        Ok(store)
    }

    /// In-memory only, no persistence — used by tests.
    pub fn in_memory() -> Self {
        Self { elements: RwLock::new(HashMap::new()), db: None, db_path: None }
    }

    fn load(&mut self) -> IndexResult<()> {
        let Some(db) = &self.db else { return Ok(()) };
        let txn = db.begin_read();
        let txn = match txn {
            Ok(t) => t,
            Err(_) => return Ok(()), // fresh database, no tables yet
        };
        let Ok(table) = txn.open_table(ELEMENTS_TABLE) else { return Ok(()) };
        let mut map = self.elements.write().expect("structured index lock poisoned");
        for row in table.iter()? {
            let (key, value) = row?;
            if let Ok(el) = serde_json::from_slice::<Element>(value.value()) {
                map.insert(key.value().to_string(), el);
            }
        }
        Ok(())
    }

    fn persist_write(&self, to_delete: &[String], to_insert: &[Element]) -> IndexResult<()> {
        let Some(db) = &self.db else { return Ok(()) };
        let txn = db.begin_write()?;
        {
            let mut table = txn.open_table(ELEMENTS_TABLE)?;
            for id in to_delete {
                table.remove(id.as_str())?;
            }
            for el in to_insert {
                let bytes = serde_json::to_vec(el).map_err(|e| IndexError::Store(e.to_string()))?;
                table.insert(el.id.as_str(), bytes.as_slice())?;
            }
        }
        txn.commit()?;
        Ok(())
    }

    /// Atomic per file_path: old rows for `file_path` are removed first,
    /// then the new batch is inserted, all within one logical operation
    /// (and one redb write transaction when persisted).
    pub fn upsert_elements(&self, file_path: &str, new_elements: Vec<Element>) -> IndexResult<()> {
        let mut map = self.elements.write().expect("structured index lock poisoned");
        let old_ids: Vec<String> = map
            .values()
            .filter(|e| e.file_path == file_path)
            .map(|e| e.id.clone())
            .collect();

        self.persist_write(&old_ids, &new_elements)?;

        for id in &old_ids {
            map.remove(id);
        }
        for el in new_elements {
            map.insert(el.id.clone(), el);
        }
        Ok(())
    }

    pub fn delete_by_file(&self, file_path: &str) -> IndexResult<()> {
        let mut map = self.elements.write().expect("structured index lock poisoned");
        let old_ids: Vec<String> = map
            .values()
            .filter(|e| e.file_path == file_path)
            .map(|e| e.id.clone())
            .collect();
        self.persist_write(&old_ids, &[])?;
        for id in &old_ids {
            map.remove(id);
        }
        Ok(())
    }

    pub fn get_by_file(&self, file_path: &str) -> Vec<Element> {
        let map = self.elements.read().expect("structured index lock poisoned");
        let mut out: Vec<Element> = map.values().filter(|e| e.file_path == file_path).cloned().collect();
        out.sort_by_key(|e| e.start_line);
        out
    }

    pub fn get_children(&self, id: &str) -> Vec<Element> {
        let map = self.elements.read().expect("structured index lock poisoned");
        let mut out: Vec<Element> = map.values().filter(|e| e.parent_id.as_deref() == Some(id)).cloned().collect();
        out.sort_by_key(|e| e.start_line);
        out
    }

    pub fn get(&self, id: &str) -> Option<Element> {
        self.elements.read().expect("structured index lock poisoned").get(id).cloned()
    }

    /// Substring or glob over `name`. Glob support is limited to a
    /// trailing `*` wildcard (`get_*`), matching the literal scenario
    /// spec'd in S4.
    pub fn search_structural(
        &self,
        pattern: &str,
        element_type: Option<ElementType>,
        language: Option<&str>,
        file: Option<&str>,
        limit: usize,
    ) -> Vec<Element> {
        let map = self.elements.read().expect("structured index lock poisoned");
        let matcher = glob_matcher(pattern);

        let mut out: Vec<Element> = map
            .values()
            .filter(|e| matcher(&e.name))
            .filter(|e| element_type.is_none_or(|t| e.element_type == t))
            .filter(|e| language.is_none_or(|l| e.language == l))
            .filter(|e| file.is_none_or(|f| e.file_path == f))
            .cloned()
            .collect();

        out.sort_by(|a, b| a.file_path.cmp(&b.file_path).then(a.start_line.cmp(&b.start_line)));
        out.truncate(limit);
        out
    }

    pub fn statistics(&self) -> Statistics {
        let map = self.elements.read().expect("structured index lock poisoned");
        let mut stats = Statistics { element_count: map.len(), ..Default::default() };
        for el in map.values() {
            *stats.by_type.entry(el.element_type.as_str().to_string()).or_insert(0) += 1;
            *stats.by_language.entry(el.language.clone()).or_insert(0) += 1;
        }
        stats
    }

    pub fn all(&self) -> Vec<Element> {
        self.elements.read().expect("structured index lock poisoned").values().cloned().collect()
    }
}

fn glob_matcher(pattern: &str) -> impl Fn(&str) -> bool + '_ {
    move |name: &str| {
        if let Some(prefix) = pattern.strip_suffix('*') {
            name.starts_with(prefix)
        } else if let Some(suffix) = pattern.strip_prefix('*') {
            name.ends_with(suffix)
        } else if pattern.contains('*') {
            let parts: Vec<&str> = pattern.split('*').collect();
            glob_multi_match(name, &parts)
        } else {
            name.contains(pattern)
        }
    }
}

fn glob_multi_match(name: &str, parts: &[&str]) -> bool {
    let mut rest = name;
    for (idx, part) in parts.iter().enumerate() {
        if part.is_empty() {
            continue;
        }
        match rest.find(part) {
            Some(pos) => {
                if idx == 0 && pos != 0 {
                    return false;
                }
                rest = &rest[pos + part.len()..];
            }
            None => return false,
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{Element, ElementType};

    fn func(name: &str, file: &str, line: u32) -> Element {
        Element::new(ElementType::Function, name, file, line, line + 1, "", "python")
    }

    #[test]
    fn upsert_then_get_by_file_sorted_by_start_line() {
        let store = StructuredIndex::in_memory();
        store.upsert_elements("a.py", vec![func("b", "a.py", 10), func("a", "a.py", 1)]).unwrap();
        let got = store.get_by_file("a.py");
        assert_eq!(got.iter().map(|e| e.name.as_str()).collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn reupsert_replaces_old_elements_atomically() {
        let store = StructuredIndex::in_memory();
        store.upsert_elements("x.py", vec![func("foo", "x.py", 1)]).unwrap();
        store.upsert_elements("x.py", vec![func("bar", "x.py", 1)]).unwrap();
        let got = store.get_by_file("x.py");
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].name, "bar");
        assert!(store.search_structural("foo", None, None, None, 10).is_empty());
    }

    #[test]
    fn delete_by_file_removes_all_elements() {
        let store = StructuredIndex::in_memory();
        store.upsert_elements("a.py", vec![func("a", "a.py", 1)]).unwrap();
        store.delete_by_file("a.py").unwrap();
        assert!(store.get_by_file("a.py").is_empty());
    }

    #[test]
    fn scenario_s4_glob_prefix_search() {
        let store = StructuredIndex::in_memory();
        store
            .upsert_elements(
                "u.py",
                vec![func("get_user", "u.py", 1), func("get_users", "u.py", 5), func("set_user", "u.py", 10), func("getUser", "u.py", 15)],
            )
            .unwrap();
        let results = store.search_structural("get_*", Some(ElementType::Function), None, None, 10);
        let names: Vec<_> = results.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["get_user", "get_users"]);
    }

    #[test]
    fn missing_file_yields_empty_not_error() {
        let store = StructuredIndex::in_memory();
        assert!(store.get_by_file("nope.py").is_empty());
    }

    #[test]
    fn persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("structured.db");
        {
            let store = StructuredIndex::open(&db_path).unwrap();
            store.upsert_elements("a.py", vec![func("a", "a.py", 1)]).unwrap();
        }
        let reopened = StructuredIndex::open(&db_path).unwrap();
        assert_eq!(reopened.get_by_file("a.py").len(), 1);
    }
}
