//! Vector Index: content-addressed embedding store with cosine top-K
//! search, per spec §4.5.
//!
//! Persistence follows the same `redb::Database` + `RwLock`-guarded
//! in-memory index pattern as `store::structured::StructuredIndex` /
//! the teacher's `graph::store::GraphStore`; similarity math uses
//! `nalgebra`, already a teacher dependency, repurposed here instead of
//! adding an unrelated vector-DB crate.

use nalgebra::DVector;
use redb::{Database, ReadableTable, TableDefinition};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use crate::error::{IndexError, IndexResult};

const VECTORS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("vectors");

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct VectorRecord {
    pub id: String,
    pub embedding: Vec<f32>,
    pub metadata: HashMap<String, serde_json::Value>,
    pub chunk_text: String,
}

pub struct VectorIndex {
    records: RwLock<HashMap<String, VectorRecord>>,
    db: Option<Database>,
    #[allow(dead_code)]
    db_path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct ScoredHit {
    pub record: VectorRecord,
    pub similarity: f32,
}

impl VectorIndex {
    pub fn open(db_path: &Path) -> IndexResult<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(db_path)?;
        let mut store = Self { records: RwLock::new(HashMap::new()), db: Some(db), db_path: Some(db_path.to_path_buf()) };
        store.load()?;
        Ok(store)
    }

    pub fn in_memory() -> Self {
        Self { records: RwLock::new(HashMap::new()), db: None, db_path: None }
    }

    fn load(&mut self) -> IndexResult<()> {
        let Some(db) = &self.db else { return Ok(()) };
        let Ok(txn) = db.begin_read() else { return Ok(()) };
        let Ok(table) = txn.open_table(VECTORS_TABLE) else { return Ok(()) };
        let mut map = self.records.write().expect("vector index lock poisoned");
        for row in table.iter()? {
            let (key, value) = row?;
            if let Ok(rec) = serde_json::from_slice::<VectorRecord>(value.value()) {
                map.insert(key.value().to_string(), rec);
            }
        }
        Ok(())
    }

    fn persist(&self, to_delete: &[String], to_insert: &[VectorRecord]) -> IndexResult<()> {
        let Some(db) = &self.db else { return Ok(()) };
        let txn = db.begin_write()?;
        {
            let mut table = txn.open_table(VECTORS_TABLE)?;
            for id in to_delete {
                table.remove(id.as_str())?;
            }
            for rec in to_insert {
                let bytes = serde_json::to_vec(rec).map_err(|e| IndexError::Store(e.to_string()))?;
                table.insert(rec.id.as_str(), bytes.as_slice())?;
            }
        }
        txn.commit()?;
        Ok(())
    }

    /// Removes all chunk records for an element (both the unchunked id
    /// and any `element_id#n` variants), then inserts the replacement
    /// set. Matches the Structured Index's atomic per-file-group replace.
    pub fn upsert_for_element(&self, element_id: &str, records: Vec<VectorRecord>) -> IndexResult<()> {
        let mut map = self.records.write().expect("vector index lock poisoned");
        let old_ids: Vec<String> = map
            .keys()
            .filter(|id| *id == element_id || id.starts_with(&format!("{}#", element_id)))
            .cloned()
            .collect();

        self.persist(&old_ids, &records)?;

        for id in &old_ids {
            map.remove(id);
        }
        for rec in records {
            map.insert(rec.id.clone(), rec);
        }
        Ok(())
    }

    pub fn delete_by_file_prefix(&self, file_path: &str) -> IndexResult<()> {
        let mut map = self.records.write().expect("vector index lock poisoned");
        let old_ids: Vec<String> = map
            .values()
            .filter(|r| r.metadata.get("file_path").and_then(|v| v.as_str()) == Some(file_path))
            .map(|r| r.id.clone())
            .collect();
        self.persist(&old_ids, &[])?;
        for id in &old_ids {
            map.remove(id);
        }
        Ok(())
    }

    /// `clear()` wipes ids in place rather than dropping/recreating the
    /// underlying table, per spec's "collection reuse" requirement.
    pub fn clear(&self) -> IndexResult<()> {
        let mut map = self.records.write().expect("vector index lock poisoned");
        let ids: Vec<String> = map.keys().cloned().collect();
        self.persist(&ids, &[])?;
        map.clear();
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.records.read().expect("vector index lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Top-K cosine search with post-filters, threshold, and dedup by
    /// `metadata.element_id`, following the six numbered steps in spec
    /// §4.5's `search_semantic` description.
    pub fn search(
        &self,
        query_vector: &[f32],
        threshold: f32,
        limit: usize,
        type_filter: Option<&str>,
        language_filter: Option<&str>,
        file_prefix_filter: Option<&str>,
    ) -> Vec<ScoredHit> {
        let map = self.records.read().expect("vector index lock poisoned");
        let query = DVector::from_row_slice(query_vector);

        let candidate_count = (limit * 3).max(10);
        let mut scored: Vec<ScoredHit> = map
            .values()
            .map(|rec| ScoredHit { record: rec.clone(), similarity: cosine_similarity(&query, &rec.embedding) })
            .collect();
        scored.sort_by(|a, b| b.similarity.partial_cmp(&a.similarity).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(candidate_count);

        scored.retain(|hit| {
            type_filter.is_none_or(|t| hit.record.metadata.get("type").and_then(|v| v.as_str()) == Some(t))
                && language_filter
                    .is_none_or(|l| hit.record.metadata.get("language").and_then(|v| v.as_str()) == Some(l))
                && file_prefix_filter.is_none_or(|p| {
                    hit.record.metadata.get("file_path").and_then(|v| v.as_str()).is_some_and(|f| f.starts_with(p))
                })
        });

        scored.retain(|hit| hit.similarity >= threshold);

        let mut best_by_element: HashMap<String, ScoredHit> = HashMap::new();
        for hit in scored {
            let element_id = hit
                .record
                .metadata
                .get("element_id")
                .and_then(|v| v.as_str())
                .map(|s| s.to_string())
                .unwrap_or_else(|| hit.record.id.clone());
            best_by_element
                .entry(element_id)
                .and_modify(|existing| {
                    if hit.similarity > existing.similarity {
                        *existing = hit.clone();
                    }
                })
                .or_insert(hit);
        }

        let mut deduped: Vec<ScoredHit> = best_by_element.into_values().collect();
        deduped.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| {
                    let fa = a.record.metadata.get("file_path").and_then(|v| v.as_str()).unwrap_or("");
                    let fb = b.record.metadata.get("file_path").and_then(|v| v.as_str()).unwrap_or("");
                    fa.cmp(fb)
                })
                .then_with(|| {
                    let la = a.record.metadata.get("start_line").and_then(|v| v.as_u64()).unwrap_or(0);
                    let lb = b.record.metadata.get("start_line").and_then(|v| v.as_u64()).unwrap_or(0);
                    la.cmp(&lb)
                })
        });
        deduped.truncate(limit);
        deduped
    }
}

/// Maps cosine similarity (already in [-1,1] for unit-norm vectors) into
/// [0,1], per the glossary's "Similarity" definition.
fn cosine_similarity(query: &DVector<f32>, embedding: &[f32]) -> f32 {
    if embedding.len() != query.len() {
        return 0.0;
    }
    let candidate = DVector::from_row_slice(embedding);
    let dot = query.dot(&candidate);
    let norm_product = query.norm() * candidate.norm();
    if norm_product == 0.0 {
        return 0.0;
    }
    let cosine = (dot / norm_product).clamp(-1.0, 1.0);
    (cosine + 1.0) / 2.0
}
