//! Project manifest: a small persisted summary of the last indexing pass,
//! written alongside the structured/vector stores so a fresh process can
//! report project stats without re-walking the tree.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::error::IndexResult;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectManifest {
    pub root_path: String,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    pub element_count: usize,
    pub file_count: usize,
    pub language_histogram: HashMap<String, usize>,
}

impl ProjectManifest {
    pub fn new(root_path: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            root_path: root_path.into(),
            created_at: now,
            last_updated: now,
            element_count: 0,
            file_count: 0,
            language_histogram: HashMap::new(),
        }
    }

    pub fn record_pass(&mut self, now: DateTime<Utc>, file_count: usize, element_count: usize, language_histogram: HashMap<String, usize>) {
        self.last_updated = now;
        self.file_count = file_count;
        self.element_count = element_count;
        self.language_histogram = language_histogram;
    }

    pub fn load(path: &Path) -> IndexResult<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents).ok())
    }

    pub fn save(&self, path: &Path) -> IndexResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self).unwrap();
        std::fs::write(path, contents)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn record_pass_updates_counts() {
        let mut manifest = ProjectManifest::new("/repo", fixed_time());
        let mut histogram = HashMap::new();
        histogram.insert("python".to_string(), 3);
        manifest.record_pass(fixed_time(), 5, 20, histogram);
        assert_eq!(manifest.file_count, 5);
        assert_eq!(manifest.element_count, 20);
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("manifest.json");
        let manifest = ProjectManifest::new("/repo", fixed_time());
        manifest.save(&path).unwrap();
        let loaded = ProjectManifest::load(&path).unwrap().unwrap();
        assert_eq!(loaded.root_path, "/repo");
    }

    #[test]
    fn load_missing_file_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.json");
        assert!(ProjectManifest::load(&path).unwrap().is_none());
    }
}
