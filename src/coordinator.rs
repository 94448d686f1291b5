//! Indexing Coordinator: orchestrates walk -> filter -> parse -> chunk ->
//! embed -> dual-write for a full or incremental pass, and tracks the
//! project manifest.
//!
//! The parallel file-processing shape (rayon over independent units of
//! work, collected into one report) is grounded on
//! `detectors::engine::DetectorEngine::run`'s partition-then-rayon
//! pattern, narrowed from detector fan-out to per-file parse+embed.

use chrono::Utc;
use rayon::prelude::*;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::chunk::{chunk_content, chunk_id};
use crate::config::IndexConfig;
use crate::element::Element;
use crate::embed::Embedder;
use crate::error::{IndexError, IndexResult};
use crate::exclude::ExclusionFilter;
use crate::git::GitMetadataProvider;
use crate::manifest::ProjectManifest;
use crate::parsers;
use crate::store::structured::StructuredIndex;
use crate::store::vector::{VectorIndex, VectorRecord};
use crate::walker::{self, WalkedFile};

/// How many recent commits `GitMetadataProvider::last_commit_for_file`
/// scans before giving up, per file.
const GIT_MAX_COMMITS_SCANNED: usize = 200;

/// Shared cancellation flag. Checked between files; an in-flight file
/// always finishes before the pass observes cancellation.
#[derive(Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct CleanReport {
    pub dry_run: bool,
    pub elements_removed: usize,
    pub files_affected: usize,
    pub chunks_removed: usize,
}

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct PassReport {
    pub files_indexed: usize,
    pub files_skipped: Vec<(String, String)>,
    pub elements_produced: usize,
    pub chunks_embedded: usize,
    pub batches_failed: usize,
    pub cancelled: bool,
}

pub struct Coordinator {
    pub root: PathBuf,
    pub config: IndexConfig,
    pub structured: StructuredIndex,
    pub vectors: VectorIndex,
    pub embedder: Box<dyn Embedder>,
    git: Option<GitMetadataProvider>,
}

struct FileOutcome {
    relative_path: String,
    elements: Vec<Element>,
    vector_records: Vec<VectorRecord>,
    batches_failed: usize,
    degraded: bool,
}

impl Coordinator {
    pub fn new(root: PathBuf, config: IndexConfig, structured: StructuredIndex, vectors: VectorIndex, embedder: Box<dyn Embedder>) -> Self {
        let git = GitMetadataProvider::open(&root).ok();
        Self { root, config, structured, vectors, embedder, git }
    }

    /// Opportunistically attaches the file's last-commit metadata to every
    /// element parsed from it. A no-op when the project root isn't inside
    /// a git repository or the lookup fails; indexing never blocks on it.
    fn annotate_with_git_metadata(&self, relative_path: &str, elements: &mut [Element]) {
        let Some(git) = &self.git else { return };
        match git.last_commit_for_file(relative_path, GIT_MAX_COMMITS_SCANNED) {
            Ok(Some(commit)) => {
                for element in elements.iter_mut() {
                    element.metadata.insert("git_last_commit_hash".to_string(), serde_json::json!(commit.hash));
                    element.metadata.insert("git_last_commit_author".to_string(), serde_json::json!(commit.author));
                    element.metadata.insert("git_last_commit_timestamp".to_string(), serde_json::json!(commit.timestamp));
                }
            }
            Ok(None) => {}
            Err(e) => debug!("git metadata lookup failed for {}: {}", relative_path, e),
        }
    }

    /// Runs a full pass over every file the walker discovers, per spec
    /// §4.6. Each file's structured + vector writes are independent;
    /// a parse or embed failure for one file is recorded in the report
    /// and does not abort the pass.
    pub fn run_full_pass(&self, cancel: &CancellationToken) -> IndexResult<PassReport> {
        let filter = ExclusionFilter::new(&self.config.effective_exclude_patterns());
        let walk = walker::walk(&self.root, &self.config, &filter);

        let mut report = PassReport::default();
        for skipped in &walk.skipped {
            report.files_skipped.push((skipped.relative_path.clone(), skipped.reason.clone()));
        }

        let outcomes: Vec<Option<FileOutcome>> = walk
            .files
            .par_iter()
            .map(|file| {
                if cancel.is_cancelled() {
                    return None;
                }
                Some(self.process_file(file, cancel))
            })
            .collect();

        for outcome in outcomes.into_iter().flatten() {
            self.apply_outcome(&outcome, &mut report)?;
        }

        if cancel.is_cancelled() {
            report.cancelled = true;
            return Ok(report);
        }

        self.write_manifest(&report)?;
        info!("indexing pass complete: {} files, {} elements", report.files_indexed, report.elements_produced);
        Ok(report)
    }

    /// Re-indexes a single file after a watcher event, per spec §4.8.
    /// A deleted file is signalled by `content: None`.
    pub fn reindex_file(&self, relative_path: &str, content: Option<&str>) -> IndexResult<()> {
        self.structured.delete_by_file(relative_path)?;
        self.vectors.delete_by_file_prefix(relative_path)?;

        let Some(content) = content else { return Ok(()) };

        let language = self
            .config
            .supported_extensions
            .get(Path::new(relative_path).extension().and_then(|e| e.to_str()).unwrap_or(""))
            .cloned()
            .unwrap_or_else(|| "text".to_string());

        let outcome = self.parse_and_embed(relative_path, content, &language, &CancellationToken::new());
        self.apply_outcome(&outcome, &mut PassReport::default())
    }

    fn process_file(&self, file: &WalkedFile, cancel: &CancellationToken) -> FileOutcome {
        let content = match std::fs::read_to_string(&file.path) {
            Ok(c) => c,
            Err(e) => {
                warn!("failed to read {}: {}", file.relative_path, e);
                return FileOutcome {
                    relative_path: file.relative_path.clone(),
                    elements: Vec::new(),
                    vector_records: Vec::new(),
                    batches_failed: 0,
                    degraded: false,
                };
            }
        };
        let language = file.language.clone();
        self.parse_and_embed(&file.relative_path, &content, &language, cancel)
    }

    /// Chunks every element's content, then submits chunks in
    /// `batch_size`-sized groups to the embedder, per spec §4.5. A failed
    /// batch is retried once; if the retry also fails, that batch alone is
    /// dropped (not split) and recorded — other batches for the same file
    /// still succeed, and the structured write for all elements proceeds
    /// regardless.
    fn parse_and_embed(&self, relative_path: &str, content: &str, language: &str, cancel: &CancellationToken) -> FileOutcome {
        let mut outcome = parsers::parse(content, relative_path, language);
        if outcome.degraded {
            debug!("parser degraded for {}", relative_path);
        }
        self.annotate_with_git_metadata(relative_path, &mut outcome.elements);

        struct PendingChunk<'a> {
            element: &'a Element,
            chunk_index: usize,
            total_chunks: usize,
            text: String,
        }

        let mut pending: Vec<PendingChunk> = Vec::new();
        for element in &outcome.elements {
            let chunks = chunk_content(&element.content, self.config.chunk_size_chars);
            let total = chunks.len();
            for chunk in chunks {
                pending.push(PendingChunk { element, chunk_index: chunk.index, total_chunks: total, text: chunk.text });
            }
        }

        let batch_size = self.config.batch_size.max(1);
        let mut vector_records = Vec::new();
        let mut batches_failed = 0usize;

        for batch in pending.chunks(batch_size) {
            if cancel.is_cancelled() {
                break;
            }
            let texts: Vec<String> = batch.iter().map(|p| p.text.clone()).collect();
            let mut result = self.embedder.embed_batch(&texts);
            if result.is_err() {
                result = self.embedder.embed_batch(&texts);
            }
            match result {
                Ok(vectors) => {
                    for (pending_chunk, vector) in batch.iter().zip(vectors.into_iter()) {
                        let element = pending_chunk.element;
                        let id = chunk_id(&element.id, pending_chunk.chunk_index, pending_chunk.total_chunks);
                        let mut metadata = HashMap::new();
                        metadata.insert("element_id".to_string(), serde_json::json!(element.id));
                        metadata.insert("file_path".to_string(), serde_json::json!(element.file_path));
                        metadata.insert("start_line".to_string(), serde_json::json!(element.start_line));
                        metadata.insert("type".to_string(), serde_json::json!(element.element_type.as_str()));
                        metadata.insert("language".to_string(), serde_json::json!(element.language));
                        vector_records.push(VectorRecord { id, embedding: vector, metadata, chunk_text: pending_chunk.text.clone() });
                    }
                }
                Err(e) => {
                    warn!("embedding batch failed for {} after retry: {}", relative_path, e);
                    batches_failed += 1;
                }
            }
        }

        FileOutcome { relative_path: relative_path.to_string(), elements: outcome.elements, vector_records, batches_failed, degraded: outcome.degraded }
    }

    fn apply_outcome(&self, outcome: &FileOutcome, report: &mut PassReport) -> IndexResult<()> {
        self.structured.upsert_elements(&outcome.relative_path, outcome.elements.clone())?;
        for element in &outcome.elements {
            let records: Vec<VectorRecord> =
                outcome.vector_records.iter().filter(|r| r.metadata.get("element_id").and_then(|v| v.as_str()) == Some(&element.id)).cloned().collect();
            if !records.is_empty() {
                self.vectors.upsert_for_element(&element.id, records)?;
            }
        }
        report.files_indexed += 1;
        report.elements_produced += outcome.elements.len();
        report.chunks_embedded += outcome.vector_records.len();
        report.batches_failed += outcome.batches_failed;
        if outcome.degraded {
            report.files_skipped.push((outcome.relative_path.clone(), "parser degraded to fallback".to_string()));
        }
        Ok(())
    }

    /// Clears all indexed elements and embeddings. When `dry_run` is set,
    /// reports what would be deleted without deleting anything.
    pub fn clean(&self, dry_run: bool) -> IndexResult<CleanReport> {
        let elements = self.structured.all();
        let files: std::collections::HashSet<String> = elements.iter().map(|e| e.file_path.clone()).collect();
        let report =
            CleanReport { dry_run, elements_removed: elements.len(), files_affected: files.len(), chunks_removed: self.vectors.len() };

        if dry_run {
            return Ok(report);
        }

        self.vectors.clear()?;
        for file_path in files {
            self.structured.delete_by_file(&file_path)?;
        }
        Ok(report)
    }

    fn write_manifest(&self, report: &PassReport) -> IndexResult<()> {
        let manifest_path = self.root.join(".context-index").join("manifest.json");
        let now = Utc::now();
        let mut manifest = ProjectManifest::load(&manifest_path)?.unwrap_or_else(|| ProjectManifest::new(self.root.display().to_string(), now));

        let stats = self.structured.statistics();
        manifest.record_pass(now, report.files_indexed, stats.element_count, stats.by_language);
        manifest.save(&manifest_path).map_err(|e| IndexError::Store(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embed::HashEmbedder;

    fn setup(dir: &Path) -> Coordinator {
        let config = IndexConfig::default();
        Coordinator::new(
            dir.to_path_buf(),
            config,
            StructuredIndex::in_memory(),
            VectorIndex::in_memory(),
            Box::new(HashEmbedder::new(16)),
        )
    }

    #[test]
    fn full_pass_indexes_python_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.py"), "def greet(name: str) -> str:\n    return f'hi {name}'\n").unwrap();
        let coordinator = setup(dir.path());
        let report = coordinator.run_full_pass(&CancellationToken::new()).unwrap();
        assert_eq!(report.files_indexed, 1);
        assert!(report.elements_produced >= 2);
        assert!(report.chunks_embedded >= 2);
    }

    #[test]
    fn reindex_file_with_none_content_deletes() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.py"), "def f():\n    pass\n").unwrap();
        let coordinator = setup(dir.path());
        coordinator.run_full_pass(&CancellationToken::new()).unwrap();
        assert!(!coordinator.structured.get_by_file("a.py").is_empty());

        coordinator.reindex_file("a.py", None).unwrap();
        assert!(coordinator.structured.get_by_file("a.py").is_empty());
    }

    struct FailingEmbedder;

    impl Embedder for FailingEmbedder {
        fn dimension(&self) -> usize {
            8
        }

        fn embed_batch(&self, _texts: &[String]) -> IndexResult<Vec<Vec<f32>>> {
            Err(IndexError::Embedding("simulated failure".to_string()))
        }
    }

    #[test]
    fn embedder_failure_drops_only_that_batch_but_structured_write_still_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.py"), "def f():\n    pass\n").unwrap();
        let config = IndexConfig::default();
        let coordinator =
            Coordinator::new(dir.path().to_path_buf(), config, StructuredIndex::in_memory(), VectorIndex::in_memory(), Box::new(FailingEmbedder));

        let report = coordinator.run_full_pass(&CancellationToken::new()).unwrap();
        assert_eq!(report.files_indexed, 1);
        assert!(report.batches_failed > 0);
        assert_eq!(report.chunks_embedded, 0);
        assert!(!coordinator.structured.get_by_file("a.py").is_empty());
    }

    #[test]
    fn cancelled_pass_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.py"), "def f():\n    pass\n").unwrap();
        let coordinator = setup(dir.path());
        let cancel = CancellationToken::new();
        cancel.cancel();
        let report = coordinator.run_full_pass(&cancel).unwrap();
        assert!(report.cancelled);
    }

    #[test]
    fn cancellation_mid_file_stops_further_embedding_batches() {
        let dir = tempfile::tempdir().unwrap();
        let source = (0..20).map(|i| format!("def f{}():\n    pass\n", i)).collect::<Vec<_>>().join("\n");
        std::fs::write(dir.path().join("a.py"), source).unwrap();
        let mut config = IndexConfig::default();
        config.batch_size = 1;
        let coordinator = Coordinator::new(dir.path().to_path_buf(), config, StructuredIndex::in_memory(), VectorIndex::in_memory(), Box::new(HashEmbedder::new(16)));

        let cancel = CancellationToken::new();
        cancel.cancel();
        let outcome = coordinator.parse_and_embed("a.py", "def f():\n    pass\n", "python", &cancel);
        assert_eq!(outcome.vector_records.len(), 0);
    }

    #[test]
    fn git_metadata_is_attached_when_root_is_a_repo() {
        let dir = tempfile::tempdir().unwrap();
        let repo = git2::Repository::init(dir.path()).unwrap();
        let mut git_config = repo.config().unwrap();
        git_config.set_str("user.name", "Tester").unwrap();
        git_config.set_str("user.email", "tester@example.com").unwrap();
        let sig = repo.signature().unwrap();
        std::fs::write(dir.path().join("a.py"), "def f():\n    pass\n").unwrap();
        let tree_id = {
            let mut index = repo.index().unwrap();
            index.add_path(Path::new("a.py")).unwrap();
            index.write().unwrap();
            index.write_tree().unwrap()
        };
        let tree = repo.find_tree(tree_id).unwrap();
        repo.commit(Some("HEAD"), &sig, &sig, "add a.py", &tree, &[]).unwrap();

        let coordinator = setup(dir.path());
        let report = coordinator.run_full_pass(&CancellationToken::new()).unwrap();
        assert_eq!(report.files_indexed, 1);

        let elements = coordinator.structured.get_by_file("a.py");
        assert!(elements.iter().any(|e| e.metadata.contains_key("git_last_commit_author")));
    }
}
