//! Shared state behind the MCP tool handlers: the project root plus the
//! lazily-opened dual stores and embedder. Grounded on `mcp::state`'s
//! pattern of a single struct owning everything a tool handler needs,
//! opened once and reused across calls.

use std::path::PathBuf;

use crate::config::IndexConfig;
use crate::coordinator::{CancellationToken, CleanReport, Coordinator, PassReport};
use crate::embed::{Embedder, HashEmbedder};
use crate::error::IndexResult;
use crate::query::QueryLayer;
use crate::store::structured::StructuredIndex;
use crate::store::vector::VectorIndex;

pub struct HandlerState {
    pub root: PathBuf,
    pub config: IndexConfig,
    coordinator: Coordinator,
}

impl HandlerState {
    pub fn new(root: PathBuf) -> IndexResult<Self> {
        let config = IndexConfig::load(&root);
        let db_root = root.join(".context-index");
        let structured = StructuredIndex::open(&db_root.join("structured.db"))?;
        let vectors = VectorIndex::open(&db_root.join("vectors").join("vectors.db"))?;
        let embedder: Box<dyn Embedder> = Box::new(HashEmbedder::default());
        let coordinator = Coordinator::new(root.clone(), config.clone(), structured, vectors, embedder);
        Ok(Self { root, config, coordinator })
    }

    pub fn index_project(&self) -> IndexResult<PassReport> {
        self.coordinator.run_full_pass(&CancellationToken::new())
    }

    pub fn query(&self) -> QueryLayer<'_> {
        QueryLayer {
            structured: &self.coordinator.structured,
            vectors: &self.coordinator.vectors,
            embedder: self.coordinator.embedder.as_ref(),
            config: &self.config,
            root: &self.root,
        }
    }

    pub fn clean(&self, dry_run: bool) -> IndexResult<CleanReport> {
        self.coordinator.clean(dry_run)
    }
}
