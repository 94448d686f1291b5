//! Dual-store persistence layer: the Structured Index (relational, keyed
//! by element id) and the Vector Index (content-addressed embeddings).
//!
//! Both stores share the `redb::Database` + `RwLock`-guarded in-memory
//! index architecture the teacher uses in `graph::store::GraphStore`,
//! adapted from a petgraph code-call-graph to plain element/chunk maps.

pub mod structured;
pub mod vector;
