//! MCP tool parameter types. Define the inputSchema for each tool via
//! `schemars` derive, the same way the teacher's `mcp::params` does.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct IndexProjectParams {}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct SearchSemanticParams {
    /// Natural language query.
    pub query: String,
    /// Maximum number of results (default: 10).
    pub limit: Option<u64>,
    /// Filter by element type (function, class, method, ...).
    pub element_type: Option<String>,
    /// Filter by language.
    pub language: Option<String>,
    /// Restrict to files under this path prefix.
    pub file_prefix: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct SearchStructuralParams {
    /// Name pattern, supports a single trailing or leading `*` wildcard.
    pub pattern: String,
    /// Filter by element type.
    pub element_type: Option<String>,
    /// Filter by language.
    pub language: Option<String>,
    /// Restrict to a single file (relative path).
    pub file: Option<String>,
    /// Maximum number of results (default: 20).
    pub limit: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ContextForFileParams {
    /// File path relative to the project root.
    pub file_path: String,
    /// Import-graph hops to include importers/importees from (default: 1).
    pub radius: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ProjectStructureParams {}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct DependenciesParams {}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct CleanParams {
    /// Report what would be deleted without deleting it.
    pub dry_run: Option<bool>,
}
