//! rmcp-based MCP server exposing the indexing engine's query surface.
//!
//! Wires each tool to a `HandlerState` method via `#[tool_router]`/
//! `#[tool_handler]`, the same macro-driven shape as the teacher's
//! `mcp::rmcp_server::RepotoireServer`. Handlers delegate to
//! `spawn_blocking` since the stores and parsers are synchronous.

use rmcp::{
    handler::server::{router::tool::ToolRouter, tool::Parameters},
    model::{self, *},
    tool, tool_handler, tool_router, ServerHandler,
};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::RwLock;

type McpError = model::ErrorData;

use super::params::*;
use super::state::HandlerState;
use crate::element::ElementType;

#[derive(Clone)]
pub struct ContextIndexServer {
    state: Arc<RwLock<HandlerState>>,
    #[allow(dead_code)]
    tool_router: ToolRouter<ContextIndexServer>,
}

fn value_to_result(result: serde_json::Value) -> CallToolResult {
    CallToolResult::success(vec![Content::text(serde_json::to_string_pretty(&result).unwrap_or_else(|_| result.to_string()))])
}

fn internal_error(e: impl std::fmt::Display) -> McpError {
    McpError::internal_error(e.to_string(), None)
}

fn parse_element_type(s: &str) -> Option<ElementType> {
    match s {
        "function" => Some(ElementType::Function),
        "method" => Some(ElementType::Method),
        "class" => Some(ElementType::Class),
        "module" => Some(ElementType::Module),
        "variable" => Some(ElementType::Variable),
        "import" => Some(ElementType::Import),
        "export" => Some(ElementType::Export),
        "heading" => Some(ElementType::Heading),
        "section" => Some(ElementType::Section),
        "block" => Some(ElementType::Block),
        "document" => Some(ElementType::Document),
        _ => None,
    }
}

#[tool_router]
impl ContextIndexServer {
    pub fn new(state: HandlerState) -> Self {
        let tool_router = Self::tool_router();
        Self { state: Arc::new(RwLock::new(state)), tool_router }
    }

    #[tool(name = "context_index_index_project", description = "Run a full indexing pass over the project and return a pass report.")]
    async fn context_index_index_project(&self, Parameters(_params): Parameters<IndexProjectParams>) -> Result<CallToolResult, McpError> {
        let state = self.state.clone();
        let report = tokio::task::spawn_blocking(move || {
            let state = state.blocking_read();
            state.index_project()
        })
        .await
        .map_err(internal_error)?
        .map_err(internal_error)?;

        Ok(value_to_result(serde_json::to_value(report).unwrap()))
    }

    #[tool(name = "context_index_search_semantic", description = "Semantic search over indexed code and documentation chunks.")]
    async fn context_index_search_semantic(&self, Parameters(params): Parameters<SearchSemanticParams>) -> Result<CallToolResult, McpError> {
        let state = self.state.clone();
        let result = tokio::task::spawn_blocking(move || {
            let state = state.blocking_read();
            let query = state.query();
            query.search_semantic(
                &params.query,
                params.limit.unwrap_or(10) as usize,
                params.element_type.as_deref().and_then(parse_element_type),
                params.language.as_deref(),
                params.file_prefix.as_deref(),
            )
        })
        .await
        .map_err(internal_error)?
        .map_err(internal_error)?;

        Ok(value_to_result(serde_json::json!({
            "results": result.into_iter().map(|hit| serde_json::json!({
                "id": hit.record.id,
                "similarity": hit.similarity,
                "chunk_text": hit.record.chunk_text,
                "metadata": hit.record.metadata,
            })).collect::<Vec<_>>()
        })))
    }

    #[tool(name = "context_index_search_structural", description = "Exact or glob-pattern search over element names.")]
    async fn context_index_search_structural(&self, Parameters(params): Parameters<SearchStructuralParams>) -> Result<CallToolResult, McpError> {
        let state = self.state.clone();
        let result = tokio::task::spawn_blocking(move || {
            let state = state.blocking_read();
            let query = state.query();
            query.search_structural(
                &params.pattern,
                params.element_type.as_deref().and_then(parse_element_type),
                params.language.as_deref(),
                params.file.as_deref(),
                params.limit.unwrap_or(20) as usize,
            )
        })
        .await
        .map_err(internal_error)?;

        Ok(value_to_result(serde_json::to_value(result).unwrap()))
    }

    #[tool(name = "context_index_context_for_file", description = "Fetch all elements in a file plus its direct importers and importees.")]
    async fn context_index_context_for_file(&self, Parameters(params): Parameters<ContextForFileParams>) -> Result<CallToolResult, McpError> {
        let state = self.state.clone();
        let result = tokio::task::spawn_blocking(move || {
            let state = state.blocking_read();
            let query = state.query();
            query.get_context_for_file(&params.file_path, params.radius.unwrap_or(1))
        })
        .await
        .map_err(internal_error)?;

        Ok(value_to_result(serde_json::to_value(result).unwrap()))
    }

    #[tool(name = "context_index_project_structure", description = "Return aggregate element counts plus the directory/file tree with per-file element counts by type.")]
    async fn context_index_project_structure(&self, Parameters(_params): Parameters<ProjectStructureParams>) -> Result<CallToolResult, McpError> {
        let state = self.state.clone();
        let result = tokio::task::spawn_blocking(move || {
            let state = state.blocking_read();
            state.query().get_project_structure()
        })
        .await
        .map_err(internal_error)?;

        Ok(value_to_result(serde_json::to_value(result).unwrap()))
    }

    #[tool(name = "context_index_dependencies", description = "List recognised dependency manifest files found in the project.")]
    async fn context_index_dependencies(&self, Parameters(_params): Parameters<DependenciesParams>) -> Result<CallToolResult, McpError> {
        let state = self.state.clone();
        let result = tokio::task::spawn_blocking(move || {
            let state = state.blocking_read();
            state.query().get_dependencies()
        })
        .await
        .map_err(internal_error)?;

        Ok(value_to_result(serde_json::to_value(result).unwrap()))
    }

    #[tool(name = "context_index_clean", description = "Clear all indexed elements and embeddings without deleting the project. Set dry_run to report what would be deleted instead.")]
    async fn context_index_clean(&self, Parameters(params): Parameters<CleanParams>) -> Result<CallToolResult, McpError> {
        let state = self.state.clone();
        let report = tokio::task::spawn_blocking(move || {
            let state = state.blocking_read();
            state.clean(params.dry_run.unwrap_or(false))
        })
        .await
        .map_err(internal_error)?
        .map_err(internal_error)?;

        Ok(value_to_result(serde_json::to_value(report).unwrap()))
    }
}

#[tool_handler]
impl ServerHandler for ContextIndexServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation { name: "context-index".to_string(), version: env!("CARGO_PKG_VERSION").to_string() },
            instructions: Some("Structured and semantic search over an indexed codebase.".to_string()),
        }
    }
}
