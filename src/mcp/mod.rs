//! MCP (Model Context Protocol) server: exposes the query layer as tools
//! over stdio, per spec §6.
//!
//! ```bash
//! context-indexd serve /path/to/project
//! ```

pub mod params;
pub mod server;
pub mod state;

pub use server::ContextIndexServer;
pub use state::HandlerState;

use std::path::PathBuf;

use anyhow::Result;
use rmcp::ServiceExt;

pub async fn run_mcp_server(repo_path: PathBuf) -> Result<()> {
    eprintln!("context-index MCP server starting...");
    eprintln!("   Repository: {}", repo_path.display());
    eprintln!("   Transport: stdio (JSON-RPC 2.0)");

    let state = HandlerState::new(repo_path)?;
    let service = ContextIndexServer::new(state)
        .serve(rmcp::transport::stdio())
        .await
        .inspect_err(|e| tracing::error!("MCP serve error: {:?}", e))?;
    service.waiting().await?;
    Ok(())
}
