//! CLI command definitions and dispatch, the slim ops surface over the
//! library crate. Structured the way the teacher's `cli::Cli` /
//! `cli::run` split top-level args from a `Commands` enum.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use context_index::config::IndexConfig;
use context_index::coordinator::{CancellationToken, Coordinator};
use context_index::element::ElementType;
use context_index::embed::{Embedder, HashEmbedder};
use context_index::store::structured::StructuredIndex;
use context_index::store::vector::VectorIndex;
use context_index::watch::{self, WatchOptions};

#[derive(Parser, Debug)]
#[command(name = "context-indexd")]
#[command(version, about = "Incremental context indexing and retrieval engine", long_about = None)]
pub struct Cli {
    /// Path to the project root (default: current directory).
    #[arg(global = true, default_value = ".")]
    pub path: PathBuf,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long, global = true, default_value = "info", value_parser = ["error", "warn", "info", "debug", "trace"])]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a full indexing pass.
    Index,
    /// Semantic search over indexed chunks.
    SearchSemantic {
        query: String,
        #[arg(long, default_value = "10")]
        limit: usize,
    },
    /// Structural (name pattern) search.
    SearchStructural {
        pattern: String,
        #[arg(long)]
        element_type: Option<String>,
        #[arg(long, default_value = "20")]
        limit: usize,
    },
    /// Show elements in a file plus its direct importers/importees.
    ContextForFile {
        file_path: String,
        #[arg(long, default_value = "1")]
        radius: u32,
    },
    /// Print element counts by type and language.
    Structure,
    /// List recognised dependency manifests.
    Dependencies,
    /// Watch for changes and reindex incrementally.
    Watch,
    /// Start the MCP server on stdio.
    Serve,
    /// Clear all indexed data without touching source files.
    Clean {
        /// Report what would be deleted without deleting it.
        #[arg(long)]
        dry_run: bool,
    },
}

fn open_stores(root: &PathBuf, config: &IndexConfig) -> Result<(StructuredIndex, VectorIndex)> {
    let db_root = root.join(".context-index");
    let structured = StructuredIndex::open(&db_root.join("structured.db"))?;
    let vectors = VectorIndex::open(&db_root.join("vectors").join("vectors.db"))?;
    Ok((structured, vectors))
}

pub fn run(cli: Cli) -> Result<()> {
    let root = std::fs::canonicalize(&cli.path)?;
    let config = IndexConfig::load(&root);
    let (structured, vectors) = open_stores(&root, &config)?;
    let embedder: Box<dyn Embedder> = Box::new(HashEmbedder::default());
    let coordinator = Coordinator::new(root.clone(), config.clone(), structured, vectors, embedder);

    match cli.command {
        Commands::Index => {
            let report = coordinator.run_full_pass(&CancellationToken::new())?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::SearchSemantic { query, limit } => {
            let q = coordinator_query(&coordinator);
            let results = q.search_semantic(&query, limit, None, None, None)?;
            println!("{}", serde_json::to_string_pretty(&results.iter().map(|h| &h.record).collect::<Vec<_>>())?);
        }
        Commands::SearchStructural { pattern, element_type, limit } => {
            let q = coordinator_query(&coordinator);
            let results = q.search_structural(&pattern, element_type.as_deref().and_then(parse_element_type), None, None, limit);
            println!("{}", serde_json::to_string_pretty(&results)?);
        }
        Commands::ContextForFile { file_path, radius } => {
            let q = coordinator_query(&coordinator);
            let window = q.get_context_for_file(&file_path, radius);
            println!("{}", serde_json::to_string_pretty(&window)?);
        }
        Commands::Structure => {
            let q = coordinator_query(&coordinator);
            println!("{}", serde_json::to_string_pretty(&q.get_project_structure())?);
        }
        Commands::Dependencies => {
            let q = coordinator_query(&coordinator);
            println!("{}", serde_json::to_string_pretty(&q.get_dependencies())?);
        }
        Commands::Watch => {
            let options = WatchOptions::from(&config);
            watch::run(&coordinator, options, || false)?;
        }
        Commands::Serve => {
            let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;
            runtime.block_on(context_index::mcp::run_mcp_server(root))?;
        }
        Commands::Clean { dry_run } => {
            let report = coordinator.clean(dry_run)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}

fn coordinator_query(coordinator: &Coordinator) -> context_index::query::QueryLayer<'_> {
    context_index::query::QueryLayer {
        structured: &coordinator.structured,
        vectors: &coordinator.vectors,
        embedder: coordinator.embedder.as_ref(),
        config: &coordinator.config,
        root: &coordinator.root,
    }
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
