//! Project-level configuration.
//!
//! Loads `context-index.toml` from the project root, the same layered way
//! `config::project_config` loads `repotoire.toml`: a TOML file with
//! `#[serde(default)]` fields, each overridable by a `CONTEXT_INDEX_*`
//! environment variable.

use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, warn};

/// Built-in default exclusion patterns: virtual environments, dependency
/// caches, VCS directories, build outputs, editor metadata, compiled
/// artefacts.
pub const DEFAULT_EXCLUDE_PATTERNS: &[&str] = &[
    "**/.git/**",
    "**/.hg/**",
    "**/.svn/**",
    "**/.venv/**",
    "**/venv/**",
    "**/__pycache__/**",
    "**/node_modules/**",
    "**/.cargo/**",
    "**/target/**",
    "**/dist/**",
    "**/build/**",
    "**/.idea/**",
    "**/.vscode/**",
    "**/vendor/**",
    "**/third_party/**",
    "**/*.pyc",
    "**/*.class",
    "**/*.o",
    "**/*.min.js",
];

/// Manifest file names recognised by dependency-scan mode regardless of
/// exclusion.
pub const DEPENDENCY_MANIFEST_NAMES: &[&str] = &[
    "Cargo.toml",
    "Cargo.lock",
    "package.json",
    "package-lock.json",
    "requirements.txt",
    "pyproject.toml",
    "go.mod",
    "go.sum",
    "pom.xml",
];

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    pub max_file_size_bytes: u64,
    pub chunk_size_chars: usize,
    pub batch_size: usize,
    pub embedding_model_id: String,
    pub supported_extensions: HashMap<String, String>,
    pub default_exclusions: bool,
    pub exclude_patterns: Vec<String>,
    pub dependency_scan: bool,
    pub watcher_debounce_ms: u64,
    pub watcher_max_hold_ms: u64,
    pub similarity_threshold: f32,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            max_file_size_bytes: 2 * 1024 * 1024,
            chunk_size_chars: 2000,
            batch_size: 32,
            embedding_model_id: "local-hash-v1".to_string(),
            supported_extensions: default_extension_table(),
            default_exclusions: true,
            exclude_patterns: Vec::new(),
            dependency_scan: false,
            watcher_debounce_ms: 500,
            watcher_max_hold_ms: 5000,
            similarity_threshold: 0.5,
        }
    }
}

fn default_extension_table() -> HashMap<String, String> {
    let pairs: &[(&str, &str)] = &[
        ("py", "python"),
        ("pyi", "python"),
        ("ts", "typescript"),
        ("tsx", "typescript"),
        ("js", "javascript"),
        ("jsx", "javascript"),
        ("mjs", "javascript"),
        ("cjs", "javascript"),
        ("rs", "rust"),
        ("go", "go"),
        ("java", "java"),
        ("cs", "csharp"),
        ("c", "c"),
        ("h", "c"),
        ("cpp", "cpp"),
        ("cc", "cpp"),
        ("hpp", "cpp"),
        ("md", "markdown"),
        ("markdown", "markdown"),
    ];
    pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}

impl IndexConfig {
    /// Load from `context-index.toml` in `root`, if present, layering env
    /// var overrides on top. Missing file is not an error: defaults apply.
    pub fn load(root: &Path) -> Self {
        let mut config = Self::default();

        let path = root.join("context-index.toml");
        if path.exists() {
            match std::fs::read_to_string(&path) {
                Ok(contents) => match toml::from_str::<IndexConfig>(&contents) {
                    Ok(parsed) => config = parsed,
                    Err(e) => warn!("failed to parse {}: {}", path.display(), e),
                },
                Err(e) => warn!("failed to read {}: {}", path.display(), e),
            }
        } else {
            debug!("no context-index.toml at {}, using defaults", root.display());
        }

        config.apply_env_overrides();
        config
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("CONTEXT_INDEX_MAX_FILE_SIZE_BYTES") {
            if let Ok(n) = v.parse() {
                self.max_file_size_bytes = n;
            }
        }
        if let Ok(v) = std::env::var("CONTEXT_INDEX_CHUNK_SIZE_CHARS") {
            if let Ok(n) = v.parse() {
                self.chunk_size_chars = n;
            }
        }
        if let Ok(v) = std::env::var("CONTEXT_INDEX_BATCH_SIZE") {
            if let Ok(n) = v.parse() {
                self.batch_size = n;
            }
        }
        if let Ok(v) = std::env::var("CONTEXT_INDEX_EMBEDDING_MODEL_ID") {
            self.embedding_model_id = v;
        }
        if let Ok(v) = std::env::var("CONTEXT_INDEX_SIMILARITY_THRESHOLD") {
            if let Ok(n) = v.parse() {
                self.similarity_threshold = n;
            }
        }
        if let Ok(v) = std::env::var("CONTEXT_INDEX_DEPENDENCY_SCAN") {
            self.dependency_scan = v == "1" || v.eq_ignore_ascii_case("true");
        }
    }

    pub fn effective_exclude_patterns(&self) -> Vec<String> {
        let mut patterns = Vec::new();
        if self.default_exclusions {
            patterns.extend(DEFAULT_EXCLUDE_PATTERNS.iter().map(|s| s.to_string()));
        }
        patterns.extend(self.exclude_patterns.iter().cloned());
        patterns
    }
}
