//! Exclusion Filter: glob-style default + user rules over relative paths.
//!
//! Grounded on `config::project_config::DEFAULT_EXCLUDE_PATTERNS` for the
//! default rule list and on `ignore::WalkBuilder` usage elsewhere in the
//! teacher for the general walk-and-filter shape; compiled here with
//! `globset` so `should_exclude` is a pure function independent of any
//! walker state.

use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::Path;

use crate::config::DEPENDENCY_MANIFEST_NAMES;

pub struct ExclusionFilter {
    set: GlobSet,
}

impl ExclusionFilter {
    pub fn new(patterns: &[String]) -> Self {
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            if let Ok(glob) = Glob::new(pattern) {
                builder.add(glob);
            }
        }
        let set = builder.build().unwrap_or_else(|_| GlobSetBuilder::new().build().unwrap());
        Self { set }
    }

    /// Deterministic, pure: same path always yields the same verdict.
    pub fn should_exclude(&self, relative_path: &Path) -> bool {
        let normalized = relative_path.to_string_lossy().replace('\\', "/");
        self.set.is_match(&normalized)
    }
}

/// Walks `root` looking only for recognised dependency-manifest files,
/// ignoring the exclusion rules entirely — manifests inside `node_modules/`
/// or similar are still relevant to `get_dependencies()`.
pub fn scan_dependency_files(root: &Path) -> Vec<std::path::PathBuf> {
    let mut found = Vec::new();
    let walker = ignore::WalkBuilder::new(root)
        .hidden(false)
        .git_ignore(false)
        .standard_filters(false)
        .build();
    for entry in walker.filter_map(|e| e.ok()) {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            if DEPENDENCY_MANIFEST_NAMES.contains(&name) {
                found.push(path.to_path_buf());
            }
        }
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_EXCLUDE_PATTERNS;
    use std::path::PathBuf;

    fn default_filter() -> ExclusionFilter {
        ExclusionFilter::new(&DEFAULT_EXCLUDE_PATTERNS.iter().map(|s| s.to_string()).collect::<Vec<_>>())
    }

    #[test]
    fn excludes_node_modules() {
        let filter = default_filter();
        assert!(filter.should_exclude(&PathBuf::from("node_modules/pkg/index.js")));
    }

    #[test]
    fn does_not_exclude_normal_source() {
        let filter = default_filter();
        assert!(!filter.should_exclude(&PathBuf::from("src/lib.rs")));
    }

    #[test]
    fn should_exclude_is_stable_across_calls() {
        let filter = default_filter();
        let path = PathBuf::from("target/debug/build/foo");
        let first = filter.should_exclude(&path);
        let second = filter.should_exclude(&path);
        assert_eq!(first, second);
        assert!(first);
    }

    #[test]
    fn user_patterns_layer_on_top_of_defaults() {
        let mut patterns: Vec<String> = DEFAULT_EXCLUDE_PATTERNS.iter().map(|s| s.to_string()).collect();
        patterns.push("**/scratch/**".to_string());
        let filter = ExclusionFilter::new(&patterns);
        assert!(filter.should_exclude(&PathBuf::from("scratch/notes.txt")));
        assert!(filter.should_exclude(&PathBuf::from("node_modules/pkg/index.js")));
    }

    #[test]
    fn scan_dependency_files_finds_manifest_inside_excluded_dir() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("node_modules/pkg");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(nested.join("package.json"), "{}").unwrap();
        let found = scan_dependency_files(dir.path());
        assert!(found.iter().any(|p| p.ends_with("package.json")));
    }
}
