//! File Walker: lazy `(path, language)` enumeration.
//!
//! Grounded on `cache::FileCache::warm`'s `ignore::WalkBuilder` usage and
//! `parsers::mod::language_for_extension`/`supported_extensions` for the
//! extension-to-language table.

use std::path::{Path, PathBuf};

use crate::config::IndexConfig;
use crate::exclude::ExclusionFilter;

#[derive(Debug, Clone)]
pub struct WalkedFile {
    pub path: PathBuf,
    pub relative_path: String,
    pub language: String,
}

#[derive(Debug, Clone)]
pub struct SkippedFile {
    pub relative_path: String,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct WalkReport {
    pub files: Vec<WalkedFile>,
    pub skipped: Vec<SkippedFile>,
}

/// Enumerate candidate files under `root`, applying the exclusion filter
/// and the configured max file size. Language detection is by extension.
pub fn walk(root: &Path, config: &IndexConfig, filter: &ExclusionFilter) -> WalkReport {
    let mut report = WalkReport::default();
    let walker = ignore::WalkBuilder::new(root).hidden(false).git_ignore(true).build();

    for entry in walker.filter_map(|e| e.ok()) {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let relative_path = relative_path_str(root, path);

        if filter.should_exclude(Path::new(&relative_path)) {
            continue;
        }

        let Some(language) = detect_language(path, config) else {
            continue;
        };

        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > config.max_file_size_bytes => {
                report.skipped.push(SkippedFile {
                    relative_path,
                    reason: format!(
                        "file size {} exceeds max_file_size_bytes {}",
                        meta.len(),
                        config.max_file_size_bytes
                    ),
                });
            }
            Ok(_) => report.files.push(WalkedFile {
                path: path.to_path_buf(),
                relative_path,
                language,
            }),
            Err(e) => report.skipped.push(SkippedFile {
                relative_path,
                reason: format!("stat failed: {}", e),
            }),
        }
    }

    report
}

pub fn relative_path_str(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

pub fn detect_language(path: &Path, config: &IndexConfig) -> Option<String> {
    let ext = path.extension().and_then(|e| e.to_str())?;
    config.supported_extensions.get(ext).cloned()
}
