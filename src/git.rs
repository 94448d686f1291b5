//! Read-only git metadata provider, supplementing the Element model with
//! last-touched-by / recency information when the project root is inside a
//! git repository.
//!
//! Narrowed from `git::history::GitHistory`, which also computes churn and
//! blame; this adapter keeps only `Repository::discover` + per-file commit
//! lookup, since the query layer only needs "who/when last touched this
//! file", not full evolution analytics.

use chrono::{TimeZone, Utc};
use git2::{DiffOptions, Repository, Sort};
use std::path::Path;
use std::sync::Mutex;

use crate::error::{IndexError, IndexResult};

#[derive(Debug, Clone, serde::Serialize)]
pub struct CommitInfo {
    pub hash: String,
    pub author: String,
    pub timestamp: String,
    pub message: String,
}

pub struct GitMetadataProvider {
    repo: Mutex<Repository>,
}

impl GitMetadataProvider {
    pub fn open(path: &Path) -> IndexResult<Self> {
        let repo = Repository::discover(path).map_err(|e| IndexError::Store(format!("not a git repository: {}", e)))?;
        Ok(Self { repo: Mutex::new(repo) })
    }

    pub fn is_repo(path: &Path) -> bool {
        Repository::discover(path).is_ok()
    }

    /// The most recent commit that touched `file_path`, or `None` if the
    /// file has no history (untracked, or the repo has no commits yet).
    pub fn last_commit_for_file(&self, file_path: &str, max_commits_scanned: usize) -> IndexResult<Option<CommitInfo>> {
        let repo = self.repo.lock().unwrap_or_else(|e| e.into_inner());
        let mut revwalk = repo.revwalk().map_err(git_err)?;
        revwalk.set_sorting(Sort::TIME).map_err(git_err)?;
        if revwalk.push_head().is_err() {
            return Ok(None);
        }

        for (scanned, oid_result) in revwalk.enumerate() {
            if scanned >= max_commits_scanned {
                break;
            }
            let oid = oid_result.map_err(git_err)?;
            let commit = repo.find_commit(oid).map_err(git_err)?;

            let parent = commit.parent(0).ok();
            let tree = commit.tree().map_err(git_err)?;
            let parent_tree = parent.as_ref().map(|p| p.tree()).transpose().map_err(git_err)?;

            let mut diff_opts = DiffOptions::new();
            diff_opts.pathspec(file_path);
            let diff = repo.diff_tree_to_tree(parent_tree.as_ref(), Some(&tree), Some(&mut diff_opts)).map_err(git_err)?;

            if diff.deltas().len() == 0 {
                continue;
            }

            let author = commit.author();
            let timestamp = match Utc.timestamp_opt(commit.time().seconds(), 0).single() {
                Some(dt) => dt.to_rfc3339(),
                None => "1970-01-01T00:00:00Z".to_string(),
            };
            return Ok(Some(CommitInfo {
                hash: commit.id().to_string()[..12].to_string(),
                author: author.name().unwrap_or("unknown").to_string(),
                timestamp,
                message: commit.message().unwrap_or("").lines().next().unwrap_or("").to_string(),
            }));
        }

        Ok(None)
    }
}

fn git_err(e: git2::Error) -> IndexError {
    IndexError::Store(format!("git error: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path as StdPath;

    fn init_repo_with_commit(dir: &StdPath) {
        let repo = Repository::init(dir).unwrap();
        let mut config = repo.config().unwrap();
        config.set_str("user.name", "Tester").unwrap();
        config.set_str("user.email", "tester@example.com").unwrap();
        let sig = repo.signature().unwrap();
        std::fs::write(dir.join("a.py"), "x = 1\n").unwrap();
        let tree_id = {
            let mut index = repo.index().unwrap();
            index.add_path(StdPath::new("a.py")).unwrap();
            index.write().unwrap();
            index.write_tree().unwrap()
        };
        let tree = repo.find_tree(tree_id).unwrap();
        repo.commit(Some("HEAD"), &sig, &sig, "add a.py", &tree, &[]).unwrap();
    }

    #[test]
    fn is_repo_true_for_git_dir() {
        let dir = tempfile::tempdir().unwrap();
        init_repo_with_commit(dir.path());
        assert!(GitMetadataProvider::is_repo(dir.path()));
    }

    #[test]
    fn is_repo_false_for_plain_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!GitMetadataProvider::is_repo(dir.path()));
    }

    #[test]
    fn last_commit_for_tracked_file() {
        let dir = tempfile::tempdir().unwrap();
        init_repo_with_commit(dir.path());
        let provider = GitMetadataProvider::open(dir.path()).unwrap();
        let commit = provider.last_commit_for_file("a.py", 50).unwrap();
        assert!(commit.is_some());
        assert_eq!(commit.unwrap().message, "add a.py");
    }

    #[test]
    fn last_commit_for_untracked_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        init_repo_with_commit(dir.path());
        let provider = GitMetadataProvider::open(dir.path()).unwrap();
        let commit = provider.last_commit_for_file("missing.py", 50).unwrap();
        assert!(commit.is_none());
    }
}
