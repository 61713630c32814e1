//! Repository root discovery.
//!
//! Walks a file's ancestors looking for a `.git` entry (directory for normal
//! clones, file for worktrees and submodules). Results, including "no
//! repository", are memoised per file path until the cache is cleared.

use std::path::{Path, PathBuf};
use tracing::debug;

use crate::cache::{DEFAULT_CACHE_SIZE, SharedLru};

pub struct RepoLocator {
    cache: SharedLru<PathBuf, Option<PathBuf>>,
}

impl RepoLocator {
    pub fn new() -> Self {
        Self::with_limit(DEFAULT_CACHE_SIZE)
    }

    pub fn with_limit(limit: usize) -> Self {
        Self {
            cache: SharedLru::new(limit),
        }
    }

    /// Nearest ancestor of `file` containing a `.git` entry, or `None`.
    pub fn find_git_root(&self, file: &Path) -> Option<PathBuf> {
        if let Some(cached) = self.cache.get(&file.to_path_buf()) {
            return cached;
        }
        let root = find_git_root_uncached(file);
        debug!(file = %file.display(), root = ?root, "resolved repository root");
        self.cache.set(file.to_path_buf(), root.clone());
        root
    }

    pub fn set_limit(&self, limit: usize) {
        self.cache.set_limit(limit);
    }

    pub fn clear(&self) {
        self.cache.clear();
    }
}

impl Default for RepoLocator {
    fn default() -> Self {
        Self::new()
    }
}

/// Whether `dir` holds a `.git` directory or file. I/O errors count as no.
pub fn is_git_repository(dir: &Path) -> bool {
    std::fs::metadata(dir.join(".git"))
        .map(|meta| meta.is_dir() || meta.is_file())
        .unwrap_or(false)
}

/// Uncached walk from the file's parent directory up to the filesystem root.
pub fn find_git_root_uncached(file: &Path) -> Option<PathBuf> {
    file.parent()?
        .ancestors()
        .find(|dir| !dir.as_os_str().is_empty() && is_git_repository(dir))
        .map(Path::to_path_buf)
}
