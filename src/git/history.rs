use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::debug;

use crate::cache::{DEFAULT_CACHE_SIZE, SharedLru};
use crate::error::{BlameError, Result};
use crate::git::runner::{DEFAULT_GIT_TIMEOUT, GitCommand, GitRunner};
use crate::models::FileCommit;

const LAST_COMMIT_FORMAT: &str = "--format=%H%x00%an%x00%ae%x00%at";

/// Per-file "last modified by" lookups for the status bar.
pub struct FileHistory {
    runner: Arc<dyn GitRunner>,
    cache: SharedLru<PathBuf, Result<FileCommit>>,
    timeout_ms: AtomicU64,
}

impl FileHistory {
    pub fn new(runner: Arc<dyn GitRunner>) -> Self {
        Self {
            runner,
            cache: SharedLru::new(DEFAULT_CACHE_SIZE),
            timeout_ms: AtomicU64::new(DEFAULT_GIT_TIMEOUT.as_millis() as u64),
        }
    }

    /// Most recent commit touching `file`. Failures are cached as well, so a
    /// file with no history costs one process until the cache is cleared.
    pub async fn last_commit(&self, root: &Path, file: &Path) -> Result<FileCommit> {
        let key = file.to_path_buf();
        if let Some(cached) = self.cache.get(&key) {
            return cached;
        }

        let relative = relative_to_root(root, file);
        let command = GitCommand::new(
            root,
            ["log", "-n", "1", LAST_COMMIT_FORMAT, "--", relative.as_str()],
        )
        .with_timeout(Duration::from_millis(self.timeout_ms.load(Ordering::Relaxed)));
        let result = match self.runner.run(&command).await {
            Ok(stdout) => parse_last_commit(&stdout),
            Err(e) => Err(e),
        };
        debug!(file = %file.display(), ok = result.is_ok(), "resolved last commit for file");
        self.cache.set(key, result.clone());
        result
    }

    pub fn set_limit(&self, limit: usize) {
        self.cache.set_limit(limit);
    }

    pub fn set_timeout(&self, timeout: Duration) {
        self.timeout_ms.store(timeout.as_millis() as u64, Ordering::Relaxed);
    }

    pub fn clear(&self) {
        self.cache.clear();
    }
}

/// Path of `file` relative to the repository root, with `/` separators.
pub fn relative_to_root(root: &Path, file: &Path) -> String {
    let relative = file.strip_prefix(root).unwrap_or(file);
    relative.to_string_lossy().replace('\\', "/")
}

fn parse_last_commit(stdout: &str) -> Result<FileCommit> {
    let line = stdout.trim();
    if line.is_empty() {
        return Err(BlameError::FileNotTracked("File has no git history".to_string()));
    }

    let fields: Vec<&str> = line.split('\0').collect();
    let [hash, author, email, time] = fields.as_slice() else {
        return Err(BlameError::ParseError("Invalid git log output format".to_string()));
    };
    let time = time
        .trim()
        .parse::<i64>()
        .map_err(|_| BlameError::ParseError("Invalid commit time in git log output".to_string()))?;

    Ok(FileCommit {
        hash: hash.chars().take(8).collect(),
        author: author.to_string(),
        author_email: email.to_string(),
        time,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BlameErrorKind;
    use crate::test_support::ScriptedRunner;

    #[test]
    fn relative_path_strips_root() {
        assert_eq!(
            relative_to_root(Path::new("/work/repo"), Path::new("/work/repo/src/main.rs")),
            "src/main.rs"
        );
        assert_eq!(
            relative_to_root(Path::new("/elsewhere"), Path::new("/work/repo/a.rs")),
            "/work/repo/a.rs"
        );
    }

    #[tokio::test]
    async fn parses_and_caches_last_commit() {
        let runner = Arc::new(ScriptedRunner::new().respond(
            "log -n 1 --format=%H%x00%an%x00%ae%x00%at -- src/main.rs",
            "0123456789abcdef\0Linus\0linus@example.com\01700000000\n",
        ));
        let history = FileHistory::new(runner.clone());
        let root = Path::new("/repo");
        let file = Path::new("/repo/src/main.rs");

        let commit = history.last_commit(root, file).await.unwrap();
        assert_eq!(
            commit,
            FileCommit {
                hash: "01234567".into(),
                author: "Linus".into(),
                author_email: "linus@example.com".into(),
                time: 1_700_000_000,
            }
        );
        history.last_commit(root, file).await.unwrap();
        assert_eq!(runner.call_count(), 1);
    }

    #[tokio::test]
    async fn empty_log_means_untracked() {
        let runner = Arc::new(ScriptedRunner::new().respond(
            "log -n 1 --format=%H%x00%an%x00%ae%x00%at -- new.rs",
            "",
        ));
        let history = FileHistory::new(runner.clone());
        let err = history
            .last_commit(Path::new("/repo"), Path::new("/repo/new.rs"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), BlameErrorKind::FileNotTracked);

        // The failure is cached too.
        history
            .last_commit(Path::new("/repo"), Path::new("/repo/new.rs"))
            .await
            .unwrap_err();
        assert_eq!(runner.call_count(), 1);
    }
}
