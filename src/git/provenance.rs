//! Pull-request provenance from commit subjects.
//!
//! Hosting services leave recognisable traces in commit subjects:
//! - GitHub merge commits: `Merge pull request #12 from user/branch`
//! - Bitbucket merges: `Merged in feature (pull request #12)`
//! - Squash merges: `Add caching (#12)`, GitLab `Add caching (!12)`
//! - Loose references: `fixes #12`, `PR 12`, `pull request #12`
//!
//! The patterns are an ordered table; the first one that matches decides.
//! Commit data is immutable, so lookups are cached per `(repo root, hash)`
//! with no invalidation beyond LRU eviction.

use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tracing::debug;

use crate::cache::{DEFAULT_CACHE_SIZE, SharedLru};
use crate::git::porcelain::CommitMetadata;
use crate::git::runner::{DEFAULT_GIT_TIMEOUT, GitCommand, GitRunner};
use crate::models::PrInfo;

/// Summary used when neither the log nor the porcelain output has one.
pub const NO_COMMIT_MESSAGE: &str = "No commit message";

/// Captured titles that are really the merge boilerplate, not a PR title.
const DEGENERATE_TITLES: &[&str] = &["Merge pull request", "Merged in"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TitleSource {
    /// Title is this capture group of the subject.
    Captured(usize),
    /// Title must be looked up in the merged ancestry.
    MergeAncestry,
    /// Title is the whole subject.
    Subject,
}

struct PrPattern {
    regex: Regex,
    number_group: usize,
    title: TitleSource,
}

static PR_PATTERNS: OnceLock<Vec<PrPattern>> = OnceLock::new();
static MERGED_TITLE: OnceLock<Regex> = OnceLock::new();

fn pr_patterns() -> &'static [PrPattern] {
    PR_PATTERNS.get_or_init(|| {
        let pattern = |re: &str, number_group: usize, title: TitleSource| PrPattern {
            regex: Regex::new(re).expect("valid regex"),
            number_group,
            title,
        };
        vec![
            pattern(r"^Merge pull request #(\d+) from .+", 1, TitleSource::MergeAncestry),
            pattern(r"^Merged in .+ \(pull request #(\d+)\)", 1, TitleSource::MergeAncestry),
            pattern(r"^(.+) \(#(\d+)\)$", 2, TitleSource::Captured(1)),
            pattern(r"^(.+) \(!(\d+)\)$", 2, TitleSource::Captured(1)),
            pattern(r"#(\d+)", 1, TitleSource::Subject),
            pattern(r"PR\s*#?(\d+)", 1, TitleSource::Subject),
            pattern(r"(?i)pull\s*request\s*#?(\d+)", 1, TitleSource::Subject),
        ]
    })
}

fn merged_title() -> &'static Regex {
    MERGED_TITLE.get_or_init(|| Regex::new(r"^(.+?) \(#\d+\)$").expect("valid regex"))
}

/// What the subject alone says about a pull request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrMatch {
    pub number: String,
    /// `None` when the title has to come from the merge ancestry.
    pub title: Option<String>,
}

/// Run the pattern table against a commit subject.
pub fn match_pr_subject(subject: &str) -> Option<PrMatch> {
    pr_patterns().iter().find_map(|pattern| {
        let caps = pattern.regex.captures(subject)?;
        let number = caps.get(pattern.number_group)?.as_str().to_string();
        let title = match pattern.title {
            TitleSource::Captured(group) => caps
                .get(group)
                .map(|m| m.as_str())
                .filter(|title| !DEGENERATE_TITLES.contains(title))
                .map(str::to_string),
            TitleSource::MergeAncestry => None,
            TitleSource::Subject => Some(subject.to_string()),
        };
        Some(PrMatch { number, title })
    })
}

/// First `"<title> (#<n>)"` line of a merge-ancestry log.
pub fn extract_merged_title(log: &str) -> Option<String> {
    log.lines()
        .map(str::trim)
        .find_map(|line| merged_title().captures(line))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

type CommitKey = (PathBuf, String);

pub struct ProvenanceEnricher {
    runner: Arc<dyn GitRunner>,
    subjects: SharedLru<CommitKey, String>,
    prs: SharedLru<CommitKey, Option<PrInfo>>,
    timeout_ms: AtomicU64,
}

impl ProvenanceEnricher {
    pub fn new(runner: Arc<dyn GitRunner>) -> Self {
        Self {
            runner,
            subjects: SharedLru::new(DEFAULT_CACHE_SIZE),
            prs: SharedLru::new(DEFAULT_CACHE_SIZE),
            timeout_ms: AtomicU64::new(DEFAULT_GIT_TIMEOUT.as_millis() as u64),
        }
    }

    /// One-line subject of `hash` via `git log --format=%s -n 1`.
    pub async fn commit_subject(&self, root: &Path, hash: &str) -> Option<String> {
        let key = (root.to_path_buf(), hash.to_string());
        if let Some(subject) = self.subjects.get(&key) {
            return Some(subject);
        }

        let command = GitCommand::new(root, ["log", "--format=%s", "-n", "1", hash])
            .with_timeout(self.timeout());
        let subject = match self.runner.run(&command).await {
            Ok(stdout) => stdout.trim().to_string(),
            Err(e) => {
                debug!(hash, error = %e, "commit subject lookup failed");
                return None;
            }
        };
        if subject.is_empty() {
            return None;
        }
        self.subjects.set(key, subject.clone());
        Some(subject)
    }

    /// PR number and title for `hash`, if its subject looks like a PR.
    pub async fn pr_info(&self, root: &Path, hash: &str) -> Option<PrInfo> {
        let key = (root.to_path_buf(), hash.to_string());
        if let Some(cached) = self.prs.get(&key) {
            return cached;
        }

        let subject = self.commit_subject(root, hash).await?;
        let info = match match_pr_subject(&subject) {
            None => None,
            Some(PrMatch { number, title: Some(title) }) => Some(PrInfo { title, number }),
            Some(PrMatch { number, title: None }) => {
                let title = self.merge_title(root, hash).await.unwrap_or(subject);
                Some(PrInfo { title, number })
            }
        };
        debug!(hash, pr = ?info, "resolved pull request provenance");
        self.prs.set(key, info.clone());
        info
    }

    async fn merge_title(&self, root: &Path, hash: &str) -> Option<String> {
        let range = format!("{hash}^..{hash}");
        let command = GitCommand::new(
            root,
            ["log", "--format=%s", "--merges", "--ancestry-path", range.as_str()],
        )
        .with_timeout(self.timeout());
        match self.runner.run(&command).await {
            Ok(stdout) => extract_merged_title(&stdout),
            Err(e) => {
                debug!(hash, error = %e, "merge ancestry lookup failed");
                None
            }
        }
    }

    /// Summary to display and PR number, falling back from PR title to
    /// commit subject to porcelain summary.
    pub async fn summarize(&self, root: &Path, meta: &CommitMetadata) -> (String, Option<String>) {
        if let Some(pr) = self.pr_info(root, &meta.hash).await {
            return (pr.title, Some(pr.number));
        }
        let summary = match self.commit_subject(root, &meta.hash).await {
            Some(subject) => subject,
            None => meta
                .summary
                .clone()
                .unwrap_or_else(|| NO_COMMIT_MESSAGE.to_string()),
        };
        (summary, None)
    }

    pub fn set_limit(&self, limit: usize) {
        self.subjects.set_limit(limit);
        self.prs.set_limit(limit);
    }

    pub fn clear(&self) {
        self.subjects.clear();
        self.prs.clear();
    }

    pub fn set_timeout(&self, timeout: Duration) {
        self.timeout_ms.store(timeout.as_millis() as u64, Ordering::Relaxed);
    }

    fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms.load(Ordering::Relaxed))
    }
}
