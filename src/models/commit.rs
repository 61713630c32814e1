use serde::{Deserialize, Serialize};

/// Pull/merge-request provenance mined from a commit subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrInfo {
    pub title: String,
    pub number: String,
}

/// Local committer identity from `git config`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub name: String,
    pub email: String,
}

impl UserIdentity {
    /// Email match is preferred; name equality is a fallback heuristic and can
    /// false-positive on common names.
    pub fn matches(&self, author: &str, author_email: &str) -> bool {
        (!author_email.is_empty() && self.email == author_email) || self.name == author
    }
}

/// Most recent commit touching a file, for the status bar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileCommit {
    pub hash: String,
    pub author: String,
    pub author_email: String,
    pub time: i64,
}
