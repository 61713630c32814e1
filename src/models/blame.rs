//! Per-line blame DTOs.
//!
//! A `BlameRecord` is what the presentation layer renders next to the cursor
//! line. Results are cached under a `BlameKey` that includes the document
//! version, so any edit makes older entries unreachable.

use serde::Serialize;
use std::path::PathBuf;

use crate::error::BlameError;

/// Display hash used for lines that are not committed yet.
pub const UNCOMMITTED_HASH: &str = "uncommitted";

/// Author shown for lines written by the local user.
pub const YOU: &str = "You";

/// Summary shown for lines that are not committed yet.
pub const NOT_COMMITTED_SUMMARY: &str = "Not committed yet";

/// Resolved attribution for a single source line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlameRecord {
    /// Display name, or "You" for the local user
    pub author: String,
    /// Raw author email, used only for identity matching
    pub author_email: Option<String>,
    /// Unix seconds of authorship (wall clock for uncommitted lines)
    pub time: i64,
    /// PR title, commit subject or porcelain summary, in that order
    pub summary: String,
    /// 8-character abbreviated commit id, or "uncommitted"
    pub hash: String,
    pub pr_number: Option<String>,
    pub is_uncommitted: bool,
}

impl BlameRecord {
    /// Record for a working-tree line that has no commit yet.
    pub fn uncommitted(now: i64) -> Self {
        Self {
            author: YOU.to_string(),
            author_email: None,
            time: now,
            summary: NOT_COMMITTED_SUMMARY.to_string(),
            hash: UNCOMMITTED_HASH.to_string(),
            pr_number: None,
            is_uncommitted: true,
        }
    }
}

/// Cache key for a blame lookup.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BlameKey {
    pub file: PathBuf,
    pub line: u32,
    pub version: i64,
}

/// Cached outcome of a blame lookup; errors are cached too.
pub type CacheEntry = Result<BlameRecord, BlameError>;
