//! Parser for `git blame --line-porcelain` output of a single line.
//!
//! Output shape:
//! ```text
//! <hash> <orig-line> <final-line> [<group-size>]
//! author <name>
//! author-mail <<email>>
//! author-time <unix seconds>
//! ...
//! summary <subject>
//! \t<line content>
//! ```

use std::collections::HashMap;
use tracing::warn;

use crate::error::{BlameError, Result};

/// Commit ids starting with this are the working tree, not a real commit.
pub const UNCOMMITTED_HASH_PREFIX: &str = "00000000";

const SHORT_HASH_LEN: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedBlame {
    /// Line changed in the working tree; no metadata is meaningful.
    Uncommitted,
    Committed(CommitMetadata),
}

/// Raw metadata for a committed line, before identity and PR enrichment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitMetadata {
    /// Full commit id
    pub hash: String,
    pub author: String,
    /// Email without angle brackets
    pub author_email: String,
    pub author_time: i64,
    /// `summary` header, or the tab-prefixed line when the header is missing
    pub summary: Option<String>,
}

impl CommitMetadata {
    pub fn short_hash(&self) -> String {
        self.hash.chars().take(SHORT_HASH_LEN).collect()
    }
}

pub fn parse_line_porcelain(output: &str) -> Result<ParsedBlame> {
    let mut lines = output.trim().lines();

    let first = lines
        .next()
        .filter(|line| !line.trim().is_empty())
        .ok_or_else(|| parse_error("Invalid git blame output format"))?;
    let hash = first
        .split_whitespace()
        .next()
        .filter(|hash| hash.len() >= SHORT_HASH_LEN)
        .ok_or_else(|| parse_error("Missing or truncated commit hash in git blame output"))?;

    if hash.starts_with(UNCOMMITTED_HASH_PREFIX) {
        return Ok(ParsedBlame::Uncommitted);
    }

    let mut metadata: HashMap<&str, &str> = HashMap::new();
    let mut tab_line: Option<&str> = None;
    for line in lines {
        if let Some(content) = line.strip_prefix('\t') {
            tab_line = Some(content);
        } else if let Some((key, value)) = line.split_once(' ') {
            metadata.insert(key, value);
        }
    }

    let author_time = metadata
        .get("author-time")
        .and_then(|value| value.trim().parse::<i64>().ok())
        .filter(|time| *time != 0)
        .ok_or_else(|| parse_error("Missing or invalid author-time in git blame output"))?;

    let author = metadata
        .get("author")
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| "Unknown".to_string());

    let author_email = metadata
        .get("author-mail")
        .map(|value| strip_angle_brackets(value.trim()).to_string())
        .unwrap_or_default();

    let summary = metadata
        .get("summary")
        .copied()
        .or(tab_line)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty());

    Ok(ParsedBlame::Committed(CommitMetadata {
        hash: hash.to_string(),
        author,
        author_email,
        author_time,
        summary,
    }))
}

fn strip_angle_brackets(value: &str) -> &str {
    value
        .strip_prefix('<')
        .and_then(|rest| rest.strip_suffix('>'))
        .unwrap_or(value)
}

fn parse_error(message: &str) -> BlameError {
    warn!(reason = message, "unparseable git blame output");
    BlameError::ParseError(message.to_string())
}
