//! Mapping from blame results to inline text and status bar content.
//!
//! Everything here is pure; the caller applies the returned `Rendering`
//! through the host collaborators.

use regex::{Captures, Regex};
use std::sync::OnceLock;

use crate::config::Settings;
use crate::error::BlameError;
use crate::host::StatusSeverity;
use crate::models::{BlameRecord, FileCommit};

const MINUTE: i64 = 60;
const HOUR: i64 = 60 * MINUTE;
const DAY: i64 = 24 * HOUR;
const YEAR: i64 = 365 * DAY;

const DIRTY_NOTE: &str = "\n\nNote: File has unsaved changes";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
    pub text: String,
    pub tooltip: String,
    pub severity: StatusSeverity,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusAction {
    Keep,
    Clear,
    Set(StatusUpdate),
}

/// What to show for one resolved request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendering {
    /// Inline text to place at the end of the line; `None` clears it.
    pub inline_text: Option<String>,
    pub status: StatusAction,
}

/// Values substituted into the annotation template.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormatData {
    pub author: String,
    pub time_ago: String,
    pub summary: String,
    pub hash: String,
    pub pr_number: Option<String>,
}

/// Coarse "N units ago" relative to `now`, both in Unix seconds.
pub fn relative_time(timestamp: i64, now: i64) -> String {
    let diff = now - timestamp;

    if diff >= YEAR {
        plural(diff / YEAR, "year")
    } else if diff >= DAY {
        plural(diff / DAY, "day")
    } else if diff >= HOUR {
        plural(diff / HOUR, "hour")
    } else if diff >= MINUTE {
        plural(diff / MINUTE, "min")
    } else {
        "just now".to_string()
    }
}

fn plural(count: i64, unit: &str) -> String {
    format!("{} {}{} ago", count, unit, if count == 1 { "" } else { "s" })
}

/// Cut `summary` to at most `max` characters, the last being an ellipsis.
pub fn trim_summary(summary: &str, max: usize) -> String {
    if summary.chars().count() <= max {
        return summary.to_string();
    }
    let mut trimmed: String = summary.chars().take(max.saturating_sub(1)).collect();
    trimmed.push('…');
    trimmed
}

fn placeholder() -> &'static Regex {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER.get_or_init(|| {
        Regex::new(r"\{(author|timeAgo|summary|hash|prNumber|pr)\}").expect("valid regex")
    })
}

/// Fill the annotation template in one pass; substituted values are never
/// scanned for placeholders again.
pub fn format_blame_text(template: &str, data: &FormatData) -> String {
    let or = |value: &str, fallback: &str| -> String {
        if value.is_empty() { fallback.to_string() } else { value.to_string() }
    };
    let pr_number = data.pr_number.as_deref().unwrap_or("");

    placeholder()
        .replace_all(template, |caps: &Captures| match &caps[1] {
            "author" => or(&data.author, "Unknown"),
            "timeAgo" => or(&data.time_ago, "unknown time"),
            "summary" => or(&data.summary, "No message"),
            "hash" => data.hash.clone(),
            "prNumber" => pr_number.to_string(),
            _ if pr_number.is_empty() => String::new(),
            _ => format!(" via PR #{}", pr_number),
        })
        .into_owned()
}

pub fn present_record(record: &BlameRecord, settings: &Settings, now: i64) -> Rendering {
    let text = if record.is_uncommitted {
        record.summary.clone()
    } else {
        let data = FormatData {
            author: record.author.clone(),
            time_ago: relative_time(record.time, now),
            summary: trim_summary(&record.summary, settings.summary_max_length()),
            hash: record.hash.clone(),
            pr_number: record.pr_number.clone(),
        };
        format_blame_text(&settings.format, &data)
    };

    Rendering {
        inline_text: Some(format!(" {}", text)),
        status: StatusAction::Keep,
    }
}

/// Expected failures clear silently; actionable ones explain themselves in
/// the status bar.
pub fn present_error(error: &BlameError, is_dirty: bool) -> Rendering {
    if !error.is_actionable() {
        return Rendering {
            inline_text: None,
            status: StatusAction::Clear,
        };
    }

    let dirty = if is_dirty { DIRTY_NOTE } else { "" };
    let update = match error {
        BlameError::Timeout(_) => StatusUpdate {
            text: "Git operation timed out".to_string(),
            tooltip: format!(
                "Git blame operation took too long to complete. This may happen with very large files or repositories.{}",
                dirty
            ),
            severity: StatusSeverity::Warning,
        },
        BlameError::PermissionDenied(_) => StatusUpdate {
            text: "Permission denied".to_string(),
            tooltip: format!(
                "Cannot access git repository. Check file permissions and git configuration.{}",
                dirty
            ),
            severity: StatusSeverity::Error,
        },
        other => StatusUpdate {
            text: "Git blame failed".to_string(),
            tooltip: format!("Failed to get git blame information: {}{}", other.message(), dirty),
            severity: StatusSeverity::Error,
        },
    };

    Rendering {
        inline_text: None,
        status: StatusAction::Set(update),
    }
}

/// Status bar text for the active file's most recent commit.
pub fn present_file_commit(commit: &FileCommit, now: i64) -> StatusUpdate {
    StatusUpdate {
        text: format!("{} ({})", commit.author, relative_time(commit.time, now)),
        tooltip: format!("Last modified by {}", commit.author),
        severity: StatusSeverity::Info,
    }
}

/// One-line description of the cursor line for the "show details" command.
pub fn details_message(line: u32, record: &BlameRecord, settings: &Settings, now: i64) -> String {
    if record.is_uncommitted {
        return format!("Line {}: {}", line, record.summary);
    }
    let summary = trim_summary(&record.summary, settings.summary_max_length());
    let mut message = format!(
        "Line {}: {}, {} • {} ({})",
        line,
        record.author,
        relative_time(record.time, now),
        summary,
        record.hash
    );
    if let Some(pr) = &record.pr_number {
        message.push_str(&format!(" via PR #{}", pr));
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const NOW: i64 = 1_700_000_000;

    #[test]
    fn relative_time_boundaries() {
        assert_eq!(relative_time(NOW, NOW), "just now");
        assert_eq!(relative_time(NOW - 59, NOW), "just now");
        assert_eq!(relative_time(NOW - 60, NOW), "1 min ago");
        assert_eq!(relative_time(NOW - 119, NOW), "1 min ago");
        assert_eq!(relative_time(NOW - 120, NOW), "2 mins ago");
        assert_eq!(relative_time(NOW - 3600, NOW), "1 hour ago");
        assert_eq!(relative_time(NOW - 7200, NOW), "2 hours ago");
        assert_eq!(relative_time(NOW - 86_400, NOW), "1 day ago");
        assert_eq!(relative_time(NOW - 40 * 86_400, NOW), "40 days ago");
        assert_eq!(relative_time(NOW - 31_536_000, NOW), "1 year ago");
        assert_eq!(relative_time(NOW - 3 * 31_536_000, NOW), "3 years ago");
    }

    #[test]
    fn future_timestamps_are_just_now() {
        assert_eq!(relative_time(NOW + 500, NOW), "just now");
    }

    #[test]
    fn trim_summary_never_exceeds_max() {
        let trimmed = trim_summary("abcdefghijklmno", 10);
        assert_eq!(trimmed, "abcdefghi…");
        assert_eq!(trimmed.chars().count(), 10);
        assert_eq!(trim_summary("abcdefghij", 10), "abcdefghij");
    }

    #[test]
    fn trim_summary_counts_characters_not_bytes() {
        assert_eq!(trim_summary("ééééééééééé", 10), "ééééééééé…");
    }

    #[test]
    fn template_substitution_with_fallbacks() {
        let data = FormatData {
            author: "You".into(),
            time_ago: "2 days ago".into(),
            summary: "Fix bug".into(),
            hash: "1a2b3c4d".into(),
            pr_number: Some("42".into()),
        };
        assert_eq!(
            format_blame_text("{author}, {timeAgo} • {summary}{pr} [{hash}] #{prNumber}", &data),
            "You, 2 days ago • Fix bug via PR #42 [1a2b3c4d] #42"
        );
        assert_eq!(
            format_blame_text("{author} {timeAgo} {summary}{pr}", &FormatData::default()),
            "Unknown unknown time No message"
        );
    }

    #[test]
    fn placeholders_inside_values_are_left_alone() {
        let data = FormatData {
            author: "{author}".into(),
            time_ago: "just now".into(),
            summary: "Document the {hash} placeholder{pr}".into(),
            hash: "1a2b3c4d".into(),
            pr_number: Some("7".into()),
        };
        assert_eq!(
            format_blame_text("{author} {summary} {timeAgo}", &data),
            "{author} Document the {hash} placeholder{pr} just now"
        );
        assert_eq!(format_blame_text("{unknown} {hash}", &data), "{unknown} 1a2b3c4d");
    }

    #[test]
    fn committed_record_renders_template() {
        let settings = Settings::default();
        let record = BlameRecord {
            author: "Grace".into(),
            author_email: Some("grace@example.com".into()),
            time: NOW - 3 * 86_400,
            summary: "Teach the compiler about loops".into(),
            hash: "3f2a9c1d".into(),
            pr_number: None,
            is_uncommitted: false,
        };
        assert_eq!(
            present_record(&record, &settings, NOW),
            Rendering {
                inline_text: Some(" Grace, 3 days ago • Teach the compiler about loops".into()),
                status: StatusAction::Keep,
            }
        );
    }

    #[test]
    fn uncommitted_record_renders_summary_only() {
        let rendering = present_record(&BlameRecord::uncommitted(NOW), &Settings::default(), NOW);
        assert_eq!(rendering.inline_text.as_deref(), Some(" Not committed yet"));
    }

    #[test]
    fn expected_errors_clear_silently() {
        let rendering = present_error(&BlameError::NotGitRepo("x".into()), true);
        assert_eq!(
            rendering,
            Rendering {
                inline_text: None,
                status: StatusAction::Clear
            }
        );
    }

    #[test]
    fn timeout_is_a_warning_with_dirty_note() {
        let rendering = present_error(&BlameError::Timeout("x".into()), true);
        let StatusAction::Set(update) = rendering.status else {
            panic!("expected status update");
        };
        assert_eq!(update.text, "Git operation timed out");
        assert_eq!(update.severity, StatusSeverity::Warning);
        assert!(update.tooltip.ends_with("Note: File has unsaved changes"));
    }

    #[test]
    fn unknown_errors_carry_their_message() {
        let rendering = present_error(&BlameError::Unknown("Git error: boom".into()), false);
        let StatusAction::Set(update) = rendering.status else {
            panic!("expected status update");
        };
        assert_eq!(update.text, "Git blame failed");
        assert_eq!(update.severity, StatusSeverity::Error);
        assert_eq!(update.tooltip, "Failed to get git blame information: Git error: boom");
    }

    #[test]
    fn file_commit_status_text() {
        let commit = FileCommit {
            hash: "01234567".into(),
            author: "You".into(),
            author_email: "me@example.com".into(),
            time: NOW - 7200,
        };
        let update = present_file_commit(&commit, NOW);
        assert_eq!(update.text, "You (2 hours ago)");
        assert_eq!(update.tooltip, "Last modified by You");
    }

    #[test]
    fn details_message_for_committed_and_uncommitted() {
        let settings = Settings::default();
        let record = BlameRecord {
            author: "Grace".into(),
            author_email: None,
            time: NOW - 60,
            summary: "Fix bug".into(),
            hash: "3f2a9c1d".into(),
            pr_number: Some("42".into()),
            is_uncommitted: false,
        };
        assert_eq!(
            details_message(12, &record, &settings, NOW),
            "Line 12: Grace, 1 min ago • Fix bug (3f2a9c1d) via PR #42"
        );
        assert_eq!(
            details_message(3, &BlameRecord::uncommitted(NOW), &settings, NOW),
            "Line 3: Not committed yet"
        );
    }
}
