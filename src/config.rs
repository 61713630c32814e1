//! Plugin settings read from the host's configuration store.
//!
//! The host hands over its configuration section as a JSON object. Keys are
//! camelCase; a few legacy spellings are accepted as aliases:
//! - `debounceDelay` → `delay`
//! - `maxSummary` → `summaryMaxLength`
//!
//! Numeric values are clamped into their valid range instead of rejected. A
//! section that does not deserialize at all falls back to the defaults.

use globset::{GlobBuilder, GlobMatcher};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::warn;

use crate::cache::DEFAULT_CACHE_SIZE;
use crate::git::runner::DEFAULT_GIT_TIMEOUT;

pub const DEFAULT_FORMAT: &str = "{author}, {timeAgo} • {summary}";

const DELAY_RANGE: (i64, i64) = (0, 2000);
const SUMMARY_RANGE: (i64, i64) = (10, 200);

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub enabled: bool,
    #[serde(alias = "debounceDelay")]
    pub delay: i64,
    pub format: String,
    #[serde(alias = "maxSummary")]
    pub summary_max_length: i64,
    pub show_only_when_changed: bool,
    pub show_current_user_as_you: bool,
    pub style: StyleSettings,
    pub include_files: Vec<String>,
    pub exclude_files: Vec<String>,
    pub status_bar: StatusBarSettings,
    pub cache_size: usize,
    pub git_timeout_ms: u64,
    #[serde(skip)]
    filter: FileFilter,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StyleSettings {
    pub color: String,
    pub font_style: String,
    pub font_size: String,
    pub margin: String,
    pub position: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StatusBarSettings {
    pub enabled: bool,
}

impl Default for Settings {
    fn default() -> Self {
        let include_files = vec!["**/*".to_string()];
        let exclude_files = Vec::new();
        let filter = FileFilter::new(&include_files, &exclude_files);
        Self {
            enabled: true,
            delay: 100,
            format: DEFAULT_FORMAT.to_string(),
            summary_max_length: 60,
            show_only_when_changed: true,
            show_current_user_as_you: true,
            style: StyleSettings::default(),
            include_files,
            exclude_files,
            status_bar: StatusBarSettings::default(),
            cache_size: DEFAULT_CACHE_SIZE,
            git_timeout_ms: DEFAULT_GIT_TIMEOUT.as_millis() as u64,
            filter,
        }
    }
}

impl Default for StyleSettings {
    fn default() -> Self {
        Self {
            color: "rgba(136, 136, 136, 0.7)".to_string(),
            font_style: "italic".to_string(),
            font_size: "0.9em".to_string(),
            margin: "0 0 0 1rem".to_string(),
            position: "end-of-line".to_string(),
        }
    }
}

impl Default for StatusBarSettings {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl Settings {
    /// Build settings from the host's configuration section.
    pub fn from_value(value: serde_json::Value) -> Self {
        let settings = match serde_json::from_value::<Settings>(value) {
            Ok(settings) => settings,
            Err(e) => {
                warn!(error = %e, "invalid inline blame configuration, using defaults");
                Settings::default()
            }
        };
        settings.normalized()
    }

    fn normalized(mut self) -> Self {
        self.delay = self.delay.clamp(DELAY_RANGE.0, DELAY_RANGE.1);
        self.summary_max_length = self.summary_max_length.clamp(SUMMARY_RANGE.0, SUMMARY_RANGE.1);
        self.cache_size = self.cache_size.max(1);
        self.git_timeout_ms = self.git_timeout_ms.max(1);
        self.filter = FileFilter::new(&self.include_files, &self.exclude_files);
        self
    }

    pub fn debounce_delay(&self) -> Duration {
        Duration::from_millis(self.delay as u64)
    }

    pub fn summary_max_length(&self) -> usize {
        self.summary_max_length as usize
    }

    pub fn git_timeout(&self) -> Duration {
        Duration::from_millis(self.git_timeout_ms)
    }

    /// Whether `file` passes the include/exclude filters.
    pub fn should_process_file(&self, file: &Path) -> bool {
        self.filter.allows(file)
    }
}

#[derive(Debug, Clone)]
enum FilePattern {
    Any,
    Substring(String),
    Glob(GlobMatcher),
}

impl FilePattern {
    fn compile(pattern: &str) -> Self {
        let pattern = to_posix(pattern);
        let pattern = pattern.strip_prefix("./").unwrap_or(pattern.as_str());
        if pattern == "**/*" || pattern == "*" {
            return FilePattern::Any;
        }
        if !pattern.contains('*') && !pattern.contains('?') {
            return FilePattern::Substring(pattern.to_string());
        }
        match GlobBuilder::new(pattern).literal_separator(true).build() {
            Ok(glob) => FilePattern::Glob(glob.compile_matcher()),
            Err(e) => {
                warn!(pattern, error = %e, "invalid file pattern, matching as substring");
                FilePattern::Substring(pattern.to_string())
            }
        }
    }

    fn matches(&self, path: &str) -> bool {
        match self {
            FilePattern::Any => true,
            FilePattern::Substring(needle) => path.contains(needle.as_str()),
            FilePattern::Glob(glob) => glob.is_match(path.trim_start_matches('/')),
        }
    }
}

#[derive(Debug, Clone, Default)]
struct FileFilter {
    include: Vec<FilePattern>,
    exclude: Vec<FilePattern>,
}

impl FileFilter {
    fn new(include: &[String], exclude: &[String]) -> Self {
        Self {
            include: include.iter().map(|p| FilePattern::compile(p)).collect(),
            exclude: exclude.iter().map(|p| FilePattern::compile(p)).collect(),
        }
    }

    fn allows(&self, file: &Path) -> bool {
        let path = to_posix(&file.to_string_lossy());
        self.include.iter().any(|p| p.matches(&path)) && !self.exclude.iter().any(|p| p.matches(&path))
    }
}

fn to_posix(path: &str) -> String {
    path.replace('\\', "/")
}
