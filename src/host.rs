//! Seams to the editor host.
//!
//! The plugin never draws anything itself. It calls these collaborators to
//! place inline text, set the status bar and read configuration, and asks the
//! host for a snapshot of the active document when it needs to refresh.

use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::StyleSettings;

/// Host-assigned identity of an editor view.
pub type EditorId = u64;

/// What the core needs to know about the cursor line of an editor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentSnapshot {
    pub editor: EditorId,
    /// Absolute path of the document
    pub file: PathBuf,
    /// Cursor line, 1-based
    pub line: u32,
    /// Bumped by the host on every edit
    pub version: i64,
    /// Text of the cursor line
    pub line_text: String,
    pub line_count: u32,
    pub is_dirty: bool,
    pub is_untitled: bool,
}

/// Where inline text goes: the end of a 1-based line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocumentPosition {
    pub line: u32,
    pub column: u32,
}

impl DocumentPosition {
    pub fn end_of_line(line: u32, line_text: &str) -> Self {
        Self {
            line,
            column: line_text.chars().count() as u32,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusSeverity {
    Info,
    Warning,
    Error,
}

pub trait AnnotationRenderer: Send + Sync {
    fn render_inline_annotation(
        &self,
        file: &Path,
        position: DocumentPosition,
        text: &str,
        style: &StyleSettings,
    );

    fn clear_annotations(&self, file: &Path);
}

pub trait StatusReporter: Send + Sync {
    fn set_status(&self, text: &str, tooltip: &str, severity: StatusSeverity);

    fn clear_status(&self);

    /// Non-modal one-off message.
    fn notify(&self, message: &str);
}

pub trait ConfigSource: Send + Sync {
    /// Current configuration section as a JSON object.
    fn snapshot(&self) -> serde_json::Value;
}

pub trait Workspace: Send + Sync {
    /// Cursor line of the active editor, if any.
    fn active_document(&self) -> Option<DocumentSnapshot>;
}

/// Bundle of host collaborators handed to the plugin on activation.
#[derive(Clone)]
pub struct Host {
    pub renderer: Arc<dyn AnnotationRenderer>,
    pub status: Arc<dyn StatusReporter>,
    pub config: Arc<dyn ConfigSource>,
    pub workspace: Arc<dyn Workspace>,
}
