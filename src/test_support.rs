//! Test doubles: a git runner that answers from a script instead of spawning
//! git, and a host that records every call made into it.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::config::StyleSettings;
use crate::error::{BlameError, Result};
use crate::git::runner::{GitCommand, GitRunner};
use crate::host::{
    AnnotationRenderer, ConfigSource, DocumentPosition, DocumentSnapshot, Host, StatusReporter,
    StatusSeverity, Workspace,
};

#[derive(Clone)]
struct Script {
    result: Result<String>,
    delay: Duration,
}

/// Answers git invocations keyed by their space-joined argument vector and
/// records every call. Unscripted invocations fail with `ExecutionError`.
#[derive(Default)]
pub(crate) struct ScriptedRunner {
    scripts: Mutex<HashMap<String, Script>>,
    calls: Mutex<Vec<String>>,
    timeouts: Mutex<HashMap<String, Duration>>,
}

impl ScriptedRunner {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn respond(self, args: &str, stdout: &str) -> Self {
        self.script(args, Ok(stdout.to_string()), Duration::ZERO);
        self
    }

    pub(crate) fn respond_after(self, args: &str, stdout: &str, delay: Duration) -> Self {
        self.script(args, Ok(stdout.to_string()), delay);
        self
    }

    pub(crate) fn fail(self, args: &str, error: BlameError) -> Self {
        self.script(args, Err(error), Duration::ZERO);
        self
    }

    /// Replace or add a script after construction.
    pub(crate) fn script(&self, args: &str, result: Result<String>, delay: Duration) {
        self.scripts
            .lock()
            .unwrap()
            .insert(args.to_string(), Script { result, delay });
    }

    pub(crate) fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Timeout the most recent call with exactly `args` was given.
    pub(crate) fn timeout_of(&self, args: &str) -> Option<Duration> {
        self.timeouts.lock().unwrap().get(args).copied()
    }

    /// Number of recorded calls whose arguments start with `prefix`.
    pub(crate) fn calls_starting_with(&self, prefix: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|args| args.starts_with(prefix))
            .count()
    }
}

#[async_trait]
impl GitRunner for ScriptedRunner {
    async fn run(&self, command: &GitCommand) -> Result<String> {
        let args = command.display_args();
        self.calls.lock().unwrap().push(args.clone());
        self.timeouts.lock().unwrap().insert(args.clone(), command.timeout);
        let script = self.scripts.lock().unwrap().get(&args).cloned();
        match script {
            Some(script) => {
                if !script.delay.is_zero() {
                    tokio::time::sleep(script.delay).await;
                }
                script.result
            }
            None => Err(BlameError::ExecutionError(format!("no script for `git {}`", args))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum HostCall {
    Render { file: PathBuf, line: u32, text: String },
    Clear { file: PathBuf },
    Status { text: String, tooltip: String, severity: StatusSeverity },
    ClearStatus,
    Notify(String),
}

/// Host that records every call and serves a settable configuration and
/// active document.
#[derive(Default)]
pub(crate) struct RecordingHost {
    calls: Mutex<Vec<HostCall>>,
    config: Mutex<serde_json::Value>,
    active: Mutex<Option<DocumentSnapshot>>,
}

impl RecordingHost {
    pub(crate) fn new() -> Arc<Self> {
        let host = Self::default();
        *host.config.lock().unwrap() = serde_json::json!({});
        Arc::new(host)
    }

    pub(crate) fn host(self: &Arc<Self>) -> Host {
        Host {
            renderer: self.clone(),
            status: self.clone(),
            config: self.clone(),
            workspace: self.clone(),
        }
    }

    pub(crate) fn set_config(&self, value: serde_json::Value) {
        *self.config.lock().unwrap() = value;
    }

    pub(crate) fn set_active(&self, doc: Option<DocumentSnapshot>) {
        *self.active.lock().unwrap() = doc;
    }

    pub(crate) fn calls(&self) -> Vec<HostCall> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn take_calls(&self) -> Vec<HostCall> {
        std::mem::take(&mut *self.calls.lock().unwrap())
    }

    /// Inline texts rendered so far, in order.
    pub(crate) fn rendered(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                HostCall::Render { text, .. } => Some(text),
                _ => None,
            })
            .collect()
    }

    /// Most recent status text, if any status was set.
    pub(crate) fn last_status(&self) -> Option<(String, StatusSeverity)> {
        self.calls().into_iter().rev().find_map(|call| match call {
            HostCall::Status { text, severity, .. } => Some((text, severity)),
            _ => None,
        })
    }

    fn record(&self, call: HostCall) {
        self.calls.lock().unwrap().push(call);
    }
}

impl AnnotationRenderer for RecordingHost {
    fn render_inline_annotation(
        &self,
        file: &Path,
        position: DocumentPosition,
        text: &str,
        _style: &StyleSettings,
    ) {
        self.record(HostCall::Render {
            file: file.to_path_buf(),
            line: position.line,
            text: text.to_string(),
        });
    }

    fn clear_annotations(&self, file: &Path) {
        self.record(HostCall::Clear {
            file: file.to_path_buf(),
        });
    }
}

impl StatusReporter for RecordingHost {
    fn set_status(&self, text: &str, tooltip: &str, severity: StatusSeverity) {
        self.record(HostCall::Status {
            text: text.to_string(),
            tooltip: tooltip.to_string(),
            severity,
        });
    }

    fn clear_status(&self) {
        self.record(HostCall::ClearStatus);
    }

    fn notify(&self, message: &str) {
        self.record(HostCall::Notify(message.to_string()));
    }
}

impl ConfigSource for RecordingHost {
    fn snapshot(&self) -> serde_json::Value {
        self.config.lock().unwrap().clone()
    }
}

impl Workspace for RecordingHost {
    fn active_document(&self) -> Option<DocumentSnapshot> {
        self.active.lock().unwrap().clone()
    }
}

/// Snapshot of a saved document in editor 1.
pub(crate) fn document(file: &str, line: u32, version: i64, text: &str) -> DocumentSnapshot {
    DocumentSnapshot {
        editor: 1,
        file: PathBuf::from(file),
        line,
        version,
        line_text: text.to_string(),
        line_count: 100,
        is_dirty: false,
        is_untitled: false,
    }
}

/// `--line-porcelain` output for a single committed line.
pub(crate) fn porcelain(hash: &str, author: &str, email: &str, time: i64, summary: &str) -> String {
    format!(
        "{hash} 5 5 1\nauthor {author}\nauthor-mail <{email}>\nauthor-time {time}\nauthor-tz +0000\n\
         committer {author}\ncommitter-mail <{email}>\ncommitter-time {time}\ncommitter-tz +0000\n\
         summary {summary}\nfilename src/lib.rs\n\tlet answer = 42;\n"
    )
}
