//! Git process invocation and failure classification.
//!
//! `GitRunner` is the seam between the pipeline and the external `git`
//! binary. `ProcessRunner` spawns a real child process per call with a hard
//! timeout; tests substitute a scripted runner.
//!
//! Failures are folded into `BlameError` by `categorize_error`, which walks a
//! fixed, ordered rule table over the lowercased stderr text. First match wins.

use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::error::{BlameError, Result};

pub const GIT_BINARY: &str = "git";

/// Timeout for blame and log invocations.
pub const DEFAULT_GIT_TIMEOUT: Duration = Duration::from_millis(10_000);

/// Timeout for the small `git config` identity queries.
pub const CONFIG_TIMEOUT: Duration = Duration::from_millis(2_000);

/// One invocation of the git binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitCommand {
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub timeout: Duration,
}

impl GitCommand {
    pub fn new<I, S>(cwd: &Path, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            args: args.into_iter().map(Into::into).collect(),
            cwd: Some(cwd.to_path_buf()),
            timeout: DEFAULT_GIT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Space-joined argument vector, used in logs and test scripts.
    pub fn display_args(&self) -> String {
        self.args.join(" ")
    }
}

#[async_trait]
pub trait GitRunner: Send + Sync {
    /// Run git and return its stdout, or the classified failure.
    async fn run(&self, command: &GitCommand) -> Result<String>;
}

/// Runs the real git executable as a child process.
pub struct ProcessRunner {
    program: String,
}

impl ProcessRunner {
    pub fn new() -> Self {
        Self::with_program(GIT_BINARY)
    }

    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GitRunner for ProcessRunner {
    async fn run(&self, command: &GitCommand) -> Result<String> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(cwd) = &command.cwd {
            cmd.current_dir(cwd);
        }

        debug!(args = %command.display_args(), "spawning git");
        let child = cmd.spawn().map_err(|e| categorize_spawn_error(&e))?;

        // On timeout the output future is dropped, which drops the child and
        // kills it. The elapsed branch and the exit branch cannot both run.
        let output = match timeout(command.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return Err(categorize_error(&e.to_string(), Some(e.kind()))),
            Err(_) => {
                warn!(
                    args = %command.display_args(),
                    timeout_ms = command.timeout.as_millis() as u64,
                    "git timed out, child killed"
                );
                return Err(BlameError::Timeout(TIMEOUT_MESSAGE.to_string()));
            }
        };

        if output.status.success() {
            return Ok(String::from_utf8_lossy(&output.stdout).into_owned());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let text = if stderr.trim().is_empty() {
            format!("git exited with {}", output.status)
        } else {
            stderr.trim().to_string()
        };
        Err(categorize_error(&text, None))
    }
}

/// Probe for the git binary with `git --version`.
pub async fn check_git_availability(runner: &dyn GitRunner) -> bool {
    let command = GitCommand {
        args: vec!["--version".to_string()],
        cwd: None,
        timeout: CONFIG_TIMEOUT,
    };
    match runner.run(&command).await {
        Ok(version) => {
            debug!(version = %version.trim(), "git available");
            true
        }
        Err(e) => {
            warn!(error = %e, "git is not available");
            false
        }
    }
}

const TIMEOUT_MESSAGE: &str = "Git operation timed out";

struct ErrorRule {
    needles: &'static [&'static str],
    io_kind: Option<io::ErrorKind>,
    build: fn(String) -> BlameError,
    message: &'static str,
}

const ERROR_RULES: &[ErrorRule] = &[
    ErrorRule {
        needles: &["not a git repository"],
        io_kind: None,
        build: BlameError::NotGitRepo,
        message: "Directory is not a git repository",
    },
    ErrorRule {
        needles: &["no such file or directory", "does not exist", "pathspec"],
        io_kind: None,
        build: BlameError::FileNotFound,
        message: "File not found in git repository",
    },
    ErrorRule {
        needles: &["no such path", "is outside repository"],
        io_kind: None,
        build: BlameError::FileNotTracked,
        message: "File is not tracked by git",
    },
    ErrorRule {
        needles: &["permission denied", "access denied"],
        io_kind: None,
        build: BlameError::PermissionDenied,
        message: "Permission denied accessing git repository",
    },
    ErrorRule {
        needles: &["timeout", "timed out"],
        io_kind: Some(io::ErrorKind::TimedOut),
        build: BlameError::Timeout,
        message: TIMEOUT_MESSAGE,
    },
    ErrorRule {
        needles: &["command not found"],
        io_kind: Some(io::ErrorKind::NotFound),
        build: BlameError::GitNotFound,
        message: "Git command not found",
    },
];

/// Classify a failed invocation from its stderr/message text and, when the
/// failure came from the OS, its io error kind.
pub fn categorize_error(text: &str, io_kind: Option<io::ErrorKind>) -> BlameError {
    let lowered = text.to_lowercase();
    for rule in ERROR_RULES {
        let text_hit = rule.needles.iter().any(|needle| lowered.contains(needle));
        let kind_hit = rule.io_kind.is_some() && rule.io_kind == io_kind;
        if text_hit || kind_hit {
            return (rule.build)(rule.message.to_string());
        }
    }
    let raw = if text.trim().is_empty() { "Unknown error" } else { text.trim() };
    BlameError::Unknown(format!("Git error: {}", raw))
}

// A spawn failure is about the executable itself, not the file being blamed,
// so the OS text ("No such file or directory") must not reach the text rules.
fn categorize_spawn_error(err: &io::Error) -> BlameError {
    match err.kind() {
        io::ErrorKind::NotFound => BlameError::GitNotFound("Git command not found".to_string()),
        io::ErrorKind::PermissionDenied => {
            BlameError::PermissionDenied("Permission denied executing git".to_string())
        }
        _ => BlameError::ExecutionError(format!("Failed to execute git: {}", err)),
    }
}
