//! Blame pipeline error types.
//!
//! Defines `BlameError`, the closed set of failures a blame lookup can end in.
//! Every stage converts its failure into one of these variants; nothing is
//! allowed to escape as a panic into the host.
//!
//! Error classes:
//! - `NotGitRepo`, `FileNotTracked`, `NoOutput` → expected, cleared silently
//! - `Timeout` → warning status
//! - `PermissionDenied`, `GitNotFound`, `ParseError`, `ExecutionError`, `Unknown` → error status

use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BlameError {
    #[error("{0}")]
    NotGitRepo(String),

    #[error("{0}")]
    FileNotFound(String),

    #[error("{0}")]
    FileNotTracked(String),

    #[error("{0}")]
    PermissionDenied(String),

    #[error("{0}")]
    Timeout(String),

    #[error("{0}")]
    GitNotFound(String),

    #[error("{0}")]
    ParseError(String),

    #[error("{0}")]
    NoOutput(String),

    #[error("{0}")]
    ExecutionError(String),

    #[error("{0}")]
    Unknown(String),
}

/// Tag of a `BlameError`, without the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BlameErrorKind {
    NotGitRepo,
    FileNotFound,
    FileNotTracked,
    PermissionDenied,
    Timeout,
    GitNotFound,
    ParseError,
    NoOutput,
    ExecutionError,
    Unknown,
}

impl BlameError {
    pub fn kind(&self) -> BlameErrorKind {
        match self {
            BlameError::NotGitRepo(_) => BlameErrorKind::NotGitRepo,
            BlameError::FileNotFound(_) => BlameErrorKind::FileNotFound,
            BlameError::FileNotTracked(_) => BlameErrorKind::FileNotTracked,
            BlameError::PermissionDenied(_) => BlameErrorKind::PermissionDenied,
            BlameError::Timeout(_) => BlameErrorKind::Timeout,
            BlameError::GitNotFound(_) => BlameErrorKind::GitNotFound,
            BlameError::ParseError(_) => BlameErrorKind::ParseError,
            BlameError::NoOutput(_) => BlameErrorKind::NoOutput,
            BlameError::ExecutionError(_) => BlameErrorKind::ExecutionError,
            BlameError::Unknown(_) => BlameErrorKind::Unknown,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            BlameError::NotGitRepo(msg)
            | BlameError::FileNotFound(msg)
            | BlameError::FileNotTracked(msg)
            | BlameError::PermissionDenied(msg)
            | BlameError::Timeout(msg)
            | BlameError::GitNotFound(msg)
            | BlameError::ParseError(msg)
            | BlameError::NoOutput(msg)
            | BlameError::ExecutionError(msg)
            | BlameError::Unknown(msg) => msg,
        }
    }

    /// Whether the user can do something about this failure.
    ///
    /// Non-actionable errors clear the annotation without any status text.
    pub fn is_actionable(&self) -> bool {
        !matches!(
            self,
            BlameError::NotGitRepo(_) | BlameError::FileNotTracked(_) | BlameError::NoOutput(_)
        )
    }
}

impl Serialize for BlameError {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;
        let mut state = serializer.serialize_struct("BlameError", 2)?;
        state.serialize_field("type", &self.kind())?;
        state.serialize_field("message", self.message())?;
        state.end()
    }
}

pub type Result<T> = std::result::Result<T, BlameError>;
