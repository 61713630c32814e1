//! Inline git blame for editors.
//!
//! The host forwards editor events to an [`InlineBlame`] instance; the
//! [`BlameOrchestrator`] runs `git blame` for the cursor line, enriches the
//! result with the local identity and pull request provenance, and draws it
//! through the host's [`host::AnnotationRenderer`] and
//! [`host::StatusReporter`].

pub mod cache;
pub mod config;
pub mod error;
pub mod events;
pub mod git;
pub mod host;
pub mod models;
pub mod orchestrator;
pub mod plugin;
pub mod presentation;

#[cfg(test)]
mod test_support;

pub use config::Settings;
pub use error::{BlameError, BlameErrorKind, Result};
pub use events::EditorEvent;
pub use models::{BlameRecord, PrInfo};
pub use orchestrator::{BlameOrchestrator, Stage};
pub use plugin::InlineBlame;
