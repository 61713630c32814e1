//! Editor events and their debouncing.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::config::Settings;
use crate::host::DocumentSnapshot;

pub const SAVE_DEBOUNCE: Duration = Duration::from_millis(50);
pub const CHANGE_DEBOUNCE: Duration = Duration::from_millis(300);

/// Notifications the host forwards to the plugin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditorEvent {
    /// Focus moved to another editor, or to none
    ActiveEditorChanged(Option<DocumentSnapshot>),
    SelectionChanged(DocumentSnapshot),
    DocumentSaved(DocumentSnapshot),
    /// Content of the active document was edited
    DocumentChanged(DocumentSnapshot),
    WorkspaceFoldersChanged,
    ConfigurationChanged,
}

/// Debounced event kinds. Each kind has its own pending slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Trigger {
    Selection,
    Save,
    Change,
}

impl Trigger {
    pub fn delay(self, settings: &Settings) -> Duration {
        match self {
            Trigger::Selection => settings.debounce_delay(),
            Trigger::Save => SAVE_DEBOUNCE,
            Trigger::Change => CHANGE_DEBOUNCE,
        }
    }
}

/// Runs a job once its trigger has been quiet for the given delay. Scheduling
/// again for the same trigger cancels the job still waiting.
#[derive(Default)]
pub struct Debouncer {
    pending: Mutex<HashMap<Trigger, CancellationToken>>,
}

impl Debouncer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule<F>(&self, trigger: Trigger, delay: Duration, job: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let token = CancellationToken::new();
        if let Some(previous) = self.lock().insert(trigger, token.clone()) {
            trace!(?trigger, "superseding pending job");
            previous.cancel();
        }

        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(delay) => job.await,
            }
        })
    }

    /// Cancel every job still waiting out its delay.
    pub fn cancel_all(&self) {
        for (_, token) in self.lock().drain() {
            token.cancel();
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Trigger, CancellationToken>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
