//! Plugin lifecycle: activation, event routing and the user commands.

use std::sync::Arc;
use tracing::{debug, info};

use crate::config::Settings;
use crate::events::{Debouncer, EditorEvent, Trigger};
use crate::git::runner::GitRunner;
use crate::host::{DocumentSnapshot, Host};
use crate::orchestrator::BlameOrchestrator;

pub const GIT_NOT_FOUND_NOTICE: &str = "Git not found in PATH. Inline blame will be disabled.";

struct Inner {
    host: Host,
    orchestrator: BlameOrchestrator,
    debouncer: Debouncer,
}

/// An activated inline blame instance. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct InlineBlame {
    inner: Arc<Inner>,
}

impl InlineBlame {
    /// Read settings, check for git once and render the active editor.
    /// Without git a single notice is shown and every later event is ignored.
    pub async fn activate(runner: Arc<dyn GitRunner>, host: Host) -> Self {
        let settings = Settings::from_value(host.config.snapshot());
        let orchestrator = BlameOrchestrator::new(runner, &host, settings);
        if orchestrator.probe_git().await {
            info!("inline blame activated");
        } else {
            host.status.notify(GIT_NOT_FOUND_NOTICE);
        }

        let plugin = Self {
            inner: Arc::new(Inner {
                host,
                orchestrator,
                debouncer: Debouncer::new(),
            }),
        };
        plugin.refresh().await;
        plugin
    }

    pub fn orchestrator(&self) -> &BlameOrchestrator {
        &self.inner.orchestrator
    }

    pub async fn handle_event(&self, event: EditorEvent) {
        let orchestrator = &self.inner.orchestrator;
        if !orchestrator.is_git_available() {
            return;
        }
        match event {
            EditorEvent::ActiveEditorChanged(Some(doc)) => {
                orchestrator.update(&doc).await;
            }
            EditorEvent::ActiveEditorChanged(None) => orchestrator.clear_all(),
            EditorEvent::SelectionChanged(doc) => self.debounce(Trigger::Selection, doc),
            EditorEvent::DocumentSaved(doc) => {
                orchestrator.forget_results();
                self.debounce(Trigger::Save, doc);
            }
            EditorEvent::DocumentChanged(doc) => {
                orchestrator.clear_editor(doc.editor);
                self.debounce(Trigger::Change, doc);
            }
            EditorEvent::WorkspaceFoldersChanged => orchestrator.clear_caches(),
            EditorEvent::ConfigurationChanged => self.reload_settings().await,
        }
    }

    /// Re-read configuration, resize and clear caches, then re-render.
    pub async fn reload_settings(&self) {
        let settings = Settings::from_value(self.inner.host.config.snapshot());
        let enabled = settings.enabled;
        let orchestrator = &self.inner.orchestrator;
        orchestrator.apply_settings(settings);
        orchestrator.clear_caches();
        if enabled {
            self.refresh().await;
        } else {
            orchestrator.clear_all();
        }
    }

    /// Blame the active editor's cursor line, if any.
    pub async fn refresh(&self) {
        if let Some(doc) = self.inner.host.workspace.active_document() {
            self.inner.orchestrator.update(&doc).await;
        }
    }

    /// Flip `enabled`. Returns the new state.
    pub async fn toggle(&self) -> bool {
        let enabled = !self.inner.orchestrator.settings().enabled;
        self.set_enabled(enabled).await;
        enabled
    }

    pub async fn enable(&self) {
        self.set_enabled(true).await;
    }

    pub async fn disable(&self) {
        self.set_enabled(false).await;
    }

    async fn set_enabled(&self, enabled: bool) {
        let orchestrator = &self.inner.orchestrator;
        let mut settings = (*orchestrator.settings()).clone();
        settings.enabled = enabled;
        orchestrator.apply_settings(settings);
        info!(enabled, "inline blame toggled");
        if enabled {
            self.refresh().await;
        } else {
            self.inner.debouncer.cancel_all();
            orchestrator.clear_all();
        }
    }

    /// One-line description of the cursor line, for the "show details"
    /// command.
    pub async fn show_current_line(&self, doc: &DocumentSnapshot) -> String {
        self.inner.orchestrator.describe_line(doc).await
    }

    /// Cancel pending work and remove everything drawn.
    pub fn deactivate(&self) {
        self.inner.debouncer.cancel_all();
        self.inner.orchestrator.clear_all();
        info!("inline blame deactivated");
    }

    fn debounce(&self, trigger: Trigger, doc: DocumentSnapshot) {
        let delay = trigger.delay(&self.inner.orchestrator.settings());
        debug!(?trigger, delay_ms = delay.as_millis() as u64, "debouncing refresh");
        let inner = self.inner.clone();
        self.inner.debouncer.schedule(trigger, delay, async move {
            inner.orchestrator.update(&doc).await;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{HostCall, RecordingHost, ScriptedRunner, document, porcelain};
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;
    use std::time::Duration;
    use tempfile::TempDir;

    const HASH: &str = "3f2a9c1d5e6f7a8b";

    struct Fixture {
        _dir: TempDir,
        file: PathBuf,
        runner: Arc<ScriptedRunner>,
        host: Arc<RecordingHost>,
    }

    impl Fixture {
        fn new(runner: ScriptedRunner) -> Self {
            let dir = tempfile::tempdir().unwrap();
            std::fs::create_dir(dir.path().join(".git")).unwrap();
            let file = dir.path().join("src/lib.rs");
            let host = RecordingHost::new();
            host.set_config(serde_json::json!({ "format": "{summary}" }));
            Self {
                _dir: dir,
                file,
                runner: Arc::new(runner),
                host,
            }
        }

        fn doc(&self, line: u32, version: i64) -> DocumentSnapshot {
            document(self.file.to_str().unwrap(), line, version, "let answer = 42;")
        }

        async fn activate(&self) -> InlineBlame {
            InlineBlame::activate(self.runner.clone(), self.host.host()).await
        }
    }

    fn with_git(runner: ScriptedRunner) -> ScriptedRunner {
        runner
            .respond("--version", "git version 2.43.0\n")
            .respond(
                "blame -L 5,5 --line-porcelain -- src/lib.rs",
                &porcelain(HASH, "Ada", "ada@example.com", 1_600_000_000, "Line five"),
            )
            .respond(
                "blame -L 9,9 --line-porcelain -- src/lib.rs",
                &porcelain(HASH, "Ada", "ada@example.com", 1_600_000_000, "Line nine"),
            )
    }

    #[tokio::test]
    async fn missing_git_notifies_once_and_ignores_events() {
        let fx = Fixture::new(ScriptedRunner::new());
        fx.host.set_active(Some(fx.doc(5, 1)));

        let plugin = fx.activate().await;
        plugin.handle_event(EditorEvent::ActiveEditorChanged(Some(fx.doc(5, 1)))).await;
        plugin.handle_event(EditorEvent::ConfigurationChanged).await;

        assert_eq!(fx.host.calls(), vec![HostCall::Notify(GIT_NOT_FOUND_NOTICE.to_string())]);
        assert_eq!(fx.runner.call_count(), 1);
    }

    #[tokio::test]
    async fn activation_renders_active_editor() {
        let fx = Fixture::new(with_git(ScriptedRunner::new()));
        fx.host.set_active(Some(fx.doc(5, 1)));

        fx.activate().await;

        assert_eq!(fx.host.rendered(), vec![" Line five"]);
    }

    #[tokio::test(start_paused = true)]
    async fn selection_burst_blames_final_line_only() {
        let fx = Fixture::new(with_git(ScriptedRunner::new()));
        let plugin = fx.activate().await;

        plugin.handle_event(EditorEvent::SelectionChanged(fx.doc(5, 1))).await;
        plugin.handle_event(EditorEvent::SelectionChanged(fx.doc(9, 1))).await;
        tokio::time::sleep(Duration::from_millis(500)).await;

        assert_eq!(fx.runner.calls_starting_with("blame"), 1);
        assert_eq!(fx.host.rendered(), vec![" Line nine"]);
    }

    #[tokio::test(start_paused = true)]
    async fn content_change_clears_then_refreshes() {
        let fx = Fixture::new(with_git(ScriptedRunner::new()));
        fx.host.set_active(Some(fx.doc(5, 1)));
        let plugin = fx.activate().await;
        fx.host.take_calls();

        plugin.handle_event(EditorEvent::DocumentChanged(fx.doc(5, 2))).await;
        assert_eq!(fx.host.calls(), vec![HostCall::Clear { file: fx.file.clone() }]);

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(fx.host.rendered(), vec![" Line five"]);
        assert_eq!(fx.runner.calls_starting_with("blame"), 2);
    }

    #[tokio::test]
    async fn toggle_clears_and_restores() {
        let fx = Fixture::new(with_git(ScriptedRunner::new()));
        fx.host.set_active(Some(fx.doc(5, 1)));
        let plugin = fx.activate().await;
        fx.host.take_calls();

        assert!(!plugin.toggle().await);
        assert!(fx.host.calls().contains(&HostCall::Clear { file: fx.file.clone() }));
        plugin.handle_event(EditorEvent::ActiveEditorChanged(Some(fx.doc(9, 1)))).await;
        assert!(fx.host.rendered().is_empty());

        assert!(plugin.toggle().await);
        assert_eq!(fx.host.rendered(), vec![" Line five"]);
    }

    #[tokio::test]
    async fn configuration_change_reloads_and_rerenders() {
        let fx = Fixture::new(with_git(ScriptedRunner::new()));
        fx.host.set_active(Some(fx.doc(5, 1)));
        let plugin = fx.activate().await;

        fx.host.set_config(serde_json::json!({ "format": "{author}: {summary}" }));
        plugin.handle_event(EditorEvent::ConfigurationChanged).await;

        assert_eq!(fx.host.rendered(), vec![" Line five", " Ada: Line five"]);
        assert_eq!(fx.runner.calls_starting_with("blame"), 2);
    }

    #[tokio::test]
    async fn workspace_change_clears_caches() {
        let fx = Fixture::new(with_git(ScriptedRunner::new()));
        let plugin = fx.activate().await;
        let doc = fx.doc(5, 1);

        plugin.handle_event(EditorEvent::ActiveEditorChanged(Some(doc.clone()))).await;
        plugin.handle_event(EditorEvent::WorkspaceFoldersChanged).await;
        plugin.handle_event(EditorEvent::ActiveEditorChanged(Some(doc))).await;

        assert_eq!(fx.runner.calls_starting_with("blame"), 2);
    }

    #[tokio::test]
    async fn deactivate_clears_annotation_and_status() {
        let fx = Fixture::new(with_git(ScriptedRunner::new()));
        fx.host.set_active(Some(fx.doc(5, 1)));
        let plugin = fx.activate().await;
        fx.host.take_calls();

        plugin.deactivate();

        assert_eq!(
            fx.host.calls(),
            vec![HostCall::Clear { file: fx.file.clone() }, HostCall::ClearStatus]
        );
    }

    #[tokio::test]
    async fn closing_last_editor_clears_annotation_and_status() {
        let fx = Fixture::new(with_git(ScriptedRunner::new()));
        fx.host.set_active(Some(fx.doc(5, 1)));
        let plugin = fx.activate().await;
        fx.host.take_calls();

        plugin.handle_event(EditorEvent::ActiveEditorChanged(None)).await;

        assert_eq!(
            fx.host.calls(),
            vec![HostCall::Clear { file: fx.file.clone() }, HostCall::ClearStatus]
        );
    }

    #[tokio::test]
    async fn show_current_line_describes_blame() {
        let fx = Fixture::new(with_git(ScriptedRunner::new()));
        let plugin = fx.activate().await;

        let message = plugin.show_current_line(&fx.doc(9, 1)).await;

        assert!(message.starts_with("Line 9: Ada, "), "unexpected message {message}");
        assert!(message.ends_with("• Line nine (3f2a9c1d)"), "unexpected message {message}");
    }
}
