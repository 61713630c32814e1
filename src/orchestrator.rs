//! Per-editor blame pipeline.
//!
//! A request walks `Idle → ResolvingRoot → RunningBlame → Parsing → Enriching
//! → Displayed`, or ends in `Error`. Each editor carries a generation counter
//! bumped by every request; a result is applied only while its generation is
//! still the latest for that editor, otherwise the request ends `Superseded`
//! and nothing is drawn.
//!
//! Results are cached per `(file, line, version)`, errors included. Identical
//! keys requested concurrently share one pipeline run. Clearing the caches
//! bumps an epoch; a run that started under an older epoch still reports its
//! result to its callers but never writes it back.

use chrono::Utc;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::cache::SharedLru;
use crate::config::Settings;
use crate::error::{BlameError, Result};
use crate::git::history::{FileHistory, relative_to_root};
use crate::git::identity::IdentityResolver;
use crate::git::locator::RepoLocator;
use crate::git::porcelain::{ParsedBlame, parse_line_porcelain};
use crate::git::provenance::ProvenanceEnricher;
use crate::git::runner::{GitCommand, GitRunner, check_git_availability};
use crate::host::{
    AnnotationRenderer, DocumentPosition, DocumentSnapshot, EditorId, Host, StatusReporter,
    StatusSeverity,
};
use crate::models::{BlameKey, BlameRecord, CacheEntry, YOU};
use crate::presentation::{self, Rendering, StatusAction};

const EMPTY_LINE_DETAILS: &str = "Empty line - no git blame information available";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Stage {
    #[default]
    Idle,
    ResolvingRoot,
    RunningBlame,
    Parsing,
    Enriching,
    Displayed,
    Error,
    Superseded,
}

#[derive(Debug, Default)]
struct EditorContext {
    generation: u64,
    stage: Stage,
    /// Last `(file, line, version)` that reached `Displayed`
    last_displayed: Option<BlameKey>,
    /// File currently carrying an inline annotation from this editor
    annotated: Option<PathBuf>,
}

#[derive(Debug, Default)]
struct StatusState {
    /// File the "last modified by" status belongs to
    file: Option<PathBuf>,
    error_shown: bool,
}

pub struct BlameOrchestrator {
    runner: Arc<dyn GitRunner>,
    renderer: Arc<dyn AnnotationRenderer>,
    status: Arc<dyn StatusReporter>,
    settings: Mutex<Arc<Settings>>,
    git_available: AtomicBool,
    locator: RepoLocator,
    identity: IdentityResolver,
    provenance: ProvenanceEnricher,
    history: FileHistory,
    blame_cache: SharedLru<BlameKey, CacheEntry>,
    cache_epoch: AtomicU64,
    in_flight: Mutex<HashMap<BlameKey, Arc<OnceCell<CacheEntry>>>>,
    editors: Mutex<HashMap<EditorId, EditorContext>>,
    status_state: Mutex<StatusState>,
}

impl BlameOrchestrator {
    /// Build an orchestrator with empty caches. Nothing is processed until
    /// `probe_git` has found a git binary.
    pub fn new(runner: Arc<dyn GitRunner>, host: &Host, settings: Settings) -> Self {
        let orchestrator = Self {
            locator: RepoLocator::new(),
            identity: IdentityResolver::new(runner.clone()),
            provenance: ProvenanceEnricher::new(runner.clone()),
            history: FileHistory::new(runner.clone()),
            blame_cache: SharedLru::new(settings.cache_size),
            cache_epoch: AtomicU64::new(0),
            runner,
            renderer: host.renderer.clone(),
            status: host.status.clone(),
            settings: Mutex::new(Arc::new(Settings::default())),
            git_available: AtomicBool::new(false),
            in_flight: Mutex::new(HashMap::new()),
            editors: Mutex::new(HashMap::new()),
            status_state: Mutex::new(StatusState::default()),
        };
        orchestrator.apply_settings(settings);
        orchestrator
    }

    /// Run `git --version` and gate all further processing on the answer.
    pub async fn probe_git(&self) -> bool {
        let available = check_git_availability(self.runner.as_ref()).await;
        self.git_available.store(available, Ordering::SeqCst);
        available
    }

    pub fn is_git_available(&self) -> bool {
        self.git_available.load(Ordering::SeqCst)
    }

    pub fn settings(&self) -> Arc<Settings> {
        lock(&self.settings).clone()
    }

    /// Swap in new settings and resize every cache to `cache_size`.
    pub fn apply_settings(&self, settings: Settings) {
        let limit = settings.cache_size;
        self.locator.set_limit(limit);
        self.identity.set_limit(limit);
        self.provenance.set_limit(limit);
        self.history.set_limit(limit);
        self.blame_cache.set_limit(limit);
        self.provenance.set_timeout(settings.git_timeout());
        self.history.set_timeout(settings.git_timeout());
        *lock(&self.settings) = Arc::new(settings);
    }

    /// Drop every cached lookup and forget what each editor last displayed,
    /// so the next request for any line runs the full pipeline again.
    pub fn clear_caches(&self) {
        self.cache_epoch.fetch_add(1, Ordering::SeqCst);
        self.locator.clear();
        self.identity.clear();
        self.provenance.clear();
        self.history.clear();
        self.blame_cache.clear();
        lock(&self.in_flight).clear();
        for context in lock(&self.editors).values_mut() {
            context.last_displayed = None;
        }
        *lock(&self.status_state) = StatusState::default();
        info!("cleared inline blame caches");
    }

    /// Drop cached blame and history results after the working tree changed
    /// on disk. Roots, identities and commit subjects stay valid.
    pub fn forget_results(&self) {
        self.cache_epoch.fetch_add(1, Ordering::SeqCst);
        self.blame_cache.clear();
        self.history.clear();
        lock(&self.in_flight).clear();
        for context in lock(&self.editors).values_mut() {
            context.last_displayed = None;
        }
        lock(&self.status_state).file = None;
        debug!("dropped cached blame results");
    }

    /// Stage of the latest request issued for `editor`.
    pub fn stage(&self, editor: EditorId) -> Stage {
        lock(&self.editors)
            .get(&editor)
            .map(|context| context.stage)
            .unwrap_or_default()
    }

    /// Blame the cursor line of `doc` and render the outcome, unless a newer
    /// request for the same editor has been issued by the time it resolves.
    /// Returns the stage the request ended in.
    pub async fn update(&self, doc: &DocumentSnapshot) -> Stage {
        let settings = self.settings();
        if !self.is_git_available() || !settings.enabled {
            return Stage::Idle;
        }
        if doc.is_untitled || !settings.should_process_file(&doc.file) {
            self.clear_editor(doc.editor);
            return Stage::Idle;
        }
        if doc.line == 0 || doc.line > doc.line_count {
            debug!(line = doc.line, line_count = doc.line_count, "line out of range");
            return Stage::Idle;
        }

        let key = BlameKey {
            file: doc.file.clone(),
            line: doc.line,
            version: doc.version,
        };
        let epoch = self.cache_epoch.load(Ordering::SeqCst);
        let generation = {
            let mut editors = lock(&self.editors);
            let context = editors.entry(doc.editor).or_default();
            // Any newer request supersedes whatever is in flight, even one
            // that is then skipped.
            context.generation += 1;

            if settings.show_only_when_changed && context.last_displayed.as_ref() == Some(&key) {
                debug!(file = %doc.file.display(), line = doc.line, "cursor line unchanged");
                context.stage = Stage::Displayed;
                return Stage::Displayed;
            }
            if doc.line_text.trim().is_empty() {
                if let Some(file) = context.annotated.take() {
                    self.renderer.clear_annotations(&file);
                }
                context.last_displayed = None;
                context.stage = Stage::Idle;
                return Stage::Idle;
            }
            context.stage = Stage::ResolvingRoot;
            context.generation
        };

        let Some(root) = self.locator.find_git_root(&doc.file) else {
            debug!(file = %doc.file.display(), "file is not inside a git repository");
            self.finish(doc.editor, generation, Stage::Idle, |context| {
                if let Some(file) = context.annotated.take() {
                    self.renderer.clear_annotations(&file);
                }
                context.last_displayed = None;
            });
            let mut state = lock(&self.status_state);
            if state.file.is_some() {
                *state = StatusState::default();
                self.status.clear_status();
            }
            return Stage::Idle;
        };

        self.advance(doc.editor, generation, Stage::RunningBlame);
        let entry = self.resolve(&root, &key, &settings, doc.editor, generation).await;

        let now = Utc::now().timestamp();
        let (rendering, stage) = match &entry {
            Ok(record) => (presentation::present_record(record, &settings, now), Stage::Displayed),
            Err(e) => {
                debug!(kind = ?e.kind(), error = %e, "blame failed");
                (presentation::present_error(e, doc.is_dirty), Stage::Error)
            }
        };

        let applied = self.finish(doc.editor, generation, stage, |context| {
            match &rendering.inline_text {
                Some(text) => {
                    let position = DocumentPosition::end_of_line(doc.line, &doc.line_text);
                    self.renderer
                        .render_inline_annotation(&doc.file, position, text, &settings.style);
                    context.annotated = Some(doc.file.clone());
                    // A result from before a cache clear is drawn but not
                    // remembered, so the next request blames again.
                    context.last_displayed = (self.cache_epoch.load(Ordering::SeqCst) == epoch)
                        .then(|| key.clone());
                }
                None => {
                    if let Some(file) = context.annotated.take() {
                        self.renderer.clear_annotations(&file);
                    }
                    context.last_displayed = None;
                }
            }
        });
        if !applied {
            debug!(file = %doc.file.display(), line = doc.line, "dropping superseded blame result");
            return Stage::Superseded;
        }

        self.show_file_status(&root, &doc.file, &settings, false).await;
        self.apply_status(&root, &doc.file, &settings, rendering).await;
        stage
    }

    /// Remove the annotation drawn by `editor` and supersede its in-flight
    /// request.
    pub fn clear_editor(&self, editor: EditorId) {
        let mut editors = lock(&self.editors);
        if let Some(context) = editors.get_mut(&editor) {
            context.generation += 1;
            context.stage = Stage::Idle;
            context.last_displayed = None;
            if let Some(file) = context.annotated.take() {
                self.renderer.clear_annotations(&file);
            }
        }
    }

    /// Remove every annotation and the status, superseding all in-flight
    /// requests.
    pub fn clear_all(&self) {
        let mut editors = lock(&self.editors);
        for context in editors.values_mut() {
            context.generation += 1;
            context.stage = Stage::Idle;
            context.last_displayed = None;
            if let Some(file) = context.annotated.take() {
                self.renderer.clear_annotations(&file);
            }
        }
        *lock(&self.status_state) = StatusState::default();
        self.status.clear_status();
    }

    /// Resolve the cursor line of `doc` without touching the display, as a
    /// one-line human readable message.
    pub async fn describe_line(&self, doc: &DocumentSnapshot) -> String {
        if doc.line_text.trim().is_empty() {
            return format!("Line {}: {}", doc.line, EMPTY_LINE_DETAILS);
        }
        let settings = self.settings();
        match self.blame_line(doc).await {
            Ok(record) => {
                presentation::details_message(doc.line, &record, &settings, Utc::now().timestamp())
            }
            Err(e) => format!("Line {}: {}", doc.line, e.message()),
        }
    }

    /// Blame record for the cursor line of `doc`, through the same caches as
    /// `update` but without rendering.
    pub async fn blame_line(&self, doc: &DocumentSnapshot) -> Result<BlameRecord> {
        if !self.is_git_available() {
            return Err(BlameError::GitNotFound("Git is not installed or not in PATH".to_string()));
        }
        let root = self.locator.find_git_root(&doc.file).ok_or_else(|| {
            BlameError::NotGitRepo("File is not in a git repository".to_string())
        })?;
        let key = BlameKey {
            file: doc.file.clone(),
            line: doc.line,
            version: doc.version,
        };
        let settings = self.settings();
        // Not tied to any editor generation.
        self.resolve(&root, &key, &settings, doc.editor, 0).await
    }

    async fn resolve(
        &self,
        root: &Path,
        key: &BlameKey,
        settings: &Settings,
        editor: EditorId,
        generation: u64,
    ) -> CacheEntry {
        let epoch = self.cache_epoch.load(Ordering::SeqCst);
        if let Some(hit) = self.blame_cache.get(key) {
            debug!(file = %key.file.display(), line = key.line, "blame cache hit");
            return hit;
        }

        let cell = lock(&self.in_flight)
            .entry(key.clone())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();
        let entry = cell
            .get_or_init(|| async {
                let entry = self.run_pipeline(root, key, settings, editor, generation).await;
                if self.cache_epoch.load(Ordering::SeqCst) == epoch {
                    self.blame_cache.set(key.clone(), entry.clone());
                } else {
                    debug!(file = %key.file.display(), line = key.line, "caches cleared during blame");
                }
                entry
            })
            .await
            .clone();

        let mut in_flight = lock(&self.in_flight);
        if in_flight.get(key).is_some_and(|current| Arc::ptr_eq(current, &cell)) {
            in_flight.remove(key);
        }
        entry
    }

    async fn run_pipeline(
        &self,
        root: &Path,
        key: &BlameKey,
        settings: &Settings,
        editor: EditorId,
        generation: u64,
    ) -> Result<BlameRecord> {
        let relative = relative_to_root(root, &key.file);
        let range = format!("{0},{0}", key.line);
        let command = GitCommand::new(
            root,
            ["blame", "-L", range.as_str(), "--line-porcelain", "--", relative.as_str()],
        )
        .with_timeout(settings.git_timeout());

        debug!(file = %relative, line = key.line, "running git blame");
        let stdout = self.runner.run(&command).await?;
        if stdout.trim().is_empty() {
            return Err(BlameError::NoOutput("No blame information available".to_string()));
        }

        self.advance(editor, generation, Stage::Parsing);
        let metadata = match parse_line_porcelain(&stdout)? {
            ParsedBlame::Uncommitted => return Ok(BlameRecord::uncommitted(Utc::now().timestamp())),
            ParsedBlame::Committed(metadata) => metadata,
        };

        self.advance(editor, generation, Stage::Enriching);
        let user = if settings.show_current_user_as_you {
            self.identity.current_user(root).await
        } else {
            None
        };
        let (summary, pr_number) = self.provenance.summarize(root, &metadata).await;

        let is_you = user.is_some_and(|user| user.matches(&metadata.author, &metadata.author_email));
        let hash = metadata.short_hash();
        let author_email = Some(metadata.author_email).filter(|email| !email.is_empty());
        Ok(BlameRecord {
            author: if is_you { YOU.to_string() } else { metadata.author },
            author_email,
            time: metadata.author_time,
            summary,
            hash,
            pr_number,
            is_uncommitted: false,
        })
    }

    /// Show "last modified by" for `file` unless it is already showing.
    async fn show_file_status(&self, root: &Path, file: &Path, settings: &Settings, force: bool) {
        {
            let mut state = lock(&self.status_state);
            if !force && state.file.as_deref() == Some(file) && !state.error_shown {
                return;
            }
            state.file = Some(file.to_path_buf());
            state.error_shown = false;
        }
        if !settings.status_bar.enabled {
            self.status.clear_status();
            return;
        }

        let commit = match self.history.last_commit(root, file).await {
            Ok(mut commit) => {
                if settings.show_current_user_as_you {
                    if let Some(user) = self.identity.current_user(root).await {
                        if user.matches(&commit.author, &commit.author_email) {
                            commit.author = YOU.to_string();
                        }
                    }
                }
                Some(commit)
            }
            Err(e) => {
                debug!(file = %file.display(), error = %e, "no last commit for file");
                None
            }
        };

        let state = lock(&self.status_state);
        if state.file.as_deref() != Some(file) || state.error_shown {
            debug!(file = %file.display(), "file status superseded");
            return;
        }
        match commit {
            Some(commit) => {
                let update = presentation::present_file_commit(&commit, Utc::now().timestamp());
                self.status.set_status(&update.text, &update.tooltip, update.severity);
            }
            None => self.status.clear_status(),
        }
    }

    async fn apply_status(&self, root: &Path, file: &Path, settings: &Settings, rendering: Rendering) {
        match rendering.status {
            StatusAction::Set(update) => {
                if update.severity != StatusSeverity::Info {
                    warn!(status = %update.text, "{}", update.tooltip);
                }
                let mut state = lock(&self.status_state);
                state.error_shown = true;
                self.status.set_status(&update.text, &update.tooltip, update.severity);
            }
            StatusAction::Keep | StatusAction::Clear => {
                let error_shown = lock(&self.status_state).error_shown;
                if error_shown {
                    self.show_file_status(root, file, settings, true).await;
                }
            }
        }
    }

    fn advance(&self, editor: EditorId, generation: u64, stage: Stage) {
        if let Some(context) = lock(&self.editors).get_mut(&editor) {
            if context.generation == generation {
                debug!(editor, ?stage, "blame stage");
                context.stage = stage;
            }
        }
    }

    /// Run `apply` and record `stage` only if `generation` is still the
    /// latest request for `editor`.
    fn finish<F>(&self, editor: EditorId, generation: u64, stage: Stage, apply: F) -> bool
    where
        F: FnOnce(&mut EditorContext),
    {
        let mut editors = lock(&self.editors);
        match editors.get_mut(&editor) {
            Some(context) if context.generation == generation => {
                apply(context);
                context.stage = stage;
                true
            }
            _ => false,
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
