//! Notebook controller.
//!
//! Binds user actions on the visible notebook to the run queue builder and the
//! execution coordinator, and keeps the per-document execution store and the
//! document cache in step when the user moves between documents.
//!
//! All state sits behind one `std::sync::Mutex` that is never held across an
//! `.await`. Backend and persistence calls happen with the lock released, and
//! their results are applied under the lock after checking the run epoch.

use crate::debounce::Debouncer;
use crate::document_cache::{path_is_under, rebase_path, DocumentCache, TextBuffer};
use crate::document_store::DocumentStore;
use crate::error::{ControllerError, ExecutionError, NotebookError};
use crate::execution_queue::{
    ExecutionCoordinator, ExecutionQueueState, NextStep, StartOutcome, StepOutcome,
};
use crate::execution_state::{ExecutionSnapshot, ExecutionStateStore};
use crate::format::{parse_notebook, serialize_notebook};
use crate::kernel::{BackendScope, CellResult, ExecutionBackend};
use crate::notebook_state::{Cell, CellKind, Notebook};
use crate::run_queue::{build_run_queue, RunScope};
use crate::settings::ShellSettings;
use crate::view::{NoticeLevel, NotebookView};
use anyhow::anyhow;
use log::{debug, error, info, warn};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::Notify;

/// How a run ended when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every queued cell ran without error.
    Completed,
    /// The scope contained no runnable cells.
    NothingToRun,
    /// The run was stopped or its document was closed.
    Cancelled,
}

/// A parsed notebook and its coordinator.
///
/// Sessions exist for the visible document and for documents still executing
/// in the background. `id` is unique per session so a driver loop left over
/// from a closed document never touches a reopened one.
struct DocumentSession {
    id: u64,
    notebook: Notebook,
    coordinator: ExecutionCoordinator,
}

struct ControllerState {
    active: Option<String>,
    sessions: HashMap<String, DocumentSession>,
    executions: ExecutionStateStore,
    cache: DocumentCache<TextBuffer>,
    next_session_id: u64,
    /// Keys with a backend request outstanding, including requests of runs
    /// that were stopped but have not answered yet
    in_flight: HashSet<String>,
}

impl ControllerState {
    fn session_mut(&mut self, key: &str, id: u64) -> Option<&mut DocumentSession> {
        self.sessions.get_mut(key).filter(|s| s.id == id)
    }

    fn active_key(&self) -> Result<String, ControllerError> {
        self.active.clone().ok_or(ControllerError::NoActiveDocument)
    }

    fn is_visible(&self, key: &str) -> bool {
        self.active.as_deref() == Some(key)
    }

    /// Mirror the live run state of `key` into the execution store.
    fn save_snapshot(&mut self, key: &str) {
        if let Some(session) = self.sessions.get(key) {
            let snapshot = ExecutionSnapshot::capture(&session.notebook, &session.coordinator);
            self.executions.save(key, snapshot);
        }
    }

    /// Write the session notebook back into its cached buffer.
    fn sync_buffer(&mut self, key: &str) {
        let Some(session) = self.sessions.get(key) else {
            return;
        };
        let json = match serialize_notebook(&session.notebook) {
            Ok(json) => json,
            Err(e) => {
                warn!("[controller] Failed to serialize {}: {}", key, e);
                return;
            }
        };
        if let Some(buffer) = self.cache.get_mut(key) {
            if buffer.text() != json {
                buffer.set_text(json);
                self.cache.touch(key, &self.executions);
            }
        }
    }

    fn clear_active(&mut self) {
        self.active = None;
        self.cache.set_active(None);
        self.cache.detach();
    }
}

/// Front door for notebook actions coming from the UI.
///
/// Cheap to clone; clones share state. Cell edits schedule debounced saves on
/// the tokio runtime, so they must be called from within one.
#[derive(Clone)]
pub struct NotebookController {
    state: Arc<Mutex<ControllerState>>,
    backend: Arc<dyn ExecutionBackend>,
    store: Arc<dyn DocumentStore>,
    view: Arc<dyn NotebookView>,
    saves: Debouncer,
    /// Signalled whenever a backend request resolves
    idle: Arc<Notify>,
}

/// Marks `key` busy in the backend until dropped.
struct InFlight<'a> {
    controller: &'a NotebookController,
    key: String,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.controller.lock().in_flight.remove(&self.key);
        self.controller.idle.notify_waiters();
    }
}

impl NotebookController {
    pub fn new(
        backend: Arc<dyn ExecutionBackend>,
        store: Arc<dyn DocumentStore>,
        view: Arc<dyn NotebookView>,
        settings: &ShellSettings,
    ) -> Self {
        let state = ControllerState {
            active: None,
            sessions: HashMap::new(),
            executions: ExecutionStateStore::new(),
            cache: DocumentCache::new(settings.cache_limits()),
            next_session_id: 1,
            in_flight: HashSet::new(),
        };
        Self {
            state: Arc::new(Mutex::new(state)),
            backend,
            store,
            view,
            saves: Debouncer::new(settings.save_debounce()),
            idle: Arc::new(Notify::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ControllerState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    // ======================================================================
    // Queries
    // ======================================================================

    pub fn active_document(&self) -> Option<String> {
        self.lock().active.clone()
    }

    /// Cells of the visible notebook.
    pub fn cells(&self) -> Result<Vec<Cell>, ControllerError> {
        let state = self.lock();
        let key = state.active_key()?;
        state
            .sessions
            .get(&key)
            .map(|s| s.notebook.cells().to_vec())
            .ok_or(ControllerError::DocumentNotOpen(key))
    }

    /// Queue state of the visible notebook.
    pub fn queue_state(&self) -> Result<ExecutionQueueState, ControllerError> {
        let state = self.lock();
        let key = state.active_key()?;
        state
            .sessions
            .get(&key)
            .map(|s| s.coordinator.get_state(&s.notebook))
            .ok_or(ControllerError::DocumentNotOpen(key))
    }

    pub fn is_executing(&self, path: &str) -> bool {
        self.lock().executions.is_executing(path)
    }

    pub fn execution_snapshot(&self, path: &str) -> Option<ExecutionSnapshot> {
        self.lock().executions.get(path).cloned()
    }

    /// Cached document keys, least recently used first.
    pub fn cached_documents(&self) -> Vec<String> {
        self.lock().cache.keys()
    }

    pub fn buffer_text(&self, path: &str) -> Option<String> {
        self.lock().cache.get(path).map(|b| b.text().to_string())
    }

    // ======================================================================
    // Documents
    // ======================================================================

    /// Make `path` the visible document.
    ///
    /// The departing document's run state is saved to the execution store and
    /// any unsaved edits are written out. The arriving document comes from the
    /// cache, or from the document store on a miss, and is parsed fresh; if
    /// the execution store has a snapshot for it, that snapshot is reapplied.
    pub async fn open_document(&self, path: &str) -> Result<(), ControllerError> {
        let (departing, cached_text) = {
            let mut guard = self.lock();
            let state = &mut *guard;
            if state.is_visible(path) {
                return Ok(());
            }
            let departing = match state.active.take() {
                Some(key) => self.leave(state, &key),
                None => None,
            };
            state.active = Some(path.to_string());
            state.cache.set_active(Some(path));
            (departing, state.cache.get(path).map(|b| b.text().to_string()))
        };

        if let Some((key, json)) = departing {
            if let Err(e) = self.persist(&key, &json).await {
                error!("[save] {}", e);
            }
        }

        let loaded = match cached_text {
            Some(text) => text,
            None => match self.store.load_document(path).await {
                Ok(text) => text,
                Err(source) => {
                    self.abandon(path);
                    let err = ControllerError::Load {
                        path: path.to_string(),
                        source,
                    };
                    self.view.notify(NoticeLevel::Error, &err.to_string());
                    return Err(err);
                }
            },
        };

        let mut guard = self.lock();
        let state = &mut *guard;
        if !state.is_visible(path) {
            debug!("[controller] Open of {} superseded", path);
            return Ok(());
        }

        let text = state
            .cache
            .get_or_create(path, || Ok(TextBuffer::new(loaded)), &state.executions)
            .map(|buffer| buffer.text().to_string())
            .map_err(|source| ControllerError::Load {
                path: path.to_string(),
                source,
            })?;

        let mut notebook = if text.trim().is_empty() {
            Notebook::new_empty()
        } else {
            match parse_notebook(&text) {
                Ok(notebook) => notebook,
                Err(e) => {
                    state.clear_active();
                    self.view
                        .notify(NoticeLevel::Error, &format!("Cannot open {}: {}", path, e));
                    return Err(e.into());
                }
            }
        };

        if let Some(snapshot) = state.executions.get(path) {
            let restored = snapshot.apply_to(&mut notebook);
            debug!("[controller] Restored {} cells of {}", restored, path);
        }

        match state.sessions.get_mut(path) {
            Some(session) => session.notebook = notebook,
            None => {
                let id = state.next_session_id;
                state.next_session_id += 1;
                state.sessions.insert(
                    path.to_string(),
                    DocumentSession {
                        id,
                        notebook,
                        coordinator: ExecutionCoordinator::new(),
                    },
                );
            }
        }

        state.cache.attach(path);
        info!("[controller] Opened {}", path);
        self.render(state, path);
        Ok(())
    }

    /// Hand the departing document back to the cache. Returns the document
    /// contents to write out if it had unsaved edits.
    fn leave(&self, state: &mut ControllerState, key: &str) -> Option<(String, String)> {
        let running = state
            .sessions
            .get(key)
            .is_some_and(|s| s.coordinator.is_running());
        let editing = state
            .sessions
            .get(key)
            .is_some_and(|s| s.notebook.cells().iter().any(|c| c.editing_markdown));
        if running || editing || state.executions.contains(key) {
            state.save_snapshot(key);
        }
        state.sync_buffer(key);
        state.cache.detach();

        let had_pending = self.saves.cancel(key);
        let session = state.sessions.get_mut(key)?;
        let unsaved = if session.notebook.dirty || had_pending {
            session.notebook.dirty = false;
            match serialize_notebook(&session.notebook) {
                Ok(json) => Some((key.to_string(), json)),
                Err(e) => {
                    warn!("[controller] Failed to serialize {}: {}", key, e);
                    None
                }
            }
        } else {
            None
        };

        if running {
            debug!("[controller] {} keeps running in the background", key);
        } else {
            state.sessions.remove(key);
        }
        unsaved
    }

    fn abandon(&self, path: &str) {
        let mut state = self.lock();
        if state.is_visible(path) {
            state.clear_active();
        }
    }

    /// Close `path`: stop its run, flush a pending save and drop its cached
    /// buffer and execution state.
    pub async fn close_document(&self, path: &str) -> Result<(), ControllerError> {
        self.stop_document(path).await;
        if self.saves.cancel(path) {
            if let Err(e) = self.save_document(path).await {
                error!("[save] {}", e);
            }
        }

        let mut state = self.lock();
        let had_session = state.sessions.remove(path).is_some();
        let had_state = state.executions.remove(path).is_some();
        let had_buffer = state.cache.remove(path);
        if state.is_visible(path) {
            state.clear_active();
        }
        if !(had_session || had_state || had_buffer) {
            return Err(ControllerError::DocumentNotOpen(path.to_string()));
        }
        info!("[controller] Closed {}", path);
        Ok(())
    }

    /// Forget every document at or below `prefix` after it was deleted from
    /// the workspace. Returns the cache keys that were dropped.
    pub async fn delete_path(&self, prefix: &str) -> Vec<String> {
        for key in self.running_under(prefix) {
            self.stop_document(&key).await;
        }
        for key in self.saves.pending_keys() {
            if path_is_under(&key, prefix) {
                self.saves.cancel(&key);
            }
        }

        let mut state = self.lock();
        state.sessions.retain(|key, _| !path_is_under(key, prefix));
        state.executions.remove_all_under(prefix);
        let removed = state.cache.remove_all_under(prefix);
        if state.active.as_deref().is_some_and(|a| path_is_under(a, prefix)) {
            state.clear_active();
        }
        info!("[controller] Deleted {} ({} cached)", prefix, removed.len());
        removed
    }

    /// Move every document at or below `old` to the matching path under `new`.
    /// Runs under `old` are stopped first.
    pub async fn rename_path(&self, old: &str, new: &str) {
        for key in self.running_under(old) {
            self.stop_document(&key).await;
        }
        let pending: Vec<String> = self
            .saves
            .pending_keys()
            .into_iter()
            .filter(|key| path_is_under(key, old))
            .collect();
        for key in &pending {
            self.saves.cancel(key);
        }

        {
            let mut guard = self.lock();
            let state = &mut *guard;
            let moved: Vec<String> = state
                .sessions
                .keys()
                .filter(|key| path_is_under(key, old))
                .cloned()
                .collect();
            for key in moved {
                if let Some(session) = state.sessions.remove(&key) {
                    state
                        .sessions
                        .insert(rebase_path(&key, old, new), session);
                }
            }
            state.executions.rename_all_under(old, new);
            state.cache.rename_all_under(old, new);
            if let Some(active) = state.active.as_deref() {
                if path_is_under(active, old) {
                    state.active = Some(rebase_path(active, old, new));
                }
            }
        }

        for key in pending {
            self.schedule_save(&rebase_path(&key, old, new));
        }
        info!("[controller] Renamed {} -> {}", old, new);
    }

    fn running_under(&self, prefix: &str) -> Vec<String> {
        self.lock()
            .sessions
            .iter()
            .filter(|(key, s)| path_is_under(key, prefix) && s.coordinator.is_running())
            .map(|(key, _)| key.clone())
            .collect()
    }

    // ======================================================================
    // Execution
    // ======================================================================

    /// Run the cells of the visible notebook selected by `scope`.
    ///
    /// Resolves when the run ends. A cell error or backend failure ends the
    /// run with `ControllerError::Execution`; the document can be switched
    /// away from meanwhile and results keep landing in the execution store.
    pub async fn run(&self, scope: RunScope) -> Result<RunOutcome, ControllerError> {
        let (key, session_id, epoch) = {
            let mut guard = self.lock();
            let state = &mut *guard;
            let key = state.active_key()?;
            let session = state
                .sessions
                .get_mut(&key)
                .ok_or_else(|| ControllerError::DocumentNotOpen(key.clone()))?;
            let queue = build_run_queue(session.notebook.cells(), scope);
            match session.coordinator.start(&mut session.notebook, queue) {
                Ok(StartOutcome::Started { epoch }) => {
                    let id = session.id;
                    self.publish(state, &key);
                    (key, id, epoch)
                }
                Ok(StartOutcome::NothingToRun) => return Ok(RunOutcome::NothingToRun),
                Err(e) => {
                    self.view.notify(NoticeLevel::Warning, &e.to_string());
                    return Err(e.into());
                }
            }
        };

        info!("[controller] Running {:?} in {}", scope, key);
        self.drive(key, session_id, epoch).await
    }

    async fn drive(
        &self,
        key: String,
        session_id: u64,
        epoch: u64,
    ) -> Result<RunOutcome, ControllerError> {
        loop {
            // Registered before the check so a release in between is not missed
            let released = self.idle.notified();
            let request = {
                let mut guard = self.lock();
                let state = &mut *guard;
                if state.session_mut(&key, session_id).is_none() {
                    return Ok(RunOutcome::Cancelled);
                }
                if state.in_flight.contains(&key) {
                    None
                } else {
                    let Some(session) = state.session_mut(&key, session_id) else {
                        return Ok(RunOutcome::Cancelled);
                    };
                    match session.coordinator.next_step(&mut session.notebook, epoch) {
                        NextStep::Submit(request) => {
                            state.in_flight.insert(key.clone());
                            self.publish(state, &key);
                            Some(request)
                        }
                        NextStep::Finished => return Ok(self.finish_run(state, &key)),
                        NextStep::Aborted(err) => return Err(self.abort_run(state, &key, err)),
                        NextStep::NotRunning => return Ok(RunOutcome::Cancelled),
                    }
                }
            };

            let Some(request) = request else {
                debug!(
                    "[controller] Waiting for a cancelled request in {} to finish",
                    key
                );
                released.await;
                continue;
            };
            let in_flight = InFlight {
                controller: self,
                key: key.clone(),
            };

            debug!(
                "[controller] Submitting cell {} ({}) of {}",
                request.index, request.cell_id, key
            );
            let result = self
                .backend
                .execute_cells(
                    &key,
                    &request.notebook_json,
                    BackendScope::Single(request.index),
                )
                .await
                .and_then(|results| pick_result(results, request.index));
            drop(in_flight);

            {
                let mut guard = self.lock();
                let state = &mut *guard;
                let Some(session) = state.session_mut(&key, session_id) else {
                    info!(
                        "[controller] {} closed while cell {} was running",
                        key, request.index
                    );
                    return Ok(RunOutcome::Cancelled);
                };
                match session.coordinator.apply_result(
                    &mut session.notebook,
                    epoch,
                    &request.cell_id,
                    result,
                ) {
                    StepOutcome::Continue => self.publish(state, &key),
                    StepOutcome::Finished => return Ok(self.finish_run(state, &key)),
                    StepOutcome::Aborted(err) => return Err(self.abort_run(state, &key, err)),
                    StepOutcome::Stale => return Ok(RunOutcome::Cancelled),
                }
            }
        }
    }

    fn finish_run(&self, state: &mut ControllerState, key: &str) -> RunOutcome {
        self.publish(state, key);
        self.after_run(state, key);
        RunOutcome::Completed
    }

    fn abort_run(
        &self,
        state: &mut ControllerState,
        key: &str,
        err: ExecutionError,
    ) -> ControllerError {
        self.publish(state, key);
        self.view.notify(NoticeLevel::Error, &err.to_string());
        self.after_run(state, key);
        err.into()
    }

    /// Persist outputs once a run has ended. A document that finished in the
    /// background is written out immediately and its session released.
    fn after_run(&self, state: &mut ControllerState, key: &str) {
        if let Some(session) = state.sessions.get_mut(key) {
            session.notebook.dirty = true;
        }
        state.sync_buffer(key);

        if state.is_visible(key) {
            self.schedule_save(key);
            return;
        }

        let Some(session) = state.sessions.remove(key) else {
            return;
        };
        match serialize_notebook(&session.notebook) {
            Ok(json) => {
                let this = self.clone();
                let key = key.to_string();
                tokio::spawn(async move {
                    if let Err(e) = this.persist(&key, &json).await {
                        error!("[save] {}", e);
                    }
                });
            }
            Err(e) => warn!("[controller] Failed to serialize {}: {}", key, e),
        }
    }

    /// Stop the run in the visible notebook.
    ///
    /// Local state is reset before the backend is asked to cancel, so a
    /// result that arrives afterwards is discarded. A new run of the same
    /// document holds its first submission until that result has arrived.
    pub async fn stop(&self) -> Result<(), ControllerError> {
        let key = self.lock().active_key()?;
        self.stop_document(&key).await;
        Ok(())
    }

    async fn stop_document(&self, key: &str) -> bool {
        let stopped = {
            let mut guard = self.lock();
            let state = &mut *guard;
            match state.sessions.get_mut(key) {
                Some(session) if session.coordinator.is_running() => {
                    session.coordinator.stop(&mut session.notebook);
                    self.publish(state, key);
                    true
                }
                _ => false,
            }
        };

        if stopped {
            if let Err(e) = self.backend.stop_execution(key).await {
                warn!("[controller] Backend stop for {} failed: {}", key, e);
            }
        } else {
            debug!("[controller] Nothing running in {}", key);
        }
        stopped
    }

    /// Stop any run and discard the backend interpreter session of the
    /// visible notebook.
    pub async fn reset_environment(&self) -> Result<(), ControllerError> {
        let key = self.lock().active_key()?;
        self.stop_document(&key).await;
        self.backend
            .reset(&key)
            .await
            .map_err(|source| ControllerError::Backend {
                path: key.clone(),
                source,
            })?;
        info!("[controller] Reset environment for {}", key);
        self.view.notify(NoticeLevel::Info, "Environment reset");
        Ok(())
    }

    /// Mirror the run state of `key` into the execution store and render it
    /// if it is on screen.
    fn publish(&self, state: &mut ControllerState, key: &str) {
        state.save_snapshot(key);
        if state.is_visible(key) {
            self.render(state, key);
        } else {
            debug!("[controller] {} is not visible, skipping view update", key);
        }
    }

    fn render(&self, state: &ControllerState, key: &str) {
        if !state.is_visible(key) {
            return;
        }
        let Some(session) = state.sessions.get(key) else {
            return;
        };
        let queue = session.coordinator.get_state(&session.notebook);
        self.view
            .execution_changed(key, session.coordinator.is_running(), &queue);
        for (index, cell) in session.notebook.cells().iter().enumerate() {
            self.view.cell_changed(key, index, cell);
        }
    }

    // ======================================================================
    // Cell editing
    // ======================================================================

    fn edit<T>(
        &self,
        f: impl FnOnce(&mut Notebook) -> Result<T, NotebookError>,
    ) -> Result<T, ControllerError> {
        let (key, value, dirty) = {
            let mut guard = self.lock();
            let state = &mut *guard;
            let key = state.active_key()?;
            let session = state
                .sessions
                .get_mut(&key)
                .ok_or_else(|| ControllerError::DocumentNotOpen(key.clone()))?;
            let value = f(&mut session.notebook)?;
            let dirty = session.notebook.dirty;
            state.sync_buffer(&key);
            self.render(state, &key);
            (key, value, dirty)
        };
        if dirty {
            self.schedule_save(&key);
        }
        Ok(value)
    }

    /// Add a cell after `after_cell_id`, or at the end. Returns the new cell id.
    pub fn add_cell(
        &self,
        kind: CellKind,
        after_cell_id: Option<&str>,
    ) -> Result<String, ControllerError> {
        self.edit(|nb| {
            let idx = nb.add_cell(kind, after_cell_id)?;
            nb.cell(idx)
                .map(|c| c.id.clone())
                .ok_or(NotebookError::CellIndexOutOfRange(idx))
        })
    }

    pub fn delete_cell(&self, cell_id: &str) -> Result<(), ControllerError> {
        self.edit(|nb| nb.delete_cell(cell_id).map(|_| ()))
    }

    /// Move a cell up (`-1`) or down (`+1`). Returns false at the edges.
    pub fn move_cell(&self, cell_id: &str, direction: isize) -> Result<bool, ControllerError> {
        self.edit(|nb| nb.move_cell(cell_id, direction))
    }

    pub fn set_cell_kind(&self, cell_id: &str, kind: CellKind) -> Result<(), ControllerError> {
        self.edit(|nb| nb.set_cell_kind(cell_id, kind))
    }

    pub fn update_cell_source(&self, cell_id: &str, source: &str) -> Result<(), ControllerError> {
        self.edit(|nb| nb.update_cell_source(cell_id, source))
    }

    pub fn set_editing_markdown(&self, cell_id: &str, editing: bool) -> Result<(), ControllerError> {
        self.edit(|nb| nb.set_editing_markdown(cell_id, editing))
    }

    pub fn clear_cell_outputs(&self, cell_id: &str) -> Result<(), ControllerError> {
        self.edit(|nb| nb.clear_cell_outputs(cell_id))
    }

    pub fn clear_all_outputs(&self) -> Result<(), ControllerError> {
        self.edit(|nb| {
            nb.clear_all_outputs();
            Ok(())
        })
    }

    // ======================================================================
    // Saving
    // ======================================================================

    /// Write the visible notebook now, cancelling any pending debounced save.
    pub async fn save_now(&self) -> Result<(), ControllerError> {
        let key = self.lock().active_key()?;
        self.saves.cancel(&key);
        self.save_document(&key).await
    }

    fn schedule_save(&self, key: &str) {
        let this = self.clone();
        let owned = key.to_string();
        self.saves.schedule(key, async move {
            if let Err(e) = this.save_document(&owned).await {
                error!("[save] {}", e);
            }
        });
    }

    async fn save_document(&self, key: &str) -> Result<(), ControllerError> {
        let json = {
            let mut guard = self.lock();
            let state = &mut *guard;
            match state.sessions.get_mut(key) {
                Some(session) => {
                    let json = serialize_notebook(&session.notebook)?;
                    session.notebook.dirty = false;
                    Some(json)
                }
                None => state.cache.get(key).map(|b| b.text().to_string()),
            }
        };
        match json {
            Some(json) => self.persist(key, &json).await,
            None => {
                warn!("[save] {} is no longer loaded, nothing to save", key);
                Ok(())
            }
        }
    }

    async fn persist(&self, key: &str, json: &str) -> Result<(), ControllerError> {
        match self.store.save_document(key, json).await {
            Ok(()) => {
                debug!("[save] Saved {}", key);
                Ok(())
            }
            Err(source) => {
                let err = ControllerError::Save {
                    path: key.to_string(),
                    source,
                };
                self.view.notify(NoticeLevel::Error, &err.to_string());
                Err(err)
            }
        }
    }
}

/// Pick the result for `index` out of a backend response.
fn pick_result(mut results: Vec<CellResult>, index: usize) -> anyhow::Result<CellResult> {
    match results.iter().position(|r| r.index == index) {
        Some(pos) => Ok(results.swap_remove(pos)),
        None => results
            .pop()
            .ok_or_else(|| anyhow!("backend returned no result for cell {}", index)),
    }
}
