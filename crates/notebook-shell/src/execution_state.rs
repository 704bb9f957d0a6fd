//! Per-document execution snapshots.
//!
//! While a notebook runs, every queue transition is mirrored here keyed by
//! document path. When the user switches back to a document, the snapshot is
//! reapplied to the freshly parsed notebook so run states and outputs match
//! what the run produced, including results that arrived while the document
//! was not visible.

use crate::document_cache::{path_is_under, rebase_path, EvictionGuard};
use crate::execution_queue::ExecutionCoordinator;
use crate::notebook_state::{Notebook, RunState};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellRunSnapshot {
    pub id: String,
    pub run_state: RunState,
    pub output: String,
    pub error_text: String,
    /// Markdown cell shown in its editor rather than rendered
    #[serde(default)]
    pub editing_markdown: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionSnapshot {
    pub global_executing: bool,
    pub queue: Vec<usize>,
    /// One entry per notebook cell, in notebook order at capture time
    pub cells: Vec<CellRunSnapshot>,
}

impl ExecutionSnapshot {
    pub fn capture(notebook: &Notebook, coordinator: &ExecutionCoordinator) -> Self {
        ExecutionSnapshot {
            global_executing: coordinator.is_running(),
            queue: coordinator.queue(notebook),
            cells: notebook
                .cells()
                .iter()
                .map(|cell| CellRunSnapshot {
                    id: cell.id.clone(),
                    run_state: cell.run_state,
                    output: cell.output.clone(),
                    error_text: cell.error_text.clone(),
                    editing_markdown: cell.editing_markdown,
                })
                .collect(),
        }
    }

    /// Copy run states, outputs and markdown editing flags onto the cells of
    /// `notebook` with matching ids. Returns how many cells were restored.
    pub fn apply_to(&self, notebook: &mut Notebook) -> usize {
        let by_id: HashMap<&str, &CellRunSnapshot> =
            self.cells.iter().map(|c| (c.id.as_str(), c)).collect();

        let mut restored = 0;
        for idx in 0..notebook.len() {
            let Some(cell) = notebook.cell_mut(idx) else {
                continue;
            };
            if let Some(saved) = by_id.get(cell.id.as_str()) {
                cell.run_state = saved.run_state;
                cell.output = saved.output.clone();
                cell.error_text = saved.error_text.clone();
                cell.editing_markdown = saved.editing_markdown;
                restored += 1;
            }
        }
        restored
    }

    /// True while the run is live or any cell is still queued.
    pub fn is_executing(&self) -> bool {
        self.global_executing || self.cells.iter().any(|c| c.run_state.is_active())
    }
}

/// Execution snapshots keyed by document path.
#[derive(Debug, Default)]
pub struct ExecutionStateStore {
    entries: HashMap<String, ExecutionSnapshot>,
}

impl ExecutionStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite the snapshot for `key`.
    pub fn save(&mut self, key: &str, snapshot: ExecutionSnapshot) {
        self.entries.insert(key.to_string(), snapshot);
    }

    pub fn get(&self, key: &str) -> Option<&ExecutionSnapshot> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_executing(&self, key: &str) -> bool {
        self.entries.get(key).is_some_and(|s| s.is_executing())
    }

    pub fn remove(&mut self, key: &str) -> Option<ExecutionSnapshot> {
        self.entries.remove(key)
    }

    /// Drop every snapshot for `prefix` or a path below it.
    pub fn remove_all_under(&mut self, prefix: &str) -> Vec<String> {
        let keys: Vec<String> = self
            .entries
            .keys()
            .filter(|k| path_is_under(k, prefix))
            .cloned()
            .collect();
        for key in &keys {
            self.entries.remove(key);
        }
        if !keys.is_empty() {
            debug!("[state] Removed {} snapshots under {}", keys.len(), prefix);
        }
        keys
    }

    /// Move snapshots from `old_prefix` (or paths below it) to `new_prefix`.
    pub fn rename_all_under(&mut self, old_prefix: &str, new_prefix: &str) {
        let keys: Vec<String> = self
            .entries
            .keys()
            .filter(|k| path_is_under(k, old_prefix))
            .cloned()
            .collect();
        for key in keys {
            if let Some(snapshot) = self.entries.remove(&key) {
                self.entries
                    .insert(rebase_path(&key, old_prefix, new_prefix), snapshot);
            }
        }
    }
}

impl EvictionGuard for ExecutionStateStore {
    fn is_pinned(&self, key: &str) -> bool {
        self.is_executing(key)
    }
}
