//! Projection of notebook state onto the UI.

use crate::execution_queue::ExecutionQueueState;
use crate::notebook_state::Cell;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// Render hooks for the visible notebook.
///
/// Cell and execution updates are only delivered for the document that is
/// currently on screen. Notices are always delivered.
pub trait NotebookView: Send + Sync {
    fn cell_changed(&self, path: &str, index: usize, cell: &Cell);

    fn execution_changed(&self, path: &str, global_executing: bool, queue: &ExecutionQueueState);

    fn notify(&self, level: NoticeLevel, message: &str);
}

/// View that discards every update.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullView;

impl NotebookView for NullView {
    fn cell_changed(&self, _path: &str, _index: usize, _cell: &Cell) {}

    fn execution_changed(&self, _path: &str, _global_executing: bool, _queue: &ExecutionQueueState) {}

    fn notify(&self, _level: NoticeLevel, _message: &str) {}
}
