//! Notebook execution core for a desktop code-editing shell.
//!
//! Turns "run this cell / above / down / all" and "stop" into an ordered,
//! cancellable sequence of requests against a stateful backend interpreter,
//! and keeps open documents in a bounded cache that never drops the visible
//! document or one that is still executing.

pub mod controller;
pub mod debounce;
pub mod document_cache;
pub mod document_store;
pub mod error;
pub mod execution_queue;
pub mod execution_state;
pub mod format;
pub mod kernel;
pub mod notebook_state;
pub mod run_queue;
pub mod settings;
pub mod view;

pub use controller::{NotebookController, RunOutcome};
pub use document_cache::{CacheLimits, DocumentBuffer, DocumentCache, EvictionGuard, TextBuffer};
pub use document_store::{DocumentStore, FsDocumentStore};
pub use error::{ControllerError, ExecutionError, NotebookError};
pub use execution_queue::{ExecutionCoordinator, ExecutionQueueState};
pub use execution_state::{ExecutionSnapshot, ExecutionStateStore};
pub use kernel::{BackendScope, CellResult, ExecutionBackend};
pub use notebook_state::{Cell, CellKind, Notebook, RunState};
pub use run_queue::{build_run_queue, RunScope};
pub use settings::{load_settings, save_settings, ShellSettings};
pub use view::{NoticeLevel, NotebookView, NullView};
