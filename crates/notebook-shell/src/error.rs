//! Error types for notebook documents, execution runs and the controller.

/// Errors from parsing, validating or editing a notebook document.
#[derive(Debug, thiserror::Error)]
pub enum NotebookError {
    #[error("Empty notebook content")]
    EmptyContent,

    #[error("Invalid notebook json: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("Invalid notebook version: {0}")]
    InvalidVersion(i64),

    #[error("Notebook must contain at least one cell")]
    NoCells,

    #[error("Cell {0} has empty language")]
    EmptyLanguage(usize),

    #[error("Cell {index} has unsupported language: {language}")]
    UnsupportedLanguage { index: usize, language: String },

    #[error("Cannot delete the last cell")]
    LastCell,

    #[error("Cell not found: {0}")]
    CellNotFound(String),

    #[error("Cell index out of range: {0}")]
    CellIndexOutOfRange(usize),
}

/// Errors reported by a notebook execution run.
///
/// A cell error ends the run that produced it, never the coordinator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExecutionError {
    #[error("Execution already in progress")]
    AlreadyRunning,

    #[error("Execution stopped due to an error in cell {}: {message}", index + 1)]
    CellExecution { index: usize, message: String },

    #[error("Execution stopped: backend unreachable while running cell {}: {message}", index + 1)]
    BackendUnreachable { index: usize, message: String },
}

impl ExecutionError {
    /// Index of the cell whose failure ended the run, if any.
    pub fn cell_index(&self) -> Option<usize> {
        match self {
            ExecutionError::AlreadyRunning => None,
            ExecutionError::CellExecution { index, .. }
            | ExecutionError::BackendUnreachable { index, .. } => Some(*index),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    #[error("No active document")]
    NoActiveDocument,

    #[error("Document is not open: {0}")]
    DocumentNotOpen(String),

    #[error(transparent)]
    Notebook(#[from] NotebookError),

    #[error(transparent)]
    Execution(#[from] ExecutionError),

    #[error("Failed to load {path}: {source}")]
    Load {
        path: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Failed to save {path}: {source}")]
    Save {
        path: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Backend request failed for {path}: {source}")]
    Backend {
        path: String,
        #[source]
        source: anyhow::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_execution_message_is_one_based() {
        let err = ExecutionError::CellExecution {
            index: 1,
            message: "undefined: x".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Execution stopped due to an error in cell 2: undefined: x"
        );
        assert_eq!(err.cell_index(), Some(1));
    }

    #[test]
    fn test_already_running_has_no_cell() {
        assert_eq!(ExecutionError::AlreadyRunning.cell_index(), None);
    }

    #[test]
    fn test_notebook_error_converts_into_controller_error() {
        let err: ControllerError = NotebookError::LastCell.into();
        assert!(matches!(err, ControllerError::Notebook(NotebookError::LastCell)));
        assert_eq!(err.to_string(), "Cannot delete the last cell");
    }
}
