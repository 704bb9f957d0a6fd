use crate::error::NotebookError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Language of a notebook cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CellKind {
    Go,
    Python,
    Markdown,
}

impl CellKind {
    /// Markdown cells are never submitted to the backend.
    pub fn is_runnable(self) -> bool {
        !matches!(self, CellKind::Markdown)
    }
}

impl std::fmt::Display for CellKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CellKind::Go => write!(f, "go"),
            CellKind::Python => write!(f, "python"),
            CellKind::Markdown => write!(f, "markdown"),
        }
    }
}

impl std::str::FromStr for CellKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "go" => Ok(CellKind::Go),
            "python" | "py" => Ok(CellKind::Python),
            "markdown" | "md" => Ok(CellKind::Markdown),
            _ => Err(format!("Unknown cell language: {}", s)),
        }
    }
}

/// Execution status of a single cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    #[default]
    Idle,
    /// Queued behind the running cell
    Waiting,
    Running,
    Done,
}

impl RunState {
    /// Waiting or Running: the cell belongs to a live run.
    pub fn is_active(self) -> bool {
        matches!(self, RunState::Waiting | RunState::Running)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cell {
    pub id: String,
    pub kind: CellKind,
    pub source: String,
    #[serde(default)]
    pub output: String,
    #[serde(default)]
    pub error_text: String,
    #[serde(default)]
    pub run_state: RunState,
    #[serde(default)]
    pub editing_markdown: bool,
}

impl Cell {
    pub fn new(kind: CellKind, source: impl Into<String>) -> Self {
        Cell {
            id: new_cell_id(),
            kind,
            source: source.into(),
            output: String::new(),
            error_text: String::new(),
            run_state: RunState::Idle,
            editing_markdown: false,
        }
    }

    pub fn clear_output(&mut self) {
        self.output.clear();
        self.error_text.clear();
    }
}

/// Generate a fresh stable cell id.
pub fn new_cell_id() -> String {
    Uuid::new_v4().to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotebookMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub execution_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_run_at: Option<DateTime<Utc>>,
    /// Keys written by other tools, preserved on save
    #[serde(flatten)]
    pub additional: HashMap<String, serde_json::Value>,
}

impl NotebookMetadata {
    pub fn now() -> Self {
        let now = Utc::now();
        NotebookMetadata {
            created_at: Some(now),
            last_modified_at: Some(now),
            execution_count: 0,
            last_run_at: None,
            additional: HashMap::new(),
        }
    }
}

/// An ordered list of cells plus document metadata.
///
/// A notebook always holds at least one cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notebook {
    cells: Vec<Cell>,
    pub metadata: NotebookMetadata,
    pub dirty: bool,
}

impl Default for Notebook {
    fn default() -> Self {
        Self::new_empty()
    }
}

impl Notebook {
    /// A new notebook with a single empty Go cell.
    pub fn new_empty() -> Self {
        Notebook {
            cells: vec![Cell::new(CellKind::Go, "")],
            metadata: NotebookMetadata::now(),
            dirty: false,
        }
    }

    pub fn from_cells(cells: Vec<Cell>, metadata: NotebookMetadata) -> Result<Self, NotebookError> {
        if cells.is_empty() {
            return Err(NotebookError::NoCells);
        }
        Ok(Notebook {
            cells,
            metadata,
            dirty: false,
        })
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn cell(&self, index: usize) -> Option<&Cell> {
        self.cells.get(index)
    }

    pub fn cell_mut(&mut self, index: usize) -> Option<&mut Cell> {
        self.cells.get_mut(index)
    }

    pub fn find_cell_index(&self, cell_id: &str) -> Option<usize> {
        self.cells.iter().position(|c| c.id == cell_id)
    }

    fn index_of(&self, cell_id: &str) -> Result<usize, NotebookError> {
        self.find_cell_index(cell_id)
            .ok_or_else(|| NotebookError::CellNotFound(cell_id.to_string()))
    }

    fn touch(&mut self) {
        self.dirty = true;
        self.metadata.last_modified_at = Some(Utc::now());
    }

    pub fn update_cell_source(&mut self, cell_id: &str, source: &str) -> Result<(), NotebookError> {
        let idx = self.index_of(cell_id)?;
        self.cells[idx].source = source.to_string();
        self.touch();
        Ok(())
    }

    pub fn set_cell_kind(&mut self, cell_id: &str, kind: CellKind) -> Result<(), NotebookError> {
        let idx = self.index_of(cell_id)?;
        let cell = &mut self.cells[idx];
        if cell.kind != kind {
            cell.kind = kind;
            cell.clear_output();
            cell.editing_markdown = kind == CellKind::Markdown && cell.source.is_empty();
            self.touch();
        }
        Ok(())
    }

    pub fn set_editing_markdown(&mut self, cell_id: &str, editing: bool) -> Result<(), NotebookError> {
        let idx = self.index_of(cell_id)?;
        self.cells[idx].editing_markdown = editing;
        Ok(())
    }

    /// Insert a new cell after `after_cell_id`, or at the end when `None`.
    /// Returns the new cell's index.
    pub fn add_cell(
        &mut self,
        kind: CellKind,
        after_cell_id: Option<&str>,
    ) -> Result<usize, NotebookError> {
        let insert_idx = match after_cell_id {
            Some(id) => self.index_of(id)? + 1,
            None => self.cells.len(),
        };
        let mut cell = Cell::new(kind, "");
        cell.editing_markdown = kind == CellKind::Markdown;
        self.cells.insert(insert_idx, cell);
        self.touch();
        Ok(insert_idx)
    }

    pub fn delete_cell(&mut self, cell_id: &str) -> Result<Cell, NotebookError> {
        // Don't delete the last cell
        if self.cells.len() <= 1 {
            return Err(NotebookError::LastCell);
        }
        let idx = self.index_of(cell_id)?;
        let removed = self.cells.remove(idx);
        self.touch();
        Ok(removed)
    }

    /// Move a cell one position up (`-1`) or down (`+1`).
    /// Returns false when the cell is already at that edge.
    pub fn move_cell(&mut self, cell_id: &str, direction: isize) -> Result<bool, NotebookError> {
        let idx = self.index_of(cell_id)?;
        let target = idx as isize + direction.signum();
        if direction == 0 || target < 0 || target as usize >= self.cells.len() {
            return Ok(false);
        }
        self.cells.swap(idx, target as usize);
        self.touch();
        Ok(true)
    }

    pub fn clear_cell_outputs(&mut self, cell_id: &str) -> Result<(), NotebookError> {
        let idx = self.index_of(cell_id)?;
        self.cells[idx].clear_output();
        self.cells[idx].run_state = RunState::Idle;
        self.touch();
        Ok(())
    }

    pub fn clear_all_outputs(&mut self) {
        for cell in &mut self.cells {
            cell.clear_output();
            cell.run_state = RunState::Idle;
        }
        self.touch();
    }

    /// Record a completed run in the metadata.
    pub fn record_run(&mut self) {
        self.metadata.execution_count += 1;
        self.metadata.last_run_at = Some(Utc::now());
        self.dirty = true;
    }
}
