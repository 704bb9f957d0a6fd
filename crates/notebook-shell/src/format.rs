//! On-disk notebook format.
//!
//! Notebooks are stored as pretty-printed JSON:
//!
//! ```json
//! {
//!   "version": 1,
//!   "cells": [
//!     { "id": "…", "language": "go", "source": "fmt.Println(1)", "output": "1\n", "errorText": "" }
//!   ],
//!   "metadata": { "createdAt": "…", "executionCount": 3 }
//! }
//! ```
//!
//! Run states are not persisted; every cell loads as `Idle`.

use crate::error::NotebookError;
use crate::notebook_state::{new_cell_id, Cell, CellKind, Notebook, NotebookMetadata, RunState};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

pub const CURRENT_VERSION: i64 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredCell {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    id: String,
    #[serde(default)]
    language: String,
    #[serde(default)]
    source: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    output: String,
    #[serde(default, alias = "error", skip_serializing_if = "String::is_empty")]
    error_text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredNotebook {
    #[serde(default)]
    version: i64,
    #[serde(default)]
    cells: Vec<StoredCell>,
    #[serde(default = "NotebookMetadata::now")]
    metadata: NotebookMetadata,
}

/// Parse notebook JSON, normalizing languages and assigning ids to cells
/// that lack one (or share one with an earlier cell).
pub fn parse_notebook(content: &str) -> Result<Notebook, NotebookError> {
    if content.trim().is_empty() {
        return Err(NotebookError::EmptyContent);
    }

    let stored: StoredNotebook = serde_json::from_str(content)?;
    let version = if stored.version == 0 {
        CURRENT_VERSION
    } else {
        stored.version
    };
    if version < 0 {
        return Err(NotebookError::InvalidVersion(version));
    }
    if stored.cells.is_empty() {
        return Err(NotebookError::NoCells);
    }

    let mut seen = HashSet::new();
    let mut cells = Vec::with_capacity(stored.cells.len());
    for (idx, stored_cell) in stored.cells.into_iter().enumerate() {
        if stored_cell.language.trim().is_empty() {
            return Err(NotebookError::EmptyLanguage(idx + 1));
        }
        let kind: CellKind =
            stored_cell
                .language
                .parse()
                .map_err(|_| NotebookError::UnsupportedLanguage {
                    index: idx + 1,
                    language: stored_cell.language.clone(),
                })?;

        let id = if stored_cell.id.is_empty() || seen.contains(&stored_cell.id) {
            new_cell_id()
        } else {
            stored_cell.id
        };
        seen.insert(id.clone());

        cells.push(Cell {
            id,
            kind,
            source: stored_cell.source,
            output: stored_cell.output,
            error_text: stored_cell.error_text,
            run_state: RunState::Idle,
            editing_markdown: false,
        });
    }

    Notebook::from_cells(cells, stored.metadata)
}

/// Serialize a notebook into its on-disk JSON form.
pub fn serialize_notebook(notebook: &Notebook) -> Result<String, NotebookError> {
    let stored = StoredNotebook {
        version: CURRENT_VERSION,
        cells: notebook
            .cells()
            .iter()
            .map(|cell| StoredCell {
                id: cell.id.clone(),
                language: cell.kind.to_string(),
                source: cell.source.clone(),
                output: cell.output.clone(),
                error_text: cell.error_text.clone(),
            })
            .collect(),
        metadata: notebook.metadata.clone(),
    };
    Ok(serde_json::to_string_pretty(&stored)?)
}

/// JSON for a brand new notebook (one empty Go cell).
pub fn default_notebook_json() -> Result<String, NotebookError> {
    serialize_notebook(&Notebook::new_empty())
}
