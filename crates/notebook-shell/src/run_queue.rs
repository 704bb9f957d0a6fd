//! Run-queue construction: which cells a "run" action submits, and in what order.

use crate::notebook_state::Cell;
use serde::{Deserialize, Serialize};

/// Range of cells a user action asks to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "scope", content = "index", rename_all = "snake_case")]
pub enum RunScope {
    /// Only cell `i`
    Single(usize),
    /// Cells `0..=i`
    Above(usize),
    /// Cells `i..end`
    Down(usize),
    All,
}

impl RunScope {
    /// Inclusive index range this scope covers in a notebook of `len` cells,
    /// or `None` when nothing falls inside it.
    fn bounds(self, len: usize) -> Option<(usize, usize)> {
        if len == 0 {
            return None;
        }
        let last = len - 1;
        match self {
            RunScope::Single(i) if i <= last => Some((i, i)),
            RunScope::Single(_) => None,
            RunScope::Above(i) => Some((0, i.min(last))),
            RunScope::Down(i) if i <= last => Some((i, last)),
            RunScope::Down(_) => None,
            RunScope::All => Some((0, last)),
        }
    }
}

/// Build the ordered list of runnable cell indices for `scope`.
///
/// Markdown cells are skipped even inside the range. The result is strictly
/// increasing; an empty result means there is nothing to run.
pub fn build_run_queue(cells: &[Cell], scope: RunScope) -> Vec<usize> {
    let Some((start, end)) = scope.bounds(cells.len()) else {
        return Vec::new();
    };
    (start..=end)
        .filter(|&idx| cells[idx].kind.is_runnable())
        .collect()
}
