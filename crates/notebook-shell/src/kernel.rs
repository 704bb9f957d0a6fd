//! Interface to the backend interpreter that executes notebook cells.
//!
//! The backend keeps one stateful interpreter session per document key
//! (variables defined by one cell are visible to the next). Calls for the
//! same key must never overlap; the coordinator guarantees this.

use anyhow::Result;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

/// Which cells of the submitted notebook the backend should run.
///
/// On the wire this is a single integer:
/// - `-1` runs every cell
/// - `i >= 0` runs cells `0..=i`
/// - `c <= -2` runs only cell `-c - 2`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendScope {
    All,
    UpTo(usize),
    Single(usize),
}

impl BackendScope {
    pub fn encode(self) -> i64 {
        match self {
            BackendScope::All => -1,
            BackendScope::UpTo(i) => i as i64,
            BackendScope::Single(i) => -(i as i64) - 2,
        }
    }

    /// Returns `None` for codes that do not name a representable cell.
    pub fn decode(code: i64) -> Option<Self> {
        match code {
            -1 => Some(BackendScope::All),
            c if c >= 0 => usize::try_from(c).ok().map(BackendScope::UpTo),
            c => c
                .checked_neg()
                .and_then(|n| n.checked_sub(2))
                .and_then(|n| usize::try_from(n).ok())
                .map(BackendScope::Single),
        }
    }
}

impl Serialize for BackendScope {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(self.encode())
    }
}

impl<'de> Deserialize<'de> for BackendScope {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let code = i64::deserialize(deserializer)?;
        BackendScope::decode(code).ok_or_else(|| {
            serde::de::Error::custom(format!("invalid backend scope code {code}"))
        })
    }
}

/// Result for one executed cell.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellResult {
    pub index: usize,
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub output: String,
    /// Non-empty when the cell failed
    #[serde(
        default,
        rename = "error",
        alias = "errorText",
        skip_serializing_if = "String::is_empty"
    )]
    pub error_text: String,
}

impl CellResult {
    pub fn is_error(&self) -> bool {
        !self.error_text.is_empty()
    }
}

/// Backend execution and cancellation interface.
pub trait ExecutionBackend: Send + Sync {
    /// Execute cells of `notebook_json` selected by `scope` in the interpreter
    /// session for `key`.
    fn execute_cells<'a>(
        &'a self,
        key: &'a str,
        notebook_json: &'a str,
        scope: BackendScope,
    ) -> BoxFuture<'a, Result<Vec<CellResult>>>;

    /// Ask the session for `key` to stop after its current cell.
    /// Best effort; the caller never waits on the outcome to reset its own state.
    fn stop_execution<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<()>>;

    /// Tear down the interpreter session for `key`, discarding its variables.
    fn reset<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<()>>;
}
