use crate::error::ExecutionError;
use crate::format::serialize_notebook;
use crate::kernel::CellResult;
use crate::notebook_state::{Notebook, RunState};
use log::{debug, info, warn};
use serde::Serialize;
use std::collections::VecDeque;

/// Status of a queued cell
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CellQueueStatus {
    /// Waiting in queue
    Pending,
    /// Currently executing
    Executing,
}

/// A cell in the execution queue
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct QueuedCell {
    pub cell_id: String,
    pub index: usize,
    pub status: CellQueueStatus,
    /// Position in queue (0 = currently executing)
    pub position: usize,
}

/// Queue state handed to the view layer
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ExecutionQueueState {
    /// Is a run in progress?
    pub processing: bool,
    /// Cells still in the queue, executing cell first
    pub cells: Vec<QueuedCell>,
    /// ID of currently executing cell (if any)
    pub executing_cell_id: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum CoordinatorState {
    #[default]
    Idle,
    Running,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// A run began; results must carry this epoch to be applied.
    Started { epoch: u64 },
    /// The queue was empty.
    NothingToRun,
}

/// One backend request: run the cell at `index` of `notebook_json`.
#[derive(Debug, Clone)]
pub struct StepRequest {
    pub epoch: u64,
    pub index: usize,
    pub cell_id: String,
    pub notebook_json: String,
}

#[derive(Debug, Clone)]
pub enum NextStep {
    Submit(StepRequest),
    /// The queue drained without error.
    Finished,
    /// The run ended before a request could be built.
    Aborted(ExecutionError),
    /// The run was stopped or replaced, or a request is already in flight.
    NotRunning,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// Result applied; the next queued cell is now running.
    Continue,
    /// Result applied; the queue is exhausted.
    Finished,
    /// Result applied; the run ended on this error.
    Aborted(ExecutionError),
    /// Result belongs to a run that was stopped; it was discarded.
    Stale,
}

/// Drives one run queue against a notebook, one cell at a time.
///
/// The coordinator never talks to the backend itself. The caller asks for
/// the next [`StepRequest`], awaits the backend, and feeds the result back
/// through [`ExecutionCoordinator::apply_result`]. Every `start` and `stop`
/// bumps the epoch, so a result for a cancelled run is recognized and dropped.
///
/// Queued cells are tracked by id. Indices are resolved against the notebook
/// at each step, so cells may be added, moved or deleted during a run.
#[derive(Debug, Default)]
pub struct ExecutionCoordinator {
    state: CoordinatorState,
    /// Queued cell ids; the head is the running cell
    queue: VecDeque<String>,
    epoch: u64,
    in_flight: bool,
}

impl ExecutionCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> CoordinatorState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == CoordinatorState::Running
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Current indices of the queued cells that still exist.
    pub fn queue(&self, notebook: &Notebook) -> Vec<usize> {
        self.queue
            .iter()
            .filter_map(|id| notebook.find_cell_index(id))
            .collect()
    }

    /// Begin a run over the cells at `queue`.
    ///
    /// Rejected with `AlreadyRunning` (and no state change) while a run is
    /// active. Otherwise the head cell becomes `Running` and the rest `Waiting`.
    pub fn start(
        &mut self,
        notebook: &mut Notebook,
        queue: Vec<usize>,
    ) -> Result<StartOutcome, ExecutionError> {
        if self.is_running() {
            warn!("[queue] Run requested while another run is active");
            return Err(ExecutionError::AlreadyRunning);
        }
        let ids: VecDeque<String> = queue
            .iter()
            .filter_map(|&idx| notebook.cell(idx).map(|c| c.id.clone()))
            .collect();
        if ids.is_empty() {
            info!("[queue] Nothing to run");
            return Ok(StartOutcome::NothingToRun);
        }

        self.epoch += 1;
        self.queue = ids;
        self.state = CoordinatorState::Running;
        self.in_flight = false;

        for (position, &idx) in queue.iter().enumerate() {
            if let Some(cell) = notebook.cell_mut(idx) {
                cell.run_state = if position == 0 {
                    RunState::Running
                } else {
                    RunState::Waiting
                };
            }
        }

        info!(
            "[queue] Run started: epoch={} cells={:?}",
            self.epoch, queue
        );
        Ok(StartOutcome::Started { epoch: self.epoch })
    }

    /// Build the request for the head cell of run `epoch`.
    ///
    /// Queued cells that were deleted or changed to markdown since the run
    /// started are skipped.
    pub fn next_step(&mut self, notebook: &mut Notebook, epoch: u64) -> NextStep {
        if epoch != self.epoch || !self.is_running() || self.in_flight {
            return NextStep::NotRunning;
        }

        let head = loop {
            let Some(id) = self.queue.front() else {
                self.finish(notebook);
                return NextStep::Finished;
            };
            match notebook.find_cell_index(id) {
                Some(idx) if notebook.cell(idx).is_some_and(|c| c.kind.is_runnable()) => {
                    break idx
                }
                Some(idx) => {
                    debug!("[queue] Cell {} is no longer runnable, skipping", id);
                    if let Some(cell) = notebook.cell_mut(idx) {
                        cell.run_state = RunState::Idle;
                    }
                    self.queue.pop_front();
                }
                None => {
                    debug!("[queue] Cell {} not found, skipping", id);
                    self.queue.pop_front();
                }
            }
        };

        let notebook_json = match serialize_notebook(notebook) {
            Ok(json) => json,
            Err(e) => {
                let err = ExecutionError::BackendUnreachable {
                    index: head,
                    message: e.to_string(),
                };
                self.abort(notebook);
                return NextStep::Aborted(err);
            }
        };

        let Some(cell) = notebook.cell_mut(head) else {
            return NextStep::NotRunning;
        };
        cell.run_state = RunState::Running;
        let cell_id = cell.id.clone();

        self.in_flight = true;
        NextStep::Submit(StepRequest {
            epoch,
            index: head,
            cell_id,
            notebook_json,
        })
    }

    /// Apply the backend's answer for cell `cell_id` of run `epoch`.
    ///
    /// The result lands on that cell wherever it sits now. If the cell was
    /// deleted while it ran, the result is dropped and the run moves on.
    /// A transport failure (`Err`) is handled exactly like a cell error.
    pub fn apply_result(
        &mut self,
        notebook: &mut Notebook,
        epoch: u64,
        cell_id: &str,
        result: anyhow::Result<CellResult>,
    ) -> StepOutcome {
        if epoch != self.epoch || !self.is_running() {
            info!(
                "[queue] Discarding stale result for cell {} (epoch {} != {})",
                cell_id, epoch, self.epoch
            );
            return StepOutcome::Stale;
        }
        if self.queue.front().map(String::as_str) != Some(cell_id) {
            warn!(
                "[queue] Result for cell {} does not match queue head {:?}, discarding",
                cell_id,
                self.queue.front()
            );
            return StepOutcome::Stale;
        }

        self.in_flight = false;
        self.queue.pop_front();

        let failure = match notebook.find_cell_index(cell_id) {
            None => {
                info!("[queue] Cell {} was deleted while running, dropping its result", cell_id);
                None
            }
            Some(index) => match result {
                Ok(CellResult {
                    output, error_text, ..
                }) => {
                    if let Some(cell) = notebook.cell_mut(index) {
                        cell.output = output;
                        cell.error_text = error_text.clone();
                        cell.run_state = RunState::Done;
                    }
                    (!error_text.is_empty()).then(|| ExecutionError::CellExecution {
                        index,
                        message: error_text,
                    })
                }
                Err(e) => {
                    let message = e.to_string();
                    if let Some(cell) = notebook.cell_mut(index) {
                        cell.error_text = message.clone();
                        cell.run_state = RunState::Done;
                    }
                    Some(ExecutionError::BackendUnreachable { index, message })
                }
            },
        };

        if let Some(err) = failure {
            warn!("[queue] {}", err);
            self.abort(notebook);
            return StepOutcome::Aborted(err);
        }

        let next = self
            .queue
            .iter()
            .find_map(|id| notebook.find_cell_index(id));
        match next {
            Some(idx) => {
                if let Some(cell) = notebook.cell_mut(idx) {
                    cell.run_state = RunState::Running;
                }
                StepOutcome::Continue
            }
            None => {
                self.finish(notebook);
                StepOutcome::Finished
            }
        }
    }

    /// Cancel the current run.
    ///
    /// Clears the queue, resets every cell that is not `Done` to `Idle` and
    /// returns to `Idle`. Returns the current indices of the cells that were
    /// still queued.
    pub fn stop(&mut self, notebook: &mut Notebook) -> Vec<usize> {
        self.epoch += 1;
        let cancelled = self.queue(notebook);
        self.queue.clear();
        self.state = CoordinatorState::Idle;
        self.in_flight = false;

        for idx in 0..notebook.len() {
            if let Some(cell) = notebook.cell_mut(idx) {
                if cell.run_state != RunState::Done {
                    cell.run_state = RunState::Idle;
                }
            }
        }

        info!(
            "[queue] Stopped: epoch={} cancelled={:?}",
            self.epoch, cancelled
        );
        cancelled
    }

    fn abort(&mut self, notebook: &mut Notebook) {
        for id in self.queue.drain(..) {
            if let Some(cell) = notebook
                .find_cell_index(&id)
                .and_then(|idx| notebook.cell_mut(idx))
            {
                cell.run_state = RunState::Idle;
            }
        }
        self.state = CoordinatorState::Idle;
        self.in_flight = false;
    }

    fn finish(&mut self, notebook: &mut Notebook) {
        self.queue.clear();
        self.state = CoordinatorState::Idle;
        self.in_flight = false;
        notebook.record_run();
        info!("[queue] Run finished: epoch={}", self.epoch);
    }

    /// Get current state for the view layer
    pub fn get_state(&self, notebook: &Notebook) -> ExecutionQueueState {
        let cells: Vec<QueuedCell> = self
            .queue
            .iter()
            .filter_map(|id| Some((id, notebook.find_cell_index(id)?)))
            .enumerate()
            .map(|(position, (id, index))| QueuedCell {
                cell_id: id.clone(),
                index,
                status: if position == 0 {
                    CellQueueStatus::Executing
                } else {
                    CellQueueStatus::Pending
                },
                position,
            })
            .collect();

        ExecutionQueueState {
            processing: self.is_running(),
            executing_cell_id: cells
                .first()
                .filter(|c| c.status == CellQueueStatus::Executing)
                .map(|c| c.cell_id.clone()),
            cells,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notebook_state::{Cell, CellKind, NotebookMetadata};
    use crate::run_queue::{build_run_queue, RunScope};

    fn mixed_notebook() -> Notebook {
        let cells = [
            CellKind::Go,
            CellKind::Python,
            CellKind::Markdown,
            CellKind::Go,
        ]
        .iter()
        .enumerate()
        .map(|(i, k)| Cell::new(*k, format!("cell {}", i)))
        .collect();
        Notebook::from_cells(cells, NotebookMetadata::now()).unwrap()
    }

    fn ok(index: usize, output: &str) -> anyhow::Result<CellResult> {
        Ok(CellResult {
            index,
            output: output.to_string(),
            ..Default::default()
        })
    }

    fn failed(index: usize, error: &str) -> anyhow::Result<CellResult> {
        Ok(CellResult {
            index,
            error_text: error.to_string(),
            ..Default::default()
        })
    }

    fn run_states(nb: &Notebook) -> Vec<RunState> {
        nb.cells().iter().map(|c| c.run_state).collect()
    }

    fn start_all(coord: &mut ExecutionCoordinator, nb: &mut Notebook) -> u64 {
        let queue = build_run_queue(nb.cells(), RunScope::All);
        match coord.start(nb, queue).unwrap() {
            StartOutcome::Started { epoch } => epoch,
            StartOutcome::NothingToRun => panic!("expected a run"),
        }
    }

    fn submit(coord: &mut ExecutionCoordinator, nb: &mut Notebook, epoch: u64) -> StepRequest {
        match coord.next_step(nb, epoch) {
            NextStep::Submit(req) => req,
            other => panic!("expected a request, got {:?}", other),
        }
    }

    #[test]
    fn test_new_coordinator_is_idle() {
        let coord = ExecutionCoordinator::new();
        assert_eq!(coord.state(), CoordinatorState::Idle);
        assert!(coord.queue(&mixed_notebook()).is_empty());
        assert_eq!(coord.epoch(), 0);
    }

    #[test]
    fn test_start_marks_head_running_and_rest_waiting() {
        let mut nb = mixed_notebook();
        let mut coord = ExecutionCoordinator::new();

        start_all(&mut coord, &mut nb);

        assert!(coord.is_running());
        assert_eq!(coord.queue(&nb), vec![0, 1, 3]);
        assert_eq!(
            run_states(&nb),
            vec![
                RunState::Running,
                RunState::Waiting,
                RunState::Idle,
                RunState::Waiting
            ]
        );
    }

    #[test]
    fn test_start_with_empty_queue_is_nothing_to_run() {
        let mut nb = mixed_notebook();
        let mut coord = ExecutionCoordinator::new();

        let outcome = coord.start(&mut nb, Vec::new()).unwrap();

        assert_eq!(outcome, StartOutcome::NothingToRun);
        assert!(!coord.is_running());
        assert_eq!(coord.epoch(), 0);
    }

    #[test]
    fn test_start_while_running_is_rejected_without_change() {
        let mut nb = mixed_notebook();
        let mut coord = ExecutionCoordinator::new();
        let epoch = start_all(&mut coord, &mut nb);
        let before = run_states(&nb);

        let result = coord.start(&mut nb, vec![3]);

        assert_eq!(result, Err(ExecutionError::AlreadyRunning));
        assert_eq!(coord.queue(&nb), vec![0, 1, 3]);
        assert_eq!(coord.epoch(), epoch);
        assert_eq!(run_states(&nb), before);
    }

    #[test]
    fn test_full_run_applies_results_in_order() {
        let mut nb = mixed_notebook();
        let mut coord = ExecutionCoordinator::new();
        let epoch = start_all(&mut coord, &mut nb);

        let expected = [
            (0, StepOutcome::Continue),
            (1, StepOutcome::Continue),
            (3, StepOutcome::Finished),
        ];
        for (index, want) in expected {
            let req = submit(&mut coord, &mut nb, epoch);
            assert_eq!(req.index, index);
            assert_eq!(req.cell_id, nb.cells()[index].id);
            let output = format!("out {}", index);
            let outcome = coord.apply_result(&mut nb, epoch, &req.cell_id, ok(index, &output));
            assert_eq!(outcome, want);
        }

        assert!(!coord.is_running());
        assert_eq!(
            run_states(&nb),
            vec![RunState::Done, RunState::Done, RunState::Idle, RunState::Done]
        );
        assert_eq!(nb.cells()[3].output, "out 3");
        assert_eq!(nb.metadata.execution_count, 1);
    }

    #[test]
    fn test_only_one_request_in_flight() {
        let mut nb = mixed_notebook();
        let mut coord = ExecutionCoordinator::new();
        let epoch = start_all(&mut coord, &mut nb);

        let _first = submit(&mut coord, &mut nb, epoch);

        assert!(matches!(coord.next_step(&mut nb, epoch), NextStep::NotRunning));
    }

    #[test]
    fn test_request_carries_current_source() {
        let mut nb = mixed_notebook();
        let mut coord = ExecutionCoordinator::new();
        let epoch = start_all(&mut coord, &mut nb);
        let id = nb.cells()[0].id.clone();
        nb.update_cell_source(&id, "fmt.Println(\"edited\")").unwrap();

        let req = submit(&mut coord, &mut nb, epoch);

        let value: serde_json::Value = serde_json::from_str(&req.notebook_json).unwrap();
        assert_eq!(value["cells"][0]["source"], "fmt.Println(\"edited\")");
    }

    #[test]
    fn test_cell_error_aborts_remaining_queue() {
        let mut nb = mixed_notebook();
        let mut coord = ExecutionCoordinator::new();
        let epoch = start_all(&mut coord, &mut nb);

        let req = submit(&mut coord, &mut nb, epoch);
        coord.apply_result(&mut nb, epoch, &req.cell_id, ok(0, "zero"));
        let req = submit(&mut coord, &mut nb, epoch);
        assert_eq!(req.index, 1);

        let outcome = coord.apply_result(&mut nb, epoch, &req.cell_id, failed(1, "NameError: y"));

        assert_eq!(
            outcome,
            StepOutcome::Aborted(ExecutionError::CellExecution {
                index: 1,
                message: "NameError: y".to_string()
            })
        );
        assert!(!coord.is_running());
        assert!(coord.queue(&nb).is_empty());
        assert!(matches!(coord.next_step(&mut nb, epoch), NextStep::NotRunning));
        assert_eq!(nb.cells()[0].output, "zero");
        assert_eq!(nb.cells()[1].error_text, "NameError: y");
        assert_eq!(nb.cells()[3].run_state, RunState::Idle);
        assert_eq!(nb.metadata.execution_count, 0);
    }

    #[test]
    fn test_transport_failure_is_treated_as_cell_error() {
        let mut nb = mixed_notebook();
        let mut coord = ExecutionCoordinator::new();
        let epoch = start_all(&mut coord, &mut nb);
        let req = submit(&mut coord, &mut nb, epoch);

        let outcome = coord.apply_result(
            &mut nb,
            epoch,
            &req.cell_id,
            Err(anyhow::anyhow!("connection refused")),
        );

        assert!(matches!(
            outcome,
            StepOutcome::Aborted(ExecutionError::BackendUnreachable { index: 0, .. })
        ));
        assert_eq!(nb.cells()[0].run_state, RunState::Done);
        assert_eq!(nb.cells()[0].error_text, "connection refused");
        assert_eq!(nb.cells()[1].run_state, RunState::Idle);
        assert_eq!(nb.cells()[3].run_state, RunState::Idle);
    }

    #[test]
    fn test_coordinator_restarts_after_error() {
        let mut nb = mixed_notebook();
        let mut coord = ExecutionCoordinator::new();
        let epoch = start_all(&mut coord, &mut nb);
        let req = submit(&mut coord, &mut nb, epoch);
        coord.apply_result(&mut nb, epoch, &req.cell_id, failed(0, "boom"));

        let second = start_all(&mut coord, &mut nb);

        assert!(second > epoch);
        assert!(coord.is_running());
    }

    #[test]
    fn test_stop_resets_waiting_and_running_cells() {
        let mut nb = mixed_notebook();
        let mut coord = ExecutionCoordinator::new();
        let epoch = start_all(&mut coord, &mut nb);
        let req = submit(&mut coord, &mut nb, epoch);
        coord.apply_result(&mut nb, epoch, &req.cell_id, ok(0, "zero"));
        let _in_flight = submit(&mut coord, &mut nb, epoch);

        let cancelled = coord.stop(&mut nb);

        assert_eq!(cancelled, vec![1, 3]);
        assert!(!coord.is_running());
        assert_eq!(
            run_states(&nb),
            vec![RunState::Done, RunState::Idle, RunState::Idle, RunState::Idle]
        );
    }

    #[test]
    fn test_late_result_after_stop_is_discarded() {
        let mut nb = mixed_notebook();
        let mut coord = ExecutionCoordinator::new();
        let epoch = start_all(&mut coord, &mut nb);
        let req = submit(&mut coord, &mut nb, epoch);
        coord.stop(&mut nb);

        let outcome = coord.apply_result(&mut nb, epoch, &req.cell_id, ok(0, "late"));

        assert_eq!(outcome, StepOutcome::Stale);
        assert!(nb.cells()[0].output.is_empty());
        assert_eq!(nb.cells()[0].run_state, RunState::Idle);
    }

    #[test]
    fn test_late_result_does_not_corrupt_next_run() {
        let mut nb = mixed_notebook();
        let mut coord = ExecutionCoordinator::new();
        let old_epoch = start_all(&mut coord, &mut nb);
        let old = submit(&mut coord, &mut nb, old_epoch);
        coord.stop(&mut nb);
        let new_epoch = start_all(&mut coord, &mut nb);
        let _new = submit(&mut coord, &mut nb, new_epoch);

        let outcome = coord.apply_result(&mut nb, old_epoch, &old.cell_id, ok(0, "stale"));

        assert_eq!(outcome, StepOutcome::Stale);
        assert_eq!(nb.cells()[0].run_state, RunState::Running);
        assert!(nb.cells()[0].output.is_empty());
        assert_eq!(coord.queue(&nb), vec![0, 1, 3]);
    }

    #[test]
    fn test_deleted_cells_are_skipped() {
        let mut nb = mixed_notebook();
        let mut coord = ExecutionCoordinator::new();
        let epoch = start_all(&mut coord, &mut nb);
        let req = submit(&mut coord, &mut nb, epoch);
        coord.apply_result(&mut nb, epoch, &req.cell_id, ok(0, ""));
        // Index 3 no longer exists once a cell is removed
        let last = nb.cells()[3].id.clone();
        nb.delete_cell(&last).unwrap();
        let req = submit(&mut coord, &mut nb, epoch);
        assert_eq!(req.index, 1);

        let outcome = coord.apply_result(&mut nb, epoch, &req.cell_id, ok(1, ""));
        assert_eq!(outcome, StepOutcome::Finished);
        assert!(!coord.is_running());
    }

    #[test]
    fn test_result_lands_on_cell_moved_while_running() {
        let mut nb = mixed_notebook();
        let mut coord = ExecutionCoordinator::new();
        let epoch = start_all(&mut coord, &mut nb);
        let req = submit(&mut coord, &mut nb, epoch);
        nb.move_cell(&req.cell_id, 1).unwrap();

        let outcome = coord.apply_result(&mut nb, epoch, &req.cell_id, ok(0, "from first"));

        assert_eq!(outcome, StepOutcome::Continue);
        assert_eq!(nb.cells()[1].id, req.cell_id);
        assert_eq!(nb.cells()[1].output, "from first");
        assert_eq!(nb.cells()[1].run_state, RunState::Done);
        assert!(nb.cells()[0].output.is_empty());
        assert_eq!(nb.cells()[0].run_state, RunState::Running);

        let next = submit(&mut coord, &mut nb, epoch);
        assert_eq!(next.index, 0);
        assert_ne!(next.cell_id, req.cell_id);
    }

    #[test]
    fn test_result_for_deleted_cell_is_dropped() {
        let mut nb = mixed_notebook();
        let mut coord = ExecutionCoordinator::new();
        let epoch = start_all(&mut coord, &mut nb);
        let req = submit(&mut coord, &mut nb, epoch);
        let second = nb.cells()[1].id.clone();
        nb.delete_cell(&req.cell_id).unwrap();

        let outcome = coord.apply_result(&mut nb, epoch, &req.cell_id, ok(0, "orphan"));

        assert_eq!(outcome, StepOutcome::Continue);
        assert!(nb.cells().iter().all(|c| c.output != "orphan"));
        assert_eq!(nb.cells()[0].id, second);
        assert_eq!(nb.cells()[0].run_state, RunState::Running);
        let next = submit(&mut coord, &mut nb, epoch);
        assert_eq!(next.cell_id, second);
        assert_eq!(next.index, 0);
    }

    #[test]
    fn test_result_for_other_cell_is_rejected() {
        let mut nb = mixed_notebook();
        let mut coord = ExecutionCoordinator::new();
        let epoch = start_all(&mut coord, &mut nb);
        let _req = submit(&mut coord, &mut nb, epoch);
        let other = nb.cells()[1].id.clone();

        let outcome = coord.apply_result(&mut nb, epoch, &other, ok(1, "wrong"));

        assert_eq!(outcome, StepOutcome::Stale);
        assert!(nb.cells()[1].output.is_empty());
        assert_eq!(coord.queue(&nb), vec![0, 1, 3]);
    }

    #[test]
    fn test_get_state_lists_queue() {
        let mut nb = mixed_notebook();
        let mut coord = ExecutionCoordinator::new();
        start_all(&mut coord, &mut nb);

        let state = coord.get_state(&nb);

        assert!(state.processing);
        assert_eq!(state.cells.len(), 3);
        assert_eq!(state.executing_cell_id, Some(nb.cells()[0].id.clone()));
        assert_eq!(state.cells[0].status, CellQueueStatus::Executing);
        assert_eq!(state.cells[2].index, 3);
        assert_eq!(state.cells[2].status, CellQueueStatus::Pending);
        for (i, cell) in state.cells.iter().enumerate() {
            assert_eq!(cell.position, i);
        }
    }

    #[test]
    fn test_get_state_idle() {
        let nb = mixed_notebook();
        let coord = ExecutionCoordinator::new();
        let state = coord.get_state(&nb);
        assert!(!state.processing);
        assert!(state.cells.is_empty());
        assert!(state.executing_cell_id.is_none());
    }

    #[test]
    fn test_queue_state_serialization() {
        let state = ExecutionQueueState {
            processing: true,
            cells: vec![QueuedCell {
                cell_id: "cell-1".to_string(),
                index: 0,
                status: CellQueueStatus::Executing,
                position: 0,
            }],
            executing_cell_id: Some("cell-1".to_string()),
        };

        let json = serde_json::to_value(&state).unwrap();

        assert_eq!(json["processing"], true);
        assert_eq!(json["executing_cell_id"], "cell-1");
        assert_eq!(json["cells"][0]["status"], "executing");
    }
}
