//! One open simulation: live parameters, run history, undo log and the last
//! displayed result.
//!
//! A session is a cheap `Clone` handle. State sits behind a mutex that is
//! never held across a service call: an execution snapshots the parameters,
//! releases the lock while the service runs, then re-locks to record.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde_json::Value;
use sf_core::{Clock, ParameterValues, SystemClock};
use sf_exec::{CancelToken, ExecutionService, Sleeper, ThreadSleeper};
use sf_project::{ScenarioDef, Simulation, VisualizationDef};
use sf_results::{NormalizedResult, Run, RunHistory};
use tracing::{debug, info, warn};

use crate::chat::{ChatAction, ChatOutcome, ChatRequest, ChatResponse, resolve_set_parameter};
use crate::config::SimflowConfig;
use crate::error::{AppError, AppResult};
use crate::params::{BoundsPolicy, ParameterPatch, ParameterStore, check_value, restore_patch};
use crate::progress::{RunProgressEvent, RunStage};
use crate::query;
use crate::repository::{SimulationRepository, persist};
use crate::run_service::{ExecutionController, RunOptions, RunOutcome, RunRequest};
use crate::scenario_service::ScenarioStore;
use crate::undo::{UndoEntry, UndoLog, UndoNotice};

/// Collaborators a session runs against.
pub struct SessionParts {
    pub service: Arc<dyn ExecutionService>,
    pub repository: Arc<dyn SimulationRepository>,
    pub sleeper: Arc<dyn Sleeper>,
    pub clock: Arc<dyn Clock>,
}

impl SessionParts {
    /// Real-time sleeper and wall clock.
    pub fn new(
        service: Arc<dyn ExecutionService>,
        repository: Arc<dyn SimulationRepository>,
    ) -> Self {
        Self {
            service,
            repository,
            sleeper: Arc::new(ThreadSleeper),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

struct SessionState {
    simulation: Simulation,
    params: ParameterStore,
    history: RunHistory,
    undo: UndoLog,
    last_result: Option<NormalizedResult>,
}

struct SessionInner {
    state: Mutex<SessionState>,
    controller: ExecutionController,
    repository: Arc<dyn SimulationRepository>,
    clock: Arc<dyn Clock>,
    run_options: RunOptions,
    executing: AtomicBool,
    in_flight: Mutex<Option<CancelToken>>,
    closed: AtomicBool,
}

/// Held for the duration of one execution; releases the guard on every exit path.
struct ExecutionGuard<'a> {
    inner: &'a SessionInner,
}

impl<'a> ExecutionGuard<'a> {
    fn acquire(inner: &'a SessionInner) -> Option<Self> {
        inner
            .executing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| Self { inner })
    }
}

impl Drop for ExecutionGuard<'_> {
    fn drop(&mut self) {
        let mut in_flight = self
            .inner
            .in_flight
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        *in_flight = None;
        self.inner.executing.store(false, Ordering::SeqCst);
    }
}

#[derive(Clone)]
pub struct SimulationSession {
    inner: Arc<SessionInner>,
}

impl SimulationSession {
    pub fn open(simulation: Simulation, parts: SessionParts, config: &SimflowConfig) -> Self {
        info!(
            simulation_id = simulation.id.as_str(),
            parameters = simulation.parameters.len(),
            "opening simulation session"
        );

        let controller = ExecutionController::new(
            parts.service,
            parts.sleeper,
            config.polling,
            parts.clock.clone(),
        );
        let state = SessionState {
            params: ParameterStore::from_defaults(&simulation),
            history: RunHistory::with_capacity(config.session.history_capacity),
            undo: UndoLog::new(config.session.undo_capacity, config.session.undo_notice()),
            last_result: None,
            simulation,
        };

        Self {
            inner: Arc::new(SessionInner {
                state: Mutex::new(state),
                controller,
                repository: parts.repository,
                clock: parts.clock,
                run_options: RunOptions {
                    background_allowed: config.service.background_allowed,
                },
                executing: AtomicBool::new(false),
                in_flight: Mutex::new(None),
                closed: AtomicBool::new(false),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, SessionState> {
        self.inner.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn simulation(&self) -> Simulation {
        self.state().simulation.clone()
    }

    // ----- parameters -----

    pub fn parameters(&self) -> ParameterValues {
        self.state().params.snapshot()
    }

    /// Write a patch as-is. Last writer wins.
    pub fn apply(&self, patch: ParameterPatch) {
        self.state().params.apply(patch);
    }

    /// Set one parameter after checking it against its control.
    pub fn set_parameter(&self, parameter_id: &str, value: &Value) -> AppResult<Value> {
        let mut state = self.state();
        let def = state
            .simulation
            .parameter(parameter_id)
            .ok_or_else(|| AppError::ParameterNotFound(parameter_id.to_string()))?;
        let value = check_value(def, value, BoundsPolicy::Reject)?;

        let mut patch = ParameterValues::new();
        patch.insert(parameter_id.to_string(), value.clone());
        state.params.apply(ParameterPatch::Merge(patch));
        Ok(value)
    }

    pub fn reset_parameters(&self) {
        let mut state = self.state();
        let defaults = state.simulation.default_values();
        state.params.apply(ParameterPatch::Replace(defaults));
    }

    // ----- execution -----

    pub fn is_executing(&self) -> bool {
        self.inner.executing.load(Ordering::SeqCst)
    }

    pub fn last_result(&self) -> Option<NormalizedResult> {
        self.state().last_result.clone()
    }

    pub fn execute(&self) -> AppResult<RunOutcome> {
        self.execute_with_progress(None)
    }

    /// Execute with the current parameters.
    ///
    /// Returns [`RunOutcome::Skipped`] when another execution is in flight.
    /// On failure nothing is recorded and the last result is kept.
    pub fn execute_with_progress(
        &self,
        mut progress_cb: Option<&mut dyn FnMut(RunProgressEvent)>,
    ) -> AppResult<RunOutcome> {
        if self.inner.closed.load(Ordering::SeqCst) {
            return Err(AppError::SessionClosed);
        }
        let Some(_guard) = ExecutionGuard::acquire(&self.inner) else {
            debug!("execution already in flight; ignoring trigger");
            return Ok(RunOutcome::Skipped);
        };

        let cancel = CancelToken::new();
        *self.inner.in_flight.lock().unwrap_or_else(|e| e.into_inner()) = Some(cancel.clone());
        if self.inner.closed.load(Ordering::SeqCst) {
            cancel.cancel();
        }

        let (simulation, parameter_values) = {
            let state = self.state();
            (state.simulation.clone(), state.params.snapshot())
        };
        let request = RunRequest {
            simulation: &simulation,
            parameter_values: &parameter_values,
            options: self.inner.run_options,
        };

        let started = self.inner.clock.now();
        let response = {
            let mut forward = |event: RunProgressEvent| {
                if let Some(cb) = progress_cb.as_deref_mut() {
                    cb(event);
                }
            };
            self.inner
                .controller
                .execute_with_progress(&request, &cancel, Some(&mut forward))?
        };

        // A synchronous answer can land after teardown.
        if self.inner.closed.load(Ordering::SeqCst) {
            info!(
                run_id = response.run.id.as_str(),
                "session closed during execution; discarding run"
            );
            return Err(AppError::SessionClosed);
        }

        let elapsed_s = || {
            self.inner
                .clock
                .now()
                .saturating_duration_since(started)
                .as_secs_f64()
        };
        if let Some(cb) = progress_cb.as_deref_mut() {
            cb(RunProgressEvent::stage(RunStage::Recording, elapsed_s(), None));
        }

        {
            let mut state = self.state();
            state.history.record(response.run.clone());
            state.last_result = Some(response.run.result.clone());
        }

        if let Some(cb) = progress_cb.as_deref_mut() {
            cb(RunProgressEvent::stage(
                RunStage::Completed,
                elapsed_s(),
                Some(format!("Run {} recorded", response.run.id)),
            ));
        }

        Ok(RunOutcome::Completed(response))
    }

    /// Cancel any in-flight execution and refuse new ones.
    ///
    /// A background execution being polled is also cancelled on the service,
    /// best effort. A synchronous answer arriving afterwards is discarded.
    pub fn teardown(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
        let in_flight = self.inner.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(cancel) = in_flight.as_ref() {
            info!("cancelling in-flight execution on teardown");
            cancel.cancel();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    // ----- history -----

    /// Runs, most recent first.
    pub fn history(&self) -> Vec<Run> {
        self.state().history.list().cloned().collect()
    }

    pub fn run(&self, run_id: &str) -> AppResult<Run> {
        Ok(self.state().history.get(run_id)?.clone())
    }

    /// Restore a run's parameter snapshot id by id.
    ///
    /// Live parameters missing from the snapshot keep their value; snapshot
    /// ids the simulation no longer defines are ignored.
    pub fn restore_run(&self, run_id: &str) -> AppResult<ParameterValues> {
        let mut state = self.state();
        let snapshot = state.history.get(run_id)?.parameter_values.clone();
        let patch = restore_patch(&state.simulation, &snapshot);
        state.params.apply(patch);
        Ok(state.params.snapshot())
    }

    pub fn clear_history(&self) {
        self.state().history.clear();
    }

    /// Numeric series of a result field across history, oldest first.
    pub fn field_series(&self, field: &str) -> AppResult<Vec<(DateTime<Utc>, f64)>> {
        let state = self.state();
        query::field_series(state.history.list(), field)
    }

    // ----- scenarios -----

    pub fn scenarios(&self) -> Vec<ScenarioDef> {
        self.state().simulation.scenarios.clone()
    }

    /// Save the live parameters as a named scenario.
    pub fn save_scenario(&self, name: &str, description: Option<String>) -> AppResult<ScenarioDef> {
        let mut state = self.state();
        let values = state.params.snapshot();
        ScenarioStore::new(&mut state.simulation, self.inner.repository.as_ref())
            .save(name, description, &values)
    }

    /// Replace the live parameters with a scenario's values.
    pub fn load_scenario(&self, scenario_id: &str) -> AppResult<ParameterValues> {
        let mut state = self.state();
        let patch =
            ScenarioStore::new(&mut state.simulation, self.inner.repository.as_ref()).load(scenario_id)?;
        state.params.apply(patch);
        Ok(state.params.snapshot())
    }

    /// Delete a scenario; undoable.
    pub fn delete_scenario(&self, scenario_id: &str) -> AppResult<ScenarioDef> {
        let now = self.inner.clock.now();
        let mut state = self.state();
        let removed = ScenarioStore::new(&mut state.simulation, self.inner.repository.as_ref())
            .delete(scenario_id)?;
        state.undo.record(
            UndoEntry::ScenarioDeleted {
                scenario: removed.clone(),
            },
            now,
        );
        Ok(removed)
    }

    // ----- visualizations and undo -----

    /// Remove a visualization; undoable.
    pub fn remove_visualization(&self, visualization_id: &str) -> AppResult<VisualizationDef> {
        let now = self.inner.clock.now();
        let mut state = self.state();
        let index = state
            .simulation
            .visualizations
            .iter()
            .position(|v| v.id == visualization_id)
            .ok_or_else(|| AppError::VisualizationNotFound(visualization_id.to_string()))?;

        let removed = state.simulation.visualizations.remove(index);
        if let Err(e) = self.write_back(&mut state.simulation) {
            state.simulation.visualizations.insert(index, removed);
            return Err(e);
        }

        state.undo.record(
            UndoEntry::VisualizationRemoved {
                visualization: removed.clone(),
            },
            now,
        );
        Ok(removed)
    }

    /// Revert the most recent destructive edit. `Ok(None)` when there is
    /// nothing to undo.
    pub fn undo(&self) -> AppResult<Option<UndoEntry>> {
        let now = self.inner.clock.now();
        let mut state = self.state();
        let Some(entry) = state.undo.pop() else {
            return Ok(None);
        };

        let result = match &entry {
            UndoEntry::VisualizationRemoved { visualization } => {
                if state.simulation.visualization(&visualization.id).is_some() {
                    Err(AppError::InvalidInput(format!(
                        "visualization '{}' already exists",
                        visualization.id
                    )))
                } else {
                    state.simulation.visualizations.push(visualization.clone());
                    let written = self.write_back(&mut state.simulation);
                    if written.is_err() {
                        state.simulation.visualizations.pop();
                    }
                    written
                }
            }
            UndoEntry::ScenarioDeleted { scenario } => {
                ScenarioStore::new(&mut state.simulation, self.inner.repository.as_ref())
                    .restore(scenario.clone())
            }
        };

        match result {
            Ok(()) => {
                info!(entry = entry.describe().as_str(), "undone");
                Ok(Some(entry))
            }
            Err(e) => {
                state.undo.record(entry, now);
                Err(e)
            }
        }
    }

    pub fn undo_notice(&self) -> Option<UndoNotice> {
        let now = self.inner.clock.now();
        self.state().undo.notice(now).cloned()
    }

    pub fn dismiss_undo_notice(&self) {
        self.state().undo.dismiss_notice();
    }

    pub fn undo_depth(&self) -> usize {
        self.state().undo.len()
    }

    fn write_back(&self, simulation: &mut Simulation) -> AppResult<()> {
        let previous = simulation.updated_at.replace(Utc::now().to_rfc3339());
        let result = persist(self.inner.repository.as_ref(), simulation);
        if let Err(e) = &result {
            warn!(simulation_id = simulation.id.as_str(), error = %e, "failed to persist simulation");
            simulation.updated_at = previous;
        }
        result
    }

    // ----- chat -----

    pub fn chat_request(&self, query: &str) -> ChatRequest {
        let state = self.state();
        ChatRequest::new(
            query,
            &state.simulation,
            state.params.snapshot(),
            state.last_result.clone(),
        )
    }

    /// Apply the action carried by an assistant response, if any.
    pub fn apply_chat_response(&self, response: &ChatResponse) -> AppResult<ChatOutcome> {
        match &response.action {
            None => Ok(ChatOutcome::NoAction),
            Some(ChatAction::SetParameter { parameter, value }) => {
                let mut state = self.state();
                let (id, value) = resolve_set_parameter(&state.simulation, parameter, value)?;
                let mut patch = ParameterValues::new();
                patch.insert(id.clone(), value.clone());
                state.params.apply(ParameterPatch::Merge(patch));
                debug!(parameter = id.as_str(), value = %value, "parameter set from chat");
                Ok(ChatOutcome::ParameterSet {
                    parameter: id,
                    value,
                })
            }
            Some(ChatAction::RunSimulation) => Ok(ChatOutcome::Executed(self.execute()?)),
        }
    }
}
