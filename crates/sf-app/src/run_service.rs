//! Execution controller: parameters in, normalized result out.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde_json::Value;
use sf_core::{Clock, NodeId, ParameterValues, timing::elapsed_ms};
use sf_exec::{
    CancelToken, ExecutionRequest, ExecutionService, PollCheck, PollConfig, PollOutcome, Poller,
    Sleeper, TriggerResponse, normalize_with_report,
};
use sf_project::Simulation;
use sf_results::{ExecutionMode, Run, compute_run_id};
use tracing::{info, warn};

use crate::error::{AppError, AppResult};
use crate::progress::{PollProgress, RunProgressEvent, RunStage};

/// Options for a single execution.
#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    /// Let the service answer with a background job.
    pub background_allowed: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            background_allowed: true,
        }
    }
}

/// Request to execute a simulation with a parameter snapshot.
pub struct RunRequest<'a> {
    pub simulation: &'a Simulation,
    pub parameter_values: &'a ParameterValues,
    pub options: RunOptions,
}

/// Successful execution.
#[derive(Debug, Clone)]
pub struct RunResponse {
    pub run: Run,
    /// Status checks spent polling; zero for synchronous answers.
    pub status_checks: u32,
    /// Output fields written by more than one node.
    pub collisions: Vec<String>,
}

/// What a session did with an execution trigger.
#[derive(Debug, Clone)]
pub enum RunOutcome {
    Completed(RunResponse),
    /// Another execution was already in flight; nothing happened.
    Skipped,
}

impl RunOutcome {
    pub fn response(&self) -> Option<&RunResponse> {
        match self {
            Self::Completed(response) => Some(response),
            Self::Skipped => None,
        }
    }
}

fn emit_progress(
    progress_cb: &mut Option<&mut dyn FnMut(RunProgressEvent)>,
    stage: RunStage,
    elapsed_wall_s: f64,
    message: Option<String>,
    poll: Option<PollProgress>,
) {
    if let Some(cb) = progress_cb.as_deref_mut() {
        cb(RunProgressEvent {
            stage,
            elapsed_wall_s,
            message,
            poll,
        });
    }
}

/// Inputs addressed by each parameter's bound node id.
///
/// Parameters without a live value contribute their default. When two
/// parameters share a node the later definition wins.
pub fn build_inputs(
    simulation: &Simulation,
    parameter_values: &ParameterValues,
) -> BTreeMap<NodeId, Value> {
    let mut inputs = BTreeMap::new();
    for parameter in &simulation.parameters {
        let value = parameter_values
            .get(&parameter.id)
            .unwrap_or(&parameter.default_value)
            .clone();
        if inputs
            .insert(parameter.bound_node_id.clone(), value)
            .is_some()
        {
            warn!(
                node_id = parameter.bound_node_id.as_str(),
                parameter = parameter.id.as_str(),
                "several parameters bound to one node; keeping the last"
            );
        }
    }
    inputs
}

/// Orchestrates one execution against an [`ExecutionService`].
///
/// Owns no session state: the caller decides what to do with the [`Run`].
#[derive(Clone)]
pub struct ExecutionController {
    service: Arc<dyn ExecutionService>,
    poller: Poller,
    clock: Arc<dyn Clock>,
}

impl ExecutionController {
    pub fn new(
        service: Arc<dyn ExecutionService>,
        sleeper: Arc<dyn Sleeper>,
        poll_config: PollConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let poller = Poller::new(service.clone(), sleeper, poll_config);
        Self {
            service,
            poller,
            clock,
        }
    }

    pub fn service(&self) -> &Arc<dyn ExecutionService> {
        &self.service
    }

    pub fn poll_config(&self) -> PollConfig {
        self.poller.config()
    }

    pub fn execute(&self, request: &RunRequest, cancel: &CancelToken) -> AppResult<RunResponse> {
        self.execute_with_progress(request, cancel, None)
    }

    /// Execute and stream progress events.
    pub fn execute_with_progress(
        &self,
        request: &RunRequest,
        cancel: &CancelToken,
        mut progress_cb: Option<&mut dyn FnMut(RunProgressEvent)>,
    ) -> AppResult<RunResponse> {
        let started = self.clock.now();
        let simulation = request.simulation;

        emit_progress(
            &mut progress_cb,
            RunStage::BuildingInputs,
            self.elapsed_s(started),
            Some("Building workflow inputs".to_string()),
            None,
        );
        let inputs = build_inputs(simulation, request.parameter_values);

        let exec_request = ExecutionRequest {
            workflow_id: simulation.workflow_id.clone(),
            inputs,
            background_allowed: request.options.background_allowed,
        };

        emit_progress(
            &mut progress_cb,
            RunStage::Submitting,
            self.elapsed_s(started),
            Some("Submitting execution".to_string()),
            None,
        );
        info!(
            simulation_id = simulation.id.as_str(),
            workflow_id = simulation.workflow_id.as_str(),
            background_allowed = request.options.background_allowed,
            "starting execution"
        );

        let trigger = self.service.trigger(&exec_request).map_err(|e| {
            warn!(simulation_id = simulation.id.as_str(), error = %e, "execution trigger failed");
            AppError::from(e)
        })?;

        let (raw, mode, execution_id, status_checks) = match trigger {
            TriggerResponse::Immediate(raw) => (raw, ExecutionMode::Sync, None, 0),
            TriggerResponse::Background { execution_id } => {
                let (raw, checks) =
                    self.await_background(&execution_id, cancel, started, &mut progress_cb)?;
                (raw, ExecutionMode::Background, Some(execution_id), checks)
            }
        };

        emit_progress(
            &mut progress_cb,
            RunStage::Normalizing,
            self.elapsed_s(started),
            Some("Normalizing result".to_string()),
            None,
        );
        let report = normalize_with_report(raw);

        let executed_at = Utc::now();
        let run = Run {
            id: compute_run_id(&simulation.id, request.parameter_values, &executed_at),
            simulation_id: simulation.id.clone(),
            parameter_values: request.parameter_values.clone(),
            result: report.result,
            executed_at,
            duration_ms: elapsed_ms(self.clock.as_ref(), started),
            mode,
            execution_id,
        };

        info!(
            simulation_id = simulation.id.as_str(),
            run_id = run.id.as_str(),
            duration_ms = run.duration_ms,
            status_checks,
            "execution succeeded"
        );

        Ok(RunResponse {
            run,
            status_checks,
            collisions: report.collisions,
        })
    }

    fn await_background(
        &self,
        execution_id: &str,
        cancel: &CancelToken,
        started: Instant,
        progress_cb: &mut Option<&mut dyn FnMut(RunProgressEvent)>,
    ) -> AppResult<(Value, u32)> {
        emit_progress(
            progress_cb,
            RunStage::Polling,
            self.elapsed_s(started),
            Some(format!("Waiting for background execution {}", execution_id)),
            None,
        );

        let outcome = self.poller.poll(execution_id, cancel, &mut |check: &PollCheck| {
            emit_progress(
                progress_cb,
                RunStage::Polling,
                self.elapsed_s(started),
                None,
                Some(PollProgress {
                    attempt: check.attempt,
                    max_attempts: check.max_attempts,
                    status: check.status,
                    nodes: check.progress.clone(),
                }),
            );
        })?;

        match outcome {
            PollOutcome::Completed { result, attempts } => Ok((result, attempts)),
            PollOutcome::Failed { status, error, .. } => Err(AppError::ExecutionFailed {
                execution_id: execution_id.to_string(),
                status,
                error,
            }),
            PollOutcome::TimedOut { attempts } => Err(AppError::ExecutionTimedOut {
                execution_id: execution_id.to_string(),
                attempts,
            }),
            PollOutcome::Cancelled { .. } => {
                if let Err(e) = self.service.cancel(execution_id) {
                    warn!(execution_id, error = %e, "could not cancel remote execution");
                }
                Err(AppError::ExecutionCancelled {
                    execution_id: execution_id.to_string(),
                })
            }
        }
    }

    fn elapsed_s(&self, started: Instant) -> f64 {
        self.clock
            .now()
            .saturating_duration_since(started)
            .as_secs_f64()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use sf_project::demo_simulation;

    #[test]
    fn inputs_are_keyed_by_bound_node() {
        let simulation = demo_simulation();
        let mut values = simulation.default_values();
        values.insert("price".to_string(), json!(120));

        let inputs = build_inputs(&simulation, &values);
        assert_eq!(inputs["input-price"], json!(120));
        assert_eq!(inputs["input-cost-ratio"], json!(35));
        assert!(!inputs.contains_key("price"));
    }

    #[test]
    fn missing_values_fall_back_to_defaults() {
        let simulation = demo_simulation();
        let inputs = build_inputs(&simulation, &ParameterValues::new());
        assert_eq!(inputs.len(), 4);
        assert_eq!(inputs["input-volume"], json!(1000));
    }

    #[test]
    fn shared_node_keeps_last_parameter() {
        let mut simulation = demo_simulation();
        simulation.parameters[1].bound_node_id = "input-price".to_string();
        let inputs = build_inputs(&simulation, &simulation.default_values());
        assert_eq!(inputs["input-price"], json!(1000));
    }
}
