//! Bounded fixed-interval status polling for background executions.
//!
//! The loop is an explicit state machine:
//!
//! ```text
//! Idle -> Polling(attempt) -> Done(result) | Failed | TimedOut | Cancelled
//! ```
//!
//! [`PollMachine`] holds the transitions; [`Poller`] drives it against an
//! [`ExecutionService`] and a [`Sleeper`].

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sf_core::ExecutionId;
use tracing::{debug, info, warn};

use crate::cancel::{CancelToken, Sleeper};
use crate::error::{ExecError, ExecResult};
use crate::protocol::{ExecutionProgress, ExecutionStatus, StatusResponse};
use crate::service::ExecutionService;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 60;
pub const DEFAULT_INTERVAL_MS: u64 = 2000;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PollConfig {
    pub max_attempts: u32,
    pub interval_ms: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            interval_ms: DEFAULT_INTERVAL_MS,
        }
    }
}

impl PollConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PollState {
    Idle,
    Polling {
        attempt: u32,
    },
    Done(Value),
    Failed {
        status: ExecutionStatus,
        error: Option<String>,
    },
    TimedOut {
        attempts: u32,
    },
    Cancelled {
        attempts: u32,
    },
}

/// Terminal result of a poll loop.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    Completed { result: Value, attempts: u32 },
    Failed {
        status: ExecutionStatus,
        error: Option<String>,
        attempts: u32,
    },
    TimedOut { attempts: u32 },
    Cancelled { attempts: u32 },
}

impl PollOutcome {
    /// Raw result of a completed execution, `None` for every other outcome.
    pub fn into_result(self) -> Option<Value> {
        match self {
            Self::Completed { result, .. } => Some(result),
            _ => None,
        }
    }

    /// Number of status checks performed.
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Completed { attempts, .. }
            | Self::Failed { attempts, .. }
            | Self::TimedOut { attempts }
            | Self::Cancelled { attempts } => *attempts,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PollMachine {
    max_attempts: u32,
    attempts: u32,
    state: PollState,
}

impl PollMachine {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            attempts: 0,
            state: PollState::Idle,
        }
    }

    pub fn state(&self) -> &PollState {
        &self.state
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn is_finished(&self) -> bool {
        !matches!(self.state, PollState::Idle | PollState::Polling { .. })
    }

    /// Idle -> Polling. A zero budget times out straight away.
    pub fn start(&mut self) -> Option<PollOutcome> {
        if !matches!(self.state, PollState::Idle) {
            return None;
        }
        if self.max_attempts == 0 {
            self.state = PollState::TimedOut { attempts: 0 };
            return Some(PollOutcome::TimedOut { attempts: 0 });
        }
        self.state = PollState::Polling { attempt: 0 };
        None
    }

    /// Feed one status check. Returns the outcome once a terminal state is reached.
    ///
    /// A failed check counts against the budget but is otherwise treated as
    /// "still running".
    pub fn observe(&mut self, check: ExecResult<StatusResponse>) -> Option<PollOutcome> {
        if !matches!(self.state, PollState::Polling { .. }) {
            return None;
        }
        self.attempts += 1;
        let attempts = self.attempts;

        if let Ok(response) = check {
            match response.status {
                ExecutionStatus::Completed => {
                    let result = response.into_result();
                    self.state = PollState::Done(result.clone());
                    return Some(PollOutcome::Completed { result, attempts });
                }
                status @ (ExecutionStatus::Failed | ExecutionStatus::Cancelled) => {
                    let error = response.error;
                    self.state = PollState::Failed {
                        status,
                        error: error.clone(),
                    };
                    return Some(PollOutcome::Failed {
                        status,
                        error,
                        attempts,
                    });
                }
                ExecutionStatus::Pending | ExecutionStatus::Running | ExecutionStatus::Unknown => {}
            }
        }

        if attempts >= self.max_attempts {
            self.state = PollState::TimedOut { attempts };
            return Some(PollOutcome::TimedOut { attempts });
        }
        self.state = PollState::Polling { attempt: attempts };
        None
    }

    /// Any non-terminal state -> Cancelled.
    pub fn cancel(&mut self) -> PollOutcome {
        let attempts = self.attempts;
        if !self.is_finished() {
            self.state = PollState::Cancelled { attempts };
        }
        PollOutcome::Cancelled { attempts }
    }
}

/// Observation passed to the progress callback after each status check.
#[derive(Debug, Clone)]
pub struct PollCheck {
    pub attempt: u32,
    pub max_attempts: u32,
    /// `None` when the check itself failed.
    pub status: Option<ExecutionStatus>,
    pub progress: Option<ExecutionProgress>,
}

/// Drives [`PollMachine`] against a service. Clones share the set of
/// execution ids currently being polled.
#[derive(Clone)]
pub struct Poller {
    service: Arc<dyn ExecutionService>,
    sleeper: Arc<dyn Sleeper>,
    config: PollConfig,
    active: Arc<Mutex<HashSet<ExecutionId>>>,
}

struct ActivePoll<'a> {
    active: &'a Mutex<HashSet<ExecutionId>>,
    execution_id: ExecutionId,
}

impl Drop for ActivePoll<'_> {
    fn drop(&mut self) {
        let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        active.remove(&self.execution_id);
    }
}

impl Poller {
    pub fn new(
        service: Arc<dyn ExecutionService>,
        sleeper: Arc<dyn Sleeper>,
        config: PollConfig,
    ) -> Self {
        Self {
            service,
            sleeper,
            config,
            active: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn config(&self) -> PollConfig {
        self.config
    }

    pub fn is_polling(&self, execution_id: &str) -> bool {
        let active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        active.contains(execution_id)
    }

    fn claim(&self, execution_id: &str) -> ExecResult<ActivePoll<'_>> {
        let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        if !active.insert(execution_id.to_string()) {
            return Err(ExecError::PollAlreadyActive(execution_id.to_string()));
        }
        Ok(ActivePoll {
            active: &self.active,
            execution_id: execution_id.to_string(),
        })
    }

    /// Poll until the execution reaches a terminal state, the budget runs out,
    /// or `cancel` fires.
    ///
    /// Errors only when another loop is already polling `execution_id`.
    pub fn poll(
        &self,
        execution_id: &str,
        cancel: &CancelToken,
        on_check: &mut dyn FnMut(&PollCheck),
    ) -> ExecResult<PollOutcome> {
        let _claim = self.claim(execution_id)?;
        let mut machine = PollMachine::new(self.config.max_attempts);

        if let Some(outcome) = machine.start() {
            warn!(execution_id, "poll budget is zero; giving up without checking");
            return Ok(outcome);
        }

        loop {
            if !self.sleeper.sleep(self.config.interval(), cancel) || cancel.is_cancelled() {
                let outcome = machine.cancel();
                info!(execution_id, attempts = outcome.attempts(), "polling cancelled");
                return Ok(outcome);
            }

            let check = self.service.status(execution_id);
            let (status, progress) = match &check {
                Ok(response) => (Some(response.status), response.progress.clone()),
                Err(err) => {
                    warn!(
                        execution_id,
                        attempt = machine.attempts() + 1,
                        transport = err.is_transport(),
                        error = %err,
                        "status check failed; treating execution as still running"
                    );
                    (None, None)
                }
            };
            on_check(&PollCheck {
                attempt: machine.attempts() + 1,
                max_attempts: self.config.max_attempts,
                status,
                progress,
            });

            if let Some(outcome) = machine.observe(check) {
                log_outcome(execution_id, &outcome);
                return Ok(outcome);
            }
            debug!(
                execution_id,
                attempt = machine.attempts(),
                status = status.map(ExecutionStatus::as_str).unwrap_or("check-failed"),
                "execution still in progress"
            );
        }
    }
}

fn log_outcome(execution_id: &str, outcome: &PollOutcome) {
    match outcome {
        PollOutcome::Completed { attempts, .. } => {
            info!(execution_id, attempts, "background execution completed");
        }
        PollOutcome::Failed {
            status,
            error,
            attempts,
        } => {
            warn!(
                execution_id,
                attempts,
                status = status.as_str(),
                error = error.as_deref().unwrap_or(""),
                "background execution ended without a result"
            );
        }
        PollOutcome::TimedOut { attempts } => {
            warn!(
                execution_id,
                attempts, "polling timed out; execution outcome unknown"
            );
        }
        PollOutcome::Cancelled { attempts } => {
            info!(execution_id, attempts, "polling cancelled");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn status(value: Value) -> ExecResult<StatusResponse> {
        Ok(StatusResponse::from_value(value))
    }

    #[test]
    fn machine_walks_to_done() {
        let mut machine = PollMachine::new(5);
        assert_eq!(machine.state(), &PollState::Idle);
        assert!(machine.start().is_none());

        assert!(machine.observe(status(json!({"status": "pending"}))).is_none());
        assert_eq!(machine.state(), &PollState::Polling { attempt: 1 });

        let outcome = machine
            .observe(status(json!({"status": "completed", "nodeResults": {"a": 1}})))
            .unwrap();
        assert_eq!(
            outcome,
            PollOutcome::Completed {
                result: json!({"a": 1}),
                attempts: 2
            }
        );
        assert_eq!(machine.state(), &PollState::Done(json!({"a": 1})));
        assert!(machine.is_finished());
    }

    #[test]
    fn machine_soft_fails_on_check_errors_until_budget() {
        let mut machine = PollMachine::new(2);
        machine.start();
        assert!(
            machine
                .observe(Err(ExecError::Transport("refused".to_string())))
                .is_none()
        );
        let outcome = machine
            .observe(Err(ExecError::Transport("refused".to_string())))
            .unwrap();
        assert_eq!(outcome, PollOutcome::TimedOut { attempts: 2 });
    }

    #[test]
    fn machine_zero_budget_times_out_on_start() {
        let mut machine = PollMachine::new(0);
        assert_eq!(machine.start(), Some(PollOutcome::TimedOut { attempts: 0 }));
    }

    #[test]
    fn cancel_after_finish_keeps_terminal_state() {
        let mut machine = PollMachine::new(3);
        machine.start();
        machine.observe(status(json!({"status": "failed", "error": "boom"})));
        machine.cancel();
        assert!(matches!(machine.state(), PollState::Failed { .. }));
    }

    #[test]
    fn observe_is_ignored_before_start() {
        let mut machine = PollMachine::new(3);
        assert!(machine.observe(status(json!({"status": "completed"}))).is_none());
        assert_eq!(machine.attempts(), 0);
    }
}
