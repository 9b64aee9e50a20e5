//! Execution service abstraction.

use crate::error::ExecResult;
use crate::protocol::{ExecutionRequest, StatusResponse, TriggerResponse};

/// Remote (or in-process) workflow executor.
///
/// Implementations must be shareable across threads: a session triggers from
/// one thread and may cancel from another.
pub trait ExecutionService: Send + Sync {
    /// Start an execution. May answer synchronously or with a background job.
    fn trigger(&self, request: &ExecutionRequest) -> ExecResult<TriggerResponse>;

    /// Current status of a background execution.
    fn status(&self, execution_id: &str) -> ExecResult<StatusResponse>;

    /// Ask the service to stop a background execution.
    fn cancel(&self, execution_id: &str) -> ExecResult<()>;
}
