//! sf-exec: workflow execution protocol, polling and result normalization.
//!
//! Contains:
//! - protocol (wire types for trigger/status/cancel)
//! - service (the [`ExecutionService`] seam) and an HTTP implementation
//! - cancel (cancellation token + interruptible sleeper)
//! - poller (bounded fixed-interval status polling state machine)
//! - normalize (per-node output flattening)

pub mod cancel;
pub mod error;
pub mod http;
pub mod normalize;
pub mod poller;
pub mod protocol;
pub mod service;

pub use cancel::{CancelToken, NoWaitSleeper, Sleeper, ThreadSleeper};
pub use error::{ExecError, ExecResult};
pub use http::HttpExecutionService;
pub use normalize::{NormalizeReport, normalize, normalize_with_report};
pub use poller::{PollCheck, PollConfig, PollMachine, PollOutcome, PollState, Poller};
pub use protocol::{
    ExecutionProgress, ExecutionRequest, ExecutionStatus, StatusResponse, TriggerResponse,
};
pub use service::ExecutionService;
