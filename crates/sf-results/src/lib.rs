//! sf-results: run records and session run history.

pub mod hash;
pub mod history;
pub mod types;

pub use hash::compute_run_id;
pub use history::{HISTORY_CAPACITY, RunHistory};
pub use types::*;

pub type ResultsResult<T> = Result<T, ResultsError>;

#[derive(thiserror::Error, Debug)]
pub enum ResultsError {
    #[error("Run not found: {run_id}")]
    RunNotFound { run_id: String },
}
