//! Error types for the sf-app service layer.

use std::path::PathBuf;

use sf_exec::ExecutionStatus;

/// Application error type that wraps errors from the backend crates and
/// gives CLI and embedding hosts one error surface.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Simulation error: {0}")]
    Project(String),

    #[error("Failed to read config file: {path}")]
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Simulation not found: {0}")]
    SimulationNotFound(String),

    #[error("Parameter not found: {0}")]
    ParameterNotFound(String),

    #[error("Invalid value for parameter '{parameter}': {reason}")]
    InvalidParameterValue { parameter: String, reason: String },

    #[error("Scenario not found: {0}")]
    ScenarioNotFound(String),

    #[error("Visualization not found: {0}")]
    VisualizationNotFound(String),

    #[error("Run not found: {0}")]
    RunNotFound(String),

    #[error("Execution service error: {0}")]
    Execution(#[from] sf_exec::ExecError),

    #[error("Execution {execution_id} ended with status {status}: {}", .error.as_deref().unwrap_or("no error reported"))]
    ExecutionFailed {
        execution_id: String,
        status: ExecutionStatus,
        error: Option<String>,
    },

    #[error("Execution {execution_id} did not finish after {attempts} status checks; outcome unknown")]
    ExecutionTimedOut { execution_id: String, attempts: u32 },

    #[error("Execution {execution_id} was cancelled locally")]
    ExecutionCancelled { execution_id: String },

    #[error("Session has been torn down")]
    SessionClosed,

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for sf-app operations.
pub type AppResult<T> = Result<T, AppError>;

// Conversions from backend error types
impl From<sf_project::ProjectError> for AppError {
    fn from(err: sf_project::ProjectError) -> Self {
        AppError::Project(err.to_string())
    }
}

impl From<sf_project::ValidationError> for AppError {
    fn from(err: sf_project::ValidationError) -> Self {
        AppError::Project(err.to_string())
    }
}

impl From<sf_results::ResultsError> for AppError {
    fn from(err: sf_results::ResultsError) -> Self {
        match err {
            sf_results::ResultsError::RunNotFound { run_id } => AppError::RunNotFound(run_id),
        }
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::Persistence(err.to_string())
    }
}
