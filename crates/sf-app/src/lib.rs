//! Shared application service layer for simflow.
//!
//! Ties the execution protocol, parameter state, run history, scenarios and
//! undo together behind [`SimulationSession`], and gives the CLI (or any
//! other host) one error surface and one configuration type.

pub mod chat;
pub mod config;
pub mod demo;
pub mod error;
pub mod params;
pub mod progress;
pub mod project_service;
pub mod query;
pub mod repository;
pub mod run_service;
pub mod scenario_service;
pub mod session;
pub mod undo;

// Re-export key types for convenience
pub use chat::{ChatAction, ChatOutcome, ChatRequest, ChatResponse, resolve_parameter};
pub use config::{RepositoryConfig, ServiceConfig, SessionConfig, SimflowConfig};
pub use demo::{DemoBindings, DemoExecutionService, RevenueModel};
pub use error::{AppError, AppResult};
pub use params::{BoundsPolicy, ParameterPatch, ParameterStore};
pub use progress::{PollProgress, RunProgressEvent, RunStage};
pub use project_service::{
    ParameterSummary, list_parameters, load_simulation, open_simulation, parse_assignment,
    save_simulation,
};
pub use query::{VisualizationData, dashboard, field_series, list_fields};
pub use repository::{
    FileRepository, HttpRepository, MemoryRepository, SimulationRepository, SimulationSummary,
};
pub use run_service::{
    ExecutionController, RunOptions, RunOutcome, RunRequest, RunResponse, build_inputs,
};
pub use scenario_service::ScenarioStore;
pub use session::{SessionParts, SimulationSession};
pub use undo::{UndoEntry, UndoLog, UndoNotice, UndoStack};
