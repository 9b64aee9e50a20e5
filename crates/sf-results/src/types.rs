//! Result data types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sf_core::{ExecutionId, ParameterValues, RunId, SimulationId};

/// Flat field -> value view of an execution's output.
pub type NormalizedResult = Value;

/// How the execution service answered.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    Sync,
    Background,
}

/// Record of one successful execution. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Run {
    pub id: RunId,
    pub simulation_id: SimulationId,
    pub parameter_values: ParameterValues,
    pub result: NormalizedResult,
    pub executed_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub mode: ExecutionMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_id: Option<ExecutionId>,
}

impl Run {
    /// Numeric value of a result field, if present.
    pub fn field_f64(&self, field: &str) -> Option<f64> {
        self.result.get(field).and_then(Value::as_f64)
    }
}
