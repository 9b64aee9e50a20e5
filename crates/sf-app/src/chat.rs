//! Chat assistant contract.
//!
//! The assistant receives the live parameters, the last result and the user's
//! query, and may answer with at most one action.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sf_core::ParameterValues;
use sf_project::{ParameterDef, Simulation};
use tracing::warn;

use crate::error::{AppError, AppResult};
use crate::params::{BoundsPolicy, check_value};
use crate::run_service::RunOutcome;

/// Parameter description sent alongside the values so the assistant can
/// refer to parameters by name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatParameter {
    pub id: String,
    pub variable_name: String,
    pub label: String,
    pub control: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

impl From<&ParameterDef> for ChatParameter {
    fn from(def: &ParameterDef) -> Self {
        Self {
            id: def.id.clone(),
            variable_name: def.variable_name.clone(),
            label: def.display_name().to_string(),
            control: def.control.label().to_string(),
            unit: def.unit.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub query: String,
    pub parameters: ParameterValues,
    #[serde(default)]
    pub parameter_definitions: Vec<ChatParameter>,
    #[serde(default)]
    pub last_result: Option<Value>,
}

impl ChatRequest {
    pub fn new(
        query: impl Into<String>,
        simulation: &Simulation,
        parameters: ParameterValues,
        last_result: Option<Value>,
    ) -> Self {
        Self {
            query: query.into(),
            parameters,
            parameter_definitions: simulation
                .ordered_parameters()
                .into_iter()
                .map(ChatParameter::from)
                .collect(),
            last_result,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatAction {
    SetParameter { parameter: String, value: Value },
    RunSimulation,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChatResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<ChatAction>,
}

impl ChatResponse {
    /// Lenient parse: an unrecognised action is dropped, the message kept.
    pub fn from_value(payload: &Value) -> Self {
        let message = payload
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string);
        let action = match payload.get("action") {
            None | Some(Value::Null) => None,
            Some(raw) => match serde_json::from_value::<ChatAction>(raw.clone()) {
                Ok(action) => Some(action),
                Err(e) => {
                    warn!(action = %raw, error = %e, "ignoring unrecognised chat action");
                    None
                }
            },
        };
        Self { message, action }
    }
}

/// What applying a chat response did to the session.
#[derive(Debug, Clone)]
pub enum ChatOutcome {
    NoAction,
    ParameterSet { parameter: String, value: Value },
    Executed(RunOutcome),
}

/// Find the parameter a chat action refers to.
///
/// Exact id, then exact variable name, then case-insensitive match on id,
/// variable name or label.
pub fn resolve_parameter<'a>(simulation: &'a Simulation, name: &str) -> Option<&'a ParameterDef> {
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    let params = &simulation.parameters;
    params
        .iter()
        .find(|p| p.id == name)
        .or_else(|| params.iter().find(|p| p.variable_name == name))
        .or_else(|| {
            params.iter().find(|p| {
                p.id.eq_ignore_ascii_case(name)
                    || p.variable_name.eq_ignore_ascii_case(name)
                    || (!p.label.trim().is_empty() && p.label.eq_ignore_ascii_case(name))
            })
        })
}

/// Resolve and coerce a `set_parameter` action. Slider values are clamped.
pub fn resolve_set_parameter(
    simulation: &Simulation,
    parameter: &str,
    value: &Value,
) -> AppResult<(String, Value)> {
    let def = resolve_parameter(simulation, parameter)
        .ok_or_else(|| AppError::ParameterNotFound(parameter.to_string()))?;
    let value = check_value(def, value, BoundsPolicy::Clamp)?;
    Ok((def.id.clone(), value))
}
