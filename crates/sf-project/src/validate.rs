//! Simulation validation logic.

use crate::schema::{ControlKind, ParameterDef, Simulation};
use serde_json::Value;
use sf_core::ValueKind;
use std::collections::HashSet;

#[derive(thiserror::Error, Debug)]
pub enum ValidationError {
    #[error("Duplicate ID: {id} in {context}")]
    DuplicateId { id: String, context: String },

    #[error("Missing field: {field} in {context}")]
    MissingField { field: String, context: String },

    #[error("Invalid value: {field} = {value} ({reason})")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Unsupported version: {version}")]
    UnsupportedVersion { version: u32 },
}

pub fn validate_simulation(simulation: &Simulation) -> Result<(), ValidationError> {
    if simulation.version > crate::migrate::LATEST_VERSION {
        return Err(ValidationError::UnsupportedVersion {
            version: simulation.version,
        });
    }

    if simulation.id.trim().is_empty() {
        return Err(ValidationError::MissingField {
            field: "id".to_string(),
            context: "simulation".to_string(),
        });
    }

    if simulation.workflow_id.trim().is_empty() {
        return Err(ValidationError::MissingField {
            field: "workflowId".to_string(),
            context: format!("simulation '{}'", simulation.id),
        });
    }

    let mut parameter_ids = HashSet::new();
    for parameter in &simulation.parameters {
        if !parameter_ids.insert(&parameter.id) {
            return Err(ValidationError::DuplicateId {
                id: parameter.id.clone(),
                context: format!("simulation '{}' parameters", simulation.name),
            });
        }
        validate_parameter(parameter)?;
    }

    let mut visualization_ids = HashSet::new();
    for visualization in &simulation.visualizations {
        if !visualization_ids.insert(&visualization.id) {
            return Err(ValidationError::DuplicateId {
                id: visualization.id.clone(),
                context: format!("simulation '{}' visualizations", simulation.name),
            });
        }
        if visualization.fields.is_empty() {
            return Err(ValidationError::MissingField {
                field: "fields".to_string(),
                context: format!("visualization '{}'", visualization.id),
            });
        }
    }

    let mut scenario_ids = HashSet::new();
    for scenario in &simulation.scenarios {
        if !scenario_ids.insert(&scenario.id) {
            return Err(ValidationError::DuplicateId {
                id: scenario.id.clone(),
                context: format!("simulation '{}' scenarios", simulation.name),
            });
        }
    }

    Ok(())
}

fn validate_parameter(parameter: &ParameterDef) -> Result<(), ValidationError> {
    if parameter.bound_node_id.trim().is_empty() {
        return Err(ValidationError::MissingField {
            field: "boundNodeId".to_string(),
            context: format!("parameter '{}'", parameter.id),
        });
    }

    match &parameter.control {
        ControlKind::Slider { min, max, step } => {
            if !(min.is_finite() && max.is_finite()) || min > max {
                return Err(invalid(
                    parameter,
                    "control.min/max",
                    format!("{}..{}", min, max),
                    "slider range must be finite with min <= max",
                ));
            }
            if !(*step > 0.0) {
                return Err(invalid(
                    parameter,
                    "control.step",
                    step.to_string(),
                    "slider step must be positive",
                ));
            }
        }
        ControlKind::Number {
            min: Some(min),
            max: Some(max),
        } if min > max => {
            return Err(invalid(
                parameter,
                "control.min/max",
                format!("{}..{}", min, max),
                "min must not exceed max",
            ));
        }
        ControlKind::Select { options } if options.is_empty() => {
            return Err(invalid(
                parameter,
                "control.options",
                "[]".to_string(),
                "select needs at least one option",
            ));
        }
        _ => {}
    }

    check_default_matches_control(parameter)
}

fn check_default_matches_control(parameter: &ParameterDef) -> Result<(), ValidationError> {
    let default = &parameter.default_value;
    let found = ValueKind::of(default);

    let expected = match &parameter.control {
        ControlKind::Slider { .. } | ControlKind::Number { .. } => ValueKind::Number,
        ControlKind::Toggle => ValueKind::Bool,
        ControlKind::Select { .. } | ControlKind::Text => ValueKind::String,
    };

    if found != expected {
        return Err(invalid(
            parameter,
            "defaultValue",
            default.to_string(),
            &format!(
                "{} control expects a {} default, found {}",
                parameter.control.label(),
                expected.as_str(),
                found.as_str()
            ),
        ));
    }

    if let (ControlKind::Select { options }, Value::String(choice)) = (&parameter.control, default)
        && !options.contains(choice)
    {
        return Err(invalid(
            parameter,
            "defaultValue",
            choice.clone(),
            "default is not one of the select options",
        ));
    }

    if let (ControlKind::Slider { min, max, .. }, Some(number)) =
        (&parameter.control, default.as_f64())
        && (number < *min || number > *max)
    {
        return Err(invalid(
            parameter,
            "defaultValue",
            number.to_string(),
            "default lies outside the slider range",
        ));
    }

    Ok(())
}

fn invalid(parameter: &ParameterDef, field: &str, value: String, reason: &str) -> ValidationError {
    ValidationError::InvalidValue {
        field: format!("parameter '{}' {}", parameter.id, field),
        value,
        reason: reason.to_string(),
    }
}
