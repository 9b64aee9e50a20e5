//! Simulation document loading, saving and introspection.

use std::path::Path;

use serde_json::Value;
use sf_project::{DEMO_SIMULATION_ID, Simulation, demo_simulation};

use crate::error::{AppError, AppResult};

/// Parameter row for listings.
#[derive(Debug, Clone)]
pub struct ParameterSummary {
    pub id: String,
    pub label: String,
    pub control: &'static str,
    pub bound_node_id: String,
    pub default_value: Value,
    pub bounds: (Option<f64>, Option<f64>),
    pub group: Option<String>,
    pub unit: Option<String>,
}

/// Load a simulation document. `.json` files are read as JSON, anything else as YAML.
pub fn load_simulation(path: &Path) -> AppResult<Simulation> {
    if !path.exists() {
        return Err(AppError::SimulationNotFound(path.display().to_string()));
    }
    Ok(sf_project::load_any(path)?)
}

/// Load `source` as a path, or the built-in demo when it names the demo id.
pub fn open_simulation(source: &str) -> AppResult<Simulation> {
    if source == DEMO_SIMULATION_ID {
        return Ok(demo_simulation());
    }
    load_simulation(Path::new(source))
}

pub fn save_simulation(path: &Path, simulation: &Simulation) -> AppResult<()> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => sf_project::save_json(path, simulation)?,
        _ => sf_project::save_yaml(path, simulation)?,
    }
    Ok(())
}

/// Parameters in display order.
pub fn list_parameters(simulation: &Simulation) -> Vec<ParameterSummary> {
    simulation
        .ordered_parameters()
        .into_iter()
        .map(|p| ParameterSummary {
            id: p.id.clone(),
            label: p.display_name().to_string(),
            control: p.control.label(),
            bound_node_id: p.bound_node_id.clone(),
            default_value: p.default_value.clone(),
            bounds: p.control.bounds(),
            group: p.group.clone(),
            unit: p.unit.clone(),
        })
        .collect()
}

/// Parse `id=value` assignments from the command line.
///
/// Values are read as JSON when possible (`42`, `true`, `"x"`), otherwise
/// kept as plain strings.
pub fn parse_assignment(raw: &str) -> AppResult<(String, Value)> {
    let (id, value) = raw
        .split_once('=')
        .ok_or_else(|| AppError::InvalidInput(format!("expected id=value, got '{}'", raw)))?;
    let id = id.trim();
    if id.is_empty() {
        return Err(AppError::InvalidInput(format!("missing parameter id in '{}'", raw)));
    }
    let value = value.trim();
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((id.to_string(), value))
}
