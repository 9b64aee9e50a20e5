//! Query helpers for reading normalized results and run history.

use chrono::{DateTime, Utc};
use serde_json::Value;
use sf_project::{Simulation, VisualizationDef, VisualizationKind};
use sf_results::{NormalizedResult, Run};

use crate::error::{AppError, AppResult};

/// Values a visualization reads from one result.
#[derive(Debug, Clone, PartialEq)]
pub struct VisualizationData {
    pub id: String,
    pub title: String,
    pub kind: VisualizationKind,
    /// One entry per configured field; `None` when the result lacks it.
    pub values: Vec<(String, Option<Value>)>,
}

/// List the top-level fields of a normalized result, sorted.
pub fn list_fields(result: &NormalizedResult) -> Vec<String> {
    match result {
        Value::Object(map) => {
            let mut fields: Vec<String> = map.keys().cloned().collect();
            fields.sort();
            fields
        }
        _ => Vec::new(),
    }
}

pub fn visualization_data(
    visualization: &VisualizationDef,
    result: &NormalizedResult,
) -> VisualizationData {
    VisualizationData {
        id: visualization.id.clone(),
        title: visualization.title.clone(),
        kind: visualization.kind,
        values: visualization
            .fields
            .iter()
            .map(|field| (field.clone(), result.get(field).cloned()))
            .collect(),
    }
}

/// Data for every visualization of `simulation`, in display order.
pub fn dashboard(simulation: &Simulation, result: &NormalizedResult) -> Vec<VisualizationData> {
    simulation
        .visualizations
        .iter()
        .map(|v| visualization_data(v, result))
        .collect()
}

/// Numeric series of `field` across runs, oldest first.
///
/// `runs` is taken most-recent-first, as history lists it. Runs where the
/// field is missing or non-numeric are skipped.
pub fn field_series<'a>(
    runs: impl DoubleEndedIterator<Item = &'a Run>,
    field: &str,
) -> AppResult<Vec<(DateTime<Utc>, f64)>> {
    if field.trim().is_empty() {
        return Err(AppError::InvalidInput("Field name is empty".to_string()));
    }
    Ok(runs
        .rev()
        .filter_map(|run| run.field_f64(field).map(|v| (run.executed_at, v)))
        .collect())
}
