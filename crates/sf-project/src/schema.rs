//! Simulation schema definitions.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sf_core::{ParameterId, ParameterValues, ScenarioId, SimulationId, VisualizationId};

/// Simulation aggregate: one workflow binding plus its parameters,
/// visualizations and saved scenarios.
///
/// Run history is session-local and deliberately not part of this document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Simulation {
    pub version: u32,
    pub id: SimulationId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub workflow_id: String,
    #[serde(default)]
    pub parameters: Vec<ParameterDef>,
    #[serde(default)]
    pub visualizations: Vec<VisualizationDef>,
    #[serde(default)]
    pub scenarios: Vec<ScenarioDef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl Simulation {
    pub fn parameter(&self, id: &str) -> Option<&ParameterDef> {
        self.parameters.iter().find(|p| p.id == id)
    }

    /// Parameters sorted for display: by group, then `order`, then id.
    pub fn ordered_parameters(&self) -> Vec<&ParameterDef> {
        let mut params: Vec<&ParameterDef> = self.parameters.iter().collect();
        params.sort_by(|a, b| {
            a.group
                .cmp(&b.group)
                .then(a.order.cmp(&b.order))
                .then(a.id.cmp(&b.id))
        });
        params
    }

    /// Parameter map filled with every parameter's default value.
    pub fn default_values(&self) -> ParameterValues {
        self.parameters
            .iter()
            .map(|p| (p.id.clone(), p.default_value.clone()))
            .collect()
    }

    pub fn scenario(&self, id: &str) -> Option<&ScenarioDef> {
        self.scenarios.iter().find(|s| s.id == id)
    }

    pub fn visualization(&self, id: &str) -> Option<&VisualizationDef> {
        self.visualizations.iter().find(|v| v.id == id)
    }

    pub fn is_demo(&self) -> bool {
        self.id == crate::demo::DEMO_SIMULATION_ID
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ParameterDef {
    pub id: ParameterId,
    /// Workflow node that receives this parameter's value as its input.
    pub bound_node_id: String,
    /// Logical variable name, used by the chat assistant and for display.
    #[serde(default)]
    pub variable_name: String,
    #[serde(default)]
    pub label: String,
    pub control: ControlKind,
    pub default_value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(default)]
    pub order: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

impl ParameterDef {
    pub fn display_name(&self) -> &str {
        if !self.label.is_empty() {
            &self.label
        } else if !self.variable_name.is_empty() {
            &self.variable_name
        } else {
            &self.id
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlKind {
    Slider {
        min: f64,
        max: f64,
        #[serde(default = "default_slider_step")]
        step: f64,
    },
    Number {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max: Option<f64>,
    },
    Toggle,
    Select {
        options: Vec<String>,
    },
    Text,
}

impl ControlKind {
    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Slider { .. } | Self::Number { .. })
    }

    /// Lower/upper bounds for numeric controls.
    pub fn bounds(&self) -> (Option<f64>, Option<f64>) {
        match self {
            Self::Slider { min, max, .. } => (Some(*min), Some(*max)),
            Self::Number { min, max } => (*min, *max),
            _ => (None, None),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Slider { .. } => "slider",
            Self::Number { .. } => "number",
            Self::Toggle => "toggle",
            Self::Select { .. } => "select",
            Self::Text => "text",
        }
    }
}

fn default_slider_step() -> f64 {
    1.0
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VisualizationDef {
    pub id: VisualizationId,
    pub title: String,
    pub kind: VisualizationKind,
    /// Normalized result fields this visualization reads.
    #[serde(default)]
    pub fields: Vec<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VisualizationKind {
    Kpi,
    LineChart,
    BarChart,
    Table,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioDef {
    pub id: ScenarioId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub parameter_values: ParameterValues,
    pub created_at: String,
}
