//! Built-in read-only demo simulation.
//!
//! The demo binds four business inputs to a revenue model workflow. It is
//! never persisted: scenario edits on it stay local to the session.

use serde_json::json;

use crate::migrate::LATEST_VERSION;
use crate::schema::{ControlKind, ParameterDef, Simulation, VisualizationDef, VisualizationKind};

pub const DEMO_SIMULATION_ID: &str = "demo";
pub const DEMO_WORKFLOW_ID: &str = "demo-revenue-model";

pub const PRICE_NODE: &str = "input-price";
pub const VOLUME_NODE: &str = "input-volume";
pub const GROWTH_NODE: &str = "input-growth";
pub const COST_RATIO_NODE: &str = "input-cost-ratio";

pub fn demo_simulation() -> Simulation {
    Simulation {
        version: LATEST_VERSION,
        id: DEMO_SIMULATION_ID.to_string(),
        name: "Revenue model (demo)".to_string(),
        description: Some("Price and volume driven revenue, cost and margin model".to_string()),
        workflow_id: DEMO_WORKFLOW_ID.to_string(),
        parameters: vec![
            demo_parameter(
                "price",
                PRICE_NODE,
                "Unit price",
                ControlKind::Slider {
                    min: 1.0,
                    max: 500.0,
                    step: 1.0,
                },
                json!(99),
                0,
                Some("$"),
            ),
            demo_parameter(
                "volume",
                VOLUME_NODE,
                "Monthly volume",
                ControlKind::Slider {
                    min: 0.0,
                    max: 10_000.0,
                    step: 10.0,
                },
                json!(1000),
                1,
                Some("units"),
            ),
            demo_parameter(
                "growth",
                GROWTH_NODE,
                "Growth rate",
                ControlKind::Slider {
                    min: 0.0,
                    max: 100.0,
                    step: 0.5,
                },
                json!(10),
                2,
                Some("%"),
            ),
            demo_parameter(
                "costRatio",
                COST_RATIO_NODE,
                "Cost ratio",
                ControlKind::Slider {
                    min: 0.0,
                    max: 100.0,
                    step: 0.5,
                },
                json!(35),
                3,
                Some("%"),
            ),
        ],
        visualizations: vec![
            VisualizationDef {
                id: "kpi-profit".to_string(),
                title: "Profit".to_string(),
                kind: VisualizationKind::Kpi,
                fields: vec!["profit".to_string()],
            },
            VisualizationDef {
                id: "kpi-margin".to_string(),
                title: "Margin".to_string(),
                kind: VisualizationKind::Kpi,
                fields: vec!["margin".to_string()],
            },
            VisualizationDef {
                id: "chart-breakdown".to_string(),
                title: "Revenue breakdown".to_string(),
                kind: VisualizationKind::BarChart,
                fields: vec![
                    "revenue".to_string(),
                    "costs".to_string(),
                    "profit".to_string(),
                ],
            },
        ],
        scenarios: vec![],
        updated_at: None,
    }
}

fn demo_parameter(
    id: &str,
    node: &str,
    label: &str,
    control: ControlKind,
    default_value: serde_json::Value,
    order: i32,
    unit: Option<&str>,
) -> ParameterDef {
    ParameterDef {
        id: id.to_string(),
        bound_node_id: node.to_string(),
        variable_name: id.to_string(),
        label: label.to_string(),
        control,
        default_value,
        group: Some("Business".to_string()),
        order,
        unit: unit.map(str::to_string),
    }
}
