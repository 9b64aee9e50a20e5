//! Identifier aliases shared by every crate.
//!
//! Identifiers come from external systems (workflow editor, execution service,
//! persistence API), so they stay opaque strings.

pub type SimulationId = String;
pub type WorkflowId = String;
pub type ParameterId = String;
pub type NodeId = String;
pub type ExecutionId = String;
pub type RunId = String;
pub type ScenarioId = String;
pub type VisualizationId = String;

