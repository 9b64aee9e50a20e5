//! Wire types for the workflow execution service.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sf_core::{ExecutionId, NodeId, WorkflowId};

/// Body of `POST /api/workflows/execute`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionRequest {
    pub workflow_id: WorkflowId,
    /// Input values addressed by workflow node id.
    pub inputs: BTreeMap<NodeId, Value>,
    /// Whether the service may answer with a background job instead of a result.
    pub background_allowed: bool,
}

/// How the service answered an execution trigger.
#[derive(Debug, Clone, PartialEq)]
pub enum TriggerResponse {
    /// Synchronous answer carrying the raw per-node result.
    Immediate(Value),
    /// Background job to be polled.
    Background { execution_id: ExecutionId },
}

impl TriggerResponse {
    /// Interpret a trigger payload.
    ///
    /// `{backgroundExecution: true, executionId}` is a background job; anything
    /// else is a synchronous answer whose `result` field (or the rest of the
    /// payload when absent or null) is the raw result.
    pub fn from_value(payload: Value) -> Self {
        let background = payload
            .get("backgroundExecution")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let execution_id = payload
            .get("executionId")
            .and_then(Value::as_str)
            .map(str::to_string);

        if background && let Some(execution_id) = execution_id {
            return Self::Background { execution_id };
        }

        let Value::Object(mut map) = payload else {
            return Self::Immediate(payload);
        };
        match map.remove("result") {
            Some(Value::Null) | None => Self::Immediate(Value::Object(map)),
            Some(result) => Self::Immediate(result),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
    #[serde(other)]
    Unknown,
}

impl ExecutionStatus {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "pending" => Self::Pending,
            "running" => Self::Running,
            "completed" => Self::Completed,
            "failed" => Self::Failed,
            "cancelled" | "canceled" => Self::Cancelled,
            _ => Self::Unknown,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Node-level progress reported alongside a status.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionProgress {
    #[serde(default)]
    pub total_nodes: u32,
    #[serde(default)]
    pub completed_nodes: u32,
    #[serde(default)]
    pub failed_nodes: u32,
    #[serde(default)]
    pub percentage: u32,
}

/// Answer of `GET /api/executions/{id}`.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusResponse {
    pub status: ExecutionStatus,
    pub error: Option<String>,
    pub progress: Option<ExecutionProgress>,
    /// Full payload, kept for result extraction.
    pub payload: Value,
}

impl StatusResponse {
    pub fn from_value(payload: Value) -> Self {
        let status = payload
            .get("status")
            .and_then(Value::as_str)
            .map(ExecutionStatus::parse)
            .unwrap_or(ExecutionStatus::Unknown);
        let error = payload
            .get("error")
            .and_then(Value::as_str)
            .map(str::to_string);
        let progress = payload
            .get("progress")
            .cloned()
            .and_then(|p| serde_json::from_value(p).ok());

        Self {
            status,
            error,
            progress,
            payload,
        }
    }

    /// Raw result of a completed execution: `nodeResults`, else `finalOutput`,
    /// else the whole payload.
    pub fn into_result(self) -> Value {
        let Value::Object(mut map) = self.payload else {
            return self.payload;
        };
        for key in ["nodeResults", "finalOutput"] {
            match map.remove(key) {
                Some(Value::Null) | None => continue,
                Some(found) => return found,
            }
        }
        Value::Object(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_serializes_with_wire_names() {
        let mut inputs = BTreeMap::new();
        inputs.insert("node-1".to_string(), json!(99));
        let request = ExecutionRequest {
            workflow_id: "wf".to_string(),
            inputs,
            background_allowed: true,
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({"workflowId": "wf", "inputs": {"node-1": 99}, "backgroundAllowed": true})
        );
    }

    #[test]
    fn trigger_background_needs_an_execution_id() {
        let bg = TriggerResponse::from_value(json!({"backgroundExecution": true, "executionId": "e1"}));
        assert_eq!(
            bg,
            TriggerResponse::Background {
                execution_id: "e1".to_string()
            }
        );

        let no_id = TriggerResponse::from_value(json!({"backgroundExecution": true}));
        assert!(matches!(no_id, TriggerResponse::Immediate(_)));
    }

    #[test]
    fn trigger_prefers_result_field() {
        let sync = TriggerResponse::from_value(json!({"success": true, "result": {"n1": 1}}));
        assert_eq!(sync, TriggerResponse::Immediate(json!({"n1": 1})));

        let bare = TriggerResponse::from_value(json!({"n1": 1}));
        assert_eq!(bare, TriggerResponse::Immediate(json!({"n1": 1})));
    }

    #[test]
    fn null_result_falls_back_to_payload() {
        let sync = TriggerResponse::from_value(json!({"result": null, "success": true}));
        assert_eq!(sync, TriggerResponse::Immediate(json!({"success": true})));
    }

    #[test]
    fn status_unknown_values_are_not_terminal() {
        let status = StatusResponse::from_value(json!({"status": "queued"}));
        assert_eq!(status.status, ExecutionStatus::Unknown);
        assert!(!status.status.is_terminal());

        let missing = StatusResponse::from_value(json!({}));
        assert_eq!(missing.status, ExecutionStatus::Unknown);
    }

    #[test]
    fn completed_result_falls_back_in_order() {
        let nodes = StatusResponse::from_value(
            json!({"status": "completed", "nodeResults": {"a": 1}, "finalOutput": {"b": 2}}),
        );
        assert_eq!(nodes.into_result(), json!({"a": 1}));

        let final_output =
            StatusResponse::from_value(json!({"status": "completed", "nodeResults": null, "finalOutput": {"b": 2}}));
        assert_eq!(final_output.into_result(), json!({"b": 2}));

        let whole = StatusResponse::from_value(json!({"status": "completed", "x": 3}));
        assert_eq!(whole.into_result(), json!({"status": "completed", "x": 3}));
    }

    #[test]
    fn progress_is_parsed_when_present() {
        let status = StatusResponse::from_value(json!({
            "status": "running",
            "progress": {"totalNodes": 4, "completedNodes": 1, "failedNodes": 0, "percentage": 25}
        }));
        assert_eq!(status.progress.unwrap().percentage, 25);
    }
}
