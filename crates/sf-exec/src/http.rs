//! HTTP client for the workflow execution service.

use std::time::Duration;

use reqwest::blocking::{Client, Response};
use serde_json::Value;
use tracing::debug;

use crate::error::{ExecError, ExecResult};
use crate::protocol::{ExecutionRequest, StatusResponse, TriggerResponse};
use crate::service::ExecutionService;

/// Execution service reached over HTTP.
///
/// Endpoints:
/// - `POST {base}/api/workflows/execute`
/// - `GET  {base}/api/executions/{id}`
/// - `POST {base}/api/executions/{id}/cancel`
#[derive(Debug, Clone)]
pub struct HttpExecutionService {
    client: Client,
    base_url: String,
}

impl HttpExecutionService {
    pub fn new(base_url: impl Into<String>, request_timeout: Duration) -> ExecResult<Self> {
        let client = Client::builder().timeout(request_timeout).build()?;
        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

/// Turn a non-2xx response into [`ExecError::Status`], otherwise decode JSON.
fn read_json(response: Response) -> ExecResult<Value> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().unwrap_or_default();
        return Err(ExecError::Status {
            code: status.as_u16(),
            body,
        });
    }
    Ok(response.json::<Value>()?)
}

impl ExecutionService for HttpExecutionService {
    fn trigger(&self, request: &ExecutionRequest) -> ExecResult<TriggerResponse> {
        debug!(
            workflow_id = %request.workflow_id,
            inputs = request.inputs.len(),
            background_allowed = request.background_allowed,
            "triggering workflow execution"
        );
        let response = self
            .client
            .post(self.url("/api/workflows/execute"))
            .json(request)
            .send()?;
        let payload = read_json(response)?;
        Ok(TriggerResponse::from_value(payload))
    }

    fn status(&self, execution_id: &str) -> ExecResult<StatusResponse> {
        let response = self
            .client
            .get(self.url(&format!("/api/executions/{}", execution_id)))
            .send()?;
        let payload = read_json(response)?;
        Ok(StatusResponse::from_value(payload))
    }

    fn cancel(&self, execution_id: &str) -> ExecResult<()> {
        let response = self
            .client
            .post(self.url(&format!("/api/executions/{}/cancel", execution_id)))
            .send()?;
        read_json(response).map(|_| ())
    }
}
