use thiserror::Error;

pub type ExecResult<T> = Result<T, ExecError>;

/// Failures talking to the execution service.
#[derive(Error, Debug)]
pub enum ExecError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Execution service returned HTTP {code}: {body}")]
    Status { code: u16, body: String },

    #[error("Malformed response: {0}")]
    Malformed(String),

    #[error("Execution {0} is already being polled")]
    PollAlreadyActive(String),
}

impl ExecError {
    /// Network-level failure, as opposed to an answer the service gave.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Timeout(_))
    }
}

impl From<reqwest::Error> for ExecError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ExecError::Timeout(err.to_string())
        } else if err.is_decode() {
            ExecError::Malformed(err.to_string())
        } else if let Some(status) = err.status() {
            ExecError::Status {
                code: status.as_u16(),
                body: err.to_string(),
            }
        } else {
            ExecError::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ExecError {
    fn from(err: serde_json::Error) -> Self {
        ExecError::Malformed(err.to_string())
    }
}
