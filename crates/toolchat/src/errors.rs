use serde::{Deserialize, Serialize};
use thiserror::Error;

#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Deserialize, Serialize)]
pub enum AgentError {
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Duplicate tool name: {0}")]
    DuplicateTool(String),

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Tool execution failed: {0}")]
    ExecutionError(String),

    /// The handler could not be reached at all, as opposed to running and reporting failure
    #[error("Tool unavailable: {0}")]
    Unavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AgentError {
    /// Infrastructure failures are rendered differently from business failures
    pub fn is_infrastructure(&self) -> bool {
        matches!(self, AgentError::Unavailable(_))
    }
}

pub type AgentResult<T> = Result<T, AgentError>;

/// Failures talking to the model service
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Server error: {status} - {body}")]
    Status { status: u16, body: String },

    #[error("Invalid response format: {0}")]
    Format(String),
}

impl ProviderError {
    /// Short machine-readable kind carried in the `error` stream event
    pub fn kind(&self) -> &'static str {
        match self {
            ProviderError::Request(_) => "transport_error",
            ProviderError::Status { status, .. } if *status == 429 => "rate_limit_error",
            ProviderError::Status { status, .. } if *status >= 500 => "api_error",
            ProviderError::Status { .. } => "invalid_request_error",
            ProviderError::Format(_) => "invalid_response_error",
        }
    }
}
