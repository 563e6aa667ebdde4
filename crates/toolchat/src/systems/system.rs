use async_trait::async_trait;
use serde_json::Value;

use crate::errors::AgentResult;
use crate::models::tool::{Tool, ToolCall};

/// Core trait that defines a system of tools that can be operated by an AI agent
#[async_trait]
pub trait System: Send + Sync {
    /// Get the name of the system
    fn name(&self) -> &str;

    /// Get the system description
    fn description(&self) -> &str;

    /// Get system instructions, included in the system prompt
    fn instructions(&self) -> &str;

    /// Get available tools
    fn tools(&self) -> &[Tool];

    /// Call a tool with the given input.
    ///
    /// Business failures (bad input, the tool reporting an error) should be returned as
    /// [`AgentError::InvalidParameters`](crate::errors::AgentError::InvalidParameters) or
    /// [`AgentError::ExecutionError`](crate::errors::AgentError::ExecutionError); failures to
    /// reach the handler at all as [`AgentError::Unavailable`](crate::errors::AgentError::Unavailable).
    async fn call(&self, tool_call: ToolCall) -> AgentResult<Value>;
}
