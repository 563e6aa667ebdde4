use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};

use super::System;
use crate::errors::{AgentError, AgentResult};
use crate::models::tool::{Tool, ToolCall};

/// Tools hosted by a separate HTTP tool server.
///
/// The server lists its tools at `GET {url}/tools` and executes them at
/// `POST {url}/call` with a `{"name", "input"}` body. A 2xx reply carries the tool output,
/// a 4xx reply is a failure reported by the tool (`{"error": ...}`), anything else means the
/// tool could not be reached.
pub struct RemoteSystem {
    name: String,
    description: String,
    url: String,
    client: Client,
    tools: Vec<Tool>,
}

impl RemoteSystem {
    /// Connect to a tool server and fetch its tool list
    pub async fn connect(name: &str, url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()?;
        let url = url.trim_end_matches('/').to_string();

        let tools: Vec<Tool> = client
            .get(format!("{}/tools", url))
            .send()
            .await
            .with_context(|| format!("Failed to reach tool server {} at {}", name, url))?
            .error_for_status()?
            .json()
            .await
            .with_context(|| format!("Tool server {} returned an invalid tool list", name))?;

        tracing::info!(system = name, url = %url, tools = tools.len(), "connected to tool server");

        Ok(Self {
            name: name.to_string(),
            description: format!("Tools hosted at {}", url),
            url,
            client,
            tools,
        })
    }
}

#[async_trait]
impl System for RemoteSystem {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn instructions(&self) -> &str {
        ""
    }

    fn tools(&self) -> &[Tool] {
        &self.tools
    }

    async fn call(&self, tool_call: ToolCall) -> AgentResult<Value> {
        let response = self
            .client
            .post(format!("{}/call", self.url))
            .json(&json!({
                "name": tool_call.name,
                "input": tool_call.input,
            }))
            .send()
            .await
            .map_err(|e| AgentError::Unavailable(format!("{}: {}", self.name, e)))?;

        let status = response.status();
        if status.is_success() {
            let body = response
                .bytes()
                .await
                .map_err(|e| AgentError::Unavailable(format!("{}: {}", self.name, e)))?;
            // The tool ran but its answer is unusable
            return serde_json::from_slice(&body).map_err(|e| {
                AgentError::ExecutionError(format!("{}: invalid reply: {}", self.name, e))
            });
        }

        if status.is_client_error() && status != StatusCode::REQUEST_TIMEOUT {
            let body: Value = response.json().await.unwrap_or(Value::Null);
            let message = body
                .get("error")
                .and_then(|e| e.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| status.to_string());
            return Err(if status == StatusCode::NOT_FOUND {
                AgentError::ToolNotFound(tool_call.name)
            } else {
                AgentError::ExecutionError(message)
            });
        }

        Err(AgentError::Unavailable(format!(
            "{} responded with {}",
            self.name, status
        )))
    }
}
