use std::collections::HashMap;
use std::time::Duration;

use serde_json::Value;
use tokio::time::timeout;

use super::System;
use crate::errors::{AgentError, AgentResult};
use crate::models::tool::{Tool, ToolCall, ToolOutput};

/// Where a qualified tool name is dispatched to
#[derive(Debug, Clone)]
struct Route {
    system: usize,
    tool: String,
    /// Position of the advertised tool in the manifest
    manifest: usize,
}

/// The set of tools advertised to the model, and dispatch to the systems providing them.
///
/// Built once and shared read-only across submissions.
#[derive(Default)]
pub struct ToolRegistry {
    systems: Vec<Box<dyn System>>,
    tools: Vec<Tool>,
    routes: HashMap<String, Route>,
    call_timeout: Option<Duration>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bound every tool call, an expired call is reported as unavailable
    pub fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = Some(call_timeout);
        self
    }

    /// Add a system whose tools are advertised under their own names
    pub fn add_system(&mut self, system: Box<dyn System>) -> AgentResult<()> {
        self.register(system, false)
    }

    /// Add a system whose tools are advertised as `<system>__<tool>`
    pub fn add_namespaced_system(&mut self, system: Box<dyn System>) -> AgentResult<()> {
        self.register(system, true)
    }

    fn register(&mut self, system: Box<dyn System>, namespaced: bool) -> AgentResult<()> {
        let index = self.systems.len();
        let mut tools = Vec::new();
        for tool in system.tools() {
            let name = if namespaced {
                format!("{}__{}", system.name(), tool.name)
            } else {
                tool.name.clone()
            };
            if self.routes.contains_key(&name) || tools.iter().any(|t: &Tool| t.name == name) {
                return Err(AgentError::DuplicateTool(name));
            }
            tools.push(Tool::new(
                name,
                &tool.description,
                tool.input_schema.clone(),
            ));
        }

        for (offset, (tool, original)) in tools.iter().zip(system.tools()).enumerate() {
            self.routes.insert(
                tool.name.clone(),
                Route {
                    system: index,
                    tool: original.name.clone(),
                    manifest: self.tools.len() + offset,
                },
            );
        }
        tracing::debug!(system = system.name(), tools = tools.len(), "registered system");
        self.tools.extend(tools);
        self.systems.push(system);
        Ok(())
    }

    /// All advertised tools, in registration order
    pub fn list_tools(&self) -> &[Tool] {
        &self.tools
    }

    pub fn systems(&self) -> impl Iterator<Item = &dyn System> {
        self.systems.iter().map(|s| &**s)
    }

    /// Execute a tool by its advertised name.
    ///
    /// This never fails: unknown tools, bad input and unreachable handlers are all reported
    /// inside the returned output so the conversation can carry on.
    pub async fn execute(&self, name: &str, input: Value) -> ToolOutput {
        let Some(route) = self.routes.get(name) else {
            tracing::warn!(tool = name, "model requested an unknown tool");
            return Err(AgentError::ToolNotFound(name.to_string())).into();
        };
        if let Err(err) = self.tools[route.manifest].validate_input(&input) {
            tracing::info!(tool = name, error = %err, "rejected tool input");
            return Err(err).into();
        }
        let system = &self.systems[route.system];
        let call = ToolCall::new(route.tool.clone(), input);

        let result = match self.call_timeout {
            Some(limit) => match timeout(limit, system.call(call)).await {
                Ok(result) => result,
                Err(_) => Err(AgentError::Unavailable(format!(
                    "{} did not respond within {}s",
                    name,
                    limit.as_secs_f32()
                ))),
            },
            None => system.call(call).await,
        };

        if let Err(err) = &result {
            tracing::info!(tool = name, error = %err, "tool call failed");
        }
        result.into()
    }
}
