use async_trait::async_trait;
use indoc::indoc;
use serde_json::{json, Value};

use super::System;
use crate::errors::{AgentError, AgentResult};
use crate::models::tool::{Tool, ToolCall};

const INFO_TYPES: [&str; 5] = ["about", "eboard", "workshops", "events", "contact"];

/// Built-in tools answering questions about the Claude Builder Club at NJIT
pub struct ClubSystem {
    tools: Vec<Tool>,
}

impl Default for ClubSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl ClubSystem {
    pub fn new() -> Self {
        Self {
            tools: vec![
                Tool::new(
                    "get_club_info",
                    "Get information about the Claude Builder Club at NJIT",
                    json!({
                        "type": "object",
                        "properties": {
                            "info_type": {
                                "type": "string",
                                "enum": INFO_TYPES,
                                "description": "The type of information to retrieve"
                            }
                        },
                        "required": ["info_type"]
                    }),
                ),
                Tool::new(
                    "search_workshops",
                    "Search for workshops and events organized by the club",
                    json!({
                        "type": "object",
                        "properties": {
                            "query": {
                                "type": "string",
                                "description": "Search query for workshops"
                            },
                            "filter": {
                                "type": "string",
                                "enum": ["upcoming", "past", "all"],
                                "description": "Filter workshops by time"
                            }
                        },
                        "required": ["query"]
                    }),
                ),
            ],
        }
    }

    fn club_info(&self, input: &Value) -> AgentResult<Value> {
        let info_type = input
            .get("info_type")
            .and_then(|v| v.as_str())
            .ok_or_else(|| AgentError::InvalidParameters("info_type parameter required".into()))?;

        let info = match info_type {
            "about" => "Claude Builder Club at NJIT is a student organization focused on building with AI and exploring Claude capabilities.",
            "eboard" => "Executive board includes passionate students leading AI initiatives at NJIT.",
            "workshops" => "Regular workshops on AI development, prompt engineering, and building with Claude.",
            "events" => "Monthly meetups, hackathons, and guest speaker sessions.",
            "contact" => "Reach us at claude.builders@njit.edu",
            _ => "Info not found",
        };
        Ok(json!({ "info": info }))
    }

    fn search_workshops(&self, input: &Value) -> AgentResult<Value> {
        input
            .get("query")
            .and_then(|v| v.as_str())
            .ok_or_else(|| AgentError::InvalidParameters("query parameter required".into()))?;

        if let Some(filter) = input.get("filter").and_then(|v| v.as_str()) {
            if !["upcoming", "past", "all"].contains(&filter) {
                return Err(AgentError::InvalidParameters(format!(
                    "unknown filter '{}'",
                    filter
                )));
            }
        }

        Ok(json!({
            "message": "No specific workshops are currently scheduled. Please check our Discord or Instagram for upcoming events and announcements."
        }))
    }
}

#[async_trait]
impl System for ClubSystem {
    fn name(&self) -> &str {
        "club"
    }

    fn description(&self) -> &str {
        "Facts about the Claude Builder Club at NJIT"
    }

    fn instructions(&self) -> &str {
        indoc! {r#"
            Use get_club_info for questions about the club itself, its board, workshops,
            events or how to get in touch. Use search_workshops when the user asks about a
            specific workshop or event. Be friendly and give specific details when available.
        "#}
    }

    fn tools(&self) -> &[Tool] {
        &self.tools
    }

    async fn call(&self, tool_call: ToolCall) -> AgentResult<Value> {
        match tool_call.name.as_str() {
            "get_club_info" => self.club_info(&tool_call.input),
            "search_workshops" => self.search_workshops(&tool_call.input),
            _ => Err(AgentError::ToolNotFound(tool_call.name)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_club_info_known_and_unknown() {
        let system = ClubSystem::new();
        let contact = system
            .call(ToolCall::new("get_club_info", json!({"info_type": "contact"})))
            .await
            .unwrap();
        assert_eq!(contact, json!({"info": "Reach us at claude.builders@njit.edu"}));

        let unknown = system
            .call(ToolCall::new("get_club_info", json!({"info_type": "lunch"})))
            .await
            .unwrap();
        assert_eq!(unknown, json!({"info": "Info not found"}));
    }

    #[tokio::test]
    async fn test_missing_input_is_invalid_parameters() {
        let system = ClubSystem::new();
        let err = system
            .call(ToolCall::new("get_club_info", json!({})))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            AgentError::InvalidParameters("info_type parameter required".into())
        );

        let err = system
            .call(ToolCall::new(
                "search_workshops",
                json!({"query": "rust", "filter": "soon"}),
            ))
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::InvalidParameters(_)));
    }

    #[tokio::test]
    async fn test_search_workshops() {
        let system = ClubSystem::new();
        let result = system
            .call(ToolCall::new(
                "search_workshops",
                json!({"query": "prompting", "filter": "upcoming"}),
            ))
            .await
            .unwrap();
        assert!(result["message"]
            .as_str()
            .unwrap()
            .starts_with("No specific workshops"));
    }
}
