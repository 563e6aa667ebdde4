//! The events streamed from the server to the client while a reply is produced.
//!
//! Each event travels in its own frame (see [`crate::codec`]) as a JSON object tagged by `type`.
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::models::role::Role;
use crate::models::tool::ToolOutput;
use crate::providers::base::Usage;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A new assistant turn begins
    MessageStart {
        #[serde(default)]
        message: MessageMetadata,
    },
    /// Incremental content for the open message
    ContentBlockDelta { delta: Delta },
    /// The model requested a tool call
    ToolUse { tool_use: ToolUse },
    /// The result of an executed tool call
    ToolResult {
        tool_use_id: String,
        result: ToolOutput,
    },
    /// The open turn has ended
    MessageStop,
    /// The reply could not be completed; nothing follows
    Error { error: ErrorDetail },
}

impl Event {
    pub fn message_start(model: &str, usage: Usage) -> Self {
        Event::MessageStart {
            message: MessageMetadata::new(model, usage),
        }
    }

    pub fn text<S: Into<String>>(text: S) -> Self {
        Event::ContentBlockDelta {
            delta: Delta::TextDelta { text: text.into() },
        }
    }

    pub fn tool_use<S: Into<String>, N: Into<String>>(id: S, name: N, input: Value) -> Self {
        Event::ToolUse {
            tool_use: ToolUse {
                id: id.into(),
                name: name.into(),
                input,
            },
        }
    }

    pub fn tool_result<S: Into<String>>(tool_use_id: S, result: ToolOutput) -> Self {
        Event::ToolResult {
            tool_use_id: tool_use_id.into(),
            result,
        }
    }

    pub fn error<K: Into<String>, M: Into<String>>(kind: K, message: M) -> Self {
        Event::Error {
            error: ErrorDetail {
                kind: kind.into(),
                message: message.into(),
            },
        }
    }

    /// The wire name of this event's type
    pub fn kind(&self) -> &'static str {
        match self {
            Event::MessageStart { .. } => "message_start",
            Event::ContentBlockDelta { .. } => "content_block_delta",
            Event::ToolUse { .. } => "tool_use",
            Event::ToolResult { .. } => "tool_result",
            Event::MessageStop => "message_stop",
            Event::Error { .. } => "error",
        }
    }
}

/// Metadata describing the model response a turn was produced from
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MessageMetadata {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub role: Role,
    pub model: String,
    pub usage: Usage,
}

impl MessageMetadata {
    pub fn new(model: &str, usage: Usage) -> Self {
        Self {
            id: format!("msg_{}", Uuid::new_v4().simple()),
            kind: "message".to_string(),
            role: Role::Assistant,
            model: model.to_string(),
            usage,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Delta {
    TextDelta { text: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolUse {
    pub id: String,
    pub name: String,
    pub input: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorDetail {
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
}
