//! The body a client posts to start a reply: the full history ending with the new user message.
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::message::Message;
use crate::models::role::Role;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<RequestMessage>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestMessage {
    pub role: Role,
    pub content: RequestContent,
}

/// Either plain text or a list of content blocks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestContent {
    Text(String),
    Blocks(Vec<RequestBlock>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RequestBlock {
    Text {
        text: String,
    },
    #[serde(rename_all = "camelCase")]
    Image {
        media_type: String,
        base64_data: String,
    },
}

impl RequestContent {
    /// Plain text when the blocks are a single text block, blocks otherwise
    pub fn from_blocks(mut blocks: Vec<RequestBlock>) -> Self {
        if blocks.len() == 1 {
            if let RequestBlock::Text { .. } = &blocks[0] {
                if let Some(RequestBlock::Text { text }) = blocks.pop() {
                    return RequestContent::Text(text);
                }
            }
        }
        RequestContent::Blocks(blocks)
    }

    pub fn into_blocks(self) -> Vec<RequestBlock> {
        match self {
            RequestContent::Text(text) => vec![RequestBlock::Text { text }],
            RequestContent::Blocks(blocks) => blocks,
        }
    }

    pub fn extend(&mut self, more: Vec<RequestBlock>) {
        let current = std::mem::replace(self, RequestContent::Blocks(Vec::new()));
        let mut blocks = current.into_blocks();
        blocks.extend(more);
        *self = RequestContent::Blocks(blocks);
    }

    fn is_empty(&self) -> bool {
        match self {
            RequestContent::Text(text) => text.is_empty(),
            RequestContent::Blocks(blocks) => blocks.is_empty(),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RequestError {
    #[error("messages must not be empty")]
    Empty,

    #[error("the first message must come from the user")]
    FirstNotUser,

    #[error("message {0} has the same role as the one before it")]
    NotAlternating(usize),

    #[error("message {0} has no content")]
    EmptyContent(usize),

    #[error("the last message must come from the user")]
    LastNotUser,
}

impl ChatRequest {
    /// Validate the history and convert it into model messages
    pub fn into_messages(self) -> Result<Vec<Message>, RequestError> {
        let first = self.messages.first().ok_or(RequestError::Empty)?;
        if first.role != Role::User {
            return Err(RequestError::FirstNotUser);
        }

        let mut messages = Vec::with_capacity(self.messages.len());
        let mut previous: Option<Role> = None;
        for (index, request) in self.messages.into_iter().enumerate() {
            if previous == Some(request.role) {
                return Err(RequestError::NotAlternating(index));
            }
            if request.content.is_empty() {
                return Err(RequestError::EmptyContent(index));
            }
            previous = Some(request.role);

            let mut message = match request.role {
                Role::User => Message::user(),
                Role::Assistant => Message::assistant(),
            };
            for block in request.content.into_blocks() {
                message = match block {
                    RequestBlock::Text { text } => message.with_text(text),
                    RequestBlock::Image {
                        media_type,
                        base64_data,
                    } => message.with_image(base64_data, media_type),
                };
            }
            messages.push(message);
        }

        if previous != Some(Role::User) {
            return Err(RequestError::LastNotUser);
        }
        Ok(messages)
    }
}
