//! Client-side projection of a conversation, folded from stream events.
//!
//! [`ConversationState`] holds what a presentation layer renders: the visible messages, which
//! one (if any) is still streaming, and whether a submission is in flight. Every mutation made
//! while a reply streams comes from [`ConversationState::apply`], so replaying the same events
//! over the same submissions always reproduces the same state.
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::events::{Delta, Event, ToolUse};
use crate::models::content::ImageContent;
use crate::models::role::Role;
use crate::models::tool::ToolOutput;
use crate::request::{ChatRequest, RequestBlock, RequestContent, RequestMessage};

/// Shown in place of a reply when the request failed before anything streamed
pub const FALLBACK_ERROR: &str = "Sorry, I encountered an error. Please try again.";

/// A tool the assistant used while producing a message
#[derive(Debug, Clone, PartialEq)]
pub struct ToolUseRecord {
    pub id: String,
    pub name: String,
    pub input: Value,
    /// None until the tool has finished executing
    pub result: Option<ToolOutput>,
}

impl ToolUseRecord {
    pub fn is_pending(&self) -> bool {
        self.result.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub id: String,
    pub role: Role,
    pub content: String,
    pub images: Vec<ImageContent>,
    pub is_streaming: bool,
    pub tools_used: Vec<ToolUseRecord>,
    /// Set when the message was cut short; its partial content is still shown
    pub error: Option<String>,
    pub created: DateTime<Utc>,
}

// Timestamps are left out of equality
impl PartialEq for ChatMessage {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.role == other.role
            && self.content == other.content
            && self.images == other.images
            && self.is_streaming == other.is_streaming
            && self.tools_used == other.tools_used
            && self.error == other.error
    }
}

impl ChatMessage {
    fn new(id: String, role: Role) -> Self {
        Self {
            id,
            role,
            content: String::new(),
            images: Vec::new(),
            is_streaming: false,
            tools_used: Vec::new(),
            error: None,
            created: Utc::now(),
        }
    }

    /// The turn that began at `turn_start` called tools and all of them have results,
    /// so the model is being asked again
    fn awaits_continuation(&self, turn_start: usize) -> bool {
        let turn_tools = &self.tools_used[turn_start.min(self.tools_used.len())..];
        !turn_tools.is_empty() && turn_tools.iter().all(|t| !t.is_pending())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConversationState {
    messages: Vec<ChatMessage>,
    open: Option<usize>,
    /// Index into the open message's tool records where the current turn's calls begin
    turn_tools_start: usize,
    is_loading: bool,
    ignored_events: usize,
}

impl ConversationState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// The assistant message currently receiving deltas
    pub fn open_message(&self) -> Option<&ChatMessage> {
        self.open.map(|i| &self.messages[i])
    }

    /// Whether a submission is in flight
    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    /// Events that referred to nothing and were ignored
    pub fn ignored_events(&self) -> usize {
        self.ignored_events
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    fn next_id(&self) -> String {
        format!("msg_{}", self.messages.len())
    }

    /// Record a new user submission and mark the conversation as loading
    pub fn submit<S: Into<String>>(&mut self, text: S, images: Vec<ImageContent>) -> &ChatMessage {
        let mut message = ChatMessage::new(self.next_id(), Role::User);
        message.content = text.into();
        message.images = images;
        self.messages.push(message);
        self.is_loading = true;
        &self.messages[self.messages.len() - 1]
    }

    /// Fold one event into the state
    pub fn apply(&mut self, event: &Event) {
        match event {
            Event::MessageStart { .. } => self.start_turn(),
            Event::ContentBlockDelta {
                delta: Delta::TextDelta { text },
            } => self.append_text(text),
            Event::ToolUse { tool_use } => self.add_tool_use(tool_use),
            Event::ToolResult {
                tool_use_id,
                result,
            } => self.resolve_tool_use(tool_use_id, result),
            Event::MessageStop => self.stop_turn(),
            Event::Error { error } => self.terminate(&error.message),
        }
    }

    /// The stream for the current submission has ended
    pub fn finish(&mut self) {
        if self.open.is_some() {
            self.terminate("The response ended before it was complete.");
        }
        self.is_loading = false;
    }

    /// The submission failed before any event was received
    pub fn fail_submission<S: Into<String>>(&mut self, reason: S) {
        let reason = reason.into();
        tracing::warn!(%reason, "submission failed");
        match self.open {
            Some(_) => self.terminate(&reason),
            None => {
                let mut message = ChatMessage::new(self.next_id(), Role::Assistant);
                message.error = Some(FALLBACK_ERROR.to_string());
                self.messages.push(message);
            }
        }
        self.is_loading = false;
    }

    fn start_turn(&mut self) {
        match self.open {
            None => {
                let mut message = ChatMessage::new(self.next_id(), Role::Assistant);
                message.is_streaming = true;
                self.messages.push(message);
                self.open = Some(self.messages.len() - 1);
                self.turn_tools_start = 0;
            }
            Some(index) if self.messages[index].awaits_continuation(self.turn_tools_start) => {
                // Follow-up turn after tool results keeps streaming into the same message
                let message = &mut self.messages[index];
                if !message.content.is_empty() && !message.content.ends_with('\n') {
                    message.content.push_str("\n\n");
                }
                self.turn_tools_start = message.tools_used.len();
            }
            Some(_) => self.terminate("Protocol error: a new turn started before the previous one ended."),
        }
    }

    fn open_mut(&mut self) -> Option<&mut ChatMessage> {
        match self.open {
            Some(index) => Some(&mut self.messages[index]),
            None => {
                self.ignored_events += 1;
                None
            }
        }
    }

    fn append_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        if let Some(message) = self.open_mut() {
            message.content.push_str(text);
        }
    }

    fn add_tool_use(&mut self, tool_use: &ToolUse) {
        if let Some(message) = self.open_mut() {
            message.tools_used.push(ToolUseRecord {
                id: tool_use.id.clone(),
                name: tool_use.name.clone(),
                input: tool_use.input.clone(),
                result: None,
            });
        }
    }

    fn resolve_tool_use(&mut self, tool_use_id: &str, result: &ToolOutput) {
        let record = self.open.and_then(|index| {
            self.messages[index]
                .tools_used
                .iter_mut()
                .find(|t| t.id == tool_use_id && t.is_pending())
        });
        match record {
            Some(record) => record.result = Some(result.clone()),
            None => {
                tracing::debug!(tool_use_id, "ignoring result for unknown tool use");
                self.ignored_events += 1;
            }
        }
    }

    fn stop_turn(&mut self) {
        if let Some(message) = self.open_mut() {
            message.is_streaming = false;
            self.open = None;
        }
    }

    fn terminate(&mut self, reason: &str) {
        match self.open.take() {
            Some(index) => {
                let message = &mut self.messages[index];
                message.is_streaming = false;
                message.error = Some(reason.to_string());
            }
            None => {
                let mut message = ChatMessage::new(self.next_id(), Role::Assistant);
                message.error = Some(reason.to_string());
                self.messages.push(message);
            }
        }
        self.is_loading = false;
    }

    /// The history to send with the next submission.
    ///
    /// Assistant messages that produced no text are left out and adjacent messages of the
    /// same role are merged, so the history always alternates.
    pub fn to_request(&self) -> ChatRequest {
        let mut messages: Vec<RequestMessage> = Vec::new();
        for message in &self.messages {
            let mut blocks: Vec<RequestBlock> = message
                .images
                .iter()
                .map(|image| RequestBlock::Image {
                    media_type: image.mime_type.clone(),
                    base64_data: image.data.clone(),
                })
                .collect();
            if !message.content.is_empty() {
                blocks.push(RequestBlock::Text {
                    text: message.content.clone(),
                });
            }
            if blocks.is_empty() {
                continue;
            }

            match messages.last_mut() {
                Some(last) if last.role == message.role => last.content.extend(blocks),
                _ => messages.push(RequestMessage {
                    role: message.role,
                    content: RequestContent::from_blocks(blocks),
                }),
            }
        }
        ChatRequest { messages }
    }
}

/// Fold a sequence of events over an empty state
pub fn replay<'a>(events: impl IntoIterator<Item = &'a Event>) -> ConversationState {
    let mut state = ConversationState::new();
    for event in events {
        state.apply(event);
    }
    state
}
