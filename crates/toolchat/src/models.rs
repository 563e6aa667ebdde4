//! These models represent the objects passed around by the agent
//!
//! There are several different related formats we need to interact with:
//! - chat requests, sent from the client to the server
//! - stream events, sent from the server to the client (see [`crate::events`])
//! - anthropic messages/tools, sent from the agent to the LLM
//! - tool calls, sent from the agent to the systems providing capabilities
//!
//! We always immediately convert those data models into the internal structs here, so the
//! internal models are not an exact match to any one of these formats.
pub mod content;
pub mod message;
pub mod role;
pub mod tool;
