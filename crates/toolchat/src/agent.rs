use futures::stream::BoxStream;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::errors::{AgentError, AgentResult};
use crate::events::Event;
use crate::models::message::Message;
use crate::models::tool::Tool;
use crate::prompt_template::render_system_prompt;
use crate::providers::base::{Provider, Usage};
use crate::systems::ToolRegistry;

pub const DEFAULT_MAX_TURNS: usize = 10;

#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Upper bound on model calls for a single submission
    pub max_turns: usize,
    /// Tera template for the system prompt, the built-in prompt when unset
    pub system_prompt: Option<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_turns: DEFAULT_MAX_TURNS,
            system_prompt: None,
        }
    }
}

/// Where one orchestration run currently is
enum TurnState {
    CallingModel,
    Inspecting { response: Message, usage: Usage },
    ExecutingTools { response: Message },
    Finalizing,
}

/// Agent integrates a foundational LLM with the tools it is allowed to call
#[derive(Clone)]
pub struct Agent {
    provider: Arc<dyn Provider>,
    registry: Arc<ToolRegistry>,
    config: AgentConfig,
}

impl Agent {
    pub fn new(provider: Arc<dyn Provider>, registry: Arc<ToolRegistry>) -> Self {
        Self {
            provider,
            registry,
            config: AgentConfig::default(),
        }
    }

    pub fn with_config(mut self, config: AgentConfig) -> Self {
        self.config = config;
        self
    }

    /// The tool manifest advertised to the model
    pub fn tools(&self) -> &[Tool] {
        self.registry.list_tools()
    }

    pub fn system_prompt(&self) -> AgentResult<String> {
        render_system_prompt(self.config.system_prompt.as_deref(), self.registry.systems())
            .map_err(|e| AgentError::Internal(format!("failed to render system prompt: {}", e)))
    }

    /// Run the turn loop for one submission, streaming events as they are produced.
    ///
    /// `messages` is the validated history ending with the new user message. The stream ends
    /// after `message_stop` or a single `error` event, or silently once `cancel` fires.
    pub fn reply(
        &self,
        messages: Vec<Message>,
        cancel: CancellationToken,
    ) -> AgentResult<BoxStream<'static, Event>> {
        let system_prompt = self.system_prompt()?;
        let provider = Arc::clone(&self.provider);
        let registry = Arc::clone(&self.registry);
        let max_turns = self.config.max_turns;
        let mut messages = messages;

        Ok(Box::pin(async_stream::stream! {
            let mut state = TurnState::CallingModel;
            let mut turn = 0;

            'run: loop {
                state = match state {
                    TurnState::CallingModel => {
                        if turn >= max_turns {
                            tracing::warn!(max_turns, "turn limit reached without a final answer");
                            yield Event::error(
                                "max_turns_exceeded",
                                format!("Stopped after {} model calls without a final answer", max_turns),
                            );
                            break 'run;
                        }
                        turn += 1;

                        let outcome = tokio::select! {
                            biased;
                            _ = cancel.cancelled() => None,
                            result = provider.complete(&system_prompt, &messages, registry.list_tools()) => Some(result),
                        };
                        match outcome {
                            None => {
                                tracing::info!(turn, "reply cancelled while waiting for the model");
                                break 'run;
                            }
                            Some(Ok((response, usage))) => TurnState::Inspecting { response, usage },
                            Some(Err(err)) => {
                                tracing::error!(turn, error = %err, "model call failed");
                                yield Event::error(err.kind(), err.to_string());
                                break 'run;
                            }
                        }
                    }

                    TurnState::Inspecting { response, usage } => {
                        tracing::debug!(
                            turn,
                            tool_requests = response.tool_requests().len(),
                            "model turn completed"
                        );
                        yield Event::message_start(provider.model(), usage);
                        for text in response.texts() {
                            yield Event::text(text);
                        }

                        if response.tool_requests().is_empty() {
                            TurnState::Finalizing
                        } else {
                            TurnState::ExecutingTools { response }
                        }
                    }

                    TurnState::ExecutingTools { response } => {
                        let mut results = Message::user();
                        for request in response.tool_requests() {
                            let call = &request.tool_call;
                            yield Event::tool_use(&request.id, &call.name, call.input.clone());

                            let outcome = tokio::select! {
                                biased;
                                _ = cancel.cancelled() => None,
                                output = registry.execute(&call.name, call.input.clone()) => Some(output),
                            };
                            let output = match outcome {
                                Some(output) => output,
                                None => {
                                    tracing::info!(turn, tool = %call.name, "reply cancelled during a tool call");
                                    break 'run;
                                }
                            };

                            yield Event::tool_result(&request.id, output.clone());
                            results = results.with_tool_response(&request.id, output);
                        }

                        messages.push(response);
                        messages.push(results);
                        TurnState::CallingModel
                    }

                    TurnState::Finalizing => {
                        yield Event::MessageStop;
                        break 'run;
                    }
                };
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ProviderError;
    use crate::models::message::MessageContent;
    use crate::models::role::Role;
    use crate::models::tool::{ToolCall, ToolOutput};
    use crate::providers::mock::MockProvider;
    use crate::systems::System;
    use async_trait::async_trait;
    use futures::StreamExt;
    use serde_json::{json, Value};
    use std::time::Duration;

    struct LookupSystem {
        tools: Vec<Tool>,
    }

    impl LookupSystem {
        fn new() -> Self {
            Self {
                tools: vec![
                    Tool::new(
                        "lookup",
                        "Look something up",
                        json!({"type": "object", "properties": {"q": {"type": "string"}}, "required": ["q"]}),
                    ),
                    Tool::new(
                        "stall",
                        "Takes far too long",
                        json!({"type": "object", "properties": {}}),
                    ),
                ],
            }
        }
    }

    #[async_trait]
    impl System for LookupSystem {
        fn name(&self) -> &str {
            "lookup"
        }

        fn description(&self) -> &str {
            "Looks things up"
        }

        fn instructions(&self) -> &str {
            ""
        }

        fn tools(&self) -> &[Tool] {
            &self.tools
        }

        async fn call(&self, tool_call: ToolCall) -> AgentResult<Value> {
            match tool_call.name.as_str() {
                "lookup" => Ok(json!({"result": "y"})),
                "stall" => {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    Ok(json!({}))
                }
                _ => Err(AgentError::ToolNotFound(tool_call.name)),
            }
        }
    }

    fn agent_with(provider: &MockProvider) -> Agent {
        let mut registry = ToolRegistry::new();
        registry.add_system(Box::new(LookupSystem::new())).unwrap();
        Agent::new(Arc::new(provider.clone()), Arc::new(registry))
    }

    fn lookup_call(id: &str) -> Message {
        Message::assistant().with_tool_request(id, ToolCall::new("lookup", json!({"q": "x"})))
    }

    async fn run(agent: &Agent, text: &str) -> Vec<Event> {
        agent
            .reply(vec![Message::user().with_text(text)], CancellationToken::new())
            .unwrap()
            .collect()
            .await
    }

    fn kinds(events: &[Event]) -> Vec<&'static str> {
        events.iter().map(Event::kind).collect()
    }

    #[tokio::test]
    async fn test_plain_answer() {
        let provider = MockProvider::new(vec![Message::assistant().with_text("4")]);
        let events = run(&agent_with(&provider), "2+2?").await;

        assert_eq!(
            kinds(&events),
            vec!["message_start", "content_block_delta", "message_stop"]
        );
        assert_eq!(events[1], Event::text("4"));
        assert_eq!(provider.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_tool_cycle() {
        let provider = MockProvider::new(vec![
            lookup_call("t1"),
            Message::assistant().with_text("done"),
        ]);
        let events = run(&agent_with(&provider), "what is x?").await;

        assert_eq!(
            kinds(&events),
            vec![
                "message_start",
                "tool_use",
                "tool_result",
                "message_start",
                "content_block_delta",
                "message_stop"
            ]
        );
        assert_eq!(events[1], Event::tool_use("t1", "lookup", json!({"q": "x"})));
        assert_eq!(
            events[2],
            Event::tool_result("t1", ToolOutput::success(json!({"result": "y"})))
        );
        assert_eq!(events[4], Event::text("done"));
    }

    #[tokio::test]
    async fn test_history_alternates_and_pairs_tool_results() {
        let provider = MockProvider::new(vec![
            Message::assistant()
                .with_text("Checking twice.")
                .with_tool_request("a", ToolCall::new("lookup", json!({"q": "1"})))
                .with_tool_request("b", ToolCall::new("lookup", json!({"q": "2"}))),
            Message::assistant().with_text("done"),
        ]);
        let events = run(&agent_with(&provider), "look up 1 and 2").await;
        assert_eq!(
            kinds(&events),
            vec![
                "message_start",
                "content_block_delta",
                "tool_use",
                "tool_result",
                "tool_use",
                "tool_result",
                "message_start",
                "content_block_delta",
                "message_stop"
            ]
        );

        let requests = provider.requests();
        assert_eq!(requests.len(), 2);
        let history = &requests[1];
        let roles: Vec<Role> = history.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant, Role::User]);

        let request_ids: Vec<&str> = history[1]
            .tool_requests()
            .iter()
            .map(|r| r.id.as_str())
            .collect();
        let response_ids: Vec<&str> = history[2]
            .content
            .iter()
            .filter_map(MessageContent::as_tool_response)
            .map(|r| r.id.as_str())
            .collect();
        assert_eq!(request_ids, vec!["a", "b"]);
        assert_eq!(response_ids, request_ids);
    }

    #[tokio::test]
    async fn test_unknown_tool_does_not_abort() {
        let provider = MockProvider::new(vec![
            Message::assistant().with_tool_request("t1", ToolCall::new("made_up", json!({}))),
            Message::assistant().with_text("Sorry, I could not do that."),
        ]);
        let events = run(&agent_with(&provider), "hi").await;

        assert_eq!(
            events[2],
            Event::tool_result(
                "t1",
                ToolOutput::Failure("Tool not found: made_up".into())
            )
        );
        assert_eq!(events.last(), Some(&Event::MessageStop));
    }

    #[tokio::test]
    async fn test_turn_limit_emits_exactly_one_error() {
        let responses = (0..20).map(|i| lookup_call(&format!("t{}", i))).collect();
        let provider = MockProvider::new(responses);
        let agent = agent_with(&provider).with_config(AgentConfig {
            max_turns: 3,
            system_prompt: None,
        });
        let events = run(&agent, "loop forever").await;

        assert_eq!(provider.requests().len(), 3);
        assert_eq!(events.len(), 3 * 3 + 1);
        assert_eq!(kinds(&events).iter().filter(|k| **k == "error").count(), 1);
        match events.last() {
            Some(Event::Error { error }) => assert_eq!(error.kind, "max_turns_exceeded"),
            other => panic!("expected an error event, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_model_failure_halts_with_error() {
        let provider = MockProvider::with_results(vec![
            Ok(lookup_call("t1")),
            Err(ProviderError::Status {
                status: 529,
                body: "overloaded".into(),
            }),
        ]);
        let events = run(&agent_with(&provider), "hi").await;

        assert_eq!(
            kinds(&events),
            vec!["message_start", "tool_use", "tool_result", "error"]
        );
        assert_eq!(
            events[3],
            Event::error("api_error", "Server error: 529 - overloaded")
        );
    }

    #[tokio::test]
    async fn test_cancel_during_tool_call_stops_the_stream() {
        let provider = MockProvider::new(vec![
            Message::assistant().with_tool_request("t1", ToolCall::new("stall", json!({}))),
            Message::assistant().with_text("never sent"),
        ]);
        let agent = agent_with(&provider);
        let cancel = CancellationToken::new();
        let mut stream = agent
            .reply(vec![Message::user().with_text("hi")], cancel.clone())
            .unwrap();

        let collected = tokio::time::timeout(Duration::from_secs(5), async {
            let mut seen = Vec::new();
            while let Some(event) = stream.next().await {
                if matches!(event, Event::ToolUse { .. }) {
                    cancel.cancel();
                }
                seen.push(event);
            }
            seen
        })
        .await
        .expect("cancellation should end the stream promptly");

        assert_eq!(kinds(&collected), vec!["message_start", "tool_use"]);
        assert_eq!(provider.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_before_start_emits_nothing() {
        let provider = MockProvider::new(vec![Message::assistant().with_text("4")]);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let events: Vec<Event> = agent_with(&provider)
            .reply(vec![Message::user().with_text("2+2?")], cancel)
            .unwrap()
            .collect()
            .await;

        assert!(events.is_empty());
        assert!(provider.requests().is_empty());
    }

    #[test]
    fn test_system_prompt_mentions_systems() {
        let agent = agent_with(&MockProvider::new(vec![]));
        let prompt = agent.system_prompt().unwrap();
        assert!(prompt.contains("Looks things up"));

        let broken = agent.with_config(AgentConfig {
            max_turns: 1,
            system_prompt: Some("{% if %}".into()),
        });
        assert!(matches!(
            broken.system_prompt(),
            Err(AgentError::Internal(_))
        ));
    }
}
