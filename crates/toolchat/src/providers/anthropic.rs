use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use reqwest::StatusCode;
use serde_json::{json, Value};
use std::time::Duration;

use super::base::{Provider, Usage};
use super::configs::AnthropicProviderConfig;
use crate::errors::ProviderError;
use crate::models::message::{Message, MessageContent};
use crate::models::tool::{Tool, ToolCall};

const ANTHROPIC_VERSION: &str = "2023-06-01";

pub struct AnthropicProvider {
    client: Client,
    config: AnthropicProviderConfig,
}

impl AnthropicProvider {
    pub fn new(config: AnthropicProviderConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(600)) // 10 minutes timeout
            .build()?;

        Ok(Self { client, config })
    }

    fn get_usage(data: &Value) -> Usage {
        let usage = &data["usage"];
        let input_tokens = usage["input_tokens"].as_i64().map(|v| v as i32);
        let output_tokens = usage["output_tokens"].as_i64().map(|v| v as i32);
        let total_tokens = match (input_tokens, output_tokens) {
            (Some(input), Some(output)) => Some(input + output),
            _ => None,
        };
        Usage::new(input_tokens, output_tokens, total_tokens)
    }

    fn content_to_anthropic_spec(content: &MessageContent) -> Option<Value> {
        match content {
            MessageContent::Text(text) if text.text.is_empty() => None,
            MessageContent::Text(text) => Some(json!({
                "type": "text",
                "text": text.text,
            })),
            MessageContent::Image(image) => Some(json!({
                "type": "image",
                "source": {
                    "type": "base64",
                    "media_type": image.mime_type,
                    "data": image.data,
                }
            })),
            MessageContent::ToolRequest(request) => Some(json!({
                "type": "tool_use",
                "id": request.id,
                "name": request.tool_call.name,
                "input": request.tool_call.input,
            })),
            MessageContent::ToolResponse(response) => Some(json!({
                "type": "tool_result",
                "tool_use_id": response.id,
                "content": response.output.to_value().to_string(),
                "is_error": response.output.is_error(),
            })),
        }
    }

    fn messages_to_anthropic_spec(messages: &[Message]) -> Vec<Value> {
        messages
            .iter()
            .map(|message| {
                let content: Vec<Value> = message
                    .content
                    .iter()
                    .filter_map(Self::content_to_anthropic_spec)
                    .collect();
                json!({
                    "role": message.role.as_str(),
                    "content": content,
                })
            })
            .collect()
    }

    fn tools_to_anthropic_spec(tools: &[Tool]) -> Vec<Value> {
        tools
            .iter()
            .map(|tool| {
                json!({
                    "name": tool.name,
                    "description": tool.description,
                    "input_schema": tool.input_schema,
                })
            })
            .collect()
    }

    fn response_to_message(response: &Value) -> Result<Message, ProviderError> {
        let blocks = response
            .get("content")
            .and_then(|c| c.as_array())
            .ok_or_else(|| {
                ProviderError::Format("missing content in Anthropic response".to_string())
            })?;

        let mut message = Message::assistant();
        for block in blocks {
            match block["type"].as_str() {
                Some("text") => {
                    let text = block["text"].as_str().unwrap_or_default();
                    message = message.with_text(text);
                }
                Some("tool_use") => {
                    let id = block["id"].as_str().ok_or_else(|| {
                        ProviderError::Format("tool_use block without id".to_string())
                    })?;
                    let name = block["name"].as_str().ok_or_else(|| {
                        ProviderError::Format("tool_use block without name".to_string())
                    })?;
                    let input = block.get("input").cloned().unwrap_or_else(|| json!({}));
                    message = message.with_tool_request(id, ToolCall::new(name, input));
                }
                other => {
                    tracing::debug!(block_type = ?other, "skipping unsupported content block");
                }
            }
        }
        Ok(message)
    }

    async fn post(&self, payload: Value) -> Result<Value, ProviderError> {
        let url = format!("{}/v1/messages", self.config.host.trim_end_matches('/'));

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&payload)
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => Ok(response.json().await?),
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(ProviderError::Status {
                    status: status.as_u16(),
                    body,
                })
            }
        }
    }
}

#[async_trait]
impl Provider for AnthropicProvider {
    fn model(&self) -> &str {
        &self.config.model
    }

    async fn complete(
        &self,
        system: &str,
        messages: &[Message],
        tools: &[Tool],
    ) -> Result<(Message, Usage), ProviderError> {
        let mut payload = json!({
            "model": self.config.model,
            "messages": Self::messages_to_anthropic_spec(messages),
            "max_tokens": self.config.max_tokens.unwrap_or(4096),
        });

        if !system.is_empty() {
            payload["system"] = json!(system);
        }
        if !tools.is_empty() {
            payload["tools"] = json!(Self::tools_to_anthropic_spec(tools));
        }
        if let Some(temp) = self.config.temperature {
            payload["temperature"] = json!(temp);
        }

        let response = self.post(payload).await?;
        let message = Self::response_to_message(&response)?;
        let usage = Self::get_usage(&response);

        tracing::debug!(
            model = %self.config.model,
            input_tokens = ?usage.input_tokens,
            output_tokens = ?usage.output_tokens,
            stop_reason = ?response["stop_reason"].as_str(),
            "model call completed"
        );

        Ok((message, usage))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::tool::ToolOutput;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn setup_mock_server(response_body: Value) -> (MockServer, AnthropicProvider) {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(header("x-api-key", "test_api_key"))
            .and(header("anthropic-version", ANTHROPIC_VERSION))
            .respond_with(ResponseTemplate::new(200).set_body_json(response_body))
            .mount(&mock_server)
            .await;

        let config = AnthropicProviderConfig {
            host: mock_server.uri(),
            api_key: "test_api_key".to_string(),
            model: "claude-3-5-sonnet-latest".to_string(),
            temperature: Some(0.7),
            max_tokens: None,
        };

        let provider = AnthropicProvider::new(config).unwrap();
        (mock_server, provider)
    }

    #[tokio::test]
    async fn test_complete_basic() -> Result<()> {
        let response_body = json!({
            "id": "msg_123",
            "type": "message",
            "role": "assistant",
            "content": [{
                "type": "text",
                "text": "Hello! How can I assist you today?"
            }],
            "model": "claude-3-5-sonnet-latest",
            "stop_reason": "end_turn",
            "stop_sequence": null,
            "usage": {
                "input_tokens": 12,
                "output_tokens": 15
            }
        });

        let (_, provider) = setup_mock_server(response_body).await;

        let messages = vec![Message::user().with_text("Hello?")];

        let (message, usage) = provider
            .complete("You are a helpful assistant.", &messages, &[])
            .await?;

        assert_eq!(
            message.content[0],
            MessageContent::text("Hello! How can I assist you today?")
        );
        assert_eq!(usage.input_tokens, Some(12));
        assert_eq!(usage.output_tokens, Some(15));
        assert_eq!(usage.total_tokens, Some(27));

        Ok(())
    }

    #[tokio::test]
    async fn test_complete_tool_use() -> Result<()> {
        let response_body = json!({
            "id": "msg_456",
            "type": "message",
            "role": "assistant",
            "content": [
                {"type": "text", "text": "Let me look that up."},
                {"type": "tool_use", "id": "toolu_1", "name": "lookup", "input": {"q": "x"}}
            ],
            "stop_reason": "tool_use",
            "usage": {"input_tokens": 30, "output_tokens": 10}
        });

        let (server, provider) = setup_mock_server(response_body).await;
        let tool = Tool::new(
            "lookup",
            "Look something up",
            json!({"type": "object", "properties": {"q": {"type": "string"}}, "required": ["q"]}),
        );

        let messages = vec![Message::user().with_text("What is x?")];
        let (message, _) = provider.complete("system", &messages, &[tool]).await?;

        assert_eq!(message.texts(), vec!["Let me look that up."]);
        let requests = message.tool_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].id, "toolu_1");
        assert_eq!(requests[0].tool_call, ToolCall::new("lookup", json!({"q": "x"})));

        let received = server.received_requests().await.unwrap();
        let body: Value = serde_json::from_slice(&received[0].body)?;
        assert_eq!(body["system"], json!("system"));
        assert_eq!(body["tools"][0]["name"], json!("lookup"));
        assert_eq!(body["tools"][0]["input_schema"]["required"], json!(["q"]));
        Ok(())
    }

    #[tokio::test]
    async fn test_history_includes_tool_blocks() -> Result<()> {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(body_partial_json(json!({
                "messages": [
                    {"role": "user", "content": [
                        {"type": "image", "source": {"type": "base64", "media_type": "image/png", "data": "aGk="}},
                        {"type": "text", "text": "look"}
                    ]},
                    {"role": "assistant", "content": [
                        {"type": "tool_use", "id": "t1", "name": "lookup", "input": {"q": "x"}}
                    ]},
                    {"role": "user", "content": [
                        {"type": "tool_result", "tool_use_id": "t1", "content": "{\"error\":\"bad\"}", "is_error": true}
                    ]}
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "content": [{"type": "text", "text": "ok"}]
            })))
            .mount(&mock_server)
            .await;

        let mut config = AnthropicProviderConfig::new("key");
        config.host = mock_server.uri();
        let provider = AnthropicProvider::new(config)?;

        let messages = vec![
            Message::user().with_image("aGk=", "image/png").with_text("look"),
            Message::assistant()
                .with_tool_request("t1", ToolCall::new("lookup", json!({"q": "x"}))),
            Message::user().with_tool_response(
                "t1",
                ToolOutput::Failure("bad".into()),
            ),
        ];
        let (message, usage) = provider.complete("", &messages, &[]).await?;
        assert_eq!(message.texts(), vec!["ok"]);
        assert_eq!(usage, Usage::default());
        Ok(())
    }

    #[tokio::test]
    async fn test_error_status_is_classified() -> Result<()> {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(ResponseTemplate::new(529).set_body_string("overloaded"))
            .mount(&mock_server)
            .await;

        let mut config = AnthropicProviderConfig::new("key");
        config.host = mock_server.uri();
        let provider = AnthropicProvider::new(config)?;

        let err = provider
            .complete("", &[Message::user().with_text("hi")], &[])
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "api_error");
        assert!(err.to_string().contains("overloaded"));
        Ok(())
    }
}
