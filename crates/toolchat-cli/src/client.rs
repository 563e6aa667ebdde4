use futures::StreamExt;
use reqwest::Client;
use serde_json::Value;
use thiserror::Error;
use toolchat::codec::EventDecoder;
use toolchat::events::Event;
use toolchat::models::content::ImageContent;
use toolchat::models::tool::Tool;
use toolchat::reducer::ConversationState;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Could not reach the server: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },
}

/// HTTP client for a toolchat server
#[derive(Clone)]
pub struct ChatClient {
    http: Client,
    base_url: String,
}

impl ChatClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub async fn tools(&self) -> Result<Vec<Tool>, ClientError> {
        let response = self
            .http
            .get(format!("{}/tools", self.base_url))
            .send()
            .await?;
        let response = check_status(response).await?;
        Ok(response.json().await?)
    }

    /// Submit a user message and fold the streamed reply into `state`.
    ///
    /// `on_event` is called after each event has been applied. If the request fails before
    /// anything streams, the fallback message is recorded in `state` and the error returned.
    pub async fn submit<F>(
        &self,
        state: &mut ConversationState,
        text: &str,
        images: Vec<ImageContent>,
        mut on_event: F,
    ) -> Result<(), ClientError>
    where
        F: FnMut(&Event, &ConversationState),
    {
        state.submit(text, images);
        let request = state.to_request();

        let response = match self.start(&request).await {
            Ok(response) => response,
            Err(err) => {
                state.fail_submission(err.to_string());
                return Err(err);
            }
        };

        let mut decoder = EventDecoder::new();
        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(err) => {
                    tracing::warn!(error = %err, "reply stream interrupted");
                    break;
                }
            };
            for event in decoder.push(&chunk) {
                state.apply(&event);
                on_event(&event, state);
            }
        }
        if let Some(event) = decoder.finish() {
            state.apply(&event);
            on_event(&event, state);
        }
        if decoder.decode_errors() > 0 {
            tracing::warn!(dropped = decoder.decode_errors(), "dropped undecodable frames");
        }

        state.finish();
        Ok(())
    }

    async fn start(
        &self,
        request: &toolchat::request::ChatRequest,
    ) -> Result<reqwest::Response, ClientError> {
        let response = self
            .http
            .post(format!("{}/reply", self.base_url))
            .json(request)
            .send()
            .await?;
        check_status(response).await
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|v| v["error"].as_str().map(str::to_string))
        .unwrap_or(body);
    Err(ClientError::Rejected {
        status: status.as_u16(),
        message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use toolchat::codec::encode_frame;
    use toolchat::models::tool::ToolOutput;
    use toolchat::providers::base::Usage;
    use toolchat::reducer::FALLBACK_ERROR;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sse(events: &[Event]) -> Vec<u8> {
        events
            .iter()
            .flat_map(|e| encode_frame(e).unwrap().into_bytes())
            .collect()
    }

    #[tokio::test]
    async fn test_submit_folds_stream_into_state() {
        let server = MockServer::start().await;
        let body = sse(&[
            Event::message_start("mock", Usage::default()),
            Event::tool_use("t1", "lookup", json!({"q": "x"})),
            Event::tool_result("t1", ToolOutput::success(json!({"result": "y"}))),
            Event::message_start("mock", Usage::default()),
            Event::text("done"),
            Event::MessageStop,
        ]);
        Mock::given(method("POST"))
            .and(path("/reply"))
            .and(body_partial_json(json!({
                "messages": [{"role": "user", "content": "what is x?"}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
            .mount(&server)
            .await;

        let client = ChatClient::new(&server.uri());
        let mut state = ConversationState::new();
        let mut seen = 0;
        client
            .submit(&mut state, "what is x?", vec![], |_, _| seen += 1)
            .await
            .unwrap();

        assert_eq!(seen, 6);
        assert!(!state.is_loading());
        let reply = &state.messages()[1];
        assert_eq!(reply.content, "done");
        assert_eq!(reply.tools_used.len(), 1);
        assert!(!reply.is_streaming);
    }

    #[tokio::test]
    async fn test_truncated_stream_marks_message_incomplete() {
        let server = MockServer::start().await;
        let body = sse(&[
            Event::message_start("mock", Usage::default()),
            Event::text("half"),
        ]);
        Mock::given(method("POST"))
            .and(path("/reply"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
            .mount(&server)
            .await;

        let client = ChatClient::new(&server.uri());
        let mut state = ConversationState::new();
        client
            .submit(&mut state, "hi", vec![], |_, _| {})
            .await
            .unwrap();

        let reply = &state.messages()[1];
        assert_eq!(reply.content, "half");
        assert!(reply.error.is_some());
        assert!(!reply.is_streaming);
    }

    #[tokio::test]
    async fn test_rejected_request_shows_fallback() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/reply"))
            .respond_with(
                ResponseTemplate::new(400)
                    .set_body_json(json!({"error": "the first message must come from the user"})),
            )
            .mount(&server)
            .await;

        let client = ChatClient::new(&server.uri());
        let mut state = ConversationState::new();
        let err = client
            .submit(&mut state, "hi", vec![], |_, _| {})
            .await
            .unwrap_err();

        match err {
            ClientError::Rejected { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "the first message must come from the user");
            }
            other => panic!("unexpected error {:?}", other),
        }
        assert_eq!(state.messages()[1].error.as_deref(), Some(FALLBACK_ERROR));
        assert!(!state.is_loading());
    }

    #[tokio::test]
    async fn test_unreachable_server_shows_fallback() {
        // Nothing listens on the discard port
        let client = ChatClient::new("http://127.0.0.1:9");
        let mut state = ConversationState::new();
        let err = client
            .submit(&mut state, "hi", vec![], |_, _| {})
            .await
            .unwrap_err();

        assert!(matches!(err, ClientError::Transport(_)));
        assert_eq!(state.messages().len(), 2);
        assert_eq!(state.messages()[1].error.as_deref(), Some(FALLBACK_ERROR));
    }

    #[tokio::test]
    async fn test_tools() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/tools"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"name": "lookup", "description": "Look something up", "input_schema": {"type": "object"}}
            ])))
            .mount(&server)
            .await;

        let tools = ChatClient::new(&server.uri()).tools().await.unwrap();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name, "lookup");
    }
}
