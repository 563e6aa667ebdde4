use crate::error::ApiError;
use crate::state::AppState;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use bytes::Bytes;
use futures::{stream::StreamExt, Stream};
use serde::{Deserialize, Serialize};
use std::{
    convert::Infallible,
    pin::Pin,
    task::{Context, Poll},
};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use toolchat::codec::encode_frame;
use toolchat::events::{Delta, Event};
use toolchat::models::message::Message;
use toolchat::request::ChatRequest;

/// Frames buffered between the turn loop and the response body
const CHANNEL_CAPACITY: usize = 100;

/// An event stream response fed by the frames sent into a channel
pub struct SseResponse {
    rx: ReceiverStream<String>,
}

impl SseResponse {
    fn new(rx: ReceiverStream<String>) -> Self {
        Self { rx }
    }
}

impl Stream for SseResponse {
    type Item = Result<Bytes, Infallible>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.rx)
            .poll_next(cx)
            .map(|opt| opt.map(|s| Ok(Bytes::from(s))))
    }
}

impl IntoResponse for SseResponse {
    fn into_response(self) -> axum::response::Response {
        let body = axum::body::Body::from_stream(self);
        (
            [
                (header::CONTENT_TYPE, "text/event-stream"),
                (header::CACHE_CONTROL, "no-cache"),
                (header::CONNECTION, "keep-alive"),
            ],
            body,
        )
            .into_response()
    }
}

fn parse_history(
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Vec<Message>, ApiError> {
    let Json(request) = payload.map_err(|rejection| {
        tracing::info!(error = %rejection.body_text(), "rejected request body");
        ApiError::new(rejection.status(), rejection.body_text())
    })?;
    request.into_messages().map_err(|err| {
        tracing::info!(error = %err, "rejected conversation history");
        ApiError::bad_request(err.to_string())
    })
}

async fn handler(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<SseResponse, ApiError> {
    let messages = parse_history(payload)?;

    let cancel = CancellationToken::new();
    let mut events = state
        .agent
        .reply(messages, cancel.clone())
        .map_err(|err| {
            tracing::error!(error = %err, "failed to start reply");
            ApiError::internal(err.to_string())
        })?;

    // Create channel for streaming
    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);

    // Spawn task to handle streaming
    tokio::spawn(async move {
        let mut sent = 0usize;
        loop {
            tokio::select! {
                // The client went away, abandon whatever is in flight
                _ = tx.closed() => {
                    tracing::info!(sent, "client disconnected, cancelling reply");
                    cancel.cancel();
                    break;
                }
                event = events.next() => {
                    let Some(event) = event else { break };
                    let frame = match encode_frame(&event) {
                        Ok(frame) => frame,
                        Err(err) => {
                            tracing::error!(error = %err, kind = event.kind(), "failed to encode event");
                            continue;
                        }
                    };
                    if tx.send(frame).await.is_err() {
                        tracing::info!(sent, "client disconnected, cancelling reply");
                        cancel.cancel();
                        break;
                    }
                    sent += 1;
                }
            }
        }
        tracing::debug!(sent, "reply stream finished");
    });

    Ok(SseResponse::new(ReceiverStream::new(rx)))
}

#[derive(Debug, Deserialize)]
struct AskRequest {
    prompt: String,
}

#[derive(Debug, Serialize)]
struct AskResponse {
    response: String,
}

// simple ask an AI for a response, non streaming
async fn ask_handler(
    State(state): State<AppState>,
    payload: Result<Json<AskRequest>, JsonRejection>,
) -> Result<Json<AskResponse>, ApiError> {
    let Json(request) =
        payload.map_err(|rejection| ApiError::new(rejection.status(), rejection.body_text()))?;
    if request.prompt.trim().is_empty() {
        return Err(ApiError::bad_request("prompt must not be empty"));
    }

    let messages = vec![Message::user().with_text(request.prompt)];
    let mut stream = state
        .agent
        .reply(messages, CancellationToken::new())
        .map_err(|err| ApiError::internal(err.to_string()))?;

    let mut response_text = String::new();
    while let Some(event) = stream.next().await {
        match event {
            Event::MessageStart { .. } if !response_text.is_empty() => {
                response_text.push_str("\n\n");
            }
            Event::ContentBlockDelta {
                delta: Delta::TextDelta { text },
            } => response_text.push_str(&text),
            Event::Error { error } => {
                tracing::error!(kind = %error.kind, "ask failed: {}", error.message);
                return Err(ApiError::new(StatusCode::BAD_GATEWAY, error.message));
            }
            _ => {}
        }
    }

    Ok(Json(AskResponse {
        response: response_text.trim().to_string(),
    }))
}

// Configure routes for this module
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/reply", post(handler))
        .route("/ask", post(ask_handler))
        .with_state(state)
}
