use serde::Deserialize;
use serde_json::{json, Value};
use warp::http::StatusCode;
use warp::Filter;

const ROOMS: &[(&str, u32, bool)] = &[
    ("studio", 12, true),
    ("workshop", 30, false),
    ("library", 8, true),
];

#[derive(Deserialize)]
struct CallRequest {
    name: String,
    #[serde(default)]
    input: Value,
}

fn tools() -> Value {
    json!([
        {
            "name": "count_words",
            "description": "Count the number of words in text",
            "input_schema": {
                "type": "object",
                "properties": {
                    "text": {"type": "string", "description": "The text to count words in"}
                },
                "required": ["text"]
            }
        },
        {
            "name": "check_room",
            "description": "Check whether a club room is free and how many people it holds",
            "input_schema": {
                "type": "object",
                "properties": {
                    "room": {"type": "string", "enum": ["studio", "workshop", "library"]}
                },
                "required": ["room"]
            }
        }
    ])
}

fn call_tool(request: CallRequest) -> (StatusCode, Value) {
    match request.name.as_str() {
        "count_words" => match request.input.get("text").and_then(Value::as_str) {
            Some(text) => (
                StatusCode::OK,
                json!({ "count": text.split_whitespace().count() }),
            ),
            None => (
                StatusCode::UNPROCESSABLE_ENTITY,
                json!({ "error": "text is required" }),
            ),
        },
        "check_room" => {
            let room = request
                .input
                .get("room")
                .and_then(Value::as_str)
                .unwrap_or_default();
            match ROOMS.iter().find(|(name, _, _)| *name == room) {
                Some((name, capacity, free)) => (
                    StatusCode::OK,
                    json!({ "room": name, "capacity": capacity, "free": free }),
                ),
                None => (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    json!({ "error": format!("unknown room '{}'", room) }),
                ),
            }
        }
        other => (
            StatusCode::NOT_FOUND,
            json!({ "error": format!("no tool named '{}'", other) }),
        ),
    }
}

fn routes() -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    let list = warp::path!("tools")
        .and(warp::get())
        .map(|| warp::reply::json(&tools()));

    let call = warp::path!("call")
        .and(warp::post())
        .and(warp::body::json())
        .map(|request: CallRequest| {
            let (status, body) = call_tool(request);
            warp::reply::with_status(warp::reply::json(&body), status)
        });

    list.or(call)
}

#[tokio::main]
async fn main() {
    let port = std::env::var("STUB_SYSTEM_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8081u16);

    println!("Stub tool server running at http://127.0.0.1:{}", port);
    warp::serve(routes()).run(([127, 0, 0, 1], port)).await;
}
