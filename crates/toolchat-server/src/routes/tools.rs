use crate::state::AppState;
use axum::{extract::State, routing::get, Json, Router};
use toolchat::models::tool::Tool;

/// The tool manifest advertised to the model
async fn handler(State(state): State<AppState>) -> Json<Vec<Tool>> {
    Json(state.agent.tools().to_vec())
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/tools", get(handler))
        .with_state(state)
}
