use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use tower_http::trace::TraceLayer;
use tracing::debug;

use crate::gateway::Gateway;

pub struct AppState {
    pub gateway: Arc<Gateway>,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn hello() -> &'static str {
    "Hello, LINE Bot 👋"
}

/// LINE webhook endpoint. Always acknowledges with `200 OK`; relay failures
/// only show up in the logs.
async fn callback(State(state): State<Arc<AppState>>, body: Bytes) -> &'static str {
    let outcomes = state.gateway.handle_body(&body).await;
    debug!("Handled webhook with {} event(s): {outcomes:?}", outcomes.len());
    "OK"
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(hello))
        .route("/health", get(health))
        .route("/callback", post(callback))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
