//! HTTP surface: tool dispatch and resource views.

use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use serde::Deserialize;
use tower_http::cors::CorsLayer;

use crate::engine::Engine;
use crate::error::ErrorKind;
use crate::tools::{ToolRegistry, ToolReply};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
    pub registry: Arc<ToolRegistry>,
}

/// Build the Axum router with tool and resource routes.
pub fn routes(engine: Arc<Engine>, registry: Arc<ToolRegistry>) -> Router {
    let state = AppState { engine, registry };

    Router::new()
        .route("/health", get(health))
        .route("/tools", get(list_tools))
        .route("/tools/{name}", post(call_tool))
        .route("/resources", get(list_resources))
        .route("/resources/{*key}", get(read_resource))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ── Health ──────────────────────────────────────────────────────────────

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "unified-inbox"
    }))
}

// ── Tools ───────────────────────────────────────────────────────────────

async fn list_tools(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.registry.tool_definitions().await)
}

async fn call_tool(
    State(state): State<AppState>,
    Path(name): Path<String>,
    body: Bytes,
) -> impl IntoResponse {
    let params = if body.iter().all(u8::is_ascii_whitespace) {
        serde_json::json!({})
    } else {
        match serde_json::from_slice::<serde_json::Value>(&body) {
            Ok(value) => value,
            Err(e) => {
                let reply = ToolReply::error(
                    ErrorKind::InvalidParameters,
                    format!("Request body is not valid JSON: {e}"),
                );
                return (StatusCode::BAD_REQUEST, Json(reply));
            }
        }
    };

    let reply = state.registry.dispatch(&name, params).await;
    (status_for(&reply), Json(reply))
}

// ── Resources ───────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ViewQuery {
    limit: Option<usize>,
}

async fn list_resources(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.engine.list_resources().await)
}

/// `key` arrives percent-decoded, e.g. `/resources/email%3A%2F%2Funread`.
async fn read_resource(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Query(query): Query<ViewQuery>,
) -> impl IntoResponse {
    match state.engine.get_view(&key, query.limit).await {
        Ok(view) => (StatusCode::OK, Json(view)),
        Err(e) => {
            let reply = ToolReply::error(e.kind(), e.to_string());
            let status = status_for(&reply);
            (status, Json(serde_json::json!(reply)))
        }
    }
}

fn status_for(reply: &ToolReply) -> StatusCode {
    match reply {
        ToolReply::Text { .. } => StatusCode::OK,
        ToolReply::Error { kind, .. } => match kind {
            ErrorKind::ToolNotFound | ErrorKind::ViewNotFound => StatusCode::NOT_FOUND,
            ErrorKind::InvalidParameters | ErrorKind::MalformedRecord => StatusCode::BAD_REQUEST,
            ErrorKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
            ErrorKind::NotConfigured => StatusCode::SERVICE_UNAVAILABLE,
            ErrorKind::Provider | ErrorKind::Llm => StatusCode::BAD_GATEWAY,
            ErrorKind::Config | ErrorKind::Taxonomy => StatusCode::INTERNAL_SERVER_ERROR,
        },
    }
}
