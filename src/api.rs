//! REST API Server for the loan advisor
//!
//! Exposes the dialogue controller via HTTP endpoints
//! Integrates with the chat front-end

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::agent::DialogueController;

/// =============================
/// Request / Response Models
/// =============================

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatReply {
    pub reply: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorReply {
    pub error: String,
}

pub const INTERNAL_ERROR: &str = "Something went wrong.";

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorReply {
            error: message.into(),
        }),
    )
        .into_response()
}

/// =============================
/// API State
/// =============================

#[derive(Clone)]
pub struct ApiState {
    pub controller: Arc<DialogueController>,
    /// Applied when a request has no `userId`; `None` makes it mandatory
    pub default_user: Option<String>,
}

/// =============================
/// Health Endpoint
/// =============================

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// =============================
/// Chat Endpoint
/// =============================

async fn chat_handler(
    State(state): State<ApiState>,
    payload: std::result::Result<Json<ChatRequest>, JsonRejection>,
) -> Response {
    let Json(req) = match payload {
        Ok(req) => req,
        Err(rejection) => {
            warn!("Rejected chat request: {}", rejection.body_text());
            return error_response(StatusCode::BAD_REQUEST, rejection.body_text());
        }
    };

    let user_id = match req
        .user_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
    {
        Some(id) => id.to_string(),
        None => match &state.default_user {
            Some(default_user) => default_user.clone(),
            None => {
                return error_response(StatusCode::BAD_REQUEST, "userId is required");
            }
        },
    };

    info!(user_id = %user_id, "Received chat message");

    match state.controller.handle(&user_id, &req.message).await {
        Ok(reply) => (StatusCode::OK, Json(ChatReply { reply: reply.reply })).into_response(),
        Err(e) => {
            error!(user_id = %user_id, "Error processing request: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR)
        }
    }
}

/// =============================
/// Router
/// =============================

pub fn create_router(controller: Arc<DialogueController>, default_user: Option<String>) -> Router {
    let state = ApiState {
        controller,
        default_user,
    };

    Router::new()
        .route("/health", get(health))
        .route("/chatbot", post(chat_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(
    controller: Arc<DialogueController>,
    default_user: Option<String>,
    port: u16,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let router = create_router(controller, default_user);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("Server running on http://0.0.0.0:{}", port);
    info!("Local: http://localhost:{}", port);

    axum::serve(listener, router).await?;

    Ok(())
}
