//! Guestbook message endpoints
//!
//! - GET /api/messages - List messages, newest first
//! - POST /api/messages - Post a message (gated)

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::models::{CreateMessageInput, Message};
use crate::services::MessageServiceError;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostMessageResponse {
    pub status_message: String,
    pub name: String,
    pub message: String,
}

/// Public message routes
pub fn public_router() -> Router<AppState> {
    Router::new().route("/messages", get(list_messages))
}

/// Message routes behind the session gate
pub fn protected_router() -> Router<AppState> {
    Router::new().route("/messages", post(post_message))
}

fn map_service_error(err: MessageServiceError) -> ApiError {
    match err {
        MessageServiceError::ValidationError(msg) => ApiError::validation_error(msg),
        MessageServiceError::InternalError(e) => {
            tracing::error!(error = %format!("{:#}", e), "Message store failure");
            ApiError::internal_error("Failed to process message")
        }
    }
}

/// GET /api/messages
async fn list_messages(State(state): State<AppState>) -> Result<Json<Vec<Message>>, ApiError> {
    let messages = state
        .message_service
        .list()
        .await
        .map_err(map_service_error)?;
    Ok(Json(messages))
}

/// POST /api/messages
async fn post_message(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(input): Json<CreateMessageInput>,
) -> Result<impl IntoResponse, ApiError> {
    let message = state
        .message_service
        .post(&user, input)
        .await
        .map_err(map_service_error)?;

    Ok((
        StatusCode::CREATED,
        Json(PostMessageResponse {
            status_message: "Message added successfully".to_string(),
            name: message.name,
            message: message.message,
        }),
    ))
}
