//! Authentication API endpoints
//!
//! - GET /api/auth/login - Redirect to the identity provider
//! - GET /api/auth/callback - Complete the OAuth login
//! - GET /api/auth/status - Current user (gated)
//! - POST /api/auth/logout - End the current session (gated)

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::cookie::{session_cookie, CLEAR_SESSION_COOKIE};
use crate::api::middleware::{ApiError, AppState, AuthenticatedSession, AuthenticatedUser};
use crate::models::User;
use crate::services::AuthError;

/// Query parameters sent by the provider to the callback
#[derive(Debug, Default, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    /// Set when the user denied access or the provider refused the request
    pub error: Option<String>,
    pub error_description: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub user: User,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Build protected auth routes (requires the session gate)
pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/status", get(status))
        .route("/logout", post(logout))
}

/// Build public auth routes
pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/login", get(login))
        .route("/callback", get(oauth_callback))
}

/// 302 to `location`, optionally setting a cookie
fn found(location: &str, cookie: Option<&str>) -> Result<Response, ApiError> {
    let location = HeaderValue::from_str(location)
        .map_err(|_| ApiError::internal_error("Invalid redirect location"))?;
    let mut response = StatusCode::FOUND.into_response();
    response.headers_mut().insert(header::LOCATION, location);
    if let Some(cookie) = cookie {
        let cookie = HeaderValue::from_str(cookie)
            .map_err(|_| ApiError::internal_error("Invalid session cookie"))?;
        response.headers_mut().insert(header::SET_COOKIE, cookie);
    }
    Ok(response)
}

/// GET /api/auth/login - Start a login at the provider
async fn login(State(state): State<AppState>) -> Result<Response, ApiError> {
    found(&state.login_service.authorize_url(), None)
}

/// GET /api/auth/callback - Complete the OAuth login.
///
/// Always answers with a redirect. On success the session cookie is set and
/// the browser goes to the success destination; on any failure the cause is
/// logged and the browser goes to the failure destination without a cookie.
/// An undecodable query string (a repeated `code`, for one) is such a failure.
pub async fn oauth_callback(
    State(state): State<AppState>,
    query: Result<Query<CallbackQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    let query = match query {
        Ok(Query(query)) => query,
        Err(rejection) => {
            tracing::warn!(
                error.kind = "malformed_query",
                error.cause = %rejection.body_text(),
                "OAuth callback with undecodable query string"
            );
            return found(&state.auth.failure_redirect, None);
        }
    };

    if let Some(error) = query.error.as_deref() {
        tracing::warn!(
            provider.error = error,
            provider.error_description = query.error_description.as_deref().unwrap_or(""),
            "Identity provider returned an error to the callback"
        );
    }

    match state.login_service.complete_login(query.code.as_deref()).await {
        Ok((_user, session)) => found(
            &state.auth.success_redirect,
            Some(&session_cookie(&session)),
        ),
        Err(err) => {
            match err {
                AuthError::MissingCode => tracing::warn!(
                    error.kind = err.kind(),
                    error.cause = %err,
                    "OAuth callback without authorization code"
                ),
                _ => tracing::error!(
                    error.kind = err.kind(),
                    error.cause = %err,
                    "OAuth callback failed"
                ),
            }
            found(&state.auth.failure_redirect, None)
        }
    }
}

/// GET /api/auth/status - Current user
async fn status(AuthenticatedUser(user): AuthenticatedUser) -> Json<StatusResponse> {
    Json(StatusResponse { user })
}

/// POST /api/auth/logout - End the current session
async fn logout(
    State(state): State<AppState>,
    AuthenticatedSession(session): AuthenticatedSession,
) -> Result<impl IntoResponse, ApiError> {
    state
        .session_service
        .delete_by_token(&session.token)
        .await
        .map_err(|e| ApiError::internal_error(e.to_string()))?;

    tracing::info!(session_id = session.id, user_id = session.user_id, "Logged out");

    Ok((
        [(header::SET_COOKIE, CLEAR_SESSION_COOKIE)],
        Json(MessageResponse {
            message: "Logged out successfully".to_string(),
        }),
    ))
}
