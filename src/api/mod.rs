//! API layer - HTTP handlers and routing
//!
//! Everything is served under `/api`:
//! - Auth endpoints (login redirect, OAuth callback, status, logout)
//! - Guestbook message endpoints
//! - Health check

pub mod auth;
pub mod cookie;
pub mod gate;
pub mod messages;
pub mod middleware;

#[cfg(test)]
mod tests;

use axum::{
    extract::State,
    http::{header, HeaderValue, Method},
    middleware as axum_middleware,
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub use gate::{require_session, RequestContext, Stage, StageChain};
pub use middleware::{ApiError, AppState, AuthenticatedSession, AuthenticatedUser};

/// Build the API router (mounted under `/api`)
pub fn build_api_router(state: AppState) -> Router<AppState> {
    // Routes behind the session gate
    let protected_routes = Router::new()
        .nest("/auth", auth::protected_router())
        .merge(messages::protected_router())
        .route_layer(axum_middleware::from_fn_with_state(
            state,
            gate::require_session,
        ));

    // Public routes
    Router::new()
        .nest("/auth", auth::public_router())
        .merge(messages::public_router())
        .route("/health", get(health))
        .merge(protected_routes)
}

/// Build the complete router with middleware
pub fn build_router(state: AppState, cors_origin: &str) -> anyhow::Result<Router> {
    // Credentials are allowed so the browser sends the session cookie cross-origin.
    let origin = cors_origin
        .parse::<HeaderValue>()
        .map_err(|e| anyhow::anyhow!("Invalid CORS origin '{}': {}", cors_origin, e))?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE, header::COOKIE])
        .allow_credentials(true);

    Ok(Router::new()
        .nest("/api", build_api_router(state.clone()))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state))
}

/// GET /api/health - Liveness plus a store ping
async fn health(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    state.pool.ping().await.map_err(|e| {
        tracing::error!(error = %e, "Health check failed");
        ApiError::new("SERVICE_UNAVAILABLE", "Database unavailable")
    })?;
    Ok(Json(json!({ "status": "ok" })))
}
