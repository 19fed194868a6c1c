//! Session gate
//!
//! Gated routes run a fixed chain of [`Stage`]s before the handler. Each
//! stage either enriches the [`RequestContext`] or rejects the request; the
//! first rejection ends the chain and is returned to the client unchanged.
//!
//! The standard chain built by [`StageChain::session_gate`] is:
//!
//! 1. [`ExtractSessionToken`]: read `session_token` from the `Cookie` header
//! 2. [`LookupSession`]: find the session row for the token
//! 3. [`RejectExpired`]: refuse (and delete) sessions past `expires_at`
//! 4. [`ResolveUser`]: load the owning user
//!
//! [`require_session`] adapts the chain to axum and attaches
//! [`AuthenticatedUser`] and [`AuthenticatedSession`] for handlers.

use async_trait::async_trait;
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use std::sync::Arc;

use crate::api::cookie::{cookie_value, SESSION_COOKIE};
use crate::api::middleware::{ApiError, AppState, AuthenticatedSession, AuthenticatedUser};
use crate::models::{Session, User};
use crate::services::{AuthError, SessionService, UserService};

pub const REASON_NO_SESSION_TOKEN: &str = "no session token";
pub const REASON_INVALID_SESSION_TOKEN: &str = "invalid session token";
pub const REASON_SESSION_EXPIRED: &str = "session expired";
pub const REASON_USER_NOT_FOUND: &str = "user not found";

/// State threaded through the stages of one request
#[derive(Debug, Default)]
pub struct RequestContext {
    pub headers: HeaderMap,
    pub token: Option<String>,
    pub session: Option<Session>,
    pub user: Option<User>,
}

impl RequestContext {
    pub fn new(headers: HeaderMap) -> Self {
        Self {
            headers,
            ..Self::default()
        }
    }
}

/// One step of the gate
#[async_trait]
pub trait Stage: Send + Sync {
    /// Continue with `Ok(())`, or stop the chain with the response to send
    async fn handle(&self, ctx: &mut RequestContext) -> Result<(), Response>;
}

/// Ordered list of stages
#[derive(Default)]
pub struct StageChain {
    stages: Vec<Arc<dyn Stage>>,
}

impl StageChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a stage; stages run in the order they were added
    pub fn with_stage(mut self, stage: impl Stage + 'static) -> Self {
        self.stages.push(Arc::new(stage));
        self
    }

    /// The standard session gate
    pub fn session_gate(sessions: Arc<SessionService>, users: Arc<UserService>) -> Self {
        Self::new()
            .with_stage(ExtractSessionToken)
            .with_stage(LookupSession {
                sessions: sessions.clone(),
            })
            .with_stage(RejectExpired { sessions })
            .with_stage(ResolveUser { users })
    }

    /// Run every stage in order, stopping at the first rejection
    pub async fn run(&self, ctx: &mut RequestContext) -> Result<(), Response> {
        for stage in &self.stages {
            stage.handle(ctx).await?;
        }
        Ok(())
    }
}

/// 401 with the reason as a plain-text body
pub fn unauthorized(reason: &'static str) -> Response {
    let err = AuthError::Unauthorized { reason };
    tracing::debug!(error.kind = err.kind(), reason, "Session gate rejected request");
    (
        StatusCode::UNAUTHORIZED,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        reason,
    )
        .into_response()
}

// ============================================================================
// Stages
// ============================================================================

/// Reads the session token from the `Cookie` header
pub struct ExtractSessionToken;

#[async_trait]
impl Stage for ExtractSessionToken {
    async fn handle(&self, ctx: &mut RequestContext) -> Result<(), Response> {
        let token = cookie_value(&ctx.headers, SESSION_COOKIE)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| unauthorized(REASON_NO_SESSION_TOKEN))?;
        ctx.token = Some(token.to_string());
        Ok(())
    }
}

/// Resolves the token to a stored session
pub struct LookupSession {
    pub sessions: Arc<SessionService>,
}

#[async_trait]
impl Stage for LookupSession {
    async fn handle(&self, ctx: &mut RequestContext) -> Result<(), Response> {
        let token = ctx
            .token
            .as_deref()
            .ok_or_else(|| unauthorized(REASON_NO_SESSION_TOKEN))?;

        match self.sessions.find_by_token(token).await {
            Ok(Some(session)) => {
                ctx.session = Some(session);
                Ok(())
            }
            Ok(None) => Err(unauthorized(REASON_INVALID_SESSION_TOKEN)),
            Err(e) => {
                tracing::warn!(error = %e, "Session lookup failed");
                Err(unauthorized(REASON_INVALID_SESSION_TOKEN))
            }
        }
    }
}

/// Rejects sessions whose absolute expiry has passed, deleting them
pub struct RejectExpired {
    pub sessions: Arc<SessionService>,
}

#[async_trait]
impl Stage for RejectExpired {
    async fn handle(&self, ctx: &mut RequestContext) -> Result<(), Response> {
        let session = ctx
            .session
            .as_ref()
            .ok_or_else(|| unauthorized(REASON_INVALID_SESSION_TOKEN))?;

        if session.is_expired_at(Utc::now()) {
            if let Err(e) = self.sessions.delete_by_id(session.id).await {
                tracing::warn!(session_id = session.id, error = %e, "Failed to delete expired session");
            }
            return Err(unauthorized(REASON_SESSION_EXPIRED));
        }
        Ok(())
    }
}

/// Loads the user that owns the session
pub struct ResolveUser {
    pub users: Arc<UserService>,
}

#[async_trait]
impl Stage for ResolveUser {
    async fn handle(&self, ctx: &mut RequestContext) -> Result<(), Response> {
        let user_id = ctx
            .session
            .as_ref()
            .map(|s| s.user_id)
            .ok_or_else(|| unauthorized(REASON_INVALID_SESSION_TOKEN))?;

        match self.users.get_by_id(user_id).await {
            Ok(Some(user)) => {
                ctx.user = Some(user);
                Ok(())
            }
            Ok(None) => Err(unauthorized(REASON_USER_NOT_FOUND)),
            Err(e) => {
                tracing::warn!(user_id, error = %e, "User lookup failed");
                Err(unauthorized(REASON_USER_NOT_FOUND))
            }
        }
    }
}

// ============================================================================
// axum adapter
// ============================================================================

/// Session gate middleware.
///
/// Apply with `route_layer(from_fn_with_state(state, require_session))`.
pub async fn require_session(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let mut ctx = RequestContext::new(request.headers().clone());
    if let Err(rejection) = state.session_gate.run(&mut ctx).await {
        return rejection;
    }

    match (ctx.user, ctx.session) {
        (Some(user), Some(session)) => {
            request.extensions_mut().insert(AuthenticatedUser(user));
            request.extensions_mut().insert(AuthenticatedSession(session));
            next.run(request).await
        }
        _ => ApiError::internal_error("Session gate finished without a user").into_response(),
    }
}
