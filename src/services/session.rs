//! Session service
//!
//! Issues, looks up and deletes login sessions. A session lives for a fixed
//! [`SESSION_TTL_DAYS`] from creation; there is no sliding renewal and no
//! update path.

use crate::db::repositories::{NewSession, SessionRepository};
use crate::models::Session;
use crate::services::auth::AuthError;
use anyhow::{anyhow, Result};
use chrono::{Duration, Utc};
use data_encoding::HEXLOWER;
use std::sync::Arc;

/// Lifetime of a session, counted from login
pub const SESSION_TTL_DAYS: i64 = 7;

/// Random bytes behind each session token
const SESSION_TOKEN_BYTES: usize = 32;

/// Generate an unguessable session token.
///
/// 32 bytes from the OS CSPRNG, hex-encoded to 64 lowercase characters.
pub fn generate_session_token() -> Result<String> {
    let mut bytes = [0u8; SESSION_TOKEN_BYTES];
    getrandom::fill(&mut bytes).map_err(|e| anyhow!("OS random source unavailable: {}", e))?;
    Ok(HEXLOWER.encode(&bytes))
}

/// Session service backed by a [`SessionRepository`]
pub struct SessionService {
    repo: Arc<dyn SessionRepository>,
    ttl: Duration,
}

impl SessionService {
    /// Create a session service with the standard TTL
    pub fn new(repo: Arc<dyn SessionRepository>) -> Self {
        Self {
            repo,
            ttl: Duration::days(SESSION_TTL_DAYS),
        }
    }

    /// Create a session service with a custom TTL.
    ///
    /// Tests use this to issue sessions that are already expired.
    pub fn with_ttl(repo: Arc<dyn SessionRepository>, ttl: Duration) -> Self {
        Self { repo, ttl }
    }

    /// Create and persist a new session for `user_id`
    pub async fn create(&self, user_id: i64) -> Result<Session, AuthError> {
        let token = generate_session_token()
            .map_err(|e| AuthError::SessionPersistenceFailed(format!("{:#}", e)))?;
        let now = Utc::now();

        self.repo
            .create(NewSession {
                token,
                user_id,
                created_at: now,
                expires_at: now + self.ttl,
            })
            .await
            .map_err(|e| AuthError::SessionPersistenceFailed(format!("{:#}", e)))
    }

    /// Look up a session by its bearer token
    pub async fn find_by_token(&self, token: &str) -> Result<Option<Session>, AuthError> {
        self.repo
            .get_by_token(token)
            .await
            .map_err(|e| AuthError::SessionPersistenceFailed(format!("{:#}", e)))
    }

    /// Delete the session holding `token`. Deleting an absent session succeeds.
    pub async fn delete_by_token(&self, token: &str) -> Result<(), AuthError> {
        self.repo
            .delete_by_token(token)
            .await
            .map_err(|e| AuthError::SessionPersistenceFailed(format!("{:#}", e)))
    }

    /// Delete a session by id. Deleting an absent session succeeds.
    pub async fn delete_by_id(&self, id: i64) -> Result<(), AuthError> {
        self.repo
            .delete_by_id(id)
            .await
            .map_err(|e| AuthError::SessionPersistenceFailed(format!("{:#}", e)))
    }
}
