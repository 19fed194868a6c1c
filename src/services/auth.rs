//! Login orchestration
//!
//! [`LoginService::complete_login`] drives the OAuth callback: code
//! exchange, profile fetch, user upsert and session issuance, in that order.
//! The first failing step ends the login and its error is returned as is.

use crate::models::{Session, User};
use crate::services::oauth::OAuthProvider;
use crate::services::session::SessionService;
use crate::services::user::UserService;
use std::sync::Arc;

/// Error types for the authentication flow
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The callback carried no authorization code
    #[error("Missing authorization code")]
    MissingCode,

    /// The provider refused the code or returned no token
    #[error("Token exchange failed: {0}")]
    ExchangeFailed(String),

    /// The provider refused the profile request
    #[error("Profile fetch failed: {0}")]
    ProfileFetchFailed(String),

    /// The provider did not answer in time; carries the stage name
    #[error("Identity provider timed out during {0}")]
    ProviderTimeout(&'static str),

    #[error("User persistence failed: {0}")]
    UserPersistenceFailed(String),

    #[error("Session persistence failed: {0}")]
    SessionPersistenceFailed(String),

    /// Request rejected by the session gate
    #[error("Unauthorized: {reason}")]
    Unauthorized { reason: &'static str },
}

impl AuthError {
    /// Stable name of the error kind, used as a structured log field
    pub fn kind(&self) -> &'static str {
        match self {
            AuthError::MissingCode => "missing_code",
            AuthError::ExchangeFailed(_) => "exchange_failed",
            AuthError::ProfileFetchFailed(_) => "profile_fetch_failed",
            AuthError::ProviderTimeout(_) => "provider_timeout",
            AuthError::UserPersistenceFailed(_) => "user_persistence_failed",
            AuthError::SessionPersistenceFailed(_) => "session_persistence_failed",
            AuthError::Unauthorized { .. } => "unauthorized",
        }
    }
}

/// Completes OAuth logins
pub struct LoginService {
    provider: Arc<dyn OAuthProvider>,
    users: Arc<UserService>,
    sessions: Arc<SessionService>,
    redirect_uri: String,
}

impl LoginService {
    /// `redirect_uri` must be the callback URL registered with the provider.
    pub fn new(
        provider: Arc<dyn OAuthProvider>,
        users: Arc<UserService>,
        sessions: Arc<SessionService>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            users,
            sessions,
            redirect_uri: redirect_uri.into(),
        }
    }

    /// Authorization URL for starting a login
    pub fn authorize_url(&self) -> String {
        self.provider.authorize_url()
    }

    /// Run the login for the code received on the callback.
    ///
    /// A user upserted before a failing session creation is kept.
    pub async fn complete_login(&self, code: Option<&str>) -> Result<(User, Session), AuthError> {
        let code = code
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .ok_or(AuthError::MissingCode)?;

        let access_token = self.provider.exchange(code, &self.redirect_uri).await?;
        let profile = self.provider.fetch_profile(&access_token).await?;
        let user = self.users.upsert(&profile).await?;
        let session = self.sessions.create(user.id).await?;

        tracing::info!(
            user_id = user.id,
            login = %user.login,
            session_id = session.id,
            "Login completed"
        );

        Ok((user, session))
    }
}
