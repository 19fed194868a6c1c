//! OAuth exchange client
//!
//! The [`OAuthProvider`] trait is the seam between the login flow and the
//! identity provider. [`GitHubOAuthClient`] implements it over HTTPS with
//! `reqwest`; tests substitute their own providers.
//!
//! Calls are never retried. A transport timeout is reported as
//! [`AuthError::ProviderTimeout`] so it can be told apart from a provider
//! that answered with an error.

use crate::config::OAuthConfig;
use crate::models::ProviderProfile;
use crate::services::auth::AuthError;
use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Stage names carried by `ProviderTimeout`
pub const STAGE_TOKEN_EXCHANGE: &str = "token exchange";
pub const STAGE_PROFILE_FETCH: &str = "profile fetch";

/// Identity provider operations needed by the login flow
#[async_trait]
pub trait OAuthProvider: Send + Sync {
    /// URL the browser is sent to in order to start a login
    fn authorize_url(&self) -> String;

    /// Exchange an authorization code for an access token
    async fn exchange(&self, code: &str, redirect_uri: &str) -> Result<String, AuthError>;

    /// Fetch the profile of the account that owns `access_token`
    async fn fetch_profile(&self, access_token: &str) -> Result<ProviderProfile, AuthError>;
}

#[derive(Serialize)]
struct TokenRequest<'a> {
    client_id: &'a str,
    client_secret: &'a str,
    code: &'a str,
    redirect_uri: &'a str,
}

#[derive(Debug, Default, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GitHubUser {
    id: i64,
    login: String,
    name: Option<String>,
    email: Option<String>,
    avatar_url: Option<String>,
}

impl From<GitHubUser> for ProviderProfile {
    fn from(user: GitHubUser) -> Self {
        Self {
            external_id: user.id,
            login: user.login,
            display_name: user.name,
            email: user.email,
            avatar_url: user.avatar_url,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct GitHubErrorBody {
    message: Option<String>,
}

/// GitHub OAuth client
pub struct GitHubOAuthClient {
    client: reqwest::Client,
    config: OAuthConfig,
}

impl GitHubOAuthClient {
    /// Build a client from configuration.
    ///
    /// The configured user agent and timeout apply to every request.
    pub fn new(config: &OAuthConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| anyhow::anyhow!("HTTP client error: {}", e))?;

        Ok(Self {
            client,
            config: config.clone(),
        })
    }
}

#[async_trait]
impl OAuthProvider for GitHubOAuthClient {
    fn authorize_url(&self) -> String {
        format!(
            "{}?client_id={}&redirect_uri={}&scope={}",
            self.config.authorize_url,
            urlencoding::encode(&self.config.client_id),
            urlencoding::encode(&self.config.redirect_uri),
            urlencoding::encode(&self.config.scope),
        )
    }

    async fn exchange(&self, code: &str, redirect_uri: &str) -> Result<String, AuthError> {
        let response = self
            .client
            .post(&self.config.token_url)
            .header(ACCEPT, "application/json")
            .json(&TokenRequest {
                client_id: &self.config.client_id,
                client_secret: &self.config.client_secret,
                code,
                redirect_uri,
            })
            .send()
            .await
            .map_err(|e| transport_error(e, STAGE_TOKEN_EXCHANGE, AuthError::ExchangeFailed))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| transport_error(e, STAGE_TOKEN_EXCHANGE, AuthError::ExchangeFailed))?;
        let token: TokenResponse = serde_json::from_str(&body).unwrap_or_default();

        if !status.is_success() {
            tracing::error!(
                status = status.as_u16(),
                error = token.error.as_deref().unwrap_or(""),
                "Token exchange rejected by provider"
            );
            return Err(AuthError::ExchangeFailed(
                token
                    .error_description
                    .unwrap_or_else(|| "Failed to exchange code for token".to_string()),
            ));
        }

        match token.access_token {
            Some(access_token) if !access_token.is_empty() => Ok(access_token),
            _ => Err(AuthError::ExchangeFailed(format!(
                "Failed to get access token: {}",
                token
                    .error_description
                    .as_deref()
                    .unwrap_or("No access token in response")
            ))),
        }
    }

    async fn fetch_profile(&self, access_token: &str) -> Result<ProviderProfile, AuthError> {
        let response = self
            .client
            .get(&self.config.profile_url)
            .header(AUTHORIZATION, format!("Bearer {}", access_token))
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| transport_error(e, STAGE_PROFILE_FETCH, AuthError::ProfileFetchFailed))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| transport_error(e, STAGE_PROFILE_FETCH, AuthError::ProfileFetchFailed))?;

        if !status.is_success() {
            let error: GitHubErrorBody = serde_json::from_str(&body).unwrap_or_default();
            tracing::error!(status = status.as_u16(), "Profile fetch rejected by provider");
            return Err(AuthError::ProfileFetchFailed(
                error
                    .message
                    .unwrap_or_else(|| "Failed to fetch user data".to_string()),
            ));
        }

        serde_json::from_str::<GitHubUser>(&body)
            .map(ProviderProfile::from)
            .map_err(|e| AuthError::ProfileFetchFailed(format!("Malformed profile: {}", e)))
    }
}

fn transport_error(
    err: reqwest::Error,
    stage: &'static str,
    wrap: fn(String) -> AuthError,
) -> AuthError {
    if err.is_timeout() {
        AuthError::ProviderTimeout(stage)
    } else {
        wrap(err.to_string())
    }
}
