//! Services layer - Business logic
//!
//! Services sit between the HTTP handlers and the repositories:
//! - `oauth`: identity provider client
//! - `user` and `session`: the user directory and session store
//! - `auth`: the login flow tying them together
//! - `message`: guestbook posting

pub mod auth;
pub mod message;
pub mod oauth;
pub mod session;
pub mod user;

pub use auth::{AuthError, LoginService};
pub use message::{MessageService, MessageServiceError};
pub use oauth::{GitHubOAuthClient, OAuthProvider};
pub use session::{generate_session_token, SessionService, SESSION_TTL_DAYS};
pub use user::UserService;
