//! Database repositories
//!
//! Repository pattern implementations for database access.
//! Each repository handles the queries for one entity.

pub mod message;
pub mod session;
pub mod user;

pub use message::{MessageRepository, SqlxMessageRepository};
pub use session::{NewSession, SessionRepository, SqlxSessionRepository};
pub use user::{SqlxUserRepository, UserRepository};
