//! Data models
//!
//! This module contains the data structures used throughout the guestbook.
//! Models represent:
//! - Database entities (User, Session, Message)
//! - Identity provider payloads (ProviderProfile)
//! - API input types

mod message;
mod session;
mod user;

pub use message::{CreateMessageInput, Message};
pub use session::Session;
pub use user::{ProviderProfile, User};
