//! Guestbook message model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Message entity posted to the guestbook
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    /// Author, when the post came through a session
    pub user_id: Option<i64>,
    pub name: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

/// Input for posting a message
#[derive(Debug, Clone, Deserialize)]
pub struct CreateMessageInput {
    /// Shown name; falls back to the author's public name
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub message: String,
}
