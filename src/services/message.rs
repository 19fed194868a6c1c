//! Message service
//!
//! Guestbook posting and listing. Posting requires an authenticated user;
//! the route layer guarantees that before this service is reached.

use crate::db::repositories::MessageRepository;
use crate::models::{CreateMessageInput, Message, User};
use anyhow::Context;
use chrono::Utc;
use std::sync::Arc;

/// Longest accepted name, in characters
pub const MAX_NAME_CHARS: usize = 100;
/// Longest accepted message, in characters
pub const MAX_MESSAGE_CHARS: usize = 2000;

/// Error types for message service operations
#[derive(Debug, thiserror::Error)]
pub enum MessageServiceError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Message service
pub struct MessageService {
    repo: Arc<dyn MessageRepository>,
}

impl MessageService {
    pub fn new(repo: Arc<dyn MessageRepository>) -> Self {
        Self { repo }
    }

    /// Post a message as `author`.
    ///
    /// A missing or blank name falls back to the author's public name.
    pub async fn post(
        &self,
        author: &User,
        input: CreateMessageInput,
    ) -> Result<Message, MessageServiceError> {
        let name = match input.name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => author.public_name().trim().to_string(),
        };
        let message = input.message.trim();

        if name.is_empty() || message.is_empty() {
            return Err(MessageServiceError::ValidationError(
                "Name and message are required".to_string(),
            ));
        }
        if name.chars().count() > MAX_NAME_CHARS {
            return Err(MessageServiceError::ValidationError(format!(
                "Name must be at most {} characters",
                MAX_NAME_CHARS
            )));
        }
        if message.chars().count() > MAX_MESSAGE_CHARS {
            return Err(MessageServiceError::ValidationError(format!(
                "Message must be at most {} characters",
                MAX_MESSAGE_CHARS
            )));
        }

        let created = self
            .repo
            .create(Some(author.id), &name, message, Utc::now())
            .await
            .context("Failed to store message")?;

        Ok(created)
    }

    /// All messages, newest first
    pub async fn list(&self) -> Result<Vec<Message>, MessageServiceError> {
        let messages = self.repo.list().await.context("Failed to list messages")?;
        Ok(messages)
    }
}
