//! Message repository
//!
//! Database operations for guestbook messages.

use crate::config::DatabaseDriver;
use crate::db::pool::{mysql_pool, sqlite_pool};
use crate::db::DynDatabasePool;
use crate::models::Message;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// Message repository trait
#[async_trait]
pub trait MessageRepository: Send + Sync {
    /// Store a message and return it with its id
    async fn create(
        &self,
        user_id: Option<i64>,
        name: &str,
        message: &str,
        created_at: DateTime<Utc>,
    ) -> Result<Message>;

    /// All messages, newest first
    async fn list(&self) -> Result<Vec<Message>>;
}

/// SQLx-based message repository implementation
pub struct SqlxMessageRepository {
    pool: DynDatabasePool,
}

impl SqlxMessageRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn MessageRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl MessageRepository for SqlxMessageRepository {
    async fn create(
        &self,
        user_id: Option<i64>,
        name: &str,
        message: &str,
        created_at: DateTime<Utc>,
    ) -> Result<Message> {
        let id = match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                insert_message_sqlite(sqlite_pool(&self.pool)?, user_id, name, message, created_at)
                    .await?
            }
            DatabaseDriver::Mysql => {
                insert_message_mysql(mysql_pool(&self.pool)?, user_id, name, message, created_at)
                    .await?
            }
        };

        Ok(Message {
            id,
            user_id,
            name: name.to_string(),
            message: message.to_string(),
            created_at,
        })
    }

    async fn list(&self) -> Result<Vec<Message>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => list_messages_sqlite(sqlite_pool(&self.pool)?).await,
            DatabaseDriver::Mysql => list_messages_mysql(mysql_pool(&self.pool)?).await,
        }
    }
}

const LIST_MESSAGES: &str = r#"
    SELECT id, user_id, name, message, created_at
    FROM messages
    ORDER BY created_at DESC, id DESC
"#;

// ============================================================================
// SQLite implementations
// ============================================================================

async fn insert_message_sqlite(
    pool: &SqlitePool,
    user_id: Option<i64>,
    name: &str,
    message: &str,
    created_at: DateTime<Utc>,
) -> Result<i64> {
    let result =
        sqlx::query("INSERT INTO messages (user_id, name, message, created_at) VALUES (?, ?, ?, ?)")
            .bind(user_id)
            .bind(name)
            .bind(message)
            .bind(created_at)
            .execute(pool)
            .await
            .context("Failed to create message")?;

    Ok(result.last_insert_rowid())
}

async fn list_messages_sqlite(pool: &SqlitePool) -> Result<Vec<Message>> {
    let rows = sqlx::query(LIST_MESSAGES)
        .fetch_all(pool)
        .await
        .context("Failed to list messages")?;

    rows.iter()
        .map(|row| {
            Ok(Message {
                id: row.try_get("id")?,
                user_id: row.try_get("user_id")?,
                name: row.try_get("name")?,
                message: row.try_get("message")?,
                created_at: row.try_get("created_at")?,
            })
        })
        .collect()
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn insert_message_mysql(
    pool: &MySqlPool,
    user_id: Option<i64>,
    name: &str,
    message: &str,
    created_at: DateTime<Utc>,
) -> Result<i64> {
    let result =
        sqlx::query("INSERT INTO messages (user_id, name, message, created_at) VALUES (?, ?, ?, ?)")
            .bind(user_id)
            .bind(name)
            .bind(message)
            .bind(created_at)
            .execute(pool)
            .await
            .context("Failed to create message")?;

    Ok(result.last_insert_id() as i64)
}

async fn list_messages_mysql(pool: &MySqlPool) -> Result<Vec<Message>> {
    let rows = sqlx::query(LIST_MESSAGES)
        .fetch_all(pool)
        .await
        .context("Failed to list messages")?;

    rows.iter()
        .map(|row| {
            Ok(Message {
                id: row.try_get("id")?,
                user_id: row.try_get("user_id")?,
                name: row.try_get("name")?,
                message: row.try_get("message")?,
                created_at: row.try_get("created_at")?,
            })
        })
        .collect()
}
