//! User repository
//!
//! Database operations for users linked to a provider identity.
//!
//! This module provides:
//! - `UserRepository` trait defining the interface for user data access
//! - `SqlxUserRepository` implementing the trait for SQLite and MySQL

use crate::config::DatabaseDriver;
use crate::db::pool::{mysql_pool, sqlite_pool};
use crate::db::DynDatabasePool;
use crate::models::{ProviderProfile, User};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// User repository trait
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a new user from a provider profile.
    ///
    /// Returns the number of rows inserted. Callers re-read by
    /// `external_id` to obtain the stored record.
    async fn create(&self, profile: &ProviderProfile, now: DateTime<Utc>) -> Result<u64>;

    /// Get user by local ID
    async fn get_by_id(&self, id: i64) -> Result<Option<User>>;

    /// Get user by provider-assigned ID
    async fn get_by_external_id(&self, external_id: i64) -> Result<Option<User>>;

    /// Overwrite the mutable profile fields of an existing user
    async fn update_profile(&self, user: &User) -> Result<()>;
}

/// SQLx-based user repository implementation
///
/// Supports both SQLite and MySQL databases.
pub struct SqlxUserRepository {
    pool: DynDatabasePool,
}

impl SqlxUserRepository {
    /// Create a new SQLx user repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn UserRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl UserRepository for SqlxUserRepository {
    async fn create(&self, profile: &ProviderProfile, now: DateTime<Utc>) -> Result<u64> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_user_sqlite(sqlite_pool(&self.pool)?, profile, now).await,
            DatabaseDriver::Mysql => create_user_mysql(mysql_pool(&self.pool)?, profile, now).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<User>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_user_by_id_sqlite(sqlite_pool(&self.pool)?, id).await,
            DatabaseDriver::Mysql => get_user_by_id_mysql(mysql_pool(&self.pool)?, id).await,
        }
    }

    async fn get_by_external_id(&self, external_id: i64) -> Result<Option<User>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                get_user_by_external_id_sqlite(sqlite_pool(&self.pool)?, external_id).await
            }
            DatabaseDriver::Mysql => {
                get_user_by_external_id_mysql(mysql_pool(&self.pool)?, external_id).await
            }
        }
    }

    async fn update_profile(&self, user: &User) -> Result<()> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => update_profile_sqlite(sqlite_pool(&self.pool)?, user).await,
            DatabaseDriver::Mysql => update_profile_mysql(mysql_pool(&self.pool)?, user).await,
        }
    }
}

const SELECT_USER: &str = r#"
    SELECT id, external_id, login, display_name, email, avatar_url, created_at, updated_at
    FROM users
"#;

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_user_sqlite(
    pool: &SqlitePool,
    profile: &ProviderProfile,
    now: DateTime<Utc>,
) -> Result<u64> {
    let result = sqlx::query(
        r#"
        INSERT INTO users (external_id, login, display_name, email, avatar_url, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(profile.external_id)
    .bind(&profile.login)
    .bind(&profile.display_name)
    .bind(&profile.email)
    .bind(&profile.avatar_url)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create user")?;

    Ok(result.rows_affected())
}

async fn get_user_by_id_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<User>> {
    let row = sqlx::query(&format!("{SELECT_USER} WHERE id = ?"))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get user by ID")?;

    row.as_ref().map(row_to_user_sqlite).transpose()
}

async fn get_user_by_external_id_sqlite(
    pool: &SqlitePool,
    external_id: i64,
) -> Result<Option<User>> {
    let row = sqlx::query(&format!("{SELECT_USER} WHERE external_id = ?"))
        .bind(external_id)
        .fetch_optional(pool)
        .await
        .context("Failed to get user by external ID")?;

    row.as_ref().map(row_to_user_sqlite).transpose()
}

async fn update_profile_sqlite(pool: &SqlitePool, user: &User) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE users
        SET login = ?, display_name = ?, email = ?, avatar_url = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&user.login)
    .bind(&user.display_name)
    .bind(&user.email)
    .bind(&user.avatar_url)
    .bind(user.updated_at)
    .bind(user.id)
    .execute(pool)
    .await
    .context("Failed to update user profile")?;

    Ok(())
}

fn row_to_user_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<User> {
    Ok(User {
        id: row.try_get("id")?,
        external_id: row.try_get("external_id")?,
        login: row.try_get("login")?,
        display_name: row.try_get("display_name")?,
        email: row.try_get("email")?,
        avatar_url: row.try_get("avatar_url")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_user_mysql(
    pool: &MySqlPool,
    profile: &ProviderProfile,
    now: DateTime<Utc>,
) -> Result<u64> {
    let result = sqlx::query(
        r#"
        INSERT INTO users (external_id, login, display_name, email, avatar_url, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(profile.external_id)
    .bind(&profile.login)
    .bind(&profile.display_name)
    .bind(&profile.email)
    .bind(&profile.avatar_url)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create user")?;

    Ok(result.rows_affected())
}

async fn get_user_by_id_mysql(pool: &MySqlPool, id: i64) -> Result<Option<User>> {
    let row = sqlx::query(&format!("{SELECT_USER} WHERE id = ?"))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get user by ID")?;

    row.as_ref().map(row_to_user_mysql).transpose()
}

async fn get_user_by_external_id_mysql(pool: &MySqlPool, external_id: i64) -> Result<Option<User>> {
    let row = sqlx::query(&format!("{SELECT_USER} WHERE external_id = ?"))
        .bind(external_id)
        .fetch_optional(pool)
        .await
        .context("Failed to get user by external ID")?;

    row.as_ref().map(row_to_user_mysql).transpose()
}

async fn update_profile_mysql(pool: &MySqlPool, user: &User) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE users
        SET login = ?, display_name = ?, email = ?, avatar_url = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&user.login)
    .bind(&user.display_name)
    .bind(&user.email)
    .bind(&user.avatar_url)
    .bind(user.updated_at)
    .bind(user.id)
    .execute(pool)
    .await
    .context("Failed to update user profile")?;

    Ok(())
}

fn row_to_user_mysql(row: &sqlx::mysql::MySqlRow) -> Result<User> {
    Ok(User {
        id: row.try_get("id")?,
        external_id: row.try_get("external_id")?,
        login: row.try_get("login")?,
        display_name: row.try_get("display_name")?,
        email: row.try_get("email")?,
        avatar_url: row.try_get("avatar_url")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}
