//! Database connection pool abstraction
//!
//! This is the store collaborator every repository talks to. The concrete
//! pool (SQLite or MySQL) is picked from configuration at startup and handed
//! to repositories as a [`DynDatabasePool`]; nothing in the crate holds a
//! global handle.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use sqlx::{
    mysql::{MySqlPool, MySqlPoolOptions},
    sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions},
};
use std::str::FromStr;
use std::sync::Arc;

use crate::config::{DatabaseConfig, DatabaseDriver};

const SQLITE_MAX_CONNECTIONS: u32 = 10;
const MYSQL_MAX_CONNECTIONS: u32 = 20;

/// Store handle shared by repositories and migrations.
#[async_trait]
pub trait DatabasePool: Send + Sync {
    /// Execute a statement that returns no rows; yields the affected row count
    async fn execute(&self, query: &str) -> Result<u64>;

    /// Round-trip a trivial query
    async fn ping(&self) -> Result<()>;

    async fn close(&self);

    fn driver(&self) -> DatabaseDriver;

    fn as_sqlite(&self) -> Option<&SqlitePool>;

    fn as_mysql(&self) -> Option<&MySqlPool>;
}

/// Connection pool for one of the supported drivers
pub enum StorePool {
    Sqlite(SqlitePool),
    Mysql(MySqlPool),
}

impl StorePool {
    /// Open a SQLite store.
    ///
    /// `url` may be `:memory:`, a `sqlite:` URL or a bare file path. The file
    /// and its parent directories are created when missing.
    pub async fn sqlite(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .with_context(|| format!("Invalid SQLite URL: {}", url))?
            .create_if_missing(true)
            .foreign_keys(true);

        if let Some(parent) = options.clone().get_filename().parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create database directory: {:?}", parent)
                })?;
            }
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(SQLITE_MAX_CONNECTIONS)
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to connect to SQLite database: {}", url))?;
        Ok(Self::Sqlite(pool))
    }

    /// Open a MySQL store; the `mysql://` scheme is optional in `url`.
    pub async fn mysql(url: &str) -> Result<Self> {
        let url = if url.starts_with("mysql://") {
            url.to_string()
        } else {
            format!("mysql://{}", url)
        };

        let pool = MySqlPoolOptions::new()
            .max_connections(MYSQL_MAX_CONNECTIONS)
            .connect(&url)
            .await
            .context("Failed to connect to MySQL database")?;
        Ok(Self::Mysql(pool))
    }
}

#[async_trait]
impl DatabasePool for StorePool {
    async fn execute(&self, query: &str) -> Result<u64> {
        let rows = match self {
            Self::Sqlite(pool) => sqlx::query(query).execute(pool).await.map(|r| r.rows_affected()),
            Self::Mysql(pool) => sqlx::query(query).execute(pool).await.map(|r| r.rows_affected()),
        };
        rows.with_context(|| format!("Failed to execute query: {}", query))
    }

    async fn ping(&self) -> Result<()> {
        let result = match self {
            Self::Sqlite(pool) => sqlx::query("SELECT 1").execute(pool).await.map(drop),
            Self::Mysql(pool) => sqlx::query("SELECT 1").execute(pool).await.map(drop),
        };
        result.context("Database ping failed")
    }

    async fn close(&self) {
        match self {
            Self::Sqlite(pool) => pool.close().await,
            Self::Mysql(pool) => pool.close().await,
        }
    }

    fn driver(&self) -> DatabaseDriver {
        match self {
            Self::Sqlite(_) => DatabaseDriver::Sqlite,
            Self::Mysql(_) => DatabaseDriver::Mysql,
        }
    }

    fn as_sqlite(&self) -> Option<&SqlitePool> {
        match self {
            Self::Sqlite(pool) => Some(pool),
            Self::Mysql(_) => None,
        }
    }

    fn as_mysql(&self) -> Option<&MySqlPool> {
        match self {
            Self::Mysql(pool) => Some(pool),
            Self::Sqlite(_) => None,
        }
    }
}

pub type DynDatabasePool = Arc<dyn DatabasePool>;

/// Borrow the SQLite pool behind a pool whose driver is `sqlite`.
pub(crate) fn sqlite_pool(pool: &DynDatabasePool) -> Result<&SqlitePool> {
    pool.as_sqlite()
        .ok_or_else(|| anyhow!("Driver reported sqlite but no SQLite pool is present"))
}

/// Borrow the MySQL pool behind a pool whose driver is `mysql`.
pub(crate) fn mysql_pool(pool: &DynDatabasePool) -> Result<&MySqlPool> {
    pool.as_mysql()
        .ok_or_else(|| anyhow!("Driver reported mysql but no MySQL pool is present"))
}

/// Open the store named by `config`.
pub async fn create_pool(config: &DatabaseConfig) -> Result<DynDatabasePool> {
    let pool = match config.driver {
        DatabaseDriver::Sqlite => StorePool::sqlite(&config.url).await?,
        DatabaseDriver::Mysql => StorePool::mysql(&config.url).await?,
    };
    Ok(Arc::new(pool))
}

/// In-memory SQLite store, shared by every connection of the pool
pub async fn create_test_pool() -> Result<DynDatabasePool> {
    let config = DatabaseConfig {
        driver: DatabaseDriver::Sqlite,
        url: ":memory:".to_string(),
    };
    create_pool(&config).await
}
