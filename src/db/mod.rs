//! Database layer
//!
//! SQLite is the default store and MySQL is supported for larger
//! deployments. The driver is selected from configuration and hidden behind
//! the `DatabasePool` trait, so repositories and migrations work against
//! either backend.
//!
//! ```ignore
//! use guestbook::config::DatabaseConfig;
//! use guestbook::db::{create_pool, migrations};
//!
//! let pool = create_pool(&DatabaseConfig::default()).await?;
//! migrations::run_migrations(&pool).await?;
//! pool.ping().await?;
//! ```

pub mod migrations;
pub mod pool;
pub mod repositories;

pub use pool::{create_pool, create_test_pool, DatabasePool, DynDatabasePool, StorePool};
