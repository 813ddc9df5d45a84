//! SQLite adapters: the shared audit store and the persistent contact store.

pub mod audit_queue;
pub mod connection;
pub mod contact_store;
pub mod migrations;

pub use audit_queue::SqliteAuditQueue;
pub use connection::{
    create_pool, create_pool_from_config, create_test_pool, verify_connection, ConnectionError,
    PoolConfig,
};
pub use contact_store::SqliteContactStore;
pub use migrations::{all_embedded_migrations, Migration, MigrationError, Migrator};

use chrono::{DateTime, TimeZone, Utc};
use sqlx::SqlitePool;

use crate::domain::models::DatabaseConfig;

/// Store timestamps as Unix epoch milliseconds.
pub(crate) fn to_millis(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

/// Inverse of [`to_millis`]. Out-of-range values are reported as `None`.
pub(crate) fn from_millis(ms: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms).single()
}

#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),
    #[error("Migration error: {0}")]
    Migration(#[from] MigrationError),
    #[error("Query error: {0}")]
    Query(#[from] sqlx::Error),
}

/// Open the configured database and bring its schema up to date.
pub async fn initialize_database(config: &DatabaseConfig) -> Result<SqlitePool, DatabaseError> {
    let pool = create_pool_from_config(config).await?;
    Migrator::new(pool.clone())
        .run(&all_embedded_migrations())
        .await?;
    Ok(pool)
}

/// Create an in-memory test pool with all migrations applied.
pub async fn create_migrated_test_pool() -> Result<SqlitePool, DatabaseError> {
    let pool = create_test_pool().await?;
    Migrator::new(pool.clone())
        .run(&all_embedded_migrations())
        .await?;
    Ok(pool)
}
