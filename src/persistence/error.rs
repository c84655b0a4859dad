//! Errors for the persistence layer

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistenceError {
    /// Failed to open or reach the database
    #[error("Database connection error: {0}")]
    Connection(String),

    /// A query failed
    #[error("Query error: {0}")]
    Query(String),

    /// Schema migration failed
    #[error("Migration error: {0}")]
    Migration(String),
}

impl From<sqlx::Error> for PersistenceError {
    fn from(err: sqlx::Error) -> Self {
        PersistenceError::Query(err.to_string())
    }
}
