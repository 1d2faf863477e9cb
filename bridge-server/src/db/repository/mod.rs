//! Repository Module
//!
//! CRUD operations over the bridge's SQLite tables. Repositories are free
//! async functions taking a `&SqlitePool`; every mutation is a single
//! statement or a single transaction so concurrent sweeps cannot observe
//! partial state.

pub mod dead_letter;
pub mod pending;
pub mod status_mapping;

use thiserror::Error;

/// Repository error types
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<sqlx::Error> for RepoError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => RepoError::NotFound(err.to_string()),
            _ => RepoError::Database(err.to_string()),
        }
    }
}

/// Result type for repository operations
pub type RepoResult<T> = Result<T, RepoError>;
