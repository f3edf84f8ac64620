use thiserror::Error;

use crate::database::store::StoreError;

#[derive(Debug, Clone, Error)]
pub enum DatabaseError {
    #[error("database connection error: {0}")]
    Connection(String),

    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),

    #[error("database error: {0}")]
    Query(String),
}

impl DatabaseError {
    pub fn from_sqlx(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Io(e) => DatabaseError::Connection(e.to_string()),
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
                DatabaseError::Connection("connection pool unavailable".to_string())
            }
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                DatabaseError::UniqueViolation(db.to_string())
            }
            other => DatabaseError::Query(other.to_string()),
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, DatabaseError::Connection(_))
    }
}

impl From<DatabaseError> for StoreError {
    fn from(err: DatabaseError) -> Self {
        StoreError::Database {
            retryable: err.is_retryable(),
            message: err.to_string(),
        }
    }
}
