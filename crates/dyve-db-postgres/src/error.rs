//! Error types for the PostgreSQL store.

use dyve_core::StoreError;
use sqlx_core::error::Error as SqlxError;

#[derive(Debug, thiserror::Error)]
pub enum PostgresError {
    #[error("Database error: {0}")]
    Database(#[from] SqlxError),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl PostgresError {
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// True for failures reaching the server rather than executing a statement.
    pub fn is_connectivity(&self) -> bool {
        matches!(
            self,
            Self::Database(
                SqlxError::Io(_)
                    | SqlxError::Tls(_)
                    | SqlxError::PoolTimedOut
                    | SqlxError::PoolClosed
                    | SqlxError::WorkerCrashed
            )
        )
    }
}

impl From<PostgresError> for StoreError {
    fn from(err: PostgresError) -> Self {
        if err.is_connectivity() {
            return StoreError::connection(err.to_string());
        }
        match err {
            PostgresError::Database(SqlxError::Decode(e)) => StoreError::serialization(e.to_string()),
            other => StoreError::internal(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, PostgresError>;

/// Shorthand used by the store for sqlx results.
pub(crate) fn store_error(err: SqlxError) -> StoreError {
    PostgresError::from(err).into()
}
