//! Repository error type.
//!
//! Every `sqlx::Error` is classified into one of three kinds so callers can
//! tell an unreachable database apart from a schema that does not match
//! what the queries expect.

use sqlx::error::DatabaseError;

/// Result type for repository operations.
pub type RepoResult<T> = Result<T, RepoError>;

/// Error type for repository operations.
#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    /// The database could not be reached, or a query timed out.
    #[error("database unreachable: {0}")]
    Connectivity(String),
    /// An expected table or column is missing.
    #[error("schema mismatch: {0}")]
    Schema(String),
    /// Any other database failure.
    #[error("database error: {0}")]
    Database(#[source] sqlx::Error),
}

impl RepoError {
    /// Short label used for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            RepoError::Connectivity(_) => "connectivity",
            RepoError::Schema(_) => "schema",
            RepoError::Database(_) => "database",
        }
    }

    pub fn is_connectivity(&self) -> bool {
        matches!(self, RepoError::Connectivity(_))
    }

    pub fn is_schema(&self) -> bool {
        matches!(self, RepoError::Schema(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ErrorClass {
    Connectivity,
    Schema,
    Other,
}

// Primary result code SQLite reports when the file cannot be opened.
const SQLITE_CANTOPEN: &str = "14";

fn classify_database_error(err: &dyn DatabaseError) -> ErrorClass {
    let message = err.message();
    if err.code().as_deref() == Some(SQLITE_CANTOPEN) || message.contains("unable to open") {
        ErrorClass::Connectivity
    } else if message.contains("no such table") || message.contains("no such column") {
        ErrorClass::Schema
    } else {
        ErrorClass::Other
    }
}

impl From<sqlx::Error> for RepoError {
    fn from(err: sqlx::Error) -> Self {
        let class = match &err {
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => ErrorClass::Connectivity,
            sqlx::Error::ColumnNotFound(_) | sqlx::Error::ColumnDecode { .. } => ErrorClass::Schema,
            sqlx::Error::Database(db) => classify_database_error(&**db),
            _ => ErrorClass::Other,
        };

        match class {
            ErrorClass::Connectivity => RepoError::Connectivity(err.to_string()),
            ErrorClass::Schema => RepoError::Schema(err.to_string()),
            ErrorClass::Other => RepoError::Database(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_failures_are_connectivity() {
        assert!(RepoError::from(sqlx::Error::PoolClosed).is_connectivity());
        assert!(RepoError::from(sqlx::Error::PoolTimedOut).is_connectivity());
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        assert!(RepoError::from(sqlx::Error::Io(io)).is_connectivity());
    }

    #[test]
    fn missing_column_is_schema() {
        let err = RepoError::from(sqlx::Error::ColumnNotFound("unit".to_string()));
        assert!(err.is_schema());
        assert_eq!(err.kind(), "schema");
    }

    #[test]
    fn row_not_found_is_generic() {
        let err = RepoError::from(sqlx::Error::RowNotFound);
        assert_eq!(err.kind(), "database");
    }
}
