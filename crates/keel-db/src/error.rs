//! # Database Error Types
//!
//! Error types for repository and unit-of-work operations.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  Caller misuse                        SQLite Error (sqlx::Error)        │
//! │  (no provider, begin twice)                │                            │
//! │       │                                    ▼                            │
//! │       │                          categorised, never retried             │
//! │       ▼                                    │                            │
//! │  DbError (this module) ◄───────────────────┘                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Caller decides (retry, report, abort)                                 │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! "Not found" is not an error here: lookups and deletes return `Ok(None)`.

use thiserror::Error;

/// Database operation errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// A required argument was absent or invalid.
    ///
    /// ## When This Occurs
    /// - Unit of work built without a connection provider
    /// - Unit of work built without repositories
    #[error("Invalid argument: {param}")]
    InvalidArgument {
        param: String,
    },

    /// The operation is not valid in the current state.
    ///
    /// ## When This Occurs
    /// - Beginning a transaction while one is already active
    /// - Beginning a transaction on a disposed unit of work
    /// - Registering a repository still bound to another open connection
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// A repository or transaction was used without a live connection.
    #[error("No open connection is bound")]
    NotBound,

    /// Unique constraint violation.
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation {
        field: String,
        value: String,
    },

    /// Foreign key constraint violation.
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation {
        message: String,
    },

    /// Database connection failed.
    ///
    /// ## When This Occurs
    /// - Malformed connection string
    /// - Database file doesn't exist and the string forbids creating it
    /// - File permissions issue
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// The configured provider/driver identifier is not supported.
    #[error("Unsupported provider: '{0}'")]
    UnsupportedProvider(String),

    /// Configuration is missing, unreadable or invalid.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Query execution failed.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Transaction failed.
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    /// Internal database error.
    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    /// Creates an InvalidArgument error naming the offending parameter.
    pub fn invalid_argument(param: impl Into<String>) -> Self {
        DbError::InvalidArgument {
            param: param.into(),
        }
    }

    /// Creates an InvalidOperation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        DbError::InvalidOperation(message.into())
    }
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::Database       → Analyze message for constraint type
/// sqlx::Error::Configuration  → DbError::ConnectionFailed
/// sqlx::Error::Io             → DbError::ConnectionFailed
/// Other                       → DbError::Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();

                // SQLite error codes for constraints:
                // UNIQUE constraint: "UNIQUE constraint failed: <table>.<column>"
                // FK constraint: "FOREIGN KEY constraint failed"
                if msg.contains("UNIQUE constraint failed") {
                    let field = msg
                        .split("UNIQUE constraint failed: ")
                        .nth(1)
                        .unwrap_or("unknown")
                        .to_string();
                    DbError::UniqueViolation {
                        field,
                        value: "unknown".to_string(),
                    }
                } else if msg.contains("FOREIGN KEY constraint failed") {
                    DbError::ForeignKeyViolation {
                        message: msg.to_string(),
                    }
                } else {
                    DbError::QueryFailed(msg.to_string())
                }
            }

            sqlx::Error::Configuration(e) => DbError::ConnectionFailed(e.to_string()),

            sqlx::Error::Io(e) => DbError::ConnectionFailed(e.to_string()),

            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<toml::de::Error> for DbError {
    fn from(err: toml::de::Error) -> Self {
        DbError::InvalidConfig(err.to_string())
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_argument_names_parameter() {
        let err = DbError::invalid_argument("repositories");
        assert!(err.to_string().contains("repositories"));
        assert!(matches!(err, DbError::InvalidArgument { ref param } if param == "repositories"));
    }

    #[test]
    fn test_toml_error_is_config_error() {
        let err = toml::from_str::<toml::Value>("not = [valid").unwrap_err();
        assert!(matches!(DbError::from(err), DbError::InvalidConfig(_)));
    }
}
