//! Error types raised by statement resources.
//!
//! Instrumentation never translates these. Whatever a delegate returns is
//! what the caller of a wrapped resource sees.

use thiserror::Error;

/// Errors raised by a statement, connection or result set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SqlError {
    /// The database rejected or failed the command.
    #[error("Database error [{}]: {message}", sql_state.as_deref().unwrap_or("-----"))]
    Database {
        /// Five character SQLSTATE code, if the driver reports one.
        sql_state: Option<String>,
        /// Vendor-specific error code.
        vendor_code: i32,
        /// Driver message.
        message: String,
    },

    /// The resource was used after it was closed.
    #[error("Resource is closed")]
    Closed,

    /// The driver does not implement the requested operation.
    #[error("Feature not supported: {0}")]
    FeatureNotSupported(String),

    /// An argument was out of range or otherwise unusable.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// `unwrap` was asked for a type the resource does not wrap.
    #[error("Not a wrapper for {0}")]
    NotAWrapper(&'static str),

    /// Failure injected by a scripted resource.
    #[error("Scripted failure: {0}")]
    Scripted(String),
}

impl SqlError {
    /// Create a database error with a SQLSTATE and vendor code.
    pub fn database(
        sql_state: impl Into<String>,
        vendor_code: i32,
        message: impl Into<String>,
    ) -> Self {
        Self::Database {
            sql_state: Some(sql_state.into()),
            vendor_code,
            message: message.into(),
        }
    }

    /// The SQLSTATE code, if any.
    pub fn sql_state(&self) -> Option<&str> {
        match self {
            SqlError::Database { sql_state, .. } => sql_state.as_deref(),
            SqlError::FeatureNotSupported(_) => Some("0A000"),
            _ => None,
        }
    }
}

/// Result type for resource operations.
pub type SqlResult<T> = std::result::Result<T, SqlError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_error_display() {
        let err = SqlError::database("42P01", 7, "relation \"t\" does not exist");
        assert_eq!(
            err.to_string(),
            "Database error [42P01]: relation \"t\" does not exist"
        );
        assert_eq!(err.sql_state(), Some("42P01"));
    }

    #[test]
    fn test_database_error_without_state() {
        let err = SqlError::Database {
            sql_state: None,
            vendor_code: 0,
            message: "boom".to_string(),
        };
        assert_eq!(err.to_string(), "Database error [-----]: boom");
        assert_eq!(err.sql_state(), None);
    }

    #[test]
    fn test_feature_not_supported_state() {
        let err = SqlError::FeatureNotSupported("executeLargeBatch".to_string());
        assert_eq!(err.sql_state(), Some("0A000"));
    }
}
