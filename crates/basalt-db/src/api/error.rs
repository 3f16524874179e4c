//! API error types with numeric codes for FFI interoperability.

use thiserror::Error;

/// Error codes for FFI interop.
///
/// Ranges:
/// - 100-199: Configuration errors
/// - 200-299: Connection errors
/// - 300-399: Query errors
/// - 400-499: Binding errors
/// - 500-599: Appender errors
/// - 900-999: Internal errors
pub mod codes {
    // Configuration
    /// Option name is not in the catalog.
    pub const UNKNOWN_OPTION: i32 = 100;
    /// Option value failed validation.
    pub const INVALID_OPTION_VALUE: i32 = 101;

    // Connection
    /// Engine could not be started.
    pub const CONNECTION_FAILED: i32 = 200;
    /// Database path is unusable.
    pub const INVALID_PATH: i32 = 201;

    // Query
    /// Query failed during planning or execution.
    pub const QUERY_FAILED: i32 = 300;
    /// SQL could not be parsed.
    pub const SQL_PARSE_ERROR: i32 = 301;
    /// Statement rejected by `access_mode = read_only`.
    pub const READ_ONLY: i32 = 302;
    /// Table not found.
    pub const TABLE_NOT_FOUND: i32 = 303;

    // Binding
    /// Parameter slot outside `0..nparams`.
    pub const PARAMETER_OUT_OF_RANGE: i32 = 400;
    /// Executed with a slot that was never bound.
    pub const PARAMETER_UNBOUND: i32 = 401;
    /// Bound value does not convert to the parameter's type.
    pub const PARAMETER_TYPE_MISMATCH: i32 = 402;

    // Appender
    /// Too many or too few values in a row.
    pub const COLUMN_COUNT_MISMATCH: i32 = 500;
    /// Appender already closed.
    pub const APPENDER_CLOSED: i32 = 501;
    /// Buffered rows do not fit the table; they were discarded.
    pub const SCHEMA_MISMATCH: i32 = 502;
    /// Engine rejected the write; buffered rows are kept for retry.
    pub const FLUSH_FAILED: i32 = 503;
    /// Value is not valid for the requested encoding.
    pub const INVALID_VALUE: i32 = 504;

    // Internal
    /// Internal error.
    pub const INTERNAL_ERROR: i32 = 900;
    /// Database is shut down.
    pub const SHUTDOWN: i32 = 901;
}

/// API error with numeric code for FFI.
///
/// Each error variant includes a numeric code suitable for FFI and a
/// human-readable message.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// Configuration error.
    #[error("Configuration error ({code}): {message}")]
    Config {
        /// Numeric error code.
        code: i32,
        /// Error message.
        message: String,
    },

    /// Connection-related error.
    #[error("Connection error ({code}): {message}")]
    Connection {
        /// Numeric error code.
        code: i32,
        /// Error message.
        message: String,
    },

    /// Query planning or execution error.
    #[error("Query error ({code}): {message}")]
    Query {
        /// Numeric error code.
        code: i32,
        /// Error message.
        message: String,
    },

    /// Parameter binding error.
    #[error("Binding error ({code}): {message}")]
    Binding {
        /// Numeric error code.
        code: i32,
        /// Error message.
        message: String,
    },

    /// Appender usage or flush error.
    #[error("Appender error ({code}): {message}")]
    Appender {
        /// Numeric error code.
        code: i32,
        /// Error message.
        message: String,
    },

    /// Internal error.
    #[error("Internal error ({code}): {message}")]
    Internal {
        /// Numeric error code.
        code: i32,
        /// Error message.
        message: String,
    },
}

impl ApiError {
    /// Get the numeric error code.
    #[must_use]
    pub fn code(&self) -> i32 {
        match self {
            Self::Config { code, .. }
            | Self::Connection { code, .. }
            | Self::Query { code, .. }
            | Self::Binding { code, .. }
            | Self::Appender { code, .. }
            | Self::Internal { code, .. } => *code,
        }
    }

    /// Get the error message.
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Config { message, .. }
            | Self::Connection { message, .. }
            | Self::Query { message, .. }
            | Self::Binding { message, .. }
            | Self::Appender { message, .. }
            | Self::Internal { message, .. } => message,
        }
    }

    /// Whether repeating the same call may succeed.
    ///
    /// Only a flush the engine rejected is retryable; its rows are still
    /// buffered.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.code() == codes::FLUSH_FAILED
    }

    // ---- Constructor helpers ----

    /// Create an "unknown option" error.
    #[must_use]
    pub fn unknown_option(name: &str) -> Self {
        Self::Config {
            code: codes::UNKNOWN_OPTION,
            message: format!("Unrecognized configuration option: {name}"),
        }
    }

    /// Create an "invalid option value" error.
    #[must_use]
    pub fn invalid_option(name: &str, value: &str, expected: &str) -> Self {
        Self::Config {
            code: codes::INVALID_OPTION_VALUE,
            message: format!("Invalid value '{value}' for option {name}: expected {expected}"),
        }
    }

    /// Create a connection error with default code.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            code: codes::CONNECTION_FAILED,
            message: message.into(),
        }
    }

    /// Create a query error with default code.
    pub fn query(message: impl Into<String>) -> Self {
        Self::Query {
            code: codes::QUERY_FAILED,
            message: message.into(),
        }
    }

    /// Create a SQL parse error.
    pub fn sql_parse(message: impl Into<String>) -> Self {
        Self::Query {
            code: codes::SQL_PARSE_ERROR,
            message: message.into(),
        }
    }

    /// Create a "table not found" error.
    #[must_use]
    pub fn table_not_found(table: &str) -> Self {
        Self::Query {
            code: codes::TABLE_NOT_FOUND,
            message: format!("Table not found: {table}"),
        }
    }

    /// Create a "slot out of range" error.
    #[must_use]
    pub fn parameter_out_of_range(slot: usize, nparams: usize) -> Self {
        Self::Binding {
            code: codes::PARAMETER_OUT_OF_RANGE,
            message: format!("Parameter index {slot} out of range: statement has {nparams} parameters"),
        }
    }

    /// Create an "unbound parameter" error.
    #[must_use]
    pub fn parameter_unbound(slot: usize) -> Self {
        Self::Binding {
            code: codes::PARAMETER_UNBOUND,
            message: format!("Parameter {slot} has not been bound"),
        }
    }

    /// Create a parameter type mismatch error.
    pub fn parameter_type(slot: usize, message: impl std::fmt::Display) -> Self {
        Self::Binding {
            code: codes::PARAMETER_TYPE_MISMATCH,
            message: format!("Parameter {slot}: {message}"),
        }
    }

    /// Create a column-count mismatch error.
    pub fn column_count(message: impl Into<String>) -> Self {
        Self::Appender {
            code: codes::COLUMN_COUNT_MISMATCH,
            message: message.into(),
        }
    }

    /// Create an "appender closed" error.
    #[must_use]
    pub fn appender_closed() -> Self {
        Self::Appender {
            code: codes::APPENDER_CLOSED,
            message: "Appender is closed".into(),
        }
    }

    /// Create a schema mismatch error (rows discarded).
    pub fn schema_mismatch(message: impl Into<String>) -> Self {
        Self::Appender {
            code: codes::SCHEMA_MISMATCH,
            message: message.into(),
        }
    }

    /// Create a retryable flush error (rows kept).
    pub fn flush_failed(message: impl Into<String>) -> Self {
        Self::Appender {
            code: codes::FLUSH_FAILED,
            message: message.into(),
        }
    }

    /// Create an invalid value error.
    pub fn invalid_value(message: impl Into<String>) -> Self {
        Self::Appender {
            code: codes::INVALID_VALUE,
            message: message.into(),
        }
    }

    /// Create an internal error with default code.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            code: codes::INTERNAL_ERROR,
            message: message.into(),
        }
    }

    /// Create a "database shutdown" error.
    #[must_use]
    pub fn shutdown() -> Self {
        Self::Internal {
            code: codes::SHUTDOWN,
            message: "Database is shut down".into(),
        }
    }
}

impl From<crate::DbError> for ApiError {
    fn from(e: crate::DbError) -> Self {
        use crate::DbError;
        use datafusion_common::DataFusionError;
        match e {
            DbError::TableNotFound(name) => Self::table_not_found(&name),
            DbError::InvalidPath { .. } => Self::Connection {
                code: codes::INVALID_PATH,
                message: e.to_string(),
            },
            DbError::ReadOnly(_) => Self::Query {
                code: codes::READ_ONLY,
                message: e.to_string(),
            },
            DbError::DataFusion(DataFusionError::SQL(err, _)) => Self::sql_parse(err.to_string()),
            DbError::DataFusion(err) => Self::query(err.to_string()),
            DbError::EmptyStatement => Self::sql_parse(e.to_string()),
            DbError::Shutdown => Self::shutdown(),
            other => Self::internal(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err = ApiError::table_not_found("missing");
        assert_eq!(err.code(), codes::TABLE_NOT_FOUND);
        assert!(err.message().contains("missing"));

        let err = ApiError::parameter_out_of_range(3, 1);
        assert_eq!(err.code(), codes::PARAMETER_OUT_OF_RANGE);
        assert!(matches!(err, ApiError::Binding { .. }));
    }

    #[test]
    fn test_retryable() {
        assert!(ApiError::flush_failed("disk full").is_retryable());
        assert!(!ApiError::schema_mismatch("bad").is_retryable());
        assert!(!ApiError::query("boom").is_retryable());
    }

    #[test]
    fn test_error_display() {
        let err = ApiError::unknown_option("colour");
        let s = err.to_string();
        assert!(s.contains("100"));
        assert!(s.contains("colour"));
    }

    #[test]
    fn test_error_conversion() {
        let api_err: ApiError = crate::DbError::Shutdown.into();
        assert_eq!(api_err.code(), codes::SHUTDOWN);

        let api_err: ApiError = crate::DbError::ReadOnly("INSERT".into()).into();
        assert_eq!(api_err.code(), codes::READ_ONLY);

        let api_err: ApiError = crate::DbError::InvalidPath {
            path: "x".into(),
            reason: "y".into(),
        }
        .into();
        assert_eq!(api_err.code(), codes::INVALID_PATH);
    }
}
