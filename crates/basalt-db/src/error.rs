//! Error types for the engine layer.

/// Errors from engine and storage operations.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// `DataFusion` planning or execution error
    #[error("DataFusion error: {0}")]
    DataFusion(#[from] datafusion_common::DataFusionError),

    /// Arrow error while building, casting or encoding batches
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// I/O error from the on-disk snapshot store
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Database path is unusable
    #[error("Invalid database path '{path}': {reason}")]
    InvalidPath {
        /// The offending path.
        path: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Table not found
    #[error("Table '{0}' not found")]
    TableNotFound(String),

    /// Statement would modify a read-only database
    #[error("Cannot execute '{0}' on a read-only database")]
    ReadOnly(String),

    /// Statement text contained nothing to execute
    #[error("No statement to execute")]
    EmptyStatement,

    /// Database has been closed
    #[error("Database is closed")]
    Shutdown,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let e = DbError::TableNotFound("t".into());
        assert_eq!(e.to_string(), "Table 't' not found");

        let e = DbError::InvalidPath {
            path: "/x".into(),
            reason: "not a directory".into(),
        };
        assert!(e.to_string().contains("not a directory"));
    }
}
