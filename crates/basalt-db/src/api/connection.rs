//! Connection: a session against one database.

use std::sync::Arc;

use datafusion_common::TableReference;
use tracing::debug;

use super::appender::Appender;
use super::arrow_result::ArrowResult;
use super::error::ApiError;
use super::result::QueryResult;
use super::statement::PreparedStatement;
use crate::engine::Engine;
use crate::error::DbError;

/// A session bound to a [`Database`](super::Database).
///
/// Calls block until the engine finishes. Open one connection per thread
/// for parallel queries.
#[derive(Debug)]
pub struct Connection {
    engine: Arc<Engine>,
    id: u64,
}

impl Connection {
    pub(crate) fn new(engine: Arc<Engine>) -> Self {
        let id = engine.next_connection_id();
        debug!(connection = id, "Connection opened");
        Self { engine, id }
    }

    /// Connection id, unique within its database.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Run one or more `;`-separated statements and materialize the last
    /// statement's output.
    ///
    /// # Errors
    ///
    /// Returns a query error if any statement fails to plan or execute.
    pub fn query(&self, sql: &str) -> Result<QueryResult, ApiError> {
        let executed = self.engine.execute_sql(sql)?;
        QueryResult::from_executed(executed)
    }

    /// Run statements and expose the last one's output as Arrow chunks.
    ///
    /// # Errors
    ///
    /// Returns a query error if any statement fails to plan or execute.
    pub fn query_arrow(&self, sql: &str) -> Result<ArrowResult, ApiError> {
        let executed = self.engine.execute_sql(sql)?;
        ArrowResult::new(executed, self.engine.config().chunk_size)
    }

    /// Parse and plan a statement for repeated execution.
    ///
    /// # Errors
    ///
    /// Returns a query error if the statement does not plan.
    pub fn prepare(&self, sql: &str) -> Result<PreparedStatement, ApiError> {
        PreparedStatement::prepare(Arc::clone(&self.engine), sql)
    }

    /// Open a bulk-load channel into `schema.table` (`schema` defaults to
    /// the current schema).
    ///
    /// # Errors
    ///
    /// Returns a "table not found" error if the table does not exist, or a
    /// read-only error if the database was opened with
    /// `access_mode = read_only`.
    pub fn appender(&self, schema: Option<&str>, table: &str) -> Result<Appender, ApiError> {
        if self.engine.config().access_mode.is_read_only() {
            return Err(DbError::ReadOnly("APPEND".into()).into());
        }
        let (reference, table_schema) = self.resolve_table(schema, table)?;
        Ok(Appender::new(
            Arc::clone(&self.engine),
            reference,
            table_schema,
            self.engine.config().appender_flush_rows,
        ))
    }

    /// Look a table up by its exact name, then by its lower-cased name
    /// when identifiers are normalized.
    fn resolve_table(
        &self,
        schema: Option<&str>,
        table: &str,
    ) -> Result<(TableReference, arrow::datatypes::SchemaRef), ApiError> {
        let reference = |table: &str| match schema {
            Some(schema) => TableReference::partial(schema, table),
            None => TableReference::bare(table),
        };
        let exact = reference(table);
        match self.engine.table_schema(&exact) {
            Ok(found) => return Ok((exact, found)),
            Err(DbError::TableNotFound(_)) if self.engine.config().ident_normalization => {}
            Err(e) => return Err(e.into()),
        }
        let lowered = reference(&table.to_lowercase());
        match self.engine.table_schema(&lowered) {
            Ok(found) => Ok((lowered, found)),
            Err(DbError::TableNotFound(_)) => Err(ApiError::table_not_found(&exact.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    /// Close the connection. Dropping has the same effect.
    pub fn disconnect(self) {}
}

impl Drop for Connection {
    fn drop(&mut self) {
        debug!(connection = self.id, "Connection closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{codes, Database};
    use crate::types::ScalarType;

    #[test]
    fn test_select_one() {
        let db = Database::open_in_memory().unwrap();
        let conn = db.connect().unwrap();
        let r = conn.query("SELECT 1").unwrap();
        assert_eq!(r.column_count(), 1);
        assert_eq!(r.row_count(), 1);
        assert_eq!(r.value_int32(0, 0), 1);
        assert_eq!(r.column_type(0), ScalarType::BigInt);
    }

    #[test]
    fn test_query_error() {
        let db = Database::open_in_memory().unwrap();
        let conn = db.connect().unwrap();
        let err = conn.query("SELEC 1").unwrap_err();
        assert_eq!(err.code(), codes::SQL_PARSE_ERROR);
        let err = conn.query("SELECT * FROM missing").unwrap_err();
        assert!(matches!(err, ApiError::Query { .. }));
    }

    #[test]
    fn test_connections_share_tables() {
        let db = Database::open_in_memory().unwrap();
        let a = db.connect().unwrap();
        let b = db.connect().unwrap();
        assert_ne!(a.id(), b.id());
        a.query("CREATE TABLE shared (x INT); INSERT INTO shared VALUES (5)")
            .unwrap();
        let r = b.query("SELECT x FROM shared").unwrap();
        assert_eq!(r.value_int64(0, 0), 5);
        a.disconnect();
    }

    #[test]
    fn test_appender_resolves_case() {
        let db = Database::open_in_memory().unwrap();
        let conn = db.connect().unwrap();
        conn.query("CREATE TABLE items (x INT)").unwrap();
        assert!(conn.appender(None, "ITEMS").is_ok());
        let err = conn.appender(None, "absent").unwrap_err();
        assert_eq!(err.code(), codes::TABLE_NOT_FOUND);
    }

    #[test]
    fn test_appender_rejected_when_read_only() {
        let dir = tempfile::tempdir().unwrap();
        {
            let db = Database::open(Some(dir.path())).unwrap();
            db.connect().unwrap().query("CREATE TABLE items (x INT)").unwrap();
            db.close().unwrap();
        }
        let mut config = crate::config::Config::default();
        config.set("access_mode", "read_only").unwrap();
        let db = Database::open_ext(Some(dir.path()), config).unwrap();
        let conn = db.connect().unwrap();
        let err = conn.appender(None, "items").unwrap_err();
        assert_eq!(err.code(), codes::READ_ONLY);
        assert!(!err.is_retryable());
    }
}
