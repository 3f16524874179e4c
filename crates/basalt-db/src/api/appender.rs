//! Row-oriented bulk loading into an existing table.

use std::sync::Arc;

use arrow::array::{ArrayRef, RecordBatch};
use arrow::datatypes::SchemaRef;
use datafusion_common::{DataFusionError, ScalarValue, TableReference};
use tracing::{debug, warn};

use super::error::ApiError;
use crate::codec;
use crate::engine::Engine;
use crate::error::DbError;
use crate::types::{Date, HugeInt, Interval, Time, Timestamp, Value};

/// Buffers rows and writes them to a table in batches.
///
/// A row is opened with [`begin_row`](Self::begin_row) (or implicitly by the
/// first append), filled with exactly one value per column, and committed
/// with [`end_row`](Self::end_row). Committed rows become visible once the
/// appender flushes, which happens automatically every `flush_rows` rows,
/// on [`flush`](Self::flush), and on [`close`](Self::close).
///
/// Values are converted to the column types at flush time. If any buffered
/// value does not convert, the whole buffer is discarded and the flush
/// fails with a schema mismatch. A read-only database discards it too.
/// If the engine rejects the write otherwise, the buffer is kept and the
/// flush can be retried.
///
/// # Example
///
/// ```rust,ignore
/// let mut appender = conn.appender(None, "trades")?;
/// appender.begin_row()?;
/// appender.append_int64(1)?;
/// appender.append_varchar("AAPL")?;
/// appender.end_row()?;
/// appender.close()?;
/// ```
pub struct Appender {
    engine: Arc<Engine>,
    table: TableReference,
    schema: SchemaRef,
    flush_rows: usize,
    rows: Vec<Vec<Value>>,
    current: Option<Vec<Value>>,
    closed: bool,
}

impl std::fmt::Debug for Appender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Appender")
            .field("table", &self.table)
            .field("buffered_rows", &self.rows.len())
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

impl Appender {
    pub(crate) fn new(
        engine: Arc<Engine>,
        table: TableReference,
        schema: SchemaRef,
        flush_rows: usize,
    ) -> Self {
        debug!(table = %table, columns = schema.fields().len(), "Appender created");
        Self {
            engine,
            table,
            schema,
            flush_rows: flush_rows.max(1),
            rows: Vec::new(),
            current: None,
            closed: false,
        }
    }

    /// Target table.
    #[must_use]
    pub fn table(&self) -> &TableReference {
        &self.table
    }

    /// Target table schema.
    #[must_use]
    pub fn schema(&self) -> &SchemaRef {
        &self.schema
    }

    /// Number of columns each row must fill.
    #[must_use]
    pub fn column_count(&self) -> usize {
        self.schema.fields().len()
    }

    /// Committed rows waiting for the next flush.
    #[must_use]
    pub fn buffered_rows(&self) -> usize {
        self.rows.len()
    }

    /// Whether [`close`](Self::close) has completed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn check_open(&self) -> Result<(), ApiError> {
        if self.closed {
            return Err(ApiError::appender_closed());
        }
        self.engine.check_open().map_err(ApiError::from)
    }

    /// Start a new row, discarding any values appended since the last
    /// [`end_row`](Self::end_row).
    ///
    /// # Errors
    ///
    /// Fails if the appender is closed.
    pub fn begin_row(&mut self) -> Result<(), ApiError> {
        self.check_open()?;
        self.current = Some(Vec::with_capacity(self.column_count()));
        Ok(())
    }

    /// Append the next column's value to the current row.
    ///
    /// # Errors
    ///
    /// Fails if the appender is closed or the row already has a value for
    /// every column.
    pub fn append(&mut self, value: impl Into<Value>) -> Result<(), ApiError> {
        self.check_open()?;
        let columns = self.column_count();
        let row = self
            .current
            .get_or_insert_with(|| Vec::with_capacity(columns));
        if row.len() >= columns {
            return Err(ApiError::column_count(format!(
                "Too many values in row: {} has {columns} columns",
                self.table
            )));
        }
        row.push(value.into());
        Ok(())
    }

    /// Commit the current row. Flushes when the buffer reaches the
    /// configured threshold.
    ///
    /// # Errors
    ///
    /// Fails if the row does not have exactly one value per column; the
    /// row is discarded. Also returns any error from an automatic flush.
    pub fn end_row(&mut self) -> Result<(), ApiError> {
        self.check_open()?;
        let row = self.current.take().unwrap_or_default();
        if row.len() != self.column_count() {
            return Err(ApiError::column_count(format!(
                "Expected {} values in row, got {}",
                self.column_count(),
                row.len()
            )));
        }
        self.rows.push(row);
        if self.rows.len() >= self.flush_rows {
            self.flush()?;
        }
        Ok(())
    }

    /// Append `NULL`.
    ///
    /// # Errors
    ///
    /// See [`append`](Self::append).
    pub fn append_null(&mut self) -> Result<(), ApiError> {
        self.append(Value::Null)
    }

    /// Append a boolean.
    ///
    /// # Errors
    ///
    /// See [`append`](Self::append).
    pub fn append_bool(&mut self, value: bool) -> Result<(), ApiError> {
        self.append(value)
    }

    /// Append an `i8`.
    ///
    /// # Errors
    ///
    /// See [`append`](Self::append).
    pub fn append_int8(&mut self, value: i8) -> Result<(), ApiError> {
        self.append(value)
    }

    /// Append an `i16`.
    ///
    /// # Errors
    ///
    /// See [`append`](Self::append).
    pub fn append_int16(&mut self, value: i16) -> Result<(), ApiError> {
        self.append(value)
    }

    /// Append an `i32`.
    ///
    /// # Errors
    ///
    /// See [`append`](Self::append).
    pub fn append_int32(&mut self, value: i32) -> Result<(), ApiError> {
        self.append(value)
    }

    /// Append an `i64`.
    ///
    /// # Errors
    ///
    /// See [`append`](Self::append).
    pub fn append_int64(&mut self, value: i64) -> Result<(), ApiError> {
        self.append(value)
    }

    /// Append a `u8`.
    ///
    /// # Errors
    ///
    /// See [`append`](Self::append).
    pub fn append_uint8(&mut self, value: u8) -> Result<(), ApiError> {
        self.append(value)
    }

    /// Append a `u16`.
    ///
    /// # Errors
    ///
    /// See [`append`](Self::append).
    pub fn append_uint16(&mut self, value: u16) -> Result<(), ApiError> {
        self.append(value)
    }

    /// Append a `u32`.
    ///
    /// # Errors
    ///
    /// See [`append`](Self::append).
    pub fn append_uint32(&mut self, value: u32) -> Result<(), ApiError> {
        self.append(value)
    }

    /// Append a `u64`.
    ///
    /// # Errors
    ///
    /// See [`append`](Self::append).
    pub fn append_uint64(&mut self, value: u64) -> Result<(), ApiError> {
        self.append(value)
    }

    /// Append a 128-bit integer.
    ///
    /// # Errors
    ///
    /// See [`append`](Self::append).
    pub fn append_hugeint(&mut self, value: HugeInt) -> Result<(), ApiError> {
        self.append(value)
    }

    /// Append an `f32`.
    ///
    /// # Errors
    ///
    /// See [`append`](Self::append).
    pub fn append_float(&mut self, value: f32) -> Result<(), ApiError> {
        self.append(value)
    }

    /// Append an `f64`.
    ///
    /// # Errors
    ///
    /// See [`append`](Self::append).
    pub fn append_double(&mut self, value: f64) -> Result<(), ApiError> {
        self.append(value)
    }

    /// Append a date.
    ///
    /// # Errors
    ///
    /// Also fails if the parts are not a real calendar date.
    pub fn append_date(&mut self, value: Date) -> Result<(), ApiError> {
        let days = value
            .to_days()
            .ok_or_else(|| ApiError::invalid_value(format!("Invalid date {value:?}")))?;
        self.append(Value::Date(days))
    }

    /// Append a time of day.
    ///
    /// # Errors
    ///
    /// Also fails if a component is out of range.
    pub fn append_time(&mut self, value: Time) -> Result<(), ApiError> {
        if !value.is_valid() {
            return Err(ApiError::invalid_value(format!("Invalid time {value:?}")));
        }
        self.append(Value::Time(value.to_micros()))
    }

    /// Append a timestamp.
    ///
    /// # Errors
    ///
    /// Also fails if the parts do not form a representable timestamp.
    pub fn append_timestamp(&mut self, value: Timestamp) -> Result<(), ApiError> {
        let micros = value
            .to_micros()
            .ok_or_else(|| ApiError::invalid_value(format!("Invalid timestamp {value:?}")))?;
        self.append(Value::Timestamp(micros))
    }

    /// Append an interval.
    ///
    /// # Errors
    ///
    /// See [`append`](Self::append).
    pub fn append_interval(&mut self, value: Interval) -> Result<(), ApiError> {
        self.append(value)
    }

    /// Append text.
    ///
    /// # Errors
    ///
    /// See [`append`](Self::append).
    pub fn append_varchar(&mut self, value: &str) -> Result<(), ApiError> {
        self.append(value)
    }

    /// Append text given as a byte range.
    ///
    /// # Errors
    ///
    /// Also fails if the bytes are not UTF-8.
    pub fn append_varchar_length(&mut self, value: &[u8]) -> Result<(), ApiError> {
        let text = std::str::from_utf8(value)
            .map_err(|e| ApiError::invalid_value(format!("Invalid UTF-8 in varchar: {e}")))?;
        self.append(text)
    }

    /// Append opaque bytes.
    ///
    /// # Errors
    ///
    /// See [`append`](Self::append).
    pub fn append_blob(&mut self, value: &[u8]) -> Result<(), ApiError> {
        self.append(value)
    }

    /// Convert the buffered rows into one batch with the table's schema.
    fn build_batch(&self) -> Result<RecordBatch, DataFusionError> {
        let arrays = self
            .schema
            .fields()
            .iter()
            .enumerate()
            .map(|(col, field)| {
                let scalars = self
                    .rows
                    .iter()
                    .map(|row| codec::cast_scalar(&row[col], field.data_type()))
                    .collect::<Result<Vec<_>, _>>()?;
                ScalarValue::iter_to_array(scalars)
            })
            .collect::<Result<Vec<ArrayRef>, _>>()?;
        Ok(RecordBatch::try_new(Arc::clone(&self.schema), arrays)?)
    }

    /// Write every committed row to the table.
    ///
    /// # Errors
    ///
    /// Returns a schema mismatch (buffer discarded) if a value does not fit
    /// its column, a read-only error (buffer discarded) if the database
    /// does not accept writes, or a retryable flush error (buffer kept) if
    /// the engine rejects the write.
    pub fn flush(&mut self) -> Result<(), ApiError> {
        self.check_open()?;
        if self.rows.is_empty() {
            return Ok(());
        }
        let batch = match self.build_batch() {
            Ok(batch) => batch,
            Err(e) => {
                let discarded = self.rows.len();
                self.rows.clear();
                warn!(table = %self.table, discarded, error = %e, "Appender rows discarded");
                return Err(ApiError::schema_mismatch(format!(
                    "Failed to convert appended rows for {}: {e}",
                    self.table
                )));
            }
        };
        match self.engine.append_batch(&self.table, batch) {
            Ok(written) => {
                debug!(table = %self.table, rows = written, "Appender flushed");
                self.rows.clear();
                Ok(())
            }
            Err(DbError::Shutdown) => Err(ApiError::shutdown()),
            Err(e @ DbError::ReadOnly(_)) => {
                let discarded = self.rows.len();
                self.rows.clear();
                warn!(table = %self.table, discarded, error = %e, "Appender rows discarded");
                Err(e.into())
            }
            Err(e) => Err(ApiError::flush_failed(format!(
                "Failed to write to {}: {e}",
                self.table
            ))),
        }
    }

    /// Flush and close. Closing again is a no-op.
    ///
    /// Values appended without a matching [`end_row`](Self::end_row) are
    /// dropped.
    ///
    /// # Errors
    ///
    /// Returns the flush error, if any. After a retryable failure the
    /// appender stays open so the close can be retried.
    pub fn close(&mut self) -> Result<(), ApiError> {
        if self.closed {
            return Ok(());
        }
        self.current = None;
        if !self.rows.is_empty() {
            self.flush()?;
        }
        self.closed = true;
        debug!(table = %self.table, "Appender closed");
        Ok(())
    }
}

impl Drop for Appender {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(table = %self.table, error = %e, "Failed to close appender on drop");
        }
    }
}
