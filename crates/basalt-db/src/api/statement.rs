//! Prepared statements with positional parameter slots.

use std::sync::Arc;

use arrow::datatypes::DataType;
use datafusion::logical_expr::LogicalPlan;
use datafusion_common::ScalarValue;
use tracing::debug;

use super::arrow_result::ArrowResult;
use super::error::ApiError;
use super::result::QueryResult;
use crate::codec;
use crate::engine::{Engine, Executed};
use crate::error::DbError;
use crate::sql_utils::{number_placeholders, split_statements};
use crate::types::{Date, HugeInt, Interval, ScalarType, Time, Timestamp, Value};

/// A planned statement that can be bound and executed many times.
///
/// Slots are numbered `0..nparams()`. Bindings survive execution, so a
/// later run only needs to re-bind the slots that change. Executing with a
/// slot that was never bound fails; `bind_null` counts as a binding.
#[derive(Debug)]
pub struct PreparedStatement {
    engine: Arc<Engine>,
    sql: String,
    plan: LogicalPlan,
    param_types: Vec<Option<DataType>>,
    bindings: Vec<Option<ScalarValue>>,
}

impl PreparedStatement {
    pub(crate) fn prepare(engine: Arc<Engine>, sql: &str) -> Result<Self, ApiError> {
        let statement = match split_statements(sql).as_slice() {
            [] => return Err(DbError::EmptyStatement.into()),
            [one] => *one,
            _ => {
                return Err(ApiError::sql_parse(
                    "Cannot prepare multiple statements at once",
                ))
            }
        };
        let numbered = number_placeholders(statement);
        let plan = engine.plan(&numbered.sql)?;
        let types = plan
            .get_parameter_types()
            .map_err(|e| ApiError::query(e.to_string()))?;

        let inferred_count = types
            .keys()
            .filter_map(|k| k.strip_prefix('$')?.parse::<usize>().ok())
            .max()
            .unwrap_or(0);
        let nparams = numbered.count.max(inferred_count);
        let param_types: Vec<Option<DataType>> = (1..=nparams)
            .map(|i| types.get(&format!("${i}")).cloned().flatten())
            .collect();

        debug!(nparams, sql = %statement, "Statement prepared");
        Ok(Self {
            engine,
            sql: numbered.sql,
            plan,
            param_types,
            bindings: vec![None; nparams],
        })
    }

    /// Statement text with placeholders numbered `$1..$n`.
    #[must_use]
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Number of parameter slots.
    #[must_use]
    pub fn nparams(&self) -> usize {
        self.param_types.len()
    }

    /// Type the engine inferred for a slot, when it could.
    #[must_use]
    pub fn param_type(&self, slot: usize) -> Option<ScalarType> {
        self.param_types
            .get(slot)?
            .as_ref()
            .map(ScalarType::from_arrow)
    }

    /// Whether a slot currently holds a value (including `NULL`).
    #[must_use]
    pub fn is_bound(&self, slot: usize) -> bool {
        self.bindings.get(slot).is_some_and(Option::is_some)
    }

    fn check_slot(&self, slot: usize) -> Result<(), ApiError> {
        if slot < self.nparams() {
            Ok(())
        } else {
            Err(ApiError::parameter_out_of_range(slot, self.nparams()))
        }
    }

    /// Bind a value to a slot, replacing any previous binding.
    ///
    /// # Errors
    ///
    /// Fails without changing any binding if `slot` is out of range or the
    /// value does not convert to the slot's inferred type.
    pub fn bind(&mut self, slot: usize, value: impl Into<Value>) -> Result<(), ApiError> {
        self.check_slot(slot)?;
        let value = value.into();
        let scalar = match &self.param_types[slot] {
            Some(data_type) => codec::cast_scalar(&value, data_type)
                .map_err(|e| ApiError::parameter_type(slot, e))?,
            None => codec::to_scalar(&value),
        };
        self.bindings[slot] = Some(scalar);
        Ok(())
    }

    /// Bind `NULL`.
    ///
    /// # Errors
    ///
    /// Fails if `slot` is out of range.
    pub fn bind_null(&mut self, slot: usize) -> Result<(), ApiError> {
        self.bind(slot, Value::Null)
    }

    /// Bind a boolean.
    ///
    /// # Errors
    ///
    /// See [`bind`](Self::bind).
    pub fn bind_boolean(&mut self, slot: usize, value: bool) -> Result<(), ApiError> {
        self.bind(slot, value)
    }

    /// Bind an `i8`.
    ///
    /// # Errors
    ///
    /// See [`bind`](Self::bind).
    pub fn bind_int8(&mut self, slot: usize, value: i8) -> Result<(), ApiError> {
        self.bind(slot, value)
    }

    /// Bind an `i16`.
    ///
    /// # Errors
    ///
    /// See [`bind`](Self::bind).
    pub fn bind_int16(&mut self, slot: usize, value: i16) -> Result<(), ApiError> {
        self.bind(slot, value)
    }

    /// Bind an `i32`.
    ///
    /// # Errors
    ///
    /// See [`bind`](Self::bind).
    pub fn bind_int32(&mut self, slot: usize, value: i32) -> Result<(), ApiError> {
        self.bind(slot, value)
    }

    /// Bind an `i64`.
    ///
    /// # Errors
    ///
    /// See [`bind`](Self::bind).
    pub fn bind_int64(&mut self, slot: usize, value: i64) -> Result<(), ApiError> {
        self.bind(slot, value)
    }

    /// Bind a `u8`.
    ///
    /// # Errors
    ///
    /// See [`bind`](Self::bind).
    pub fn bind_uint8(&mut self, slot: usize, value: u8) -> Result<(), ApiError> {
        self.bind(slot, value)
    }

    /// Bind a `u16`.
    ///
    /// # Errors
    ///
    /// See [`bind`](Self::bind).
    pub fn bind_uint16(&mut self, slot: usize, value: u16) -> Result<(), ApiError> {
        self.bind(slot, value)
    }

    /// Bind a `u32`.
    ///
    /// # Errors
    ///
    /// See [`bind`](Self::bind).
    pub fn bind_uint32(&mut self, slot: usize, value: u32) -> Result<(), ApiError> {
        self.bind(slot, value)
    }

    /// Bind a `u64`.
    ///
    /// # Errors
    ///
    /// See [`bind`](Self::bind).
    pub fn bind_uint64(&mut self, slot: usize, value: u64) -> Result<(), ApiError> {
        self.bind(slot, value)
    }

    /// Bind a 128-bit integer.
    ///
    /// # Errors
    ///
    /// See [`bind`](Self::bind).
    pub fn bind_hugeint(&mut self, slot: usize, value: HugeInt) -> Result<(), ApiError> {
        self.bind(slot, value)
    }

    /// Bind an `f32`.
    ///
    /// # Errors
    ///
    /// See [`bind`](Self::bind).
    pub fn bind_float(&mut self, slot: usize, value: f32) -> Result<(), ApiError> {
        self.bind(slot, value)
    }

    /// Bind an `f64`.
    ///
    /// # Errors
    ///
    /// See [`bind`](Self::bind).
    pub fn bind_double(&mut self, slot: usize, value: f64) -> Result<(), ApiError> {
        self.bind(slot, value)
    }

    /// Bind a date.
    ///
    /// # Errors
    ///
    /// Also fails if the parts are not a real calendar date.
    pub fn bind_date(&mut self, slot: usize, value: Date) -> Result<(), ApiError> {
        self.check_slot(slot)?;
        let days = value
            .to_days()
            .ok_or_else(|| ApiError::parameter_type(slot, format!("invalid date {value:?}")))?;
        self.bind(slot, Value::Date(days))
    }

    /// Bind a time of day.
    ///
    /// # Errors
    ///
    /// Also fails if a component is out of range.
    pub fn bind_time(&mut self, slot: usize, value: Time) -> Result<(), ApiError> {
        self.check_slot(slot)?;
        if !value.is_valid() {
            return Err(ApiError::parameter_type(slot, format!("invalid time {value:?}")));
        }
        self.bind(slot, Value::Time(value.to_micros()))
    }

    /// Bind a timestamp.
    ///
    /// # Errors
    ///
    /// Also fails if the parts do not form a representable timestamp.
    pub fn bind_timestamp(&mut self, slot: usize, value: Timestamp) -> Result<(), ApiError> {
        self.check_slot(slot)?;
        let micros = value
            .to_micros()
            .ok_or_else(|| ApiError::parameter_type(slot, format!("invalid timestamp {value:?}")))?;
        self.bind(slot, Value::Timestamp(micros))
    }

    /// Bind an interval.
    ///
    /// # Errors
    ///
    /// See [`bind`](Self::bind).
    pub fn bind_interval(&mut self, slot: usize, value: Interval) -> Result<(), ApiError> {
        self.bind(slot, value)
    }

    /// Bind text.
    ///
    /// # Errors
    ///
    /// See [`bind`](Self::bind).
    pub fn bind_varchar(&mut self, slot: usize, value: &str) -> Result<(), ApiError> {
        self.bind(slot, value)
    }

    /// Bind text given as a byte range.
    ///
    /// # Errors
    ///
    /// Also fails if the bytes are not UTF-8.
    pub fn bind_varchar_length(&mut self, slot: usize, value: &[u8]) -> Result<(), ApiError> {
        self.check_slot(slot)?;
        let text = std::str::from_utf8(value).map_err(|e| ApiError::parameter_type(slot, e))?;
        self.bind(slot, text)
    }

    /// Bind opaque bytes.
    ///
    /// # Errors
    ///
    /// See [`bind`](Self::bind).
    pub fn bind_blob(&mut self, slot: usize, value: &[u8]) -> Result<(), ApiError> {
        self.bind(slot, value)
    }

    /// Forget every binding.
    pub fn clear_bindings(&mut self) {
        self.bindings.fill(None);
    }

    fn run(&self) -> Result<Executed, ApiError> {
        let params = self
            .bindings
            .iter()
            .enumerate()
            .map(|(slot, bound)| bound.clone().ok_or_else(|| ApiError::parameter_unbound(slot)))
            .collect::<Result<Vec<_>, _>>()?;
        let plan = if params.is_empty() {
            self.plan.clone()
        } else {
            self.plan
                .clone()
                .with_param_values(params)
                .map_err(|e| ApiError::query(e.to_string()))?
        };
        Ok(self.engine.execute_plan(plan)?)
    }

    /// Execute with the current bindings.
    ///
    /// # Errors
    ///
    /// Fails with a binding error if any slot is unbound, or a query error
    /// if execution fails.
    pub fn execute(&self) -> Result<QueryResult, ApiError> {
        QueryResult::from_executed(self.run()?)
    }

    /// Execute and expose the output as Arrow chunks.
    ///
    /// # Errors
    ///
    /// Same as [`execute`](Self::execute).
    pub fn execute_arrow(&self) -> Result<ArrowResult, ApiError> {
        ArrowResult::new(self.run()?, self.engine.config().chunk_size)
    }
}
