//! Materialized, column-major query results.

use std::sync::Arc;

use arrow::array::{
    new_empty_array, Array, ArrayRef, AsArray, BinaryArray, RecordBatch, StringArray,
};
use arrow::buffer::{BooleanBuffer, NullBuffer, ScalarBuffer};
use arrow::compute::{cast, concat};
use arrow::datatypes::{
    DataType, Date32Type, Decimal128Type, Float32Type, Float64Type, Int16Type, Int32Type,
    Int64Type, Int8Type, IntervalMonthDayNano, IntervalMonthDayNanoType, SchemaRef,
    Time64MicrosecondType, TimestampMicrosecondType, TimestampMillisecondType,
    TimestampNanosecondType, TimestampSecondType, UInt16Type, UInt32Type, UInt64Type, UInt8Type,
};
use arrow::error::ArrowError;
use arrow::util::display::{ArrayFormatter, FormatOptions};

use super::error::ApiError;
use crate::arena::{default_arena, Arena, ArenaBlob, ArenaString};
use crate::codec::{self, FromValue};
use crate::engine::Executed;
use crate::types::{Date, HugeInt, Interval, ScalarType, Time, Timestamp, ValueRef};

/// Dense values of one column, tagged by scalar type.
///
/// Slots under a null bit hold unspecified values.
#[derive(Debug, Clone)]
pub enum ColumnData {
    /// `BOOLEAN`
    Boolean(BooleanBuffer),
    /// `TINYINT`
    TinyInt(ScalarBuffer<i8>),
    /// `SMALLINT`
    SmallInt(ScalarBuffer<i16>),
    /// `INTEGER`
    Integer(ScalarBuffer<i32>),
    /// `BIGINT`
    BigInt(ScalarBuffer<i64>),
    /// `UTINYINT`
    UTinyInt(ScalarBuffer<u8>),
    /// `USMALLINT`
    USmallInt(ScalarBuffer<u16>),
    /// `UINTEGER`
    UInteger(ScalarBuffer<u32>),
    /// `UBIGINT`
    UBigInt(ScalarBuffer<u64>),
    /// `FLOAT`
    Float(ScalarBuffer<f32>),
    /// `DOUBLE`
    Double(ScalarBuffer<f64>),
    /// `TIMESTAMP` (µs)
    Timestamp(ScalarBuffer<i64>),
    /// `TIMESTAMP_S`
    TimestampS(ScalarBuffer<i64>),
    /// `TIMESTAMP_NS`
    TimestampNs(ScalarBuffer<i64>),
    /// `TIMESTAMP_MS`
    TimestampMs(ScalarBuffer<i64>),
    /// `DATE` (days since the epoch)
    Date(ScalarBuffer<i32>),
    /// `TIME` (µs since midnight)
    Time(ScalarBuffer<i64>),
    /// `INTERVAL`
    Interval(ScalarBuffer<IntervalMonthDayNano>),
    /// `HUGEINT`
    HugeInt(ScalarBuffer<i128>),
    /// `VARCHAR`
    Varchar(StringArray),
    /// `BLOB`
    Blob(BinaryArray),
}

impl ColumnData {
    fn value(&self, row: usize) -> ValueRef<'_> {
        match self {
            Self::Boolean(b) => ValueRef::Boolean(b.value(row)),
            Self::TinyInt(v) => ValueRef::TinyInt(v[row]),
            Self::SmallInt(v) => ValueRef::SmallInt(v[row]),
            Self::Integer(v) => ValueRef::Integer(v[row]),
            Self::BigInt(v) => ValueRef::BigInt(v[row]),
            Self::UTinyInt(v) => ValueRef::UTinyInt(v[row]),
            Self::USmallInt(v) => ValueRef::USmallInt(v[row]),
            Self::UInteger(v) => ValueRef::UInteger(v[row]),
            Self::UBigInt(v) => ValueRef::UBigInt(v[row]),
            Self::Float(v) => ValueRef::Float(v[row]),
            Self::Double(v) => ValueRef::Double(v[row]),
            Self::Timestamp(v) => ValueRef::Timestamp(v[row]),
            Self::TimestampS(v) => ValueRef::TimestampS(v[row]),
            Self::TimestampNs(v) => ValueRef::TimestampNs(v[row]),
            Self::TimestampMs(v) => ValueRef::TimestampMs(v[row]),
            Self::Date(v) => ValueRef::Date(v[row]),
            Self::Time(v) => ValueRef::Time(v[row]),
            Self::Interval(v) => {
                let iv = v[row];
                ValueRef::Interval(Interval::new(iv.months, iv.days, iv.nanoseconds / 1_000))
            }
            Self::HugeInt(v) => ValueRef::HugeInt(v[row]),
            Self::Varchar(a) => ValueRef::Varchar(a.value(row)),
            Self::Blob(a) => ValueRef::Blob(a.value(row)),
        }
    }
}

/// One result column: name, declared type, values and validity.
#[derive(Debug, Clone)]
pub struct Column {
    name: String,
    scalar_type: ScalarType,
    data: ColumnData,
    nulls: Option<NullBuffer>,
    len: usize,
}

impl Column {
    /// Column name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared type.
    #[must_use]
    pub fn scalar_type(&self) -> ScalarType {
        self.scalar_type
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the column has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Dense values.
    #[must_use]
    pub fn data(&self) -> &ColumnData {
        &self.data
    }

    /// Validity bitmap; `None` when no value is null.
    #[must_use]
    pub fn nulls(&self) -> Option<&NullBuffer> {
        self.nulls.as_ref()
    }

    /// Number of null cells.
    #[must_use]
    pub fn null_count(&self) -> usize {
        self.nulls.as_ref().map_or(0, NullBuffer::null_count)
    }

    /// Whether the cell is null. Out-of-range rows read as null.
    #[must_use]
    pub fn is_null(&self, row: usize) -> bool {
        row >= self.len || self.nulls.as_ref().is_some_and(|n| n.is_null(row))
    }

    /// The cell's value, or `Null` for null or out-of-range rows.
    #[must_use]
    pub fn value(&self, row: usize) -> ValueRef<'_> {
        if self.is_null(row) {
            ValueRef::Null
        } else {
            self.data.value(row)
        }
    }

    fn from_array(name: String, array: &ArrayRef) -> Result<Self, ArrowError> {
        let scalar_type = ScalarType::from_arrow(array.data_type());
        let array = normalize(array, scalar_type)?;
        let data = match scalar_type {
            ScalarType::Boolean => ColumnData::Boolean(array.as_boolean().values().clone()),
            ScalarType::TinyInt => ColumnData::TinyInt(array.as_primitive::<Int8Type>().values().clone()),
            ScalarType::SmallInt => ColumnData::SmallInt(array.as_primitive::<Int16Type>().values().clone()),
            ScalarType::Integer => ColumnData::Integer(array.as_primitive::<Int32Type>().values().clone()),
            ScalarType::BigInt => ColumnData::BigInt(array.as_primitive::<Int64Type>().values().clone()),
            ScalarType::UTinyInt => ColumnData::UTinyInt(array.as_primitive::<UInt8Type>().values().clone()),
            ScalarType::USmallInt => ColumnData::USmallInt(array.as_primitive::<UInt16Type>().values().clone()),
            ScalarType::UInteger => ColumnData::UInteger(array.as_primitive::<UInt32Type>().values().clone()),
            ScalarType::UBigInt => ColumnData::UBigInt(array.as_primitive::<UInt64Type>().values().clone()),
            ScalarType::Float => ColumnData::Float(array.as_primitive::<Float32Type>().values().clone()),
            ScalarType::Double => ColumnData::Double(array.as_primitive::<Float64Type>().values().clone()),
            ScalarType::Timestamp => {
                ColumnData::Timestamp(array.as_primitive::<TimestampMicrosecondType>().values().clone())
            }
            ScalarType::TimestampS => {
                ColumnData::TimestampS(array.as_primitive::<TimestampSecondType>().values().clone())
            }
            ScalarType::TimestampNs => {
                ColumnData::TimestampNs(array.as_primitive::<TimestampNanosecondType>().values().clone())
            }
            ScalarType::TimestampMs => {
                ColumnData::TimestampMs(array.as_primitive::<TimestampMillisecondType>().values().clone())
            }
            ScalarType::Date => ColumnData::Date(array.as_primitive::<Date32Type>().values().clone()),
            ScalarType::Time => ColumnData::Time(array.as_primitive::<Time64MicrosecondType>().values().clone()),
            ScalarType::Interval => {
                ColumnData::Interval(array.as_primitive::<IntervalMonthDayNanoType>().values().clone())
            }
            ScalarType::HugeInt => ColumnData::HugeInt(array.as_primitive::<Decimal128Type>().values().clone()),
            ScalarType::Blob => ColumnData::Blob(array.as_binary::<i32>().clone()),
            ScalarType::Varchar | ScalarType::Invalid => ColumnData::Varchar(array.as_string::<i32>().clone()),
        };
        Ok(Self {
            name,
            scalar_type,
            data,
            nulls: array.logical_nulls().filter(|n| n.null_count() > 0),
            len: array.len(),
        })
    }
}

fn is_text(data_type: &DataType) -> bool {
    match data_type {
        DataType::Utf8 | DataType::LargeUtf8 | DataType::Utf8View => true,
        DataType::Dictionary(_, value) => is_text(value),
        _ => false,
    }
}

/// Cast `array` to the canonical Arrow type of `tag`, rendering types
/// with no native tag as text.
fn normalize(array: &ArrayRef, tag: ScalarType) -> Result<ArrayRef, ArrowError> {
    if tag == ScalarType::Varchar && !is_text(array.data_type()) {
        let formatter = ArrayFormatter::try_new(array.as_ref(), &FormatOptions::default())?;
        let rendered: StringArray = (0..array.len())
            .map(|i| array.is_valid(i).then(|| formatter.value(i).to_string()))
            .collect();
        return Ok(Arc::new(rendered));
    }
    match tag.arrow_type() {
        Some(target) if *array.data_type() != target => cast(array.as_ref(), &target),
        _ => Ok(Arc::clone(array)),
    }
}

/// A fully materialized result set.
///
/// Reads are side-effect free and may run concurrently. String and blob
/// accessors copy into the result's [`Arena`].
#[derive(Debug, Clone)]
pub struct QueryResult {
    columns: Vec<Column>,
    row_count: usize,
    rows_changed: u64,
    arena: Arc<dyn Arena>,
}

macro_rules! typed_accessors {
    ($($(#[$doc:meta])* $name:ident -> $ty:ty;)*) => {
        $(
            $(#[$doc])*
            #[must_use]
            pub fn $name(&self, col: usize, row: usize) -> $ty {
                self.fetch(col, row)
            }
        )*
    };
}

impl QueryResult {
    pub(crate) fn from_executed(executed: Executed) -> Result<Self, ApiError> {
        let Executed {
            schema,
            batches,
            rows_changed,
        } = executed;
        let columns = materialize(&schema, &batches)
            .map_err(|e| ApiError::query(format!("Failed to materialize result: {e}")))?;
        let row_count = columns.first().map_or(0, Column::len);
        Ok(Self {
            columns,
            row_count,
            rows_changed,
            arena: default_arena(),
        })
    }

    /// Route string and blob copies to `arena`.
    #[must_use]
    pub fn with_arena(mut self, arena: Arc<dyn Arena>) -> Self {
        self.arena = arena;
        self
    }

    /// Number of columns.
    #[must_use]
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Number of rows.
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.row_count
    }

    /// Rows affected by an `INSERT`/`UPDATE`/`DELETE`; 0 for reads.
    #[must_use]
    pub fn rows_changed(&self) -> u64 {
        self.rows_changed
    }

    /// All columns in order.
    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Column by index.
    #[must_use]
    pub fn column(&self, col: usize) -> Option<&Column> {
        self.columns.get(col)
    }

    /// Column name; valid for the lifetime of the result.
    #[must_use]
    pub fn column_name(&self, col: usize) -> Option<&str> {
        self.column(col).map(Column::name)
    }

    /// Column type, or `Invalid` when `col` is out of range.
    #[must_use]
    pub fn column_type(&self, col: usize) -> ScalarType {
        self.column(col).map_or(ScalarType::Invalid, Column::scalar_type)
    }

    /// Whether the cell is null. Out-of-range cells read as null.
    #[must_use]
    pub fn is_null(&self, col: usize, row: usize) -> bool {
        self.column(col).map_or(true, |c| c.is_null(row))
    }

    /// Borrow the cell's stored value.
    #[must_use]
    pub fn value(&self, col: usize, row: usize) -> ValueRef<'_> {
        self.column(col).map_or(ValueRef::Null, |c| c.value(row))
    }

    /// Convert the cell to `T`, or `T::FAILURE` for null, out-of-range or
    /// unrepresentable cells.
    #[must_use]
    pub fn fetch<T: FromValue>(&self, col: usize, row: usize) -> T {
        codec::fetch(self.value(col, row))
    }

    typed_accessors! {
        /// Cell as `bool`.
        value_boolean -> bool;
        /// Cell as `i8`.
        value_int8 -> i8;
        /// Cell as `i16`.
        value_int16 -> i16;
        /// Cell as `i32`.
        value_int32 -> i32;
        /// Cell as `i64`.
        value_int64 -> i64;
        /// Cell as `u8`.
        value_uint8 -> u8;
        /// Cell as `u16`.
        value_uint16 -> u16;
        /// Cell as `u32`.
        value_uint32 -> u32;
        /// Cell as `u64`.
        value_uint64 -> u64;
        /// Cell as `f32`.
        value_float -> f32;
        /// Cell as `f64`.
        value_double -> f64;
        /// Cell as a [`Date`].
        value_date -> Date;
        /// Cell as a [`Time`].
        value_time -> Time;
        /// Cell as a [`Timestamp`].
        value_timestamp -> Timestamp;
        /// Cell as an [`Interval`].
        value_interval -> Interval;
        /// Cell as a [`HugeInt`].
        value_hugeint -> HugeInt;
    }

    /// Cell rendered as text in a fresh arena buffer; `None` for null.
    #[must_use]
    pub fn value_varchar(&self, col: usize, row: usize) -> Option<ArenaString> {
        let text = codec::to_text(self.value(col, row))?;
        ArenaString::new(Arc::clone(&self.arena), &text)
    }

    /// Cell bytes in a fresh arena buffer; `None` for null or non-binary.
    #[must_use]
    pub fn value_blob(&self, col: usize, row: usize) -> Option<ArenaBlob> {
        let value = self.value(col, row);
        let bytes = codec::to_blob(value)?;
        ArenaBlob::new(Arc::clone(&self.arena), bytes)
    }
}

fn materialize(schema: &SchemaRef, batches: &[RecordBatch]) -> Result<Vec<Column>, ArrowError> {
    schema
        .fields()
        .iter()
        .enumerate()
        .map(|(i, field)| {
            let parts: Vec<&dyn Array> = batches.iter().map(|b| b.column(i).as_ref()).collect();
            let array = match parts.len() {
                0 => new_empty_array(field.data_type()),
                1 => Arc::clone(batches[0].column(i)),
                _ => concat(&parts)?,
            };
            Column::from_array(field.name().clone(), &array)
        })
        .collect()
}
