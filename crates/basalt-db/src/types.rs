//! Scalar type tags and the host-visible value structs.
//!
//! Stored values keep the engine's physical units (days since the epoch,
//! microseconds, ...). The `#[repr(C)]` structs here are the decomposed
//! forms handed to callers and shared with the C ABI.

use std::fmt;

use arrow::datatypes::{DataType, IntervalUnit, TimeUnit};
use chrono::{Datelike, NaiveDate};

/// Days between 0001-01-01 (CE day 1) and 1970-01-01.
const UNIX_EPOCH_FROM_CE: i32 = 719_163;
pub(crate) const MICROS_PER_SECOND: i64 = 1_000_000;
pub(crate) const MICROS_PER_DAY: i64 = 86_400 * MICROS_PER_SECOND;

/// Declared type of a result column, parameter, or appended value.
///
/// The discriminants are part of the C ABI and never change.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarType {
    /// Unknown or not applicable (e.g. an out-of-range column index).
    Invalid = 0,
    /// `BOOLEAN`
    Boolean = 1,
    /// `TINYINT`, 8-bit signed.
    TinyInt = 2,
    /// `SMALLINT`, 16-bit signed.
    SmallInt = 3,
    /// `INTEGER`, 32-bit signed.
    Integer = 4,
    /// `BIGINT`, 64-bit signed.
    BigInt = 5,
    /// `UTINYINT`, 8-bit unsigned.
    UTinyInt = 6,
    /// `USMALLINT`, 16-bit unsigned.
    USmallInt = 7,
    /// `UINTEGER`, 32-bit unsigned.
    UInteger = 8,
    /// `UBIGINT`, 64-bit unsigned.
    UBigInt = 9,
    /// `FLOAT`, 32-bit IEEE 754.
    Float = 10,
    /// `DOUBLE`, 64-bit IEEE 754.
    Double = 11,
    /// `TIMESTAMP` with microsecond resolution.
    Timestamp = 12,
    /// `TIMESTAMP_S`, second resolution.
    TimestampS = 13,
    /// `TIMESTAMP_NS`, nanosecond resolution.
    TimestampNs = 14,
    /// `TIMESTAMP_MS`, millisecond resolution.
    TimestampMs = 15,
    /// `DATE`
    Date = 16,
    /// `TIME` with microsecond resolution.
    Time = 17,
    /// `INTERVAL` as a months/days/microseconds triple.
    Interval = 18,
    /// `HUGEINT`, 128-bit signed.
    HugeInt = 19,
    /// `VARCHAR`, UTF-8 text.
    Varchar = 20,
    /// `BLOB`, opaque bytes.
    Blob = 21,
}

impl ScalarType {
    /// SQL name of the type.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Invalid => "INVALID",
            Self::Boolean => "BOOLEAN",
            Self::TinyInt => "TINYINT",
            Self::SmallInt => "SMALLINT",
            Self::Integer => "INTEGER",
            Self::BigInt => "BIGINT",
            Self::UTinyInt => "UTINYINT",
            Self::USmallInt => "USMALLINT",
            Self::UInteger => "UINTEGER",
            Self::UBigInt => "UBIGINT",
            Self::Float => "FLOAT",
            Self::Double => "DOUBLE",
            Self::Timestamp => "TIMESTAMP",
            Self::TimestampS => "TIMESTAMP_S",
            Self::TimestampNs => "TIMESTAMP_NS",
            Self::TimestampMs => "TIMESTAMP_MS",
            Self::Date => "DATE",
            Self::Time => "TIME",
            Self::Interval => "INTERVAL",
            Self::HugeInt => "HUGEINT",
            Self::Varchar => "VARCHAR",
            Self::Blob => "BLOB",
        }
    }

    /// Map an Arrow type to the tag it materializes as.
    ///
    /// Types outside the tag set are normalized: wide strings and binaries
    /// collapse to `VARCHAR`/`BLOB`, integral decimals become `HUGEINT`,
    /// fractional decimals become `DOUBLE`, and nested types are rendered
    /// as text.
    #[must_use]
    pub fn from_arrow(data_type: &DataType) -> Self {
        match data_type {
            DataType::Boolean => Self::Boolean,
            DataType::Int8 => Self::TinyInt,
            DataType::Int16 => Self::SmallInt,
            DataType::Int32 | DataType::Null => Self::Integer,
            DataType::Int64 | DataType::Duration(_) => Self::BigInt,
            DataType::UInt8 => Self::UTinyInt,
            DataType::UInt16 => Self::USmallInt,
            DataType::UInt32 => Self::UInteger,
            DataType::UInt64 => Self::UBigInt,
            DataType::Float16 | DataType::Float32 => Self::Float,
            DataType::Float64 => Self::Double,
            DataType::Decimal128(_, 0) | DataType::Decimal256(_, 0) => Self::HugeInt,
            DataType::Decimal128(..) | DataType::Decimal256(..) => Self::Double,
            DataType::Timestamp(TimeUnit::Second, _) => Self::TimestampS,
            DataType::Timestamp(TimeUnit::Millisecond, _) => Self::TimestampMs,
            DataType::Timestamp(TimeUnit::Microsecond, _) => Self::Timestamp,
            DataType::Timestamp(TimeUnit::Nanosecond, _) => Self::TimestampNs,
            DataType::Date32 | DataType::Date64 => Self::Date,
            DataType::Time32(_) | DataType::Time64(_) => Self::Time,
            DataType::Interval(_) => Self::Interval,
            DataType::Binary
            | DataType::LargeBinary
            | DataType::BinaryView
            | DataType::FixedSizeBinary(_) => Self::Blob,
            DataType::Dictionary(_, value) => Self::from_arrow(value),
            _ => Self::Varchar,
        }
    }

    /// The Arrow type a column of this tag is stored as once materialized.
    #[must_use]
    pub fn arrow_type(self) -> Option<DataType> {
        let data_type = match self {
            Self::Invalid => return None,
            Self::Boolean => DataType::Boolean,
            Self::TinyInt => DataType::Int8,
            Self::SmallInt => DataType::Int16,
            Self::Integer => DataType::Int32,
            Self::BigInt => DataType::Int64,
            Self::UTinyInt => DataType::UInt8,
            Self::USmallInt => DataType::UInt16,
            Self::UInteger => DataType::UInt32,
            Self::UBigInt => DataType::UInt64,
            Self::Float => DataType::Float32,
            Self::Double => DataType::Float64,
            Self::Timestamp => DataType::Timestamp(TimeUnit::Microsecond, None),
            Self::TimestampS => DataType::Timestamp(TimeUnit::Second, None),
            Self::TimestampNs => DataType::Timestamp(TimeUnit::Nanosecond, None),
            Self::TimestampMs => DataType::Timestamp(TimeUnit::Millisecond, None),
            Self::Date => DataType::Date32,
            Self::Time => DataType::Time64(TimeUnit::Microsecond),
            Self::Interval => DataType::Interval(IntervalUnit::MonthDayNano),
            Self::HugeInt => DataType::Decimal128(38, 0),
            Self::Varchar => DataType::Utf8,
            Self::Blob => DataType::Binary,
        };
        Some(data_type)
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A calendar date.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Date {
    /// Proleptic Gregorian year.
    pub year: i32,
    /// Month, 1-12.
    pub month: i8,
    /// Day of month, 1-31.
    pub day: i8,
}

impl Date {
    /// Construct a date from its parts without validation.
    #[must_use]
    pub const fn new(year: i32, month: i8, day: i8) -> Self {
        Self { year, month, day }
    }

    /// Decompose a count of days since 1970-01-01.
    #[must_use]
    pub fn from_days(days: i32) -> Option<Self> {
        let date = NaiveDate::from_num_days_from_ce_opt(days.checked_add(UNIX_EPOCH_FROM_CE)?)?;
        Some(Self::from_naive(date))
    }

    /// Days since 1970-01-01, or `None` if the parts are not a real date.
    #[must_use]
    pub fn to_days(self) -> Option<i32> {
        Some(self.to_naive()?.num_days_from_ce() - UNIX_EPOCH_FROM_CE)
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    pub(crate) fn from_naive(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month() as i8,
            day: date.day() as i8,
        }
    }

    pub(crate) fn to_naive(self) -> Option<NaiveDate> {
        let month = u32::try_from(self.month).ok()?;
        let day = u32::try_from(self.day).ok()?;
        NaiveDate::from_ymd_opt(self.year, month, day)
    }
}

/// A time of day with microsecond precision.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Time {
    /// Hour, 0-23.
    pub hour: i8,
    /// Minute, 0-59.
    pub min: i8,
    /// Second, 0-59.
    pub sec: i8,
    /// Microseconds, 0-999999.
    pub micros: i32,
}

impl Time {
    /// Construct a time from its parts without validation.
    #[must_use]
    pub const fn new(hour: i8, min: i8, sec: i8, micros: i32) -> Self {
        Self {
            hour,
            min,
            sec,
            micros,
        }
    }

    /// Decompose microseconds since midnight. Values wrap around a day.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn from_micros(micros: i64) -> Self {
        let micros = micros.rem_euclid(MICROS_PER_DAY);
        let secs = micros / MICROS_PER_SECOND;
        Self {
            hour: (secs / 3600) as i8,
            min: (secs / 60 % 60) as i8,
            sec: (secs % 60) as i8,
            micros: (micros % MICROS_PER_SECOND) as i32,
        }
    }

    /// Microseconds since midnight.
    #[must_use]
    pub fn to_micros(self) -> i64 {
        (i64::from(self.hour) * 3600 + i64::from(self.min) * 60 + i64::from(self.sec))
            * MICROS_PER_SECOND
            + i64::from(self.micros)
    }

    /// Whether every component is within its natural range.
    #[must_use]
    pub fn is_valid(self) -> bool {
        (0..24).contains(&self.hour)
            && (0..60).contains(&self.min)
            && (0..60).contains(&self.sec)
            && (0..1_000_000).contains(&self.micros)
    }
}

/// A date and time of day, without time zone.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Timestamp {
    /// Date part.
    pub date: Date,
    /// Time-of-day part.
    pub time: Time,
}

impl Timestamp {
    /// Construct a timestamp from a date and a time.
    #[must_use]
    pub const fn new(date: Date, time: Time) -> Self {
        Self { date, time }
    }

    /// Decompose microseconds since the Unix epoch.
    #[must_use]
    pub fn from_micros(micros: i64) -> Option<Self> {
        let days = i32::try_from(micros.div_euclid(MICROS_PER_DAY)).ok()?;
        Some(Self {
            date: Date::from_days(days)?,
            time: Time::from_micros(micros.rem_euclid(MICROS_PER_DAY)),
        })
    }

    /// Microseconds since the Unix epoch.
    #[must_use]
    pub fn to_micros(self) -> Option<i64> {
        if !self.time.is_valid() {
            return None;
        }
        i64::from(self.date.to_days()?)
            .checked_mul(MICROS_PER_DAY)?
            .checked_add(self.time.to_micros())
    }
}

/// A calendar interval.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Interval {
    /// Whole months.
    pub months: i32,
    /// Whole days.
    pub days: i32,
    /// Remaining microseconds.
    pub micros: i64,
}

impl Interval {
    /// Construct an interval.
    #[must_use]
    pub const fn new(months: i32, days: i32, micros: i64) -> Self {
        Self {
            months,
            days,
            micros,
        }
    }
}

/// A 128-bit signed integer split into two 64-bit halves.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct HugeInt {
    /// Low 64 bits, unsigned.
    pub lower: u64,
    /// High 64 bits, signed.
    pub upper: i64,
}

impl HugeInt {
    /// Reassemble the value.
    #[must_use]
    pub fn to_i128(self) -> i128 {
        (i128::from(self.upper) << 64) | i128::from(self.lower)
    }
}

impl From<i128> for HugeInt {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn from(value: i128) -> Self {
        Self {
            lower: value as u64,
            upper: (value >> 64) as i64,
        }
    }
}

impl From<HugeInt> for i128 {
    fn from(value: HugeInt) -> Self {
        value.to_i128()
    }
}

/// An owned value in the engine's physical representation.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// SQL `NULL`.
    Null,
    /// `BOOLEAN`
    Boolean(bool),
    /// `TINYINT`
    TinyInt(i8),
    /// `SMALLINT`
    SmallInt(i16),
    /// `INTEGER`
    Integer(i32),
    /// `BIGINT`
    BigInt(i64),
    /// `UTINYINT`
    UTinyInt(u8),
    /// `USMALLINT`
    USmallInt(u16),
    /// `UINTEGER`
    UInteger(u32),
    /// `UBIGINT`
    UBigInt(u64),
    /// `FLOAT`
    Float(f32),
    /// `DOUBLE`
    Double(f64),
    /// `TIMESTAMP`, microseconds since the epoch.
    Timestamp(i64),
    /// `TIMESTAMP_S`, seconds since the epoch.
    TimestampS(i64),
    /// `TIMESTAMP_NS`, nanoseconds since the epoch.
    TimestampNs(i64),
    /// `TIMESTAMP_MS`, milliseconds since the epoch.
    TimestampMs(i64),
    /// `DATE`, days since the epoch.
    Date(i32),
    /// `TIME`, microseconds since midnight.
    Time(i64),
    /// `INTERVAL`
    Interval(Interval),
    /// `HUGEINT`
    HugeInt(i128),
    /// `VARCHAR`
    Varchar(String),
    /// `BLOB`
    Blob(Vec<u8>),
}

/// A borrowed view of a stored value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ValueRef<'a> {
    /// SQL `NULL`.
    Null,
    /// `BOOLEAN`
    Boolean(bool),
    /// `TINYINT`
    TinyInt(i8),
    /// `SMALLINT`
    SmallInt(i16),
    /// `INTEGER`
    Integer(i32),
    /// `BIGINT`
    BigInt(i64),
    /// `UTINYINT`
    UTinyInt(u8),
    /// `USMALLINT`
    USmallInt(u16),
    /// `UINTEGER`
    UInteger(u32),
    /// `UBIGINT`
    UBigInt(u64),
    /// `FLOAT`
    Float(f32),
    /// `DOUBLE`
    Double(f64),
    /// `TIMESTAMP`, microseconds since the epoch.
    Timestamp(i64),
    /// `TIMESTAMP_S`, seconds since the epoch.
    TimestampS(i64),
    /// `TIMESTAMP_NS`, nanoseconds since the epoch.
    TimestampNs(i64),
    /// `TIMESTAMP_MS`, milliseconds since the epoch.
    TimestampMs(i64),
    /// `DATE`, days since the epoch.
    Date(i32),
    /// `TIME`, microseconds since midnight.
    Time(i64),
    /// `INTERVAL`
    Interval(Interval),
    /// `HUGEINT`
    HugeInt(i128),
    /// `VARCHAR`
    Varchar(&'a str),
    /// `BLOB`
    Blob(&'a [u8]),
}

impl Value {
    /// Borrow this value.
    #[must_use]
    pub fn as_value_ref(&self) -> ValueRef<'_> {
        match self {
            Self::Null => ValueRef::Null,
            Self::Boolean(v) => ValueRef::Boolean(*v),
            Self::TinyInt(v) => ValueRef::TinyInt(*v),
            Self::SmallInt(v) => ValueRef::SmallInt(*v),
            Self::Integer(v) => ValueRef::Integer(*v),
            Self::BigInt(v) => ValueRef::BigInt(*v),
            Self::UTinyInt(v) => ValueRef::UTinyInt(*v),
            Self::USmallInt(v) => ValueRef::USmallInt(*v),
            Self::UInteger(v) => ValueRef::UInteger(*v),
            Self::UBigInt(v) => ValueRef::UBigInt(*v),
            Self::Float(v) => ValueRef::Float(*v),
            Self::Double(v) => ValueRef::Double(*v),
            Self::Timestamp(v) => ValueRef::Timestamp(*v),
            Self::TimestampS(v) => ValueRef::TimestampS(*v),
            Self::TimestampNs(v) => ValueRef::TimestampNs(*v),
            Self::TimestampMs(v) => ValueRef::TimestampMs(*v),
            Self::Date(v) => ValueRef::Date(*v),
            Self::Time(v) => ValueRef::Time(*v),
            Self::Interval(v) => ValueRef::Interval(*v),
            Self::HugeInt(v) => ValueRef::HugeInt(*v),
            Self::Varchar(v) => ValueRef::Varchar(v),
            Self::Blob(v) => ValueRef::Blob(v),
        }
    }

    /// Type tag of this value; `Invalid` for `NULL`.
    #[must_use]
    pub fn scalar_type(&self) -> ScalarType {
        self.as_value_ref().scalar_type()
    }

    /// Whether this is SQL `NULL`.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl ValueRef<'_> {
    /// Copy into an owned value.
    #[must_use]
    pub fn to_value(self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Boolean(v) => Value::Boolean(v),
            Self::TinyInt(v) => Value::TinyInt(v),
            Self::SmallInt(v) => Value::SmallInt(v),
            Self::Integer(v) => Value::Integer(v),
            Self::BigInt(v) => Value::BigInt(v),
            Self::UTinyInt(v) => Value::UTinyInt(v),
            Self::USmallInt(v) => Value::USmallInt(v),
            Self::UInteger(v) => Value::UInteger(v),
            Self::UBigInt(v) => Value::UBigInt(v),
            Self::Float(v) => Value::Float(v),
            Self::Double(v) => Value::Double(v),
            Self::Timestamp(v) => Value::Timestamp(v),
            Self::TimestampS(v) => Value::TimestampS(v),
            Self::TimestampNs(v) => Value::TimestampNs(v),
            Self::TimestampMs(v) => Value::TimestampMs(v),
            Self::Date(v) => Value::Date(v),
            Self::Time(v) => Value::Time(v),
            Self::Interval(v) => Value::Interval(v),
            Self::HugeInt(v) => Value::HugeInt(v),
            Self::Varchar(v) => Value::Varchar(v.to_owned()),
            Self::Blob(v) => Value::Blob(v.to_vec()),
        }
    }

    /// Type tag of this value; `Invalid` for `NULL`.
    #[must_use]
    pub fn scalar_type(self) -> ScalarType {
        match self {
            Self::Null => ScalarType::Invalid,
            Self::Boolean(_) => ScalarType::Boolean,
            Self::TinyInt(_) => ScalarType::TinyInt,
            Self::SmallInt(_) => ScalarType::SmallInt,
            Self::Integer(_) => ScalarType::Integer,
            Self::BigInt(_) => ScalarType::BigInt,
            Self::UTinyInt(_) => ScalarType::UTinyInt,
            Self::USmallInt(_) => ScalarType::USmallInt,
            Self::UInteger(_) => ScalarType::UInteger,
            Self::UBigInt(_) => ScalarType::UBigInt,
            Self::Float(_) => ScalarType::Float,
            Self::Double(_) => ScalarType::Double,
            Self::Timestamp(_) => ScalarType::Timestamp,
            Self::TimestampS(_) => ScalarType::TimestampS,
            Self::TimestampNs(_) => ScalarType::TimestampNs,
            Self::TimestampMs(_) => ScalarType::TimestampMs,
            Self::Date(_) => ScalarType::Date,
            Self::Time(_) => ScalarType::Time,
            Self::Interval(_) => ScalarType::Interval,
            Self::HugeInt(_) => ScalarType::HugeInt,
            Self::Varchar(_) => ScalarType::Varchar,
            Self::Blob(_) => ScalarType::Blob,
        }
    }

    /// Whether this is SQL `NULL`.
    #[must_use]
    pub fn is_null(self) -> bool {
        matches!(self, Self::Null)
    }
}

macro_rules! impl_from_primitive {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Self::$variant(v.into())
                }
            }
        )*
    };
}

impl_from_primitive! {
    bool => Boolean,
    i8 => TinyInt,
    i16 => SmallInt,
    i32 => Integer,
    i64 => BigInt,
    u8 => UTinyInt,
    u16 => USmallInt,
    u32 => UInteger,
    u64 => UBigInt,
    f32 => Float,
    f64 => Double,
    i128 => HugeInt,
    HugeInt => HugeInt,
    Interval => Interval,
    String => Varchar,
    &str => Varchar,
    Vec<u8> => Blob,
    &[u8] => Blob,
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_discriminants_are_stable() {
        assert_eq!(ScalarType::Invalid as i32, 0);
        assert_eq!(ScalarType::Boolean as i32, 1);
        assert_eq!(ScalarType::Double as i32, 11);
        assert_eq!(ScalarType::Timestamp as i32, 12);
        assert_eq!(ScalarType::Date as i32, 16);
        assert_eq!(ScalarType::HugeInt as i32, 19);
        assert_eq!(ScalarType::Blob as i32, 21);
    }

    #[test]
    fn test_arrow_mapping_is_closed_over_canonical_types() {
        for tag in [
            ScalarType::Boolean,
            ScalarType::TinyInt,
            ScalarType::UBigInt,
            ScalarType::Float,
            ScalarType::Timestamp,
            ScalarType::TimestampS,
            ScalarType::TimestampNs,
            ScalarType::TimestampMs,
            ScalarType::Date,
            ScalarType::Time,
            ScalarType::Interval,
            ScalarType::HugeInt,
            ScalarType::Varchar,
            ScalarType::Blob,
        ] {
            let arrow = tag.arrow_type().unwrap();
            assert_eq!(ScalarType::from_arrow(&arrow), tag, "{tag}");
        }
        assert!(ScalarType::Invalid.arrow_type().is_none());
    }

    #[test]
    fn test_arrow_normalization() {
        assert_eq!(ScalarType::from_arrow(&DataType::Utf8View), ScalarType::Varchar);
        assert_eq!(ScalarType::from_arrow(&DataType::LargeBinary), ScalarType::Blob);
        assert_eq!(ScalarType::from_arrow(&DataType::Decimal128(10, 2)), ScalarType::Double);
        assert_eq!(ScalarType::from_arrow(&DataType::Decimal128(20, 0)), ScalarType::HugeInt);
        assert_eq!(ScalarType::from_arrow(&DataType::Null), ScalarType::Integer);
        let list = DataType::new_list(DataType::Int32, true);
        assert_eq!(ScalarType::from_arrow(&list), ScalarType::Varchar);
    }

    #[test]
    fn test_date_from_days() {
        assert_eq!(Date::from_days(0), Some(Date::new(1970, 1, 1)));
        assert_eq!(Date::from_days(-1), Some(Date::new(1969, 12, 31)));
        assert_eq!(Date::new(2000, 2, 29).to_days(), Some(11_016));
        assert_eq!(Date::new(2001, 2, 29).to_days(), None);
        assert_eq!(Date::from_days(i32::MAX), None);
    }

    #[test]
    fn test_time_micros() {
        let t = Time::new(13, 45, 30, 250);
        assert_eq!(Time::from_micros(t.to_micros()), t);
        assert_eq!(Time::from_micros(-1), Time::new(23, 59, 59, 999_999));
    }

    #[test]
    fn test_timestamp_micros() {
        let ts = Timestamp::from_micros(-1).unwrap();
        assert_eq!(ts.date, Date::new(1969, 12, 31));
        assert_eq!(ts.time, Time::new(23, 59, 59, 999_999));
        assert_eq!(ts.to_micros(), Some(-1));

        let bad = Timestamp::new(Date::new(2020, 1, 1), Time::new(25, 0, 0, 0));
        assert_eq!(bad.to_micros(), None);
    }

    #[test]
    fn test_hugeint_halves() {
        for v in [0_i128, 1, -1, i128::MAX, i128::MIN, 1 << 64, -(1 << 70) + 3] {
            assert_eq!(HugeInt::from(v).to_i128(), v);
        }
        let h = HugeInt::from(-1_i128);
        assert_eq!(h.lower, u64::MAX);
        assert_eq!(h.upper, -1);
    }

    #[test]
    fn test_value_ref_round_trip() {
        let owned = Value::from("hello");
        assert_eq!(owned.as_value_ref(), ValueRef::Varchar("hello"));
        assert_eq!(owned.as_value_ref().to_value(), owned);
        assert_eq!(Value::from(None::<i32>), Value::Null);
        assert_eq!(Value::from(7_u16).scalar_type(), ScalarType::USmallInt);
    }
}
