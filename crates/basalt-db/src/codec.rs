//! Value Codec: best-effort conversion from stored values to host scalars.
//!
//! Conversions never fail loudly. A `NULL` source or a value that does not
//! fit the requested type yields the type's failure value (`false`, `0`,
//! `0.0`, a zeroed struct, or no buffer). Callers that must tell `NULL`
//! apart from zero check the column's validity instead.

use std::borrow::Cow;
use std::fmt::Write as _;

use arrow::datatypes::{DataType, IntervalMonthDayNano};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use datafusion_common::{DataFusionError, ScalarValue};

use crate::types::{Date, HugeInt, Interval, Time, Timestamp, Value, ValueRef, MICROS_PER_DAY};

/// A host scalar that can be produced from a stored value.
pub trait FromValue: Sized {
    /// Returned when the source is `NULL` or not representable.
    const FAILURE: Self;

    /// Convert, or `None` when the value is `NULL` or not representable.
    fn from_value(value: ValueRef<'_>) -> Option<Self>;
}

/// Convert `value`, falling back to `T::FAILURE`.
#[must_use]
pub fn fetch<T: FromValue>(value: ValueRef<'_>) -> T {
    T::from_value(value).unwrap_or(T::FAILURE)
}

fn to_i128(value: ValueRef<'_>) -> Option<i128> {
    match value {
        ValueRef::Boolean(b) => Some(i128::from(b)),
        ValueRef::TinyInt(v) => Some(v.into()),
        ValueRef::SmallInt(v) => Some(v.into()),
        ValueRef::Integer(v) => Some(v.into()),
        ValueRef::BigInt(v) => Some(v.into()),
        ValueRef::UTinyInt(v) => Some(v.into()),
        ValueRef::USmallInt(v) => Some(v.into()),
        ValueRef::UInteger(v) => Some(v.into()),
        ValueRef::UBigInt(v) => Some(v.into()),
        ValueRef::HugeInt(v) => Some(v),
        ValueRef::Float(v) => float_to_i128(f64::from(v)),
        ValueRef::Double(v) => float_to_i128(v),
        ValueRef::Varchar(s) => {
            let s = s.trim();
            s.parse::<i128>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(float_to_i128))
        }
        _ => None,
    }
}

#[allow(clippy::cast_possible_truncation)]
fn float_to_i128(v: f64) -> Option<i128> {
    // Bounds of i128 expressed as f64; the upper bound itself is excluded.
    const LIMIT: f64 = 170_141_183_460_469_231_731_687_303_715_884_105_728.0;
    let rounded = v.round();
    (rounded.is_finite() && rounded >= -LIMIT && rounded < LIMIT).then_some(rounded as i128)
}

#[allow(clippy::cast_precision_loss)]
fn to_f64(value: ValueRef<'_>) -> Option<f64> {
    match value {
        ValueRef::Float(v) => Some(f64::from(v)),
        ValueRef::Double(v) => Some(v),
        ValueRef::HugeInt(v) => Some(v as f64),
        ValueRef::UBigInt(v) => Some(v as f64),
        ValueRef::BigInt(v) => Some(v as f64),
        ValueRef::Varchar(s) => s.trim().parse().ok(),
        other => to_i128(other).map(|v| v as f64),
    }
}

macro_rules! impl_from_value_int {
    ($($ty:ty),*) => {
        $(
            impl FromValue for $ty {
                const FAILURE: Self = 0;

                fn from_value(value: ValueRef<'_>) -> Option<Self> {
                    to_i128(value).and_then(|v| <$ty>::try_from(v).ok())
                }
            }
        )*
    };
}

impl_from_value_int!(i8, i16, i32, i64, u8, u16, u32, u64);

impl FromValue for bool {
    const FAILURE: Self = false;

    fn from_value(value: ValueRef<'_>) -> Option<Self> {
        match value {
            ValueRef::Boolean(b) => Some(b),
            ValueRef::Float(v) => Some(v != 0.0),
            ValueRef::Double(v) => Some(v != 0.0),
            ValueRef::Varchar(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "t" | "1" => Some(true),
                "false" | "f" | "0" => Some(false),
                _ => None,
            },
            other => to_i128(other).map(|v| v != 0),
        }
    }
}

impl FromValue for f64 {
    const FAILURE: Self = 0.0;

    fn from_value(value: ValueRef<'_>) -> Option<Self> {
        to_f64(value)
    }
}

impl FromValue for f32 {
    const FAILURE: Self = 0.0;

    #[allow(clippy::cast_possible_truncation)]
    fn from_value(value: ValueRef<'_>) -> Option<Self> {
        if let ValueRef::Float(v) = value {
            return Some(v);
        }
        let v = to_f64(value)?;
        let narrowed = v as f32;
        // A finite double that overflows f32 is not representable.
        (narrowed.is_finite() || !v.is_finite()).then_some(narrowed)
    }
}

impl FromValue for HugeInt {
    const FAILURE: Self = HugeInt { lower: 0, upper: 0 };

    fn from_value(value: ValueRef<'_>) -> Option<Self> {
        to_i128(value).map(HugeInt::from)
    }
}

/// Any timestamp resolution as a naive UTC date-time.
fn to_naive_datetime(value: ValueRef<'_>) -> Option<NaiveDateTime> {
    let dt = match value {
        ValueRef::TimestampS(s) => DateTime::from_timestamp(s, 0)?,
        ValueRef::TimestampMs(ms) => DateTime::from_timestamp_millis(ms)?,
        ValueRef::Timestamp(us) => DateTime::from_timestamp_micros(us)?,
        ValueRef::TimestampNs(ns) => DateTime::from_timestamp_nanos(ns),
        ValueRef::Date(days) => return Date::from_days(days)?.to_naive()?.and_hms_opt(0, 0, 0),
        ValueRef::Varchar(s) => return parse_datetime(s.trim()),
        _ => return None,
    };
    Some(dt.naive_utc())
}

fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()?
        .and_hms_opt(0, 0, 0)
}

#[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
fn time_from_naive(t: NaiveTime) -> Time {
    Time::new(
        t.hour() as i8,
        t.minute() as i8,
        t.second() as i8,
        // Leap seconds report nanos >= 1e9; clamp into the last microsecond.
        (t.nanosecond() / 1_000).min(999_999) as i32,
    )
}

impl FromValue for Date {
    const FAILURE: Self = Date::new(0, 0, 0);

    fn from_value(value: ValueRef<'_>) -> Option<Self> {
        match value {
            ValueRef::Date(days) => Date::from_days(days),
            ValueRef::Varchar(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
                .ok()
                .map(Date::from_naive),
            other => to_naive_datetime(other).map(|dt| Date::from_naive(dt.date())),
        }
    }
}

impl FromValue for Time {
    const FAILURE: Self = Time::new(0, 0, 0, 0);

    fn from_value(value: ValueRef<'_>) -> Option<Self> {
        match value {
            ValueRef::Time(us) => Some(Time::from_micros(us)),
            ValueRef::Varchar(s) => {
                let s = s.trim();
                NaiveTime::parse_from_str(s, "%H:%M:%S%.f")
                    .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
                    .ok()
                    .map(time_from_naive)
            }
            ValueRef::Date(_) => None,
            other => to_naive_datetime(other).map(|dt| time_from_naive(dt.time())),
        }
    }
}

impl FromValue for Timestamp {
    const FAILURE: Self = Timestamp::new(Date::new(0, 0, 0), Time::new(0, 0, 0, 0));

    fn from_value(value: ValueRef<'_>) -> Option<Self> {
        if let ValueRef::Timestamp(us) = value {
            return Timestamp::from_micros(us);
        }
        let dt = to_naive_datetime(value)?;
        Some(Timestamp::new(
            Date::from_naive(dt.date()),
            time_from_naive(dt.time()),
        ))
    }
}

impl FromValue for Interval {
    const FAILURE: Self = Interval::new(0, 0, 0);

    fn from_value(value: ValueRef<'_>) -> Option<Self> {
        match value {
            ValueRef::Interval(iv) => Some(iv),
            _ => None,
        }
    }
}

/// Render any value as text; `None` for `NULL`.
#[must_use]
pub fn to_text(value: ValueRef<'_>) -> Option<Cow<'_, str>> {
    let text = match value {
        ValueRef::Null => return None,
        ValueRef::Varchar(s) => return Some(Cow::Borrowed(s)),
        ValueRef::Boolean(b) => b.to_string(),
        ValueRef::TinyInt(v) => v.to_string(),
        ValueRef::SmallInt(v) => v.to_string(),
        ValueRef::Integer(v) => v.to_string(),
        ValueRef::BigInt(v) => v.to_string(),
        ValueRef::UTinyInt(v) => v.to_string(),
        ValueRef::USmallInt(v) => v.to_string(),
        ValueRef::UInteger(v) => v.to_string(),
        ValueRef::UBigInt(v) => v.to_string(),
        ValueRef::HugeInt(v) => v.to_string(),
        ValueRef::Float(v) => v.to_string(),
        ValueRef::Double(v) => v.to_string(),
        ValueRef::Date(days) => Date::from_days(days)?
            .to_naive()?
            .format("%Y-%m-%d")
            .to_string(),
        ValueRef::Time(us) => {
            let us = us.rem_euclid(MICROS_PER_DAY);
            let secs = u32::try_from(us / 1_000_000).ok()?;
            let nanos = u32::try_from(us % 1_000_000).ok()? * 1_000;
            format_time(NaiveTime::from_num_seconds_from_midnight_opt(secs, nanos)?)
        }
        ValueRef::Timestamp(_)
        | ValueRef::TimestampS(_)
        | ValueRef::TimestampMs(_)
        | ValueRef::TimestampNs(_) => {
            let dt = to_naive_datetime(value)?;
            format!("{} {}", dt.date().format("%Y-%m-%d"), format_time(dt.time()))
        }
        ValueRef::Interval(iv) => format_interval(iv),
        ValueRef::Blob(bytes) => format_blob(bytes),
    };
    Some(Cow::Owned(text))
}

/// Raw bytes of a `BLOB` or `VARCHAR`; `None` otherwise.
#[must_use]
pub fn to_blob(value: ValueRef<'_>) -> Option<&[u8]> {
    match value {
        ValueRef::Blob(bytes) => Some(bytes),
        ValueRef::Varchar(s) => Some(s.as_bytes()),
        _ => None,
    }
}

fn push_fraction(out: &mut String, nanos: u32) {
    if nanos == 0 {
        return;
    }
    let digits = format!("{:09}", nanos.min(999_999_999));
    out.push('.');
    out.push_str(digits.trim_end_matches('0'));
}

fn format_time(t: NaiveTime) -> String {
    let mut out = t.format("%H:%M:%S").to_string();
    push_fraction(&mut out, t.nanosecond());
    out
}

fn plural(out: &mut Vec<String>, n: i32, unit: &str) {
    if n != 0 {
        let s = if n.unsigned_abs() == 1 { "" } else { "s" };
        out.push(format!("{n} {unit}{s}"));
    }
}

fn format_interval(iv: Interval) -> String {
    let mut parts = Vec::new();
    plural(&mut parts, iv.months / 12, "year");
    plural(&mut parts, iv.months % 12, "month");
    plural(&mut parts, iv.days, "day");
    if iv.micros != 0 || parts.is_empty() {
        let sign = if iv.micros < 0 { "-" } else { "" };
        let us = iv.micros.unsigned_abs();
        let secs = us / 1_000_000;
        let mut time = format!(
            "{sign}{:02}:{:02}:{:02}",
            secs / 3600,
            secs / 60 % 60,
            secs % 60
        );
        // us % 1e6 * 1000 < 1e9 always fits.
        push_fraction(&mut time, u32::try_from(us % 1_000_000 * 1_000).unwrap_or(0));
        parts.push(time);
    }
    parts.join(" ")
}

fn format_blob(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    for &b in bytes {
        if (b.is_ascii_graphic() || b == b' ') && b != b'\\' && b != b'\'' {
            out.push(char::from(b));
        } else {
            let _ = write!(out, "\\x{b:02X}");
        }
    }
    out
}

/// Convert a host value to the engine's scalar representation.
#[must_use]
pub(crate) fn to_scalar(value: &Value) -> ScalarValue {
    match value {
        Value::Null => ScalarValue::Null,
        Value::Boolean(v) => ScalarValue::Boolean(Some(*v)),
        Value::TinyInt(v) => ScalarValue::Int8(Some(*v)),
        Value::SmallInt(v) => ScalarValue::Int16(Some(*v)),
        Value::Integer(v) => ScalarValue::Int32(Some(*v)),
        Value::BigInt(v) => ScalarValue::Int64(Some(*v)),
        Value::UTinyInt(v) => ScalarValue::UInt8(Some(*v)),
        Value::USmallInt(v) => ScalarValue::UInt16(Some(*v)),
        Value::UInteger(v) => ScalarValue::UInt32(Some(*v)),
        Value::UBigInt(v) => ScalarValue::UInt64(Some(*v)),
        Value::Float(v) => ScalarValue::Float32(Some(*v)),
        Value::Double(v) => ScalarValue::Float64(Some(*v)),
        Value::Timestamp(v) => ScalarValue::TimestampMicrosecond(Some(*v), None),
        Value::TimestampS(v) => ScalarValue::TimestampSecond(Some(*v), None),
        Value::TimestampMs(v) => ScalarValue::TimestampMillisecond(Some(*v), None),
        Value::TimestampNs(v) => ScalarValue::TimestampNanosecond(Some(*v), None),
        Value::Date(v) => ScalarValue::Date32(Some(*v)),
        Value::Time(v) => ScalarValue::Time64Microsecond(Some(*v)),
        Value::Interval(iv) => ScalarValue::IntervalMonthDayNano(Some(IntervalMonthDayNano::new(
            iv.months,
            iv.days,
            iv.micros.saturating_mul(1_000),
        ))),
        Value::HugeInt(v) => ScalarValue::Decimal128(Some(*v), 38, 0),
        Value::Varchar(v) => ScalarValue::Utf8(Some(v.clone())),
        Value::Blob(v) => ScalarValue::Binary(Some(v.clone())),
    }
}

/// Convert a host value to an engine scalar of exactly `target` type.
///
/// `NULL` becomes a typed null. Conversions follow the engine's strict
/// cast rules, so `'abc'` into an integer column is an error.
pub(crate) fn cast_scalar(value: &Value, target: &DataType) -> Result<ScalarValue, DataFusionError> {
    let scalar = to_scalar(value);
    if scalar.is_null() {
        ScalarValue::try_from(target)
    } else if scalar.data_type() == *target {
        Ok(scalar)
    } else {
        scalar.cast_to(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_yields_failure_values() {
        assert!(!fetch::<bool>(ValueRef::Null));
        assert_eq!(fetch::<i32>(ValueRef::Null), 0);
        assert_eq!(fetch::<u64>(ValueRef::Null), 0);
        assert!(fetch::<f64>(ValueRef::Null).abs() < f64::EPSILON);
        assert_eq!(fetch::<Date>(ValueRef::Null), Date::default());
        assert_eq!(fetch::<Timestamp>(ValueRef::Null), Timestamp::default());
        assert_eq!(fetch::<HugeInt>(ValueRef::Null), HugeInt::default());
        assert!(to_text(ValueRef::Null).is_none());
        assert!(to_blob(ValueRef::Null).is_none());
    }

    #[test]
    fn test_integer_narrowing() {
        assert_eq!(fetch::<i8>(ValueRef::Integer(127)), 127);
        assert_eq!(fetch::<i8>(ValueRef::Integer(128)), 0);
        assert_eq!(fetch::<u32>(ValueRef::BigInt(-1)), 0);
        assert_eq!(fetch::<u64>(ValueRef::HugeInt(i128::from(u64::MAX))), u64::MAX);
        assert_eq!(fetch::<i64>(ValueRef::Double(2.5)), 3);
        assert_eq!(fetch::<i64>(ValueRef::Double(f64::NAN)), 0);
        assert_eq!(fetch::<i32>(ValueRef::Varchar(" 42 ")), 42);
        assert_eq!(fetch::<i32>(ValueRef::Varchar("4.4")), 4);
        assert_eq!(fetch::<i32>(ValueRef::Varchar("x")), 0);
        assert_eq!(fetch::<i32>(ValueRef::Boolean(true)), 1);
        assert_eq!(fetch::<i32>(ValueRef::Date(3)), 0);
    }

    #[test]
    fn test_float_conversions() {
        assert!((fetch::<f64>(ValueRef::Integer(3)) - 3.0).abs() < f64::EPSILON);
        assert!((fetch::<f32>(ValueRef::Double(1.5)) - 1.5).abs() < f32::EPSILON);
        assert!(fetch::<f32>(ValueRef::Double(1e300)).abs() < f32::EPSILON);
        assert!(fetch::<f32>(ValueRef::Double(f64::INFINITY)).is_infinite());
    }

    #[test]
    fn test_bool_conversions() {
        assert!(fetch::<bool>(ValueRef::Integer(5)));
        assert!(!fetch::<bool>(ValueRef::Integer(0)));
        assert!(fetch::<bool>(ValueRef::Varchar("TRUE")));
        assert!(!fetch::<bool>(ValueRef::Varchar("maybe")));
    }

    #[test]
    fn test_temporal_conversions() {
        let ts = ValueRef::Timestamp(86_400 * 1_000_000 + 3_600 * 1_000_000 + 5);
        assert_eq!(fetch::<Date>(ts), Date::new(1970, 1, 2));
        assert_eq!(fetch::<Time>(ts), Time::new(1, 0, 0, 5));
        assert_eq!(
            fetch::<Timestamp>(ValueRef::Date(1)),
            Timestamp::new(Date::new(1970, 1, 2), Time::default())
        );
        assert_eq!(
            fetch::<Timestamp>(ValueRef::TimestampS(1)),
            Timestamp::new(Date::new(1970, 1, 1), Time::new(0, 0, 1, 0))
        );
        assert_eq!(
            fetch::<Date>(ValueRef::Varchar("2024-02-29")),
            Date::new(2024, 2, 29)
        );
        assert_eq!(
            fetch::<Time>(ValueRef::Varchar("10:11:12.5")),
            Time::new(10, 11, 12, 500_000)
        );
        assert_eq!(fetch::<Time>(ValueRef::Date(10)), Time::default());
        assert_eq!(fetch::<Interval>(ValueRef::Integer(1)), Interval::default());
    }

    #[test]
    fn test_text_rendering() {
        assert_eq!(to_text(ValueRef::Integer(-7)).unwrap(), "-7");
        assert_eq!(to_text(ValueRef::Boolean(true)).unwrap(), "true");
        assert_eq!(to_text(ValueRef::Date(0)).unwrap(), "1970-01-01");
        assert_eq!(to_text(ValueRef::Time(1_500_000)).unwrap(), "00:00:01.5");
        assert_eq!(
            to_text(ValueRef::TimestampNs(1_000_000_001)).unwrap(),
            "1970-01-01 00:00:01.000000001"
        );
        assert_eq!(
            to_text(ValueRef::Interval(Interval::new(14, 3, 4 * 3_600_000_000 + 5)))
                .unwrap(),
            "1 year 2 months 3 days 04:00:00.000005"
        );
        assert_eq!(to_text(ValueRef::Interval(Interval::default())).unwrap(), "00:00:00");
        assert_eq!(to_text(ValueRef::Blob(b"a\x00\\")).unwrap(), "a\\x00\\x5C");
        assert!(matches!(to_text(ValueRef::Varchar("x")), Some(Cow::Borrowed("x"))));
    }

    #[test]
    fn test_cast_scalar() {
        let v = cast_scalar(&Value::Integer(5), &DataType::Int64).unwrap();
        assert_eq!(v, ScalarValue::Int64(Some(5)));

        let v = cast_scalar(&Value::Null, &DataType::Utf8).unwrap();
        assert_eq!(v, ScalarValue::Utf8(None));

        assert!(cast_scalar(&Value::Varchar("abc".into()), &DataType::Int32).is_err());
    }
}
