//! FFI query result functions.
//!
//! Value accessors never fail: a null handle, an out-of-range cell, a NULL
//! cell or an unrepresentable conversion yields the type's zero value.
//! Use `basalt_value_is_null` to tell NULL apart from zero.

use std::ffi::{c_char, c_void, CString};
use std::ptr;

use super::error::{to_cstring, ErrorSlot};
use super::{index, take_handle};
use crate::api::{ApiError, QueryResult};
use crate::codec::FromValue;
use crate::types::{Date, HugeInt, Interval, ScalarType, Time, Timestamp};

/// Opaque materialized result handle.
///
/// Produced by `basalt_query()` and `basalt_execute_prepared()`, freed with
/// `basalt_destroy_result()`.
pub struct BasaltResult {
    inner: Option<QueryResult>,
    names: Vec<CString>,
    error: ErrorSlot,
}

impl BasaltResult {
    pub(crate) fn new(outcome: Result<QueryResult, ApiError>) -> Self {
        match outcome {
            Ok(result) => Self {
                names: result
                    .columns()
                    .iter()
                    .map(|c| to_cstring(c.name()))
                    .collect(),
                inner: Some(result),
                error: ErrorSlot::default(),
            },
            Err(e) => Self {
                inner: None,
                names: Vec::new(),
                error: ErrorSlot::with_error(&e),
            },
        }
    }
}

/// Bytes returned by `basalt_value_blob`; release `data` with `basalt_free`.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct BasaltBlob {
    /// Start of the buffer, or null.
    pub data: *mut c_void,
    /// Length in bytes.
    pub size: u64,
}

pub(crate) fn to_u64(n: usize) -> u64 {
    u64::try_from(n).unwrap_or(u64::MAX)
}

/// Borrow the materialized result behind a handle.
///
/// # Safety
///
/// `result` must be null or a valid result handle.
unsafe fn materialized<'a>(result: *const BasaltResult) -> Option<&'a QueryResult> {
    if result.is_null() {
        return None;
    }
    // SAFETY: result is non-null and valid, per the caller
    unsafe { (*result).inner.as_ref() }
}

/// # Safety
///
/// `result` must be null or a valid result handle.
unsafe fn fetch<T: FromValue>(result: *const BasaltResult, col: u64, row: u64) -> T {
    // SAFETY: forwarded from the caller
    unsafe { materialized(result) }.map_or(T::FAILURE, |r| r.fetch(index(col), index(row)))
}

/// Destroy a result and null the handle. Null is a no-op.
///
/// # Safety
///
/// `result` must be null or point to null or a valid result handle.
#[no_mangle]
pub unsafe extern "C" fn basalt_destroy_result(result: *mut *mut BasaltResult) {
    // SAFETY: forwarded from the caller
    drop(unsafe { take_handle(result) });
}

/// Error message of a failed query, or null if it succeeded.
///
/// The string is owned by the result.
///
/// # Safety
///
/// `result` must be null or a valid result handle.
#[no_mangle]
pub unsafe extern "C" fn basalt_result_error(result: *const BasaltResult) -> *const c_char {
    if result.is_null() {
        return ptr::null();
    }
    // SAFETY: result is non-null (checked above)
    unsafe { (*result).error.as_ptr() }
}

/// Error code of a failed query (see `basalt_result_error`), or 0.
///
/// # Safety
///
/// `result` must be null or a valid result handle.
#[no_mangle]
pub unsafe extern "C" fn basalt_result_error_code(result: *const BasaltResult) -> i32 {
    if result.is_null() {
        return 0;
    }
    // SAFETY: result is non-null (checked above)
    unsafe { (*result).error.code() }
}

/// Number of columns; 0 for a failed query.
///
/// # Safety
///
/// `result` must be null or a valid result handle.
#[no_mangle]
pub unsafe extern "C" fn basalt_column_count(result: *const BasaltResult) -> u64 {
    // SAFETY: forwarded from the caller
    unsafe { materialized(result) }.map_or(0, |r| to_u64(r.column_count()))
}

/// Number of rows; 0 for a failed query.
///
/// # Safety
///
/// `result` must be null or a valid result handle.
#[no_mangle]
pub unsafe extern "C" fn basalt_row_count(result: *const BasaltResult) -> u64 {
    // SAFETY: forwarded from the caller
    unsafe { materialized(result) }.map_or(0, |r| to_u64(r.row_count()))
}

/// Rows changed by an `INSERT`/`UPDATE`/`DELETE`; 0 otherwise.
///
/// # Safety
///
/// `result` must be null or a valid result handle.
#[no_mangle]
pub unsafe extern "C" fn basalt_rows_changed(result: *const BasaltResult) -> u64 {
    // SAFETY: forwarded from the caller
    unsafe { materialized(result) }.map_or(0, QueryResult::rows_changed)
}

/// Column name, valid until the result is destroyed; null if out of range.
///
/// # Safety
///
/// `result` must be null or a valid result handle.
#[no_mangle]
pub unsafe extern "C" fn basalt_column_name(result: *const BasaltResult, col: u64) -> *const c_char {
    if result.is_null() {
        return ptr::null();
    }
    // SAFETY: result is non-null (checked above)
    let names = unsafe { &(*result).names };
    names.get(index(col)).map_or(ptr::null(), |n| n.as_ptr())
}

/// Column type; `Invalid` if out of range.
///
/// # Safety
///
/// `result` must be null or a valid result handle.
#[no_mangle]
pub unsafe extern "C" fn basalt_column_type(result: *const BasaltResult, col: u64) -> ScalarType {
    // SAFETY: forwarded from the caller
    unsafe { materialized(result) }.map_or(ScalarType::Invalid, |r| r.column_type(index(col)))
}

/// Whether a cell is NULL. Out-of-range cells read as NULL.
///
/// # Safety
///
/// `result` must be null or a valid result handle.
#[no_mangle]
pub unsafe extern "C" fn basalt_value_is_null(result: *const BasaltResult, col: u64, row: u64) -> bool {
    // SAFETY: forwarded from the caller
    unsafe { materialized(result) }.map_or(true, |r| r.is_null(index(col), index(row)))
}

macro_rules! value_accessors {
    ($($(#[$doc:meta])* $name:ident -> $ty:ty;)*) => {
        $(
            $(#[$doc])*
            ///
            /// # Safety
            ///
            /// `result` must be null or a valid result handle.
            #[no_mangle]
            pub unsafe extern "C" fn $name(result: *const BasaltResult, col: u64, row: u64) -> $ty {
                // SAFETY: forwarded from the caller
                unsafe { fetch(result, col, row) }
            }
        )*
    };
}

value_accessors! {
    /// Cell as `bool`.
    basalt_value_boolean -> bool;
    /// Cell as `int8_t`.
    basalt_value_int8 -> i8;
    /// Cell as `int16_t`.
    basalt_value_int16 -> i16;
    /// Cell as `int32_t`.
    basalt_value_int32 -> i32;
    /// Cell as `int64_t`.
    basalt_value_int64 -> i64;
    /// Cell as `uint8_t`.
    basalt_value_uint8 -> u8;
    /// Cell as `uint16_t`.
    basalt_value_uint16 -> u16;
    /// Cell as `uint32_t`.
    basalt_value_uint32 -> u32;
    /// Cell as `uint64_t`.
    basalt_value_uint64 -> u64;
    /// Cell as `float`.
    basalt_value_float -> f32;
    /// Cell as `double`.
    basalt_value_double -> f64;
    /// Cell as a date.
    basalt_value_date -> Date;
    /// Cell as a time of day.
    basalt_value_time -> Time;
    /// Cell as a timestamp.
    basalt_value_timestamp -> Timestamp;
    /// Cell as an interval.
    basalt_value_interval -> Interval;
    /// Cell as a 128-bit integer.
    basalt_value_hugeint -> HugeInt;
}

/// Cell rendered as text; null for NULL cells.
///
/// Release the string with `basalt_free`.
///
/// # Safety
///
/// `result` must be null or a valid result handle.
#[no_mangle]
pub unsafe extern "C" fn basalt_value_varchar(result: *const BasaltResult, col: u64, row: u64) -> *mut c_char {
    // SAFETY: forwarded from the caller
    unsafe { materialized(result) }
        .and_then(|r| r.value_varchar(index(col), index(row)))
        .map_or(ptr::null_mut(), |s| s.into_raw())
}

/// Cell bytes; `{NULL, 0}` for NULL or non-binary cells.
///
/// Release `data` with `basalt_free`.
///
/// # Safety
///
/// `result` must be null or a valid result handle.
#[no_mangle]
pub unsafe extern "C" fn basalt_value_blob(result: *const BasaltResult, col: u64, row: u64) -> BasaltBlob {
    // SAFETY: forwarded from the caller
    unsafe { materialized(result) }
        .and_then(|r| r.value_blob(index(col), index(row)))
        .map_or(
            BasaltBlob {
                data: ptr::null_mut(),
                size: 0,
            },
            |b| {
                let (data, size) = b.into_raw();
                BasaltBlob {
                    data: data.cast(),
                    size: to_u64(size),
                }
            },
        )
}
