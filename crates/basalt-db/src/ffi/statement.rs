//! FFI prepared statement functions.
//!
//! Parameter slots are zero-based. A failed bind leaves every binding as
//! it was and records its message on the statement.

use std::ffi::{c_char, c_void};
use std::ptr;

use super::arrow_ffi::BasaltArrow;
use super::connection::BasaltConnection;
use super::error::{BasaltState, ErrorSlot};
use super::result::{to_u64, BasaltResult};
use super::{index, put_handle, str_arg, take_handle};
use crate::api::{ApiError, PreparedStatement};
use crate::types::{Date, HugeInt, Interval, Time, Timestamp};

/// Opaque prepared statement handle.
///
/// Create with `basalt_prepare()`, free with `basalt_destroy_prepare()`.
/// A statement that failed to prepare is still a handle; its error is
/// readable via `basalt_prepare_error()`.
pub struct BasaltPrepared {
    inner: Option<PreparedStatement>,
    error: ErrorSlot,
}

/// Run `f` against a prepared statement, recording any error on the handle.
///
/// # Safety
///
/// `prepared` must be null or a valid statement handle.
unsafe fn with_statement(
    prepared: *mut BasaltPrepared,
    f: impl FnOnce(&mut PreparedStatement) -> Result<(), ApiError>,
) -> BasaltState {
    if prepared.is_null() {
        return BasaltState::Error;
    }
    // SAFETY: prepared is non-null (checked above)
    let handle = unsafe { &mut *prepared };
    let Some(statement) = handle.inner.as_mut() else {
        return BasaltState::Error;
    };
    let result = f(statement);
    handle.error.record(result)
}

/// Prepare a single statement.
///
/// `*out` always receives a handle (even on failure) that must be released
/// with `basalt_destroy_prepare()`.
///
/// # Safety
///
/// * `connection` must be a valid connection handle
/// * `query` must be a valid NUL-terminated string
/// * `out` must be a valid pointer
#[no_mangle]
pub unsafe extern "C" fn basalt_prepare(
    connection: *mut BasaltConnection,
    query: *const c_char,
    out: *mut *mut BasaltPrepared,
) -> BasaltState {
    if out.is_null() {
        return BasaltState::Error;
    }
    let outcome = if connection.is_null() {
        Err(ApiError::internal("connection must not be null"))
    } else {
        // SAFETY: query is null or NUL-terminated, per the caller
        unsafe { str_arg(query, "query") }.and_then(|sql| {
            // SAFETY: connection is non-null (checked above)
            unsafe { (*connection).inner.prepare(sql) }
        })
    };
    let (handle, state) = match outcome {
        Ok(statement) => (
            BasaltPrepared {
                inner: Some(statement),
                error: ErrorSlot::default(),
            },
            BasaltState::Success,
        ),
        Err(e) => (
            BasaltPrepared {
                inner: None,
                error: ErrorSlot::with_error(&e),
            },
            BasaltState::Error,
        ),
    };
    // SAFETY: out is non-null (checked above)
    unsafe { put_handle(out, handle) };
    state
}

/// Last error on the statement, or null.
///
/// # Safety
///
/// `prepared` must be null or a valid statement handle.
#[no_mangle]
pub unsafe extern "C" fn basalt_prepare_error(prepared: *const BasaltPrepared) -> *const c_char {
    if prepared.is_null() {
        return ptr::null();
    }
    // SAFETY: prepared is non-null (checked above)
    unsafe { (*prepared).error.as_ptr() }
}

/// Code of the statement's last error, or 0.
///
/// # Safety
///
/// `prepared` must be null or a valid statement handle.
#[no_mangle]
pub unsafe extern "C" fn basalt_prepare_error_code(prepared: *const BasaltPrepared) -> i32 {
    if prepared.is_null() {
        return 0;
    }
    // SAFETY: prepared is non-null (checked above)
    unsafe { (*prepared).error.code() }
}

/// Number of parameter slots; 0 for a failed statement.
///
/// # Safety
///
/// `prepared` must be null or a valid statement handle.
#[no_mangle]
pub unsafe extern "C" fn basalt_nparams(prepared: *const BasaltPrepared) -> u64 {
    if prepared.is_null() {
        return 0;
    }
    // SAFETY: prepared is non-null (checked above)
    unsafe { (*prepared).inner.as_ref() }.map_or(0, |s| to_u64(s.nparams()))
}

macro_rules! binders {
    ($($(#[$doc:meta])* $name:ident($ty:ty) => $method:ident;)*) => {
        $(
            $(#[$doc])*
            ///
            /// # Safety
            ///
            /// `prepared` must be null or a valid statement handle.
            #[no_mangle]
            pub unsafe extern "C" fn $name(prepared: *mut BasaltPrepared, param_idx: u64, val: $ty) -> BasaltState {
                // SAFETY: forwarded from the caller
                unsafe { with_statement(prepared, |s| s.$method(index(param_idx), val)) }
            }
        )*
    };
}

binders! {
    /// Bind a `bool`.
    basalt_bind_boolean(bool) => bind_boolean;
    /// Bind an `int8_t`.
    basalt_bind_int8(i8) => bind_int8;
    /// Bind an `int16_t`.
    basalt_bind_int16(i16) => bind_int16;
    /// Bind an `int32_t`.
    basalt_bind_int32(i32) => bind_int32;
    /// Bind an `int64_t`.
    basalt_bind_int64(i64) => bind_int64;
    /// Bind a `uint8_t`.
    basalt_bind_uint8(u8) => bind_uint8;
    /// Bind a `uint16_t`.
    basalt_bind_uint16(u16) => bind_uint16;
    /// Bind a `uint32_t`.
    basalt_bind_uint32(u32) => bind_uint32;
    /// Bind a `uint64_t`.
    basalt_bind_uint64(u64) => bind_uint64;
    /// Bind a 128-bit integer.
    basalt_bind_hugeint(HugeInt) => bind_hugeint;
    /// Bind a `float`.
    basalt_bind_float(f32) => bind_float;
    /// Bind a `double`.
    basalt_bind_double(f64) => bind_double;
    /// Bind a date.
    basalt_bind_date(Date) => bind_date;
    /// Bind a time of day.
    basalt_bind_time(Time) => bind_time;
    /// Bind a timestamp.
    basalt_bind_timestamp(Timestamp) => bind_timestamp;
    /// Bind an interval.
    basalt_bind_interval(Interval) => bind_interval;
}

/// Bind a NUL-terminated UTF-8 string.
///
/// # Safety
///
/// * `prepared` must be null or a valid statement handle
/// * `val` must be a valid NUL-terminated string
#[no_mangle]
pub unsafe extern "C" fn basalt_bind_varchar(
    prepared: *mut BasaltPrepared,
    param_idx: u64,
    val: *const c_char,
) -> BasaltState {
    // SAFETY: forwarded from the caller
    unsafe {
        with_statement(prepared, |s| {
            let text = str_arg(val, "val")?;
            s.bind_varchar(index(param_idx), text)
        })
    }
}

/// Bind `length` bytes of UTF-8 text (not NUL-terminated).
///
/// # Safety
///
/// * `prepared` must be null or a valid statement handle
/// * `val` must point to `length` readable bytes
#[no_mangle]
pub unsafe extern "C" fn basalt_bind_varchar_length(
    prepared: *mut BasaltPrepared,
    param_idx: u64,
    val: *const c_char,
    length: u64,
) -> BasaltState {
    // SAFETY: forwarded from the caller
    unsafe {
        with_statement(prepared, |s| {
            let bytes = byte_arg(val.cast(), length)?;
            s.bind_varchar_length(index(param_idx), bytes)
        })
    }
}

/// Bind `length` opaque bytes.
///
/// # Safety
///
/// * `prepared` must be null or a valid statement handle
/// * `data` must point to `length` readable bytes
#[no_mangle]
pub unsafe extern "C" fn basalt_bind_blob(
    prepared: *mut BasaltPrepared,
    param_idx: u64,
    data: *const c_void,
    length: u64,
) -> BasaltState {
    // SAFETY: forwarded from the caller
    unsafe {
        with_statement(prepared, |s| {
            let bytes = byte_arg(data.cast(), length)?;
            s.bind_blob(index(param_idx), bytes)
        })
    }
}

/// Bind NULL.
///
/// # Safety
///
/// `prepared` must be null or a valid statement handle.
#[no_mangle]
pub unsafe extern "C" fn basalt_bind_null(prepared: *mut BasaltPrepared, param_idx: u64) -> BasaltState {
    // SAFETY: forwarded from the caller
    unsafe { with_statement(prepared, |s| s.bind_null(index(param_idx))) }
}

/// Borrow a caller byte range.
///
/// # Safety
///
/// `data` must be null (only with `length == 0`) or point to `length`
/// readable bytes.
pub(crate) unsafe fn byte_arg<'a>(data: *const u8, length: u64) -> Result<&'a [u8], ApiError> {
    if length == 0 {
        return Ok(&[]);
    }
    if data.is_null() {
        return Err(ApiError::internal("data must not be null"));
    }
    let len = usize::try_from(length).map_err(|_| ApiError::internal("length too large"))?;
    // SAFETY: data points to `len` bytes, per the caller
    Ok(unsafe { std::slice::from_raw_parts(data, len) })
}

/// Execute with the current bindings.
///
/// If `out` is non-null it always receives a result handle that must be
/// released with `basalt_destroy_result()`.
///
/// # Safety
///
/// * `prepared` must be null or a valid statement handle
/// * `out` must be null or a valid pointer
#[no_mangle]
pub unsafe extern "C" fn basalt_execute_prepared(
    prepared: *mut BasaltPrepared,
    out: *mut *mut BasaltResult,
) -> BasaltState {
    // SAFETY: prepared is null or valid, per the caller
    let outcome = unsafe { prepared_ref(prepared) }.and_then(PreparedStatement::execute);
    let state = BasaltState::from_ok(outcome.is_ok());
    // SAFETY: out is null or valid, per the caller
    unsafe { put_handle(out, BasaltResult::new(outcome)) };
    state
}

/// Execute and expose the output as Arrow chunks.
///
/// If `out` is non-null it always receives a handle that must be released
/// with `basalt_destroy_arrow()`.
///
/// # Safety
///
/// * `prepared` must be null or a valid statement handle
/// * `out` must be null or a valid pointer
#[no_mangle]
pub unsafe extern "C" fn basalt_execute_prepared_arrow(
    prepared: *mut BasaltPrepared,
    out: *mut *mut BasaltArrow,
) -> BasaltState {
    // SAFETY: prepared is null or valid, per the caller
    let outcome = unsafe { prepared_ref(prepared) }.and_then(PreparedStatement::execute_arrow);
    let state = BasaltState::from_ok(outcome.is_ok());
    // SAFETY: out is null or valid, per the caller
    unsafe { put_handle(out, BasaltArrow::new(outcome)) };
    state
}

/// # Safety
///
/// `prepared` must be null or a valid statement handle.
unsafe fn prepared_ref<'a>(prepared: *const BasaltPrepared) -> Result<&'a PreparedStatement, ApiError> {
    if prepared.is_null() {
        return Err(ApiError::internal("prepared statement must not be null"));
    }
    // SAFETY: prepared is non-null (checked above)
    unsafe { (*prepared).inner.as_ref() }
        .ok_or_else(|| ApiError::query("Statement failed to prepare"))
}

/// Destroy a statement and null the handle. Null is a no-op.
///
/// # Safety
///
/// `prepared` must be null or point to null or a valid statement handle.
#[no_mangle]
pub unsafe extern "C" fn basalt_destroy_prepare(prepared: *mut *mut BasaltPrepared) {
    // SAFETY: forwarded from the caller
    drop(unsafe { take_handle(prepared) });
}
