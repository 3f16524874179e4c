//! FFI appender functions.

use std::ffi::{c_char, c_void};
use std::ptr;

use tracing::warn;

use super::connection::BasaltConnection;
use super::error::{BasaltState, ErrorSlot};
use super::statement::byte_arg;
use super::{put_handle, str_arg, take_handle};
use crate::api::{ApiError, Appender};
use crate::types::{Date, HugeInt, Interval, Time, Timestamp};

/// Opaque appender handle.
///
/// Create with `basalt_appender_create()`, free with
/// `basalt_appender_destroy()`, which also closes it. Every call records
/// its failure, if any, for `basalt_appender_error()`.
pub struct BasaltAppender {
    inner: Option<Appender>,
    error: ErrorSlot,
}

/// # Safety
///
/// `appender` must be null or a valid appender handle.
unsafe fn with_appender(
    appender: *mut BasaltAppender,
    f: impl FnOnce(&mut Appender) -> Result<(), ApiError>,
) -> BasaltState {
    if appender.is_null() {
        return BasaltState::Error;
    }
    // SAFETY: appender is non-null (checked above)
    let handle = unsafe { &mut *appender };
    let result = match handle.inner.as_mut() {
        Some(inner) => f(inner),
        None => Err(ApiError::appender_closed()),
    };
    handle.error.record(result)
}

/// # Safety
///
/// Same contract as `basalt_appender_create`.
unsafe fn open_appender(
    connection: *mut BasaltConnection,
    schema: *const c_char,
    table: *const c_char,
) -> Result<Appender, ApiError> {
    if connection.is_null() {
        return Err(ApiError::internal("connection must not be null"));
    }
    let schema = if schema.is_null() {
        None
    } else {
        // SAFETY: schema is non-null and NUL-terminated, per the caller
        Some(unsafe { str_arg(schema, "schema") }?)
    };
    // SAFETY: table is null or NUL-terminated, per the caller
    let table = unsafe { str_arg(table, "table") }?;
    // SAFETY: connection is non-null (checked above)
    unsafe { (*connection).inner.appender(schema, table) }
}

/// Open an appender on `schema.table` (`schema` may be null).
///
/// `*out` always receives a handle (even on failure) that must be released
/// with `basalt_appender_destroy()`.
///
/// # Safety
///
/// * `connection` must be a valid connection handle
/// * `schema` must be null or a valid NUL-terminated string
/// * `table` must be a valid NUL-terminated string
/// * `out` must be a valid pointer
#[no_mangle]
pub unsafe extern "C" fn basalt_appender_create(
    connection: *mut BasaltConnection,
    schema: *const c_char,
    table: *const c_char,
    out: *mut *mut BasaltAppender,
) -> BasaltState {
    if out.is_null() {
        return BasaltState::Error;
    }
    // SAFETY: forwarded from the caller
    let outcome = unsafe { open_appender(connection, schema, table) };
    let state = BasaltState::from_ok(outcome.is_ok());
    let handle = match outcome {
        Ok(appender) => BasaltAppender {
            inner: Some(appender),
            error: ErrorSlot::default(),
        },
        Err(e) => BasaltAppender {
            inner: None,
            error: ErrorSlot::with_error(&e),
        },
    };
    // SAFETY: out is non-null (checked above)
    unsafe { put_handle(out, handle) };
    state
}

/// Message of the appender's last failure, or null.
///
/// # Safety
///
/// `appender` must be null or a valid appender handle.
#[no_mangle]
pub unsafe extern "C" fn basalt_appender_error(appender: *const BasaltAppender) -> *const c_char {
    if appender.is_null() {
        return ptr::null();
    }
    // SAFETY: appender is non-null (checked above)
    unsafe { (*appender).error.as_ptr() }
}

/// Code of the appender's last failure, or 0.
///
/// # Safety
///
/// `appender` must be null or a valid appender handle.
#[no_mangle]
pub unsafe extern "C" fn basalt_appender_error_code(appender: *const BasaltAppender) -> i32 {
    if appender.is_null() {
        return 0;
    }
    // SAFETY: appender is non-null (checked above)
    unsafe { (*appender).error.code() }
}

/// Start a row.
///
/// # Safety
///
/// `appender` must be null or a valid appender handle.
#[no_mangle]
pub unsafe extern "C" fn basalt_appender_begin_row(appender: *mut BasaltAppender) -> BasaltState {
    // SAFETY: forwarded from the caller
    unsafe { with_appender(appender, Appender::begin_row) }
}

/// Finish a row; fails (dropping the row) unless every column has a value.
///
/// # Safety
///
/// `appender` must be null or a valid appender handle.
#[no_mangle]
pub unsafe extern "C" fn basalt_appender_end_row(appender: *mut BasaltAppender) -> BasaltState {
    // SAFETY: forwarded from the caller
    unsafe { with_appender(appender, Appender::end_row) }
}

/// Write buffered rows to the table.
///
/// # Safety
///
/// `appender` must be null or a valid appender handle.
#[no_mangle]
pub unsafe extern "C" fn basalt_appender_flush(appender: *mut BasaltAppender) -> BasaltState {
    // SAFETY: forwarded from the caller
    unsafe { with_appender(appender, Appender::flush) }
}

/// Flush and close. Closing again succeeds without effect.
///
/// # Safety
///
/// `appender` must be null or a valid appender handle.
#[no_mangle]
pub unsafe extern "C" fn basalt_appender_close(appender: *mut BasaltAppender) -> BasaltState {
    // SAFETY: forwarded from the caller
    unsafe { with_appender(appender, Appender::close) }
}

/// Close (if still open), destroy and null the handle. Null is a no-op.
///
/// Returns the close outcome; the handle is freed either way.
///
/// # Safety
///
/// `appender` must be null or point to null or a valid appender handle.
#[no_mangle]
pub unsafe extern "C" fn basalt_appender_destroy(appender: *mut *mut BasaltAppender) -> BasaltState {
    // SAFETY: forwarded from the caller
    let Some(mut handle) = (unsafe { take_handle(appender) }) else {
        return BasaltState::Success;
    };
    let Some(mut inner) = handle.inner.take() else {
        return BasaltState::Success;
    };
    match inner.close() {
        Ok(()) => BasaltState::Success,
        Err(e) => {
            warn!(table = %inner.table(), error = %e, "Appender destroyed with unflushed rows");
            BasaltState::Error
        }
    }
}

macro_rules! appends {
    ($($(#[$doc:meta])* $name:ident($ty:ty) => $method:ident;)*) => {
        $(
            $(#[$doc])*
            ///
            /// # Safety
            ///
            /// `appender` must be null or a valid appender handle.
            #[no_mangle]
            pub unsafe extern "C" fn $name(appender: *mut BasaltAppender, value: $ty) -> BasaltState {
                // SAFETY: forwarded from the caller
                unsafe { with_appender(appender, |a| a.$method(value)) }
            }
        )*
    };
}

appends! {
    /// Append a `bool`.
    basalt_append_bool(bool) => append_bool;
    /// Append an `int8_t`.
    basalt_append_int8(i8) => append_int8;
    /// Append an `int16_t`.
    basalt_append_int16(i16) => append_int16;
    /// Append an `int32_t`.
    basalt_append_int32(i32) => append_int32;
    /// Append an `int64_t`.
    basalt_append_int64(i64) => append_int64;
    /// Append a `uint8_t`.
    basalt_append_uint8(u8) => append_uint8;
    /// Append a `uint16_t`.
    basalt_append_uint16(u16) => append_uint16;
    /// Append a `uint32_t`.
    basalt_append_uint32(u32) => append_uint32;
    /// Append a `uint64_t`.
    basalt_append_uint64(u64) => append_uint64;
    /// Append a 128-bit integer.
    basalt_append_hugeint(HugeInt) => append_hugeint;
    /// Append a `float`.
    basalt_append_float(f32) => append_float;
    /// Append a `double`.
    basalt_append_double(f64) => append_double;
    /// Append a date.
    basalt_append_date(Date) => append_date;
    /// Append a time of day.
    basalt_append_time(Time) => append_time;
    /// Append a timestamp.
    basalt_append_timestamp(Timestamp) => append_timestamp;
    /// Append an interval.
    basalt_append_interval(Interval) => append_interval;
}

/// Append a NUL-terminated UTF-8 string.
///
/// # Safety
///
/// * `appender` must be null or a valid appender handle
/// * `val` must be a valid NUL-terminated string
#[no_mangle]
pub unsafe extern "C" fn basalt_append_varchar(appender: *mut BasaltAppender, val: *const c_char) -> BasaltState {
    // SAFETY: forwarded from the caller
    unsafe {
        with_appender(appender, |a| {
            let text = str_arg(val, "val")?;
            a.append_varchar(text)
        })
    }
}

/// Append `length` bytes of UTF-8 text.
///
/// # Safety
///
/// * `appender` must be null or a valid appender handle
/// * `val` must point to `length` readable bytes
#[no_mangle]
pub unsafe extern "C" fn basalt_append_varchar_length(
    appender: *mut BasaltAppender,
    val: *const c_char,
    length: u64,
) -> BasaltState {
    // SAFETY: forwarded from the caller
    unsafe {
        with_appender(appender, |a| {
            let bytes = byte_arg(val.cast(), length)?;
            a.append_varchar_length(bytes)
        })
    }
}

/// Append `length` opaque bytes.
///
/// # Safety
///
/// * `appender` must be null or a valid appender handle
/// * `data` must point to `length` readable bytes
#[no_mangle]
pub unsafe extern "C" fn basalt_append_blob(
    appender: *mut BasaltAppender,
    data: *const c_void,
    length: u64,
) -> BasaltState {
    // SAFETY: forwarded from the caller
    unsafe {
        with_appender(appender, |a| {
            let bytes = byte_arg(data.cast(), length)?;
            a.append_blob(bytes)
        })
    }
}

/// Append NULL.
///
/// # Safety
///
/// `appender` must be null or a valid appender handle.
#[no_mangle]
pub unsafe extern "C" fn basalt_append_null(appender: *mut BasaltAppender) -> BasaltState {
    // SAFETY: forwarded from the caller
    unsafe { with_appender(appender, Appender::append_null) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{codes, Database};

    #[test]
    fn test_append_rows_through_ffi() {
        let db = Database::open_in_memory().unwrap();
        let conn = db.connect().unwrap();
        conn.query("CREATE TABLE t (i INTEGER, s VARCHAR)").unwrap();
        let mut handle = BasaltConnection { inner: conn };
        let mut app = ptr::null_mut();
        // SAFETY: valid handles and pointers throughout
        unsafe {
            let state = basalt_appender_create(&mut handle, ptr::null(), c"t".as_ptr(), &mut app);
            assert_eq!(state, BasaltState::Success);

            assert_eq!(basalt_appender_begin_row(app), BasaltState::Success);
            assert_eq!(basalt_append_int32(app, 1), BasaltState::Success);
            assert_eq!(basalt_append_varchar(app, c"x".as_ptr()), BasaltState::Success);
            assert_eq!(basalt_appender_end_row(app), BasaltState::Success);

            assert_eq!(basalt_append_int32(app, 2), BasaltState::Success);
            assert_eq!(basalt_appender_end_row(app), BasaltState::Error);
            assert!(!basalt_appender_error(app).is_null());
            assert_eq!(basalt_appender_error_code(app), codes::COLUMN_COUNT_MISMATCH);

            assert_eq!(basalt_appender_close(app), BasaltState::Success);
            assert!(basalt_appender_error(app).is_null());
            assert_eq!(basalt_appender_error_code(app), 0);
            assert_eq!(basalt_appender_close(app), BasaltState::Success);
            assert_eq!(basalt_append_int32(app, 3), BasaltState::Error);
            assert_eq!(basalt_appender_destroy(&mut app), BasaltState::Success);
            assert!(app.is_null());
        }
        let r = handle.inner.query("SELECT i, s FROM t").unwrap();
        assert_eq!(r.row_count(), 1);
        assert_eq!(r.value_int32(0, 0), 1);
        assert_eq!(r.value_varchar(1, 0).unwrap().as_str(), "x");
    }

    #[test]
    fn test_missing_table() {
        let db = Database::open_in_memory().unwrap();
        let mut handle = BasaltConnection {
            inner: db.connect().unwrap(),
        };
        let mut app = ptr::null_mut();
        // SAFETY: valid handles and pointers throughout
        unsafe {
            let state =
                basalt_appender_create(&mut handle, ptr::null(), c"nowhere".as_ptr(), &mut app);
            assert_eq!(state, BasaltState::Error);
            assert!(!basalt_appender_error(app).is_null());
            assert_eq!(basalt_appender_error_code(app), codes::TABLE_NOT_FOUND);
            assert_eq!(basalt_appender_begin_row(app), BasaltState::Error);
            assert_eq!(basalt_appender_destroy(&mut app), BasaltState::Success);
        }
    }
}
