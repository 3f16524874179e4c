//! C FFI layer for basalt.
//!
//! This module provides `extern "C"` functions for embedding basalt in any
//! language with C FFI support.
//!
//! # Design
//!
//! - **Opaque handles**: one distinct handle type per concept (config,
//!   database, connection, result, prepared statement, appender, Arrow result)
//! - **Status returns**: fallible functions return [`BasaltState`]
//! - **Errors on handles**: a failed query, prepare or appender call leaves
//!   its message on the handle, readable until the handle is destroyed
//! - **In-place teardown**: `close`/`disconnect`/`destroy` take a pointer to
//!   the handle, null it, and treat a null handle as a no-op
//! - **Arena memory**: strings and blobs from value accessors are released
//!   with `basalt_free`
//!
//! # Example (C)
//!
//! ```c
//! basalt_database db = NULL;
//! basalt_connection con = NULL;
//! basalt_result result = NULL;
//!
//! if (basalt_open(NULL, &db) == BasaltError) return 1;
//! if (basalt_connect(db, &con) == BasaltError) return 1;
//! if (basalt_query(con, "SELECT 42", &result) == BasaltError) {
//!     printf("%s\n", basalt_result_error(result));
//! }
//! printf("%d\n", basalt_value_int32(result, 0, 0));
//!
//! basalt_destroy_result(&result);
//! basalt_disconnect(&con);
//! basalt_close(&db);
//! ```

mod appender;
mod arrow_ffi;
mod config;
mod connection;
mod error;
mod memory;
mod result;
mod statement;

pub use appender::*;
pub use arrow_ffi::*;
pub use config::*;
pub use connection::*;
pub use error::BasaltState;
pub use memory::*;
pub use result::*;
pub use statement::*;

use std::ffi::{c_char, CStr};

use crate::api::ApiError;

/// Borrow a NUL-terminated UTF-8 argument.
///
/// # Safety
///
/// `s` must be null or a valid NUL-terminated string that outlives `'a`.
pub(crate) unsafe fn str_arg<'a>(s: *const c_char, what: &str) -> Result<&'a str, ApiError> {
    if s.is_null() {
        return Err(ApiError::internal(format!("{what} must not be null")));
    }
    // SAFETY: s is non-null and, per the caller, NUL-terminated
    unsafe { CStr::from_ptr(s) }
        .to_str()
        .map_err(|e| ApiError::internal(format!("{what} is not valid UTF-8: {e}")))
}

/// Convert a C index to `usize`; values that do not fit are out of range.
pub(crate) fn index(i: u64) -> usize {
    usize::try_from(i).unwrap_or(usize::MAX)
}

/// Take ownership of the handle `*handle` and null it in place.
///
/// # Safety
///
/// `handle` must be null or point to null or a pointer obtained from
/// `Box::into_raw` that has not been reclaimed.
pub(crate) unsafe fn take_handle<T>(handle: *mut *mut T) -> Option<Box<T>> {
    if handle.is_null() {
        return None;
    }
    // SAFETY: handle is non-null (checked above)
    let raw = unsafe { std::ptr::replace(handle, std::ptr::null_mut()) };
    if raw.is_null() {
        None
    } else {
        // SAFETY: raw came from Box::into_raw, per the caller
        Some(unsafe { Box::from_raw(raw) })
    }
}

/// Store `value` as a new heap handle in `out`, if `out` is non-null.
///
/// # Safety
///
/// `out` must be null or a valid pointer.
pub(crate) unsafe fn put_handle<T>(out: *mut *mut T, value: T) {
    if !out.is_null() {
        // SAFETY: out is non-null (checked above)
        unsafe { *out = Box::into_raw(Box::new(value)) };
    }
}
