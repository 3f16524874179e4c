//! Arrow C Data Interface export of query results.
//!
//! A query run through `basalt_query_arrow` yields a channel that hands out
//! one chunk at a time. Each `basalt_query_arrow_array` call releases the
//! previous chunk, so at most one chunk per channel is alive.
//!
//! # Usage
//!
//! ```c
//! basalt_arrow result = NULL;
//! if (basalt_query_arrow(con, "SELECT * FROM t", &result) == BasaltError) {
//!     printf("%s\n", basalt_query_arrow_error(result));
//! }
//!
//! const struct ArrowSchema* schema = NULL;
//! basalt_query_arrow_schema(result, &schema);
//!
//! struct ArrowArray* array = NULL;
//! while (basalt_query_arrow_array(result, &array) == BasaltSuccess && array) {
//!     // read the chunk; it stays valid until the next call
//! }
//! basalt_destroy_arrow(&result);
//! ```

use std::ffi::c_char;
use std::ptr;

use arrow::ffi::{FFI_ArrowArray, FFI_ArrowSchema};

use super::connection::BasaltConnection;
use super::error::{BasaltState, ErrorSlot};
use super::result::to_u64;
use super::{put_handle, str_arg, take_handle};
use crate::api::{ApiError, ArrowResult};

/// Opaque Arrow result handle.
///
/// Produced by `basalt_query_arrow()` and `basalt_execute_prepared_arrow()`,
/// freed with `basalt_destroy_arrow()`.
pub struct BasaltArrow {
    inner: Option<ArrowResult>,
    error: ErrorSlot,
}

impl BasaltArrow {
    pub(crate) fn new(outcome: Result<ArrowResult, ApiError>) -> Self {
        match outcome {
            Ok(result) => Self {
                inner: Some(result),
                error: ErrorSlot::default(),
            },
            Err(e) => Self {
                inner: None,
                error: ErrorSlot::with_error(&e),
            },
        }
    }
}

/// # Safety
///
/// `arrow` must be null or a valid Arrow result handle.
unsafe fn arrow_ref<'a>(arrow: *const BasaltArrow) -> Option<&'a ArrowResult> {
    if arrow.is_null() {
        return None;
    }
    // SAFETY: arrow is non-null and valid, per the caller
    unsafe { (*arrow).inner.as_ref() }
}

/// Run SQL and expose the last statement's output as Arrow chunks.
///
/// If `out` is non-null it always receives a handle, which carries the
/// error message on failure.
///
/// # Safety
///
/// * `connection` must be a valid connection handle
/// * `sql` must be a valid NUL-terminated string
/// * `out` must be null or a valid pointer
#[no_mangle]
pub unsafe extern "C" fn basalt_query_arrow(
    connection: *mut BasaltConnection,
    sql: *const c_char,
    out: *mut *mut BasaltArrow,
) -> BasaltState {
    let outcome = if connection.is_null() {
        Err(ApiError::internal("connection must not be null"))
    } else {
        // SAFETY: sql is null or NUL-terminated, per the caller
        unsafe { str_arg(sql, "sql") }.and_then(|sql| {
            // SAFETY: connection is non-null (checked above)
            unsafe { (*connection).inner.query_arrow(sql) }
        })
    };
    let state = BasaltState::from_ok(outcome.is_ok());
    // SAFETY: out is null or valid, per the caller
    unsafe { put_handle(out, BasaltArrow::new(outcome)) };
    state
}

/// Schema of the result, owned by the handle and stable for its lifetime.
///
/// # Safety
///
/// * `arrow` must be null or a valid Arrow result handle
/// * `out_schema` must be a valid pointer
#[no_mangle]
pub unsafe extern "C" fn basalt_query_arrow_schema(
    arrow: *const BasaltArrow,
    out_schema: *mut *const FFI_ArrowSchema,
) -> BasaltState {
    if out_schema.is_null() {
        return BasaltState::Error;
    }
    // SAFETY: forwarded from the caller
    let Some(result) = (unsafe { arrow_ref(arrow) }) else {
        return BasaltState::Error;
    };
    // SAFETY: out_schema is non-null (checked above)
    unsafe { *out_schema = result.arrow_schema() };
    BasaltState::Success
}

/// Release the previous chunk and return the next one.
///
/// `*out_array` is set to null once the result is exhausted. The array is
/// owned by the handle; a consumer that wants to keep it must move it out
/// (taking over its release callback).
///
/// # Safety
///
/// * `arrow` must be null or a valid Arrow result handle
/// * `out_array` must be a valid pointer
/// * pointers from earlier calls must no longer be used
#[no_mangle]
pub unsafe extern "C" fn basalt_query_arrow_array(
    arrow: *mut BasaltArrow,
    out_array: *mut *mut FFI_ArrowArray,
) -> BasaltState {
    if arrow.is_null() || out_array.is_null() {
        return BasaltState::Error;
    }
    // SAFETY: out_array is non-null (checked above)
    unsafe { *out_array = ptr::null_mut() };
    // SAFETY: arrow is non-null (checked above)
    let handle = unsafe { &mut *arrow };
    let Some(result) = handle.inner.as_mut() else {
        return BasaltState::Error;
    };
    match result.next_array() {
        Ok(next) => {
            let raw = next.map_or(ptr::null_mut(), ptr::from_mut);
            // SAFETY: out_array is non-null (checked above)
            unsafe { *out_array = raw };
            handle.error.clear();
            BasaltState::Success
        }
        Err(e) => {
            handle.error.set(&e);
            BasaltState::Error
        }
    }
}

/// Number of columns in the result.
///
/// # Safety
///
/// `arrow` must be null or a valid Arrow result handle.
#[no_mangle]
pub unsafe extern "C" fn basalt_arrow_column_count(arrow: *const BasaltArrow) -> u64 {
    // SAFETY: forwarded from the caller
    unsafe { arrow_ref(arrow) }.map_or(0, |r| to_u64(r.column_count()))
}

/// Total rows across all chunks.
///
/// # Safety
///
/// `arrow` must be null or a valid Arrow result handle.
#[no_mangle]
pub unsafe extern "C" fn basalt_arrow_row_count(arrow: *const BasaltArrow) -> u64 {
    // SAFETY: forwarded from the caller
    unsafe { arrow_ref(arrow) }.map_or(0, |r| to_u64(r.row_count()))
}

/// Rows changed by an `INSERT`/`UPDATE`/`DELETE`; 0 otherwise.
///
/// # Safety
///
/// `arrow` must be null or a valid Arrow result handle.
#[no_mangle]
pub unsafe extern "C" fn basalt_arrow_rows_changed(arrow: *const BasaltArrow) -> u64 {
    // SAFETY: forwarded from the caller
    unsafe { arrow_ref(arrow) }.map_or(0, ArrowResult::rows_changed)
}

/// Error message of a failed query, or null.
///
/// # Safety
///
/// `arrow` must be null or a valid Arrow result handle.
#[no_mangle]
pub unsafe extern "C" fn basalt_query_arrow_error(arrow: *const BasaltArrow) -> *const c_char {
    if arrow.is_null() {
        return ptr::null();
    }
    // SAFETY: arrow is non-null (checked above)
    unsafe { (*arrow).error.as_ptr() }
}

/// Error code of a failed query, or 0.
///
/// # Safety
///
/// `arrow` must be null or a valid Arrow result handle.
#[no_mangle]
pub unsafe extern "C" fn basalt_query_arrow_error_code(arrow: *const BasaltArrow) -> i32 {
    if arrow.is_null() {
        return 0;
    }
    // SAFETY: arrow is non-null (checked above)
    unsafe { (*arrow).error.code() }
}

/// Destroy the handle, releasing the schema and any outstanding chunk, and
/// null it. Null is a no-op.
///
/// # Safety
///
/// `arrow` must be null or point to null or a valid Arrow result handle.
#[no_mangle]
pub unsafe extern "C" fn basalt_destroy_arrow(arrow: *mut *mut BasaltArrow) {
    // SAFETY: forwarded from the caller
    drop(unsafe { take_handle(arrow) });
}

#[cfg(test)]
mod tests {
    use arrow::array::{Array, AsArray, StructArray};
    use arrow::datatypes::Int64Type;
    use arrow::ffi::from_ffi;

    use super::*;
    use crate::api::Database;
    use crate::config::Config;

    fn connection(chunk_size: &str) -> (Database, BasaltConnection) {
        let mut config = Config::default();
        config.set("chunk_size", chunk_size).unwrap();
        let db = Database::open_ext(None, config).unwrap();
        let conn = db.connect().unwrap();
        conn.query("CREATE TABLE t AS SELECT * FROM (VALUES (1), (2), (3), (4), (5)) AS v(n)")
            .unwrap();
        (db, BasaltConnection { inner: conn })
    }

    #[test]
    fn test_chunks_and_counts() {
        let (_db, mut conn) = connection("2");
        let mut result = ptr::null_mut();
        // SAFETY: valid handles and pointers throughout
        unsafe {
            let state = basalt_query_arrow(&mut conn, c"SELECT n FROM t ORDER BY n".as_ptr(), &mut result);
            assert_eq!(state, BasaltState::Success);
            assert!(basalt_query_arrow_error(result).is_null());
            assert_eq!(basalt_query_arrow_error_code(result), 0);
            assert_eq!(basalt_arrow_column_count(result), 1);
            assert_eq!(basalt_arrow_row_count(result), 5);
            assert_eq!(basalt_arrow_rows_changed(result), 0);

            let mut schema = ptr::null();
            assert_eq!(basalt_query_arrow_schema(result, &mut schema), BasaltState::Success);
            assert!(!schema.is_null());
            let mut again = ptr::null();
            basalt_query_arrow_schema(result, &mut again);
            assert_eq!(schema, again);

            let mut seen = Vec::new();
            let mut array = ptr::null_mut();
            loop {
                assert_eq!(basalt_query_arrow_array(result, &mut array), BasaltState::Success);
                if array.is_null() {
                    break;
                }
                let owned = std::ptr::replace(array, FFI_ArrowArray::empty());
                let data = from_ffi(owned, &*schema).unwrap();
                let chunk = StructArray::from(data);
                assert!(chunk.len() <= 2);
                let col = chunk.column(0).as_primitive::<Int64Type>();
                seen.extend(col.values().iter().copied());
            }
            assert_eq!(seen, vec![1, 2, 3, 4, 5]);

            basalt_destroy_arrow(&mut result);
            assert!(result.is_null());
        }
    }

    #[test]
    fn test_next_array_releases_previous() {
        let (_db, mut conn) = connection("1");
        let mut result = ptr::null_mut();
        // SAFETY: valid handles and pointers; stale chunk pointers are not read
        unsafe {
            basalt_query_arrow(&mut conn, c"SELECT n FROM t".as_ptr(), &mut result);
            let mut first = ptr::null_mut();
            let mut second = ptr::null_mut();
            basalt_query_arrow_array(result, &mut first);
            basalt_query_arrow_array(result, &mut second);
            assert!(!second.is_null());
            assert_eq!((*second).len(), 1);
            assert!(!(*second).is_released());
            basalt_destroy_arrow(&mut result);
        }
    }

    #[test]
    fn test_failed_query_has_error_and_no_data() {
        let (_db, mut conn) = connection("2");
        let mut result = ptr::null_mut();
        // SAFETY: valid handles and pointers throughout
        unsafe {
            let state = basalt_query_arrow(&mut conn, c"SELECT nope FROM t".as_ptr(), &mut result);
            assert_eq!(state, BasaltState::Error);
            assert!(!basalt_query_arrow_error(result).is_null());
            assert_ne!(basalt_query_arrow_error_code(result), 0);
            let mut array = ptr::null_mut();
            assert_eq!(basalt_query_arrow_array(result, &mut array), BasaltState::Error);
            assert!(array.is_null());
            assert_eq!(basalt_arrow_row_count(result), 0);
            basalt_destroy_arrow(&mut result);
        }
    }
}
