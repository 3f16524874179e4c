//! FFI database and connection functions.

use std::ffi::c_char;
use std::path::Path;
use std::ptr;

use tracing::{debug, warn};

use super::config::BasaltConfig;
use super::error::BasaltState;
use super::result::BasaltResult;
use super::{put_handle, str_arg, take_handle};
use crate::api::{ApiError, Connection, Database};
use crate::arena::{default_arena, ArenaString};
use crate::config::Config;

/// Opaque database handle.
///
/// Create with `basalt_open()`/`basalt_open_ext()`, free with `basalt_close()`.
pub struct BasaltDatabase {
    inner: Database,
}

/// Opaque connection handle.
///
/// Create with `basalt_connect()`, free with `basalt_disconnect()`.
pub struct BasaltConnection {
    pub(crate) inner: Connection,
}

/// Resolve the path argument; null means in-memory.
///
/// # Safety
///
/// `path` must be null or a valid NUL-terminated string.
unsafe fn open_database(path: *const c_char, config: Config) -> Result<Database, ApiError> {
    let path = if path.is_null() {
        None
    } else {
        // SAFETY: path is non-null and, per the caller, NUL-terminated
        Some(Path::new(unsafe { str_arg(path, "path") }?))
    };
    Database::open_ext(path, config)
}

/// Open a database at `path` (null or `":memory:"` for in-memory).
///
/// # Safety
///
/// * `path` must be null or a valid NUL-terminated string
/// * `out` must be a valid pointer
#[no_mangle]
pub unsafe extern "C" fn basalt_open(
    path: *const c_char,
    out: *mut *mut BasaltDatabase,
) -> BasaltState {
    // SAFETY: forwarded from the caller
    unsafe { basalt_open_ext(path, out, ptr::null(), ptr::null_mut()) }
}

/// Open a database with a configuration.
///
/// The configuration is copied; the caller still destroys it. On failure
/// `*out` is set to null and, if `out_error` is non-null, `*out_error`
/// receives a message that must be released with `basalt_free`.
///
/// # Safety
///
/// * `path` must be null or a valid NUL-terminated string
/// * `out` must be a valid pointer
/// * `config` must be null or a valid configuration handle
/// * `out_error` must be null or a valid pointer
#[no_mangle]
pub unsafe extern "C" fn basalt_open_ext(
    path: *const c_char,
    out: *mut *mut BasaltDatabase,
    config: *const BasaltConfig,
    out_error: *mut *mut c_char,
) -> BasaltState {
    if !out_error.is_null() {
        // SAFETY: out_error is non-null (checked)
        unsafe { *out_error = ptr::null_mut() };
    }
    if out.is_null() {
        return BasaltState::Error;
    }
    // SAFETY: out is non-null (checked above)
    unsafe { *out = ptr::null_mut() };

    let config = if config.is_null() {
        Config::default()
    } else {
        // SAFETY: config is non-null (checked)
        unsafe { (*config).inner.clone() }
    };

    // SAFETY: forwarded from the caller
    match unsafe { open_database(path, config) } {
        Ok(db) => {
            // SAFETY: out is non-null (checked above)
            unsafe { put_handle(out, BasaltDatabase { inner: db }) };
            BasaltState::Success
        }
        Err(e) => {
            debug!(error = %e, "Database open failed");
            if !out_error.is_null() {
                let message = ArenaString::new(default_arena(), e.message())
                    .map_or(ptr::null_mut(), ArenaString::into_raw);
                // SAFETY: out_error is non-null (checked)
                unsafe { *out_error = message };
            }
            BasaltState::Error
        }
    }
}

/// Close a database and null the handle. Null is a no-op.
///
/// Connections opened from the database fail every later call.
///
/// # Safety
///
/// `database` must be null or point to null or a handle from `basalt_open*`.
#[no_mangle]
pub unsafe extern "C" fn basalt_close(database: *mut *mut BasaltDatabase) {
    // SAFETY: forwarded from the caller
    if let Some(handle) = unsafe { take_handle(database) } {
        if let Err(e) = handle.inner.close() {
            warn!(error = %e, "Database close failed");
        }
    }
}

/// Open a connection to a database.
///
/// # Safety
///
/// * `database` must be a valid database handle
/// * `out` must be a valid pointer
#[no_mangle]
pub unsafe extern "C" fn basalt_connect(
    database: *mut BasaltDatabase,
    out: *mut *mut BasaltConnection,
) -> BasaltState {
    if database.is_null() || out.is_null() {
        return BasaltState::Error;
    }
    // SAFETY: out is non-null (checked above)
    unsafe { *out = ptr::null_mut() };
    // SAFETY: database is non-null (checked above)
    match unsafe { (*database).inner.connect() } {
        Ok(conn) => {
            // SAFETY: out is non-null (checked above)
            unsafe { put_handle(out, BasaltConnection { inner: conn }) };
            BasaltState::Success
        }
        Err(e) => {
            debug!(error = %e, "Connect failed");
            BasaltState::Error
        }
    }
}

/// Close a connection and null the handle. Calling it again is a no-op.
///
/// # Safety
///
/// `connection` must be null or point to null or a handle from
/// `basalt_connect()`.
#[no_mangle]
pub unsafe extern "C" fn basalt_disconnect(connection: *mut *mut BasaltConnection) {
    // SAFETY: forwarded from the caller
    if let Some(handle) = unsafe { take_handle(connection) } {
        handle.inner.disconnect();
    }
}

/// Run SQL and materialize the last statement's result.
///
/// If `out` is non-null it always receives a result handle, which carries
/// the error message on failure and must be released with
/// `basalt_destroy_result()`.
///
/// # Safety
///
/// * `connection` must be a valid connection handle
/// * `sql` must be a valid NUL-terminated string
/// * `out` must be null or a valid pointer
#[no_mangle]
pub unsafe extern "C" fn basalt_query(
    connection: *mut BasaltConnection,
    sql: *const c_char,
    out: *mut *mut BasaltResult,
) -> BasaltState {
    let outcome = if connection.is_null() {
        Err(ApiError::internal("connection must not be null"))
    } else {
        // SAFETY: sql is null or NUL-terminated, per the caller
        unsafe { str_arg(sql, "sql") }.and_then(|sql| {
            // SAFETY: connection is non-null (checked above)
            unsafe { (*connection).inner.query(sql) }
        })
    };
    let state = BasaltState::from_ok(outcome.is_ok());
    // SAFETY: out is null or valid, per the caller
    unsafe { put_handle(out, BasaltResult::new(outcome)) };
    state
}

#[cfg(test)]
mod tests {
    use std::ffi::CStr;

    use super::*;
    use crate::api::codes;
    use crate::ffi::{basalt_destroy_result, basalt_free, basalt_result_error, basalt_result_error_code};

    #[test]
    fn test_open_connect_close() {
        let mut db = ptr::null_mut();
        let mut conn = ptr::null_mut();
        // SAFETY: valid out-pointers; handles are used before being closed
        unsafe {
            assert_eq!(basalt_open(ptr::null(), &mut db), BasaltState::Success);
            assert_eq!(basalt_connect(db, &mut conn), BasaltState::Success);
            basalt_disconnect(&mut conn);
            assert!(conn.is_null());
            basalt_disconnect(&mut conn);
            basalt_close(&mut db);
            assert!(db.is_null());
            basalt_close(&mut db);
        }
    }

    #[test]
    fn test_open_ext_reports_error() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("plain-file");
        std::fs::write(&file, b"x").unwrap();
        let path = std::ffi::CString::new(file.to_str().unwrap()).unwrap();

        let mut db = ptr::null_mut();
        let mut error = ptr::null_mut();
        // SAFETY: valid pointers; the error string is freed with basalt_free
        unsafe {
            let state = basalt_open_ext(path.as_ptr(), &mut db, ptr::null(), &mut error);
            assert_eq!(state, BasaltState::Error);
            assert!(db.is_null());
            assert!(!error.is_null());
            assert!(!CStr::from_ptr(error).to_str().unwrap().is_empty());
            basalt_free(error.cast());
        }
    }

    #[test]
    fn test_failed_query_yields_result_with_error() {
        let mut db = ptr::null_mut();
        let mut conn = ptr::null_mut();
        let mut result = ptr::null_mut();
        // SAFETY: valid handles and pointers throughout
        unsafe {
            basalt_open(ptr::null(), &mut db);
            basalt_connect(db, &mut conn);
            let state = basalt_query(conn, c"SELECT * FROM missing".as_ptr(), &mut result);
            assert_eq!(state, BasaltState::Error);
            assert!(!result.is_null());
            assert!(!basalt_result_error(result).is_null());
            assert_eq!(basalt_result_error_code(result), codes::QUERY_FAILED);
            basalt_destroy_result(&mut result);
            assert!(result.is_null());

            let state = basalt_query(conn, c"SELECT 1".as_ptr(), ptr::null_mut());
            assert_eq!(state, BasaltState::Success);

            basalt_disconnect(&mut conn);
            basalt_close(&mut db);
        }
    }
}
