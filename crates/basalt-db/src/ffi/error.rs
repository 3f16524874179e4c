//! Status codes and per-handle error storage for FFI.
//!
//! Every fallible function returns a [`BasaltState`]. Handles that can fail
//! (results, prepared statements, appenders, Arrow results) keep the message
//! of their last failure, readable through the matching `*_error` function
//! until the handle is destroyed.

use std::ffi::{c_char, CString};
use std::ptr;

use tracing::debug;

use crate::api::ApiError;

/// Outcome of a fallible FFI call.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BasaltState {
    /// The call succeeded.
    Success = 0,
    /// The call failed; see the handle's error accessor.
    Error = 1,
}

impl BasaltState {
    pub(crate) fn from_ok(ok: bool) -> Self {
        if ok {
            Self::Success
        } else {
            Self::Error
        }
    }
}

/// Convert a message to a C string, escaping interior NULs.
pub(crate) fn to_cstring(message: &str) -> CString {
    CString::new(message.replace('\0', "\\0")).unwrap_or_default()
}

/// Last error recorded on a handle, kept as a C string.
#[derive(Debug, Default)]
pub(crate) struct ErrorSlot {
    message: Option<CString>,
    code: i32,
}

impl ErrorSlot {
    pub(crate) fn with_error(err: &ApiError) -> Self {
        let mut slot = Self::default();
        slot.set(err);
        slot
    }

    pub(crate) fn set(&mut self, err: &ApiError) {
        debug!(code = err.code(), error = %err.message(), "FFI call failed");
        self.message = Some(to_cstring(err.message()));
        self.code = err.code();
    }

    pub(crate) fn clear(&mut self) {
        self.message = None;
        self.code = 0;
    }

    pub(crate) fn code(&self) -> i32 {
        self.code
    }

    /// Pointer to the message, or null if no error is recorded.
    pub(crate) fn as_ptr(&self) -> *const c_char {
        self.message.as_ref().map_or(ptr::null(), |m| m.as_ptr())
    }

    /// Record the outcome of `result` and turn it into a state.
    pub(crate) fn record<T>(&mut self, result: Result<T, ApiError>) -> BasaltState {
        match result {
            Ok(_) => {
                self.clear();
                BasaltState::Success
            }
            Err(e) => {
                self.set(&e);
                BasaltState::Error
            }
        }
    }
}
