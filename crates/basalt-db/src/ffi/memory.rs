//! FFI memory management functions.
//!
//! Strings and blobs handed out by value accessors come from the
//! process-wide [`SystemArena`](crate::arena::SystemArena) and must be
//! released with `basalt_free`.

use std::ffi::{c_char, c_void};
use std::ptr::{self, NonNull};

use crate::arena::{global_arena, Arena};

/// Allocate `size` bytes from the library arena.
///
/// Returns null if the allocation fails. Release with `basalt_free`.
#[no_mangle]
pub extern "C" fn basalt_malloc(size: usize) -> *mut c_void {
    global_arena()
        .allocate(size)
        .map_or(ptr::null_mut(), |p| p.as_ptr().cast())
}

/// Release memory returned by `basalt_malloc`, a varchar/blob accessor or
/// `basalt_open_ext`'s error string.
///
/// # Safety
///
/// `ptr` must be null or a pointer obtained from one of the functions above
/// that has not already been freed.
#[no_mangle]
pub unsafe extern "C" fn basalt_free(ptr: *mut c_void) {
    if let Some(ptr) = NonNull::new(ptr.cast::<u8>()) {
        // SAFETY: caller guarantees ptr came from the global arena.
        unsafe { global_arena().release(ptr) };
    }
}

/// Get the library version.
///
/// Returns a static NUL-terminated string that must NOT be freed.
#[no_mangle]
pub extern "C" fn basalt_library_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr().cast()
}

#[cfg(test)]
mod tests {
    use std::ffi::CStr;

    use super::*;

    #[test]
    fn test_free_null() {
        // SAFETY: null is accepted.
        unsafe { basalt_free(ptr::null_mut()) };
    }

    #[test]
    fn test_malloc_free() {
        let p = basalt_malloc(64);
        assert!(!p.is_null());
        assert_eq!(p as usize % crate::arena::BLOCK_ALIGN, 0);
        // SAFETY: p holds 64 writable bytes.
        unsafe { ptr::write_bytes(p.cast::<u8>(), 0xAB, 64) };
        // SAFETY: p came from basalt_malloc.
        unsafe { basalt_free(p) };
    }

    #[test]
    fn test_version() {
        let ptr = basalt_library_version();
        assert!(!ptr.is_null());
        // SAFETY: ptr points to a static string.
        let version = unsafe { CStr::from_ptr(ptr) }.to_str().unwrap();
        assert_eq!(version, env!("CARGO_PKG_VERSION"));
    }
}
