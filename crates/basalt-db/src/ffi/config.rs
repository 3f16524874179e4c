//! FFI configuration functions.

use std::ffi::{c_char, CString};
use std::sync::OnceLock;

use tracing::debug;

use super::error::{to_cstring, BasaltState};
use super::{put_handle, str_arg, take_handle};
use crate::config::{config_count, config_flag, Config};

/// Opaque configuration handle.
///
/// Create with `basalt_create_config()`, free with `basalt_destroy_config()`.
/// Opening a database copies the configuration; the handle stays owned by
/// the caller.
pub struct BasaltConfig {
    pub(crate) inner: Config,
}

/// Catalog names and descriptions as static C strings.
fn catalog_cstrings() -> &'static [(CString, CString)] {
    static CATALOG: OnceLock<Vec<(CString, CString)>> = OnceLock::new();
    CATALOG.get_or_init(|| {
        (0..config_count())
            .filter_map(config_flag)
            .map(|o| (to_cstring(o.name), to_cstring(o.description)))
            .collect()
    })
}

/// Create a configuration with default values.
///
/// # Safety
///
/// `out` must be a valid pointer.
#[no_mangle]
pub unsafe extern "C" fn basalt_create_config(out: *mut *mut BasaltConfig) -> BasaltState {
    if out.is_null() {
        return BasaltState::Error;
    }
    // SAFETY: out is non-null (checked above)
    unsafe {
        put_handle(
            out,
            BasaltConfig {
                inner: Config::default(),
            },
        );
    }
    BasaltState::Success
}

/// Number of options in the catalog.
#[no_mangle]
pub extern "C" fn basalt_config_count() -> usize {
    config_count()
}

/// Name and description of the catalog option at `index`.
///
/// The strings are static and must not be freed. Fails without touching
/// the out-parameters when `index` is out of range.
///
/// # Safety
///
/// `out_name` and `out_description` must each be null or a valid pointer.
#[no_mangle]
pub unsafe extern "C" fn basalt_get_config_flag(
    index: usize,
    out_name: *mut *const c_char,
    out_description: *mut *const c_char,
) -> BasaltState {
    let Some((name, description)) = catalog_cstrings().get(index) else {
        return BasaltState::Error;
    };
    if !out_name.is_null() {
        // SAFETY: out_name is non-null (checked)
        unsafe { *out_name = name.as_ptr() };
    }
    if !out_description.is_null() {
        // SAFETY: out_description is non-null (checked)
        unsafe { *out_description = description.as_ptr() };
    }
    BasaltState::Success
}

/// Set an option. Unknown names and invalid values fail and leave the
/// configuration unchanged.
///
/// # Safety
///
/// * `config` must be a valid configuration handle
/// * `name` and `option` must be valid NUL-terminated strings
#[no_mangle]
pub unsafe extern "C" fn basalt_set_config(
    config: *mut BasaltConfig,
    name: *const c_char,
    option: *const c_char,
) -> BasaltState {
    if config.is_null() {
        return BasaltState::Error;
    }
    // SAFETY: caller guarantees valid C strings or null
    let args = unsafe { (str_arg(name, "name"), str_arg(option, "option")) };
    let (Ok(name), Ok(option)) = args else {
        return BasaltState::Error;
    };
    // SAFETY: config is non-null (checked above)
    let config = unsafe { &mut (*config).inner };
    match config.set(name, option) {
        Ok(()) => BasaltState::Success,
        Err(e) => {
            debug!(error = %e, "Config option rejected");
            BasaltState::Error
        }
    }
}

/// Destroy a configuration and null the handle. Null is a no-op.
///
/// # Safety
///
/// `config` must be null or point to null or a handle from
/// `basalt_create_config()`.
#[no_mangle]
pub unsafe extern "C" fn basalt_destroy_config(config: *mut *mut BasaltConfig) {
    // SAFETY: forwarded from the caller
    drop(unsafe { take_handle(config) });
}

#[cfg(test)]
mod tests {
    use std::ffi::CStr;
    use std::ptr;

    use super::*;

    #[test]
    fn test_enumerate_catalog() {
        let count = basalt_config_count();
        assert!(count > 0);
        for i in 0..count {
            let mut name = ptr::null();
            let mut description = ptr::null();
            // SAFETY: out-pointers are valid
            let state = unsafe { basalt_get_config_flag(i, &mut name, &mut description) };
            assert_eq!(state, BasaltState::Success);
            assert!(!name.is_null());
            assert!(!description.is_null());
        }

        let mut name = ptr::null();
        // SAFETY: out-pointer is valid
        let state = unsafe { basalt_get_config_flag(count, &mut name, ptr::null_mut()) };
        assert_eq!(state, BasaltState::Error);
        assert!(name.is_null());
    }

    #[test]
    fn test_set_unknown_option_leaves_catalog() {
        let before = basalt_config_count();
        let mut config = ptr::null_mut();
        // SAFETY: valid out-pointer and C strings throughout
        unsafe {
            assert_eq!(basalt_create_config(&mut config), BasaltState::Success);
            let state = basalt_set_config(config, c"no_such_option".as_ptr(), c"1".as_ptr());
            assert_eq!(state, BasaltState::Error);
            let state = basalt_set_config(config, c"threads".as_ptr(), c"4".as_ptr());
            assert_eq!(state, BasaltState::Success);
            assert_eq!((*config).inner.threads, Some(4));
            basalt_destroy_config(&mut config);
        }
        assert!(config.is_null());
        assert_eq!(basalt_config_count(), before);

        let mut name = ptr::null();
        // SAFETY: out-pointer is valid
        unsafe { basalt_get_config_flag(0, &mut name, ptr::null_mut()) };
        // SAFETY: static string
        assert_eq!(unsafe { CStr::from_ptr(name) }.to_str().unwrap(), "access_mode");
    }
}
