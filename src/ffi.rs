//! C ABI for embedding engines.
//!
//! [`dxgl_init`] loads the configuration and starts logging; the
//! `dxgl_config_*` setters adjust the configuration for contexts created
//! afterwards. Every `dxgl_context_*` function takes the opaque pointer
//! returned by [`dxgl_context_create`]. Status codes: `0` success, `-1` failure (the
//! message is kept per thread and read with [`dxgl_last_error`]), `-2` null
//! context pointer. Panics are caught at the boundary and reported as
//! failures.

use std::cell::RefCell;
use std::ffi::{c_char, CStr};
use std::panic::{catch_unwind, AssertUnwindSafe};

use dxgl_wgl::{ContextCreationFlags, Profile};

use crate::backend::d3d11::{hwnd_from_isize, D3D11Backend};
use crate::config;
use crate::context::InteropContext;
use crate::error::{InteropError, InteropResult, ResultExt};
use crate::logging::{init_logging, LoggingOptions};
use crate::registry::LockPolicy;

pub const DXGL_OK: i32 = 0;
pub const DXGL_ERROR: i32 = -1;
pub const DXGL_NULL_CONTEXT: i32 = -2;

pub type DxglContext = InteropContext<D3D11Backend>;

/// Context-creation flags as laid out by C callers.
///
/// `profile`: 0 core, 1 compatibility, anything else lets the driver pick.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct DxglContextFlags {
    pub major_version: u32,
    pub minor_version: u32,
    pub profile: i32,
    pub forward_compatible: i32,
}

impl From<DxglContextFlags> for ContextCreationFlags {
    fn from(flags: DxglContextFlags) -> Self {
        let profile = match flags.profile {
            0 => Profile::Core,
            1 => Profile::Compat,
            _ => Profile::Any,
        };
        ContextCreationFlags::new(
            flags.major_version,
            flags.minor_version,
            profile,
            flags.forward_compatible != 0,
        )
    }
}

thread_local! {
    static LAST_ERROR: RefCell<Option<String>> = const { RefCell::new(None) };
}

fn set_last_error(message: String) {
    LAST_ERROR.with(|last| *last.borrow_mut() = Some(message));
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

/// Run `f` behind the panic boundary and turn its result into a status code.
fn guarded(call: &str, f: impl FnOnce() -> InteropResult<()>) -> i32 {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(())) => DXGL_OK,
        Ok(Err(e)) => {
            log::error!("[FFI] {} failed: {}", call, e);
            set_last_error(e.to_string());
            DXGL_ERROR
        }
        Err(payload) => {
            let message = format!("{} panicked: {}", call, panic_message(payload.as_ref()));
            log::error!("[FFI] {}", message);
            set_last_error(message);
            DXGL_ERROR
        }
    }
}

/// Like [`guarded`] for calls on an existing context.
fn with_context(
    call: &str,
    ctx: *mut DxglContext,
    f: impl FnOnce(&mut DxglContext) -> InteropResult<()>,
) -> i32 {
    // SAFETY: non-null pointers come from `dxgl_context_create` and stay
    // valid until `dxgl_context_destroy`.
    match unsafe { ctx.as_mut() } {
        Some(ctx) => guarded(call, || f(ctx)),
        None => {
            set_last_error(format!("{}: context pointer is null", call));
            DXGL_NULL_CONTEXT
        }
    }
}

/// Load the configuration file at `path` (if any) into the global
/// configuration, then install the logger it describes.
fn initialize(path: Option<&str>) -> InteropResult<()> {
    if let Some(path) = path {
        config::load_global(path)?;
    }
    let options = LoggingOptions::from_config(&config::current());
    let installed = init_logging(&options).with_context(|| {
        format!("Failed to open log directory {:?}", options.directory)
    })?;
    if !installed {
        log::debug!("[FFI] Logger already installed");
    }
    Ok(())
}

/// Load the JSON configuration at `config_path` and start logging.
///
/// Call once before creating contexts. A null path keeps the current
/// configuration and only starts logging. Calling it again reloads the
/// configuration; the logger is installed once.
///
/// # Safety
/// `config_path` must be null or a valid NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn dxgl_init(config_path: *const c_char) -> i32 {
    guarded("dxgl_init", || {
        let path = if config_path.is_null() {
            None
        } else {
            // SAFETY: non-null and NUL-terminated per the contract above.
            let path = unsafe { CStr::from_ptr(config_path) };
            Some(path.to_str().context("config path is not valid UTF-8")?)
        };
        initialize(path)
    })
}

/// Set the lock policy for contexts created afterwards. Non-zero `strict`
/// turns redundant lock/unlock calls into errors.
#[no_mangle]
pub extern "C" fn dxgl_config_set_lock_policy(strict: i32) -> i32 {
    guarded("dxgl_config_set_lock_policy", || {
        config::set_lock_policy(if strict != 0 {
            LockPolicy::Strict
        } else {
            LockPolicy::Warn
        });
        Ok(())
    })
}

/// Set the sync interval that new contexts start with.
#[no_mangle]
pub extern "C" fn dxgl_config_set_default_sync_interval(interval: u32) -> i32 {
    guarded("dxgl_config_set_default_sync_interval", || {
        config::set_default_sync_interval(interval);
        Ok(())
    })
}

/// Create a context presenting to window `hwnd`. Returns null on failure.
///
/// # Safety
/// `flags` must be null or point to a valid [`DxglContextFlags`]; null uses
/// the default flags.
#[no_mangle]
pub unsafe extern "C" fn dxgl_context_create(
    hwnd: isize,
    flags: *const DxglContextFlags,
) -> *mut DxglContext {
    let flags = unsafe { flags.as_ref() }
        .map(|flags| ContextCreationFlags::from(*flags))
        .unwrap_or_default();

    let mut created = None;
    let status = guarded("dxgl_context_create", || {
        let window = hwnd_from_isize(hwnd)?;
        created = Some(Box::new(DxglContext::new(window, &flags)?));
        Ok(())
    });

    match created {
        Some(ctx) if status == DXGL_OK => {
            log::info!("[FFI] Context created for window {:#x}", hwnd);
            Box::into_raw(ctx)
        }
        _ => std::ptr::null_mut(),
    }
}

/// # Safety
/// `ctx` must be null or a live pointer from [`dxgl_context_create`].
#[no_mangle]
pub unsafe extern "C" fn dxgl_context_make_current(ctx: *mut DxglContext) -> i32 {
    with_context("dxgl_context_make_current", ctx, |ctx| ctx.make_current())
}

/// # Safety
/// `ctx` must be null or a live pointer from [`dxgl_context_create`].
#[no_mangle]
pub unsafe extern "C" fn dxgl_context_set_sync_interval(ctx: *mut DxglContext, interval: u32) -> i32 {
    with_context("dxgl_context_set_sync_interval", ctx, |ctx| {
        ctx.set_sync_interval(interval)
    })
}

/// # Safety
/// `ctx` must be null or a live pointer from [`dxgl_context_create`].
#[no_mangle]
pub unsafe extern "C" fn dxgl_context_wait_for_signal(ctx: *mut DxglContext) -> i32 {
    with_context("dxgl_context_wait_for_signal", ctx, |ctx| {
        ctx.wait_for_swap_chain_signal()
    })
}

/// # Safety
/// `ctx` must be null or a live pointer from [`dxgl_context_create`].
#[no_mangle]
pub unsafe extern "C" fn dxgl_context_present(ctx: *mut DxglContext) -> i32 {
    with_context("dxgl_context_present", ctx, |ctx| ctx.swap_chain_present())
}

/// # Safety
/// `ctx` must be null or a live pointer from [`dxgl_context_create`].
#[no_mangle]
pub unsafe extern "C" fn dxgl_context_resize(ctx: *mut DxglContext, width: u32, height: u32) -> i32 {
    with_context("dxgl_context_resize", ctx, |ctx| {
        ctx.resize_swap_chain(width, height)
    })
}

/// # Safety
/// `ctx` must be null or a live pointer from [`dxgl_context_create`].
#[no_mangle]
pub unsafe extern "C" fn dxgl_context_allocate_shared_texture(
    ctx: *mut DxglContext,
    key: u32,
    type_hint: u32,
    format_hint: u32,
    width: u32,
    height: u32,
) -> i32 {
    with_context("dxgl_context_allocate_shared_texture", ctx, |ctx| {
        ctx.allocate_shared_texture(key, type_hint, format_hint, width, height)
            .map(|_| ())
    })
}

/// # Safety
/// `ctx` must be null or a live pointer from [`dxgl_context_create`].
#[no_mangle]
pub unsafe extern "C" fn dxgl_context_deallocate_shared_texture(ctx: *mut DxglContext, key: u32) -> i32 {
    with_context("dxgl_context_deallocate_shared_texture", ctx, |ctx| {
        ctx.deallocate_shared_texture(key)
    })
}

/// # Safety
/// `ctx` must be null or a live pointer from [`dxgl_context_create`].
#[no_mangle]
pub unsafe extern "C" fn dxgl_context_blit(ctx: *mut DxglContext, key: u32) -> i32 {
    with_context("dxgl_context_blit", ctx, |ctx| {
        ctx.blit_shared_texture_to_swap_chain(key)
    })
}

/// Close and free the context. The pointer is invalid afterwards.
///
/// # Safety
/// `ctx` must be null or a live pointer from [`dxgl_context_create`] that
/// has not been destroyed.
#[no_mangle]
pub unsafe extern "C" fn dxgl_context_destroy(ctx: *mut DxglContext) -> i32 {
    if ctx.is_null() {
        set_last_error("dxgl_context_destroy: context pointer is null".to_string());
        return DXGL_NULL_CONTEXT;
    }
    // SAFETY: ownership returns from `Box::into_raw` in `dxgl_context_create`.
    let mut ctx = unsafe { Box::from_raw(ctx) };
    let status = guarded("dxgl_context_destroy", || ctx.close());
    let dropped = catch_unwind(AssertUnwindSafe(move || drop(ctx)));
    if dropped.is_err() {
        set_last_error(InteropError::Other("context drop panicked".to_string()).to_string());
        return DXGL_ERROR;
    }
    status
}

/// Copy the calling thread's last error message into `buf` as a
/// NUL-terminated string, truncating to fit.
///
/// Returns the full message length in bytes without the terminator, or 0 if
/// there is no error.
///
/// # Safety
/// `buf` must be null or valid for `len` bytes of writes.
#[no_mangle]
pub unsafe extern "C" fn dxgl_last_error(buf: *mut c_char, len: usize) -> usize {
    LAST_ERROR.with(|last| {
        let last = last.borrow();
        let Some(message) = last.as_deref() else {
            return 0;
        };
        if !buf.is_null() && len > 0 {
            let copied = message.len().min(len - 1);
            // SAFETY: `copied + 1 <= len` bytes fit in the caller's buffer.
            unsafe {
                std::ptr::copy_nonoverlapping(message.as_ptr() as *const c_char, buf, copied);
                *buf.add(copied) = 0;
            }
        }
        message.len()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_from_c_layout() {
        let flags = ContextCreationFlags::from(DxglContextFlags {
            major_version: 4,
            minor_version: 6,
            profile: 1,
            forward_compatible: 0,
        });
        assert_eq!(flags, ContextCreationFlags::new(4, 6, Profile::Compat, false));

        let any = ContextCreationFlags::from(DxglContextFlags {
            major_version: 3,
            minor_version: 3,
            profile: 7,
            forward_compatible: 1,
        });
        assert_eq!(any.profile, Profile::Any);
        assert!(any.forward_compatible);
    }

    #[test]
    fn test_null_context_is_reported() {
        let status = unsafe { dxgl_context_present(std::ptr::null_mut()) };
        assert_eq!(status, DXGL_NULL_CONTEXT);

        let mut buf = [0 as c_char; 64];
        let len = unsafe { dxgl_last_error(buf.as_mut_ptr(), buf.len()) };
        let message = unsafe { std::ffi::CStr::from_ptr(buf.as_ptr()) };
        assert_eq!(len, message.to_bytes().len());
        assert!(message.to_str().unwrap().contains("dxgl_context_present"));
    }

    #[test]
    fn test_last_error_truncates() {
        set_last_error("0123456789".to_string());
        let mut buf = [0x7f as c_char; 4];
        let len = unsafe { dxgl_last_error(buf.as_mut_ptr(), buf.len()) };
        assert_eq!(len, 10);
        let message = unsafe { std::ffi::CStr::from_ptr(buf.as_ptr()) };
        assert_eq!(message.to_str().unwrap(), "012");
    }

    #[test]
    fn test_guarded_catches_panics() {
        let status = guarded("explode", || panic!("boom"));
        assert_eq!(status, DXGL_ERROR);
        let len = unsafe { dxgl_last_error(std::ptr::null_mut(), 0) };
        assert!(len > 0);
        LAST_ERROR.with(|last| {
            assert!(last.borrow().as_deref().unwrap().contains("boom"));
        });
    }

    #[test]
    fn test_init_loads_config_and_starts_logging() {
        let _guard = config::GLOBAL_CONFIG_TEST_LOCK.lock();
        let saved = config::current();

        let dir = std::env::temp_dir().join(format!("dxgl_ffi_init_{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("interop.json");
        std::fs::write(
            &path,
            r#"{"lockPolicy":"STRICT","defaultSyncInterval":0,"logLevel":"debug"}"#,
        )
        .unwrap();
        let c_path = std::ffi::CString::new(path.to_str().unwrap()).unwrap();

        assert_eq!(unsafe { dxgl_init(c_path.as_ptr()) }, DXGL_OK);
        let loaded = config::current();
        assert_eq!(loaded.lock_policy, LockPolicy::Strict);
        assert_eq!(loaded.default_sync_interval, 0);
        assert_eq!(loaded.log_level.as_deref(), Some("debug"));
        assert!(log::log_enabled!(log::Level::Warn));

        config::set_config(saved).unwrap();
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_init_reports_missing_config() {
        let _guard = config::GLOBAL_CONFIG_TEST_LOCK.lock();
        let missing = std::ffi::CString::new("Z:\\no\\such\\dxgl.json").unwrap();
        assert_eq!(unsafe { dxgl_init(missing.as_ptr()) }, DXGL_ERROR);
        assert!(unsafe { dxgl_last_error(std::ptr::null_mut(), 0) } > 0);
    }

    #[test]
    fn test_init_rejects_non_utf8_path() {
        let path = [0xffu8, 0xfe, 0];
        let status = unsafe { dxgl_init(path.as_ptr() as *const c_char) };
        assert_eq!(status, DXGL_ERROR);
        LAST_ERROR.with(|last| {
            assert!(last.borrow().as_deref().unwrap().contains("not valid UTF-8"));
        });
    }

    #[test]
    fn test_config_setters() {
        let _guard = config::GLOBAL_CONFIG_TEST_LOCK.lock();
        let saved = config::current();

        assert_eq!(dxgl_config_set_lock_policy(1), DXGL_OK);
        assert_eq!(config::get_lock_policy(), LockPolicy::Strict);
        assert_eq!(dxgl_config_set_lock_policy(0), DXGL_OK);
        assert_eq!(config::get_lock_policy(), LockPolicy::Warn);
        assert_eq!(dxgl_config_set_default_sync_interval(3), DXGL_OK);
        assert_eq!(config::get_default_sync_interval(), 3);

        config::set_config(saved).unwrap();
    }

    #[test]
    fn test_create_rejects_null_window() {
        let ctx = unsafe { dxgl_context_create(0, std::ptr::null()) };
        assert!(ctx.is_null());
        LAST_ERROR.with(|last| {
            assert!(last.borrow().as_deref().unwrap().contains("null"));
        });
    }
}
