//! `libopenhmd` backend, bound at runtime with libloading.

use crate::backend::{Backend, RawDevice, Status};
use crate::ffi::{self, OhmdContext, OhmdDevice};
use crate::params::{FloatParam, IntParam, StringField};
use crate::{OpenHmdError, Result};
use libloading::Library;
use std::ffi::{c_char, CStr};
use std::os::raw::c_int;
use std::path::PathBuf;
use std::ptr::NonNull;

/// Library names tried, in order, when no explicit path is configured.
#[cfg(target_os = "linux")]
pub const DEFAULT_LIBRARY_NAMES: &[&str] = &["libopenhmd.so.0", "libopenhmd.so"];
#[cfg(target_os = "macos")]
pub const DEFAULT_LIBRARY_NAMES: &[&str] = &["libopenhmd.0.dylib", "libopenhmd.dylib"];
#[cfg(target_os = "windows")]
pub const DEFAULT_LIBRARY_NAMES: &[&str] = &["openhmd.dll", "libopenhmd.dll"];
#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
pub const DEFAULT_LIBRARY_NAMES: &[&str] = &["libopenhmd.so"];

/// Where to find `libopenhmd`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackendConfig {
    /// Explicit library path. When unset, [`DEFAULT_LIBRARY_NAMES`] are tried
    /// through the platform loader search path.
    pub library_path: Option<PathBuf>,
}

impl BackendConfig {
    /// Environment variable overriding the library location.
    pub const LIBRARY_ENV: &'static str = "OPENHMD_LIBRARY";

    /// Read configuration from the environment (`OPENHMD_LIBRARY`).
    pub fn from_env() -> Self {
        Self {
            library_path: read_env_path(Self::LIBRARY_ENV),
        }
    }

    pub fn with_library_path(path: impl Into<PathBuf>) -> Self {
        Self {
            library_path: Some(path.into()),
        }
    }

    /// Library paths to try, in order.
    pub fn candidates(&self) -> Vec<PathBuf> {
        match &self.library_path {
            Some(path) => vec![path.clone()],
            None => DEFAULT_LIBRARY_NAMES.iter().map(PathBuf::from).collect(),
        }
    }
}

fn read_env_path(name: &str) -> Option<PathBuf> {
    std::env::var_os(name)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

/// Resolved OpenHMD entry points. The function pointers stay valid for as
/// long as `_lib` is loaded.
struct OpenHmdLib {
    ctx_create: ffi::CtxCreateFn,
    ctx_destroy: ffi::CtxDestroyFn,
    ctx_get_error: ffi::CtxGetErrorFn,
    ctx_update: ffi::CtxUpdateFn,
    ctx_probe: ffi::CtxProbeFn,
    list_gets: ffi::ListGetsFn,
    list_open_device: ffi::ListOpenDeviceFn,
    close_device: ffi::CloseDeviceFn,
    device_getf: ffi::DeviceGetfFn,
    device_setf: ffi::DeviceSetfFn,
    device_geti: ffi::DeviceGetiFn,
    _lib: Library,
}

impl OpenHmdLib {
    fn load(config: &BackendConfig) -> Result<OpenHmdLib> {
        Self::load_from(config.candidates())
    }

    /// First candidate that loads and exports every OpenHMD entry point.
    fn load_from(candidates: Vec<PathBuf>) -> Result<OpenHmdLib> {
        let mut failures = Vec::new();
        for path in candidates {
            match unsafe { Library::new(&path) }.and_then(Self::resolve) {
                Ok(lib) => {
                    log::debug!("Loaded OpenHMD from {}", path.display());
                    return Ok(lib);
                }
                Err(e) => {
                    log::debug!("Skipping {}: {}", path.display(), e);
                    failures.push(format!("{}: {}", path.display(), e));
                }
            }
        }
        Err(OpenHmdError::BackendInit(format!(
            "could not load libopenhmd ({})",
            failures.join("; ")
        )))
    }

    fn resolve(lib: Library) -> std::result::Result<OpenHmdLib, libloading::Error> {
        // Each symbol is declared with the signature from openhmd.h. The
        // pointers are copied out of their `Symbol` guards before `lib` moves.
        let ctx_create = unsafe { *lib.get::<ffi::CtxCreateFn>(ffi::SYM_CTX_CREATE)? };
        let ctx_destroy = unsafe { *lib.get::<ffi::CtxDestroyFn>(ffi::SYM_CTX_DESTROY)? };
        let ctx_get_error = unsafe { *lib.get::<ffi::CtxGetErrorFn>(ffi::SYM_CTX_GET_ERROR)? };
        let ctx_update = unsafe { *lib.get::<ffi::CtxUpdateFn>(ffi::SYM_CTX_UPDATE)? };
        let ctx_probe = unsafe { *lib.get::<ffi::CtxProbeFn>(ffi::SYM_CTX_PROBE)? };
        let list_gets = unsafe { *lib.get::<ffi::ListGetsFn>(ffi::SYM_LIST_GETS)? };
        let list_open_device =
            unsafe { *lib.get::<ffi::ListOpenDeviceFn>(ffi::SYM_LIST_OPEN_DEVICE)? };
        let close_device = unsafe { *lib.get::<ffi::CloseDeviceFn>(ffi::SYM_CLOSE_DEVICE)? };
        let device_getf = unsafe { *lib.get::<ffi::DeviceGetfFn>(ffi::SYM_DEVICE_GETF)? };
        let device_setf = unsafe { *lib.get::<ffi::DeviceSetfFn>(ffi::SYM_DEVICE_SETF)? };
        let device_geti = unsafe { *lib.get::<ffi::DeviceGetiFn>(ffi::SYM_DEVICE_GETI)? };

        Ok(OpenHmdLib {
            ctx_create,
            ctx_destroy,
            ctx_get_error,
            ctx_update,
            ctx_probe,
            list_gets,
            list_open_device,
            close_device,
            device_getf,
            device_setf,
            device_geti,
            _lib: lib,
        })
    }
}

/// One `ohmd_context` from a dynamically loaded `libopenhmd`.
///
/// The context is destroyed when the backend is dropped. OpenHMD closes every
/// device still open on the context at that point.
pub struct NativeBackend {
    ctx: NonNull<OhmdContext>,
    lib: OpenHmdLib,
}

impl NativeBackend {
    /// Load `libopenhmd` and create a context.
    pub fn connect(config: &BackendConfig) -> Result<NativeBackend> {
        let lib = OpenHmdLib::load(config)?;
        let ctx = unsafe { (lib.ctx_create)() };
        let ctx = NonNull::new(ctx).ok_or_else(|| {
            OpenHmdError::BackendInit("ohmd_ctx_create returned NULL".into())
        })?;
        log::info!("Connected to OpenHMD");
        Ok(NativeBackend { ctx, lib })
    }

    fn device_ptr(device: RawDevice) -> *mut OhmdDevice {
        device.addr() as *mut OhmdDevice
    }
}

/// Copy a C string owned by OpenHMD. `None` for NULL.
///
/// # Safety
/// `ptr` must be NULL or point to a NUL terminated string that stays valid
/// for the duration of the call.
unsafe fn copy_c_str(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    Some(CStr::from_ptr(ptr).to_string_lossy().into_owned())
}

impl Backend for NativeBackend {
    fn name(&self) -> &str {
        "openhmd"
    }

    fn pump_events(&mut self) {
        unsafe { (self.lib.ctx_update)(self.ctx.as_ptr()) }
    }

    fn probe(&mut self) -> c_int {
        unsafe { (self.lib.ctx_probe)(self.ctx.as_ptr()) }
    }

    fn enum_string(&mut self, index: c_int, field: StringField) -> Option<String> {
        unsafe { copy_c_str((self.lib.list_gets)(self.ctx.as_ptr(), index, field.raw())) }
    }

    fn open_device(&mut self, index: c_int) -> Option<RawDevice> {
        let ptr = unsafe { (self.lib.list_open_device)(self.ctx.as_ptr(), index) };
        NonNull::new(ptr).map(|p| RawDevice::from_addr(p.as_ptr() as usize))
    }

    fn close_device(&mut self, device: RawDevice) -> Status {
        unsafe { (self.lib.close_device)(Self::device_ptr(device)) }
    }

    fn get_floats(&mut self, device: RawDevice, param: FloatParam, out: &mut [f32]) -> Status {
        // OpenHMD writes param.len() floats unconditionally.
        if out.len() < param.len() {
            return ffi::OHMD_S_INVALID_PARAMETER;
        }
        unsafe { (self.lib.device_getf)(Self::device_ptr(device), param.raw(), out.as_mut_ptr()) }
    }

    fn set_floats(&mut self, device: RawDevice, param: FloatParam, values: &[f32]) -> Status {
        if values.len() < param.len() {
            return ffi::OHMD_S_INVALID_PARAMETER;
        }
        unsafe { (self.lib.device_setf)(Self::device_ptr(device), param.raw(), values.as_ptr()) }
    }

    fn get_ints(&mut self, device: RawDevice, param: IntParam, out: &mut [i32]) -> Status {
        if out.len() < param.len() {
            return ffi::OHMD_S_INVALID_PARAMETER;
        }
        unsafe { (self.lib.device_geti)(Self::device_ptr(device), param.raw(), out.as_mut_ptr()) }
    }

    fn last_error(&self) -> Option<String> {
        unsafe { copy_c_str((self.lib.ctx_get_error)(self.ctx.as_ptr())) }.filter(|s| !s.is_empty())
    }
}

impl Drop for NativeBackend {
    fn drop(&mut self) {
        unsafe { (self.lib.ctx_destroy)(self.ctx.as_ptr()) };
        log::info!("Disconnected from OpenHMD");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_library_path_is_only_candidate() {
        let config = BackendConfig::with_library_path("/opt/openhmd/lib/libopenhmd.so");
        assert_eq!(
            config.candidates(),
            vec![PathBuf::from("/opt/openhmd/lib/libopenhmd.so")]
        );
    }

    #[test]
    fn test_default_candidates() {
        let config = BackendConfig::default();
        assert_eq!(config.candidates().len(), DEFAULT_LIBRARY_NAMES.len());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_library_without_symbols_falls_through() {
        // libc loads fine but exports no ohmd_* symbols.
        let candidates = vec![
            PathBuf::from("libc.so.6"),
            PathBuf::from("/nonexistent/libopenhmd-fallback.so"),
        ];
        match OpenHmdLib::load_from(candidates) {
            Err(OpenHmdError::BackendInit(msg)) => {
                assert!(msg.contains("libc.so.6"), "{}", msg);
                assert!(msg.contains("ohmd_ctx_create"), "{}", msg);
                assert!(msg.contains("libopenhmd-fallback.so"), "{}", msg);
            }
            Err(e) => panic!("unexpected error: {}", e),
            Ok(_) => panic!("libc is not OpenHMD"),
        }
    }

    #[test]
    fn test_missing_library_is_init_error() {
        let config = BackendConfig::with_library_path("/nonexistent/libopenhmd-missing.so");
        match NativeBackend::connect(&config) {
            Err(OpenHmdError::BackendInit(msg)) => {
                assert!(msg.contains("libopenhmd-missing.so"), "{}", msg)
            }
            Err(e) => panic!("unexpected error: {}", e),
            Ok(_) => panic!("connect should fail without the library"),
        }
    }
}
