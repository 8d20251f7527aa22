//! Raw OpenHMD C ABI.
//!
//! Mirrors the parts of `openhmd.h` this crate calls. Symbols are resolved at
//! runtime by [`crate::native`], so nothing here links against `libopenhmd`.

use std::ffi::c_char;
use std::os::raw::{c_float, c_int};

/// Opaque `ohmd_context`.
#[repr(C)]
pub struct OhmdContext {
    _private: [u8; 0],
}

/// Opaque `ohmd_device`.
#[repr(C)]
pub struct OhmdDevice {
    _private: [u8; 0],
}

// -- ohmd_status --
pub const OHMD_S_OK: c_int = 0;
pub const OHMD_S_UNKNOWN_ERROR: c_int = -1;
pub const OHMD_S_INVALID_PARAMETER: c_int = -2;
pub const OHMD_S_UNSUPPORTED: c_int = -3;
pub const OHMD_S_INVALID_OPERATION: c_int = -4;

// -- exported symbol names --
pub const SYM_CTX_CREATE: &[u8] = b"ohmd_ctx_create\0";
pub const SYM_CTX_DESTROY: &[u8] = b"ohmd_ctx_destroy\0";
pub const SYM_CTX_GET_ERROR: &[u8] = b"ohmd_ctx_get_error\0";
pub const SYM_CTX_UPDATE: &[u8] = b"ohmd_ctx_update\0";
pub const SYM_CTX_PROBE: &[u8] = b"ohmd_ctx_probe\0";
pub const SYM_LIST_GETS: &[u8] = b"ohmd_list_gets\0";
pub const SYM_LIST_OPEN_DEVICE: &[u8] = b"ohmd_list_open_device\0";
pub const SYM_CLOSE_DEVICE: &[u8] = b"ohmd_close_device\0";
pub const SYM_DEVICE_GETF: &[u8] = b"ohmd_device_getf\0";
pub const SYM_DEVICE_SETF: &[u8] = b"ohmd_device_setf\0";
pub const SYM_DEVICE_GETI: &[u8] = b"ohmd_device_geti\0";

pub type CtxCreateFn = unsafe extern "C" fn() -> *mut OhmdContext;
pub type CtxDestroyFn = unsafe extern "C" fn(ctx: *mut OhmdContext);
pub type CtxGetErrorFn = unsafe extern "C" fn(ctx: *mut OhmdContext) -> *const c_char;
pub type CtxUpdateFn = unsafe extern "C" fn(ctx: *mut OhmdContext);
pub type CtxProbeFn = unsafe extern "C" fn(ctx: *mut OhmdContext) -> c_int;
pub type ListGetsFn =
    unsafe extern "C" fn(ctx: *mut OhmdContext, index: c_int, field: c_int) -> *const c_char;
pub type ListOpenDeviceFn =
    unsafe extern "C" fn(ctx: *mut OhmdContext, index: c_int) -> *mut OhmdDevice;
pub type CloseDeviceFn = unsafe extern "C" fn(device: *mut OhmdDevice) -> c_int;
pub type DeviceGetfFn =
    unsafe extern "C" fn(device: *mut OhmdDevice, param: c_int, out: *mut c_float) -> c_int;
pub type DeviceSetfFn =
    unsafe extern "C" fn(device: *mut OhmdDevice, param: c_int, values: *const c_float) -> c_int;
pub type DeviceGetiFn =
    unsafe extern "C" fn(device: *mut OhmdDevice, param: c_int, out: *mut c_int) -> c_int;

/// Human readable name of an `ohmd_status` code.
pub fn status_name(status: c_int) -> &'static str {
    match status {
        OHMD_S_OK => "ok",
        OHMD_S_UNKNOWN_ERROR => "unknown error",
        OHMD_S_INVALID_PARAMETER => "invalid parameter",
        OHMD_S_UNSUPPORTED => "unsupported",
        OHMD_S_INVALID_OPERATION => "invalid operation",
        _ => "unrecognized status",
    }
}
