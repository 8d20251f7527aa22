use crate::params::{FloatParam, IntParam, StringField};
use std::os::raw::c_int;

/// `ohmd_status` code returned by device level backend calls.
pub type Status = c_int;

/// Opaque device token handed out by a [`Backend`].
///
/// Only the backend that issued it can interpret it. For the native backend
/// it is the address of an `ohmd_device`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawDevice(usize);

impl RawDevice {
    pub fn from_addr(addr: usize) -> Self {
        RawDevice(addr)
    }

    pub fn addr(self) -> usize {
        self.0
    }
}

/// The device backend: one driver connection.
///
/// Connecting happens in the implementor's constructor and disconnecting in
/// its `Drop`. The [`crate::Context`] owning a backend drops it exactly once.
///
/// Device level calls report success as [`crate::ffi::OHMD_S_OK`]. Callers
/// guarantee that buffers passed to `get_floats`, `set_floats` and `get_ints`
/// are exactly `param.len()` long.
pub trait Backend {
    /// Short name for log messages.
    fn name(&self) -> &str;

    /// Process pending driver events (pose updates, hot-plug).
    fn pump_events(&mut self);

    /// Rebuild the enumeration list and return its length.
    fn probe(&mut self) -> c_int;

    /// Enumeration string for `index` in the latest probe.
    fn enum_string(&mut self, index: c_int, field: StringField) -> Option<String>;

    /// Open the device at `index` in the latest probe.
    fn open_device(&mut self, index: c_int) -> Option<RawDevice>;

    fn close_device(&mut self, device: RawDevice) -> Status;

    fn get_floats(&mut self, device: RawDevice, param: FloatParam, out: &mut [f32]) -> Status;

    fn set_floats(&mut self, device: RawDevice, param: FloatParam, values: &[f32]) -> Status;

    fn get_ints(&mut self, device: RawDevice, param: IntParam, out: &mut [i32]) -> Status;

    /// Current error text of the connection. `None` when there is no error;
    /// an empty message is reported as `None` as well.
    fn last_error(&self) -> Option<String>;
}
