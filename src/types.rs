/// Enumeration metadata for one probed device.
///
/// Strings are copied out of the backend, but they describe the enumeration
/// list as of a single probe. After the next `probe()` the index they were
/// read under may refer to a different device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Enumeration index in the probe this info was read from.
    pub index: usize,
    pub vendor: String,
    pub product: String,
    /// Driver specific path (hidraw node, serial port, "(none)" for dummies).
    pub path: String,
}

bitflags::bitflags! {
    /// Access mode of a device parameter.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Access: u8 {
        const READ  = 1 << 0;
        const WRITE = 1 << 1;
        const READ_WRITE = Self::READ.bits() | Self::WRITE.bits();
    }
}

/// Numeric kind of a device parameter's value vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamKind {
    /// Single precision in the backend, widened to `f64` at the API.
    Float,
    /// `c_int` in the backend, `i32` at the API.
    Int,
}
