//! In-process simulated backend.
//!
//! Behaves like OpenHMD's dummy driver: a fixed set of "plugged in" devices
//! with plausible geometry, a head rotation that turns a little on every
//! event pump, and per-call error state (or, with
//! [`SimulatedBackend::with_sticky_errors`], libopenhmd's error string that
//! stays set until the next failure overwrites it). A [`SimHandle`] shares the state so
//! tests can count backend calls, hot-plug devices and inject failures after
//! the backend has been handed to a [`crate::Context`].

use crate::backend::{Backend, RawDevice, Status};
use crate::ffi::{OHMD_S_INVALID_PARAMETER, OHMD_S_OK, OHMD_S_UNKNOWN_ERROR, OHMD_S_UNSUPPORTED};
use crate::params::{FloatParam, IntParam, StringField};
use std::cell::RefCell;
use std::collections::HashMap;
use std::os::raw::c_int;
use std::rc::Rc;

/// Yaw added to the simulated head rotation per `pump_events`, in radians.
pub const YAW_STEP: f32 = 0.01;

/// Static description of a simulated device.
#[derive(Debug, Clone, PartialEq)]
pub struct SimDevice {
    pub vendor: String,
    pub product: String,
    pub path: String,
    /// `[horizontal, vertical]` in pixels.
    pub resolution: [i32; 2],
    /// `[horizontal, vertical]` physical screen size.
    pub screen_size: [f32; 2],
    pub lens_separation: f32,
    pub lens_vertical_position: f32,
    pub fov: f32,
    pub ipd: f32,
    pub znear: f32,
    pub zfar: f32,
    pub distortion_k: [f32; 6],
}

impl SimDevice {
    /// A generic 1280x800 HMD, like OpenHMD's dummy driver.
    pub fn dummy() -> Self {
        Self {
            vendor: "OpenHMD".into(),
            product: "Dummy Device".into(),
            path: "(none)".into(),
            resolution: [1280, 800],
            screen_size: [0.149_76, 0.093_6],
            lens_separation: 0.063_5,
            lens_vertical_position: 0.046_8,
            fov: 1.570_796_4,
            ipd: 0.061,
            znear: 0.1,
            zfar: 1000.0,
            distortion_k: [0.0, 0.0, 0.0, 1.0, 0.0, 0.0],
        }
    }

    pub fn named(vendor: &str, product: &str, path: &str) -> Self {
        Self {
            vendor: vendor.into(),
            product: product.into(),
            path: path.into(),
            ..Self::dummy()
        }
    }

    fn aspect_ratio(&self) -> f32 {
        (self.screen_size[0] / 2.0) / self.screen_size[1]
    }

    fn string(&self, field: StringField) -> &str {
        match field {
            StringField::Vendor => &self.vendor,
            StringField::Product => &self.product,
            StringField::Path => &self.path,
        }
    }
}

/// Number of backend calls made, per operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub pump_events: u32,
    pub probe: u32,
    pub enum_string: u32,
    pub open_device: u32,
    pub close_device: u32,
    pub get_floats: u32,
    pub set_floats: u32,
    pub get_ints: u32,
    pub disconnect: u32,
}

impl CallCounts {
    /// Calls that touched an open device handle.
    pub fn device_calls(&self) -> u32 {
        self.close_device + self.get_floats + self.set_floats + self.get_ints
    }
}

struct OpenSim {
    slot: usize,
    /// Per-handle copy; writable parameters change only this handle.
    device: SimDevice,
}

#[derive(Default)]
struct SimState {
    plugged: Vec<Option<SimDevice>>,
    enumerated: Vec<usize>,
    open: HashMap<usize, OpenSim>,
    next_handle: usize,
    yaw: f32,
    error: Option<String>,
    sticky_errors: bool,
    /// Injected failure: calls left to skip, then the message to fail with.
    fail_at: Option<(u32, String)>,
    calls: CallCounts,
}

impl SimState {
    /// Start a backend call: clear the error (unless sticky) and consume an
    /// injected failure.
    fn begin(&mut self) -> bool {
        if !self.sticky_errors {
            self.error = None;
        }
        match self.fail_at.take() {
            Some((0, msg)) => {
                self.error = Some(msg);
                false
            }
            Some((skip, msg)) => {
                self.fail_at = Some((skip - 1, msg));
                true
            }
            None => true,
        }
    }

    fn fail(&mut self, msg: String, status: Status) -> Status {
        self.error = Some(msg);
        status
    }

    fn enumerated_device(&self, index: c_int) -> Option<(usize, &SimDevice)> {
        let slot = *usize::try_from(index)
            .ok()
            .and_then(|i| self.enumerated.get(i))?;
        self.plugged[slot].as_ref().map(|d| (slot, d))
    }

    /// Look up an open handle whose device is still plugged in.
    fn live_handle(&mut self, device: RawDevice) -> std::result::Result<&mut OpenSim, Status> {
        let Some(open) = self.open.get(&device.addr()) else {
            self.error = Some("invalid device handle".into());
            return Err(OHMD_S_INVALID_PARAMETER);
        };
        if self.plugged[open.slot].is_none() {
            self.error = Some("device disconnected".into());
            return Err(OHMD_S_UNKNOWN_ERROR);
        }
        match self.open.get_mut(&device.addr()) {
            Some(open) => Ok(open),
            None => Err(OHMD_S_INVALID_PARAMETER),
        }
    }
}

/// Simulated OpenHMD connection. See the module docs.
pub struct SimulatedBackend {
    state: Rc<RefCell<SimState>>,
}

impl SimulatedBackend {
    pub fn new(devices: Vec<SimDevice>) -> Self {
        let state = SimState {
            plugged: devices.into_iter().map(Some).collect(),
            next_handle: 1,
            ..SimState::default()
        };
        Self {
            state: Rc::new(RefCell::new(state)),
        }
    }

    /// A backend with one dummy device plugged in.
    pub fn with_dummy() -> Self {
        Self::new(vec![SimDevice::dummy()])
    }

    /// A backend with nothing plugged in.
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Keep the error text across calls, the way libopenhmd does.
    pub fn with_sticky_errors(self) -> Self {
        self.state.borrow_mut().sticky_errors = true;
        self
    }

    /// Shared control handle for inspecting and steering this backend.
    pub fn handle(&self) -> SimHandle {
        SimHandle {
            state: Rc::clone(&self.state),
        }
    }
}

impl Backend for SimulatedBackend {
    fn name(&self) -> &str {
        "simulated"
    }

    fn pump_events(&mut self) {
        let mut st = self.state.borrow_mut();
        st.calls.pump_events += 1;
        if st.begin() {
            st.yaw = (st.yaw + YAW_STEP) % std::f32::consts::TAU;
        }
    }

    fn probe(&mut self) -> c_int {
        let mut st = self.state.borrow_mut();
        st.calls.probe += 1;
        st.enumerated.clear();
        if !st.begin() {
            return 0;
        }
        let slots: Vec<usize> = st
            .plugged
            .iter()
            .enumerate()
            .filter_map(|(slot, d)| d.as_ref().map(|_| slot))
            .collect();
        st.enumerated = slots;
        st.enumerated.len() as c_int
    }

    fn enum_string(&mut self, index: c_int, field: StringField) -> Option<String> {
        let mut st = self.state.borrow_mut();
        st.calls.enum_string += 1;
        if !st.begin() {
            return None;
        }
        match st.enumerated_device(index) {
            Some((_, device)) => Some(device.string(field).to_string()),
            None => {
                st.error = Some(format!("no device with index: {}", index));
                None
            }
        }
    }

    fn open_device(&mut self, index: c_int) -> Option<RawDevice> {
        let mut st = self.state.borrow_mut();
        st.calls.open_device += 1;
        if !st.begin() {
            return None;
        }
        let Some((slot, device)) = st.enumerated_device(index) else {
            st.error = Some(format!("no device with index: {}", index));
            return None;
        };
        let device = device.clone();
        let handle = st.next_handle;
        st.next_handle += 1;
        st.open.insert(handle, OpenSim { slot, device });
        Some(RawDevice::from_addr(handle))
    }

    fn close_device(&mut self, device: RawDevice) -> Status {
        let mut st = self.state.borrow_mut();
        st.calls.close_device += 1;
        if !st.begin() {
            return OHMD_S_UNKNOWN_ERROR;
        }
        match st.open.remove(&device.addr()) {
            Some(_) => OHMD_S_OK,
            None => st.fail("invalid device handle".into(), OHMD_S_INVALID_PARAMETER),
        }
    }

    fn get_floats(&mut self, device: RawDevice, param: FloatParam, out: &mut [f32]) -> Status {
        let mut st = self.state.borrow_mut();
        st.calls.get_floats += 1;
        if !st.begin() {
            return OHMD_S_UNKNOWN_ERROR;
        }
        if out.len() != param.len() {
            return st.fail(
                format!("buffer of {} for {} (needs {})", out.len(), param, param.len()),
                OHMD_S_INVALID_PARAMETER,
            );
        }
        let yaw = st.yaw;
        let values = match st.live_handle(device) {
            Ok(open) => float_values(&open.device, yaw, param),
            Err(status) => return status,
        };
        out.copy_from_slice(&values);
        OHMD_S_OK
    }

    fn set_floats(&mut self, device: RawDevice, param: FloatParam, values: &[f32]) -> Status {
        let mut st = self.state.borrow_mut();
        st.calls.set_floats += 1;
        if !st.begin() {
            return OHMD_S_UNKNOWN_ERROR;
        }
        if values.len() != param.len() {
            return st.fail(
                format!("buffer of {} for {} (needs {})", values.len(), param, param.len()),
                OHMD_S_INVALID_PARAMETER,
            );
        }
        let open = match st.live_handle(device) {
            Ok(open) => open,
            Err(status) => return status,
        };
        match param {
            FloatParam::EyeIpd => open.device.ipd = values[0],
            FloatParam::ProjectionZfar => open.device.zfar = values[0],
            FloatParam::ProjectionZnear => open.device.znear = values[0],
            _ => return st.fail(format!("invalid type given to setf: {}", param), OHMD_S_UNSUPPORTED),
        }
        OHMD_S_OK
    }

    fn get_ints(&mut self, device: RawDevice, param: IntParam, out: &mut [i32]) -> Status {
        let mut st = self.state.borrow_mut();
        st.calls.get_ints += 1;
        if !st.begin() {
            return OHMD_S_UNKNOWN_ERROR;
        }
        if out.len() != param.len() {
            return st.fail(
                format!("buffer of {} for {} (needs {})", out.len(), param, param.len()),
                OHMD_S_INVALID_PARAMETER,
            );
        }
        let resolution = match st.live_handle(device) {
            Ok(open) => open.device.resolution,
            Err(status) => return status,
        };
        out[0] = match param {
            IntParam::ScreenHorizontalResolution => resolution[0],
            IntParam::ScreenVerticalResolution => resolution[1],
        };
        OHMD_S_OK
    }

    fn last_error(&self) -> Option<String> {
        self.state.borrow().error.clone().filter(|s| !s.is_empty())
    }
}

impl Drop for SimulatedBackend {
    fn drop(&mut self) {
        let mut st = self.state.borrow_mut();
        st.calls.disconnect += 1;
        st.open.clear();
        st.enumerated.clear();
    }
}

fn float_values(device: &SimDevice, yaw: f32, param: FloatParam) -> Vec<f32> {
    match param {
        FloatParam::RotationQuat => {
            let half = yaw / 2.0;
            vec![0.0, half.sin(), 0.0, half.cos()]
        }
        FloatParam::LeftEyeGlModelviewMatrix => eye_translation(device.ipd / 2.0),
        FloatParam::RightEyeGlModelviewMatrix => eye_translation(-device.ipd / 2.0),
        FloatParam::LeftEyeGlProjectionMatrix | FloatParam::RightEyeGlProjectionMatrix => {
            perspective(device.fov, device.aspect_ratio(), device.znear, device.zfar)
        }
        FloatParam::PositionVector => vec![0.0; 3],
        FloatParam::ScreenHorizontalSize => vec![device.screen_size[0]],
        FloatParam::ScreenVerticalSize => vec![device.screen_size[1]],
        FloatParam::LensHorizontalSeparation => vec![device.lens_separation],
        FloatParam::LensVerticalPosition => vec![device.lens_vertical_position],
        FloatParam::LeftEyeFov | FloatParam::RightEyeFov => vec![device.fov],
        FloatParam::LeftEyeAspectRatio | FloatParam::RightEyeAspectRatio => {
            vec![device.aspect_ratio()]
        }
        FloatParam::EyeIpd => vec![device.ipd],
        FloatParam::ProjectionZfar => vec![device.zfar],
        FloatParam::ProjectionZnear => vec![device.znear],
        FloatParam::DistortionK => device.distortion_k.to_vec(),
    }
}

/// Column-major translation along x.
fn eye_translation(x: f32) -> Vec<f32> {
    let mut m = identity();
    m[12] = x;
    m
}

fn identity() -> Vec<f32> {
    let mut m = vec![0.0; 16];
    for i in 0..4 {
        m[i * 5] = 1.0;
    }
    m
}

/// Column-major OpenGL perspective projection.
fn perspective(fov: f32, aspect: f32, znear: f32, zfar: f32) -> Vec<f32> {
    let f = 1.0 / (fov / 2.0).tan();
    let mut m = vec![0.0; 16];
    m[0] = f / aspect;
    m[5] = f;
    m[10] = (zfar + znear) / (znear - zfar);
    m[11] = -1.0;
    m[14] = 2.0 * zfar * znear / (znear - zfar);
    m
}

/// Control handle sharing state with a [`SimulatedBackend`].
///
/// Stays usable after the backend itself is dropped, so tests can check the
/// teardown count.
#[derive(Clone)]
pub struct SimHandle {
    state: Rc<RefCell<SimState>>,
}

impl SimHandle {
    pub fn calls(&self) -> CallCounts {
        self.state.borrow().calls
    }

    /// Plug in a device; it shows up on the next probe. Returns its slot.
    pub fn plug(&self, device: SimDevice) -> usize {
        let mut st = self.state.borrow_mut();
        st.plugged.push(Some(device));
        st.plugged.len() - 1
    }

    /// Unplug the device in `slot`. Open handles to it start failing.
    pub fn unplug(&self, slot: usize) {
        if let Some(entry) = self.state.borrow_mut().plugged.get_mut(slot) {
            *entry = None;
        }
    }

    /// Make the next backend call fail with `message`.
    pub fn fail_next(&self, message: &str) {
        self.fail_call(0, message);
    }

    /// Let `skip` backend calls succeed, then fail the one after with `message`.
    pub fn fail_call(&self, skip: u32, message: &str) {
        self.state.borrow_mut().fail_at = Some((skip, message.to_string()));
    }

    /// Number of device handles currently open in the backend.
    pub fn open_handles(&self) -> usize {
        self.state.borrow().open.len()
    }

    /// Current simulated head yaw, in radians.
    pub fn yaw(&self) -> f32 {
        self.state.borrow().yaw
    }
}
