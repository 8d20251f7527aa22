use crate::backend::RawDevice;
use crate::context::Shared;
use crate::ffi::OHMD_S_OK;
use crate::params::{self, FloatParam, IntParam, MAX_FLOAT_LEN, MAX_INT_LEN};
use crate::{OpenHmdError, Result};
use std::rc::{Rc, Weak};

/// An opened tracking device.
///
/// Obtained from [`crate::Context::list_open_device`]. Holds a checked,
/// non-owning reference to its context: once the context is destroyed every
/// call returns [`OpenHmdError::ContextDestroyed`] without touching the
/// backend. The backend handle is closed on drop or by [`Device::close`].
pub struct Device {
    ctx: Weak<Shared>,
    id: u64,
    raw: RawDevice,
    index: usize,
    generation: u64,
}

impl Device {
    pub(crate) fn new(
        ctx: Weak<Shared>,
        id: u64,
        raw: RawDevice,
        index: usize,
        generation: u64,
    ) -> Device {
        Device {
            ctx,
            id,
            raw,
            index,
            generation,
        }
    }

    fn context(&self) -> Result<Rc<Shared>> {
        self.ctx.upgrade().ok_or(OpenHmdError::ContextDestroyed)
    }

    /// Read the current value of a float parameter.
    ///
    /// Returns exactly `param.len()` values, in the order the backend defines
    /// (see [`FloatParam`]). The backend is single precision; values are
    /// widened to `f64`.
    pub fn get_floats(&self, param: FloatParam) -> Result<Vec<f64>> {
        let ctx = self.context()?;
        let mut scratch = [0f32; MAX_FLOAT_LEN];
        let buf = &mut scratch[..param.len()];

        let status = ctx.with_backend(|b| b.get_floats(self.raw, param, buf))?;
        if status != OHMD_S_OK {
            return Err(ctx.status_error("get_floats", status));
        }
        Ok(params::widen(buf))
    }

    /// Write a float parameter.
    ///
    /// Only read-write parameters are accepted, and `values` must hold at
    /// least `param.len()` elements; extra elements are ignored. Values are
    /// narrowed to `f32` before they reach the backend.
    pub fn set_floats(&self, param: FloatParam, values: &[f64]) -> Result<()> {
        let ctx = self.context()?;
        let n = param.len();
        if !param.is_writable() {
            return Err(ctx.record(OpenHmdError::Precondition(format!(
                "{} is read-only",
                param
            ))));
        }
        if values.len() < n {
            return Err(ctx.record(OpenHmdError::Precondition(format!(
                "{} needs {} value(s), got {}",
                param,
                n,
                values.len()
            ))));
        }

        let mut scratch = [0f32; MAX_FLOAT_LEN];
        let buf = &mut scratch[..n];
        params::narrow(&values[..n], buf);

        let status = ctx.with_backend(|b| b.set_floats(self.raw, param, buf))?;
        if status != OHMD_S_OK {
            return Err(ctx.status_error("set_floats", status));
        }
        Ok(())
    }

    /// Read the current value of an int parameter; `param.len()` values.
    pub fn get_ints(&self, param: IntParam) -> Result<Vec<i32>> {
        let ctx = self.context()?;
        let mut scratch = [0i32; MAX_INT_LEN];
        let buf = &mut scratch[..param.len()];

        let status = ctx.with_backend(|b| b.get_ints(self.raw, param, buf))?;
        if status != OHMD_S_OK {
            return Err(ctx.status_error("get_ints", status));
        }
        Ok(buf.to_vec())
    }

    /// Absolute rotation as a quaternion `[x, y, z, w]`.
    pub fn rotation_quat(&self) -> Result<[f64; 4]> {
        let v = self.get_floats(FloatParam::RotationQuat)?;
        Ok([v[0], v[1], v[2], v[3]])
    }

    /// Absolute position `[x, y, z]`.
    pub fn position(&self) -> Result<[f64; 3]> {
        let v = self.get_floats(FloatParam::PositionVector)?;
        Ok([v[0], v[1], v[2]])
    }

    /// One of the four column-major 4x4 GL matrices.
    pub fn get_matrix(&self, param: FloatParam) -> Result<[f64; 16]> {
        if param.len() != 16 {
            let err = OpenHmdError::Precondition(format!("{} is not a 4x4 matrix", param));
            return Err(match self.ctx.upgrade() {
                Some(ctx) => ctx.record(err),
                None => err,
            });
        }
        let v = self.get_floats(param)?;
        let mut m = [0f64; 16];
        m.copy_from_slice(&v);
        Ok(m)
    }

    /// Screen resolution `(horizontal, vertical)` in pixels.
    pub fn screen_resolution(&self) -> Result<(i32, i32)> {
        let h = self.get_ints(IntParam::ScreenHorizontalResolution)?;
        let v = self.get_ints(IntParam::ScreenVerticalResolution)?;
        Ok((h[0], v[0]))
    }

    /// Enumeration index this device was opened with.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Probe generation this device was opened under.
    pub fn probe_generation(&self) -> u64 {
        self.generation
    }

    /// Whether the context has been re-probed since this device was opened.
    ///
    /// The device handle itself stays valid, but [`Device::index`] no longer
    /// refers to the same enumeration entry.
    pub fn is_stale(&self) -> bool {
        match self.ctx.upgrade() {
            Some(ctx) => ctx.generation() != self.generation,
            None => true,
        }
    }

    /// Close the backend handle now and report any backend error.
    pub fn close(self) -> Result<()> {
        let ctx = self.context()?;
        ctx.release_device(self.id)
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        if let Some(ctx) = self.ctx.upgrade() {
            if let Err(e) = ctx.release_device(self.id) {
                log::warn!("Failed to close device {}: {}", self.id, e);
            }
        }
    }
}

impl std::fmt::Debug for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device")
            .field("id", &self.id)
            .field("index", &self.index)
            .field("probe_generation", &self.generation)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{SimDevice, SimHandle, SimulatedBackend};
    use crate::Context;

    fn open_dummy() -> (Context, SimHandle, Device) {
        let sim = SimulatedBackend::with_dummy();
        let handle = sim.handle();
        let ctx = Context::with_backend(Box::new(sim));
        ctx.probe().unwrap();
        let dev = ctx.list_open_device(0).unwrap();
        (ctx, handle, dev)
    }

    #[test]
    fn test_every_float_param_has_table_length() {
        let (_ctx, _, dev) = open_dummy();
        for p in FloatParam::ALL {
            assert_eq!(dev.get_floats(p).unwrap().len(), p.len(), "{}", p);
        }
        for p in IntParam::ALL {
            assert_eq!(dev.get_ints(p).unwrap().len(), p.len(), "{}", p);
        }
    }

    #[test]
    fn test_short_input_never_reaches_backend() {
        let (_ctx, handle, dev) = open_dummy();
        let err = dev.set_floats(FloatParam::EyeIpd, &[]).unwrap_err();
        assert!(matches!(err, OpenHmdError::Precondition(_)));
        assert_eq!(handle.calls().set_floats, 0);
    }

    #[test]
    fn test_read_only_param_is_precondition() {
        let (ctx, handle, dev) = open_dummy();
        let err = dev
            .set_floats(FloatParam::RotationQuat, &[0.0, 0.0, 0.0, 1.0])
            .unwrap_err();
        assert_eq!(
            err,
            OpenHmdError::Precondition("ROTATION_QUAT is read-only".into())
        );
        assert_eq!(handle.calls().set_floats, 0);
        assert_eq!(
            ctx.last_error().as_deref(),
            Some("Precondition failed: ROTATION_QUAT is read-only")
        );
    }

    #[test]
    fn test_set_uses_first_n_values() {
        let (_ctx, _, dev) = open_dummy();
        dev.set_floats(FloatParam::ProjectionZfar, &[50.0, 1.0, 2.0])
            .unwrap();
        assert_eq!(dev.get_floats(FloatParam::ProjectionZfar).unwrap(), vec![50.0]);
    }

    #[test]
    fn test_round_trip_narrows_to_f32() {
        let (_ctx, _, dev) = open_dummy();
        dev.set_floats(FloatParam::EyeIpd, &[0.0645]).unwrap();
        let ipd = dev.get_floats(FloatParam::EyeIpd).unwrap()[0];
        assert_eq!(ipd, f64::from(0.0645f32));
        assert!((ipd - 0.0645).abs() < 1e-6);
    }

    #[test]
    fn test_backend_failure_surfaces_message() {
        let (_ctx, handle, dev) = open_dummy();
        handle.unplug(0);
        assert_eq!(
            dev.get_floats(FloatParam::RotationQuat),
            Err(OpenHmdError::Backend("device disconnected".into()))
        );
        assert_eq!(
            dev.get_ints(IntParam::ScreenVerticalResolution),
            Err(OpenHmdError::Backend("device disconnected".into()))
        );
    }

    #[test]
    fn test_typed_helpers() {
        let (ctx, _, dev) = open_dummy();
        assert_eq!(dev.rotation_quat().unwrap(), [0.0, 0.0, 0.0, 1.0]);
        ctx.update().unwrap();
        let q = dev.rotation_quat().unwrap();
        assert!(q[1] > 0.0);
        assert_eq!(dev.position().unwrap(), [0.0; 3]);
        assert_eq!(dev.screen_resolution().unwrap(), (1280, 800));

        let proj = dev.get_matrix(FloatParam::LeftEyeGlProjectionMatrix).unwrap();
        assert_eq!(proj[11], -1.0);
        assert!(matches!(
            dev.get_matrix(FloatParam::EyeIpd),
            Err(OpenHmdError::Precondition(_))
        ));
    }

    #[test]
    fn test_drop_closes_handle_once() {
        let (ctx, handle, dev) = open_dummy();
        assert_eq!(ctx.open_devices(), 1);
        assert_eq!(handle.open_handles(), 1);
        drop(dev);
        assert_eq!(ctx.open_devices(), 0);
        assert_eq!(handle.open_handles(), 0);
        assert_eq!(handle.calls().close_device, 1);
    }

    #[test]
    fn test_explicit_close() {
        let (ctx, handle, dev) = open_dummy();
        dev.close().unwrap();
        assert_eq!(ctx.open_devices(), 0);
        assert_eq!(handle.calls().close_device, 1);
    }

    #[test]
    fn test_use_after_context_destroy() {
        let (mut ctx, handle, dev) = open_dummy();
        ctx.destroy();
        let before = handle.calls().device_calls();
        assert_eq!(
            dev.get_floats(FloatParam::EyeIpd),
            Err(OpenHmdError::ContextDestroyed)
        );
        assert_eq!(
            dev.set_floats(FloatParam::EyeIpd, &[0.06]),
            Err(OpenHmdError::ContextDestroyed)
        );
        drop(dev);
        assert_eq!(handle.calls().device_calls(), before);
        assert_eq!(handle.calls().close_device, 0);
    }

    #[test]
    fn test_device_outlives_dropped_context() {
        let (ctx, handle, dev) = open_dummy();
        drop(ctx);
        assert_eq!(dev.get_ints(IntParam::ScreenHorizontalResolution), Err(OpenHmdError::ContextDestroyed));
        assert!(dev.is_stale());
        drop(dev);
        assert_eq!(handle.calls().disconnect, 1);
        assert_eq!(handle.calls().close_device, 0);
    }

    #[test]
    fn test_reprobe_marks_stale() {
        let sim = SimulatedBackend::new(vec![SimDevice::dummy()]);
        let handle = sim.handle();
        let ctx = Context::with_backend(Box::new(sim));
        ctx.probe().unwrap();
        let dev = ctx.list_open_device(0).unwrap();
        assert!(!dev.is_stale());
        handle.plug(SimDevice::named("HTC", "Vive", "/dev/hidraw5"));
        assert_eq!(ctx.probe().unwrap(), 2);
        assert!(dev.is_stale());
        assert_eq!(dev.probe_generation(), 1);
        // The handle stays usable.
        assert_eq!(dev.get_floats(FloatParam::EyeIpd).unwrap().len(), 1);
    }
}
