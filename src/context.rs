use crate::backend::{Backend, RawDevice, Status};
use crate::device::Device;
use crate::error::LastError;
use crate::ffi;
use crate::native::{BackendConfig, NativeBackend};
use crate::params::StringField;
use crate::types::DeviceInfo;
use crate::{OpenHmdError, Result};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::os::raw::c_int;
use std::rc::Rc;

/// State shared between a [`Context`] and the devices opened from it.
///
/// The context holds the only strong reference; devices hold `Weak` ones, so
/// dropping the context frees this and every device call afterwards fails
/// with [`OpenHmdError::ContextDestroyed`].
pub(crate) struct Shared {
    backend: RefCell<Option<Box<dyn Backend>>>,
    last_error: LastError,
    probe_count: Cell<Option<usize>>,
    generation: Cell<u64>,
    /// Live device registry: device id -> backend handle.
    devices: RefCell<HashMap<u64, RawDevice>>,
    next_device_id: Cell<u64>,
}

impl Shared {
    /// Run `f` against the backend, or fail if the context was destroyed.
    pub(crate) fn with_backend<T>(&self, f: impl FnOnce(&mut dyn Backend) -> T) -> Result<T> {
        let mut guard = self.backend.borrow_mut();
        let backend = guard.as_mut().ok_or(OpenHmdError::ContextDestroyed)?;
        Ok(f(backend.as_mut()))
    }

    /// Current backend error text, recorded as this context's last error.
    pub(crate) fn backend_error(&self) -> Result<Option<OpenHmdError>> {
        let message = self.error_text()?;
        Ok(message.map(|msg| self.record(OpenHmdError::Backend(msg))))
    }

    pub(crate) fn error_text(&self) -> Result<Option<String>> {
        self.with_backend(|b| b.last_error())
    }

    /// Error text that appeared or changed since `before` was read.
    ///
    /// For calls with no failure signal of their own. The backend's error
    /// text is not cleared between calls, so unchanged text belongs to an
    /// earlier call.
    pub(crate) fn new_error(&self, before: Option<String>) -> Result<Option<OpenHmdError>> {
        let after = self.error_text()?;
        if after.is_none() || after == before {
            return Ok(None);
        }
        Ok(after.map(|msg| self.record(OpenHmdError::Backend(msg))))
    }

    /// Error for a call that signalled failure: the backend's current text,
    /// or a generic message when it has none.
    pub(crate) fn status_error(&self, op: &str, status: Status) -> OpenHmdError {
        match self.backend_error() {
            Ok(Some(err)) => err,
            Ok(None) => self.record(OpenHmdError::Backend(format!(
                "{} failed: {} ({})",
                op,
                ffi::status_name(status),
                status
            ))),
            Err(err) => self.record(err),
        }
    }

    pub(crate) fn record(&self, err: OpenHmdError) -> OpenHmdError {
        self.last_error.set(&err);
        err
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation.get()
    }

    /// Remove a device from the registry and close its backend handle.
    ///
    /// Idempotent: only the first call for an id reaches the backend, and
    /// none does once the context is torn down.
    pub(crate) fn release_device(&self, id: u64) -> Result<()> {
        let Some(raw) = self.devices.borrow_mut().remove(&id) else {
            return Ok(());
        };
        let status = self.with_backend(|b| b.close_device(raw))?;
        if status != ffi::OHMD_S_OK {
            return Err(self.status_error("close_device", status));
        }
        log::debug!("Closed device {}", id);
        Ok(())
    }

    /// Index check against the last probe. Reported as a backend error, with
    /// OpenHMD's own wording.
    fn check_index(&self, idx: usize) -> Result<c_int> {
        let count = self.probe_count.get().unwrap_or(0);
        match c_int::try_from(idx) {
            Ok(raw) if idx < count => Ok(raw),
            _ => Err(self.record(OpenHmdError::Backend(format!(
                "no device with index: {}",
                idx
            )))),
        }
    }

    fn teardown(&self) {
        let backend = self.backend.borrow_mut().take();
        self.devices.borrow_mut().clear();
        self.probe_count.set(None);
        if let Some(backend) = backend {
            log::info!("Destroying {} context", backend.name());
            drop(backend);
        }
    }
}

/// Owner of one backend connection.
///
/// Enumerates devices, pumps backend events and opens [`Device`]s. A context
/// and its devices are `!Send`: the backend must be driven from a single
/// thread, typically the render loop:
///
/// ```no_run
/// # fn main() -> openhmd::Result<()> {
/// let ctx = openhmd::Context::create()?;
/// ctx.probe()?;
/// let hmd = ctx.list_open_device(0)?;
/// loop {
///     ctx.update()?;
///     let rotation = hmd.rotation_quat()?;
///     # let _ = rotation; break;
/// }
/// # Ok(())
/// # }
/// ```
///
/// Enumeration indices are only meaningful until the next [`Context::probe`].
/// Using an index remembered from an earlier probe may address a different
/// device, or none at all.
pub struct Context {
    shared: Rc<Shared>,
}

impl Context {
    /// Connect to `libopenhmd`, located via [`BackendConfig::from_env`].
    pub fn create() -> Result<Context> {
        Self::with_config(&BackendConfig::from_env())
    }

    /// Same as [`Context::create`].
    pub fn new() -> Result<Context> {
        Self::create()
    }

    /// Connect to `libopenhmd` with explicit configuration.
    pub fn with_config(config: &BackendConfig) -> Result<Context> {
        let backend = NativeBackend::connect(config)?;
        Ok(Self::with_backend(Box::new(backend)))
    }

    /// Wrap an already connected backend.
    pub fn with_backend(backend: Box<dyn Backend>) -> Context {
        log::info!("Created context on {} backend", backend.name());
        Context {
            shared: Rc::new(Shared {
                backend: RefCell::new(Some(backend)),
                last_error: LastError::new(),
                probe_count: Cell::new(None),
                generation: Cell::new(0),
                devices: RefCell::new(HashMap::new()),
                next_device_id: Cell::new(1),
            }),
        }
    }

    /// Process pending backend events (pose updates, hot-plug).
    ///
    /// Nothing runs in the background; call this once per frame.
    pub fn update(&self) -> Result<()> {
        let before = self.shared.error_text()?;
        self.shared.with_backend(|b| b.pump_events())?;
        match self.shared.new_error(before)? {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Rescan for devices and return how many were found.
    ///
    /// Invalidates all enumeration indices and strings from the previous probe.
    /// The count is stored even when the backend reports an error.
    pub fn probe(&self) -> Result<usize> {
        let before = self.shared.error_text()?;
        let raw = self.shared.with_backend(|b| b.probe())?;
        let count = usize::try_from(raw).unwrap_or(0);
        self.shared.probe_count.set(Some(count));
        self.shared.generation.set(self.shared.generation.get() + 1);
        log::debug!(
            "Probe #{} found {} device(s)",
            self.shared.generation.get(),
            count
        );

        if raw < 0 {
            return Err(self.shared.status_error("probe", raw));
        }
        if let Some(err) = self.shared.new_error(before)? {
            return Err(err);
        }
        Ok(count)
    }

    /// Read one enumeration string for `idx` in the last probe.
    pub fn list_gets(&self, idx: usize, field: StringField) -> Result<String> {
        let raw_idx = self.shared.check_index(idx)?;
        match self.shared.with_backend(|b| b.enum_string(raw_idx, field))? {
            Some(value) => Ok(value),
            None => Err(self.shared.status_error("list_gets", ffi::OHMD_S_INVALID_PARAMETER)),
        }
    }

    /// Vendor, product and path for `idx` in the last probe.
    pub fn list_device_info(&self, idx: usize) -> Result<DeviceInfo> {
        Ok(DeviceInfo {
            index: idx,
            vendor: self.list_gets(idx, StringField::Vendor)?,
            product: self.list_gets(idx, StringField::Product)?,
            path: self.list_gets(idx, StringField::Path)?,
        })
    }

    /// Probe and collect info for every device found.
    ///
    /// Devices whose strings cannot be read are logged and skipped.
    pub fn devices(&self) -> Result<Vec<DeviceInfo>> {
        let count = self.probe()?;
        let mut devices = Vec::with_capacity(count);

        for idx in 0..count {
            match self.list_device_info(idx) {
                Ok(info) => devices.push(info),
                Err(e) => {
                    log::warn!("Failed to query device at index {}: {}", idx, e);
                }
            }
        }

        Ok(devices)
    }

    /// Open the device at `idx` in the last probe.
    pub fn list_open_device(&self, idx: usize) -> Result<Device> {
        let raw_idx = self.shared.check_index(idx)?;
        let Some(raw) = self.shared.with_backend(|b| b.open_device(raw_idx))? else {
            return Err(self.shared.status_error("open_device", ffi::OHMD_S_UNKNOWN_ERROR));
        };

        let id = self.shared.next_device_id.get();
        self.shared.next_device_id.set(id + 1);
        self.shared.devices.borrow_mut().insert(id, raw);
        log::info!("Opened device {} at index {}", id, idx);

        Ok(Device::new(
            Rc::downgrade(&self.shared),
            id,
            raw,
            idx,
            self.shared.generation(),
        ))
    }

    /// Most recent error reported through this context, if any.
    pub fn last_error(&self) -> Option<String> {
        self.shared.last_error.get()
    }

    /// Device count from the last probe, `None` before the first probe.
    pub fn probe_count(&self) -> Option<usize> {
        self.shared.probe_count.get()
    }

    /// Number of probes run so far.
    pub fn probe_generation(&self) -> u64 {
        self.shared.generation()
    }

    /// Number of devices currently open on this context.
    pub fn open_devices(&self) -> usize {
        self.shared.devices.borrow().len()
    }

    pub fn is_destroyed(&self) -> bool {
        self.shared.backend.borrow().is_none()
    }

    /// Disconnect from the backend.
    ///
    /// Safe to call more than once; the backend is released on the first call.
    /// Devices still alive afterwards fail with [`OpenHmdError::ContextDestroyed`].
    pub fn destroy(&mut self) {
        self.shared.teardown();
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        self.shared.teardown();
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("destroyed", &self.is_destroyed())
            .field("probe_count", &self.probe_count())
            .field("probe_generation", &self.probe_generation())
            .field("open_devices", &self.open_devices())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{SimDevice, SimulatedBackend};

    fn sim_context(devices: Vec<SimDevice>) -> (Context, crate::sim::SimHandle) {
        let sim = SimulatedBackend::new(devices);
        let handle = sim.handle();
        (Context::with_backend(Box::new(sim)), handle)
    }

    #[test]
    fn test_probe_and_list() {
        let (ctx, _) = sim_context(vec![
            SimDevice::dummy(),
            SimDevice::named("Oculus VR, Inc.", "Rift (DK2)", "/dev/hidraw3"),
        ]);
        assert_eq!(ctx.probe_count(), None);
        assert_eq!(ctx.probe().unwrap(), 2);
        assert_eq!(ctx.probe_count(), Some(2));
        assert_eq!(ctx.list_gets(0, StringField::Vendor).unwrap(), "OpenHMD");
        assert_eq!(ctx.list_gets(1, StringField::Path).unwrap(), "/dev/hidraw3");
        let info = ctx.list_device_info(1).unwrap();
        assert_eq!(info.product, "Rift (DK2)");
        assert_eq!(info.index, 1);
    }

    #[test]
    fn test_out_of_range_index_skips_backend() {
        let (ctx, handle) = sim_context(vec![SimDevice::dummy()]);
        ctx.probe().unwrap();
        let err = ctx.list_gets(1, StringField::Vendor).unwrap_err();
        assert_eq!(err, OpenHmdError::Backend("no device with index: 1".into()));
        assert!(ctx.list_open_device(5).is_err());
        assert_eq!(handle.calls().enum_string, 0);
        assert_eq!(handle.calls().open_device, 0);
        assert_eq!(ctx.last_error().as_deref(), Some("no device with index: 5"));
    }

    #[test]
    fn test_index_before_probe_fails() {
        let (ctx, _) = sim_context(vec![SimDevice::dummy()]);
        assert!(matches!(
            ctx.list_open_device(0),
            Err(OpenHmdError::Backend(_))
        ));
    }

    #[test]
    fn test_update_reports_backend_error() {
        let (ctx, handle) = sim_context(vec![SimDevice::dummy()]);
        handle.fail_next("hidraw read failed");
        assert_eq!(
            ctx.update(),
            Err(OpenHmdError::Backend("hidraw read failed".into()))
        );
        assert_eq!(ctx.last_error().as_deref(), Some("hidraw read failed"));
        assert_eq!(ctx.update(), Ok(()));
        assert_eq!(handle.calls().pump_events, 2);
    }

    #[test]
    fn test_probe_error_still_invalidates() {
        let (ctx, handle) = sim_context(vec![SimDevice::dummy()]);
        ctx.probe().unwrap();
        handle.fail_next("probe failed");
        assert!(ctx.probe().is_err());
        assert_eq!(ctx.probe_count(), Some(0));
        assert_eq!(ctx.probe_generation(), 2);
    }

    #[test]
    fn test_open_failure_returns_no_device() {
        let (ctx, handle) = sim_context(vec![SimDevice::dummy()]);
        ctx.probe().unwrap();
        handle.fail_next("could not open /dev/hidraw0");
        let err = ctx.list_open_device(0).unwrap_err();
        assert_eq!(err, OpenHmdError::Backend("could not open /dev/hidraw0".into()));
        assert_eq!(ctx.open_devices(), 0);
        assert_eq!(handle.open_handles(), 0);
    }

    #[test]
    fn test_devices_skips_failures() {
        let (ctx, handle) = sim_context(vec![
            SimDevice::dummy(),
            SimDevice::named("HTC", "Vive", "/dev/hidraw5"),
        ]);
        assert_eq!(ctx.devices().unwrap().len(), 2);

        // Probe succeeds, the first vendor read of device 0 fails.
        handle.fail_call(1, "transient");
        let devices = ctx.devices().unwrap();
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].vendor, "HTC");
        assert_eq!(devices[0].index, 1);
    }

    #[test]
    fn test_sticky_error_reported_once() {
        let sim = SimulatedBackend::with_dummy().with_sticky_errors();
        let handle = sim.handle();
        let ctx = Context::with_backend(Box::new(sim));
        assert_eq!(ctx.probe().unwrap(), 1);

        handle.fail_next("transient hidraw read");
        assert_eq!(
            ctx.update(),
            Err(OpenHmdError::Backend("transient hidraw read".into()))
        );

        // The text is still set in the backend; later calls succeed anyway.
        assert_eq!(ctx.update(), Ok(()));
        assert_eq!(ctx.probe(), Ok(1));
        assert_eq!(ctx.list_gets(0, StringField::Vendor).unwrap(), "OpenHMD");
        let hmd = ctx.list_open_device(0).unwrap();
        assert_eq!(hmd.rotation_quat().unwrap().len(), 4);
        assert_eq!(ctx.last_error().as_deref(), Some("transient hidraw read"));

        // A new failure overwrites the text and is reported.
        handle.unplug(0);
        assert_eq!(
            hmd.rotation_quat(),
            Err(OpenHmdError::Backend("device disconnected".into()))
        );
        handle.fail_next("probe failed");
        assert_eq!(ctx.probe(), Err(OpenHmdError::Backend("probe failed".into())));
    }

    #[test]
    fn test_empty_error_text_falls_back() {
        let (ctx, handle) = sim_context(vec![SimDevice::dummy()]);
        handle.fail_next("");
        assert_eq!(ctx.update(), Ok(()));
        assert_eq!(ctx.last_error(), None);

        ctx.probe().unwrap();
        handle.fail_next("");
        assert_eq!(
            ctx.list_gets(0, StringField::Product),
            Err(OpenHmdError::Backend(
                "list_gets failed: invalid parameter (-2)".into()
            ))
        );

        let hmd = ctx.list_open_device(0).unwrap();
        handle.fail_next("");
        assert_eq!(
            hmd.get_floats(crate::FloatParam::EyeIpd),
            Err(OpenHmdError::Backend("get_floats failed: unknown error (-1)".into()))
        );
        assert_eq!(
            ctx.last_error().as_deref(),
            Some("get_floats failed: unknown error (-1)")
        );
    }

    #[test]
    fn test_destroy_is_idempotent() {
        let (mut ctx, handle) = sim_context(Vec::new());
        ctx.destroy();
        ctx.destroy();
        assert!(ctx.is_destroyed());
        assert_eq!(ctx.probe(), Err(OpenHmdError::ContextDestroyed));
        drop(ctx);
        assert_eq!(handle.calls().disconnect, 1);
    }

    #[test]
    fn test_drop_disconnects_once() {
        let (ctx, handle) = sim_context(vec![SimDevice::dummy()]);
        ctx.probe().unwrap();
        drop(ctx);
        assert_eq!(handle.calls().disconnect, 1);
    }
}
