//! End-to-end scenarios against the simulated backend.
//!
//! Run with: cargo test --test scenarios

use openhmd::sim::{SimDevice, SimHandle, SimulatedBackend, YAW_STEP};
use openhmd::{Context, FloatParam, IntParam, OpenHmdError, StringField};

fn context_with(devices: Vec<SimDevice>) -> (Context, SimHandle) {
    let sim = SimulatedBackend::new(devices);
    let handle = sim.handle();
    (Context::with_backend(Box::new(sim)), handle)
}

#[test]
fn single_device_walkthrough() {
    let (ctx, _) = context_with(vec![SimDevice::dummy()]);
    ctx.update().unwrap();

    assert_eq!(ctx.probe().unwrap(), 1);
    let vendor = ctx.list_gets(0, StringField::Vendor).unwrap();
    assert!(!vendor.is_empty());

    let hmd = ctx.list_open_device(0).unwrap();
    let quat = hmd.get_floats(FloatParam::RotationQuat).unwrap();
    assert_eq!(quat.len(), 4);
    let norm: f64 = quat.iter().map(|v| v * v).sum();
    assert!((norm - 1.0).abs() < 1e-5);

    let width = hmd.get_ints(IntParam::ScreenHorizontalResolution).unwrap();
    assert_eq!(width.len(), 1);
    assert!(width[0] > 0);
}

#[test]
fn no_devices_open_fails_with_backend_error() {
    let (ctx, _) = context_with(Vec::new());
    assert_eq!(ctx.probe().unwrap(), 0);
    assert!(matches!(
        ctx.list_open_device(0),
        Err(OpenHmdError::Backend(_))
    ));
    assert!(ctx.devices().unwrap().is_empty());
}

#[test]
fn indices_defined_exactly_below_probe_count() {
    let (ctx, _) = context_with(vec![
        SimDevice::dummy(),
        SimDevice::named("Oculus VR, Inc.", "Rift (DK1)", "/dev/hidraw1"),
        SimDevice::named("Sony", "PlayStation VR", "/dev/hidraw2"),
    ]);
    let n = ctx.probe().unwrap();
    assert_eq!(n, 3);

    for idx in 0..n {
        for field in StringField::ALL {
            assert!(ctx.list_gets(idx, field).is_ok(), "{} {}", idx, field);
        }
        ctx.list_open_device(idx).unwrap().close().unwrap();
    }
    for idx in [n, n + 1, usize::MAX] {
        assert!(matches!(
            ctx.list_gets(idx, StringField::Product),
            Err(OpenHmdError::Backend(_))
        ));
        assert!(ctx.list_open_device(idx).is_err());
    }
}

#[test]
fn writable_params_round_trip() {
    let (ctx, _) = context_with(vec![SimDevice::dummy()]);
    ctx.probe().unwrap();
    let hmd = ctx.list_open_device(0).unwrap();

    for (param, value) in [
        (FloatParam::EyeIpd, 0.0632),
        (FloatParam::ProjectionZfar, 250.5),
        (FloatParam::ProjectionZnear, 0.05),
    ] {
        hmd.set_floats(param, &[value]).unwrap();
        let got = hmd.get_floats(param).unwrap();
        assert_eq!(got.len(), 1);
        assert!((got[0] - value).abs() <= value.abs() * f64::from(f32::EPSILON), "{}", param);
    }
}

#[test]
fn short_input_is_rejected_locally() {
    let (ctx, handle) = context_with(vec![SimDevice::dummy()]);
    ctx.probe().unwrap();
    let hmd = ctx.list_open_device(0).unwrap();

    for param in FloatParam::ALL.into_iter().filter(|p| p.is_writable()) {
        let short = vec![1.0; param.len() - 1];
        assert!(matches!(
            hmd.set_floats(param, &short),
            Err(OpenHmdError::Precondition(_))
        ));
    }
    assert_eq!(handle.calls().set_floats, 0);
}

#[test]
fn reprobe_invalidates_indices() {
    let (ctx, handle) = context_with(vec![
        SimDevice::named("Oculus VR, Inc.", "Rift (DK2)", "/dev/hidraw3"),
        SimDevice::dummy(),
    ]);
    ctx.probe().unwrap();
    assert_eq!(ctx.list_gets(1, StringField::Product).unwrap(), "Dummy Device");
    let first = ctx.list_open_device(0).unwrap();

    // Unplugging the first device shifts the dummy down to index 0.
    handle.unplug(0);
    assert_eq!(ctx.probe().unwrap(), 1);
    assert_eq!(ctx.probe_generation(), 2);
    assert_eq!(ctx.list_gets(0, StringField::Product).unwrap(), "Dummy Device");
    assert!(ctx.list_gets(1, StringField::Product).is_err());

    assert!(first.is_stale());
    assert_eq!(
        first.get_floats(FloatParam::RotationQuat),
        Err(OpenHmdError::Backend("device disconnected".into()))
    );
}

#[test]
fn double_destroy_disconnects_once() {
    let (mut ctx, handle) = context_with(vec![SimDevice::dummy()]);
    ctx.probe().unwrap();
    let hmd = ctx.list_open_device(0).unwrap();

    ctx.destroy();
    ctx.destroy();
    drop(ctx);
    assert_eq!(handle.calls().disconnect, 1);

    assert_eq!(
        hmd.get_floats(FloatParam::EyeIpd),
        Err(OpenHmdError::ContextDestroyed)
    );
}

#[test]
fn frame_loop_tracks_rotation() {
    let (ctx, handle) = context_with(vec![SimDevice::dummy()]);
    ctx.probe().unwrap();
    let hmd = ctx.list_open_device(0).unwrap();

    let mut last_y = hmd.rotation_quat().unwrap()[1];
    for _ in 0..10 {
        ctx.update().unwrap();
        let y = hmd.rotation_quat().unwrap()[1];
        assert!(y > last_y);
        last_y = y;
    }
    assert_eq!(handle.calls().pump_events, 10);
    assert!((handle.yaw() - YAW_STEP * 10.0).abs() < 1e-6);
    assert!((last_y - f64::from((handle.yaw() / 2.0).sin())).abs() < 1e-6);
}
