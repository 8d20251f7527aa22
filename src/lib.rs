//! # openhmd - typed Rust access to OpenHMD
//!
//! Safe layer over the OpenHMD head-mounted display tracking library. Provides:
//! - Device enumeration and per-device vendor/product/path strings
//! - Typed get/set of device parameters (rotation, GL matrices, lens geometry,
//!   screen resolution) with vector lengths fixed by the parameter
//! - Deterministic context/device lifetimes with checked device → context references
//! - A simulated backend for tests and hardware-free development
//!
//! `libopenhmd` is loaded at runtime; set `OPENHMD_LIBRARY` to point at a
//! specific build.
//!
//! ## Quick Start
//! ```
//! use openhmd::sim::SimulatedBackend;
//! use openhmd::{Context, FloatParam, IntParam, StringField};
//!
//! let ctx = Context::with_backend(Box::new(SimulatedBackend::with_dummy()));
//! let count = ctx.probe().unwrap();
//! assert_eq!(count, 1);
//! println!("vendor: {}", ctx.list_gets(0, StringField::Vendor).unwrap());
//!
//! let hmd = ctx.list_open_device(0).unwrap();
//! ctx.update().unwrap();
//! let quat = hmd.get_floats(FloatParam::RotationQuat).unwrap();
//! assert_eq!(quat.len(), 4);
//! let width = hmd.get_ints(IntParam::ScreenHorizontalResolution).unwrap();
//! assert!(width[0] > 0);
//! ```

pub mod error;
pub mod types;
pub mod params;
pub mod ffi;
pub mod backend;
pub mod native;
pub mod sim;
pub mod context;
pub mod device;

pub use backend::{Backend, RawDevice};
pub use context::Context;
pub use device::Device;
pub use error::OpenHmdError;
pub use native::{BackendConfig, NativeBackend};
pub use params::{FloatParam, IntParam, StringField};
pub use types::*;

/// Result type alias for openhmd operations.
pub type Result<T> = std::result::Result<T, OpenHmdError>;
