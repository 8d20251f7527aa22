//! Parameter identity table.
//!
//! Every value the backend exchanges with a device is addressed by one of the
//! closed enums below. Each variant knows its raw backend constant, its
//! numeric kind, the exact length of its value vector and whether it may be
//! written. Vector lengths are never taken from caller input.

use crate::types::{Access, ParamKind};
use std::fmt;
use std::os::raw::c_int;

/// Upper bound on the length of any float parameter (a 4x4 matrix).
pub const MAX_FLOAT_LEN: usize = 16;

/// Upper bound on the length of any int parameter.
pub const MAX_INT_LEN: usize = 1;

/// Float-valued device parameters (`ohmd_float_value`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FloatParam {
    /// `[x, y, z, w]`: absolute rotation of the device as a quaternion.
    RotationQuat,
    /// Column-major OpenGL 4x4 modelview matrix for the left eye.
    LeftEyeGlModelviewMatrix,
    /// Column-major OpenGL 4x4 modelview matrix for the right eye.
    RightEyeGlModelviewMatrix,
    /// Column-major OpenGL 4x4 projection matrix for the left eye.
    LeftEyeGlProjectionMatrix,
    /// Column-major OpenGL 4x4 projection matrix for the right eye.
    RightEyeGlProjectionMatrix,
    /// `[x, y, z]`: absolute position of the device.
    PositionVector,
    /// Physical width of the device screen.
    ScreenHorizontalSize,
    /// Physical height of the device screen.
    ScreenVerticalSize,
    /// Physical separation of the lens centers.
    LensHorizontalSeparation,
    /// Physical vertical position of the lenses.
    LensVerticalPosition,
    /// Field of view of the left eye.
    LeftEyeFov,
    /// Display aspect ratio of the left eye screen.
    LeftEyeAspectRatio,
    /// Field of view of the right eye.
    RightEyeFov,
    /// Display aspect ratio of the right eye screen.
    RightEyeAspectRatio,
    /// Interpupillary distance of the user. Writable.
    EyeIpd,
    /// Far clipping distance for projection matrices. Writable.
    ProjectionZfar,
    /// Near clipping distance for projection matrices. Writable.
    ProjectionZnear,
    /// Device specific distortion coefficients.
    DistortionK,
}

impl FloatParam {
    pub const ALL: [FloatParam; 18] = [
        FloatParam::RotationQuat,
        FloatParam::LeftEyeGlModelviewMatrix,
        FloatParam::RightEyeGlModelviewMatrix,
        FloatParam::LeftEyeGlProjectionMatrix,
        FloatParam::RightEyeGlProjectionMatrix,
        FloatParam::PositionVector,
        FloatParam::ScreenHorizontalSize,
        FloatParam::ScreenVerticalSize,
        FloatParam::LensHorizontalSeparation,
        FloatParam::LensVerticalPosition,
        FloatParam::LeftEyeFov,
        FloatParam::LeftEyeAspectRatio,
        FloatParam::RightEyeFov,
        FloatParam::RightEyeAspectRatio,
        FloatParam::EyeIpd,
        FloatParam::ProjectionZfar,
        FloatParam::ProjectionZnear,
        FloatParam::DistortionK,
    ];

    /// Raw `ohmd_float_value` constant.
    pub const fn raw(self) -> c_int {
        match self {
            FloatParam::RotationQuat => 1,
            FloatParam::LeftEyeGlModelviewMatrix => 2,
            FloatParam::RightEyeGlModelviewMatrix => 3,
            FloatParam::LeftEyeGlProjectionMatrix => 4,
            FloatParam::RightEyeGlProjectionMatrix => 5,
            FloatParam::PositionVector => 6,
            FloatParam::ScreenHorizontalSize => 7,
            FloatParam::ScreenVerticalSize => 8,
            FloatParam::LensHorizontalSeparation => 9,
            FloatParam::LensVerticalPosition => 10,
            FloatParam::LeftEyeFov => 11,
            FloatParam::LeftEyeAspectRatio => 12,
            FloatParam::RightEyeFov => 13,
            FloatParam::RightEyeAspectRatio => 14,
            FloatParam::EyeIpd => 15,
            FloatParam::ProjectionZfar => 16,
            FloatParam::ProjectionZnear => 17,
            FloatParam::DistortionK => 18,
        }
    }

    /// Look up a parameter by its raw backend constant.
    pub fn from_raw(raw: c_int) -> Option<FloatParam> {
        FloatParam::ALL.into_iter().find(|p| p.raw() == raw)
    }

    /// Number of floats the backend reads or writes for this parameter.
    pub const fn len(self) -> usize {
        match self {
            FloatParam::RotationQuat => 4,
            FloatParam::LeftEyeGlModelviewMatrix
            | FloatParam::RightEyeGlModelviewMatrix
            | FloatParam::LeftEyeGlProjectionMatrix
            | FloatParam::RightEyeGlProjectionMatrix => 16,
            FloatParam::PositionVector => 3,
            FloatParam::ScreenHorizontalSize
            | FloatParam::ScreenVerticalSize
            | FloatParam::LensHorizontalSeparation
            | FloatParam::LensVerticalPosition
            | FloatParam::LeftEyeFov
            | FloatParam::LeftEyeAspectRatio
            | FloatParam::RightEyeFov
            | FloatParam::RightEyeAspectRatio
            | FloatParam::EyeIpd
            | FloatParam::ProjectionZfar
            | FloatParam::ProjectionZnear => 1,
            FloatParam::DistortionK => 6,
        }
    }

    pub const fn access(self) -> Access {
        match self {
            FloatParam::EyeIpd | FloatParam::ProjectionZfar | FloatParam::ProjectionZnear => {
                Access::READ_WRITE
            }
            _ => Access::READ,
        }
    }

    pub const fn kind(self) -> ParamKind {
        ParamKind::Float
    }

    pub const fn is_writable(self) -> bool {
        self.access().contains(Access::WRITE)
    }

    /// Upper-case name matching the OpenHMD constant, without the `OHMD_` prefix.
    pub const fn name(self) -> &'static str {
        match self {
            FloatParam::RotationQuat => "ROTATION_QUAT",
            FloatParam::LeftEyeGlModelviewMatrix => "LEFT_EYE_GL_MODELVIEW_MATRIX",
            FloatParam::RightEyeGlModelviewMatrix => "RIGHT_EYE_GL_MODELVIEW_MATRIX",
            FloatParam::LeftEyeGlProjectionMatrix => "LEFT_EYE_GL_PROJECTION_MATRIX",
            FloatParam::RightEyeGlProjectionMatrix => "RIGHT_EYE_GL_PROJECTION_MATRIX",
            FloatParam::PositionVector => "POSITION_VECTOR",
            FloatParam::ScreenHorizontalSize => "SCREEN_HORIZONTAL_SIZE",
            FloatParam::ScreenVerticalSize => "SCREEN_VERTICAL_SIZE",
            FloatParam::LensHorizontalSeparation => "LENS_HORIZONTAL_SEPARATION",
            FloatParam::LensVerticalPosition => "LENS_VERTICAL_POSITION",
            FloatParam::LeftEyeFov => "LEFT_EYE_FOV",
            FloatParam::LeftEyeAspectRatio => "LEFT_EYE_ASPECT_RATIO",
            FloatParam::RightEyeFov => "RIGHT_EYE_FOV",
            FloatParam::RightEyeAspectRatio => "RIGHT_EYE_ASPECT_RATIO",
            FloatParam::EyeIpd => "EYE_IPD",
            FloatParam::ProjectionZfar => "PROJECTION_ZFAR",
            FloatParam::ProjectionZnear => "PROJECTION_ZNEAR",
            FloatParam::DistortionK => "DISTORTION_K",
        }
    }
}

// The device scratch buffer is sized by MAX_FLOAT_LEN; a table entry longer
// than that must fail the build, not overrun the buffer.
const _: () = {
    let mut i = 0;
    while i < FloatParam::ALL.len() {
        assert!(FloatParam::ALL[i].len() <= MAX_FLOAT_LEN);
        i += 1;
    }
};

/// Integer-valued device parameters (`ohmd_int_value`). All read-only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntParam {
    /// Horizontal resolution of the device screen, in pixels.
    ScreenHorizontalResolution,
    /// Vertical resolution of the device screen, in pixels.
    ScreenVerticalResolution,
}

impl IntParam {
    pub const ALL: [IntParam; 2] = [
        IntParam::ScreenHorizontalResolution,
        IntParam::ScreenVerticalResolution,
    ];

    /// Raw `ohmd_int_value` constant.
    pub const fn raw(self) -> c_int {
        match self {
            IntParam::ScreenHorizontalResolution => 0,
            IntParam::ScreenVerticalResolution => 1,
        }
    }

    pub fn from_raw(raw: c_int) -> Option<IntParam> {
        IntParam::ALL.into_iter().find(|p| p.raw() == raw)
    }

    pub const fn len(self) -> usize {
        match self {
            IntParam::ScreenHorizontalResolution | IntParam::ScreenVerticalResolution => 1,
        }
    }

    pub const fn access(self) -> Access {
        match self {
            IntParam::ScreenHorizontalResolution | IntParam::ScreenVerticalResolution => {
                Access::READ
            }
        }
    }

    pub const fn kind(self) -> ParamKind {
        ParamKind::Int
    }

    pub const fn name(self) -> &'static str {
        match self {
            IntParam::ScreenHorizontalResolution => "SCREEN_HORIZONTAL_RESOLUTION",
            IntParam::ScreenVerticalResolution => "SCREEN_VERTICAL_RESOLUTION",
        }
    }
}

const _: () = {
    let mut i = 0;
    while i < IntParam::ALL.len() {
        assert!(IntParam::ALL[i].len() <= MAX_INT_LEN);
        i += 1;
    }
};

/// Per-index enumeration strings (`ohmd_string_value`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StringField {
    Vendor,
    Product,
    Path,
}

impl StringField {
    pub const ALL: [StringField; 3] = [StringField::Vendor, StringField::Product, StringField::Path];

    pub const fn raw(self) -> c_int {
        match self {
            StringField::Vendor => 0,
            StringField::Product => 1,
            StringField::Path => 2,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            StringField::Vendor => "VENDOR",
            StringField::Product => "PRODUCT",
            StringField::Path => "PATH",
        }
    }
}

impl fmt::Display for FloatParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Display for IntParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Display for StringField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Widen backend single-precision values to `f64`.
///
/// This and [`narrow`] are the only places precision changes; the backend is
/// single precision internally.
pub fn widen(values: &[f32]) -> Vec<f64> {
    values.iter().map(|&v| f64::from(v)).collect()
}

/// Narrow caller values to the backend's single precision.
pub fn narrow(values: &[f64], out: &mut [f32]) {
    for (dst, &src) in out.iter_mut().zip(values) {
        *dst = src as f32;
    }
}
