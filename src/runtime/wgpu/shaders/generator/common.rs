//! Common helper functions for WGSL shader generation

use crate::dtype::DType;
use crate::error::{Error, Result};

/// WGSL type name for a given DType
pub fn wgsl_type(dtype: DType) -> Result<&'static str> {
    match dtype {
        DType::F32 => Ok("f32"),
        DType::I32 => Ok("i32"),
        DType::U32 => Ok("u32"),
        _ => Err(Error::UnsupportedDType {
            dtype,
            op: "wgpu_shader",
        }),
    }
}

/// WGSL literal for zero of a given DType
pub fn wgsl_zero(dtype: DType) -> Result<&'static str> {
    match dtype {
        DType::F32 => Ok("0.0"),
        DType::I32 => Ok("0i"),
        DType::U32 => Ok("0u"),
        _ => Err(Error::UnsupportedDType {
            dtype,
            op: "wgpu_shader",
        }),
    }
}

/// Check if dtype is a float type in WGSL
pub fn is_wgsl_float(dtype: DType) -> bool {
    matches!(dtype, DType::F32)
}
