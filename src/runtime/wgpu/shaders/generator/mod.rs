//! WGSL shader generation
//!
//! WGSL has no templates, so shader source is generated per dtype. The
//! convolution shaders also bake their work-group shape into the source,
//! since `@workgroup_size` must be a constant.
//!
//! ```text
//! generate_smm_columns_shader(DType::F32, [9, 1, 1])  → column builder, 9 taps per group
//! generate_smm_gemm_shader(DType::F32, [16, 16, 1])   → GEMM, 16x16 outputs per group
//! ```
//!
//! Modules are cached in the pipeline cache under a name encoding both.

pub mod common;
pub mod smm;

pub use common::{is_wgsl_float, wgsl_type};
pub use smm::{
    COLUMNS_ENTRY, GEMM_ENTRY, generate_smm_columns_shader, generate_smm_gemm_shader,
};
