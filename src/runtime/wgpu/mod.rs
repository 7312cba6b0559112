//! WebGPU runtime implementation (requires `wgpu` feature)
//!
//! Cross-platform GPU execution through wgpu. Tensor storage handles are ids
//! into a buffer registry, kernels are WGSL generated per dtype and
//! work-group shape, and every launch is followed by a blocking queue wait.
//! Only F32 is supported on this backend.

mod cache;
mod client;
mod device;
mod runtime;
pub(crate) mod shaders;

pub use crate::tensor::Tensor;
pub use client::WgpuClient;
pub use device::{WgpuDevice, WgpuError};
pub use runtime::{WgpuRuntime, is_wgpu_available, wgpu_device};

pub(crate) use client::require_buffer;
