//! # smmconv
//!
//! **2D convolution as an explicit im2col transform plus a dense matrix product,
//! on the CPU or a WebGPU device.**
//!
//! A convolution runs as two device launches separated by a blocking wait:
//!
//! 1. the column builder unrolls every receptive field of the input into a row
//!    of an intermediate column buffer, writing zeros for padded positions
//! 2. the GEMM kernel takes the dot product of each column row with each
//!    flattened kernel and adds the optional bias
//!
//! Work-group shapes for both launches come from a small, deterministic
//! heuristic driven by the device's work-group limit
//! ([`algorithm::SmmLaunchPlan`]).
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use smmconv::prelude::*;
//!
//! let device = CpuDevice::new();
//! let client = CpuRuntime::default_client(&device);
//!
//! let input = Tensor::<CpuRuntime>::from_slice(&data, &[1, 3, 32, 32], &device);
//! let weight = Tensor::<CpuRuntime>::from_slice(&kernel, &[16, 3, 3, 3], &device);
//!
//! let output = client.conv2d(&input, &weight, None, &Conv2dArgs::new().padding(1, 1))?;
//! assert_eq!(output.shape(), &[1, 16, 32, 32]);
//! ```
//!
//! ## Feature Flags
//!
//! - `cpu` (default): CPU backend in the prelude (the host runtime itself is
//!   always built, as the fallback [`DefaultRuntime`])
//! - `rayon` (default): work-groups scheduled on a rayon pool
//! - `wgpu`: cross-platform GPU via WebGPU
//! - `f16`: half-precision floats (F16, BF16) on the CPU backend

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_inception)]

pub mod algorithm;
pub mod dtype;
pub mod error;
pub mod ops;
pub mod runtime;
pub mod tensor;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::dtype::DType;
    pub use crate::error::{Error, Result};
    pub use crate::ops::{Conv2dArgs, ConvOps, PaddingMode};
    pub use crate::runtime::{Device, Runtime, RuntimeClient};
    pub use crate::tensor::{Layout, Tensor};

    #[cfg(feature = "cpu")]
    pub use crate::runtime::cpu::{CpuClient, CpuDevice, CpuRuntime, ParallelismConfig};

    #[cfg(feature = "wgpu")]
    pub use crate::runtime::wgpu::{WgpuClient, WgpuDevice, WgpuRuntime};
}

/// Default runtime based on enabled features
///
/// - With `wgpu` feature: `WgpuRuntime`
/// - Otherwise: `CpuRuntime`
#[cfg(feature = "wgpu")]
pub type DefaultRuntime = runtime::wgpu::WgpuRuntime;

/// Default runtime based on enabled features
#[cfg(not(feature = "wgpu"))]
pub type DefaultRuntime = runtime::cpu::CpuRuntime;
