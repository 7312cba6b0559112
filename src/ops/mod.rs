//! Tensor operations
//!
//! Operations are defined as traits implemented by each backend's client, so
//! the client supplies the device, thread pool or queue the operation runs on.
//!
//! ```text
//! RuntimeClient<R>
//!   └── implements ConvOps<R>
//!         ├── smm_conv2d  (im2col + GEMM, explicit arguments)
//!         └── conv2d      (same, arguments bundled in Conv2dArgs)
//! ```
//!
//! Shape and argument validation shared by every backend lives in
//! [`conv_common`]; backends only add their own dtype and device limits.

pub mod conv_common;
pub(crate) mod cpu;
mod traits;
#[cfg(feature = "wgpu")]
pub(crate) mod wgpu;

pub use traits::{Conv2dArgs, ConvOps, PaddingMode};
