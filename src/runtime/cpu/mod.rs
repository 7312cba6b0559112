//! CPU runtime implementation
//!
//! The host CPU acts as a device whose "work-groups" are closures scheduled on
//! a rayon pool (or run in order when parallelism is disabled). Memory is
//! 64-byte aligned heap allocation addressed through raw pointers.

mod client;
mod device;
pub(crate) mod kernels;
mod runtime;

pub use crate::tensor::Tensor;
pub use client::{CpuClient, ParallelismConfig};
pub use device::CpuDevice;
pub use runtime::CpuRuntime;
