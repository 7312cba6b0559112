//! CPU kernel implementations
//!
//! Kernels are generic over `T: Element` and take raw pointers into tensor
//! storage. Parallel kernels are launched through [`CpuClient::parallel_for`]
//! and return once every work-group has finished.
//!
//! [`CpuClient::parallel_for`]: super::CpuClient::parallel_for

pub mod smm;

pub use smm::{smm_columns_kernel, smm_gemm_kernel};
