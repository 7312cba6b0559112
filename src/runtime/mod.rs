//! Runtime backends for tensor computation
//!
//! This module defines the `Runtime` trait and provides implementations for
//! the host CPU and (with the `wgpu` feature) WebGPU devices.
//!
//! # Architecture
//!
//! ```text
//! Runtime (backend identity, memory transfer)
//! ├── Device (identifies a CPU/GPU, reports work-group limits)
//! └── Client (dispatches operations, owns the queue or thread pool)
//! ```

pub mod helpers;
mod traits;

pub mod cpu;

#[cfg(feature = "wgpu")]
pub mod wgpu;

pub use helpers::ensure_contiguous;
pub use traits::{Device, Runtime, RuntimeClient};
