//! WGSL compute shader infrastructure for WebGPU operations
//!
//! - `generator` - WGSL source generation per dtype and work-group shape
//! - `pipeline` - Pipeline caching
//! - `smm` - Column-builder and GEMM launchers

pub mod generator;
pub mod smm;

mod pipeline;

pub use pipeline::{LayoutKey, PipelineCache};
