//! WebGPU implementation of tensor operations.

pub mod conv;
