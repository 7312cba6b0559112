//! Tensor types
//!
//! This module provides the `Tensor` type, an n-dimensional array stored on a
//! compute device (CPU or GPU).

mod core;
mod layout;
mod storage;

pub use core::Tensor;
pub use layout::{Layout, Shape, Strides};
pub use storage::Storage;
