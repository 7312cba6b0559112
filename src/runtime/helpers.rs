//! Shared helper functions for runtime backends

use crate::error::Result;
use crate::runtime::Runtime;
use crate::tensor::Tensor;

/// Ensure a tensor is contiguous in memory.
///
/// Already contiguous tensors are returned as a cheap clone sharing storage;
/// strided views are materialized into a new contiguous buffer. Kernels that
/// index operands with row-major offsets call this first.
///
/// # Example
///
/// ```ignore
/// let b = a.transpose(-1, -2)?;       // strided view
/// let c = ensure_contiguous(&b)?;     // contiguous copy
/// assert!(c.is_contiguous());
/// ```
#[inline]
pub fn ensure_contiguous<R: Runtime>(tensor: &Tensor<R>) -> Result<Tensor<R>> {
    tensor.contiguous()
}
