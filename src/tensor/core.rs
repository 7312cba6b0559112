//! Core Tensor type

use super::{Layout, Storage};
use crate::dtype::{DType, Element};
use crate::error::{Error, Result};
use crate::runtime::Runtime;
use std::fmt;

/// N-dimensional array stored on a compute device
///
/// A tensor is a [`Storage`] (reference-counted device memory) viewed through a
/// [`Layout`] (shape, strides, offset). Cloning a tensor or taking a view
/// shares the storage.
///
/// # Example
///
/// ```ignore
/// let device = CpuDevice::new();
/// let x = Tensor::<CpuRuntime>::from_slice(&[1.0f32, 2.0, 3.0, 4.0], &[1, 1, 2, 2], &device);
/// assert_eq!(x.shape(), &[1, 1, 2, 2]);
/// ```
pub struct Tensor<R: Runtime> {
    storage: Storage<R>,
    layout: Layout,
}

impl<R: Runtime> Tensor<R> {
    /// Create a tensor from existing storage and layout
    pub fn from_parts(storage: Storage<R>, layout: Layout) -> Self {
        Self { storage, layout }
    }

    /// Create a tensor from a slice of data
    ///
    /// # Panics
    ///
    /// Panics if `data.len()` does not match the shape or the device copy
    /// fails. Use [`Self::try_from_slice`] to handle these cases.
    pub fn from_slice<T: Element>(data: &[T], shape: &[usize], device: &R::Device) -> Self {
        Self::try_from_slice(data, shape, device).expect("Tensor::from_slice failed")
    }

    /// Create a tensor from a slice of data
    pub fn try_from_slice<T: Element>(
        data: &[T],
        shape: &[usize],
        device: &R::Device,
    ) -> Result<Self> {
        let expected_len: usize = shape.iter().product();
        if data.len() != expected_len {
            return Err(Error::ShapeMismatch {
                expected: shape.to_vec(),
                got: vec![data.len()],
            });
        }

        let storage = Storage::from_slice(data, device)?;
        Ok(Self::from_parts(storage, Layout::contiguous(shape)))
    }

    /// Create an uninitialized tensor
    ///
    /// # Panics
    ///
    /// Panics if allocation fails. Use [`Self::try_empty`] to handle that case.
    pub fn empty(shape: &[usize], dtype: DType, device: &R::Device) -> Self {
        Self::try_empty(shape, dtype, device).expect("Tensor::empty failed")
    }

    /// Create an uninitialized tensor
    pub fn try_empty(shape: &[usize], dtype: DType, device: &R::Device) -> Result<Self> {
        let len = checked_numel(shape)?;
        let storage = Storage::new(len, dtype, device)?;
        Ok(Self::from_parts(storage, Layout::contiguous(shape)))
    }

    /// Create a tensor filled with zeros
    ///
    /// # Panics
    ///
    /// Panics if allocation fails. Use [`Self::try_zeros`] to handle that case.
    pub fn zeros(shape: &[usize], dtype: DType, device: &R::Device) -> Self {
        Self::try_zeros(shape, dtype, device).expect("Tensor::zeros failed")
    }

    /// Create a tensor filled with zeros
    pub fn try_zeros(shape: &[usize], dtype: DType, device: &R::Device) -> Result<Self> {
        // All-zero bytes are 0 for every supported dtype.
        let size = checked_numel(shape)?
            .checked_mul(dtype.size_in_bytes())
            .ok_or(Error::OutOfMemory { size: usize::MAX })?;
        let bytes = vec![0u8; size];
        let storage = Storage::from_bytes(&bytes, dtype, device)?;
        Ok(Self::from_parts(storage, Layout::contiguous(shape)))
    }

    // ===== Accessors =====

    /// Underlying storage
    #[inline]
    pub fn storage(&self) -> &Storage<R> {
        &self.storage
    }

    /// Layout (shape, strides, offset)
    #[inline]
    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Shape of the tensor
    #[inline]
    pub fn shape(&self) -> &[usize] {
        self.layout.shape()
    }

    /// Strides in elements
    #[inline]
    pub fn strides(&self) -> &[isize] {
        self.layout.strides()
    }

    /// Number of dimensions
    #[inline]
    pub fn ndim(&self) -> usize {
        self.layout.ndim()
    }

    /// Total number of elements
    #[inline]
    pub fn numel(&self) -> usize {
        self.layout.elem_count()
    }

    /// Element type
    #[inline]
    pub fn dtype(&self) -> DType {
        self.storage.dtype()
    }

    /// Device holding the storage
    #[inline]
    pub fn device(&self) -> &R::Device {
        self.storage.device()
    }

    /// Whether the tensor is row-major contiguous
    #[inline]
    pub fn is_contiguous(&self) -> bool {
        self.layout.is_contiguous()
    }

    /// Size of one dimension (negative indices count from the end)
    pub fn size(&self, dim: isize) -> Option<usize> {
        self.layout.dim(dim)
    }

    // ===== Views (zero-copy) =====

    /// Swap two dimensions
    pub fn transpose(&self, dim0: isize, dim1: isize) -> Result<Self> {
        let new_layout =
            self.layout
                .transpose(dim0, dim1)
                .ok_or_else(|| Error::InvalidDimension {
                    dim: dim0,
                    ndim: self.ndim(),
                })?;

        Ok(Self::from_parts(self.storage.clone(), new_layout))
    }

    /// Reshape a contiguous tensor
    pub fn reshape(&self, shape: &[usize]) -> Result<Self> {
        let new_count: usize = shape.iter().product();
        if new_count != self.numel() {
            return Err(Error::shape_mismatch(self.shape(), shape));
        }
        let new_layout = self.layout.reshape(shape).ok_or(Error::NotContiguous)?;

        Ok(Self::from_parts(self.storage.clone(), new_layout))
    }

    /// Materialize a contiguous copy, or share storage if already contiguous
    pub fn contiguous(&self) -> Result<Self> {
        if self.is_contiguous() {
            return Ok(self.clone());
        }

        let dtype = self.dtype();
        let device = self.storage.device();
        let new_storage = Storage::new(self.numel(), dtype, device)?;

        let elem_size = dtype.size_in_bytes();
        R::copy_strided(
            self.storage.ptr(),
            self.layout.offset() * elem_size,
            new_storage.ptr(),
            self.shape(),
            self.strides(),
            elem_size,
            device,
        )?;

        Ok(Self::from_parts(new_storage, Layout::contiguous(self.shape())))
    }

    // ===== Data access =====

    /// Copy the tensor's elements to the host in logical (row-major) order
    ///
    /// # Panics
    ///
    /// Panics if the device copy fails. Use [`Self::try_to_vec`] to handle that case.
    pub fn to_vec<T: bytemuck::Pod>(&self) -> Vec<T> {
        self.try_to_vec().expect("Tensor::to_vec failed")
    }

    /// Copy the tensor's elements to the host in logical (row-major) order
    pub fn try_to_vec<T: bytemuck::Pod>(&self) -> Result<Vec<T>> {
        if std::mem::size_of::<T>() != self.dtype().size_in_bytes() {
            return Err(Error::invalid_argument(
                "T",
                format!(
                    "element size {} does not match dtype {}",
                    std::mem::size_of::<T>(),
                    self.dtype()
                ),
            ));
        }
        // A contiguous layout has zero offset and covers its whole storage.
        self.contiguous()?.storage.to_vec()
    }
}

/// Element count of `shape`, or an error if it overflows `usize`
fn checked_numel(shape: &[usize]) -> Result<usize> {
    shape
        .iter()
        .try_fold(1usize, |acc, &dim| acc.checked_mul(dim))
        .ok_or_else(|| {
            Error::invalid_argument("shape", format!("element count of {shape:?} overflows usize"))
        })
}

impl<R: Runtime> Clone for Tensor<R> {
    fn clone(&self) -> Self {
        Self {
            storage: self.storage.clone(),
            layout: self.layout.clone(),
        }
    }
}

impl<R: Runtime> fmt::Debug for Tensor<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tensor")
            .field("shape", &self.shape())
            .field("dtype", &self.dtype())
            .field("contiguous", &self.is_contiguous())
            .finish()
    }
}

impl<R: Runtime> fmt::Display for Tensor<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tensor({:?}, dtype={})", self.shape(), self.dtype())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::cpu::{CpuDevice, CpuRuntime};

    #[test]
    fn test_from_slice() {
        let device = CpuDevice::new();
        let data = [1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0];
        let tensor = Tensor::<CpuRuntime>::from_slice(&data, &[1, 2, 3], &device);

        assert_eq!(tensor.shape(), &[1, 2, 3]);
        assert_eq!(tensor.dtype(), DType::F32);
        assert!(tensor.is_contiguous());
        assert_eq!(tensor.numel(), 6);

        let result: Vec<f32> = tensor.to_vec();
        assert_eq!(result, data);
    }

    #[test]
    fn test_try_from_slice_len_mismatch() {
        let device = CpuDevice::new();
        let result = Tensor::<CpuRuntime>::try_from_slice(&[1.0f32, 2.0], &[3], &device);
        assert!(matches!(result, Err(Error::ShapeMismatch { .. })));
    }

    #[test]
    fn test_contiguous_from_transpose() {
        let device = CpuDevice::new();
        // [[1, 2, 3], [4, 5, 6]]
        let data = [1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0];
        let tensor = Tensor::<CpuRuntime>::from_slice(&data, &[2, 3], &device);

        let transposed = tensor.transpose(0, 1).unwrap();
        assert!(!transposed.is_contiguous());

        let contiguous = transposed.contiguous().unwrap();
        assert!(contiguous.is_contiguous());
        assert_eq!(contiguous.shape(), &[3, 2]);

        let result: Vec<f32> = contiguous.to_vec();
        assert_eq!(result, [1.0, 4.0, 2.0, 5.0, 3.0, 6.0]);
        // to_vec on the strided view yields the same logical order
        assert_eq!(transposed.to_vec::<f32>(), result);
    }

    #[test]
    fn test_reshape() {
        let device = CpuDevice::new();
        let data = [1.0f64, 2.0, 3.0, 4.0];
        let tensor = Tensor::<CpuRuntime>::from_slice(&data, &[4], &device);

        let reshaped = tensor.reshape(&[1, 1, 2, 2]).unwrap();
        assert_eq!(reshaped.shape(), &[1, 1, 2, 2]);
        assert_eq!(reshaped.to_vec::<f64>(), data);
        assert!(tensor.reshape(&[3]).is_err());
    }

    #[test]
    fn test_zeros() {
        let device = CpuDevice::new();
        let tensor = Tensor::<CpuRuntime>::zeros(&[2, 3], DType::F64, &device);
        assert_eq!(tensor.to_vec::<f64>(), vec![0.0; 6]);
    }

    #[test]
    fn test_try_empty_rejects_overflowing_shape() {
        let device = CpuDevice::new();
        let result = Tensor::<CpuRuntime>::try_empty(&[usize::MAX, 2], DType::F32, &device);
        assert!(matches!(result, Err(Error::InvalidArgument { arg: "shape", .. })));

        // Element count fits, byte size does not
        let result = Tensor::<CpuRuntime>::try_zeros(&[usize::MAX / 2], DType::F64, &device);
        assert!(matches!(result, Err(Error::OutOfMemory { .. })));
        let result = Tensor::<CpuRuntime>::try_empty(&[usize::MAX / 2], DType::F64, &device);
        assert!(matches!(result, Err(Error::OutOfMemory { .. })));
    }

    #[test]
    fn test_to_vec_wrong_element_size() {
        let device = CpuDevice::new();
        let tensor = Tensor::<CpuRuntime>::from_slice(&[1.0f32], &[1], &device);
        assert!(tensor.try_to_vec::<f64>().is_err());
    }
}
