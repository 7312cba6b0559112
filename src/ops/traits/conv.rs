//! Convolution operations for neural network layers.
//!
//! This module defines the `ConvOps` trait for 2D convolution computed as an
//! explicit im2col transform followed by a dense matrix product.

use crate::error::Result;
use crate::runtime::Runtime;
use crate::tensor::Tensor;

/// How out-of-bounds input positions are filled.
///
/// Host frameworks can request any of these; the im2col path only implements
/// zero fill and rejects the others before doing any work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PaddingMode {
    /// Out-of-bounds positions read as zero.
    #[default]
    Zeros,
    /// Mirror the input at its border, excluding the edge element.
    Reflect,
    /// Repeat the edge element.
    Replicate,
    /// Wrap around to the opposite border.
    Circular,
}

impl PaddingMode {
    /// Returns the name of the padding mode for error messages.
    pub fn name(&self) -> &'static str {
        match self {
            PaddingMode::Zeros => "zeros",
            PaddingMode::Reflect => "reflect",
            PaddingMode::Replicate => "replicate",
            PaddingMode::Circular => "circular",
        }
    }
}

/// Hyperparameters of a 2D convolution, as `(height, width)` pairs.
///
/// Defaults: no padding, unit stride and dilation, zero fill, one group.
///
/// ```
/// use smmconv::ops::{Conv2dArgs, PaddingMode};
///
/// let args = Conv2dArgs::new().padding(1, 1).stride(2, 2);
/// assert_eq!(args.dilation, (1, 1));
/// assert_eq!(args.padding_mode, PaddingMode::Zeros);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Conv2dArgs {
    /// Zero padding added to both sides of each spatial axis
    pub padding: (usize, usize),
    /// Step between consecutive output positions
    pub stride: (usize, usize),
    /// Spacing between kernel taps
    pub dilation: (usize, usize),
    /// Fill mode for padded positions
    pub padding_mode: PaddingMode,
    /// Number of channel groups
    pub groups: usize,
}

impl Default for Conv2dArgs {
    fn default() -> Self {
        Self {
            padding: (0, 0),
            stride: (1, 1),
            dilation: (1, 1),
            padding_mode: PaddingMode::Zeros,
            groups: 1,
        }
    }
}

impl Conv2dArgs {
    /// Arguments with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set padding
    pub fn padding(mut self, h: usize, w: usize) -> Self {
        self.padding = (h, w);
        self
    }

    /// Set stride
    pub fn stride(mut self, h: usize, w: usize) -> Self {
        self.stride = (h, w);
        self
    }

    /// Set dilation
    pub fn dilation(mut self, h: usize, w: usize) -> Self {
        self.dilation = (h, w);
        self
    }

    /// Set padding mode
    pub fn padding_mode(mut self, mode: PaddingMode) -> Self {
        self.padding_mode = mode;
        self
    }

    /// Set group count
    pub fn groups(mut self, groups: usize) -> Self {
        self.groups = groups;
        self
    }
}

/// Convolution operations.
///
/// # Memory Layout
///
/// - **Input**: (N, C_in, H, W) batched, or (C_in, H, W) unbatched
/// - **Weight**: (C_out, C_in, K_h, K_w)
/// - **Bias**: (C_out,)
/// - **Output**: (N, C_out, H_out, W_out), or (C_out, H_out, W_out) for unbatched input
///
/// # Backend Support
///
/// - **CPU**: F32, F64, F16 and BF16 (with `f16` feature)
/// - **WebGPU**: F32 only
pub trait ConvOps<R: Runtime> {
    /// 2D convolution via an explicit column buffer and a dense product.
    ///
    /// Runs two device launches separated by a blocking wait:
    /// 1. build the column buffer `[N, H_out*W_out, C_in*K_h*K_w]` from the
    ///    input, writing zero where a tap falls outside the input
    /// 2. multiply each column row by each flattened kernel row and add the
    ///    channel's bias if one was given
    ///
    /// Output extents follow
    /// `H_out = floor((H + 2*pad_h - dilation_h*(K_h - 1) - 1) / stride_h) + 1`
    /// (likewise for W).
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidArgument` before any allocation if:
    /// - `padding_mode` is not [`PaddingMode::Zeros`]
    /// - `groups != 1`
    /// - stride or dilation has a zero component
    /// - input is not 3D/4D, weight is not 4D, or bias is not 1D of length C_out
    /// - any dimension is zero, or weight's C_in differs from the input's
    /// - an output extent would be zero or negative (`arg: "output_size"`)
    ///
    /// Returns `Error::UnsupportedDType` / `Error::DTypeMismatch` for non-float
    /// or mixed dtypes, `Error::DeviceMismatch` for operands on another device,
    /// and backend errors raised while waiting on the device.
    ///
    /// # Examples
    ///
    /// ```ignore
    /// let output = client.smm_conv2d(
    ///     &input, &weight, Some(&bias),
    ///     (1, 1), (1, 1), (1, 1),
    ///     PaddingMode::Zeros, 1,
    /// )?;
    /// ```
    #[allow(clippy::too_many_arguments)]
    fn smm_conv2d(
        &self,
        input: &Tensor<R>,
        weight: &Tensor<R>,
        bias: Option<&Tensor<R>>,
        padding: (usize, usize),
        stride: (usize, usize),
        dilation: (usize, usize),
        padding_mode: PaddingMode,
        groups: usize,
    ) -> Result<Tensor<R>>;

    /// [`Self::smm_conv2d`] with hyperparameters bundled in [`Conv2dArgs`].
    fn conv2d(
        &self,
        input: &Tensor<R>,
        weight: &Tensor<R>,
        bias: Option<&Tensor<R>>,
        args: &Conv2dArgs,
    ) -> Result<Tensor<R>> {
        self.smm_conv2d(
            input,
            weight,
            bias,
            args.padding,
            args.stride,
            args.dilation,
            args.padding_mode,
            args.groups,
        )
    }
}
