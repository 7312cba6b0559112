//! Shared validation and index helpers for the im2col convolution.
//!
//! Every backend runs [`validate_smm_conv2d`] before touching device memory
//! and hands the resulting [`SmmConv2dParams`] to its kernels, so all backends
//! agree on shapes, padding arithmetic and buffer offsets.

use crate::algorithm::{ColumnLayout, output_extent};
use crate::dtype::DType;
use crate::error::{Error, Result};
use crate::ops::{Conv2dArgs, PaddingMode};
use crate::runtime::{Device, Runtime};
use crate::tensor::Tensor;

const OP: &str = "smm_conv2d";

/// Logical view of a convolution input shape, `[N, C, H, W]` or `[C, H, W]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConvShape {
    batch: Option<usize>,
    channels: usize,
    height: usize,
    width: usize,
}

impl ConvShape {
    /// Interpret a rank-3 (unbatched) or rank-4 (batched) input shape.
    pub fn from_input(shape: &[usize]) -> Result<Self> {
        match *shape {
            [n, c, h, w] => Ok(Self {
                batch: Some(n),
                channels: c,
                height: h,
                width: w,
            }),
            [c, h, w] => Ok(Self {
                batch: None,
                channels: c,
                height: h,
                width: w,
            }),
            _ => Err(Error::invalid_argument(
                "input",
                format!("{OP} expects 3D or 4D input, got {}D", shape.len()),
            )),
        }
    }

    /// Whether the input carries a batch dimension
    #[inline]
    pub fn is_batched(&self) -> bool {
        self.batch.is_some()
    }

    /// Number of samples; 1 for unbatched input
    #[inline]
    pub fn batch_size(&self) -> usize {
        self.batch.unwrap_or(1)
    }

    /// Channel count
    #[inline]
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Spatial height
    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Spatial width
    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }
}

/// Validated parameters for one im2col convolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SmmConv2dParams {
    /// Output keeps a batch dimension
    pub batched: bool,
    /// Number of samples (1 when unbatched)
    pub samples: usize,
    /// Input channels
    pub c_in: usize,
    /// Input height
    pub height: usize,
    /// Input width
    pub width: usize,
    /// Output channels
    pub c_out: usize,
    /// Kernel height
    pub kernel_h: usize,
    /// Kernel width
    pub kernel_w: usize,
    /// Zero rows added above and below
    pub pad_h: usize,
    /// Zero columns added left and right
    pub pad_w: usize,
    /// Vertical stride
    pub stride_h: usize,
    /// Horizontal stride
    pub stride_w: usize,
    /// Vertical tap spacing
    pub dilation_h: usize,
    /// Horizontal tap spacing
    pub dilation_w: usize,
    /// Output height
    pub output_h: usize,
    /// Output width
    pub output_w: usize,
}

impl SmmConv2dParams {
    /// Taps per channel, `K_h * K_w`
    #[inline]
    pub fn kernel_area(&self) -> usize {
        self.kernel_h * self.kernel_w
    }

    /// Output positions per channel, `H_out * W_out`
    #[inline]
    pub fn out_area(&self) -> usize {
        self.output_h * self.output_w
    }

    /// Layout of the intermediate column buffer
    #[inline]
    pub fn column_layout(&self) -> ColumnLayout {
        ColumnLayout::new(self.samples, self.out_area(), self.c_in, self.kernel_area())
    }

    /// Output tensor shape; rank follows the input
    pub fn output_shape(&self) -> Vec<usize> {
        if self.batched {
            vec![self.samples, self.c_out, self.output_h, self.output_w]
        } else {
            vec![self.c_out, self.output_h, self.output_w]
        }
    }

    /// Input row read by output row `out_h` at kernel row `ker_h`, if in bounds
    #[inline]
    pub fn source_row(&self, out_h: usize, ker_h: usize) -> Option<usize> {
        (out_h * self.stride_h + ker_h * self.dilation_h)
            .checked_sub(self.pad_h)
            .filter(|&h| h < self.height)
    }

    /// Input column read by output column `out_w` at kernel column `ker_w`, if in bounds
    #[inline]
    pub fn source_col(&self, out_w: usize, ker_w: usize) -> Option<usize> {
        (out_w * self.stride_w + ker_w * self.dilation_w)
            .checked_sub(self.pad_w)
            .filter(|&w| w < self.width)
    }

    /// Offset of `input[sample, channel, h, w]` in a contiguous input
    #[inline]
    pub fn input_index(&self, sample: usize, channel: usize, h: usize, w: usize) -> usize {
        ((sample * self.c_in + channel) * self.height + h) * self.width + w
    }

    /// Offset of the first weight of `out_channel` in a contiguous weight
    #[inline]
    pub fn weight_row_offset(&self, out_channel: usize) -> usize {
        out_channel * self.c_in * self.kernel_area()
    }

    /// Offset of `output[sample, out_channel, out_pos]` in the contiguous output
    #[inline]
    pub fn output_index(&self, sample: usize, out_channel: usize, out_pos: usize) -> usize {
        (sample * self.c_out + out_channel) * self.out_area() + out_pos
    }
}

fn validate_positive(value: usize, name: &'static str) -> Result<()> {
    if value == 0 {
        return Err(Error::invalid_argument(
            name,
            format!("{OP} requires {name} > 0, got 0"),
        ));
    }
    Ok(())
}

fn validate_nonzero_dim(value: usize, what: &str, arg: &'static str) -> Result<()> {
    if value == 0 {
        return Err(Error::invalid_argument(
            arg,
            format!("{OP} does not accept a zero-sized {what}"),
        ));
    }
    Ok(())
}

/// Rejects geometries whose output or column buffer cannot be addressed.
///
/// Every element count and byte size derived from the output extents must fit
/// in `isize`, the largest allocation the host can describe.
fn validate_buffer_sizes(
    samples: usize,
    c_in: usize,
    c_out: usize,
    kernel_area: usize,
    output_h: usize,
    output_w: usize,
    dtype: DType,
) -> Result<()> {
    let addressable = |elems: Option<usize>| {
        elems
            .and_then(|n| n.checked_mul(dtype.size_in_bytes()))
            .is_some_and(|bytes| bytes <= isize::MAX as usize)
    };

    let out_area = output_h.checked_mul(output_w);
    let output_len = out_area
        .and_then(|a| a.checked_mul(samples))
        .and_then(|n| n.checked_mul(c_out));
    let column_len = out_area
        .and_then(|a| a.checked_mul(samples))
        .and_then(|n| n.checked_mul(c_in))
        .and_then(|n| n.checked_mul(kernel_area));

    if !addressable(output_len) {
        return Err(Error::invalid_argument(
            "output_size",
            format!(
                "{OP} output of {samples}x{c_out}x{output_h}x{output_w} {dtype} elements \
                 is not addressable"
            ),
        ));
    }
    if !addressable(column_len) {
        return Err(Error::invalid_argument(
            "output_size",
            format!(
                "{OP} column buffer of {samples}x{output_h}x{output_w}x{c_in}x{kernel_area} \
                 {dtype} elements is not addressable"
            ),
        ));
    }
    Ok(())
}

/// Validates arguments and derives the parameters of an im2col convolution.
///
/// Checks run in a fixed order and stop at the first failure, so a call with
/// an unsupported padding mode or group count fails on that even when other
/// arguments are also wrong.
pub fn validate_smm_conv2d(
    input_shape: &[usize],
    weight_shape: &[usize],
    bias_shape: Option<&[usize]>,
    args: &Conv2dArgs,
    input_dtype: DType,
    weight_dtype: DType,
    bias_dtype: Option<DType>,
) -> Result<SmmConv2dParams> {
    if args.padding_mode != PaddingMode::Zeros {
        return Err(Error::invalid_argument(
            "padding_mode",
            format!(
                "{OP} only supports zero padding, got '{}'",
                args.padding_mode.name()
            ),
        ));
    }
    if args.groups != 1 {
        return Err(Error::invalid_argument(
            "groups",
            format!("{OP} requires groups == 1, got {}", args.groups),
        ));
    }

    validate_positive(args.stride.0, "stride_h")?;
    validate_positive(args.stride.1, "stride_w")?;
    validate_positive(args.dilation.0, "dilation_h")?;
    validate_positive(args.dilation.1, "dilation_w")?;

    let input = ConvShape::from_input(input_shape)?;
    let [c_out, weight_c_in, kernel_h, kernel_w] = *weight_shape else {
        return Err(Error::invalid_argument(
            "weight",
            format!("{OP} expects 4D weight, got {}D", weight_shape.len()),
        ));
    };
    if let Some(b_shape) = bias_shape
        && (b_shape.len() != 1 || b_shape[0] != c_out)
    {
        return Err(Error::invalid_argument(
            "bias",
            format!("{OP} bias should have shape [{c_out}], got {b_shape:?}"),
        ));
    }

    validate_nonzero_dim(input.batch_size(), "batch", "input")?;
    validate_nonzero_dim(input.channels(), "input channel axis", "input")?;
    validate_nonzero_dim(input.height(), "input height", "input")?;
    validate_nonzero_dim(input.width(), "input width", "input")?;
    validate_nonzero_dim(c_out, "output channel axis", "weight")?;
    validate_nonzero_dim(kernel_h, "kernel height", "weight")?;
    validate_nonzero_dim(kernel_w, "kernel width", "weight")?;

    if weight_c_in != input.channels() {
        return Err(Error::invalid_argument(
            "weight",
            format!(
                "{OP} weight.shape[1] should be C_in = {}, got {weight_c_in}",
                input.channels()
            ),
        ));
    }

    if !input_dtype.is_float() {
        return Err(Error::unsupported_dtype(input_dtype, OP));
    }
    for other in std::iter::once(weight_dtype).chain(bias_dtype) {
        if other != input_dtype {
            return Err(Error::DTypeMismatch {
                lhs: input_dtype,
                rhs: other,
            });
        }
    }

    let (pad_h, pad_w) = args.padding;
    let (stride_h, stride_w) = args.stride;
    let (dilation_h, dilation_w) = args.dilation;
    let extent = |input: usize, kernel: usize, pad: usize, dilation: usize, stride: usize, axis| {
        output_extent(input, kernel, pad, dilation, stride).ok_or_else(|| {
            Error::invalid_argument(
                "output_size",
                format!(
                    "{OP} output {axis} would be non-positive: input {input}, kernel {kernel}, \
                     padding {pad}, dilation {dilation}, stride {stride}"
                ),
            )
        })
    };
    let output_h = extent(input.height(), kernel_h, pad_h, dilation_h, stride_h, "height")?;
    let output_w = extent(input.width(), kernel_w, pad_w, dilation_w, stride_w, "width")?;
    validate_buffer_sizes(
        input.batch_size(),
        input.channels(),
        c_out,
        kernel_h * kernel_w,
        output_h,
        output_w,
        input_dtype,
    )?;

    Ok(SmmConv2dParams {
        batched: input.is_batched(),
        samples: input.batch_size(),
        c_in: input.channels(),
        height: input.height(),
        width: input.width(),
        c_out,
        kernel_h,
        kernel_w,
        pad_h,
        pad_w,
        stride_h,
        stride_w,
        dilation_h,
        dilation_w,
        output_h,
        output_w,
    })
}

/// Validates that every operand lives on `device`.
pub fn validate_same_device<R: Runtime>(
    device: &R::Device,
    input: &Tensor<R>,
    weight: &Tensor<R>,
    bias: Option<&Tensor<R>>,
) -> Result<()> {
    let on_device = |t: &Tensor<R>| t.device().is_same(device);
    if on_device(input) && on_device(weight) && bias.is_none_or(on_device) {
        Ok(())
    } else {
        Err(Error::DeviceMismatch)
    }
}
