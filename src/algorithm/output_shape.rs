//! Output-size formula for one convolution axis

/// Output extent of one spatial axis, or `None` when it would be non-positive
///
/// `floor((input + 2*padding - dilation*(kernel - 1) - 1) / stride) + 1`,
/// always rounding down. Returns `None` for a zero stride, zero dilation,
/// an empty kernel, or when the dilated kernel does not fit the padded input.
///
/// ```
/// use smmconv::algorithm::output_extent;
///
/// assert_eq!(output_extent(4, 3, 0, 1, 1), Some(2));
/// assert_eq!(output_extent(4, 3, 1, 1, 1), Some(4));
/// assert_eq!(output_extent(2, 3, 0, 1, 1), None);
/// ```
pub fn output_extent(
    input: usize,
    kernel: usize,
    padding: usize,
    dilation: usize,
    stride: usize,
) -> Option<usize> {
    if kernel == 0 || stride == 0 || dilation == 0 {
        return None;
    }
    let padded = input.checked_add(padding.checked_mul(2)?)?;
    let span = dilation.checked_mul(kernel - 1)?.checked_add(1)?;
    if padded < span {
        return None;
    }
    Some((padded - span) / stride + 1)
}
