//! Column-buffer linearization shared by both convolution phases
//!
//! The column builder writes and the GEMM kernel reads the same buffer, so both
//! must compute offsets with [`ColumnLayout::index`] (or the WGSL it emits).
//! Row `(sample, out_pos)` is contiguous over `channel * kernel_area + tap`,
//! which is the axis the GEMM reduces over.

/// Shape of the intermediate column buffer `[samples, out_area, channels * kernel_area]`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ColumnLayout {
    /// Number of samples (batch size, 1 for unbatched input)
    pub samples: usize,
    /// Output spatial area `out_h * out_w`
    pub out_area: usize,
    /// Input channel count
    pub channels: usize,
    /// Kernel taps per channel `k_h * k_w`
    pub kernel_area: usize,
}

impl ColumnLayout {
    /// Create a layout
    pub const fn new(samples: usize, out_area: usize, channels: usize, kernel_area: usize) -> Self {
        Self {
            samples,
            out_area,
            channels,
            kernel_area,
        }
    }

    /// Length of one column row, the GEMM reduction length
    #[inline]
    pub const fn col_height(&self) -> usize {
        self.channels * self.kernel_area
    }

    /// Total element count of the buffer
    #[inline]
    pub const fn len(&self) -> usize {
        self.samples * self.out_area * self.col_height()
    }

    /// Whether the buffer holds no elements
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Offset of the first element of row `(sample, out_pos)`
    #[inline]
    pub const fn row_offset(&self, sample: usize, out_pos: usize) -> usize {
        (sample * self.out_area + out_pos) * self.col_height()
    }

    /// Flat offset of `(sample, out_pos, channel, tap)`
    #[inline]
    pub const fn index(&self, sample: usize, out_pos: usize, channel: usize, tap: usize) -> usize {
        self.row_offset(sample, out_pos) + channel * self.kernel_area + tap
    }

    /// WGSL functions mirroring [`Self::row_offset`] and [`Self::index`]
    ///
    /// Expects `params.out_area`, `params.in_channels` and `params.kernel_area`
    /// to be in scope in the shader.
    pub const WGSL: &'static str = r#"
fn col_height() -> u32 {
    return params.in_channels * params.kernel_area;
}

fn col_row_offset(sample: u32, out_pos: u32) -> u32 {
    return (sample * params.out_area + out_pos) * col_height();
}

fn col_index(sample: u32, out_pos: u32, channel: u32, tap: u32) -> u32 {
    return col_row_offset(sample, out_pos) + channel * params.kernel_area + tap;
}
"#;
}
