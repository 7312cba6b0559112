//! Column-builder and GEMM kernels of the im2col convolution.

use crate::algorithm::NdRange;
use crate::dtype::Element;
use crate::ops::conv_common::SmmConv2dParams;
use crate::runtime::cpu::CpuClient;

/// Fill the column buffer from a contiguous input.
///
/// One invocation per `(sample, channel, tap)` of `range`; invocations whose
/// tap lies past the kernel area (tile rounding) do nothing. Each invocation
/// walks every output position and writes the input value its tap reads, or
/// zero when that position falls in the padding.
///
/// # Safety
///
/// - `input` must point to `samples * c_in * height * width` contiguous elements
/// - `columns` must point to `params.column_layout().len()` writable elements
/// - `range` must be the column range planned for `params`
pub unsafe fn smm_columns_kernel<T: Element>(
    client: &CpuClient,
    input: *const T,
    columns: *mut T,
    params: &SmmConv2dParams,
    range: &NdRange,
) {
    let layout = params.column_layout();
    let kernel_area = params.kernel_area();
    let input_addr = input as usize;
    let columns_addr = columns as usize;

    client.parallel_for(range, |item| {
        let sample = item.global_id(0);
        let channel = item.global_id(1);
        let tap = item.global_id(2);
        if tap >= kernel_area {
            return;
        }
        let ker_h = tap / params.kernel_w;
        let ker_w = tap % params.kernel_w;

        let input = input_addr as *const T;
        let columns = columns_addr as *mut T;

        for out_h in 0..params.output_h {
            let src_h = params.source_row(out_h, ker_h);
            for out_w in 0..params.output_w {
                let value = match (src_h, params.source_col(out_w, ker_w)) {
                    (Some(h), Some(w)) => unsafe {
                        *input.add(params.input_index(sample, channel, h, w))
                    },
                    _ => T::zero(),
                };
                let out_pos = out_h * params.output_w + out_w;
                unsafe {
                    *columns.add(layout.index(sample, out_pos, channel, tap)) = value;
                }
            }
        }
    });
}

/// Multiply column rows by kernel rows into the output.
///
/// One invocation per `(sample, out_channel, out_pos)` of `range`;
/// invocations outside `c_out x out_area` (tile rounding) do nothing. The
/// reduction runs in a fixed order, so results do not depend on scheduling.
///
/// # Safety
///
/// - `columns` must hold a fully written column buffer for `params`
/// - `weight` must point to `c_out * c_in * kernel_h * kernel_w` contiguous elements
/// - `bias`, when present, must point to `c_out` elements
/// - `output` must point to `samples * c_out * out_area` writable elements
/// - `range` must be the GEMM range planned for `params`
pub unsafe fn smm_gemm_kernel<T: Element>(
    client: &CpuClient,
    columns: *const T,
    weight: *const T,
    bias: Option<*const T>,
    output: *mut T,
    params: &SmmConv2dParams,
    range: &NdRange,
) {
    let layout = params.column_layout();
    let col_height = layout.col_height();
    let out_area = params.out_area();
    let columns_addr = columns as usize;
    let weight_addr = weight as usize;
    let bias_addr = bias.map(|p| p as usize);
    let output_addr = output as usize;

    client.parallel_for(range, |item| {
        let sample = item.global_id(0);
        let out_c = item.global_id(1);
        let out_pos = item.global_id(2);
        if out_pos >= out_area || out_c >= params.c_out {
            return;
        }

        let (col_row, ker_row) = unsafe {
            (
                std::slice::from_raw_parts(
                    (columns_addr as *const T).add(layout.row_offset(sample, out_pos)),
                    col_height,
                ),
                std::slice::from_raw_parts(
                    (weight_addr as *const T).add(params.weight_row_offset(out_c)),
                    col_height,
                ),
            )
        };

        let mut acc = col_row
            .iter()
            .zip(ker_row)
            .fold(T::zero(), |acc, (&c, &k)| acc + c * k);

        if let Some(addr) = bias_addr {
            acc = acc + unsafe { *(addr as *const T).add(out_c) };
        }

        unsafe {
            *(output_addr as *mut T).add(params.output_index(sample, out_c, out_pos)) = acc;
        }
    });
}
