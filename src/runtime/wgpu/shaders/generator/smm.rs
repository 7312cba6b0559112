//! WGSL shader generation for the im2col convolution
//!
//! Both shaders bind the same `SmmParams` uniform and index the column
//! buffer through the functions of [`ColumnLayout::WGSL`], so the column
//! builder and the GEMM agree on the linearization.

use super::common::{is_wgsl_float, wgsl_type, wgsl_zero};
use crate::algorithm::ColumnLayout;
use crate::dtype::DType;
use crate::error::{Error, Result};

/// Entry point of the column-builder shader
pub const COLUMNS_ENTRY: &str = "smm_columns";

/// Entry point of the GEMM shader
pub const GEMM_ENTRY: &str = "smm_gemm";

const PARAMS_STRUCT: &str = r#"
struct SmmParams {
    samples: u32,
    in_channels: u32,
    height: u32,
    width: u32,
    out_channels: u32,
    kernel_h: u32,
    kernel_w: u32,
    pad_h: u32,
    pad_w: u32,
    stride_h: u32,
    stride_w: u32,
    dilation_h: u32,
    dilation_w: u32,
    out_h: u32,
    out_w: u32,
    out_area: u32,
    kernel_area: u32,
    has_bias: u32,
    _pad0: u32,
    _pad1: u32,
}
"#;

fn check_float(dtype: DType, op: &'static str) -> Result<()> {
    if is_wgsl_float(dtype) {
        Ok(())
    } else {
        Err(Error::UnsupportedDType { dtype, op })
    }
}

/// Generate the column builder.
///
/// Invocation `(tap, channel, sample)` on `(x, y, z)` fills every column
/// row's entry for that tap, writing zero where the tap reads padding.
/// `workgroup` is `[x, y, z]`.
pub fn generate_smm_columns_shader(dtype: DType, workgroup: [u32; 3]) -> Result<String> {
    check_float(dtype, "smm_columns")?;
    let t = wgsl_type(dtype)?;
    let zero = wgsl_zero(dtype)?;
    let [wx, wy, wz] = workgroup;

    Ok(format!(
        r#"// Auto-generated smm column builder for {t}
{params_struct}
@group(0) @binding(0) var<storage, read> smm_input: array<{t}>;
@group(0) @binding(1) var<storage, read_write> smm_columns: array<{t}>;
@group(0) @binding(2) var<uniform> params: SmmParams;
{col_fns}
@compute @workgroup_size({wx}, {wy}, {wz})
fn {entry}(@builtin(global_invocation_id) gid: vec3<u32>) {{
    let tap = gid.x;
    let channel = gid.y;
    let sample = gid.z;
    if (tap >= params.kernel_area || channel >= params.in_channels || sample >= params.samples) {{
        return;
    }}

    let ker_h = tap / params.kernel_w;
    let ker_w = tap % params.kernel_w;
    let plane = (sample * params.in_channels + channel) * params.height;

    for (var out_h: u32 = 0u; out_h < params.out_h; out_h = out_h + 1u) {{
        // Offsets into the padded input; padding lies below pad or at pad + extent
        let row = out_h * params.stride_h + ker_h * params.dilation_h;
        let row_ok = row >= params.pad_h && row - params.pad_h < params.height;
        for (var out_w: u32 = 0u; out_w < params.out_w; out_w = out_w + 1u) {{
            let col = out_w * params.stride_w + ker_w * params.dilation_w;
            var value: {t} = {zero};
            if (row_ok && col >= params.pad_w && col - params.pad_w < params.width) {{
                value = smm_input[(plane + row - params.pad_h) * params.width + col - params.pad_w];
            }}
            let out_pos = out_h * params.out_w + out_w;
            smm_columns[col_index(sample, out_pos, channel, tap)] = value;
        }}
    }}
}}
"#,
        t = t,
        zero = zero,
        params_struct = PARAMS_STRUCT,
        col_fns = ColumnLayout::WGSL,
        entry = COLUMNS_ENTRY,
    ))
}

/// Generate the GEMM.
///
/// Invocation `(out_pos, out_channel, sample)` on `(x, y, z)` reduces one
/// column row against one kernel row, in index order, and adds the bias
/// when `params.has_bias` is set.
pub fn generate_smm_gemm_shader(dtype: DType, workgroup: [u32; 3]) -> Result<String> {
    check_float(dtype, "smm_gemm")?;
    let t = wgsl_type(dtype)?;
    let zero = wgsl_zero(dtype)?;
    let [wx, wy, wz] = workgroup;

    Ok(format!(
        r#"// Auto-generated smm gemm for {t}
{params_struct}
@group(0) @binding(0) var<storage, read> smm_columns: array<{t}>;
@group(0) @binding(1) var<storage, read> smm_weight: array<{t}>;
@group(0) @binding(2) var<storage, read> smm_bias: array<{t}>;
@group(0) @binding(3) var<storage, read_write> smm_output: array<{t}>;
@group(0) @binding(4) var<uniform> params: SmmParams;
{col_fns}
@compute @workgroup_size({wx}, {wy}, {wz})
fn {entry}(@builtin(global_invocation_id) gid: vec3<u32>) {{
    let out_pos = gid.x;
    let out_c = gid.y;
    let sample = gid.z;
    if (out_pos >= params.out_area || out_c >= params.out_channels || sample >= params.samples) {{
        return;
    }}

    let height = col_height();
    let col_row = col_row_offset(sample, out_pos);
    let ker_row = out_c * height;

    var acc: {t} = {zero};
    for (var i: u32 = 0u; i < height; i = i + 1u) {{
        acc = acc + smm_columns[col_row + i] * smm_weight[ker_row + i];
    }}

    if (params.has_bias != 0u) {{
        acc = acc + smm_bias[out_c];
    }}

    smm_output[(sample * params.out_channels + out_c) * params.out_area + out_pos] = acc;
}}
"#,
        t = t,
        zero = zero,
        params_struct = PARAMS_STRUCT,
        col_fns = ColumnLayout::WGSL,
        entry = GEMM_ENTRY,
    ))
}
