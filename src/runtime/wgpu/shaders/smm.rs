//! Launchers for the im2col convolution shaders
//!
//! A planned [`NdRange`] is `[sample, a, b]` with the fastest-varying index
//! last; it is dispatched as `x = b`, `y = a`, `z = sample`. Launchers only
//! submit, the caller waits on the queue.

use wgpu::{Buffer, Queue};

use super::generator::{
    COLUMNS_ENTRY, GEMM_ENTRY, generate_smm_columns_shader, generate_smm_gemm_shader, wgsl_type,
};
use super::pipeline::{LayoutKey, PipelineCache};
use crate::algorithm::NdRange;
use crate::dtype::DType;
use crate::error::{Error, Result};

/// Work-group shape and count of a range, in WGSL `(x, y, z)` order
fn dispatch_dims(
    range: &NdRange,
    max_groups: u32,
    operation: &'static str,
) -> Result<([u32; 3], [u32; 3])> {
    let local = range.local;
    let groups = range.group_count();

    let to_u32 = |v: usize| {
        u32::try_from(v).ok().filter(|&v| v <= max_groups).ok_or_else(|| {
            Error::backend_limitation(
                "wgpu",
                operation,
                format!("dispatch of {groups:?} work-groups exceeds {max_groups} per dimension"),
            )
        })
    };

    let workgroup = [local[2] as u32, local[1] as u32, local[0] as u32];
    let counts = [to_u32(groups[2])?, to_u32(groups[1])?, to_u32(groups[0])?];
    Ok((workgroup, counts))
}

fn shader_name(entry: &str, dtype: DType, workgroup: [u32; 3]) -> Result<String> {
    let [x, y, z] = workgroup;
    Ok(format!("{entry}_{}_{x}x{y}x{z}", wgsl_type(dtype)?))
}

fn dispatch(
    cache: &PipelineCache,
    queue: &Queue,
    label: &'static str,
    pipeline: &wgpu::ComputePipeline,
    bind_group: &wgpu::BindGroup,
    counts: [u32; 3],
) {
    let mut encoder = cache
        .device()
        .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some(label) });

    {
        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some(label),
            timestamp_writes: None,
        });
        pass.set_pipeline(pipeline);
        pass.set_bind_group(0, Some(bind_group), &[]);
        pass.dispatch_workgroups(counts[0], counts[1], counts[2]);
    }

    queue.submit(std::iter::once(encoder.finish()));
}

/// Launch the column builder over `range` (`[samples, channels, taps]`).
///
/// # Arguments
///
/// * `input` - Contiguous input (N, C_in, H, W)
/// * `columns` - Column buffer, fully overwritten
/// * `params_buffer` - Uniform buffer with `SmmParams`
#[allow(clippy::too_many_arguments)]
pub fn launch_smm_columns(
    cache: &PipelineCache,
    queue: &Queue,
    input: &Buffer,
    columns: &Buffer,
    params_buffer: &Buffer,
    range: &NdRange,
    max_groups_per_dim: u32,
    dtype: DType,
) -> Result<()> {
    let (workgroup, counts) = dispatch_dims(range, max_groups_per_dim, COLUMNS_ENTRY)?;
    let name = shader_name(COLUMNS_ENTRY, dtype, workgroup)?;

    let source = generate_smm_columns_shader(dtype, workgroup)?;
    let module = cache.get_or_create_module(&name, &source);
    let layout = cache.get_or_create_layout(LayoutKey {
        num_storage_buffers: 2,
        num_uniform_buffers: 1,
    });
    let pipeline = cache.get_or_create_pipeline(&name, COLUMNS_ENTRY, &module, &layout);
    let bind_group = cache.create_bind_group(&layout, &[input, columns, params_buffer]);

    log::trace!("{name}: dispatch {counts:?}");
    dispatch(cache, queue, "smm_columns", &pipeline, &bind_group, counts);
    Ok(())
}

/// Launch the GEMM over `range` (`[samples, out_channels, out_area]`).
///
/// # Arguments
///
/// * `columns` - Column buffer written by [`launch_smm_columns`]
/// * `weight` - Contiguous weight (C_out, C_in, K_h, K_w)
/// * `bias` - Bias (C_out), or any buffer when `has_bias` is 0
/// * `output` - Output (N, C_out, H_out, W_out)
/// * `params_buffer` - Uniform buffer with `SmmParams`
#[allow(clippy::too_many_arguments)]
pub fn launch_smm_gemm(
    cache: &PipelineCache,
    queue: &Queue,
    columns: &Buffer,
    weight: &Buffer,
    bias: &Buffer,
    output: &Buffer,
    params_buffer: &Buffer,
    range: &NdRange,
    max_groups_per_dim: u32,
    dtype: DType,
) -> Result<()> {
    let (workgroup, counts) = dispatch_dims(range, max_groups_per_dim, GEMM_ENTRY)?;
    let name = shader_name(GEMM_ENTRY, dtype, workgroup)?;

    let source = generate_smm_gemm_shader(dtype, workgroup)?;
    let module = cache.get_or_create_module(&name, &source);
    let layout = cache.get_or_create_layout(LayoutKey {
        num_storage_buffers: 4,
        num_uniform_buffers: 1,
    });
    let pipeline = cache.get_or_create_pipeline(&name, GEMM_ENTRY, &module, &layout);
    let bind_group =
        cache.create_bind_group(&layout, &[columns, weight, bias, output, params_buffer]);

    log::trace!("{name}: dispatch {counts:?}");
    dispatch(cache, queue, "smm_gemm", &pipeline, &bind_group, counts);
    Ok(())
}
