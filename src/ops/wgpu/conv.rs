//! WebGPU implementation of convolution operations.

use crate::algorithm::SmmLaunchPlan;
use crate::dtype::DType;
use crate::error::{Error, Result};
use crate::ops::conv_common::{SmmConv2dParams, validate_same_device, validate_smm_conv2d};
use crate::ops::{Conv2dArgs, ConvOps, PaddingMode};
use crate::runtime::wgpu::shaders::smm as smm_launcher;
use crate::runtime::wgpu::{WgpuClient, WgpuRuntime, require_buffer};
use crate::runtime::{Device, RuntimeClient, ensure_contiguous};
use crate::tensor::Tensor;

// ============================================================================
// Params Struct (must match SmmParams in the WGSL shaders)
// ============================================================================

#[repr(C)]
#[derive(Clone, Copy, Debug, bytemuck::Pod, bytemuck::Zeroable)]
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

impl SmmParams {
    /// Narrow to shader integers; every element index must also fit in u32
    fn new(params: &SmmConv2dParams, has_bias: bool) -> Result<Self> {
        let layout = params.column_layout();
        let largest_index = [
            params.samples * params.c_in * params.height * params.width,
            params.c_out * layout.col_height(),
            layout.len(),
            params.samples * params.c_out * params.out_area(),
        ]
        .into_iter()
        .max()
        .unwrap_or(0);
        if u32::try_from(largest_index).is_err() {
            return Err(Error::backend_limitation(
                "wgpu",
                "smm_conv2d",
                format!("{largest_index} elements exceed 32-bit shader indexing"),
            ));
        }

        let narrow = |arg: &'static str, v: usize| {
            u32::try_from(v).map_err(|_| {
                Error::backend_limitation("wgpu", "smm_conv2d", format!("{arg} = {v} exceeds u32"))
            })
        };

        Ok(Self {
            samples: narrow("samples", params.samples)?,
            in_channels: narrow("in_channels", params.c_in)?,
            height: narrow("height", params.height)?,
            width: narrow("width", params.width)?,
            out_channels: narrow("out_channels", params.c_out)?,
            kernel_h: narrow("kernel_h", params.kernel_h)?,
            kernel_w: narrow("kernel_w", params.kernel_w)?,
            pad_h: narrow("pad_h", params.pad_h)?,
            pad_w: narrow("pad_w", params.pad_w)?,
            stride_h: narrow("stride_h", params.stride_h)?,
            stride_w: narrow("stride_w", params.stride_w)?,
            dilation_h: narrow("dilation_h", params.dilation_h)?,
            dilation_w: narrow("dilation_w", params.dilation_w)?,
            out_h: narrow("out_h", params.output_h)?,
            out_w: narrow("out_w", params.output_w)?,
            out_area: narrow("out_area", params.out_area())?,
            kernel_area: narrow("kernel_area", params.kernel_area())?,
            has_bias: u32::from(has_bias),
            _pad0: 0,
            _pad1: 0,
        })
    }
}

impl ConvOps<WgpuRuntime> for WgpuClient {
    fn smm_conv2d(
        &self,
        input: &Tensor<WgpuRuntime>,
        weight: &Tensor<WgpuRuntime>,
        bias: Option<&Tensor<WgpuRuntime>>,
        padding: (usize, usize),
        stride: (usize, usize),
        dilation: (usize, usize),
        padding_mode: PaddingMode,
        groups: usize,
    ) -> Result<Tensor<WgpuRuntime>> {
        let args = Conv2dArgs {
            padding,
            stride,
            dilation,
            padding_mode,
            groups,
        };
        let params = validate_smm_conv2d(
            input.shape(),
            weight.shape(),
            bias.map(|b| b.shape()),
            &args,
            input.dtype(),
            weight.dtype(),
            bias.map(|b| b.dtype()),
        )?;
        validate_same_device::<WgpuRuntime>(self.device(), input, weight, bias)?;

        let dtype = input.dtype();
        if dtype != DType::F32 {
            return Err(Error::UnsupportedDType {
                dtype,
                op: "smm_conv2d (wgpu)",
            });
        }

        smm_conv2d_f32(self, input, weight, bias, &params)
    }
}

fn smm_conv2d_f32(
    client: &WgpuClient,
    input: &Tensor<WgpuRuntime>,
    weight: &Tensor<WgpuRuntime>,
    bias: Option<&Tensor<WgpuRuntime>>,
    params: &SmmConv2dParams,
) -> Result<Tensor<WgpuRuntime>> {
    let dtype = DType::F32;
    let device = client.device();

    let layout = params.column_layout();
    let column_bytes = (layout.len() * dtype.size_in_bytes()) as u64;
    if column_bytes > device.max_storage_buffer_size() {
        return Err(Error::backend_limitation(
            "wgpu",
            "smm_conv2d",
            format!(
                "column buffer of {column_bytes} bytes exceeds the {} byte binding limit",
                device.max_storage_buffer_size()
            ),
        ));
    }
    let shader_params = SmmParams::new(params, bias.is_some())?;

    let input = ensure_contiguous(input)?;
    let weight = ensure_contiguous(weight)?;
    let bias = bias.map(ensure_contiguous).transpose()?;

    let plan = SmmLaunchPlan::new(
        &layout,
        params.c_out,
        device.max_work_group_size(),
        &client.work_group_config(),
    );
    log::debug!(
        "smm_conv2d on {} ({}): input {:?} weight {:?} -> output {:?}, bias={}",
        device.name(),
        device.adapter_name(),
        input.shape(),
        weight.shape(),
        params.output_shape(),
        bias.is_some()
    );

    let output = Tensor::<WgpuRuntime>::try_empty(&params.output_shape(), dtype, device)?;
    let columns = Tensor::<WgpuRuntime>::try_empty(
        &[layout.samples, layout.out_area, layout.col_height()],
        dtype,
        device,
    )?;

    let input_buf = require_buffer(input.storage().ptr(), "input")?;
    let weight_buf = require_buffer(weight.storage().ptr(), "weight")?;
    let output_buf = require_buffer(output.storage().ptr(), "output")?;
    let columns_buf = require_buffer(columns.storage().ptr(), "columns")?;

    // The GEMM layout always binds a bias; without one, a single unread element stands in
    let dummy_bias;
    let bias_buf = match &bias {
        Some(b) => require_buffer(b.storage().ptr(), "bias")?,
        None => {
            dummy_bias = Tensor::<WgpuRuntime>::try_zeros(&[1], dtype, device)?;
            require_buffer(dummy_bias.storage().ptr(), "bias")?
        }
    };

    let params_buf = client.create_uniform_buffer("smm_params", &shader_params);
    let max_groups = device.max_workgroups_per_dimension();

    smm_launcher::launch_smm_columns(
        client.pipeline_cache(),
        client.wgpu_queue(),
        &input_buf,
        &columns_buf,
        &params_buf,
        &plan.columns,
        max_groups,
        dtype,
    )?;
    client.synchronize()?;

    smm_launcher::launch_smm_gemm(
        client.pipeline_cache(),
        client.wgpu_queue(),
        &columns_buf,
        &weight_buf,
        &bias_buf,
        &output_buf,
        &params_buf,
        &plan.gemm,
        max_groups,
        dtype,
    )?;
    client.synchronize()?;

    Ok(output)
}
