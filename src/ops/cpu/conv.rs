//! CPU implementation of convolution operations.

use crate::algorithm::SmmLaunchPlan;
use crate::dtype::{DType, Element};
use crate::error::{Error, Result};
use crate::ops::conv_common::{SmmConv2dParams, validate_same_device, validate_smm_conv2d};
use crate::ops::{Conv2dArgs, ConvOps, PaddingMode};
use crate::runtime::cpu::{CpuClient, CpuRuntime, kernels};
use crate::runtime::{Device, RuntimeClient, ensure_contiguous};
use crate::tensor::Tensor;

/// Dispatch to a generic body for float types only
macro_rules! dispatch_float_dtype {
    ($dtype:expr, $T:ident => $body:block, $op:expr) => {
        match $dtype {
            DType::F32 => {
                type $T = f32;
                $body
            }
            DType::F64 => {
                type $T = f64;
                $body
            }
            #[cfg(feature = "f16")]
            DType::F16 => {
                type $T = half::f16;
                $body
            }
            #[cfg(feature = "f16")]
            DType::BF16 => {
                type $T = half::bf16;
                $body
            }
            _ => {
                return Err(Error::UnsupportedDType {
                    dtype: $dtype,
                    op: $op,
                })
            }
        }
    };
}

impl ConvOps<CpuRuntime> for CpuClient {
    fn smm_conv2d(
        &self,
        input: &Tensor<CpuRuntime>,
        weight: &Tensor<CpuRuntime>,
        bias: Option<&Tensor<CpuRuntime>>,
        padding: (usize, usize),
        stride: (usize, usize),
        dilation: (usize, usize),
        padding_mode: PaddingMode,
        groups: usize,
    ) -> Result<Tensor<CpuRuntime>> {
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
        validate_same_device::<CpuRuntime>(&self.device, input, weight, bias)?;

        dispatch_float_dtype!(input.dtype(), T => {
            smm_conv2d_typed::<T>(self, input, weight, bias, &params)
        }, "smm_conv2d")
    }
}

fn smm_conv2d_typed<T: Element>(
    client: &CpuClient,
    input: &Tensor<CpuRuntime>,
    weight: &Tensor<CpuRuntime>,
    bias: Option<&Tensor<CpuRuntime>>,
    params: &SmmConv2dParams,
) -> Result<Tensor<CpuRuntime>> {
    let input = ensure_contiguous(input)?;
    let weight = ensure_contiguous(weight)?;
    let bias = bias.map(ensure_contiguous).transpose()?;

    let layout = params.column_layout();
    let plan = SmmLaunchPlan::new(
        &layout,
        params.c_out,
        client.device.max_work_group_size(),
        &client.work_group_config(),
    );
    log::debug!(
        "smm_conv2d on {}: input {:?} weight {:?} -> output {:?}, bias={}",
        client.device.name(),
        input.shape(),
        weight.shape(),
        params.output_shape(),
        bias.is_some()
    );

    let output = Tensor::<CpuRuntime>::try_empty(&params.output_shape(), T::DTYPE, &client.device)?;
    let columns = Tensor::<CpuRuntime>::try_empty(
        &[layout.samples, layout.out_area, layout.col_height()],
        T::DTYPE,
        &client.device,
    )?;

    log::trace!(
        "smm_conv2d columns: global {:?} local {:?}",
        plan.columns.global,
        plan.columns.local
    );
    unsafe {
        kernels::smm_columns_kernel::<T>(
            client,
            input.storage().ptr() as *const T,
            columns.storage().ptr() as *mut T,
            params,
            &plan.columns,
        );
    }
    client.synchronize()?;

    log::trace!(
        "smm_conv2d gemm: global {:?} local {:?}",
        plan.gemm.global,
        plan.gemm.local
    );
    unsafe {
        kernels::smm_gemm_kernel::<T>(
            client,
            columns.storage().ptr() as *const T,
            weight.storage().ptr() as *const T,
            bias.as_ref().map(|b| b.storage().ptr() as *const T),
            output.storage().ptr() as *mut T,
            params,
            &plan.gemm,
        );
    }
    client.synchronize()?;

    Ok(output)
}
