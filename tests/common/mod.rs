//! Common test utilities
#![allow(dead_code)]

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use smmconv::runtime::Runtime;
use smmconv::runtime::cpu::{CpuClient, CpuDevice, CpuRuntime};
#[cfg(feature = "wgpu")]
use smmconv::runtime::wgpu::{WgpuClient, WgpuDevice, WgpuRuntime};

/// Route `log` output through the test harness (`RUST_LOG=smmconv=trace`)
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Create a CPU client and device for testing
pub fn create_cpu_client() -> (CpuClient, CpuDevice) {
    init_logging();
    let device = CpuDevice::new();
    let client = CpuRuntime::default_client(&device);
    (client, device)
}

/// Create a WebGPU client and device, returning None if WebGPU is unavailable
#[cfg(feature = "wgpu")]
pub fn create_wgpu_client() -> Option<(WgpuClient, WgpuDevice)> {
    init_logging();
    if !smmconv::runtime::wgpu::is_wgpu_available() {
        return None;
    }
    let init = std::panic::catch_unwind(|| {
        let device = WgpuDevice::new(0);
        let client = WgpuRuntime::default_client(&device);
        (client, device)
    });
    init.ok()
}

/// Reproducible values in `[-1, 1)`
pub fn random_f32(len: usize, seed: u64) -> Vec<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..len).map(|_| rng.random_range(-1.0f32..1.0)).collect()
}

/// Reproducible values in `[-1, 1)`
pub fn random_f64(len: usize, seed: u64) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..len).map(|_| rng.random_range(-1.0f64..1.0)).collect()
}

/// Assert two f64 slices are close within tolerance
///
/// Uses the formula: |a - b| <= atol + rtol * |b|
pub fn assert_allclose_f64(a: &[f64], b: &[f64], rtol: f64, atol: f64, msg: &str) {
    assert_eq!(a.len(), b.len(), "{}: length mismatch", msg);
    for (i, (x, y)) in a.iter().zip(b.iter()).enumerate() {
        let diff = (x - y).abs();
        let tol = atol + rtol * y.abs();
        assert!(
            diff <= tol,
            "{}: element {} differs: {} vs {} (diff={}, tol={})",
            msg,
            i,
            x,
            y,
            diff,
            tol
        );
    }
}

/// Assert two f32 slices are close within tolerance
pub fn assert_allclose_f32(a: &[f32], b: &[f32], rtol: f32, atol: f32, msg: &str) {
    assert_eq!(a.len(), b.len(), "{}: length mismatch", msg);
    for (i, (x, y)) in a.iter().zip(b.iter()).enumerate() {
        let diff = (x - y).abs();
        let tol = atol + rtol * y.abs();
        assert!(
            diff <= tol,
            "{}: element {} differs: {} vs {} (diff={}, tol={})",
            msg,
            i,
            x,
            y,
            diff,
            tol
        );
    }
}

// ============================================================================
// Reference convolution
// ============================================================================

/// Geometry of a direct convolution, batched `[N, C, H, W]` layout
#[derive(Clone, Copy, Debug)]
pub struct ConvCase {
    pub batch: usize,
    pub c_in: usize,
    pub height: usize,
    pub width: usize,
    pub c_out: usize,
    pub kernel: (usize, usize),
    pub padding: (usize, usize),
    pub stride: (usize, usize),
    pub dilation: (usize, usize),
}

impl ConvCase {
    pub fn input_shape(&self) -> [usize; 4] {
        [self.batch, self.c_in, self.height, self.width]
    }

    pub fn weight_shape(&self) -> [usize; 4] {
        [self.c_out, self.c_in, self.kernel.0, self.kernel.1]
    }

    pub fn input_len(&self) -> usize {
        self.input_shape().iter().product()
    }

    pub fn weight_len(&self) -> usize {
        self.weight_shape().iter().product()
    }

    /// `floor((in + 2p - d(k-1) - 1) / s) + 1`
    pub fn output_hw(&self) -> (usize, usize) {
        let extent = |input: usize, k: usize, p: usize, s: usize, d: usize| {
            (input + 2 * p - d * (k - 1) - 1) / s + 1
        };
        (
            extent(self.height, self.kernel.0, self.padding.0, self.stride.0, self.dilation.0),
            extent(self.width, self.kernel.1, self.padding.1, self.stride.1, self.dilation.1),
        )
    }

    pub fn output_shape(&self) -> [usize; 4] {
        let (oh, ow) = self.output_hw();
        [self.batch, self.c_out, oh, ow]
    }
}

/// Direct triple-loop convolution with zero padding
pub fn reference_conv2d(
    case: &ConvCase,
    input: &[f64],
    weight: &[f64],
    bias: Option<&[f64]>,
) -> Vec<f64> {
    let (oh, ow) = case.output_hw();
    let (kh, kw) = case.kernel;
    let mut out = vec![0.0; case.batch * case.c_out * oh * ow];

    for n in 0..case.batch {
        for co in 0..case.c_out {
            for y in 0..oh {
                for x in 0..ow {
                    let mut acc = bias.map_or(0.0, |b| b[co]);
                    for ci in 0..case.c_in {
                        for ky in 0..kh {
                            for kx in 0..kw {
                                let iy = (y * case.stride.0 + ky * case.dilation.0) as isize
                                    - case.padding.0 as isize;
                                let ix = (x * case.stride.1 + kx * case.dilation.1) as isize
                                    - case.padding.1 as isize;
                                if iy < 0
                                    || ix < 0
                                    || iy >= case.height as isize
                                    || ix >= case.width as isize
                                {
                                    continue;
                                }
                                let i = ((n * case.c_in + ci) * case.height + iy as usize)
                                    * case.width
                                    + ix as usize;
                                let w = ((co * case.c_in + ci) * kh + ky) * kw + kx;
                                acc += input[i] * weight[w];
                            }
                        }
                    }
                    out[((n * case.c_out + co) * oh + y) * ow + x] = acc;
                }
            }
        }
    }
    out
}

/// Widen f32 operands for the reference
pub fn widen(values: &[f32]) -> Vec<f64> {
    values.iter().map(|&v| v as f64).collect()
}
