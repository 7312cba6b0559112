//! Integration tests for the im2col convolution on the CPU runtime.

mod common;

use common::{
    ConvCase, assert_allclose_f32, assert_allclose_f64, create_cpu_client, random_f32, random_f64,
    reference_conv2d, widen,
};
use smmconv::algorithm::WorkGroupConfig;
use smmconv::error::Error;
use smmconv::ops::{Conv2dArgs, ConvOps, PaddingMode};
use smmconv::runtime::cpu::{CpuClient, CpuDevice, CpuRuntime, ParallelismConfig};
use smmconv::tensor::Tensor;

fn seeded(device: &CpuDevice, shape: &[usize], seed: u64) -> Tensor<CpuRuntime> {
    let len = shape.iter().product();
    Tensor::<CpuRuntime>::from_slice(&random_f32(len, seed), shape, device)
}

fn args_for(case: &ConvCase) -> Conv2dArgs {
    Conv2dArgs::new()
        .padding(case.padding.0, case.padding.1)
        .stride(case.stride.0, case.stride.1)
        .dilation(case.dilation.0, case.dilation.1)
}

/// Run `case` in f32 on `client` with seeded operands and compare with the
/// direct convolution.
fn check_against_reference(
    client: &CpuClient,
    device: &CpuDevice,
    case: &ConvCase,
    with_bias: bool,
) {
    let input = random_f32(case.input_len(), 1);
    let weight = random_f32(case.weight_len(), 2);
    let bias = random_f32(case.c_out, 3);

    let x = Tensor::<CpuRuntime>::from_slice(&input, &case.input_shape(), device);
    let w = Tensor::<CpuRuntime>::from_slice(&weight, &case.weight_shape(), device);
    let b = Tensor::<CpuRuntime>::from_slice(&bias, &[case.c_out], device);

    let output = client
        .conv2d(&x, &w, with_bias.then_some(&b), &args_for(case))
        .unwrap();
    assert_eq!(output.shape(), &case.output_shape(), "{case:?}");

    let expected = reference_conv2d(
        case,
        &widen(&input),
        &widen(&weight),
        with_bias.then(|| widen(&bias)).as_deref(),
    );
    let expected: Vec<f32> = expected.iter().map(|&v| v as f32).collect();
    let got: Vec<f32> = output.to_vec();
    assert_allclose_f32(&got, &expected, 1e-5, 1e-5, &format!("{case:?}"));
}

// =============================================================================
// Worked examples
// =============================================================================

#[test]
fn test_top_left_patch_sum() {
    let (client, device) = create_cpu_client();
    let data: Vec<f32> = (1..=16).map(|v| v as f32).collect();
    let input = Tensor::<CpuRuntime>::from_slice(&data, &[1, 1, 4, 4], &device);
    let weight = Tensor::<CpuRuntime>::from_slice(&[1.0f32; 9], &[1, 1, 3, 3], &device);

    let output = client
        .smm_conv2d(&input, &weight, None, (0, 0), (1, 1), (1, 1), PaddingMode::Zeros, 1)
        .unwrap();

    assert_eq!(output.shape(), &[1, 1, 2, 2]);
    // 1+2+3+5+6+7+9+10+11
    assert_eq!(output.to_vec::<f32>(), vec![54.0, 63.0, 90.0, 99.0]);
}

#[test]
fn test_zero_padding_matches_hand_computed_sums() {
    let (client, device) = create_cpu_client();
    let data: Vec<f32> = (1..=16).map(|v| v as f32).collect();
    let input = Tensor::<CpuRuntime>::from_slice(&data, &[1, 1, 4, 4], &device);
    let weight = Tensor::<CpuRuntime>::from_slice(&[1.0f32; 9], &[1, 1, 3, 3], &device);

    let output = client
        .conv2d(&input, &weight, None, &Conv2dArgs::new().padding(1, 1))
        .unwrap();

    assert_eq!(output.shape(), &[1, 1, 4, 4]);
    // Each cell sums the in-bounds part of its 3x3 neighbourhood
    #[rustfmt::skip]
    let expected = vec![
        14.0, 24.0, 30.0, 22.0,
        33.0, 54.0, 63.0, 45.0,
        57.0, 90.0, 99.0, 69.0,
        46.0, 72.0, 78.0, 54.0,
    ];
    assert_eq!(output.to_vec::<f32>(), expected);
}

#[test]
fn test_top_left_output_is_patch_dot_plus_bias() {
    let (client, device) = create_cpu_client();
    let case = ConvCase {
        batch: 1,
        c_in: 3,
        height: 5,
        width: 6,
        c_out: 4,
        kernel: (2, 3),
        padding: (0, 0),
        stride: (1, 1),
        dilation: (1, 1),
    };
    let input = random_f64(case.input_len(), 10);
    let weight = random_f64(case.weight_len(), 11);
    let bias = random_f64(case.c_out, 12);

    let x = Tensor::<CpuRuntime>::from_slice(&input, &case.input_shape(), &device);
    let w = Tensor::<CpuRuntime>::from_slice(&weight, &case.weight_shape(), &device);
    let b = Tensor::<CpuRuntime>::from_slice(&bias, &[case.c_out], &device);
    let output: Vec<f64> = client
        .conv2d(&x, &w, Some(&b), &Conv2dArgs::new())
        .unwrap()
        .to_vec();

    let (oh, ow) = case.output_hw();
    for c in 0..case.c_out {
        let mut expected = bias[c];
        for ci in 0..case.c_in {
            for ky in 0..2 {
                for kx in 0..3 {
                    expected += input[(ci * case.height + ky) * case.width + kx]
                        * weight[((c * case.c_in + ci) * 2 + ky) * 3 + kx];
                }
            }
        }
        let got = output[c * oh * ow];
        assert!((got - expected).abs() < 1e-12, "channel {c}: {got} vs {expected}");
    }
}

// =============================================================================
// Reference comparison
// =============================================================================

#[test]
fn test_matches_reference_across_geometries() {
    let (client, device) = create_cpu_client();
    for padding in [(0, 0), (1, 2), (3, 3)] {
        for stride in [(1, 1), (2, 1), (3, 2)] {
            for dilation in [(1, 1), (2, 2), (1, 3)] {
                let case = ConvCase {
                    batch: 2,
                    c_in: 3,
                    height: 9,
                    width: 8,
                    c_out: 5,
                    kernel: (3, 2),
                    padding,
                    stride,
                    dilation,
                };
                check_against_reference(&client, &device, &case, true);
            }
        }
    }
}

#[test]
fn test_bias_absent_matches_reference_without_bias() {
    let (client, device) = create_cpu_client();
    let case = ConvCase {
        batch: 2,
        c_in: 4,
        height: 7,
        width: 7,
        c_out: 6,
        kernel: (3, 3),
        padding: (1, 1),
        stride: (1, 1),
        dilation: (1, 1),
    };
    check_against_reference(&client, &device, &case, false);
}

#[test]
fn test_f64_matches_reference() {
    let (client, device) = create_cpu_client();
    let case = ConvCase {
        batch: 3,
        c_in: 2,
        height: 6,
        width: 5,
        c_out: 3,
        kernel: (3, 3),
        padding: (2, 1),
        stride: (2, 2),
        dilation: (1, 2),
    };
    let input = random_f64(case.input_len(), 20);
    let weight = random_f64(case.weight_len(), 21);
    let bias = random_f64(case.c_out, 22);

    let x = Tensor::<CpuRuntime>::from_slice(&input, &case.input_shape(), &device);
    let w = Tensor::<CpuRuntime>::from_slice(&weight, &case.weight_shape(), &device);
    let b = Tensor::<CpuRuntime>::from_slice(&bias, &[case.c_out], &device);
    let output = client.conv2d(&x, &w, Some(&b), &args_for(&case)).unwrap();

    let expected = reference_conv2d(&case, &input, &weight, Some(&bias));
    assert_allclose_f64(&output.to_vec::<f64>(), &expected, 1e-12, 1e-12, "f64");
}

#[test]
fn test_padding_wider_than_kernel() {
    let (client, device) = create_cpu_client();
    let case = ConvCase {
        batch: 1,
        c_in: 1,
        height: 3,
        width: 3,
        c_out: 2,
        kernel: (2, 2),
        padding: (4, 4),
        stride: (1, 1),
        dilation: (1, 1),
    };
    check_against_reference(&client, &device, &case, true);
}

#[test]
fn test_unbatched_input_keeps_rank() {
    let (client, device) = create_cpu_client();
    let case = ConvCase {
        batch: 1,
        c_in: 2,
        height: 5,
        width: 5,
        c_out: 3,
        kernel: (3, 3),
        padding: (1, 1),
        stride: (2, 2),
        dilation: (1, 1),
    };
    let input = random_f32(case.input_len(), 30);
    let weight = random_f32(case.weight_len(), 31);

    let unbatched = Tensor::<CpuRuntime>::from_slice(&input, &[2, 5, 5], &device);
    let batched = Tensor::<CpuRuntime>::from_slice(&input, &case.input_shape(), &device);
    let w = Tensor::<CpuRuntime>::from_slice(&weight, &case.weight_shape(), &device);

    let out3 = client.conv2d(&unbatched, &w, None, &args_for(&case)).unwrap();
    let out4 = client.conv2d(&batched, &w, None, &args_for(&case)).unwrap();

    assert_eq!(out3.shape(), &[3, 3, 3]);
    assert_eq!(out4.shape(), &[1, 3, 3, 3]);
    assert_eq!(out3.to_vec::<f32>(), out4.to_vec::<f32>());
}

#[test]
fn test_non_contiguous_input() {
    let (client, device) = create_cpu_client();
    // [1, 1, W=3, H=4] transposed to a strided [1, 1, 4, 3] view
    let data: Vec<f32> = (0..12).map(|v| v as f32).collect();
    let stored = Tensor::<CpuRuntime>::from_slice(&data, &[1, 1, 3, 4], &device);
    let view = stored.transpose(2, 3).unwrap();
    assert!(!view.is_contiguous());
    let packed = view.contiguous().unwrap();

    let weight =
        Tensor::<CpuRuntime>::from_slice(&[1.0f32, -1.0, 2.0, 0.5], &[1, 1, 2, 2], &device);
    let args = Conv2dArgs::new().padding(1, 0);

    let from_view = client.conv2d(&view, &weight, None, &args).unwrap();
    let from_packed = client.conv2d(&packed, &weight, None, &args).unwrap();
    assert_eq!(from_view.shape(), &[1, 1, 5, 2]);
    assert_eq!(from_view.to_vec::<f32>(), from_packed.to_vec::<f32>());
}

// =============================================================================
// Scheduling
// =============================================================================

#[test]
fn test_repeated_calls_are_bit_identical() {
    let (client, device) = create_cpu_client();
    let case = ConvCase {
        batch: 2,
        c_in: 8,
        height: 12,
        width: 12,
        c_out: 16,
        kernel: (3, 3),
        padding: (1, 1),
        stride: (1, 1),
        dilation: (1, 1),
    };
    let x = seeded(&device, &case.input_shape(), 40);
    let w = seeded(&device, &case.weight_shape(), 41);

    let args = args_for(&case);
    let first: Vec<f32> = client.conv2d(&x, &w, None, &args).unwrap().to_vec();
    for _ in 0..4 {
        let again: Vec<f32> = client.conv2d(&x, &w, None, &args).unwrap().to_vec();
        assert_eq!(
            first.iter().map(|v| v.to_bits()).collect::<Vec<_>>(),
            again.iter().map(|v| v.to_bits()).collect::<Vec<_>>()
        );
    }
}

#[test]
fn test_sequential_and_parallel_agree_bitwise() {
    let device = CpuDevice::new();
    let parallel =
        CpuClient::new(device.clone()).with_parallelism(ParallelismConfig::new(Some(4), None));
    let sequential =
        CpuClient::new(device.clone()).with_parallelism(ParallelismConfig::sequential());

    let case = ConvCase {
        batch: 2,
        c_in: 5,
        height: 10,
        width: 9,
        c_out: 7,
        kernel: (3, 3),
        padding: (1, 2),
        stride: (2, 1),
        dilation: (1, 1),
    };
    let x = seeded(&device, &case.input_shape(), 50);
    let w = seeded(&device, &case.weight_shape(), 51);

    let args = args_for(&case);
    let a: Vec<f32> = parallel.conv2d(&x, &w, None, &args).unwrap().to_vec();
    let b: Vec<f32> = sequential.conv2d(&x, &w, None, &args).unwrap().to_vec();
    assert_eq!(
        a.iter().map(|v| v.to_bits()).collect::<Vec<_>>(),
        b.iter().map(|v| v.to_bits()).collect::<Vec<_>>()
    );
}

#[test]
fn test_small_work_groups_round_up_correctly() {
    // Budgets that do not divide the kernel area or output extents force
    // rounded launches whose extra invocations must be discarded.
    let case = ConvCase {
        batch: 1,
        c_in: 2,
        height: 7,
        width: 5,
        c_out: 3,
        kernel: (3, 3),
        padding: (1, 1),
        stride: (1, 1),
        dilation: (1, 1),
    };
    for max_group in [1, 2, 4, 7] {
        let device = CpuDevice::new().with_max_work_group_size(max_group);
        let client = CpuClient::new(device.clone());
        check_against_reference(&client, &device, &case, true);
    }

    let device = CpuDevice::new();
    let client = CpuClient::new(device.clone()).with_work_group_config(WorkGroupConfig::new(5));
    check_against_reference(&client, &device, &case, true);
}

// =============================================================================
// Rejections
// =============================================================================

#[test]
fn test_rejects_grouped_convolution() {
    let (client, device) = create_cpu_client();
    let input = Tensor::<CpuRuntime>::from_slice(&[0.0f32; 32], &[1, 2, 4, 4], &device);
    let weight = Tensor::<CpuRuntime>::from_slice(&[0.0f32; 18], &[2, 1, 3, 3], &device);

    let err = client
        .conv2d(&input, &weight, None, &Conv2dArgs::new().groups(2))
        .unwrap_err();
    assert!(matches!(err, Error::InvalidArgument { arg: "groups", .. }), "{err}");
}

#[test]
fn test_rejects_non_zero_padding_modes() {
    let (client, device) = create_cpu_client();
    let input = Tensor::<CpuRuntime>::from_slice(&[0.0f32; 16], &[1, 1, 4, 4], &device);
    let weight = Tensor::<CpuRuntime>::from_slice(&[0.0f32; 9], &[1, 1, 3, 3], &device);

    for mode in [PaddingMode::Reflect, PaddingMode::Replicate, PaddingMode::Circular] {
        let err = client
            .smm_conv2d(&input, &weight, None, (1, 1), (1, 1), (1, 1), mode, 1)
            .unwrap_err();
        assert!(
            matches!(err, Error::InvalidArgument { arg: "padding_mode", .. }),
            "{mode:?}: {err}"
        );
    }
}

#[test]
fn test_rejects_empty_output() {
    let (client, device) = create_cpu_client();
    let input = Tensor::<CpuRuntime>::from_slice(&[0.0f32; 4], &[1, 1, 2, 2], &device);
    let weight = Tensor::<CpuRuntime>::from_slice(&[0.0f32; 9], &[1, 1, 3, 3], &device);

    let err = client
        .conv2d(&input, &weight, None, &Conv2dArgs::new())
        .unwrap_err();
    assert!(
        matches!(err, Error::InvalidArgument { arg: "output_size", .. }),
        "{err}"
    );
}

#[test]
fn test_rejects_output_too_large_to_allocate() {
    let (client, device) = create_cpu_client();
    let input = Tensor::<CpuRuntime>::from_slice(&[1.0f32; 4], &[1, 1, 2, 2], &device);
    let weight = Tensor::<CpuRuntime>::from_slice(&[1.0f32], &[1, 1, 1, 1], &device);

    let pad = (1usize << 31) - 1;
    let err = client
        .conv2d(&input, &weight, None, &Conv2dArgs::new().padding(pad, pad))
        .unwrap_err();
    assert!(
        matches!(err, Error::InvalidArgument { arg: "output_size", .. }),
        "{err}"
    );
}

#[test]
fn test_rejects_channel_and_bias_mismatch() {
    let (client, device) = create_cpu_client();
    let input = Tensor::<CpuRuntime>::from_slice(&[0.0f32; 32], &[1, 2, 4, 4], &device);
    let weight = Tensor::<CpuRuntime>::from_slice(&[0.0f32; 27], &[1, 3, 3, 3], &device);
    assert!(client.conv2d(&input, &weight, None, &Conv2dArgs::new()).is_err());

    let weight = Tensor::<CpuRuntime>::from_slice(&[0.0f32; 36], &[2, 2, 3, 3], &device);
    let bias = Tensor::<CpuRuntime>::from_slice(&[0.0f32; 3], &[3], &device);
    assert!(client.conv2d(&input, &weight, Some(&bias), &Conv2dArgs::new()).is_err());
}

#[test]
fn test_rejects_mixed_dtypes() {
    let (client, device) = create_cpu_client();
    let input = Tensor::<CpuRuntime>::from_slice(&[0.0f32; 16], &[1, 1, 4, 4], &device);
    let weight = Tensor::<CpuRuntime>::from_slice(&[0.0f64; 9], &[1, 1, 3, 3], &device);
    let err = client
        .conv2d(&input, &weight, None, &Conv2dArgs::new())
        .unwrap_err();
    assert!(matches!(err, Error::DTypeMismatch { .. }), "{err}");
}
