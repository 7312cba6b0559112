// Backend parity tests for ConvOps

use smmconv::ops::{Conv2dArgs, ConvOps};
use smmconv::runtime::cpu::CpuRuntime;
#[cfg(feature = "wgpu")]
use smmconv::runtime::wgpu::WgpuRuntime;
use smmconv::tensor::Tensor;

use crate::common::{ConvCase, create_cpu_client, random_f32, reference_conv2d, widen};
use crate::helpers::assert_parity_f32;
#[cfg(feature = "wgpu")]
use crate::helpers::with_wgpu_backend;

#[test]
fn test_smm_conv2d_top_left_patch_parity() {
    let input: Vec<f32> = (1..=16).map(|v| v as f32).collect();
    let weight = [1.0f32; 9];

    let (cpu_client, cpu_device) = create_cpu_client();
    let cpu_in = Tensor::<CpuRuntime>::from_slice(&input, &[1, 1, 4, 4], &cpu_device);
    let cpu_w = Tensor::<CpuRuntime>::from_slice(&weight, &[1, 1, 3, 3], &cpu_device);
    let cpu: Vec<f32> = cpu_client
        .conv2d(&cpu_in, &cpu_w, None, &Conv2dArgs::new())
        .unwrap()
        .to_vec();
    assert_eq!(cpu, vec![54.0, 63.0, 90.0, 99.0]);

    #[cfg(feature = "wgpu")]
    with_wgpu_backend(|wgpu_client, wgpu_device| {
        let x = Tensor::<WgpuRuntime>::from_slice(&input, &[1, 1, 4, 4], &wgpu_device);
        let w = Tensor::<WgpuRuntime>::from_slice(&weight, &[1, 1, 3, 3], &wgpu_device);
        let got: Vec<f32> = wgpu_client
            .conv2d(&x, &w, None, &Conv2dArgs::new())
            .unwrap()
            .to_vec();
        assert_parity_f32(&cpu, &got, "smm_conv2d_top_left_wgpu");
    });
}

#[test]
fn test_smm_conv2d_geometry_parity() {
    let cases = [
        ConvCase {
            batch: 2,
            c_in: 3,
            height: 9,
            width: 8,
            c_out: 5,
            kernel: (3, 3),
            padding: (1, 1),
            stride: (1, 1),
            dilation: (1, 1),
        },
        ConvCase {
            batch: 1,
            c_in: 4,
            height: 11,
            width: 7,
            c_out: 6,
            kernel: (3, 2),
            padding: (2, 0),
            stride: (2, 1),
            dilation: (2, 3),
        },
        ConvCase {
            batch: 3,
            c_in: 1,
            height: 5,
            width: 5,
            c_out: 2,
            kernel: (1, 1),
            padding: (3, 3),
            stride: (3, 3),
            dilation: (1, 1),
        },
    ];

    let (cpu_client, cpu_device) = create_cpu_client();
    for (idx, case) in cases.iter().enumerate() {
        let input = random_f32(case.input_len(), 100 + idx as u64);
        let weight = random_f32(case.weight_len(), 200 + idx as u64);
        let bias = random_f32(case.c_out, 300 + idx as u64);
        let args = Conv2dArgs::new()
            .padding(case.padding.0, case.padding.1)
            .stride(case.stride.0, case.stride.1)
            .dilation(case.dilation.0, case.dilation.1);

        let x = Tensor::<CpuRuntime>::from_slice(&input, &case.input_shape(), &cpu_device);
        let w = Tensor::<CpuRuntime>::from_slice(&weight, &case.weight_shape(), &cpu_device);
        let b = Tensor::<CpuRuntime>::from_slice(&bias, &[case.c_out], &cpu_device);
        let cpu: Vec<f32> = cpu_client.conv2d(&x, &w, Some(&b), &args).unwrap().to_vec();

        let expected: Vec<f32> =
            reference_conv2d(case, &widen(&input), &widen(&weight), Some(&widen(&bias)))
                .into_iter()
                .map(|v| v as f32)
                .collect();
        assert_parity_f32(&expected, &cpu, &format!("smm_conv2d_reference_case_{idx}"));

        #[cfg(feature = "wgpu")]
        with_wgpu_backend(|wgpu_client, wgpu_device| {
            let x = Tensor::<WgpuRuntime>::from_slice(&input, &case.input_shape(), &wgpu_device);
            let w = Tensor::<WgpuRuntime>::from_slice(&weight, &case.weight_shape(), &wgpu_device);
            let b = Tensor::<WgpuRuntime>::from_slice(&bias, &[case.c_out], &wgpu_device);
            let got: Vec<f32> = wgpu_client.conv2d(&x, &w, Some(&b), &args).unwrap().to_vec();
            assert_parity_f32(&cpu, &got, &format!("smm_conv2d_wgpu_case_{idx}"));

            // No bias binds a placeholder buffer that must never be read
            let cpu_nb: Vec<f32> = cpu_client
                .conv2d(
                    &Tensor::<CpuRuntime>::from_slice(&input, &case.input_shape(), &cpu_device),
                    &Tensor::<CpuRuntime>::from_slice(&weight, &case.weight_shape(), &cpu_device),
                    None,
                    &args,
                )
                .unwrap()
                .to_vec();
            let got_nb: Vec<f32> = wgpu_client.conv2d(&x, &w, None, &args).unwrap().to_vec();
            assert_parity_f32(&cpu_nb, &got_nb, &format!("smm_conv2d_wgpu_no_bias_{idx}"));
        });
    }
}

#[cfg(feature = "wgpu")]
#[test]
fn test_wgpu_rejects_grouped_conv() {
    use smmconv::error::Error;

    with_wgpu_backend(|client, device| {
        let x = Tensor::<WgpuRuntime>::from_slice(&[0.0f32; 32], &[1, 2, 4, 4], &device);
        let w = Tensor::<WgpuRuntime>::from_slice(&[0.0f32; 18], &[2, 1, 3, 3], &device);
        let err = client
            .conv2d(&x, &w, None, &Conv2dArgs::new().groups(2))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { arg: "groups", .. }));
    });
}
