//! WebGPU runtime implementation

use super::cache::get_or_create_client;
use super::client::{WgpuClient, aligned_size, register_buffer, release_buffer, require_buffer};
use super::device::{WgpuDevice, query_adapter_blocking};
use crate::error::{Error, Result};
use crate::runtime::Runtime;

/// WebGPU Runtime adapter
///
/// Implements the generic Runtime trait for the WebGPU backend.
#[derive(Clone, Debug, Default)]
pub struct WgpuRuntime;

impl Runtime for WgpuRuntime {
    type Device = WgpuDevice;
    type Client = WgpuClient;

    fn name() -> &'static str {
        "wgpu"
    }

    fn allocate(size_bytes: usize, device: &Self::Device) -> Result<u64> {
        if size_bytes == 0 {
            return Ok(0);
        }

        let client = get_or_create_client(device)?;
        if aligned_size(size_bytes) > client.device_id.limits().max_buffer_size {
            return Err(Error::OutOfMemory { size: size_bytes });
        }
        Ok(register_buffer(client.wgpu_device(), size_bytes))
    }

    fn deallocate(ptr: u64, _size_bytes: usize, _device: &Self::Device) {
        release_buffer(ptr);
    }

    /// Copy data from host to device.
    fn copy_to_device(src: &[u8], dst: u64, device: &Self::Device) -> Result<()> {
        if src.is_empty() || dst == 0 {
            return Ok(());
        }

        let client = get_or_create_client(device)?;
        let buffer = require_buffer(dst, "destination")?;

        // Queue writes must cover whole 4-byte words
        if src.len() % 4 == 0 {
            client.queue.write_buffer(&buffer, 0, src);
        } else {
            let mut padded = src.to_vec();
            padded.resize(aligned_size(src.len()) as usize, 0);
            client.queue.write_buffer(&buffer, 0, &padded);
        }

        client.queue.submit(std::iter::empty());
        crate::runtime::RuntimeClient::synchronize(&client)
    }

    /// Copy data from device to host through a staging buffer.
    fn copy_from_device(src: u64, dst: &mut [u8], device: &Self::Device) -> Result<()> {
        if dst.is_empty() || src == 0 {
            return Ok(());
        }

        let client = get_or_create_client(device)?;
        let buffer = require_buffer(src, "source")?;

        let size = aligned_size(dst.len());
        let staging = client.create_staging_buffer("copy_staging", size);

        let mut encoder =
            client
                .wgpu_device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("copy_from_device"),
                });
        encoder.copy_buffer_to_buffer(&buffer, 0, &staging, 0, size);
        client.submit_and_wait(encoder)?;

        let mut bytes = vec![0u8; size as usize];
        client.read_buffer(&staging, &mut bytes)?;
        dst.copy_from_slice(&bytes[..dst.len()]);
        Ok(())
    }

    /// Gather a strided view into a contiguous buffer.
    ///
    /// The reachable span of the source is read back, gathered on the host
    /// in row-major order and uploaded into `dst_handle`.
    fn copy_strided(
        src_handle: u64,
        src_byte_offset: usize,
        dst_handle: u64,
        shape: &[usize],
        strides: &[isize],
        elem_size: usize,
        device: &Self::Device,
    ) -> Result<()> {
        let numel: usize = shape.iter().product();
        if src_handle == 0 || dst_handle == 0 || numel == 0 {
            return Ok(());
        }
        if strides.iter().any(|&s| s < 0) {
            return Err(Error::backend_limitation(
                "wgpu",
                "copy_strided",
                format!("negative strides {strides:?} are not supported"),
            ));
        }

        let last_elem: usize = shape
            .iter()
            .zip(strides)
            .map(|(&dim, &stride)| (dim - 1) * stride as usize)
            .sum();
        let span = src_byte_offset + (last_elem + 1) * elem_size;

        let mut src = vec![0u8; span];
        Self::copy_from_device(src_handle, &mut src, device)?;

        let mut dst = vec![0u8; numel * elem_size];
        let mut indices = vec![0usize; shape.len()];
        for chunk in dst.chunks_exact_mut(elem_size) {
            let elem: usize = indices
                .iter()
                .zip(strides)
                .map(|(&idx, &stride)| idx * stride as usize)
                .sum();
            let start = src_byte_offset + elem * elem_size;
            chunk.copy_from_slice(&src[start..start + elem_size]);

            for dim in (0..shape.len()).rev() {
                indices[dim] += 1;
                if indices[dim] < shape[dim] {
                    break;
                }
                indices[dim] = 0;
            }
        }

        Self::copy_to_device(&dst, dst_handle, device)
    }

    fn default_device() -> Self::Device {
        WgpuDevice::new(0)
    }

    /// # Panics
    ///
    /// Panics if no WebGPU adapter can be opened; check
    /// [`is_wgpu_available`] first.
    fn default_client(device: &Self::Device) -> Self::Client {
        get_or_create_client(device)
            .unwrap_or_else(|e| panic!("failed to open WebGPU device {}: {e}", device.index))
    }
}

/// Get the default WebGPU device (first adapter)
pub fn wgpu_device() -> WgpuDevice {
    WgpuDevice::new(0)
}

/// Check if WebGPU is available on this system
pub fn is_wgpu_available() -> bool {
    query_adapter_blocking(0).is_ok()
}
