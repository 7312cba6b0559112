//! WebGPU Client implementation.
//!
//! `WgpuClient` owns the WebGPU device and queue for operation dispatch.
//!
//! # Thread Safety
//!
//! `WgpuClient` is `Clone` and the underlying wgpu::Device and wgpu::Queue
//! are already `Send + Sync`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use parking_lot::Mutex;
use wgpu::{Buffer, BufferDescriptor, BufferUsages, Device, Queue};

use super::WgpuRuntime;
use super::device::{WgpuDevice, WgpuError, adapter_info, query_adapter_blocking};
use super::shaders::PipelineCache;
use crate::algorithm::WorkGroupConfig;
use crate::error::{Error, Result};
use crate::runtime::RuntimeClient;

/// How long a blocking wait may take before it is reported as a failure
const POLL_TIMEOUT: Duration = Duration::from_secs(60);

// ============================================================================
// WgpuClient
// ============================================================================

/// WebGPU Runtime Client.
///
/// All tensor buffers live in a process-wide registry keyed by the `u64`
/// handle stored in [`crate::tensor::Storage`]; the client resolves handles
/// to `wgpu::Buffer`s when it binds them.
#[derive(Clone)]
pub struct WgpuClient {
    /// GPU device identifier (with adapter info)
    pub(crate) device_id: WgpuDevice,

    /// WebGPU device handle
    pub(crate) wgpu_device: Arc<Device>,

    /// WebGPU queue for command submission
    pub(crate) queue: Arc<Queue>,

    /// Pipeline cache for compute shaders
    pub(crate) pipeline_cache: Arc<PipelineCache>,

    work_group_config: WorkGroupConfig,
}

impl std::fmt::Debug for WgpuClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WgpuClient")
            .field("device", &self.device_id)
            .field("work_group_config", &self.work_group_config)
            .finish_non_exhaustive()
    }
}

impl WgpuClient {
    /// Get (or open) the shared client for a device.
    ///
    /// Clients are cached per adapter index, so every tensor on the same
    /// device shares one `wgpu::Device`.
    ///
    /// # Errors
    ///
    /// Returns an error if no suitable GPU adapter is found or device
    /// creation fails.
    pub fn new(device: WgpuDevice) -> std::result::Result<Self, WgpuError> {
        super::cache::get_or_create_client(&device)
    }

    /// Open a fresh logical device, bypassing the client cache.
    pub(crate) fn new_uncached(device: WgpuDevice) -> std::result::Result<Self, WgpuError> {
        let adapter = query_adapter_blocking(device.index)?;
        let limits = adapter.limits();

        let (wgpu_device, queue) = pollster::block_on(async {
            adapter
                .request_device(&wgpu::DeviceDescriptor {
                    label: Some("smmconv WebGPU Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: limits.clone(),
                    memory_hints: wgpu::MemoryHints::Performance,
                    trace: wgpu::Trace::Off,
                    experimental_features: wgpu::ExperimentalFeatures::default(),
                })
                .await
        })
        .map_err(|e| WgpuError::DeviceError(format!("{:?}", e)))?;

        let wgpu_device = Arc::new(wgpu_device);
        let queue = Arc::new(queue);
        let pipeline_cache = Arc::new(PipelineCache::new(wgpu_device.clone()));
        let device_id = WgpuDevice::with_info(device.index, adapter_info(&adapter, limits));

        log::debug!(
            "opened WebGPU device {} ({}, {:?})",
            device.index,
            device_id.adapter_name(),
            device_id.backend()
        );

        Ok(Self {
            device_id,
            wgpu_device,
            queue,
            pipeline_cache,
            work_group_config: WorkGroupConfig::default(),
        })
    }

    /// Use a different work-group size guess for launches from this client
    pub fn with_work_group_config(mut self, config: WorkGroupConfig) -> Self {
        self.work_group_config = config;
        self
    }

    /// Get reference to the WebGPU device.
    #[inline]
    pub fn wgpu_device(&self) -> &Device {
        &self.wgpu_device
    }

    /// Get reference to the WebGPU queue.
    #[inline]
    pub fn wgpu_queue(&self) -> &Queue {
        &self.queue
    }

    /// Get reference to the pipeline cache.
    #[inline]
    pub fn pipeline_cache(&self) -> &PipelineCache {
        &self.pipeline_cache
    }

    /// Create a staging buffer for CPU readback.
    pub fn create_staging_buffer(&self, label: &str, size: u64) -> Buffer {
        self.wgpu_device.create_buffer(&BufferDescriptor {
            label: Some(label),
            size,
            usage: BufferUsages::MAP_READ | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    /// Create a uniform buffer holding `params`.
    pub fn create_uniform_buffer<T: bytemuck::Pod>(&self, label: &str, params: &T) -> Buffer {
        let buffer = self.wgpu_device.create_buffer(&BufferDescriptor {
            label: Some(label),
            size: std::mem::size_of::<T>() as u64,
            usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        self.queue
            .write_buffer(&buffer, 0, bytemuck::bytes_of(params));
        buffer
    }

    /// Submit commands and wait for completion.
    pub fn submit_and_wait(&self, encoder: wgpu::CommandEncoder) -> Result<()> {
        let submission = self.queue.submit(std::iter::once(encoder.finish()));
        self.wgpu_device
            .poll(wgpu::PollType::Wait {
                submission_index: Some(submission),
                timeout: Some(POLL_TIMEOUT),
            })
            .map_err(|e| Error::Backend(format!("GPU poll failed: {e}")))?;
        Ok(())
    }

    /// Read a mapped-readable staging buffer back to the host (blocking).
    pub fn read_buffer(&self, staging: &Buffer, output: &mut [u8]) -> Result<()> {
        let slice = staging.slice(..);

        let (sender, receiver) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });

        self.wgpu_device
            .poll(wgpu::PollType::Wait {
                submission_index: None,
                timeout: Some(POLL_TIMEOUT),
            })
            .map_err(|e| Error::Backend(format!("GPU poll failed during buffer read: {e}")))?;

        let map_result = receiver.recv().map_err(|_| {
            Error::Backend("map_async callback was not invoked during buffer read".into())
        })?;
        map_result
            .map_err(|e| Error::Backend(format!("map_async failed during buffer read: {e}")))?;

        {
            let data = slice.get_mapped_range();
            output.copy_from_slice(&data[..output.len()]);
        }

        staging.unmap();
        Ok(())
    }
}

impl RuntimeClient<WgpuRuntime> for WgpuClient {
    fn device(&self) -> &WgpuDevice {
        &self.device_id
    }

    fn synchronize(&self) -> Result<()> {
        self.wgpu_device
            .poll(wgpu::PollType::Wait {
                submission_index: None,
                timeout: Some(POLL_TIMEOUT),
            })
            .map_err(|e| Error::Backend(format!("GPU poll failed: {e}")))?;
        Ok(())
    }

    fn work_group_config(&self) -> WorkGroupConfig {
        self.work_group_config
    }
}

// ============================================================================
// Buffer registry
// ============================================================================

/// WebGPU exposes no raw device pointers, so storage handles are ids into
/// this registry. Id 0 is reserved for empty allocations.
static BUFFER_REGISTRY: OnceLock<Mutex<HashMap<u64, Arc<Buffer>>>> = OnceLock::new();

static BUFFER_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

fn buffer_registry() -> &'static Mutex<HashMap<u64, Arc<Buffer>>> {
    BUFFER_REGISTRY.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Round a byte count up to the 4-byte granularity WebGPU copies require
#[inline]
pub(crate) fn aligned_size(size_bytes: usize) -> u64 {
    (size_bytes.div_ceil(4) * 4) as u64
}

/// Create a storage buffer and register it, returning its handle.
pub(crate) fn register_buffer(device: &Device, size_bytes: usize) -> u64 {
    let buffer = device.create_buffer(&BufferDescriptor {
        label: Some("smmconv tensor buffer"),
        size: aligned_size(size_bytes),
        usage: BufferUsages::STORAGE | BufferUsages::COPY_DST | BufferUsages::COPY_SRC,
        mapped_at_creation: false,
    });

    let id = BUFFER_ID_COUNTER.fetch_add(1, Ordering::Relaxed);
    buffer_registry().lock().insert(id, Arc::new(buffer));
    id
}

/// Drop a registered buffer; GPU memory is released with the last `Arc`.
pub(crate) fn release_buffer(id: u64) {
    if id == 0 {
        return;
    }
    buffer_registry().lock().remove(&id);
}

/// Get a buffer by its handle.
pub(crate) fn get_buffer(id: u64) -> Option<Arc<Buffer>> {
    if id == 0 {
        return None;
    }
    buffer_registry().lock().get(&id).cloned()
}

/// Like [`get_buffer`], reporting a missing handle as a backend error
pub(crate) fn require_buffer(id: u64, what: &str) -> Result<Arc<Buffer>> {
    get_buffer(id).ok_or_else(|| Error::Backend(format!("{what} buffer {id} not found")))
}

// ============================================================================
// Tests
// ============================================================================
