//! WebGPU device implementation.
//!
//! `WgpuDevice` names an adapter by index and, once a client has opened it,
//! carries the adapter's properties and limits.

use std::fmt;
use std::sync::Arc;
use wgpu::{Adapter, Backend, Limits};

use crate::error::Error;

/// Error type for WebGPU setup and transfer failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum WgpuError {
    /// No suitable GPU adapter found.
    #[error("No suitable WebGPU adapter found")]
    NoAdapter,
    /// Device request failed.
    #[error("WebGPU device error: {0}")]
    DeviceError(String),
    /// Buffer operation failed.
    #[error("WebGPU buffer error: {0}")]
    BufferError(String),
}

impl From<WgpuError> for Error {
    fn from(err: WgpuError) -> Self {
        Error::Backend(err.to_string())
    }
}

/// Cached adapter information for a WebGPU device.
#[derive(Clone)]
pub(crate) struct AdapterInfo {
    /// Adapter name (e.g., "NVIDIA GeForce RTX 4090")
    name: String,
    /// Backend type (Vulkan, Metal, DX12, etc.)
    backend: Backend,
    /// Limits the logical device was opened with
    limits: Limits,
}

/// WebGPU device identifier.
///
/// The index maps to the order of adapters returned by WebGPU enumeration.
///
/// # Example
///
/// ```ignore
/// let device = WgpuDevice::new(0);  // First GPU
/// println!("Device: {}", device.name());
/// ```
#[derive(Clone)]
pub struct WgpuDevice {
    /// Device index (adapter order)
    pub(crate) index: usize,
    /// Cached adapter info (populated by the client)
    info: Option<Arc<AdapterInfo>>,
}

impl WgpuDevice {
    /// Create a device identifier for the specified adapter index.
    ///
    /// This does not initialize the GPU - that happens when `WgpuClient::new`
    /// is called.
    pub fn new(index: usize) -> Self {
        Self { index, info: None }
    }

    pub(crate) fn with_info(index: usize, info: Arc<AdapterInfo>) -> Self {
        Self {
            index,
            info: Some(info),
        }
    }

    /// Get the adapter name, or "unknown" before the device is opened.
    pub fn adapter_name(&self) -> String {
        self.info
            .as_ref()
            .map(|i| i.name.clone())
            .unwrap_or_else(|| "unknown".to_string())
    }

    /// Get the backend type (Vulkan, Metal, DX12, etc.).
    pub fn backend(&self) -> Option<Backend> {
        self.info.as_ref().map(|i| i.backend)
    }

    /// Get device limits.
    ///
    /// Returns WebGPU default limits if the device hasn't been opened yet.
    pub fn limits(&self) -> Limits {
        self.info
            .as_ref()
            .map(|i| i.limits.clone())
            .unwrap_or_default()
    }

    /// Largest number of work-groups a single dispatch may use per dimension
    pub fn max_workgroups_per_dimension(&self) -> u32 {
        self.limits().max_compute_workgroups_per_dimension
    }

    /// Largest storage buffer that can be bound to a shader
    pub fn max_storage_buffer_size(&self) -> u64 {
        self.limits().max_storage_buffer_binding_size as u64
    }
}

impl super::super::Device for WgpuDevice {
    fn id(&self) -> usize {
        self.index
    }

    fn name(&self) -> String {
        format!("wgpu:{}", self.index)
    }

    /// Invocations per work-group, bounded by the x extent since the planned
    /// ranges may put a whole group on that axis.
    fn max_work_group_size(&self) -> usize {
        let limits = self.limits();
        limits
            .max_compute_invocations_per_workgroup
            .min(limits.max_compute_workgroup_size_x) as usize
    }
}

impl fmt::Debug for WgpuDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WgpuDevice")
            .field("index", &self.index)
            .field("adapter", &self.adapter_name())
            .field("backend", &self.backend())
            .finish()
    }
}

// ============================================================================
// Adapter Discovery
// ============================================================================

/// Find the adapter for a device index.
///
/// Out-of-range indices fall back to the high-performance adapter.
pub(crate) async fn query_adapter(index: usize) -> Result<Adapter, WgpuError> {
    let instance = wgpu::Instance::default();

    let mut adapters: Vec<_> = instance.enumerate_adapters(wgpu::Backends::all()).await;
    if adapters.is_empty() {
        return Err(WgpuError::NoAdapter);
    }

    if index < adapters.len() {
        Ok(adapters.swap_remove(index))
    } else {
        instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .map_err(|_| WgpuError::NoAdapter)
    }
}

/// Query the adapter synchronously using pollster.
pub(crate) fn query_adapter_blocking(index: usize) -> Result<Adapter, WgpuError> {
    pollster::block_on(query_adapter(index))
}

/// Adapter properties for a device opened with `limits`
pub(crate) fn adapter_info(adapter: &Adapter, limits: Limits) -> Arc<AdapterInfo> {
    let info = adapter.get_info();
    Arc::new(AdapterInfo {
        name: info.name,
        backend: info.backend,
        limits,
    })
}

// ============================================================================
// Tests
// ============================================================================
