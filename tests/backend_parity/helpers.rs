//! Shared helpers for backend parity tests: assertion utilities, backend locks, client creation.

#[cfg(feature = "wgpu")]
use crate::common::create_wgpu_client;
#[cfg(feature = "wgpu")]
use std::sync::{Mutex, OnceLock};

#[cfg(feature = "wgpu")]
static WGPU_BACKEND_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

pub fn assert_parity_f32(a: &[f32], b: &[f32], op: &str) {
    let rtol = 1e-5f32;
    let atol = 1e-6f32;
    assert_eq!(
        a.len(),
        b.len(),
        "parity_f32[{}]: length mismatch: {} vs {}",
        op,
        a.len(),
        b.len()
    );

    for (i, (x, y)) in a.iter().zip(b.iter()).enumerate() {
        let diff = (x - y).abs();
        let tol = atol + rtol * y.abs();

        if diff > tol {
            panic!(
                "parity_f32[{}] at index {}: {} vs {} (diff={}, tol={})",
                op, i, x, y, diff, tol
            );
        }
    }
}

/// Run `f` against the WebGPU backend, serialised across tests.
///
/// Skips (with a note) when no adapter is present, so the suite still passes
/// on machines without a GPU.
#[cfg(feature = "wgpu")]
pub fn with_wgpu_backend<F>(mut f: F)
where
    F: FnMut(smmconv::runtime::wgpu::WgpuClient, smmconv::runtime::wgpu::WgpuDevice),
{
    let _guard = WGPU_BACKEND_LOCK
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    match create_wgpu_client() {
        Some((client, device)) => f(client, device),
        None => println!("WebGPU adapter unavailable, skipping parity check"),
    }
}
