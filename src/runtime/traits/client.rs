//! Trait for runtime clients that handle operation dispatch

use super::Runtime;
use crate::algorithm::WorkGroupConfig;
use crate::error::Result;

/// Trait for runtime clients that handle operation dispatch
pub trait RuntimeClient<R: Runtime>: Clone + Send + Sync {
    /// Get the device this client operates on
    fn device(&self) -> &R::Device;

    /// Block until all submitted work has completed
    ///
    /// Device failures that surface while waiting are returned as errors.
    fn synchronize(&self) -> Result<()>;

    /// Launch planning knobs used by this client's operations
    fn work_group_config(&self) -> WorkGroupConfig;
}
