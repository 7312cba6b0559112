//! CPU client: thread pool configuration and the n-d range executor

use super::device::CpuDevice;
use super::runtime::CpuRuntime;
use crate::algorithm::{NdItem, NdRange, WorkGroupConfig};
use crate::error::Result;
use crate::runtime::RuntimeClient;

#[cfg(feature = "rayon")]
use rayon::prelude::*;
#[cfg(feature = "rayon")]
use std::sync::Arc;

/// Thread-level parallelism settings for CPU kernels
///
/// - `num_threads`: `None` uses rayon's global pool, `Some(1)` runs
///   work-groups in order on the calling thread, `Some(n)` builds a dedicated
///   pool of `n` threads.
/// - `chunk_size`: minimum number of work-groups handed to one rayon task.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ParallelismConfig {
    /// Worker thread count
    pub num_threads: Option<usize>,
    /// Minimum work-groups per rayon task
    pub chunk_size: Option<usize>,
}

impl ParallelismConfig {
    /// Create a parallelism config
    pub const fn new(num_threads: Option<usize>, chunk_size: Option<usize>) -> Self {
        Self {
            num_threads,
            chunk_size,
        }
    }

    /// Single-threaded execution in global-id order
    pub const fn sequential() -> Self {
        Self::new(Some(1), None)
    }

    /// Whether work runs on the calling thread only
    pub fn is_sequential(&self) -> bool {
        self.num_threads == Some(1)
    }
}

/// CPU client for operation dispatch
#[derive(Clone, Debug)]
pub struct CpuClient {
    pub(crate) device: CpuDevice,
    parallelism: ParallelismConfig,
    work_group_config: WorkGroupConfig,
    #[cfg(feature = "rayon")]
    pool: Option<Arc<rayon::ThreadPool>>,
}

impl CpuClient {
    /// Create a new CPU client using rayon's global pool
    pub fn new(device: CpuDevice) -> Self {
        Self {
            device,
            parallelism: ParallelismConfig::default(),
            work_group_config: WorkGroupConfig::default(),
            #[cfg(feature = "rayon")]
            pool: None,
        }
    }

    /// Apply a parallelism config
    ///
    /// If a dedicated pool cannot be built the client logs a warning and keeps
    /// using the global pool.
    pub fn with_parallelism(mut self, config: ParallelismConfig) -> Self {
        #[cfg(feature = "rayon")]
        {
            self.pool = match config.num_threads {
                Some(n) if n > 1 => {
                    match rayon::ThreadPoolBuilder::new().num_threads(n).build() {
                        Ok(pool) => Some(Arc::new(pool)),
                        Err(e) => {
                            log::warn!("cpu client: failed to build {n}-thread pool: {e}");
                            None
                        }
                    }
                }
                _ => None,
            };
        }
        self.parallelism = config;
        self
    }

    /// Override launch planning knobs
    pub fn with_work_group_config(mut self, config: WorkGroupConfig) -> Self {
        self.work_group_config = config;
        self
    }

    /// Current parallelism config
    pub fn parallelism(&self) -> ParallelismConfig {
        self.parallelism
    }

    /// Run `f` inside this client's thread pool
    #[cfg(feature = "rayon")]
    pub fn install_parallelism<F, T>(&self, f: F) -> T
    where
        F: FnOnce() -> T + Send,
        T: Send,
    {
        match &self.pool {
            Some(pool) => pool.install(f),
            None => f(),
        }
    }

    /// Minimum number of items per rayon task
    pub fn rayon_min_len(&self) -> usize {
        self.parallelism.chunk_size.unwrap_or(1).max(1)
    }

    /// Execute `body` once for every global id of `range`
    ///
    /// Items of one work-group run in order on one thread; work-groups are
    /// distributed over the pool. Returns once every item has run, which
    /// makes each call a full completion barrier.
    pub fn parallel_for<F>(&self, range: &NdRange, body: F)
    where
        F: Fn(NdItem) + Sync + Send,
    {
        let range = *range;
        let run_group = |group: usize| {
            for item in range.group_items(group) {
                body(item);
            }
        };

        #[cfg(feature = "rayon")]
        if !self.parallelism.is_sequential() {
            let min_len = self.rayon_min_len();
            self.install_parallelism(|| {
                (0..range.num_groups())
                    .into_par_iter()
                    .with_min_len(min_len)
                    .for_each(run_group);
            });
            return;
        }

        (0..range.num_groups()).for_each(run_group);
    }
}

impl RuntimeClient<CpuRuntime> for CpuClient {
    fn device(&self) -> &CpuDevice {
        &self.device
    }

    fn synchronize(&self) -> Result<()> {
        // parallel_for returns only after completion
        Ok(())
    }

    fn work_group_config(&self) -> WorkGroupConfig {
        self.work_group_config
    }
}
