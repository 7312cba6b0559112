//! CPU device implementation

use crate::runtime::Device;

/// Work-group size reported by the host when none is configured
pub const DEFAULT_MAX_WORK_GROUP_SIZE: usize = 1024;

/// CPU device (there's only one: the host CPU)
#[derive(Clone, Debug)]
pub struct CpuDevice {
    id: usize,
    max_work_group_size: usize,
}

impl CpuDevice {
    /// Create a new CPU device
    pub fn new() -> Self {
        Self {
            id: 0,
            max_work_group_size: DEFAULT_MAX_WORK_GROUP_SIZE,
        }
    }

    /// Override the work-group limit reported to launch planning
    ///
    /// A limit of 0 is clamped to 1.
    pub fn with_max_work_group_size(mut self, size: usize) -> Self {
        if size == 0 {
            log::warn!("cpu device: max work-group size 0 requested, using 1");
        }
        self.max_work_group_size = size.max(1);
        self
    }
}

impl Default for CpuDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl Device for CpuDevice {
    fn id(&self) -> usize {
        self.id
    }

    fn name(&self) -> String {
        "cpu".to_string()
    }

    fn max_work_group_size(&self) -> usize {
        self.max_work_group_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_limit() {
        assert_eq!(CpuDevice::new().max_work_group_size(), 1024);
        assert_eq!(CpuDevice::default().name(), "cpu");
    }

    #[test]
    fn test_custom_limit() {
        let device = CpuDevice::new().with_max_work_group_size(16);
        assert_eq!(device.max_work_group_size(), 16);
        assert!(device.is_same(&CpuDevice::new()));
        assert_eq!(CpuDevice::new().with_max_work_group_size(0).max_work_group_size(), 1);
    }
}
