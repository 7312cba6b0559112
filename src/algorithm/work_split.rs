//! Work-group sizing for the two convolution phases
//!
//! Launches are described as 3-D n-d ranges: a global index space that is an
//! exact multiple of a local work-group shape. The global space is rounded up
//! from the true problem extent, so kernels must discard ids past the extent.
//!
//! The group budget is the device's maximum work-group size capped by
//! [`GROUP_SIZE_GUESS`]. The column phase tiles kernel taps with it; the GEMM
//! phase divides it between output channels and output positions in
//! proportion to their extents.

use super::col_index::ColumnLayout;

/// Upper bound on work-group size regardless of what the device reports
///
/// Some devices advertise very large maximum work-groups that run slower than
/// moderate ones for this kernel pair.
pub const GROUP_SIZE_GUESS: usize = 256;

/// Tuning knobs for launch planning
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WorkGroupConfig {
    /// Cap applied on top of the device's maximum work-group size
    pub group_size_guess: usize,
}

impl Default for WorkGroupConfig {
    fn default() -> Self {
        Self {
            group_size_guess: GROUP_SIZE_GUESS,
        }
    }
}

impl WorkGroupConfig {
    /// Config with a custom group size cap
    pub const fn new(group_size_guess: usize) -> Self {
        Self { group_size_guess }
    }

    /// Invocations available to one work-group on a device
    ///
    /// `min(device_max, group_size_guess)`, never less than 1.
    pub fn group_budget(&self, device_max: usize) -> usize {
        device_max.min(self.group_size_guess).max(1)
    }
}

/// 1-D tiling of an extent
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Split1d {
    /// Work-group length
    pub each: usize,
    /// Dispatched length, `extent` rounded up to a multiple of `each`
    pub total: usize,
}

/// Tile `extent` with groups of at most `budget` invocations
pub fn split_1d(extent: usize, budget: usize) -> Split1d {
    let each = budget.min(extent).max(1);
    Split1d {
        each,
        total: extent.div_ceil(each) * each,
    }
}

/// 2-D tiling of an `a x b` extent under one group budget
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Split2d {
    /// Group length along `a`
    pub each_a: usize,
    /// Group length along `b`
    pub each_b: usize,
    /// Dispatched length along `a`
    pub total_a: usize,
    /// Dispatched length along `b`
    pub total_b: usize,
}

/// Divide `budget` between two axes in proportion to their extents
///
/// The tile aims for `each_b / each_a ≈ b / a`, so the larger axis gets the
/// larger share:
///
/// ```text
/// each_b = clamp(floor(sqrt(budget * b / a)), 1, min(b, budget))
/// each_a = clamp(budget / each_b, 1, a)
/// ```
///
/// `each_a * each_b <= budget` always holds.
pub fn proportionate_2d_work_split(a: usize, b: usize, budget: usize) -> Split2d {
    let a = a.max(1);
    let b = b.max(1);
    let budget = budget.max(1);

    let ideal_b = (budget.saturating_mul(b) / a).isqrt();
    let each_b = ideal_b.clamp(1, b.min(budget));
    let each_a = (budget / each_b).clamp(1, a);

    Split2d {
        each_a,
        each_b,
        total_a: a.div_ceil(each_a) * each_a,
        total_b: b.div_ceil(each_b) * each_b,
    }
}

/// A 3-D launch: global index space tiled by a local work-group shape
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NdRange {
    /// Global extent per dimension
    pub global: [usize; 3],
    /// Work-group extent per dimension, dividing `global`
    pub local: [usize; 3],
}

impl NdRange {
    /// Create a range; every `global[d]` must be a multiple of `local[d]`
    pub fn new(global: [usize; 3], local: [usize; 3]) -> Self {
        debug_assert!(
            (0..3).all(|d| local[d] > 0 && global[d] % local[d] == 0),
            "global {global:?} is not tiled by local {local:?}"
        );
        Self { global, local }
    }

    /// Number of work-groups per dimension
    pub fn group_count(&self) -> [usize; 3] {
        [
            self.global[0] / self.local[0],
            self.global[1] / self.local[1],
            self.global[2] / self.local[2],
        ]
    }

    /// Total number of work-groups
    pub fn num_groups(&self) -> usize {
        self.group_count().iter().product()
    }

    /// Invocations per work-group
    pub fn group_len(&self) -> usize {
        self.local.iter().product()
    }

    /// Total invocations
    pub fn len(&self) -> usize {
        self.global.iter().product()
    }

    /// Whether the range launches nothing
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Items of the work-group with row-major linear id `group`
    pub fn group_items(&self, group: usize) -> impl Iterator<Item = NdItem> {
        let [_, g1, g2] = self.group_count();
        let group_id = [group / (g1 * g2), (group / g2) % g1, group % g2];
        let local = self.local;
        (0..local[0]).flat_map(move |l0| {
            (0..local[1]).flat_map(move |l1| {
                (0..local[2]).map(move |l2| NdItem {
                    group: group_id,
                    local: [l0, l1, l2],
                    global: [
                        group_id[0] * local[0] + l0,
                        group_id[1] * local[1] + l1,
                        group_id[2] * local[2] + l2,
                    ],
                })
            })
        })
    }
}

/// One invocation within an [`NdRange`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NdItem {
    global: [usize; 3],
    local: [usize; 3],
    group: [usize; 3],
}

impl NdItem {
    /// Global id along `dim`
    #[inline]
    pub fn global_id(&self, dim: usize) -> usize {
        self.global[dim]
    }

    /// Id within the work-group along `dim`
    #[inline]
    pub fn local_id(&self, dim: usize) -> usize {
        self.local[dim]
    }

    /// Work-group id along `dim`
    #[inline]
    pub fn group_id(&self, dim: usize) -> usize {
        self.group[dim]
    }
}

/// Launch ranges for both phases of one convolution
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SmmLaunchPlan {
    /// Column builder: `[samples, channels, taps]`
    pub columns: NdRange,
    /// GEMM: `[samples, out_channels, out_area]`
    pub gemm: NdRange,
}

impl SmmLaunchPlan {
    /// Plan both launches for a device whose work-groups hold at most
    /// `max_work_group_size` invocations
    pub fn new(
        columns: &ColumnLayout,
        out_channels: usize,
        max_work_group_size: usize,
        config: &WorkGroupConfig,
    ) -> Self {
        let budget = config.group_budget(max_work_group_size);

        let taps = split_1d(columns.kernel_area, budget);
        let columns_range = NdRange::new(
            [columns.samples, columns.channels, taps.total],
            [1, 1, taps.each],
        );

        let out = proportionate_2d_work_split(out_channels, columns.out_area, budget);
        let gemm_range = NdRange::new(
            [columns.samples, out.total_a, out.total_b],
            [1, out.each_a, out.each_b],
        );

        Self {
            columns: columns_range,
            gemm: gemm_range,
        }
    }
}
