//! Backend-independent pieces of the im2col + GEMM convolution
//!
//! Everything here is pure and device-free, so every backend computes the same
//! output shape, launches the same work-group shapes and agrees on the same
//! column-buffer layout:
//!
//! - [`output_shape`] - output spatial extent for one axis
//! - [`work_split`] - n-d launch ranges for the column and GEMM phases
//! - [`col_index`] - linearization of the intermediate column buffer
//!
//! ```text
//! input [N, C_in, H, W]
//!   │  phase 1: column builder, range [N, C_in, taps]
//!   ▼
//! columns [N, out_h*out_w, C_in*K_h*K_w]      ◄── ColumnLayout
//!   │  barrier
//!   │  phase 2: GEMM, range [N, C_out, out_h*out_w]
//!   ▼
//! output [N, C_out, out_h, out_w]
//! ```

pub mod col_index;
pub mod output_shape;
pub mod work_split;

pub use col_index::ColumnLayout;
pub use output_shape::output_extent;
pub use work_split::{
    GROUP_SIZE_GUESS, NdItem, NdRange, SmmLaunchPlan, Split1d, Split2d, WorkGroupConfig,
    proportionate_2d_work_split, split_1d,
};
