//! Operation traits

mod conv;

pub use conv::{Conv2dArgs, ConvOps, PaddingMode};
