//! CPU implementation of tensor operations.

pub mod conv;
