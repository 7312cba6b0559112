//! Backend parity tests: every backend must agree with the CPU runtime.
//!
//! Without the `wgpu` feature these only exercise the CPU side.

#[path = "../common/mod.rs"]
mod common;

mod conv;
mod helpers;
