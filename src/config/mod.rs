//! # PailDB Configuration Module
//!
//! This module centralizes all configuration constants for PailDB. The bucket
//! file format is defined entirely by the values in [`constants`]; code reads
//! them from here instead of declaring local copies, and interdependent values
//! are guarded by compile-time assertions.
//!
//! ## Module Organization
//!
//! - [`constants`]: All layout and naming values with dependency documentation

pub mod constants;
pub use constants::*;
