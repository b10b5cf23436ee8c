//! # sqlsnap Configuration Module
//!
//! This module centralizes the constants that define the snapshot wire format.
//! Several of them are interdependent (column flag layout vs. the largest kind
//! discriminant, tick scale vs. nanoseconds), so they live together and are
//! cross-checked with compile-time assertions.
//!
//! ## Module Organization
//!
//! - [`constants`]: All protocol constants with dependency documentation

pub mod constants;
pub use constants::*;
