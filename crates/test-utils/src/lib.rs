//! Shared test utilities for the contour workspace.
//!
//! This crate provides common testing infrastructure including:
//! - Synthetic scalar field generators
//! - Coordinate and mask generators
//! - Hand-checkable grid fixtures
//!
//! # Usage
//!
//! Add to your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { path = "../test-utils" }
//! ```
//!
//! Then import in your tests:
//!
//! ```ignore
//! use test_utils::{central_peak, create_wave_grid};
//! ```

pub mod fixtures;
pub mod generators;

// Re-export commonly used items at the crate root
pub use fixtures::*;
pub use generators::*;
