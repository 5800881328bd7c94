//! ferrosync testing suite
//!
//! Integration tests for the synchronizer's observable properties and
//! benchmarks over in-memory trees.

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Shared fixtures for tests and benchmarks
pub mod test_utils;
