//! test_buckets - split a JVM test suite into balanced CI buckets
//!
//! Inspects a project's test classes, weighs each one by the number of
//! test methods that will actually run (JUnit tag filters or TestNG suite
//! include lists), and partitions the classes into buckets bounded by a
//! maximum weight. The buckets are written as a JSON array that a CI
//! pipeline fans out to parallel jobs.
//!
//! # Architecture
//!
//! This crate follows the "Library-First" pattern:
//! - **lib.rs** (this file): Pure logic, no CLI concerns
//! - **bin/tba.rs**: Thin wrapper that calls the library
//!
//! # Example
//!
//! ```
//! use test_buckets::{allocator_for, AllocationConfig, AllocationPolicy, BucketAllocator, WeightMap};
//!
//! let weights: WeightMap = vec![("A", 5), ("B", 4), ("C", 3), ("D", 2)]
//!     .into_iter()
//!     .collect();
//! let config = AllocationConfig::new(5).unwrap();
//! let buckets = allocator_for(AllocationPolicy::WorstFit, config).allocate(&weights);
//!
//! assert_eq!(buckets.len(), 3);
//! assert_eq!(buckets[2].class_names, vec!["C", "D"]);
//! ```

pub mod core;

pub use crate::core::*;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Returns the version of the test_buckets library
pub fn version() -> &'static str {
    VERSION
}
