//! Core module for the test bucket allocator
//!
//! # Architecture
//!
//! - `models`: Core data structures (WeightMap, Bucket, TestClass, AllocationConfig)
//! - `error`: Error types using thiserror
//! - `config`: AllocatorConfig loaded from JSON, overridden by the CLI
//! - `walker`: Test class discovery over compiled output
//! - `resolver`: ClassResolver trait + JSON inventory
//! - `java_source`: tree-sitter-java resolver over test sources
//! - `suite`: TestNG suite XML reader
//! - `weights`: WeightCollector strategies (JUnit, TestNG)
//! - `allocator`: BucketAllocator policies (worst-fit, first-fit)
//! - `serialization`: JSON artifact writer
//! - `engine`: Main AllocationEngine orchestration

pub mod models;
pub mod error;
pub mod config;
pub mod walker;
pub mod resolver;
pub mod java_source;
pub mod suite;
pub mod weights;
pub mod allocator;
pub mod serialization;
pub mod engine;

// Re-export commonly used types
pub use models::{
    AllocationConfig, AllocationPolicy, Bucket, ClassWeight, Framework, TestClass, TestMethod,
    WeightMap,
};
pub use error::{BucketError, Result, ResultExt};
pub use config::{AllocatorConfig, DEFAULT_CONFIG_FILE};
pub use walker::ClassDiscovery;
pub use resolver::{ChainResolver, ClassResolver, InventoryResolver, ResolveError};
pub use java_source::SourceIndex;
pub use suite::{LoadedSuites, SuiteClass, SuiteDefinition, SuiteTest};
pub use weights::{
    Collection, CollectionReport, JUnitCollector, TagFilter, TestNgCollector, WeightCollector,
};
pub use allocator::{
    allocator_for, AllocationSummary, BucketAllocator, FirstFitAllocator, WorstFitAllocator,
};
pub use serialization::{read_buckets, write_buckets, JsonSerializer, Serializer};
pub use engine::{AllocationEngine, AllocationOutcome};
