//! Allocation engine
//!
//! Runs the whole pipeline for one configuration:
//! discover -> resolve -> collect weights -> allocate -> write artifact.
//!
//! Configuration problems abort before anything is allocated. Per-class
//! and per-suite failures are recovered inside collection and surface only
//! in the [`CollectionReport`]. Failing to write the artifact is fatal.

use crate::core::allocator::{allocator_for, AllocationSummary};
use crate::core::config::AllocatorConfig;
use crate::core::error::{Result, ResultExt};
use crate::core::java_source::SourceIndex;
use crate::core::models::{Bucket, Framework};
use crate::core::resolver::{ChainResolver, ClassResolver, InventoryResolver};
use crate::core::serialization::write_buckets;
use crate::core::walker::ClassDiscovery;
use crate::core::weights::{CollectionReport, JUnitCollector, TestNgCollector, WeightCollector};
use std::path::PathBuf;

/// Result of one allocation run
#[derive(Debug, Clone)]
pub struct AllocationOutcome {
    /// Buckets in creation order
    pub buckets: Vec<Bucket>,
    /// Aggregate figures for reporting
    pub summary: AllocationSummary,
    /// What collection skipped or dropped
    pub report: CollectionReport,
    /// Artifact written, if any
    pub output_path: Option<PathBuf>,
}

/// Main allocation engine
pub struct AllocationEngine {
    /// Run configuration
    config: AllocatorConfig,
    /// Resolver override; built from the config when absent
    resolver: Option<Box<dyn ClassResolver>>,
}

impl AllocationEngine {
    /// Create an engine for a configuration
    pub fn new(config: AllocatorConfig) -> Self {
        Self {
            config,
            resolver: None,
        }
    }

    /// Builder: use a custom class resolver instead of the configured sources
    pub fn with_resolver(mut self, resolver: impl ClassResolver + 'static) -> Self {
        self.resolver = Some(Box::new(resolver));
        self
    }

    /// Get the current config
    pub fn config(&self) -> &AllocatorConfig {
        &self.config
    }

    /// Candidate classes. TestNG takes its classes from the suites, so
    /// nothing is discovered for it.
    pub fn discover(&self) -> Result<Vec<String>> {
        match self.config.framework {
            Framework::JUnit => ClassDiscovery::new(self.config.output_directory())
                .with_patterns(self.config.class_patterns.clone())
                .discover(),
            Framework::TestNg => Ok(Vec::new()),
        }
    }

    /// Resolver chain: the inventory first, then the source index
    pub fn build_resolver(&self) -> Result<Box<dyn ClassResolver>> {
        let mut chain: Vec<Box<dyn ClassResolver>> = Vec::new();

        if let Some(path) = self.config.inventory_path() {
            let inventory = InventoryResolver::from_file(&path).context("loading class inventory")?;
            chain.push(Box::new(inventory));
        }

        let roots = self.config.source_directories();
        if !roots.is_empty() {
            chain.push(Box::new(SourceIndex::build(&roots)?));
        }

        Ok(Box::new(ChainResolver::new(chain)))
    }

    /// Weight collector for the configured framework
    pub fn collector(&self) -> Box<dyn WeightCollector> {
        let annotations = self.config.test_annotations.clone();
        match self.config.framework {
            Framework::JUnit => Box::new(
                JUnitCollector::new(self.config.tag_filter(), self.config.parallel_methods)
                    .with_test_annotations(annotations),
            ),
            Framework::TestNg => Box::new(
                TestNgCollector::new(self.config.suite_paths(), self.config.parallel_methods)
                    .with_test_annotations(annotations),
            ),
        }
    }

    /// Compute the allocation without writing anything
    pub fn plan(&self) -> Result<AllocationOutcome> {
        let allocation_config = self.config.allocation_config()?;
        self.config.validate_inputs()?;
        if self.resolver.is_none() {
            self.config.validate_class_sources()?;
        }

        log::info!(
            "allocating {} tests, at most {} methods per bucket ({})",
            self.config.framework.name(),
            allocation_config.max_weight_per_bucket(),
            self.config.policy.name()
        );

        let classes = self.discover()?;
        let built;
        let resolver: &dyn ClassResolver = match &self.resolver {
            Some(resolver) => resolver.as_ref(),
            None => {
                built = self.build_resolver()?;
                built.as_ref()
            }
        };

        let collection = self.collector().collect(&classes, resolver);

        let allocator = allocator_for(self.config.policy, allocation_config);
        let buckets = allocator.allocate(&collection.weights);
        let summary = AllocationSummary::from_buckets(&buckets, &allocation_config, allocator.policy());

        Ok(AllocationOutcome {
            buckets,
            summary,
            report: collection.report,
            output_path: None,
        })
    }

    /// Compute the allocation and write the artifact
    pub fn run(&self) -> Result<AllocationOutcome> {
        let mut outcome = self.plan()?;
        let path = write_buckets(&self.config.output_file(), &outcome.buckets)?;
        outcome.output_path = Some(path);
        Ok(outcome)
    }
}
