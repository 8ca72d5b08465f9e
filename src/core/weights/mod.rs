//! Weight collection
//!
//! A [`WeightCollector`] maps candidate test classes to the number of test
//! methods that will actually run under the active filtering policy. Two
//! strategies exist, selected by [`Framework`]:
//!
//! - [`JUnitCollector`]: tag include/exclude filtering over discovered classes
//! - [`TestNgCollector`]: suite files with per-class include lists
//!
//! Classes that cannot be resolved, and suites that cannot be parsed, count
//! as zero and are listed in the [`CollectionReport`]; they never abort the
//! run. Classes whose final weight is zero are removed from the map.

pub mod junit;
pub mod testng;

pub use junit::{JUnitCollector, TagFilter};
pub use testng::TestNgCollector;

use crate::core::models::{Framework, WeightMap};
use crate::core::resolver::ClassResolver;
use std::path::PathBuf;

/// Annotation simple names that mark a test method by default
pub const DEFAULT_TEST_ANNOTATIONS: &[&str] = &["Test"];

/// Trait for weight collection strategies
pub trait WeightCollector {
    /// Compute weights for the candidate classes
    fn collect(&self, classes: &[String], resolver: &dyn ClassResolver) -> Collection;

    /// Framework whose rules this collector applies
    fn framework(&self) -> Framework;
}

/// What happened during collection
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectionReport {
    /// Classes resolved successfully
    pub resolved: usize,
    /// Classes that failed to resolve, in first-seen order
    pub unresolved: Vec<String>,
    /// Resolved classes left with nothing to run
    pub dropped_zero: Vec<String>,
    /// Suite files that failed to load, with the reason
    pub suite_errors: Vec<(PathBuf, String)>,
}

impl CollectionReport {
    /// Record a resolution failure once per class
    pub fn record_unresolved(&mut self, class_name: &str) {
        if !self.unresolved.iter().any(|c| c == class_name) {
            self.unresolved.push(class_name.to_string());
        }
    }

    /// True if any class or suite had to be skipped
    pub fn has_failures(&self) -> bool {
        !self.unresolved.is_empty() || !self.suite_errors.is_empty()
    }
}

/// Weights plus the report that explains them
#[derive(Debug, Clone, Default)]
pub struct Collection {
    /// Positive weights in discovery order
    pub weights: WeightMap,
    /// Collection diagnostics
    pub report: CollectionReport,
}

impl Collection {
    /// Finish a collection: zero-weight classes are moved to the report
    pub fn new(mut weights: WeightMap, mut report: CollectionReport) -> Self {
        let dropped = weights.retain_positive();
        for name in &dropped {
            log::debug!("{} has no matching test methods, dropped", name);
        }
        report.dropped_zero.extend(dropped);

        log::info!(
            "collected {} classes ({} test methods); {} dropped, {} unresolved",
            weights.len(),
            weights.total_weight(),
            report.dropped_zero.len(),
            report.unresolved.len()
        );
        Self { weights, report }
    }
}

pub(crate) fn default_test_annotations() -> Vec<String> {
    DEFAULT_TEST_ANNOTATIONS.iter().map(|a| a.to_string()).collect()
}
