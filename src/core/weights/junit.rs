//! JUnit tag-filter strategy

use super::{default_test_annotations, Collection, CollectionReport, WeightCollector};
use crate::core::models::{Framework, TestClass, WeightMap};
use crate::core::resolver::ClassResolver;
use std::collections::HashSet;

/// Include/exclude tag expression, JUnit Platform style.
///
/// A method matches when the include set is empty or the method has at
/// least one included tag, and the method has no excluded tag.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagFilter {
    include: HashSet<String>,
    exclude: HashSet<String>,
}

impl TagFilter {
    /// Create a filter from include and exclude tags
    pub fn new(include: &[String], exclude: &[String]) -> Self {
        let clean = |tags: &[String]| {
            tags.iter()
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect::<HashSet<_>>()
        };
        Self {
            include: clean(include),
            exclude: clean(exclude),
        }
    }

    /// Check a method's tags against the filter
    pub fn matches(&self, tags: &[String]) -> bool {
        let included = self.include.is_empty() || tags.iter().any(|t| self.include.contains(t));
        included && !tags.iter().any(|t| self.exclude.contains(t))
    }
}

/// Weighs discovered classes by their tag-matching test methods
#[derive(Debug, Clone)]
pub struct JUnitCollector {
    filter: TagFilter,
    parallel_methods: bool,
    test_annotations: Vec<String>,
}

impl JUnitCollector {
    /// Create a collector
    pub fn new(filter: TagFilter, parallel_methods: bool) -> Self {
        Self {
            filter,
            parallel_methods,
            test_annotations: default_test_annotations(),
        }
    }

    /// Override the annotation names that mark a test method
    pub fn with_test_annotations(mut self, annotations: Vec<String>) -> Self {
        if !annotations.is_empty() {
            self.test_annotations = annotations;
        }
        self
    }

    /// Weight of one resolved class.
    ///
    /// Without method-level parallelism a class is one atomic unit: weight
    /// 1 if anything in it runs, 0 otherwise.
    pub fn weigh(&self, class: &TestClass) -> usize {
        if class.is_abstract {
            return 0;
        }
        let matching = class
            .test_methods(&self.test_annotations)
            .filter(|m| self.filter.matches(&m.tags))
            .count();

        if self.parallel_methods {
            matching
        } else {
            matching.min(1)
        }
    }
}

impl WeightCollector for JUnitCollector {
    fn collect(&self, classes: &[String], resolver: &dyn ClassResolver) -> Collection {
        let mut weights = WeightMap::new();
        let mut report = CollectionReport::default();

        for class_name in classes {
            match resolver.resolve(class_name) {
                Ok(class) => {
                    let weight = self.weigh(&class);
                    log::debug!("{} -> {}", class_name, weight);
                    report.resolved += 1;
                    weights.add(class_name.as_str(), weight);
                }
                Err(err) => {
                    log::warn!("skipping {}: {}", class_name, err);
                    report.record_unresolved(class_name);
                }
            }
        }

        Collection::new(weights, report)
    }

    fn framework(&self) -> Framework {
        Framework::JUnit
    }
}
