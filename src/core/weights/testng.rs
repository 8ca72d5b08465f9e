//! TestNG suite/include-list strategy

use super::{default_test_annotations, Collection, CollectionReport, WeightCollector};
use crate::core::models::{Framework, TestClass, WeightMap};
use crate::core::resolver::{ClassResolver, ResolveError};
use crate::core::suite::{LoadedSuites, SuiteClass, SuiteDefinition};
use std::collections::HashMap;
use std::path::PathBuf;

/// Weighs the classes named by TestNG suite files
///
/// The candidate class list handed to [`WeightCollector::collect`] is not
/// consulted: TestNG runs exactly what the suites name.
#[derive(Debug, Clone)]
pub struct TestNgCollector {
    suites: Vec<PathBuf>,
    parallel_methods: bool,
    test_annotations: Vec<String>,
}

impl TestNgCollector {
    /// Create a collector over suite XML files
    pub fn new(suites: Vec<PathBuf>, parallel_methods: bool) -> Self {
        Self {
            suites,
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

    /// Collect weights from already-parsed suites
    pub fn collect_from(&self, suites: &[SuiteDefinition], resolver: &dyn ClassResolver) -> Collection {
        let mut weights = WeightMap::new();
        let mut report = CollectionReport::default();
        let mut cache: HashMap<String, std::result::Result<TestClass, ResolveError>> = HashMap::new();

        for suite in suites {
            for (test, entry) in suite.class_entries() {
                let resolved = cache.entry(entry.name.clone()).or_insert_with(|| {
                    let result = resolver.resolve(&entry.name);
                    match &result {
                        Ok(_) => report.resolved += 1,
                        Err(err) => log::warn!("skipping {}: {}", entry.name, err),
                    }
                    result
                });

                let weight = match resolved {
                    Ok(class) => self.weigh(class, entry),
                    Err(_) => {
                        report.record_unresolved(&entry.name);
                        0
                    }
                };
                log::debug!(
                    "{} / {} / {} -> {}",
                    suite.name,
                    test.name,
                    entry.name,
                    weight
                );
                weights.add(entry.name.as_str(), weight);
            }
        }

        Collection::new(weights, report)
    }

    /// Weight one `<class>` entry of a suite
    pub fn weigh(&self, class: &TestClass, entry: &SuiteClass) -> usize {
        let tests = class.test_methods(&self.test_annotations);
        match &entry.include_methods {
            Some(include) => tests.filter(|m| include.contains(&m.name)).count(),
            None if !self.parallel_methods => 1,
            None => tests
                .filter(|m| !entry.exclude_methods.contains(&m.name))
                .count(),
        }
    }
}

impl WeightCollector for TestNgCollector {
    fn collect(&self, _classes: &[String], resolver: &dyn ClassResolver) -> Collection {
        let loaded = LoadedSuites::load(&self.suites);
        log::info!(
            "loaded {} suite(s), {} failed",
            loaded.suites.len(),
            loaded.errors.len()
        );

        let mut collection = self.collect_from(&loaded.suites, resolver);
        collection.report.suite_errors = loaded.errors;
        collection
    }

    fn framework(&self) -> Framework {
        Framework::TestNg
    }
}
