//! Core data models for the bucket allocator
//!
//! This module contains the data structures shared by the weight
//! collectors, the allocators and the serializer.

use crate::core::error::{BucketError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A test class paired with its scheduling weight
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClassWeight {
    /// Fully-qualified class name
    pub class_name: String,
    /// Number of test methods expected to run
    pub weight: usize,
}

impl ClassWeight {
    /// Create a new class weight
    pub fn new(class_name: impl Into<String>, weight: usize) -> Self {
        Self {
            class_name: class_name.into(),
            weight,
        }
    }
}

/// Class name to weight mapping that remembers discovery order.
///
/// Adding a class that is already present sums the weights, so the map
/// can absorb contributions from several suite entries (or several
/// workers) in any order and end up with the same totals.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WeightMap {
    entries: Vec<(String, usize)>,
    index: HashMap<String, usize>,
}

impl WeightMap {
    /// Create an empty weight map
    pub fn new() -> Self {
        Self::default()
    }

    /// Add weight for a class, accumulating into an existing entry
    pub fn add(&mut self, class_name: impl Into<String>, weight: usize) {
        let class_name = class_name.into();
        match self.index.get(&class_name) {
            Some(&slot) => {
                let entry = &mut self.entries[slot].1;
                *entry = entry.saturating_add(weight);
            }
            None => {
                self.index.insert(class_name.clone(), self.entries.len());
                self.entries.push((class_name, weight));
            }
        }
    }

    /// Merge another map into this one; classes new to `self` keep the
    /// order they had in `other`
    pub fn merge(&mut self, other: WeightMap) {
        for (name, weight) in other.entries {
            self.add(name, weight);
        }
    }

    /// Weight recorded for a class
    pub fn get(&self, class_name: &str) -> Option<usize> {
        self.index.get(class_name).map(|&slot| self.entries[slot].1)
    }

    /// Check whether a class is present
    pub fn contains(&self, class_name: &str) -> bool {
        self.index.contains_key(class_name)
    }

    /// Number of classes
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if no class has been recorded
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of all weights
    pub fn total_weight(&self) -> usize {
        self.entries.iter().map(|(_, w)| *w).sum()
    }

    /// Iterate `(class name, weight)` pairs in discovery order
    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> + '_ {
        self.entries.iter().map(|(name, w)| (name.as_str(), *w))
    }

    /// Snapshot of the entries as immutable pairs, in discovery order
    pub fn class_weights(&self) -> Vec<ClassWeight> {
        self.iter().map(|(name, w)| ClassWeight::new(name, w)).collect()
    }

    /// Remove classes with weight 0 and return their names
    pub fn retain_positive(&mut self) -> Vec<String> {
        let (kept, dropped): (Vec<_>, Vec<_>) =
            self.entries.drain(..).partition(|(_, w)| *w > 0);

        self.index = kept
            .iter()
            .enumerate()
            .map(|(slot, (name, _))| (name.clone(), slot))
            .collect();
        self.entries = kept;

        dropped.into_iter().map(|(name, _)| name).collect()
    }
}

impl<S: Into<String>> FromIterator<(S, usize)> for WeightMap {
    fn from_iter<I: IntoIterator<Item = (S, usize)>>(iter: I) -> Self {
        let mut map = WeightMap::new();
        for (name, weight) in iter {
            map.add(name, weight);
        }
        map
    }
}

/// Capacity bound for the allocator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocationConfig {
    max_weight_per_bucket: usize,
}

impl AllocationConfig {
    /// Create a config; a zero bound cannot make progress and is rejected
    pub fn new(max_weight_per_bucket: usize) -> Result<Self> {
        if max_weight_per_bucket == 0 {
            return Err(BucketError::invalid_config(
                "maxMethodsPerBucket must be a positive integer",
            ));
        }
        Ok(Self {
            max_weight_per_bucket,
        })
    }

    /// Maximum total weight a multi-class bucket may hold
    pub fn max_weight_per_bucket(&self) -> usize {
        self.max_weight_per_bucket
    }
}

/// A group of test classes that run together in one CI job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bucket {
    /// Position in the allocator output, oldest bucket first
    #[serde(rename = "jobIndex")]
    pub index: usize,
    /// Class names in assignment order
    #[serde(rename = "classes")]
    pub class_names: Vec<String>,
    /// Sum of the weights of `class_names`
    #[serde(rename = "totalMethods")]
    pub total_weight: usize,
}

impl Bucket {
    /// Create an empty bucket
    pub fn new(index: usize) -> Self {
        Self {
            index,
            class_names: Vec::new(),
            total_weight: 0,
        }
    }

    /// Assign a class to this bucket
    pub fn push(&mut self, class_name: impl Into<String>, weight: usize) {
        self.class_names.push(class_name.into());
        self.total_weight += weight;
    }

    /// True if the bucket holds exactly one class
    pub fn is_singleton(&self) -> bool {
        self.class_names.len() == 1
    }

    /// True if the bucket's weight is above the configured bound
    pub fn exceeds(&self, config: &AllocationConfig) -> bool {
        self.total_weight > config.max_weight_per_bucket()
    }
}

/// A method declared directly on a test class
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestMethod {
    /// Method name
    pub name: String,
    /// Simple annotation names (`Test`, `ParameterizedTest`, ...)
    #[serde(default)]
    pub annotations: Vec<String>,
    /// JUnit tags attached to the method
    #[serde(default)]
    pub tags: Vec<String>,
}

impl TestMethod {
    /// Create a method with the given annotations and no tags
    pub fn new(name: impl Into<String>, annotations: &[&str]) -> Self {
        Self {
            name: name.into(),
            annotations: annotations.iter().map(|a| a.to_string()).collect(),
            tags: Vec::new(),
        }
    }

    /// Builder-style tag assignment
    pub fn with_tags(mut self, tags: &[&str]) -> Self {
        self.tags = tags.iter().map(|t| t.to_string()).collect();
        self
    }

    /// True if any of `annotations` is present on the method
    pub fn has_any_annotation(&self, annotations: &[String]) -> bool {
        self.annotations.iter().any(|a| annotations.contains(a))
    }
}

/// Resolved view of a test class
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestClass {
    /// Fully-qualified binary name
    pub name: String,
    /// Abstract classes and interfaces never run on their own
    #[serde(rename = "abstract", default)]
    pub is_abstract: bool,
    /// Methods declared directly on the class (inherited ones excluded)
    #[serde(default)]
    pub methods: Vec<TestMethod>,
}

impl TestClass {
    /// Create a concrete class with the given methods
    pub fn new(name: impl Into<String>, methods: Vec<TestMethod>) -> Self {
        Self {
            name: name.into(),
            is_abstract: false,
            methods,
        }
    }

    /// Methods carrying any of the given test annotations
    pub fn test_methods<'a>(
        &'a self,
        annotations: &'a [String],
    ) -> impl Iterator<Item = &'a TestMethod> + 'a {
        self.methods
            .iter()
            .filter(move |m| m.has_any_annotation(annotations))
    }
}

/// Test framework whose inclusion rules drive weight collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Framework {
    /// Tag filtering over discovered classes
    #[default]
    JUnit,
    /// Suite files with per-class include lists
    TestNg,
}

impl Framework {
    /// Display name used in logs
    pub fn name(&self) -> &'static str {
        match self {
            Framework::JUnit => "junit",
            Framework::TestNg => "testng",
        }
    }
}

/// Bucket selection rule used by the allocator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AllocationPolicy {
    /// Least-loaded bucket that still fits (LPT with a hard cap)
    #[default]
    WorstFit,
    /// Oldest bucket that still fits (first-fit decreasing)
    FirstFit,
}

impl AllocationPolicy {
    /// Display name used in logs and reports
    pub fn name(&self) -> &'static str {
        match self {
            AllocationPolicy::WorstFit => "worst-fit",
            AllocationPolicy::FirstFit => "first-fit",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weight_map_keeps_discovery_order() {
        let map: WeightMap = vec![("b.B", 1), ("a.A", 3), ("c.C", 2)].into_iter().collect();
        let names: Vec<&str> = map.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["b.B", "a.A", "c.C"]);
    }

    #[test]
    fn test_weight_map_accumulates() {
        let mut map = WeightMap::new();
        map.add("a.A", 2);
        map.add("b.B", 1);
        map.add("a.A", 3);
        assert_eq!(map.get("a.A"), Some(5));
        assert_eq!(map.len(), 2);
        assert_eq!(map.total_weight(), 6);
        assert_eq!(map.iter().next(), Some(("a.A", 5)));
    }

    #[test]
    fn test_weight_map_merge_is_order_independent_for_totals() {
        let left: WeightMap = vec![("a.A", 1), ("b.B", 2)].into_iter().collect();
        let right: WeightMap = vec![("b.B", 4), ("c.C", 1)].into_iter().collect();

        let mut one = left.clone();
        one.merge(right.clone());
        let mut two = right;
        two.merge(left);

        for name in ["a.A", "b.B", "c.C"] {
            assert_eq!(one.get(name), two.get(name));
        }
        assert_eq!(one.get("b.B"), Some(6));
    }

    #[test]
    fn test_retain_positive_drops_zero_weights() {
        let mut map: WeightMap = vec![("a.A", 0), ("b.B", 2), ("c.C", 0), ("d.D", 1)]
            .into_iter()
            .collect();
        let dropped = map.retain_positive();

        assert_eq!(dropped, vec!["a.A".to_string(), "c.C".to_string()]);
        assert_eq!(map.len(), 2);
        assert!(!map.contains("a.A"));
        assert_eq!(map.get("d.D"), Some(1));

        // Index must still line up after the rebuild
        map.add("d.D", 1);
        assert_eq!(map.get("d.D"), Some(2));
    }

    #[test]
    fn test_class_weights_snapshot() {
        let map: WeightMap = vec![("a.A", 4)].into_iter().collect();
        assert_eq!(map.class_weights(), vec![ClassWeight::new("a.A", 4)]);
    }

    #[test]
    fn test_allocation_config_rejects_zero() {
        let err = AllocationConfig::new(0).unwrap_err();
        assert!(err.is_config_error());
        assert_eq!(AllocationConfig::new(6).unwrap().max_weight_per_bucket(), 6);
    }

    #[test]
    fn test_bucket_push_tracks_total() {
        let config = AllocationConfig::new(4).unwrap();
        let mut bucket = Bucket::new(0);
        bucket.push("a.A", 3);
        assert!(bucket.is_singleton());
        bucket.push("b.B", 2);
        assert_eq!(bucket.total_weight, 5);
        assert!(bucket.exceeds(&config));
    }

    #[test]
    fn test_bucket_json_field_names() {
        let mut bucket = Bucket::new(2);
        bucket.push("com.acme.FooTest", 7);
        let json = serde_json::to_string(&bucket).unwrap();
        assert_eq!(
            json,
            r#"{"jobIndex":2,"classes":["com.acme.FooTest"],"totalMethods":7}"#
        );
    }

    #[test]
    fn test_test_class_deserialize_defaults() {
        let class: TestClass =
            serde_json::from_str(r#"{"name": "a.A", "methods": [{"name": "m"}]}"#).unwrap();
        assert!(!class.is_abstract);
        assert!(class.methods[0].annotations.is_empty());
    }

    #[test]
    fn test_test_methods_filter() {
        let class = TestClass::new(
            "a.A",
            vec![
                TestMethod::new("one", &["Test"]),
                TestMethod::new("helper", &[]),
                TestMethod::new("two", &["ParameterizedTest"]),
            ],
        );
        let annotations = vec!["Test".to_string()];
        assert_eq!(class.test_methods(&annotations).count(), 1);
    }

    #[test]
    fn test_framework_serde() {
        assert_eq!(Framework::default().name(), "junit");
        assert!(serde_json::from_str::<Framework>(r#""spock""#).is_err());
        let fw: Framework = serde_json::from_str(r#""testng""#).unwrap();
        assert_eq!(fw, Framework::TestNg);
    }

    #[test]
    fn test_policy_serde() {
        assert_eq!(AllocationPolicy::default().name(), "worst-fit");
        let p: AllocationPolicy = serde_json::from_str(r#""first-fit""#).unwrap();
        assert_eq!(p, AllocationPolicy::FirstFit);
    }
}
