//! Bucket allocation
//!
//! Partitions a [`WeightMap`] into buckets bounded by a maximum weight.
//! Both policies share the same skeleton:
//!
//! 1. Sort classes by weight descending (stable, so discovery order breaks ties)
//! 2. A class heavier than the bound gets a singleton bucket of its own
//! 3. Otherwise pick an open bucket that can take the class without
//!    exceeding the bound, or open a new one if none can
//!
//! They differ only in step 3: worst-fit picks the least-loaded candidate,
//! first-fit picks the oldest one. Buckets are numbered in creation order.

use crate::core::models::{AllocationConfig, AllocationPolicy, Bucket, WeightMap};
use sha2::{Digest, Sha256};

/// Strategy that turns a weight map into buckets
pub trait BucketAllocator: Send + Sync {
    /// Partition `weights` into buckets
    fn allocate(&self, weights: &WeightMap) -> Vec<Bucket>;

    /// Policy name for reports
    fn policy(&self) -> AllocationPolicy;
}

/// Longest-processing-time first with a hard capacity bound
#[derive(Debug, Clone)]
pub struct WorstFitAllocator {
    config: AllocationConfig,
}

impl WorstFitAllocator {
    /// Create a new worst-fit allocator
    pub fn new(config: AllocationConfig) -> Self {
        Self { config }
    }
}

impl BucketAllocator for WorstFitAllocator {
    fn allocate(&self, weights: &WeightMap) -> Vec<Bucket> {
        assign(weights, &self.config, |buckets, weight, max| {
            buckets
                .iter()
                .enumerate()
                .filter(|(_, b)| fits(b, weight, max))
                // min_by_key keeps the first minimum, i.e. the oldest bucket
                .min_by_key(|(_, b)| b.total_weight)
                .map(|(slot, _)| slot)
        })
    }

    fn policy(&self) -> AllocationPolicy {
        AllocationPolicy::WorstFit
    }
}

/// First-fit decreasing with a hard capacity bound
#[derive(Debug, Clone)]
pub struct FirstFitAllocator {
    config: AllocationConfig,
}

impl FirstFitAllocator {
    /// Create a new first-fit allocator
    pub fn new(config: AllocationConfig) -> Self {
        Self { config }
    }
}

impl BucketAllocator for FirstFitAllocator {
    fn allocate(&self, weights: &WeightMap) -> Vec<Bucket> {
        assign(weights, &self.config, |buckets, weight, max| {
            buckets
                .iter()
                .position(|b| fits(b, weight, max))
        })
    }

    fn policy(&self) -> AllocationPolicy {
        AllocationPolicy::FirstFit
    }
}

/// Build the allocator for a policy
pub fn allocator_for(policy: AllocationPolicy, config: AllocationConfig) -> Box<dyn BucketAllocator> {
    match policy {
        AllocationPolicy::WorstFit => Box::new(WorstFitAllocator::new(config)),
        AllocationPolicy::FirstFit => Box::new(FirstFitAllocator::new(config)),
    }
}

/// Shared greedy loop. `choose` returns the slot of the bucket that should
/// receive a class of the given weight, or `None` to open a new bucket.
fn assign<F>(weights: &WeightMap, config: &AllocationConfig, choose: F) -> Vec<Bucket>
where
    F: Fn(&[Bucket], usize, usize) -> Option<usize>,
{
    let max = config.max_weight_per_bucket();

    let mut sorted: Vec<(&str, usize)> = weights
        .iter()
        .filter(|(name, weight)| {
            if *weight == 0 {
                log::debug!("skipping {} with no runnable tests", name);
            }
            *weight > 0
        })
        .collect();
    // sort_by is stable: equal weights keep discovery order
    sorted.sort_by(|a, b| b.1.cmp(&a.1));

    let mut buckets: Vec<Bucket> = Vec::new();

    for (name, weight) in sorted {
        if weight > max {
            log::debug!(
                "{} weighs {} (> {}), giving it a bucket of its own",
                name,
                weight,
                max
            );
            open_bucket(&mut buckets, name, weight);
            continue;
        }

        match choose(&buckets, weight, max) {
            Some(slot) => buckets[slot].push(name, weight),
            None => open_bucket(&mut buckets, name, weight),
        }
    }

    buckets
}

/// Room check that cannot overflow. Oversized singletons have no room.
fn fits(bucket: &Bucket, weight: usize, max: usize) -> bool {
    max.checked_sub(bucket.total_weight).is_some_and(|room| weight <= room)
}

fn open_bucket(buckets: &mut Vec<Bucket>, class_name: &str, weight: usize) {
    let mut bucket = Bucket::new(buckets.len());
    bucket.push(class_name, weight);
    buckets.push(bucket);
}

/// Summary of an allocation run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocationSummary {
    /// Policy used
    pub policy: AllocationPolicy,
    /// Configured bound
    pub max_weight_per_bucket: usize,
    /// Number of buckets produced
    pub bucket_count: usize,
    /// Number of classes assigned
    pub class_count: usize,
    /// Sum of all bucket weights
    pub total_weight: usize,
    /// Lightest bucket weight (0 when there are no buckets)
    pub min_bucket_weight: usize,
    /// Heaviest bucket weight (0 when there are no buckets)
    pub max_bucket_weight: usize,
    /// Singleton buckets whose one class is heavier than the bound
    pub oversized_count: usize,
    /// SHA-256 over the assignment, stable for identical inputs
    pub fingerprint: String,
}

impl AllocationSummary {
    /// Compute a summary for a finished allocation
    pub fn from_buckets(
        buckets: &[Bucket],
        config: &AllocationConfig,
        policy: AllocationPolicy,
    ) -> Self {
        Self {
            policy,
            max_weight_per_bucket: config.max_weight_per_bucket(),
            bucket_count: buckets.len(),
            class_count: buckets.iter().map(|b| b.class_names.len()).sum(),
            total_weight: buckets.iter().map(|b| b.total_weight).sum(),
            min_bucket_weight: buckets.iter().map(|b| b.total_weight).min().unwrap_or(0),
            max_bucket_weight: buckets.iter().map(|b| b.total_weight).max().unwrap_or(0),
            oversized_count: buckets.iter().filter(|b| b.exceeds(config)).count(),
            fingerprint: fingerprint(buckets),
        }
    }

    /// Lower bound on bucket count for this total weight
    pub fn lower_bound(&self) -> usize {
        self.total_weight.div_ceil(self.max_weight_per_bucket)
    }

    /// Print a formatted allocation report to stderr
    pub fn print_report(&self) {
        eprintln!("{}", "=".repeat(70));
        eprintln!("TEST BUCKET ALLOCATION");
        eprintln!("{}", "=".repeat(70));
        eprintln!("Policy:        {}", self.policy.name());
        eprintln!("Max/bucket:    {:>8}", self.max_weight_per_bucket);
        eprintln!("Classes:       {:>8}", self.class_count);
        eprintln!("Test methods:  {:>8}", self.total_weight);
        eprintln!(
            "Buckets:       {:>8} (lower bound {})",
            self.bucket_count,
            self.lower_bound()
        );
        if self.bucket_count > 0 {
            eprintln!(
                "Bucket weight: {:>8} .. {}",
                self.min_bucket_weight, self.max_bucket_weight
            );
        }
        if self.oversized_count > 0 {
            eprintln!(
                "Oversized:     {:>8} single-class bucket(s) above the bound",
                self.oversized_count
            );
        }
        eprintln!("Fingerprint:   {}", &self.fingerprint[..16]);
        eprintln!("{}", "=".repeat(70));
    }
}

/// Hash the assignment so two runs can be compared cheaply
pub fn fingerprint(buckets: &[Bucket]) -> String {
    let mut hasher = Sha256::new();
    for bucket in buckets {
        hasher.update(bucket.index.to_le_bytes());
        for name in &bucket.class_names {
            hasher.update(name.as_bytes());
            hasher.update([0u8]);
        }
        hasher.update(bucket.total_weight.to_le_bytes());
    }
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    fn map(entries: &[(&str, usize)]) -> WeightMap {
        entries.iter().map(|(n, w)| (*n, *w)).collect()
    }

    fn worst_fit(max: usize) -> WorstFitAllocator {
        WorstFitAllocator::new(AllocationConfig::new(max).unwrap())
    }

    fn first_fit(max: usize) -> FirstFitAllocator {
        FirstFitAllocator::new(AllocationConfig::new(max).unwrap())
    }

    fn names(bucket: &Bucket) -> Vec<&str> {
        bucket.class_names.iter().map(String::as_str).collect()
    }

    /// Conservation, partition, capacity and index checks shared by tests
    fn assert_well_formed(weights: &WeightMap, buckets: &[Bucket], max: usize) {
        let total: usize = buckets.iter().map(|b| b.total_weight).sum();
        assert_eq!(total, weights.total_weight());

        let mut seen = HashSet::new();
        for (i, bucket) in buckets.iter().enumerate() {
            assert_eq!(bucket.index, i);
            let sum: usize = bucket
                .class_names
                .iter()
                .map(|n| weights.get(n).unwrap())
                .sum();
            assert_eq!(sum, bucket.total_weight);
            if bucket.class_names.len() > 1 {
                assert!(bucket.total_weight <= max, "bucket {} over capacity", i);
            } else if bucket.total_weight > max {
                assert!(bucket.is_singleton());
            }
            for name in &bucket.class_names {
                assert!(seen.insert(name.clone()), "{} assigned twice", name);
            }
        }

        let expected: HashSet<String> = weights
            .iter()
            .filter(|(_, w)| *w > 0)
            .map(|(n, _)| n.to_string())
            .collect();
        assert_eq!(seen, expected);
    }

    #[test]
    fn test_worked_example() {
        let weights = map(&[("A", 5), ("B", 4), ("C", 3), ("D", 2)]);
        let buckets = worst_fit(6).allocate(&weights);

        assert_eq!(buckets.len(), 3);
        assert_eq!(names(&buckets[0]), vec!["A"]);
        assert_eq!(buckets[0].total_weight, 5);
        assert_eq!(names(&buckets[1]), vec!["B"]);
        assert_eq!(buckets[1].total_weight, 4);
        assert_eq!(names(&buckets[2]), vec!["C", "D"]);
        assert_eq!(buckets[2].total_weight, 5);
        assert_well_formed(&weights, &buckets, 6);
    }

    #[test]
    fn test_first_fit_differs_on_worked_example() {
        let weights = map(&[("A", 5), ("B", 4), ("C", 3), ("D", 2)]);
        let buckets = first_fit(6).allocate(&weights);

        // D lands in the oldest bucket that fits (B's), not the lightest
        assert_eq!(names(&buckets[1]), vec!["B", "D"]);
        assert_eq!(names(&buckets[2]), vec!["C"]);
        assert_well_formed(&weights, &buckets, 6);
    }

    #[test]
    fn test_oversized_class_gets_singleton() {
        let weights = map(&[("Big", 2), ("Small", 1)]);
        let buckets = worst_fit(1).allocate(&weights);

        assert_eq!(buckets.len(), 2);
        assert_eq!(names(&buckets[0]), vec!["Big"]);
        assert_eq!(buckets[0].total_weight, 2);
        assert_well_formed(&weights, &buckets, 1);
    }

    #[test]
    fn test_oversized_bucket_never_accepts_more() {
        let weights = map(&[("Huge", 10), ("A", 1), ("B", 1)]);
        let buckets = worst_fit(3).allocate(&weights);

        assert_eq!(names(&buckets[0]), vec!["Huge"]);
        assert_eq!(names(&buckets[1]), vec!["A", "B"]);
    }

    #[test]
    fn test_empty_map_gives_no_buckets() {
        assert!(worst_fit(5).allocate(&WeightMap::new()).is_empty());
        assert!(first_fit(5).allocate(&WeightMap::new()).is_empty());
    }

    #[test]
    fn test_zero_weights_never_assigned() {
        let weights = map(&[("Empty", 0), ("A", 2)]);
        let buckets = worst_fit(5).allocate(&weights);
        assert_eq!(buckets.len(), 1);
        assert_eq!(names(&buckets[0]), vec!["A"]);
        assert_well_formed(&weights, &buckets, 5);
    }

    #[test]
    fn test_ties_follow_discovery_order() {
        let weights = map(&[("Z", 2), ("Y", 2), ("X", 2)]);
        let buckets = worst_fit(2).allocate(&weights);
        let order: Vec<&str> = buckets.iter().map(|b| b.class_names[0].as_str()).collect();
        assert_eq!(order, vec!["Z", "Y", "X"]);
    }

    #[test]
    fn test_worst_fit_picks_lightest_candidate() {
        // C fits both open buckets; worst-fit takes the lighter one
        let weights = map(&[("A", 6), ("B", 5), ("C", 3)]);

        let buckets = worst_fit(10).allocate(&weights);
        let loads: Vec<usize> = buckets.iter().map(|b| b.total_weight).collect();
        assert_eq!(loads, vec![6, 8]);

        let buckets = first_fit(10).allocate(&weights);
        let loads: Vec<usize> = buckets.iter().map(|b| b.total_weight).collect();
        assert_eq!(loads, vec![9, 5]);
    }

    #[test]
    fn test_equal_candidates_prefer_oldest() {
        let weights = map(&[("A", 6), ("B", 6), ("C", 3), ("D", 3)]);
        let buckets = worst_fit(10).allocate(&weights);
        assert_eq!(names(&buckets[0]), vec!["A", "C"]);
        assert_eq!(names(&buckets[1]), vec!["B", "D"]);
    }

    #[test]
    fn test_exact_fit_is_allowed() {
        let weights = map(&[("A", 3), ("B", 3)]);
        let buckets = worst_fit(6).allocate(&weights);
        assert_eq!(buckets.len(), 1);
        assert_eq!(buckets[0].total_weight, 6);
    }

    #[test]
    fn test_deterministic_across_runs() {
        let weights = map(&[
            ("a.A", 7), ("b.B", 3), ("c.C", 3), ("d.D", 9), ("e.E", 1),
            ("f.F", 4), ("g.G", 4), ("h.H", 2), ("i.I", 12), ("j.J", 5),
        ]);
        let allocator = worst_fit(10);
        let first = allocator.allocate(&weights);
        let second = allocator.allocate(&weights);
        assert_eq!(first, second);
        assert_eq!(fingerprint(&first), fingerprint(&second));
        assert_well_formed(&weights, &first, 10);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn test_generated_inputs_are_well_formed(
            raw in prop::collection::vec(0usize..15, 0..40),
            max in 1usize..=12
        ) {
            let weights: WeightMap = raw
                .iter()
                .enumerate()
                .map(|(i, w)| (format!("pkg.C{}", i), *w))
                .collect();

            for allocator in [
                allocator_for(AllocationPolicy::WorstFit, AllocationConfig::new(max).unwrap()),
                allocator_for(AllocationPolicy::FirstFit, AllocationConfig::new(max).unwrap()),
            ] {
                let buckets = allocator.allocate(&weights);
                assert_well_formed(&weights, &buckets, max);
                let positive = weights.iter().filter(|(_, w)| *w > 0).count();
                prop_assert!(buckets.len() <= positive);
            }
        }
    }

    #[test]
    fn test_full_bucket_at_usize_max_does_not_overflow() {
        let weights = map(&[("Huge", usize::MAX), ("Tiny", 1)]);
        for buckets in [
            worst_fit(usize::MAX).allocate(&weights),
            first_fit(usize::MAX).allocate(&weights),
        ] {
            assert_eq!(buckets.len(), 2);
            assert_eq!(names(&buckets[0]), vec!["Huge"]);
            assert_eq!(names(&buckets[1]), vec!["Tiny"]);
        }
    }

    #[test]
    fn test_allocator_for_policy() {
        let config = AllocationConfig::new(3).unwrap();
        assert_eq!(
            allocator_for(AllocationPolicy::WorstFit, config).policy(),
            AllocationPolicy::WorstFit
        );
        assert_eq!(
            allocator_for(AllocationPolicy::FirstFit, config).policy(),
            AllocationPolicy::FirstFit
        );
    }

    #[test]
    fn test_summary() {
        let config = AllocationConfig::new(6).unwrap();
        let weights = map(&[("A", 5), ("B", 4), ("C", 3), ("D", 2), ("E", 9)]);
        let buckets = WorstFitAllocator::new(config).allocate(&weights);
        let summary = AllocationSummary::from_buckets(&buckets, &config, AllocationPolicy::WorstFit);

        assert_eq!(summary.total_weight, 23);
        assert_eq!(summary.class_count, 5);
        assert_eq!(summary.oversized_count, 1);
        assert_eq!(summary.max_bucket_weight, 9);
        assert_eq!(summary.lower_bound(), 4);
        assert!(summary.bucket_count >= summary.lower_bound());
        assert_eq!(summary.fingerprint.len(), 64);
        summary.print_report();
    }

    #[test]
    fn test_summary_empty() {
        let config = AllocationConfig::new(6).unwrap();
        let summary = AllocationSummary::from_buckets(&[], &config, AllocationPolicy::FirstFit);
        assert_eq!(summary.bucket_count, 0);
        assert_eq!(summary.min_bucket_weight, 0);
        assert_eq!(summary.lower_bound(), 0);
        summary.print_report();
    }

    #[test]
    fn test_fingerprint_changes_with_assignment() {
        let a = worst_fit(6).allocate(&map(&[("A", 5), ("B", 4)]));
        let b = worst_fit(6).allocate(&map(&[("B", 4), ("A", 5), ("C", 1)]));
        assert_ne!(fingerprint(&a), fingerprint(&b));
    }
}
