//! Allocator configuration
//!
//! Configuration comes from a JSON file (by default `.bucket-allocator.json`
//! in the project root) whose camelCase keys mirror the build parameters:
//!
//! ```json
//! {
//!   "testOutputDirectory": "target/test-classes",
//!   "testSourceDirectories": ["src/test/java"],
//!   "maxMethodsPerBucket": 200,
//!   "framework": "junit",
//!   "includeTags": ["fast"],
//!   "parallelMethods": true,
//!   "jsonOutputFile": "target/test-buckets"
//! }
//! ```
//!
//! Command-line flags override file values. Relative paths are resolved
//! against `projectRoot`.

use crate::core::error::{BucketError, Result};
use crate::core::models::{AllocationConfig, AllocationPolicy, Framework};
use crate::core::weights::{default_test_annotations, TagFilter};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Name of the configuration file looked up in the project root
pub const DEFAULT_CONFIG_FILE: &str = ".bucket-allocator.json";

/// Full configuration of one allocation run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct AllocatorConfig {
    /// Compiled test classes directory
    pub test_output_directory: PathBuf,
    /// Upper bound on a bucket's total weight; 0 means unset
    pub max_methods_per_bucket: usize,
    /// Weight collection strategy
    pub framework: Framework,
    /// JUnit tags a method must carry one of (empty = any)
    pub include_tags: Vec<String>,
    /// JUnit tags that exclude a method
    pub exclude_tags: Vec<String>,
    /// TestNG suite XML files, relative to `project_root`
    pub suites: Vec<PathBuf>,
    /// Base directory for every relative path
    pub project_root: PathBuf,
    /// Count individual methods instead of whole classes
    pub parallel_methods: bool,
    /// Artifact path; `.json` is appended
    pub json_output_file: PathBuf,
    /// Java test source roots indexed for class resolution
    pub test_source_directories: Vec<PathBuf>,
    /// Optional JSON class inventory, consulted before the sources
    pub class_inventory: Option<PathBuf>,
    /// Glob patterns restricting class discovery (empty = all)
    pub class_patterns: Vec<String>,
    /// Annotation simple names that mark a test method
    pub test_annotations: Vec<String>,
    /// Bucket selection policy
    pub policy: AllocationPolicy,
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        Self {
            test_output_directory: PathBuf::from("target/test-classes"),
            max_methods_per_bucket: 0,
            framework: Framework::JUnit,
            include_tags: vec![],
            exclude_tags: vec![],
            suites: vec![],
            project_root: PathBuf::from("."),
            parallel_methods: false,
            json_output_file: PathBuf::from("target/test-buckets"),
            test_source_directories: vec![PathBuf::from("src/test/java")],
            class_inventory: None,
            class_patterns: vec![],
            test_annotations: default_test_annotations(),
            policy: AllocationPolicy::WorstFit,
        }
    }
}

impl AllocatorConfig {
    /// Create a config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Default config file location for a project
    pub fn default_path(project_root: &Path) -> PathBuf {
        project_root.join(DEFAULT_CONFIG_FILE)
    }

    /// Load a config file
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(BucketError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
            .map_err(|e| e.with_context(format!("loading {}", path.display())))
    }

    /// Parse config JSON
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| BucketError::invalid_config(e.to_string()))
    }

    /// Builder pattern: set the per-bucket bound
    pub fn with_max_methods(mut self, max: usize) -> Self {
        self.max_methods_per_bucket = max;
        self
    }

    /// Builder pattern: set the framework
    pub fn with_framework(mut self, framework: Framework) -> Self {
        self.framework = framework;
        self
    }

    /// Builder pattern: set the project root
    pub fn with_project_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.project_root = root.into();
        self
    }

    /// Resolve a possibly relative path against the project root
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.project_root.join(path)
        }
    }

    /// Compiled test output directory, resolved
    pub fn output_directory(&self) -> PathBuf {
        self.resolve(&self.test_output_directory)
    }

    /// Artifact base path, resolved (without the `.json` suffix)
    pub fn output_file(&self) -> PathBuf {
        self.resolve(&self.json_output_file)
    }

    /// Suite files, resolved
    pub fn suite_paths(&self) -> Vec<PathBuf> {
        self.suites.iter().map(|s| self.resolve(s)).collect()
    }

    /// Source roots, resolved
    pub fn source_directories(&self) -> Vec<PathBuf> {
        self.test_source_directories
            .iter()
            .map(|d| self.resolve(d))
            .collect()
    }

    /// Class inventory, resolved
    pub fn inventory_path(&self) -> Option<PathBuf> {
        self.class_inventory.as_deref().map(|p| self.resolve(p))
    }

    /// JUnit tag filter
    pub fn tag_filter(&self) -> TagFilter {
        TagFilter::new(&self.include_tags, &self.exclude_tags)
    }

    /// Allocator bound; fails when unset
    pub fn allocation_config(&self) -> Result<AllocationConfig> {
        AllocationConfig::new(self.max_methods_per_bucket)
    }

    /// Check every condition that must abort the run before allocation
    pub fn validate(&self) -> Result<()> {
        self.validate_inputs()?;
        self.validate_class_sources()
    }

    /// Bound, artifact path and the framework's own inputs
    pub fn validate_inputs(&self) -> Result<()> {
        self.allocation_config()?;

        if self.json_output_file.as_os_str().is_empty() {
            return Err(BucketError::invalid_config("jsonOutputFile is required"));
        }

        match self.framework {
            Framework::JUnit => {
                let output = self.output_directory();
                if !output.is_dir() {
                    return Err(BucketError::DirectoryNotFound { path: output });
                }
            }
            Framework::TestNg => {
                if self.suites.is_empty() {
                    return Err(BucketError::invalid_config(
                        "suites must name at least one suite file for testng",
                    ));
                }
                for path in self.suite_paths() {
                    if !path.is_file() {
                        return Err(BucketError::FileNotFound { path });
                    }
                }
            }
        }

        Ok(())
    }

    /// Source directories and inventory the default resolver reads
    pub fn validate_class_sources(&self) -> Result<()> {
        if self.test_source_directories.is_empty() && self.class_inventory.is_none() {
            return Err(BucketError::invalid_config(
                "either testSourceDirectories or classInventory is required",
            ));
        }
        for dir in self.source_directories() {
            if !dir.is_dir() {
                return Err(BucketError::DirectoryNotFound { path: dir });
            }
        }
        if let Some(path) = self.inventory_path() {
            if !path.is_file() {
                return Err(BucketError::FileNotFound { path });
            }
        }

        Ok(())
    }
}
