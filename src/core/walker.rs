//! Test class discovery
//!
//! Walks a compiled test output directory and turns every top-level
//! `*.class` file into a fully-qualified class name.

use crate::core::error::{BucketError, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::PathBuf;

/// Normalize path separators for cross-platform compatibility.
/// - Converts Windows backslashes to forward slashes
/// - Strips Windows UNC prefix `\\?\` if present
pub fn normalize_path_separators(path: &str) -> String {
    let mut normalized = path.to_string();

    // Strip Windows UNC prefix (\\?\ or \\.\)
    if normalized.starts_with(r"\\?\") || normalized.starts_with(r"\\.\") {
        normalized = normalized[4..].to_string();
    }

    normalized.replace('\\', "/")
}

/// Convert a class file path relative to the output root into a
/// fully-qualified class name.
///
/// Returns `None` for files that are not test class candidates: non-class
/// files, nested or anonymous classes, `module-info` and `package-info`.
pub fn class_name_from_relative(relative: &str) -> Option<String> {
    let stem = relative.strip_suffix(".class")?;
    let simple = stem.rsplit('/').next().unwrap_or(stem);
    if simple.is_empty() || simple.contains('$') || simple == "module-info" || simple == "package-info" {
        return None;
    }
    Some(stem.replace('/', "."))
}

/// Discovers candidate test classes in a compiled output directory
#[derive(Debug, Clone)]
pub struct ClassDiscovery {
    root: PathBuf,
    patterns: Vec<String>,
}

impl ClassDiscovery {
    /// Create a discovery over the test output directory
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            patterns: Vec::new(),
        }
    }

    /// Restrict discovery to class files matching any of the glob patterns
    /// (relative to the output directory, e.g. `**/*Test.class`)
    pub fn with_patterns(mut self, patterns: Vec<String>) -> Self {
        self.patterns = patterns;
        self
    }

    /// Build a GlobSet from patterns
    fn build_globset(patterns: &[String]) -> Result<Option<GlobSet>> {
        if patterns.is_empty() {
            return Ok(None);
        }

        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            let glob = Glob::new(pattern).map_err(|e| {
                BucketError::invalid_config(format!("bad class pattern '{}': {}", pattern, e))
            })?;
            builder.add(glob);
        }
        let set = builder
            .build()
            .map_err(|e| BucketError::invalid_config(e.to_string()))?;
        Ok(Some(set))
    }

    /// Walk the output directory and return class names in a stable order
    pub fn discover(&self) -> Result<Vec<String>> {
        if !self.root.exists() {
            return Err(BucketError::DirectoryNotFound {
                path: self.root.clone(),
            });
        }
        if !self.root.is_dir() {
            return Err(BucketError::invalid_config(format!(
                "'{}' is not a directory",
                self.root.display()
            )));
        }

        let include_set = Self::build_globset(&self.patterns)?;
        let mut classes = Vec::new();

        for entry in walkdir::WalkDir::new(&self.root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
        {
            if entry.file_type().is_dir() {
                continue;
            }

            let path = entry.path();
            let relative_path = normalize_path_separators(
                &path
                    .strip_prefix(&self.root)
                    .unwrap_or(path)
                    .to_string_lossy(),
            );

            if let Some(ref include_set) = include_set {
                if !include_set.is_match(&relative_path) {
                    continue;
                }
            }

            if let Some(class_name) = class_name_from_relative(&relative_path) {
                classes.push(class_name);
            }
        }

        log::info!(
            "discovered {} test classes under {}",
            classes.len(),
            self.root.display()
        );
        Ok(classes)
    }
}
