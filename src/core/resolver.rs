//! Class resolution
//!
//! A [`ClassResolver`] turns a fully-qualified class name into a
//! [`TestClass`]: the methods it declares, their annotations and tags.
//! This is the seam where a JVM class loader would sit; the crate ships
//! two implementations that do not need a JVM:
//!
//! - [`InventoryResolver`]: a JSON inventory dumped by any JVM-side step
//! - [`SourceIndex`](crate::core::java_source::SourceIndex): static
//!   analysis of the Java test sources

use crate::core::error::{BucketError, Result};
use crate::core::models::TestClass;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

#[cfg(test)]
use mockall::automock;

/// Why a class could not be resolved. Collectors treat every variant as
/// weight 0 and keep going.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// The resolver has never seen the class
    #[error("class not found: {0}")]
    NotFound(String),

    /// The class is known but its definition could not be read
    #[error("class {class_name} is unreadable: {reason}")]
    Unreadable { class_name: String, reason: String },
}

/// Trait for class resolution
///
/// This trait allows for mocking in tests and alternative implementations
/// (e.g., bytecode readers, a test framework's own discovery API).
#[cfg_attr(test, automock)]
pub trait ClassResolver: Send + Sync {
    /// Resolve a fully-qualified class name
    fn resolve(&self, class_name: &str) -> std::result::Result<TestClass, ResolveError>;
}

/// Resolver backed by a JSON class inventory
///
/// The inventory is an array of classes:
///
/// ```json
/// [{"name": "com.acme.FooTest", "abstract": false,
///   "methods": [{"name": "works", "annotations": ["Test"], "tags": ["fast"]}]}]
/// ```
#[derive(Debug, Clone, Default)]
pub struct InventoryResolver {
    classes: HashMap<String, TestClass>,
}

impl InventoryResolver {
    /// Build a resolver from already-resolved classes
    pub fn new(classes: Vec<TestClass>) -> Self {
        Self {
            classes: classes.into_iter().map(|c| (c.name.clone(), c)).collect(),
        }
    }

    /// Parse an inventory from JSON text
    pub fn from_json(json: &str) -> Result<Self> {
        let classes: Vec<TestClass> = serde_json::from_str(json)?;
        Ok(Self::new(classes))
    }

    /// Load an inventory file
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(BucketError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        let content = fs::read_to_string(path)?;
        let resolver = Self::from_json(&content)?;
        log::info!(
            "loaded {} classes from inventory {}",
            resolver.len(),
            path.display()
        );
        Ok(resolver)
    }

    /// Number of known classes
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    /// True if the inventory is empty
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

impl ClassResolver for InventoryResolver {
    fn resolve(&self, class_name: &str) -> std::result::Result<TestClass, ResolveError> {
        self.classes
            .get(class_name)
            .cloned()
            .ok_or_else(|| ResolveError::NotFound(class_name.to_string()))
    }
}

/// Tries each resolver in turn and returns the first hit
pub struct ChainResolver {
    resolvers: Vec<Box<dyn ClassResolver>>,
}

impl ChainResolver {
    /// Create a chain from resolvers in priority order
    pub fn new(resolvers: Vec<Box<dyn ClassResolver>>) -> Self {
        Self { resolvers }
    }
}

impl ClassResolver for ChainResolver {
    fn resolve(&self, class_name: &str) -> std::result::Result<TestClass, ResolveError> {
        let mut last = ResolveError::NotFound(class_name.to_string());
        for resolver in &self.resolvers {
            match resolver.resolve(class_name) {
                Ok(class) => return Ok(class),
                // An unreadable definition is more informative than not-found
                Err(err @ ResolveError::Unreadable { .. }) => last = err,
                Err(ResolveError::NotFound(_)) => {}
            }
        }
        Err(last)
    }
}
