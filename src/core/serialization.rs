//! Allocation artifact serialization
//!
//! The artifact is a JSON array with one object per bucket:
//!
//! ```json
//! [{"jobIndex": 0, "classes": ["com.acme.FooTest"], "totalMethods": 5}]
//! ```
//!
//! It is written to `<jsonOutputFile>.json` and is the only hand-off to the
//! CI layer, which launches one job per element.

use crate::core::error::{BucketError, Result, ResultExt};
use crate::core::models::Bucket;
use std::fs;
use std::path::{Path, PathBuf};

/// Trait for artifact serializers
pub trait Serializer: Send + Sync {
    /// Serialize the bucket list
    fn serialize(&self, buckets: &[Bucket]) -> Result<String>;

    /// Get the file extension for this format
    fn extension(&self) -> &'static str;
}

/// Pretty-printed JSON array serializer
#[derive(Debug, Default)]
pub struct JsonSerializer;

impl JsonSerializer {
    /// Create a new JsonSerializer
    pub fn new() -> Self {
        Self
    }
}

impl Serializer for JsonSerializer {
    fn serialize(&self, buckets: &[Bucket]) -> Result<String> {
        let mut json = serde_json::to_string_pretty(buckets)?;
        json.push('\n');
        Ok(json)
    }

    fn extension(&self) -> &'static str {
        "json"
    }
}

/// Final artifact path: the extension is always appended, so
/// `build/buckets` becomes `build/buckets.json`.
pub fn output_path(json_output_file: &Path, extension: &str) -> PathBuf {
    let mut path = json_output_file.as_os_str().to_owned();
    path.push(".");
    path.push(extension);
    PathBuf::from(path)
}

/// Write buckets to `<json_output_file>.json`, creating parent directories.
/// Returns the path written.
pub fn write_buckets(json_output_file: &Path, buckets: &[Bucket]) -> Result<PathBuf> {
    write_with(&JsonSerializer::new(), json_output_file, buckets)
}

/// Write buckets with an explicit serializer
pub fn write_with(
    serializer: &dyn Serializer,
    json_output_file: &Path,
    buckets: &[Bucket],
) -> Result<PathBuf> {
    if json_output_file.as_os_str().is_empty() {
        return Err(BucketError::invalid_config("jsonOutputFile is empty"));
    }
    let path = output_path(json_output_file, serializer.extension());

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .map_err(BucketError::from)
            .context(format!("creating {}", parent.display()))?;
    }

    let content = serializer.serialize(buckets)?;
    fs::write(&path, content)
        .map_err(BucketError::from)
        .context(format!("writing {}", path.display()))?;

    log::info!("wrote {} buckets to {}", buckets.len(), path.display());
    Ok(path)
}

/// Read a previously written artifact
pub fn read_buckets(path: &Path) -> Result<Vec<Bucket>> {
    if !path.exists() {
        return Err(BucketError::FileNotFound {
            path: path.to_path_buf(),
        });
    }
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}
