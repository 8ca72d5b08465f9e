//! Error types for the bucket allocator
//!
//! This module provides structured error handling using thiserror.
//! Per-class failures (a class that cannot be resolved, a suite that
//! cannot be parsed) never surface here as fatal errors: collectors
//! record them and carry on. What remains are configuration and IO
//! failures that abort the run.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for allocator operations
pub type Result<T> = std::result::Result<T, BucketError>;

/// Errors that can occur while computing or publishing an allocation
#[derive(Error, Debug)]
pub enum BucketError {
    /// IO error during file operations
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Directory not found
    #[error("Directory not found: {path}")]
    DirectoryNotFound { path: PathBuf },

    /// File not found
    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    /// Invalid configuration
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// JSON parsing or encoding error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TestNG suite file could not be parsed
    #[error("Suite parse error at line {line}: {message}")]
    SuiteParse { line: usize, message: String },

    /// A class could not be resolved
    #[error("Cannot resolve class {class_name}: {message}")]
    Resolve { class_name: String, message: String },

    /// Generic error with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<BucketError>,
    },
}

impl BucketError {
    /// Wrap an error with additional context
    pub fn with_context(self, context: impl Into<String>) -> Self {
        BucketError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Create an invalid config error
    pub fn invalid_config(message: impl Into<String>) -> Self {
        BucketError::InvalidConfig {
            message: message.into(),
        }
    }

    /// Create a suite parse error
    pub fn suite_parse(line: usize, message: impl Into<String>) -> Self {
        BucketError::SuiteParse {
            line,
            message: message.into(),
        }
    }

    /// True for errors that must abort the run before allocation
    pub fn is_config_error(&self) -> bool {
        match self {
            BucketError::InvalidConfig { .. }
            | BucketError::DirectoryNotFound { .. }
            | BucketError::FileNotFound { .. } => true,
            BucketError::WithContext { source, .. } => source.is_config_error(),
            _ => false,
        }
    }
}

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, ctx: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, ctx: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(ctx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = BucketError::DirectoryNotFound {
            path: PathBuf::from("/tmp/missing"),
        };
        assert!(err.to_string().contains("/tmp/missing"));
    }

    #[test]
    fn test_error_with_context() {
        let err = BucketError::invalid_config("bad value");
        let wrapped = err.with_context("loading config");
        assert!(wrapped.to_string().contains("loading config"));
        assert!(wrapped.is_config_error());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: BucketError = io_err.into();
        assert!(matches!(err, BucketError::Io(_)));
        assert!(!err.is_config_error());
    }

    #[test]
    fn test_suite_parse_helper() {
        let err = BucketError::suite_parse(12, "unclosed <test>");
        assert!(err.to_string().contains("line 12"));
        assert!(err.to_string().contains("unclosed <test>"));
    }

    #[test]
    fn test_resolve_error_display() {
        let err = BucketError::Resolve {
            class_name: "com.acme.FooTest".to_string(),
            message: "no source".to_string(),
        };
        assert!(err.to_string().contains("com.acme.FooTest"));
    }

    #[test]
    fn test_result_ext_context() {
        let result: Result<()> = Err(BucketError::invalid_config("test"));
        let err = result.context("during allocation").unwrap_err();
        assert!(err.to_string().contains("during allocation"));
    }

    #[test]
    fn test_json_error_conversion() {
        let json_err: serde_json::Error = serde_json::from_str::<i32>("not json").unwrap_err();
        let err: BucketError = json_err.into();
        assert!(matches!(err, BucketError::Json(_)));
    }
}
