//! Error types for IacMap.
//!
//! This module defines the error hierarchy using `thiserror`. Every variant
//! records the source location that raised it through the [`err!`] macro.
//!
//! # Error Categories
//!
//! - **Parse errors**: malformed IaC documents (recoverable, per file)
//! - **IO errors**: reading files and directories
//! - **Config errors**: invalid configuration files or values
//! - **Invariant violations**: internal bugs such as cluster forest cycles (fatal)
//!
//! Recoverable errors raised while parsing never abort a pipeline run; they
//! are converted into [`Diagnostic`](crate::types::Diagnostic) entries.
//!
//! # Example
//!
//! ```rust
//! use iacmap::error::{IacMapError, Result};
//!
//! fn read(path: &str) -> Result<String> {
//!     std::fs::read_to_string(path).map_err(|e| IacMapError::Io {
//!         path: path.into(),
//!         source: e,
//!         src_path: file!(),
//!         src_line: line!(),
//!     })
//! }
//! ```

use std::path::PathBuf;
use thiserror::Error;

/// Macro to create errors with automatic source location tracking.
///
/// Fields accept the same shorthand as struct literals.
///
/// Usage:
/// ```ignore
/// return Err(err!(InvariantViolation { message: "cycle".to_string() }));
/// return Err(err!(InvariantViolation { message }));
/// ```
#[macro_export]
macro_rules! err {
    ($variant:ident { $($field:ident $(: $value:expr)?),* $(,)? }) => {
        $crate::error::IacMapError::$variant {
            $($field $(: $value)?,)*
            src_path: file!(),
            src_line: line!(),
        }
    };
}

/// A specialized Result type for IacMap operations.
pub type Result<T> = std::result::Result<T, IacMapError>;

/// The main error type for IacMap.
#[derive(Error, Debug)]
pub enum IacMapError {
    // =========================================================================
    // I/O and File System Errors
    // =========================================================================
    /// I/O error with path context.
    #[error("I/O error at '{path}' ({src_path}:{src_line}): {source}")]
    Io {
        /// The path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
        /// Source file path
        src_path: &'static str,
        /// Source line number
        src_line: u32,
    },

    /// File not found.
    #[error("File not found: {path} ({src_path}:{src_line})")]
    FileNotFound {
        /// The missing file path
        path: PathBuf,
        /// Source file path
        src_path: &'static str,
        /// Source line number
        src_line: u32,
    },

    /// Directory not found.
    #[error("Directory not found: {path} ({src_path}:{src_line})")]
    DirectoryNotFound {
        /// The missing directory path
        path: PathBuf,
        /// Source file path
        src_path: &'static str,
        /// Source line number
        src_line: u32,
    },

    // =========================================================================
    // Document Parsing Errors
    // =========================================================================
    /// Malformed IaC document.
    #[error("Failed to parse {dialect} document '{file}' \n\t({src_path}:{src_line}): {message}")]
    Parse {
        /// The file being parsed
        file: PathBuf,
        /// Dialect name of the document
        dialect: String,
        /// Error message
        message: String,
        /// Byte offset of the problem (if available)
        offset: Option<usize>,
        /// Line number (if available)
        line: Option<usize>,
        /// Column number (if available)
        column: Option<usize>,
        /// Source file path
        src_path: &'static str,
        /// Source line number
        src_line: u32,
    },

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Configuration parsing error.
    #[error("Failed to parse configuration ({src_path}:{src_line}): {message}")]
    ConfigParse {
        /// Error message
        message: String,
        /// The underlying error (if any)
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        /// Source file path
        src_path: &'static str,
        /// Source line number
        src_line: u32,
    },

    /// Invalid configuration value.
    #[error("Invalid configuration value for '{key}' ({src_path}:{src_line}): {message}")]
    ConfigValue {
        /// The configuration key
        key: String,
        /// Error message
        message: String,
        /// Source file path
        src_path: &'static str,
        /// Source line number
        src_line: u32,
    },

    // =========================================================================
    // Pipeline Errors
    // =========================================================================
    /// An internal invariant of the graph or cluster forest does not hold.
    #[error("Invariant violation ({src_path}:{src_line}): {message}")]
    InvariantViolation {
        /// Description of the broken invariant
        message: String,
        /// Source file path
        src_path: &'static str,
        /// Source line number
        src_line: u32,
    },

    /// Report generation error.
    #[error("Failed to generate report ({src_path}:{src_line}): {message}")]
    ReportGeneration {
        /// Error message
        message: String,
        /// Source file path
        src_path: &'static str,
        /// Source line number
        src_line: u32,
    },

    // =========================================================================
    // Generic Errors
    // =========================================================================
    /// Internal error (should not happen in normal operation).
    #[error("Internal error ({src_path}:{src_line}): {message}")]
    Internal {
        /// Error message
        message: String,
        /// Source file path
        src_path: &'static str,
        /// Source line number
        src_line: u32,
    },

    /// Multiple errors occurred.
    #[error("Multiple errors occurred ({count} total)")]
    Multiple {
        /// Number of errors
        count: usize,
        /// The individual errors
        errors: Vec<IacMapError>,
    },
}

impl IacMapError {
    /// Creates an `Io` error.
    #[must_use]
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error, src_path: &'static str, src_line: u32) -> Self {
        Self::Io { path: path.into(), source, src_path, src_line }
    }

    /// Determines if the error only affects one input document.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Parse { .. } | Self::Io { .. } | Self::FileNotFound { .. }
        )
    }

    /// Returns the appropriate exit code for the error.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Io { source, .. } if source.kind() == std::io::ErrorKind::PermissionDenied => 13,
            Self::FileNotFound { .. } => 14,
            Self::DirectoryNotFound { .. } => 15,
            Self::ConfigParse { .. } => 18,
            Self::ConfigValue { .. } => 19,
            Self::Multiple { .. } => 21,
            Self::InvariantViolation { .. } => 70,
            _ => 1,
        }
    }

    /// Consolidates multiple errors into a single `IacMapError::Multiple` if there's more than one.
    /// Otherwise, returns the single error or `Ok(())` if no errors.
    pub fn collect(mut errors: Vec<Self>) -> Result<()> {
        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            count => Err(Self::Multiple { count, errors }),
        }
    }
}

impl From<std::io::Error> for IacMapError {
    fn from(source: std::io::Error) -> Self {
        // Prefer IacMapError::io(path, ..) wherever the path is known.
        Self::Io {
            path: PathBuf::new(),
            source,
            src_path: file!(),
            src_line: line!(),
        }
    }
}

impl From<serde_json::Error> for IacMapError {
    fn from(source: serde_json::Error) -> Self {
        Self::Internal {
            message: format!("JSON serialization/deserialization error: {source}"),
            src_path: file!(),
            src_line: line!(),
        }
    }
}

/// A utility for collecting multiple errors during processing.
#[derive(Debug, Default)]
pub struct ErrorCollector {
    errors: Vec<IacMapError>,
}

impl ErrorCollector {
    /// Create a new error collector.
    #[must_use]
    pub fn new() -> Self {
        Self { errors: Vec::new() }
    }

    /// Add an error to the collection.
    pub fn add(&mut self, error: IacMapError) {
        self.errors.push(error);
    }

    /// Get the number of collected errors.
    #[must_use]
    pub fn count(&self) -> usize {
        self.errors.len()
    }

    /// Check if there are any errors.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Convert to a Result, returning Multiple error if there are any errors.
    pub fn into_result(self) -> Result<()> {
        IacMapError::collect(self.errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_errors_are_recoverable() {
        let e = crate::err!(Parse {
            file: PathBuf::from("main.tf"),
            dialect: "terraform".to_string(),
            message: "unexpected token".to_string(),
            offset: Some(12),
            line: Some(2),
            column: Some(3),
        });
        assert!(e.is_recoverable());
        assert_eq!(e.exit_code(), 1);
        assert!(e.to_string().contains("main.tf"));
    }

    #[test]
    fn test_invariant_violation_is_fatal() {
        let e = crate::err!(InvariantViolation {
            message: "cluster forest contains a cycle".to_string(),
        });
        assert!(!e.is_recoverable());
        assert_eq!(e.exit_code(), 70);
    }

    #[test]
    fn test_err_macro_field_shorthand() {
        let message = "orphan cluster".to_string();
        let offset = Some(4);
        let e = crate::err!(InvariantViolation { message });
        assert!(e.to_string().contains("orphan cluster"));

        let message = "bad token".to_string();
        let e = crate::err!(Parse {
            file: PathBuf::from("main.tf"),
            dialect: "terraform".to_string(),
            message,
            offset,
            line: None,
            column: None,
        });
        match e {
            IacMapError::Parse { offset, src_line, .. } => {
                assert_eq!(offset, Some(4));
                assert!(src_line > 0);
            }
            other => panic!("expected Parse, got {other:?}"),
        }
    }

    #[test]
    fn test_collector() {
        let mut collector = ErrorCollector::new();
        assert!(collector.is_empty());
        collector.add(crate::err!(Internal { message: "a".to_string() }));
        assert_eq!(collector.count(), 1);
        assert!(matches!(collector.into_result(), Err(IacMapError::Internal { .. })));

        let mut collector = ErrorCollector::new();
        collector.add(crate::err!(Internal { message: "a".to_string() }));
        collector.add(crate::err!(Internal { message: "b".to_string() }));
        match collector.into_result() {
            Err(IacMapError::Multiple { count, .. }) => assert_eq!(count, 2),
            other => panic!("expected Multiple, got {other:?}"),
        }
    }
}
