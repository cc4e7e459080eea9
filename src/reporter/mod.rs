//! Report generation module.
//!
//! This module summarizes a pipeline run in two formats:
//! - JSON: Machine-readable structured output
//! - Text: Human-readable CLI output
//!
//! # Example
//!
//! ```rust
//! use iacmap::reporter::Reporter;
//! use iacmap::types::{Dialect, ReportFormat, SourceDocument};
//! use iacmap::{Config, Pipeline};
//!
//! let config = Config::default();
//! let doc = SourceDocument::new("main.tf", Dialect::Terraform, "resource \"aws_vpc\" \"main\" {}\n");
//! let output = Pipeline::new(config.clone()).run(vec![doc]).unwrap();
//!
//! let json = Reporter::new(&config).generate(&output, ReportFormat::Json).unwrap();
//! assert!(json.contains("\"complexity\""));
//! ```

mod json;
mod text;

use crate::config::Config;
use crate::error::Result;
use crate::types::{PipelineOutput, ReportFormat};

pub use json::{JsonReport, JsonReporter};
pub use text::TextReporter;

/// Report generator that supports multiple output formats.
pub struct Reporter {
    config: Config,
}

impl Reporter {
    /// Create a new reporter with the given configuration.
    #[must_use]
    pub fn new(config: &Config) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Generate a report in the specified format.
    ///
    /// # Errors
    ///
    /// Returns an error if report generation fails.
    pub fn generate(&self, output: &PipelineOutput, format: ReportFormat) -> Result<String> {
        match format {
            ReportFormat::Json => JsonReporter::new(&self.config).generate(output),
            ReportFormat::Text => TextReporter::new(&self.config).generate(output),
        }
    }
}

/// Trait for report generators.
pub trait ReportGenerator {
    /// Generate a report from a pipeline run.
    ///
    /// # Errors
    ///
    /// Returns an error if generation fails.
    fn generate(&self, output: &PipelineOutput) -> Result<String>;
}
