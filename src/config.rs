//! Configuration module for IacMap.
//!
//! This module handles loading and validating configuration from:
//! - YAML configuration files (`iacmap.yaml`)
//! - Environment variables (`${VAR}` expansion inside the file)
//! - CLI arguments
//!
//! # Configuration File Format
//!
//! ```yaml
//! # iacmap.yaml
//!
//! limits:
//!   max_files: 25
//!   max_bytes_per_file: 30000
//!
//! scan:
//!   exclude_patterns:
//!     - "**/.terraform/**"
//!
//! graph:
//!   implicit_ordering: true
//!   skip_type_prefixes: ["null_"]
//!
//! layout:
//!   direction: auto
//!   min_pad: 0.3
//!   min_node_separation: 0.25
//!   min_rank_separation: 0.65
//!   complexity_scale_factor: 1.5
//!   edge_density_scale_factor: 1.2
//!   edge_density_threshold: 2.5
//!   direction_spacing_factor: 1.2
//!   icon_overrides:
//!     aws_lambda_function: aws.compute.lambda
//!
//! output:
//!   colored: true
//!   verbose: false
//!   pretty: true
//!   cluster_view: category
//! ```

use crate::analyzer::ClusterKind;
use crate::error::{ErrorCollector, IacMapError, Result};
use crate::layout::Direction;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::LazyLock;

static BRACED_ENV_VAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^}]+)\}").expect("Invalid regex"));

static BARE_ENV_VAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$([A-Za-z_][A-Za-z0-9_]*)").expect("Invalid regex"));

/// Input limits enforced by the caller before documents reach the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsOptions {
    /// Maximum number of documents per run.
    pub max_files: usize,

    /// Buffers longer than this are truncated.
    pub max_bytes_per_file: usize,
}

impl Default for LimitsOptions {
    fn default() -> Self {
        Self {
            max_files: 25,
            max_bytes_per_file: 30_000,
        }
    }
}

/// Scanning options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanOptions {
    /// Patterns to exclude from scanning (glob patterns).
    pub exclude_patterns: Vec<String>,

    /// Maximum depth for recursive directory scanning.
    pub max_depth: usize,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            exclude_patterns: vec![
                "**/.terraform/**".to_string(),
                "**/node_modules/**".to_string(),
                "**/.git/**".to_string(),
            ],
            max_depth: 100,
        }
    }
}

/// Graph construction options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphOptions {
    /// Chain resources of each file when no references were found at all.
    pub implicit_ordering: bool,

    /// Resource types starting with one of these prefixes are not extracted.
    pub skip_type_prefixes: Vec<String>,
}

impl Default for GraphOptions {
    fn default() -> Self {
        Self {
            implicit_ordering: true,
            skip_type_prefixes: vec!["null_".to_string()],
        }
    }
}

/// Layout derivation options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutOptions {
    /// Requested orientation; `auto` lets the deriver choose.
    pub direction: Direction,
    pub min_pad: f64,
    pub min_node_separation: f64,
    pub min_rank_separation: f64,
    pub complexity_scale_factor: f64,
    pub edge_density_scale_factor: f64,
    /// Average edges per node above which the density booster applies.
    pub edge_density_threshold: f64,
    /// Widening applied to node separation (horizontal) or rank separation (vertical).
    pub direction_spacing_factor: f64,
    /// Resource type to icon key.
    pub icon_overrides: BTreeMap<String, String>,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self {
            direction: Direction::Auto,
            min_pad: 0.3,
            min_node_separation: 0.25,
            min_rank_separation: 0.65,
            complexity_scale_factor: 1.5,
            edge_density_scale_factor: 1.2,
            edge_density_threshold: 2.5,
            direction_spacing_factor: 1.2,
            icon_overrides: BTreeMap::new(),
        }
    }
}

/// Output options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputOptions {
    /// Use colored output.
    pub colored: bool,

    /// Verbose output mode.
    pub verbose: bool,

    /// Pretty-print JSON output.
    pub pretty: bool,

    /// Cluster kind drawn by the DOT and Mermaid exporters.
    pub cluster_view: ClusterKind,
}

impl Default for OutputOptions {
    fn default() -> Self {
        Self {
            colored: true,
            verbose: false,
            pretty: true,
            cluster_view: ClusterKind::Category,
        }
    }
}

/// Main configuration structure with nested sections.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Input limits
    pub limits: LimitsOptions,

    /// Scanning options
    pub scan: ScanOptions,

    /// Graph construction options
    pub graph: GraphOptions,

    /// Layout derivation options
    pub layout: LayoutOptions,

    /// Output options
    pub output: OutputOptions,
}

impl Config {
    /// Load configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid or a value is out of range.
    pub fn from_yaml(content: &str) -> Result<Self> {
        tracing::debug!("Parsing configuration from YAML");
        let expanded = expand_env_vars(content);

        // An all-comment document deserializes as null.
        let config: Self = if expanded.lines().all(|l| l.trim().is_empty() || l.trim_start().starts_with('#')) {
            Self::default()
        } else {
            serde_yaml::from_str(&expanded).map_err(|e| crate::err!(ConfigParse {
                message: e.to_string(),
                source: Some(Box::new(e)),
            }))?
        };
        config.validate()?;

        tracing::debug!(
            max_files = config.limits.max_files,
            max_bytes_per_file = config.limits.max_bytes_per_file,
            direction = %config.layout.direction,
            "Configuration loaded successfully"
        );

        Ok(config)
    }

    /// Check value ranges.
    ///
    /// # Errors
    ///
    /// Returns `ConfigValue` for a single offending key, `Multiple` when
    /// several keys are out of range.
    pub fn validate(&self) -> Result<()> {
        let mut errors = ErrorCollector::new();

        let positive = [
            ("layout.min_pad", self.layout.min_pad),
            ("layout.min_node_separation", self.layout.min_node_separation),
            ("layout.min_rank_separation", self.layout.min_rank_separation),
        ];
        for (key, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                errors.add(invalid(key, format!("must be a positive number, got {value}")));
            }
        }

        let at_least_one = [
            ("layout.edge_density_scale_factor", self.layout.edge_density_scale_factor),
            ("layout.direction_spacing_factor", self.layout.direction_spacing_factor),
        ];
        for (key, value) in at_least_one {
            if !value.is_finite() || value < 1.0 {
                errors.add(invalid(key, format!("must be >= 1.0, got {value}")));
            }
        }

        let non_negative = [
            ("layout.complexity_scale_factor", self.layout.complexity_scale_factor),
            ("layout.edge_density_threshold", self.layout.edge_density_threshold),
        ];
        for (key, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                errors.add(invalid(key, format!("must be >= 0.0, got {value}")));
            }
        }

        if self.limits.max_files == 0 {
            errors.add(invalid("limits.max_files", "must be at least 1".to_string()));
        }
        if self.limits.max_bytes_per_file == 0 {
            errors.add(invalid("limits.max_bytes_per_file", "must be at least 1".to_string()));
        }
        errors.into_result()
    }

    /// Generate an example YAML configuration.
    #[must_use]
    pub fn example_yaml() -> String {
        r#"# IacMap Configuration File

# Input limits (applied before parsing)
limits:
  # Maximum number of IaC documents per run (sorted by path, extra files are dropped)
  max_files: 25

  # Larger documents are truncated to this many bytes
  max_bytes_per_file: 30000

# Scanning options
scan:
  # Patterns to exclude from scanning (glob patterns)
  exclude_patterns:
    - "**/.terraform/**"
    - "**/node_modules/**"
    - "**/.git/**"

  # Maximum depth for recursive directory scanning
  max_depth: 100

# Graph construction
graph:
  # Chain resources of each file when no references were found at all
  implicit_ordering: true

  # Resource types to ignore
  skip_type_prefixes:
    - "null_"

# Layout derivation
layout:
  # auto | horizontal | vertical (lr / tb are accepted too)
  direction: auto

  # Spacing minimums (inches, graphviz units)
  min_pad: 0.3
  min_node_separation: 0.25
  min_rank_separation: 0.65

  # Growth of spacing with the complexity score
  complexity_scale_factor: 1.5

  # Extra spacing for dense graphs
  edge_density_scale_factor: 1.2
  edge_density_threshold: 2.5

  # Widening along the main axis of the chosen direction
  direction_spacing_factor: 1.2

  # Icon keys per resource type
  # icon_overrides:
  #   aws_lambda_function: aws.compute.lambda

# Output options
output:
  # Use colored output in terminal
  colored: true

  # Enable verbose output
  verbose: false

  # Pretty-print JSON output
  pretty: true

  # provider | category | network | environment
  cluster_view: category
"#
        .to_string()
    }

    /// Merge CLI arguments into the configuration.
    pub fn merge_cli_args(&mut self, args: &crate::cli::InputArgs) {
        if !args.exclude_patterns.is_empty() {
            self.scan
                .exclude_patterns
                .extend(args.exclude_patterns.iter().cloned());
        }
        if let Some(max_files) = args.max_files {
            self.limits.max_files = max_files;
        }
        if let Some(max_bytes) = args.max_bytes_per_file {
            self.limits.max_bytes_per_file = max_bytes;
        }
        if args.no_implicit_ordering {
            self.graph.implicit_ordering = false;
        }
    }
}

fn invalid(key: &str, message: String) -> IacMapError {
    crate::err!(ConfigValue {
        key: key.to_string(),
        message,
    })
}

/// Expand environment variables in a string.
///
/// Supports `${VAR}` and `$VAR` syntax; unknown variables are left untouched.
fn expand_env_vars(content: &str) -> String {
    let braced = BRACED_ENV_VAR.replace_all(content, |caps: &regex::Captures<'_>| {
        std::env::var(&caps[1]).unwrap_or_else(|_| caps[0].to_string())
    });
    BARE_ENV_VAR
        .replace_all(&braced, |caps: &regex::Captures<'_>| {
            std::env::var(&caps[1]).unwrap_or_else(|_| caps[0].to_string())
        })
        .into_owned()
}
