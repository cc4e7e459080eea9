//! Command-line interface module.
//!
//! This module defines the CLI structure using Clap, including
//! all commands, arguments, and options.
//!
//! # Commands
//!
//! - `graph`: Render the resource graph as DOT, JSON or Mermaid
//! - `report`: Summarize complexity, layout and diagnostics
//! - `init`: Create an example configuration file
//! - `validate`: Validate a configuration file
//!
//! # Example Usage
//!
//! ```bash
//! # Graphviz diagram of a Terraform directory
//! iacmap graph ./infra --output infra.dot
//!
//! # Mermaid flowchart grouped by network containment, top to bottom
//! iacmap graph ./infra --format mermaid --cluster-view network --direction vertical
//!
//! # JSON report, failing when any diagnostic was raised
//! iacmap report ./infra template.yaml --format json --strict
//!
//! # Initialize configuration
//! iacmap init
//!
//! # Validate configuration
//! iacmap validate iacmap.yaml
//! ```

use crate::analyzer::ClusterKind;
use crate::layout::Direction;
use crate::types::{GraphFormat, ReportFormat};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// IacMap - resource graphs and adaptive diagram layouts from IaC sources.
#[derive(Parser, Debug)]
#[command(
    name = "iacmap",
    author,
    version,
    about = "Resource graphs and adaptive diagram layouts from infrastructure-as-code",
    long_about = "IacMap reads Terraform, CloudFormation, Bicep and Pulumi YAML sources, \
                  builds one resource dependency graph, infers provider, category and \
                  network clusters, and derives layout parameters from the graph's complexity."
)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true, env = "IACMAP_CONFIG")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Render the resource graph
    #[command(visible_alias = "g")]
    Graph(GraphArgs),

    /// Summarize complexity, layout and diagnostics
    #[command(visible_alias = "r")]
    Report(ReportArgs),

    /// Create an example configuration file
    Init,

    /// Validate a configuration file
    Validate(ValidateArgs),
}

/// Input selection shared by `graph` and `report`.
#[derive(Args, Debug)]
pub struct InputArgs {
    /// Files or directories holding IaC documents
    #[arg(value_name = "PATH", required = true)]
    pub paths: Vec<PathBuf>,

    /// Patterns to exclude from discovery (glob patterns)
    #[arg(short, long = "exclude", value_name = "PATTERN")]
    pub exclude_patterns: Vec<String>,

    /// Maximum number of documents fed to the pipeline
    #[arg(long, value_name = "N")]
    pub max_files: Option<usize>,

    /// Documents are truncated to this many bytes
    #[arg(long, value_name = "BYTES")]
    pub max_bytes_per_file: Option<usize>,

    /// Never chain resources when no dependency was found
    #[arg(long)]
    pub no_implicit_ordering: bool,
}

/// Arguments for the graph command.
#[derive(Args, Debug)]
pub struct GraphArgs {
    #[command(flatten)]
    pub input: InputArgs,

    /// Output format for the graph
    #[arg(short, long, default_value = "dot", value_enum)]
    pub format: GraphFormat,

    /// Diagram orientation (overrides the configuration)
    #[arg(short, long, value_enum, ignore_case = true)]
    pub direction: Option<Direction>,

    /// Cluster kind drawn as subgraphs (overrides the configuration)
    #[arg(long, value_enum)]
    pub cluster_view: Option<ClusterKind>,

    /// Output file path (stdout if not specified)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

/// Arguments for the report command.
#[derive(Args, Debug)]
pub struct ReportArgs {
    #[command(flatten)]
    pub input: InputArgs,

    /// Output format
    #[arg(short, long, default_value = "text", value_enum)]
    pub format: ReportFormat,

    /// Output file path (stdout if not specified)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Exit with code 1 when any diagnostic was raised
    #[arg(long)]
    pub strict: bool,
}

/// Arguments for the validate command.
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(value_name = "FILE", default_value = "iacmap.yaml")]
    pub config: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_parsing() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_graph_command() {
        let cli = Cli::parse_from(["iacmap", "graph", "./infra", "--format", "mermaid"]);
        match cli.command {
            Commands::Graph(args) => {
                assert_eq!(args.format, GraphFormat::Mermaid);
                assert_eq!(args.input.paths, vec![PathBuf::from("./infra")]);
                assert_eq!(args.direction, None);
                assert_eq!(args.cluster_view, None);
            }
            _ => panic!("Expected Graph command"),
        }
    }

    #[test]
    fn test_graph_layout_options() {
        let cli = Cli::parse_from([
            "iacmap",
            "graph",
            "main.tf",
            "template.yaml",
            "--direction",
            "LR",
            "--cluster-view",
            "network",
            "-e",
            "**/legacy/**",
            "--max-files",
            "10",
        ]);
        match cli.command {
            Commands::Graph(args) => {
                assert_eq!(args.input.paths.len(), 2);
                assert_eq!(args.direction, Some(Direction::Horizontal));
                assert_eq!(args.cluster_view, Some(ClusterKind::NetworkContainer));
                assert_eq!(args.input.exclude_patterns, vec!["**/legacy/**".to_string()]);
                assert_eq!(args.input.max_files, Some(10));
            }
            _ => panic!("Expected Graph command"),
        }
    }

    #[test]
    fn test_report_with_options() {
        let cli = Cli::parse_from([
            "iacmap",
            "report",
            "./infra",
            "--format",
            "json",
            "--output",
            "report.json",
            "--strict",
            "--no-implicit-ordering",
        ]);
        match cli.command {
            Commands::Report(args) => {
                assert_eq!(args.format, ReportFormat::Json);
                assert_eq!(args.output, Some(PathBuf::from("report.json")));
                assert!(args.strict);
                assert!(args.input.no_implicit_ordering);
            }
            _ => panic!("Expected Report command"),
        }
    }

    #[test]
    fn test_paths_required() {
        assert!(Cli::try_parse_from(["iacmap", "graph"]).is_err());
    }

    #[test]
    fn test_init_command() {
        let cli = Cli::parse_from(["iacmap", "init"]);
        assert!(matches!(cli.command, Commands::Init));
    }

    #[test]
    fn test_validate_command() {
        let cli = Cli::parse_from(["iacmap", "validate", "custom.yaml"]);
        match cli.command {
            Commands::Validate(args) => {
                assert_eq!(args.config, PathBuf::from("custom.yaml"));
            }
            _ => panic!("Expected Validate command"),
        }
    }

    #[test]
    fn test_global_options() {
        let cli = Cli::parse_from(["iacmap", "-vvv", "--config", "custom.yaml", "report", "./infra"]);
        assert_eq!(cli.verbose, 3);
        assert_eq!(cli.config, Some(PathBuf::from("custom.yaml")));
    }

    #[test]
    fn test_alias() {
        let cli = Cli::parse_from(["iacmap", "g", "./infra"]);
        assert!(matches!(cli.command, Commands::Graph(_)));
    }
}
