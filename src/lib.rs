//! # IacMap
//!
//! An infrastructure-as-code resource graph extractor and adaptive diagram
//! layout engine.
//!
//! IacMap reads Terraform, CloudFormation, Bicep and Pulumi YAML documents,
//! merges every declared resource into one dependency graph, groups the
//! resources into provider, category and network clusters, and derives
//! layout parameters (orientation, spacing, edge styles) from how complex
//! the resulting diagram is.
//!
//! ## Features
//!
//! - **Four dialects**: Terraform HCL, CloudFormation YAML/JSON, Bicep and
//!   Pulumi YAML, each parsed fail-soft
//! - **Reference resolution**: attribute references and explicit
//!   dependencies become typed edges
//! - **Cluster inference**: provider, category and two-level network
//!   containment clusters
//! - **Adaptive layout**: complexity scoring drives direction and spacing
//! - **Multiple output formats**: DOT, Mermaid and JSON graphs, plus text
//!   and JSON reports
//!
//! ## Example
//!
//! ```rust,no_run
//! use iacmap::{Config, Pipeline, ReportFormat};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::default();
//!     let pipeline = Pipeline::new(config.clone());
//!
//!     // Load and process a directory of IaC documents
//!     let output = pipeline.run_paths(&["./infra"]).await?;
//!
//!     // Generate a report
//!     let report = output.generate_report(ReportFormat::Json, &config)?;
//!     println!("{}", report);
//!
//!     Ok(())
//! }
//! ```

#![warn(clippy::all, clippy::pedantic, clippy::nursery, rust_2018_idioms)]

pub mod analyzer;
pub mod cli;
pub mod config;
pub mod error;
pub mod graph;
pub mod layout;
pub mod parser;
pub mod reporter;
pub mod taxonomy;
pub mod types;

// Re-export commonly used types at crate root
pub use config::Config;
pub use error::{IacMapError, Result};
pub use types::{
    Diagnostic, Dialect, GraphFormat, LayoutReadyGraph, PipelineOutput, ReportFormat, ResourceNode,
    SourceDocument,
};

use analyzer::ClusterInferencer;
use graph::GraphBuilder;
use layout::LayoutDeriver;
use rayon::prelude::*;
use std::path::Path;

/// Pipeline orchestrator that runs every stage over a set of documents.
///
/// The `Pipeline` is the primary entry point for using IacMap as a library.
/// It handles:
/// - Parsing documents in parallel
/// - Expanding local Terraform modules
/// - Building the resource graph in a fixed file order
/// - Clustering, complexity analysis and layout derivation
///
/// # Example
///
/// ```rust
/// use iacmap::{Config, Dialect, Pipeline, SourceDocument};
///
/// let docs = vec![SourceDocument::new(
///     "main.tf",
///     Dialect::Terraform,
///     "resource \"aws_vpc\" \"main\" {}\nresource \"aws_subnet\" \"a\" { vpc_id = aws_vpc.main.id }\n",
/// )];
/// let output = Pipeline::new(Config::default()).run(docs).unwrap();
///
/// assert_eq!(output.graph.nodes.len(), 2);
/// assert_eq!(output.graph.edges.len(), 1);
/// ```
pub struct Pipeline {
    config: Config,
}

impl Pipeline {
    /// Create a new pipeline with the given configuration.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// The configuration this pipeline runs with.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Turn in-memory documents into a layout-ready graph.
    ///
    /// Malformed documents never abort the run; they show up as
    /// diagnostics next to whatever could be extracted.
    ///
    /// # Errors
    ///
    /// Returns `InvariantViolation` if the graph or cluster forest is
    /// internally inconsistent.
    pub fn run(&self, mut documents: Vec<SourceDocument>) -> Result<PipelineOutput> {
        documents.sort_by(|a, b| a.path.cmp(&b.path));
        tracing::info!(documents = documents.len(), "Running pipeline");

        let mut parsed: Vec<_> = documents
            .par_iter()
            .map(|doc| parser::parse_document(doc, &self.config))
            .collect();
        parsed.sort_by(|a, b| a.file.cmp(&b.file));
        let parsed = parser::expand_local_modules(parsed);

        let mut diagnostics: Vec<Diagnostic> = parsed.iter().flat_map(|p| p.diagnostics.iter().cloned()).collect();

        let built = GraphBuilder::new(&self.config).build(&parsed)?;
        let mut graph = built.graph;
        diagnostics.extend(built.diagnostics);

        let clustered = ClusterInferencer::new().infer(&graph)?;
        diagnostics.extend(clustered.diagnostics);

        let complexity = analyzer::analyze(&graph, &clustered.forest);

        let deriver = LayoutDeriver::new(&self.config.layout);
        let layout = deriver.derive(&complexity, self.config.layout.direction);
        let styled = deriver.apply_edge_styles(&mut graph);
        let icon_hints = deriver.icon_hints(&graph);

        tracing::info!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            styled_edges = styled,
            clusters = clustered.forest.len(),
            score = complexity.overall_score,
            direction = %layout.direction,
            diagnostics = diagnostics.len(),
            "Pipeline complete"
        );

        Ok(PipelineOutput {
            graph: LayoutReadyGraph {
                nodes: graph.nodes().cloned().collect(),
                edges: graph.edge_list(),
                clusters: clustered.forest.iter().cloned().collect(),
                layout,
                icon_hints,
            },
            complexity,
            diagnostics,
            files: documents.into_iter().map(|d| d.path).collect(),
        })
    }

    /// Load documents from files and directories, then run the pipeline.
    ///
    /// File-count and size limits from the configuration are applied while
    /// loading. Files that cannot be read become parse diagnostics.
    ///
    /// # Errors
    ///
    /// Returns an error if a given path does not exist, or if [`run`](Self::run) fails.
    pub async fn run_paths<P: AsRef<Path>>(&self, paths: &[P]) -> Result<PipelineOutput> {
        let loaded = parser::SourceLoader::new(&self.config).load(paths).await?;

        let mut output = self.run(loaded.documents)?;
        for (path, message) in loaded.unreadable {
            if let Some(dialect) = parser::detect_dialect(&path, None) {
                output.diagnostics.push(Diagnostic::ParseError {
                    file: path,
                    dialect,
                    message,
                    offset: None,
                    line: None,
                    column: None,
                });
            }
        }
        Ok(output)
    }
}
