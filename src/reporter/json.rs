//! JSON report generator.

use crate::analyzer::{ClusterKind, DiagramComplexity};
use crate::config::Config;
use crate::error::Result;
use crate::layout::LayoutParams;
use crate::reporter::ReportGenerator;
use crate::types::{Diagnostic, PipelineOutput};
use serde::Serialize;
use std::collections::BTreeMap;

/// JSON report generator.
pub struct JsonReporter {
    /// Whether to pretty-print the output
    pretty: bool,
}

impl JsonReporter {
    /// Create a new JSON reporter.
    #[must_use]
    pub fn new(config: &Config) -> Self {
        Self {
            pretty: config.output.pretty,
        }
    }
}

impl ReportGenerator for JsonReporter {
    fn generate(&self, output: &PipelineOutput) -> Result<String> {
        let report = JsonReport::from(output);

        let json = if self.pretty {
            serde_json::to_string_pretty(&report)
        } else {
            serde_json::to_string(&report)
        };

        json.map_err(|e| crate::err!(ReportGeneration {
            message: format!("Failed to serialize JSON report: {e}"),
        }))
    }
}

/// JSON report structure.
#[derive(Debug, Serialize)]
pub struct JsonReport<'a> {
    pub metadata: ReportMetadata,
    pub summary: ReportSummary,
    pub complexity: &'a DiagramComplexity,
    pub layout: &'a LayoutParams,
    pub clusters: Vec<ClusterSummary<'a>>,
    pub diagnostics: &'a [Diagnostic],
}

impl<'a> From<&'a PipelineOutput> for JsonReport<'a> {
    fn from(output: &'a PipelineOutput) -> Self {
        let graph = &output.graph;
        let mut clusters_by_kind = BTreeMap::new();
        for cluster in &graph.clusters {
            *clusters_by_kind.entry(cluster.kind.to_string()).or_insert(0) += 1;
        }

        Self {
            metadata: ReportMetadata {
                version: env!("CARGO_PKG_VERSION").to_string(),
                timestamp: chrono::Utc::now().to_rfc3339(),
                files: output.files.iter().map(|f| f.display().to_string()).collect(),
            },
            summary: ReportSummary {
                total_nodes: graph.nodes.len(),
                total_edges: graph.edges.len(),
                total_clusters: graph.clusters.len(),
                clusters_by_kind,
                diagnostics_by_kind: output.diagnostic_counts(),
                has_diagnostics: output.has_diagnostics(),
            },
            complexity: &output.complexity,
            layout: &graph.layout,
            clusters: graph
                .clusters
                .iter()
                .map(|c| ClusterSummary {
                    id: &c.id,
                    kind: c.kind,
                    label: &c.label,
                    parent: c.parent.as_deref(),
                    members: c.member_ids.len(),
                })
                .collect(),
            diagnostics: &output.diagnostics,
        }
    }
}

/// Report metadata.
#[derive(Debug, Serialize)]
pub struct ReportMetadata {
    /// IacMap version
    pub version: String,
    /// Report generation timestamp (RFC 3339)
    pub timestamp: String,
    /// Documents fed to the pipeline
    pub files: Vec<String>,
}

/// Report summary.
#[derive(Debug, Serialize)]
pub struct ReportSummary {
    pub total_nodes: usize,
    pub total_edges: usize,
    pub total_clusters: usize,
    pub clusters_by_kind: BTreeMap<String, usize>,
    pub diagnostics_by_kind: BTreeMap<&'static str, usize>,
    pub has_diagnostics: bool,
}

/// One cluster without its member list.
#[derive(Debug, Serialize)]
pub struct ClusterSummary<'a> {
    pub id: &'a str,
    pub kind: ClusterKind,
    pub label: &'a str,
    pub parent: Option<&'a str>,
    pub members: usize,
}
