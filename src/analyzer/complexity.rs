//! Diagram complexity metrics.

use crate::analyzer::cluster::ClusterForest;
use crate::graph::ResourceGraph;
use serde::Serialize;
use std::collections::BTreeSet;

/// Saturation points of the normalized sub-scores.
pub const NODE_THRESHOLD: f64 = 50.0;
pub const EDGE_DENSITY_THRESHOLD: f64 = 4.0;
pub const CLUSTER_THRESHOLD: f64 = 10.0;
pub const DEPTH_THRESHOLD: f64 = 3.0;
pub const LABEL_THRESHOLD: f64 = 40.0;
pub const PROVIDER_THRESHOLD: f64 = 3.0;

/// Read-only summary of how hard a graph is to draw.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DiagramComplexity {
    pub node_count: usize,
    pub edge_count: usize,
    pub cluster_count: usize,
    pub max_cluster_depth: usize,
    pub max_label_length: usize,
    pub provider_count: usize,
    pub avg_edges_per_node: f64,
    /// Weighted sum of the sub-scores, normally within 0.0..=1.0
    pub overall_score: f64,
}

/// The six factors, each ramped to 0.0..=1.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SubScores {
    pub nodes: f64,
    pub edge_density: f64,
    pub clusters: f64,
    pub depth: f64,
    pub labels: f64,
    pub providers: f64,
}

impl SubScores {
    fn weighted(&self) -> f64 {
        0.25 * self.nodes
            + 0.25 * self.edge_density
            + 0.15 * self.clusters
            + 0.15 * self.depth
            + 0.10 * self.labels
            + 0.10 * self.providers
    }
}

/// `value / threshold`, capped at 1.0.
#[must_use]
pub fn ramp(value: f64, threshold: f64) -> f64 {
    (value / threshold).clamp(0.0, 1.0)
}

#[allow(clippy::cast_precision_loss)]
impl DiagramComplexity {
    /// Build the snapshot from raw metrics, deriving the density and score.
    #[must_use]
    pub fn from_metrics(
        node_count: usize,
        edge_count: usize,
        cluster_count: usize,
        max_cluster_depth: usize,
        max_label_length: usize,
        provider_count: usize,
    ) -> Self {
        let mut complexity = Self {
            node_count,
            edge_count,
            cluster_count,
            max_cluster_depth,
            max_label_length,
            provider_count,
            avg_edges_per_node: edge_count as f64 / node_count.max(1) as f64,
            overall_score: 0.0,
        };
        complexity.overall_score = complexity.sub_scores().weighted();
        complexity
    }

    #[must_use]
    pub fn sub_scores(&self) -> SubScores {
        SubScores {
            nodes: ramp(self.node_count as f64, NODE_THRESHOLD),
            edge_density: ramp(self.avg_edges_per_node, EDGE_DENSITY_THRESHOLD),
            clusters: ramp(self.cluster_count as f64, CLUSTER_THRESHOLD),
            depth: ramp(self.max_cluster_depth as f64, DEPTH_THRESHOLD),
            labels: ramp(self.max_label_length as f64, LABEL_THRESHOLD),
            providers: ramp(self.provider_count as f64, PROVIDER_THRESHOLD),
        }
    }
}

/// Measure a graph and its clusters.
///
/// The `ungrouped` network bucket and empty clusters are not counted.
#[must_use]
pub fn analyze(graph: &ResourceGraph, forest: &ClusterForest) -> DiagramComplexity {
    let cluster_count = forest
        .iter()
        .filter(|c| !c.is_ungrouped() && !c.member_ids.is_empty())
        .count();
    let max_label_length = graph.nodes().map(|n| n.display_name.chars().count()).max().unwrap_or(0);
    let provider_count = graph.nodes().map(|n| n.provider.as_str()).collect::<BTreeSet<_>>().len();

    let complexity = DiagramComplexity::from_metrics(
        graph.node_count(),
        graph.edge_count(),
        cluster_count,
        forest.max_depth(),
        max_label_length,
        provider_count,
    );
    tracing::debug!(
        nodes = complexity.node_count,
        edges = complexity.edge_count,
        clusters = complexity.cluster_count,
        depth = complexity.max_cluster_depth,
        score = complexity.overall_score,
        "Complexity analyzed"
    );
    complexity
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::ClusterInferencer;
    use crate::graph::EdgeKind;
    use crate::types::{Attributes, Dialect, ResourceNode};
    use std::collections::BTreeMap;

    #[test]
    fn test_empty_graph() {
        let complexity = DiagramComplexity::from_metrics(0, 0, 0, 0, 0, 0);
        assert_eq!(complexity.avg_edges_per_node, 0.0);
        assert_eq!(complexity.overall_score, 0.0);
    }

    #[test]
    fn test_saturated_graph_scores_one() {
        let complexity = DiagramComplexity::from_metrics(500, 5000, 40, 5, 120, 6);
        assert!((complexity.overall_score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_weights() {
        let complexity = DiagramComplexity::from_metrics(25, 50, 5, 1, 20, 1);
        let expected = 0.25 * 0.5 + 0.25 * 0.5 + 0.15 * 0.5 + 0.15 / 3.0 + 0.10 * 0.5 + 0.10 / 3.0;
        assert!((complexity.overall_score - expected).abs() < 1e-9);
        assert!((complexity.avg_edges_per_node - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_monotonic_in_nodes_and_density() {
        let mut previous = 0.0;
        for nodes in [1, 5, 20, 50, 80] {
            let score = DiagramComplexity::from_metrics(nodes, nodes, 3, 1, 10, 1).overall_score;
            assert!(score >= previous);
            previous = score;
        }
        let sparse = DiagramComplexity::from_metrics(10, 5, 3, 1, 10, 1);
        let dense = DiagramComplexity::from_metrics(10, 30, 3, 1, 10, 1);
        assert!(dense.overall_score > sparse.overall_score);
    }

    #[test]
    fn test_analyze_graph() {
        let mut graph = crate::graph::ResourceGraph::new();
        for (resource_type, name, label) in [
            ("aws_vpc", "main", "production-network"),
            ("aws_subnet", "a", "a"),
            ("google_storage_bucket", "b", "b"),
        ] {
            let tags = BTreeMap::from([("Name".to_string(), label.to_string())]);
            graph.upsert_node(ResourceNode::new(Dialect::Terraform, resource_type, name, Attributes::new(), tags, "x.tf"));
        }
        graph.add_edge("tf:aws_vpc:main", "tf:aws_subnet:a", EdgeKind::AttributeReference);
        let forest = ClusterInferencer::new().infer(&graph).unwrap().forest;

        let complexity = analyze(&graph, &forest);
        assert_eq!(complexity.node_count, 3);
        assert_eq!(complexity.edge_count, 1);
        assert_eq!(complexity.provider_count, 2);
        assert_eq!(complexity.max_label_length, "production-network".len());
        assert_eq!(complexity.max_cluster_depth, 2);
        // aws, gcp; network, storage; vpc, subnet (ungrouped excluded)
        assert_eq!(complexity.cluster_count, 6);
        assert_eq!(analyze(&graph, &forest), complexity);
    }
}
