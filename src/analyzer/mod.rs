//! Structural analysis of a resource graph.
//!
//! This module groups nodes into clusters and measures how complex the
//! resulting diagram will be.
//!
//! # Analysis Types
//!
//! 1. **Clustering**: provider, category, network-container and environment clusters
//!    forming a forest (see [`ClusterInferencer`]).
//!
//! 2. **Complexity**: node, edge, cluster, depth, label and provider
//!    metrics combined into one weighted score (see [`analyze`]).
//!
//! # Example
//!
//! ```rust
//! use iacmap::analyzer::{analyze, ClusterInferencer};
//! use iacmap::graph::ResourceGraph;
//!
//! let graph = ResourceGraph::new();
//! let clusters = ClusterInferencer::new().infer(&graph).unwrap();
//! let complexity = analyze(&graph, &clusters.forest);
//! assert_eq!(complexity.overall_score, 0.0);
//! ```

mod cluster;
mod complexity;

pub use cluster::{
    is_public_subnet, node_category, Cluster, ClusterForest, ClusterInferencer, ClusterKind, ClusterOutput,
    SubnetVisibility, UNGROUPED_CLUSTER_ID,
};
pub use complexity::{analyze, ramp, DiagramComplexity, SubScores};
