//! Resource Graph Module
//!
//! This module merges the resources extracted from every document into one
//! directed graph and serializes the finished, layout-ready result.
//!
//! # Architecture Overview
//!
//! The graph uses the `petgraph` library as its foundation. Nodes are
//! [`ResourceNode`](crate::types::ResourceNode)s; an edge `A -> B` means
//! "B uses A", so information and creation order flow along the arrows.
//!
//! ```text
//! ┌──────────┐  attribute-reference  ┌────────────┐  attribute-reference  ┌──────────────┐
//! │ aws_vpc  │──────────────────────▶│ aws_subnet │──────────────────────▶│ aws_instance │
//! │  "main"  │                       │   "app"    │                       │    "web"     │
//! └──────────┘                       └────────────┘                       └──────────────┘
//! ```
//!
//! # Edge Kinds
//!
//! 1. **explicit-dependency**: declared with `depends_on` / `DependsOn` /
//!    `dependsOn` / `options.dependsOn`
//! 2. **attribute-reference**: an attribute value refers to another resource
//! 3. **implicit-ordering**: fallback chain when a graph has no edges at all
//!
//! There is at most one edge per ordered pair; the strongest kind wins.
//!
//! # Data Flow
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │   Parsers   │────▶│  Resolver   │────▶│   Builder   │────▶│  Resource   │
//! │ (per file)  │     │ (references)│     │ (merge)     │     │   Graph     │
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//!                                                                    │
//!                                                   ┌────────────────┼────────────────┐
//!                                                   ▼                ▼                ▼
//!                                            ┌─────────────┐  ┌─────────────┐  ┌─────────────┐
//!                                            │  Clusters   │  │ Complexity  │  │   Layout    │
//!                                            └─────────────┘  └─────────────┘  └─────────────┘
//! ```
//!
//! Later stages never walk the graph recursively, so dependency cycles in
//! the input cannot cause unbounded traversal.
//!
//! # Example
//!
//! ```rust
//! use iacmap::analyzer::ClusterKind;
//! use iacmap::graph::export_graph;
//! use iacmap::types::{Dialect, GraphFormat, SourceDocument};
//! use iacmap::{Config, Pipeline};
//!
//! let doc = SourceDocument::new("main.tf", Dialect::Terraform, "resource \"aws_vpc\" \"main\" {}\n");
//! let output = Pipeline::new(Config::default()).run(vec![doc]).unwrap();
//! let dot = export_graph(&output.graph, GraphFormat::Dot, ClusterKind::Provider).unwrap();
//! assert!(dot.contains("tf:aws_vpc:main"));
//! ```

mod builder;
mod export;
mod resolver;
mod types;

pub use builder::{BuildOutput, GraphBuilder};
pub use export::export_graph;
pub use resolver::{RefTarget, Reference, ReferenceResolver};
pub use types::{Edge, EdgeData, EdgeInsert, EdgeKind, ResourceGraph, StyleHint};
