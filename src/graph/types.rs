//! Graph type definitions.
//!
//! This module defines the core types used in the resource graph:
//! - `ResourceGraph`: The main graph structure
//! - `EdgeKind`: Why one resource depends on another
//! - `StyleHint`: Visual class of an edge
//! - `Edge`: A materialized edge handed to renderers

use crate::types::{NodeId, ResourceNode};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;

/// The resource graph structure.
///
/// Wraps a petgraph directed graph of [`ResourceNode`]s. An edge `A -> B`
/// means "B depends on / uses A".
///
/// # Structure
///
/// ```text
/// ResourceGraph
/// ├── inner: DiGraph<ResourceNode, EdgeData>  // The actual graph
/// └── node_index: HashMap<NodeId, NodeIndex>  // Fast lookup by ID
/// ```
///
/// Node order is insertion order, which the builder keeps deterministic.
#[derive(Debug, Clone)]
pub struct ResourceGraph {
    /// The underlying petgraph directed graph
    inner: DiGraph<ResourceNode, EdgeData>,

    /// Index from node ID to petgraph NodeIndex
    node_index: HashMap<NodeId, NodeIndex>,
}

impl Default for ResourceGraph {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome of [`ResourceGraph::add_edge`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeInsert {
    /// A new edge was created
    Added,
    /// An existing edge got a stronger kind
    Upgraded,
    /// An edge of equal or stronger kind already existed
    Existing,
    /// `from == to`
    SelfLoop,
    /// One of the endpoints is not in the graph
    MissingEndpoint,
}

impl ResourceGraph {
    /// Create a new empty resource graph.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: DiGraph::new(),
            node_index: HashMap::new(),
        }
    }

    /// Insert a node; a node with the same ID is replaced (last writer wins).
    ///
    /// Returns true if an existing node was replaced.
    pub fn upsert_node(&mut self, node: ResourceNode) -> bool {
        if let Some(&idx) = self.node_index.get(&node.id) {
            self.inner[idx] = node;
            return true;
        }
        let id = node.id.clone();
        let idx = self.inner.add_node(node);
        self.node_index.insert(id, idx);
        false
    }

    /// Add an edge between two nodes.
    ///
    /// There is at most one edge per ordered pair; adding a pair twice keeps
    /// the stronger kind.
    pub fn add_edge(&mut self, from: &str, to: &str, kind: EdgeKind) -> EdgeInsert {
        if from == to {
            return EdgeInsert::SelfLoop;
        }
        let (Some(&from_idx), Some(&to_idx)) = (self.node_index.get(from), self.node_index.get(to)) else {
            return EdgeInsert::MissingEndpoint;
        };

        if let Some(edge) = self.inner.find_edge(from_idx, to_idx) {
            let data = &mut self.inner[edge];
            if kind > data.kind {
                data.kind = kind;
                return EdgeInsert::Upgraded;
            }
            return EdgeInsert::Existing;
        }

        self.inner.add_edge(from_idx, to_idx, EdgeData { kind, style_hint: StyleHint::Default });
        EdgeInsert::Added
    }

    /// Set the style hint of an existing edge.
    pub fn set_style_hint(&mut self, from: &str, to: &str, style_hint: StyleHint) -> bool {
        let (Some(&from_idx), Some(&to_idx)) = (self.node_index.get(from), self.node_index.get(to)) else {
            return false;
        };
        match self.inner.find_edge(from_idx, to_idx) {
            Some(edge) => {
                self.inner[edge].style_hint = style_hint;
                true
            }
            None => false,
        }
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.node_index.contains_key(id)
    }

    /// Get a node by its ID.
    #[must_use]
    pub fn get_node(&self, id: &str) -> Option<&ResourceNode> {
        self.node_index.get(id).map(|&idx| &self.inner[idx])
    }

    /// Get the number of nodes in the graph.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.inner.node_count()
    }

    /// Get the number of edges in the graph.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.inner.edge_count()
    }

    /// Get an iterator over all nodes, in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &ResourceNode> {
        self.inner.node_weights()
    }

    /// Get an iterator over all edges, in insertion order.
    pub fn edges(&self) -> impl Iterator<Item = (&ResourceNode, &ResourceNode, &EdgeData)> {
        self.inner.edge_references().map(|edge| {
            (
                &self.inner[edge.source()],
                &self.inner[edge.target()],
                edge.weight(),
            )
        })
    }

    /// Edges as owned values for output.
    #[must_use]
    pub fn edge_list(&self) -> Vec<Edge> {
        self.edges()
            .map(|(from, to, data)| Edge {
                from: from.id.clone(),
                to: to.id.clone(),
                kind: data.kind,
                style_hint: data.style_hint,
            })
            .collect()
    }

    /// Nodes with an edge into `id`, together with the edge kind.
    #[must_use]
    pub fn incoming(&self, id: &str) -> Vec<(&ResourceNode, EdgeKind)> {
        let Some(&idx) = self.node_index.get(id) else {
            return Vec::new();
        };
        self.inner
            .edges_directed(idx, petgraph::Direction::Incoming)
            .map(|edge| (&self.inner[edge.source()], edge.weight().kind))
            .collect()
    }

    /// Check whether the dependency relation contains a cycle.
    ///
    /// Cycles are legal (Terraform rejects them, other dialects may not), but
    /// they are worth reporting.
    #[must_use]
    pub fn has_cycle(&self) -> bool {
        petgraph::algo::is_cyclic_directed(&self.inner)
    }

    /// Check the structural invariants of the graph.
    ///
    /// # Errors
    ///
    /// Returns `InvariantViolation` on a self-loop, a duplicated pair, a
    /// duplicated node ID or a stale index entry.
    pub fn validate(&self) -> crate::Result<()> {
        let mut ids = HashSet::new();
        for (idx, node) in self.inner.node_indices().zip(self.inner.node_weights()) {
            if !ids.insert(node.id.as_str()) {
                return Err(violation(format!("duplicate node id '{}'", node.id)));
            }
            if self.node_index.get(&node.id) != Some(&idx) {
                return Err(violation(format!("node index is stale for '{}'", node.id)));
            }
        }

        let mut pairs = HashSet::new();
        for edge in self.inner.edge_references() {
            if edge.source() == edge.target() {
                return Err(violation(format!("self-loop on '{}'", self.inner[edge.source()].id)));
            }
            if !pairs.insert((edge.source(), edge.target())) {
                return Err(violation(format!(
                    "duplicate edge '{}' -> '{}'",
                    self.inner[edge.source()].id,
                    self.inner[edge.target()].id
                )));
            }
        }
        Ok(())
    }

    /// Get the underlying petgraph for advanced operations.
    #[must_use]
    pub fn inner(&self) -> &DiGraph<ResourceNode, EdgeData> {
        &self.inner
    }
}

fn violation(message: String) -> crate::error::IacMapError {
    crate::err!(InvariantViolation { message })
}

/// Weight stored on each graph edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeData {
    pub kind: EdgeKind,
    pub style_hint: StyleHint,
}

/// Why an edge exists. Declared from weakest to strongest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EdgeKind {
    /// Fallback chain between resources of one file
    ImplicitOrdering,
    /// Found in an attribute value
    AttributeReference,
    /// Declared with `depends_on` / `DependsOn` / `dependsOn`
    ExplicitDependency,
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ImplicitOrdering => write!(f, "implicit-ordering"),
            Self::AttributeReference => write!(f, "attribute-reference"),
            Self::ExplicitDependency => write!(f, "explicit-dependency"),
        }
    }
}

/// Visual class of an edge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StyleHint {
    #[default]
    Default,
    Security,
    Data,
    CrossBoundary,
}

impl StyleHint {
    pub const ALL: [Self; 4] = [Self::Default, Self::Security, Self::Data, Self::CrossBoundary];
}

impl fmt::Display for StyleHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => write!(f, "default"),
            Self::Security => write!(f, "security"),
            Self::Data => write!(f, "data"),
            Self::CrossBoundary => write!(f, "cross-boundary"),
        }
    }
}

/// A directed edge as handed to renderers: `from` is used by `to`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Edge {
    pub from: NodeId,
    pub to: NodeId,
    pub kind: EdgeKind,
    pub style_hint: StyleHint,
}
